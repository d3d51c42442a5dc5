//! Axum HTTP API for subtitle burn-in exports.
//!
//! This crate provides:
//! - Export start / status / download endpoints
//! - One-time download handoff links
//! - Streaming delivery with byte ranges and deferred cleanup
//! - Prometheus metrics

pub mod config;
pub mod delivery;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod sweeper;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
pub use sweeper::OutputSweeper;
