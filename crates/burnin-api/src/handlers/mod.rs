//! Request handlers.

pub mod downloads;
pub mod exports;
pub mod health;

pub use health::{health, ready};
