//! Export orchestration for subtitle burn-in.
//!
//! Ties the parser, style calculator, hardware detection, quality selection
//! and encode engine together behind [`ExportOrchestrator`], tracks job state
//! in the progress store, and issues one-time download handoffs.

pub mod config;
pub mod error;
pub mod handoff;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod persistence;
pub mod upload;
pub mod workspace;

pub use config::ExportConfig;
pub use error::{ExportError, ExportResult};
pub use handoff::{DownloadHandoff, HandoffTicket};
pub use logging::JobLogger;
pub use orchestrator::{ExportOrchestrator, ExportOutcome, ProgressView};
pub use persistence::{NoopProjectSink, ProjectSink};
pub use upload::{DirUploadResolver, UploadResolver};
pub use workspace::WorkDir;
