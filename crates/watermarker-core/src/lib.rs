//! # Watermarker Core
//!
//! Batch watermarking of image folders: named profiles describing a text or
//! image watermark, a compositor that places it at one of nine anchors,
//! and a runner that writes stamped copies into a mirrored destination tree.

pub mod batch;
pub mod compositor;
pub mod config;
pub mod error;
pub mod fonts;
pub mod logging;
pub mod models;
pub mod profile;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use batch::{
    BatchJob, BatchObserver, BatchReport, BatchRunner, FileOutcome, FileReport, SaveFailureAction,
    SilentObserver,
};
pub use compositor::{compute_origin, render_preview, Watermark};
pub use config::{AppConfig, ConfigManager, OnSaveError};
pub use error::*;
pub use fonts::FontResolver;
pub use models::*;
pub use profile::{WatermarkProfile, DEFAULT_PROFILE_NAME};
pub use store::{ProfileStore, SessionState};

use tracing_appender::non_blocking::WorkerGuard;

/// Initialize logging from the application configuration
pub fn init(config: &AppConfig) -> Result<Option<WorkerGuard>> {
    let guard = logging::init_logging(&config.logging)?;
    tracing::debug!("Watermarker core {} initialized", version());
    Ok(guard)
}

/// Get the version of the watermarker core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
