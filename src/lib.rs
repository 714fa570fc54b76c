//! # api-pipeline
//!
//! Configuration-driven extract pipeline: fetch JSON from HTTP endpoints,
//! render it as JSON, CSV or plain text, write timestamped files and upload
//! them to Google Cloud Storage.
//!
//! ## Stages
//!
//! - [`fetch`] - HTTP fetch with immediate, bounded retries
//! - [`format`] - JSON / CSV / TXT rendering
//! - [`storage`] - timestamped local files, redirected in ephemeral sandboxes
//! - [`remote`] - idempotent object upload behind the [`remote::ObjectStore`] trait
//! - [`pipeline`] - drives the stages for every configured endpoint
//!
//! ## Quick Start
//!
//! ```no_run
//! use api_pipeline::config::RuntimeSettings;
//! use api_pipeline::pipeline::run_pipeline;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads config/dev.toml
//!     let report = run_pipeline("dev", &RuntimeSettings::default()).await?;
//!     println!("wrote {} files", report.files_written());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP trigger
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Endpoint fetching
pub mod fetch;
/// Output formats
pub mod format;
/// Pipeline orchestration
pub mod pipeline;
/// Remote object storage
pub mod remote;
/// Immediate sequential retries
pub mod retry;
/// Local file persistence
pub mod storage;
/// Log session setup
pub mod telemetry;
/// Core types and run reports
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{
    EndpointFailurePolicy, EndpointSpec, ExecutionMode, PipelineConfig, PipelineDefaults,
    RuntimeSettings, StorageConfig,
};
pub use error::{
    ApiError, Error, ErrorDetail, FetchError, FormatError, Result, StorageError, ToHttpStatus,
};
pub use fetch::{FetchRequest, Fetcher};
pub use format::{OutputFormat, format_named, format_value};
pub use pipeline::{Pipeline, run_pipeline};
pub use remote::{GcsStore, MemoryStore, ObjectStore, Uploader};
pub use storage::LocalWriter;
pub use types::{
    EndpointReport, FormattedArtifact, RunReport, SkippedFormat, StoredFile, UploadOutcome,
    UploadRecord,
};

/// Wait for SIGTERM or SIGINT (Ctrl+C on non-Unix platforms)
///
/// Signal registration can fail in restricted environments (containers,
/// tests); the remaining signal is then awaited alone.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM signal");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT signal (Ctrl+C)");
                    }
                }
            }
            (Err(e), Ok(mut sigint)) => {
                tracing::warn!(error = %e, "No SIGTERM handler, waiting for SIGINT only");
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            }
            (Ok(mut sigterm), Err(e)) => {
                tracing::warn!(error = %e, "No SIGINT handler, waiting for SIGTERM only");
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            }
            (Err(e), Err(_)) => {
                tracing::error!(error = %e, "No signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
