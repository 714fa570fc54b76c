//! Core types shared across pipeline stages

use crate::format::OutputFormat;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// Formatted payload ready to be written
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormattedArtifact {
    /// Format the content is in
    pub format: OutputFormat,
    /// Rendered text
    pub content: String,
}

/// A file written by the local writer
///
/// Never modified after creation; every save produces a new file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    /// Resolved path of the file
    pub path: PathBuf,
    /// File extension (format tag)
    pub extension: String,
    /// Logical name the file was saved under (endpoint name or "data")
    pub name: String,
    /// Second-precision UTC timestamp embedded in the file name
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    /// File name component of [`StoredFile::path`]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Benign outcomes of an upload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    /// The object was written
    Uploaded,
    /// An object already existed at the destination; nothing was written
    SkippedAlreadyExists,
}

/// Result of uploading one stored file
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadRecord {
    /// Local source file
    pub source: PathBuf,
    /// Destination object path
    pub object: String,
    /// What happened
    pub outcome: UploadOutcome,
}

/// A format that could not be produced for an endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedFormat {
    /// Format name as configured
    pub format: String,
    /// Why it was skipped
    pub reason: String,
}

/// What happened to one endpoint during a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EndpointReport {
    /// Endpoint name
    pub name: String,
    /// Files written, in format order
    pub files: Vec<StoredFile>,
    /// Uploads performed or skipped
    pub uploads: Vec<UploadRecord>,
    /// Formats that failed to format or write
    pub skipped_formats: Vec<SkippedFormat>,
    /// Fetch error, when the endpoint failed under the continue policy
    pub fetch_error: Option<String>,
}

/// Summary of a pipeline run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Environment the run used
    pub env: String,
    /// One entry per attempted endpoint, in order
    pub endpoints: Vec<EndpointReport>,
}

impl RunReport {
    /// Total number of files written
    pub fn files_written(&self) -> usize {
        self.endpoints.iter().map(|e| e.files.len()).sum()
    }

    /// Total number of objects actually uploaded
    pub fn objects_uploaded(&self) -> usize {
        self.endpoints
            .iter()
            .flat_map(|e| &e.uploads)
            .filter(|u| u.outcome == UploadOutcome::Uploaded)
            .count()
    }

    /// Endpoints whose fetch failed
    pub fn failed_endpoints(&self) -> impl Iterator<Item = &EndpointReport> {
        self.endpoints.iter().filter(|e| e.fetch_error.is_some())
    }
}
