//! Local persistence of formatted output
//!
//! Files are named `{base_name}_{YYYYmmdd_HHMMSS}.{extension}` using UTC
//! time. In [`ExecutionMode::Ephemeral`] every write goes to the ephemeral
//! directory no matter which folder the caller asked for.

use crate::config::{ExecutionMode, RuntimeSettings};
use crate::error::{Error, Result};
use crate::types::StoredFile;
use chrono::{DateTime, SubsecRound, Utc};
use std::path::{Path, PathBuf};

/// Base name used when the caller gives none
pub const DEFAULT_BASE_NAME: &str = "data";

/// Timestamp layout embedded in file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Writes timestamped files to the execution-appropriate directory
#[derive(Clone, Debug)]
pub struct LocalWriter {
    mode: ExecutionMode,
    ephemeral_dir: PathBuf,
}

impl LocalWriter {
    /// Create a writer for `mode`, using `ephemeral_dir` when ephemeral
    pub fn new(mode: ExecutionMode, ephemeral_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            ephemeral_dir: ephemeral_dir.into(),
        }
    }

    /// Create a writer from the process settings
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.execution_mode, settings.ephemeral_dir.clone())
    }

    /// Execution mode this writer was built for
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Folder a write to `folder` actually lands in
    pub fn resolve_folder(&self, folder: &Path) -> PathBuf {
        match self.mode {
            ExecutionMode::Local => folder.to_path_buf(),
            ExecutionMode::Ephemeral => self.ephemeral_dir.clone(),
        }
    }

    /// Save `content` with the current UTC time in its name
    pub async fn save(
        &self,
        content: &str,
        extension: &str,
        base_name: Option<&str>,
        folder: &Path,
    ) -> Result<StoredFile> {
        self.save_at(content, extension, base_name, folder, Utc::now())
            .await
    }

    /// Save `content` stamped with `at` (truncated to whole seconds)
    pub async fn save_at(
        &self,
        content: &str,
        extension: &str,
        base_name: Option<&str>,
        folder: &Path,
        at: DateTime<Utc>,
    ) -> Result<StoredFile> {
        let created_at = at.trunc_subsecs(0);
        let name = base_name
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_BASE_NAME);
        let dir = self.resolve_folder(folder);

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create directory '{}': {}", dir.display(), e),
            ))
        })?;

        let file_name = format!(
            "{}_{}.{}",
            name,
            created_at.format(TIMESTAMP_FORMAT),
            extension
        );
        let path = dir.join(file_name);

        tokio::fs::write(&path, content.as_bytes())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to write '{}': {}", path.display(), e),
                ))
            })?;

        tracing::info!(path = %path.display(), bytes = content.len(), "saved file");

        Ok(StoredFile {
            path,
            extension: extension.to_string(),
            name: name.to_string(),
            created_at,
        })
    }
}
