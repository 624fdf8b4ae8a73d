//! Artifact persistence
//!
//! Records are written as pretty JSON to a temporary file next to the target
//! and then renamed into place, so an existing artifact is never left half
//! written.

use crate::error::{Error, Result};
use crate::session::record::SessionRecord;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// Writes finished session records into a data directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    directory: PathBuf,
}

impl ArtifactWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Final path of the artifact for `record`
    pub fn artifact_path(&self, record: &SessionRecord) -> Result<PathBuf> {
        let file_name = record
            .file_name()
            .ok_or_else(|| Error::persistence("record has no session id"))?;
        Ok(self.directory.join(file_name))
    }

    /// Persist a record atomically and return the artifact path
    pub async fn write(&self, record: &SessionRecord) -> Result<PathBuf> {
        let path = self.artifact_path(record)?;

        if !fs::try_exists(&self.directory).await.unwrap_or(false) {
            fs::create_dir_all(&self.directory).await.map_err(|e| {
                Error::persistence(format!(
                    "Failed to create data directory {}: {}",
                    self.directory.display(),
                    e
                ))
            })?;
            info!("Created data directory: {}", self.directory.display());
        }

        let json = serde_json::to_string_pretty(record).map_err(Error::persistence)?;

        // Write to temp file first, then rename atomically
        let temp_path = path.with_extension("json.tmp");
        debug!("Saving: {}", path.display());
        if let Err(e) = fs::write(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::persistence(format!(
                "Failed to write {}: {}",
                temp_path.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::persistence(format!(
                "Failed to move artifact into place: {e}"
            )));
        }

        info!("Saved: {}", path.display());
        Ok(path)
    }
}
