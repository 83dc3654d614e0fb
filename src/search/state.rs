//! Sweep checkpoint persistence for resume capability

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};

/// Persistent sweep checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepState {
    /// Sweep identifier
    pub sweep_id: String,
    /// Archive being attacked
    pub archive: PathBuf,
    /// Oldest candidate not yet finished by a worker. Passing it back as the
    /// skip-ahead target re-tests it and everything after it.
    pub resume_from: Option<String>,
    /// Candidates handed to workers
    pub emitted_count: u64,
    /// Candidates with a final verdict
    pub checked_count: u64,
    /// Recovered password, once found
    #[serde(default)]
    pub found: Option<String>,
    /// Sweep start time
    pub started_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
    /// Sweep finished (found or exhausted)
    pub completed: bool,
}

impl SweepState {
    /// Create a new sweep state
    pub fn new(archive: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            sweep_id: format!("sweep_{}", now.format("%Y%m%d_%H%M%S")),
            archive: archive.into(),
            resume_from: None,
            emitted_count: 0,
            checked_count: 0,
            found: None,
            started_at: now,
            updated_at: now,
            completed: false,
        }
    }

    /// Load state from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SweepError::io(e.to_string(), Some(path.to_string_lossy().to_string()))
        })?;

        serde_json::from_str(&content).map_err(|e| SweepError::parse(e.to_string(), Some(content)))
    }

    /// Load state if the file exists and belongs to `archive`
    pub fn load_for(path: &Path, archive: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let state = Self::load(path)?;
        if state.archive != archive {
            tracing::warn!(
                state = %path.display(),
                recorded = %state.archive.display(),
                archive = %archive.display(),
                "Checkpoint belongs to a different archive, ignoring it"
            );
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Save state to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SweepError::io(e.to_string(), Some(parent.to_string_lossy().to_string()))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;

        // Write-then-rename so an interrupted save never truncates the checkpoint.
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, content).map_err(|e| {
            SweepError::io(e.to_string(), Some(tmp.to_string_lossy().to_string()))
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            SweepError::io(e.to_string(), Some(path.to_string_lossy().to_string()))
        })
    }

    /// Update progress
    pub fn update_progress(&mut self, resume_from: Option<String>, emitted: u64, checked: u64) {
        self.resume_from = resume_from;
        self.emitted_count = emitted;
        self.checked_count = checked;
        self.updated_at = Utc::now();
    }

    /// Mark as completed, with the password if one was found
    pub fn mark_completed(&mut self, found: Option<String>) {
        self.found = found;
        self.resume_from = None;
        self.completed = true;
        self.updated_at = Utc::now();
    }

    /// Skip-ahead target for an unfinished sweep
    pub fn resume_target(&self) -> Option<Vec<u8>> {
        if self.completed {
            return None;
        }
        self.resume_from.as_ref().map(|s| s.as_bytes().to_vec())
    }
}
