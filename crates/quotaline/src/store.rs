//! On-disk usage snapshot. One JSON record, replaced wholesale on every refresh.

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Usage quota figures as last reported by the API.
///
/// Older cache files lack the weekly fields; they decode as zero/empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Five-hour window reset time (ISO 8601). Empty means the snapshot is unusable.
    #[serde(default)]
    pub resets_at: String,
    /// Five-hour window utilization, nominally 0-100.
    #[serde(default)]
    pub utilization: f64,
    #[serde(default)]
    pub weekly_utilization: f64,
    #[serde(default)]
    pub weekly_resets_at: String,
    /// Unix seconds when the snapshot was fetched. Zero means never populated.
    #[serde(default)]
    pub cached_at: i64,
}

impl UsageSnapshot {
    /// Capture time, or `None` for a never-populated snapshot.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        if self.cached_at == 0 {
            return None;
        }
        DateTime::from_timestamp(self.cached_at, 0)
    }

    /// A snapshot is well formed when it has a capture time and a five-hour reset.
    pub fn is_well_formed(&self) -> bool {
        self.captured_at().is_some() && !self.resets_at.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<UsageSnapshot> {
        let content = fs::read_to_string(&self.path)?;
        let snapshot: UsageSnapshot = serde_json::from_str(&content)?;
        Ok(snapshot)
    }

    /// Write via a uniquely named temp file in the same directory and rename
    /// it into place, so readers never see a partial file even when several
    /// processes save at once.
    pub fn save(&self, snapshot: &UsageSnapshot) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut content = serde_json::to_string_pretty(snapshot)?;
        content.push('\n');

        // Dropping the temp file on an error path removes it.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        debug!("saved usage snapshot to {}", self.path.display());
        Ok(())
    }
}

/// Move a cache file left at `legacy` by older releases to `target`.
///
/// Does nothing unless `legacy` exists and `target` does not.
pub fn migrate_legacy_cache(legacy: &Path, target: &Path) -> Result<()> {
    if !legacy.exists() || target.exists() {
        return Ok(());
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(legacy, target)?;

    info!(
        "migrated usage cache from {} to {}",
        legacy.display(),
        target.display()
    );
    Ok(())
}
