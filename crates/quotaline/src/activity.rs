//! External activity signal: the modification time of a file that another
//! process touches whenever the user does something worth refreshing for.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub trait ActivitySignal {
    /// Time of the most recent activity, or `None` when it cannot be determined.
    fn last_activity(&self) -> Option<DateTime<Utc>>;
}

/// Activity signal backed by a file's mtime (Claude Code's `history.jsonl`).
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ActivitySignal for HistoryFile {
    fn last_activity(&self) -> Option<DateTime<Utc>> {
        match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(modified) => Some(DateTime::<Utc>::from(modified)),
            Err(e) => {
                debug!("activity signal unavailable ({}): {}", self.path.display(), e);
                None
            }
        }
    }
}

/// Used when no activity source is configured; freshness falls back to age alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoActivity;

impl ActivitySignal for NoActivity {
    fn last_activity(&self) -> Option<DateTime<Utc>> {
        None
    }
}
