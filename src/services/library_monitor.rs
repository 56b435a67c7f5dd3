//! Process-wide file-change suppression
//!
//! A library watcher asks [FileChangeSuppressor::is_suppressed] before
//! reacting to a filesystem event, so paths the organizer is writing are not
//! mistaken for external changes. Completed changes are broadcast so the
//! watcher can refresh the affected item.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::services::organize::LibraryMonitor;

/// A change the organizer finished making
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryChange {
    pub path: PathBuf,
    /// Whether the item at `path` should be re-read
    pub refresh: bool,
}

pub struct FileChangeSuppressor {
    /// Path (case-folded) to number of operations in flight
    active: Mutex<HashMap<String, usize>>,
    changes: broadcast::Sender<LibraryChange>,
}

fn key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

impl FileChangeSuppressor {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            active: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn is_suppressed(&self, path: &Path) -> bool {
        self.active.lock().contains_key(&key(path))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryChange> {
        self.changes.subscribe()
    }
}

impl Default for FileChangeSuppressor {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryMonitor for FileChangeSuppressor {
    fn report_change_beginning(&self, path: &Path) {
        *self.active.lock().entry(key(path)).or_insert(0) += 1;
    }

    fn report_change_complete(&self, path: &Path, refresh: bool) {
        {
            let mut active = self.active.lock();
            let k = key(path);
            match active.get_mut(&k) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    active.remove(&k);
                }
                None => debug!(path = %path.display(), "Change completed without a matching begin"),
            }
        }

        let _ = self.changes.send(LibraryChange {
            path: path.to_path_buf(),
            refresh,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_reports_are_counted() {
        let monitor = FileChangeSuppressor::new();
        let path = Path::new("/tv/Show/Season 01/Show S01E01.mkv");

        monitor.report_change_beginning(path);
        monitor.report_change_beginning(path);
        assert!(monitor.is_suppressed(Path::new("/TV/Show/Season 01/show s01e01.mkv")));

        monitor.report_change_complete(path, false);
        assert!(monitor.is_suppressed(path));
        monitor.report_change_complete(path, true);
        assert!(!monitor.is_suppressed(path));
    }

    #[test]
    fn test_completion_is_broadcast() {
        let monitor = FileChangeSuppressor::new();
        let mut rx = monitor.subscribe();
        let path = Path::new("/tv/a.mkv");

        monitor.report_change_beginning(path);
        monitor.report_change_complete(path, true);

        assert_eq!(
            rx.try_recv().unwrap(),
            LibraryChange {
                path: path.to_path_buf(),
                refresh: true
            }
        );
    }

    #[test]
    fn test_unmatched_complete_is_harmless() {
        let monitor = FileChangeSuppressor::new();
        monitor.report_change_complete(Path::new("/tv/a.mkv"), false);
        assert!(!monitor.is_suppressed(Path::new("/tv/a.mkv")));
    }
}
