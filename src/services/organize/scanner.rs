//! Watch-location scanner
//!
//! One pass walks every watch location, hands each eligible video file to
//! [OrganizerService::organize_file] and then cleans up the locations.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::error::OrganizeResult;
use super::service::OrganizerService;
use super::types::{AutoOrganizeOptions, FileSortingStatus};
use crate::services::file_utils::{has_extension_in, is_video_file};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub found: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct FolderScanner {
    service: Arc<OrganizerService>,
    concurrency: usize,
}

impl FolderScanner {
    pub fn new(service: Arc<OrganizerService>, concurrency: usize) -> Self {
        Self {
            service,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one pass with the stored options
    pub async fn run(&self, cancel: &CancellationToken) -> OrganizeResult<ScanSummary> {
        let options = self.service.options().await?;
        Ok(self.scan(&options, cancel).await)
    }

    /// Organize every eligible file below the watch locations.
    ///
    /// A no-op while auto-organize is disabled. One file failing never stops
    /// the pass; cancellation stops feeding new files.
    pub async fn scan(&self, options: &AutoOrganizeOptions, cancel: &CancellationToken) -> ScanSummary {
        let mut summary = ScanSummary::default();
        if !options.enabled {
            debug!("Auto-organize is disabled, skipping scan");
            return summary;
        }

        let now = SystemTime::now();
        let files: Vec<PathBuf> = options
            .watch_locations
            .iter()
            .flat_map(|location| eligible_files(Path::new(location), options, now))
            .collect();
        summary.found = files.len();
        info!(files = files.len(), locations = options.watch_locations.len(), "Scanning watch locations");

        let outcomes: Vec<Option<FileSortingStatus>> = stream::iter(files)
            .take_while(|_| std::future::ready(!cancel.is_cancelled()))
            .map(|path| {
                let service = Arc::clone(&self.service);
                async move {
                    match service.organize_file(&path, cancel).await {
                        Ok(result) => Some(result.status),
                        Err(e) if e.is_cancelled() => None,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Failed to organize file");
                            Some(FileSortingStatus::Failure)
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for status in outcomes.into_iter().flatten() {
            summary.processed += 1;
            match status {
                FileSortingStatus::Success => summary.succeeded += 1,
                FileSortingStatus::SkippedExisting => summary.skipped += 1,
                FileSortingStatus::Failure => summary.failed += 1,
            }
        }

        if !cancel.is_cancelled() {
            for location in &options.watch_locations {
                self.service.clean_folder(options, Path::new(location)).await;
            }
        }

        info!(
            found = summary.found,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Scan complete"
        );
        summary
    }
}

/// Video files below `location` passing the extension, size and age filters
pub fn eligible_files(location: &Path, options: &AutoOrganizeOptions, now: SystemTime) -> Vec<PathBuf> {
    if !location.is_dir() {
        warn!(path = %location.display(), "Watch location does not exist");
        return Vec::new();
    }

    let min_size = options.min_file_size_mb.saturating_mul(BYTES_PER_MB);
    let min_age = Duration::from_secs(options.min_file_age_secs);

    WalkDir::new(location)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let path = e.path();
            is_video_file(path)
                && (options.extensions.is_empty() || has_extension_in(path, &options.extensions))
        })
        .filter(|e| {
            let Ok(metadata) = e.metadata() else {
                return false;
            };
            let old_enough = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age >= min_age);
            metadata.len() >= min_size && old_enough
        })
        .map(|e| e.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::services::organize::service::OrganizerDeps;
    use crate::services::organize::test_support::{NullMonitor, StaticProvider, identified_series, touch};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn options(watch: &Path) -> AutoOrganizeOptions {
        AutoOrganizeOptions {
            enabled: true,
            watch_locations: vec![watch.to_string_lossy().to_string()],
            min_file_size_mb: 0,
            min_file_age_secs: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_eligibility_filters() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.mkv"), b"x");
        touch(&dir.path().join("nested").join("b.mp4"), b"x");
        touch(&dir.path().join("notes.txt"), b"x");

        let now = SystemTime::now() + Duration::from_secs(120);
        let mut opts = options(dir.path());
        let mut found = eligible_files(dir.path(), &opts, now);
        found.sort();
        assert_eq!(found, vec![dir.path().join("a.mkv"), dir.path().join("nested").join("b.mp4")]);

        opts.extensions = vec!["mkv".to_string()];
        assert_eq!(eligible_files(dir.path(), &opts, now), vec![dir.path().join("a.mkv")]);

        opts.extensions.clear();
        opts.min_file_size_mb = 1;
        assert!(eligible_files(dir.path(), &opts, now).is_empty());

        opts.min_file_size_mb = 0;
        opts.min_file_age_secs = 3600;
        assert!(eligible_files(dir.path(), &opts, now).is_empty());
    }

    #[tokio::test]
    async fn test_scan_counts_outcomes() {
        let dir = TempDir::new().unwrap();
        let db = Database::connect_in_memory().await.unwrap();
        let series = identified_series("Show", &dir.path().join("tv"));
        db.library().create_series(&series).await.unwrap();

        let service = Arc::new(OrganizerService::new(OrganizerDeps {
            db: db.clone(),
            config: Arc::new(db.settings()),
            metadata: Arc::new(StaticProvider::default()),
            library: Arc::new(db.library()),
            monitor: Arc::new(NullMonitor),
        }));

        let watch = dir.path().join("downloads");
        touch(&watch.join("Show.S01E01.mkv"), b"x");
        touch(&watch.join("Unknown.S01E01.mkv"), b"x");

        let scanner = FolderScanner::new(service, 2);
        let summary = scanner.scan(&options(&watch), &CancellationToken::new()).await;

        assert_eq!(
            summary,
            ScanSummary {
                found: 2,
                processed: 2,
                succeeded: 1,
                skipped: 0,
                failed: 1,
            }
        );
        assert!(series.path.join("Season 01").join("Show S01E01.mkv").exists());
    }

    #[tokio::test]
    async fn test_disabled_scan_is_noop() {
        let dir = TempDir::new().unwrap();
        let db = Database::connect_in_memory().await.unwrap();
        let service = Arc::new(OrganizerService::new(OrganizerDeps {
            db: db.clone(),
            config: Arc::new(db.settings()),
            metadata: Arc::new(StaticProvider::default()),
            library: Arc::new(db.library()),
            monitor: Arc::new(NullMonitor),
        }));
        touch(&dir.path().join("Show.S01E01.mkv"), b"x");

        let mut opts = options(dir.path());
        opts.enabled = false;
        let summary = FolderScanner::new(service, 1).scan(&opts, &CancellationToken::new()).await;
        assert_eq!(summary, ScanSummary::default());
    }
}
