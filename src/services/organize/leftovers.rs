//! Cleanup of download folders once their videos have been organized

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::file_mover::FileOrganizer;
use super::types::AutoOrganizeOptions;
use crate::services::file_utils::{has_extension_in, paths_equal_ignore_case};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub files_deleted: usize,
    pub folders_deleted: usize,
}

/// Delete leftover files (by configured extension) anywhere under `folder`,
/// then, when enabled, the folders this left empty.
///
/// Watch locations themselves are never removed, and folders outside every
/// watch location are left alone.
pub async fn clean_folder(files: &FileOrganizer, options: &AutoOrganizeOptions, folder: &Path) -> CleanupSummary {
    let mut summary = CleanupSummary::default();
    if !folder.is_dir() {
        return summary;
    }

    if !options.leftover_file_extensions_to_delete.is_empty() {
        let leftovers: Vec<PathBuf> = WalkDir::new(folder)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| has_extension_in(p, &options.leftover_file_extensions_to_delete))
            .collect();

        for path in leftovers {
            match files.delete_file(&path, false).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Deleted leftover file");
                    summary.files_deleted += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete leftover file"),
            }
        }
    }

    if options.delete_empty_folders && is_below_watch_location(folder, &options.watch_locations) {
        summary.folders_deleted = delete_empty_folders(files, folder, &options.watch_locations).await;
    }

    if summary != CleanupSummary::default() {
        info!(
            folder = %folder.display(),
            files = summary.files_deleted,
            folders = summary.folders_deleted,
            "Cleaned up download folder"
        );
    }
    summary
}

/// Whether `folder` is a watch location or lies below one
fn is_below_watch_location(folder: &Path, watch_locations: &[String]) -> bool {
    let folder = folder.to_string_lossy().to_lowercase();
    watch_locations.iter().any(|w| {
        let w = w.trim_end_matches(['/', '\\']).to_lowercase();
        !w.is_empty() && Path::new(&folder).starts_with(Path::new(&w))
    })
}

fn is_watch_location(folder: &Path, watch_locations: &[String]) -> bool {
    watch_locations
        .iter()
        .any(|w| paths_equal_ignore_case(folder, Path::new(w.trim_end_matches(['/', '\\']))))
}

/// Remove empty folders deepest first, `root` included unless it is a watch location
async fn delete_empty_folders(files: &FileOrganizer, root: &Path, watch_locations: &[String]) -> usize {
    let folders: Vec<PathBuf> = WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();

    let mut deleted = 0;
    for folder in folders {
        if is_watch_location(&folder, watch_locations) || !is_empty_dir(&folder).await {
            continue;
        }
        match files.remove_empty_folder(&folder).await {
            Ok(()) => deleted += 1,
            Err(e) => debug!(path = %folder.display(), error = %e, "Failed to remove folder"),
        }
    }
    deleted
}

async fn is_empty_dir(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}
