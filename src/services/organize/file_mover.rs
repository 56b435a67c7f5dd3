//! File operations shared by the episode and movie strategies
//!
//! Every mutation is bracketed with the [LibraryMonitor] for exactly the path
//! it touches, and the move itself runs while the result id is held in the
//! [InProgressTracker].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::collaborators::LibraryMonitor;
use super::error::{OrganizeError, OrganizeResult};
use super::events::{EventSender, OrganizerEvent, emit};
use super::progress::{InProgressTracker, ProgressGuard};
use super::types::OrganizationResult;
use crate::services::file_utils::{file_stem, format_bytes, paths_equal_ignore_case};

#[derive(Debug, Clone, Copy, Default)]
pub struct SortOptions {
    /// Leave the source in place
    pub copy: bool,
    /// Delete the result's duplicates after a successful sort
    pub replace_duplicates: bool,
}

#[derive(Clone)]
pub struct FileOrganizer {
    monitor: Arc<dyn LibraryMonitor>,
    tracker: InProgressTracker,
    events: EventSender,
}

/// Exclusive hold on one result while its conflicts are checked and its file is moved.
/// Announces `ItemUnlocked` once released.
#[derive(Debug)]
pub struct SortClaim {
    id: Uuid,
    guard: Option<ProgressGuard>,
    events: EventSender,
}

impl SortClaim {
    pub fn id(&self) -> Uuid {
        self.id
    }

    fn mark_moved(&mut self) {
        if let Some(guard) = self.guard.as_mut() {
            guard.mark_moved();
        }
    }
}

impl Drop for SortClaim {
    fn drop(&mut self) {
        drop(self.guard.take());
        emit(&self.events, OrganizerEvent::ItemUnlocked(self.id));
    }
}

impl FileOrganizer {
    pub fn new(monitor: Arc<dyn LibraryMonitor>, tracker: InProgressTracker, events: EventSender) -> Self {
        Self {
            monitor,
            tracker,
            events,
        }
    }

    pub fn tracker(&self) -> &InProgressTracker {
        &self.tracker
    }

    /// Completed moves for `id` so far; pass it back to [Self::claim]
    pub fn moves_seen(&self, id: Uuid) -> u64 {
        self.tracker.moves(id)
    }

    /// Take the result for sorting.
    ///
    /// `ItemInProgress` when another call holds it. `AlreadyOrganized` when a
    /// move completed since `moves_seen` was taken, or when the source is gone
    /// after an earlier move in this process.
    pub fn claim(&self, result: &OrganizationResult, moves_seen: u64) -> OrganizeResult<SortClaim> {
        let Some(guard) = self.tracker.try_begin(result.id) else {
            debug!(result_id = %result.id, "Result is already being organized");
            return Err(OrganizeError::ItemInProgress(result.id));
        };

        let moves = self.tracker.moves(result.id);
        if moves != moves_seen || (moves > 0 && !Path::new(&result.original_path).exists()) {
            debug!(result_id = %result.id, "Result was organized by another call");
            return Err(OrganizeError::AlreadyOrganized(result.id));
        }

        emit(&self.events, OrganizerEvent::ItemLocked(result.id));
        Ok(SortClaim {
            id: result.id,
            guard: Some(guard),
            events: self.events.clone(),
        })
    }

    /// Move or copy `result.original_path` to `result.target_path` and record
    /// the outcome on `result`.
    ///
    /// Returns `Cancelled` after cleaning up a partial copy. Every other
    /// failure is recorded on `result` and returns `Ok`. The claim is
    /// released when this returns.
    pub async fn perform_file_sorting(
        &self,
        result: &mut OrganizationResult,
        mut claim: SortClaim,
        options: SortOptions,
        cancel: &CancellationToken,
    ) -> OrganizeResult<()> {
        let Some(target) = result.target_path.clone().map(PathBuf::from) else {
            return Err(OrganizeError::TargetPathUndetermined(result.original_path.clone()));
        };
        let source = PathBuf::from(&result.original_path);

        info!(
            result_id = %result.id,
            source = %source.display(),
            target = %target.display(),
            size = %format_bytes(u64::try_from(result.file_size_bytes).unwrap_or(0)),
            copy = options.copy,
            "Sorting file"
        );

        match self.transfer(&source, &target, options.copy, cancel).await {
            Ok(()) => {
                claim.mark_moved();
                result.succeed();
            }
            Err(OrganizeError::Cancelled) => return Err(OrganizeError::Cancelled),
            Err(e) => {
                error!(result_id = %result.id, error = %e, "Failed to sort file");
                result.fail(e.to_string());
                return Ok(());
            }
        }

        if options.replace_duplicates {
            self.replace_duplicates(&result.duplicate_paths, &target).await;
        }

        Ok(())
    }

    async fn transfer(
        &self,
        source: &Path,
        target: &Path,
        copy: bool,
        cancel: &CancellationToken,
    ) -> OrganizeResult<()> {
        if let Some(parent) = target.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            error!(path = %parent.display(), error = %e, "Failed to create directory");
        }

        let move_failed = |error: std::io::Error| OrganizeError::MoveFailed {
            source_path: source.display().to_string(),
            target_path: target.display().to_string(),
            error,
        };
        let map_io = |error: std::io::Error| {
            if error.kind() == std::io::ErrorKind::Interrupted && cancel.is_cancelled() {
                OrganizeError::Cancelled
            } else {
                move_failed(error)
            }
        };

        let partial = partial_path(target);

        if copy || target.exists() {
            self.monitor.report_change_beginning(&partial);
            self.monitor.report_change_beginning(target);
            let copied = copy_file(source, target, cancel).await;
            self.monitor.report_change_complete(&partial, false);
            self.monitor.report_change_complete(target, true);
            copied.map_err(&map_io)?;

            if !copy {
                self.remove_copied_source(source).await;
            }
            return Ok(());
        }

        self.monitor.report_change_beginning(source);
        self.monitor.report_change_beginning(&partial);
        self.monitor.report_change_beginning(target);
        let moved = match tokio::fs::rename(source, target).await {
            Ok(()) => Ok(false),
            Err(e) => {
                debug!(source = %source.display(), error = %e, "Rename failed, copying instead");
                copy_file(source, target, cancel).await.map(|()| true)
            }
        };
        self.monitor.report_change_complete(source, false);
        self.monitor.report_change_complete(&partial, false);
        self.monitor.report_change_complete(target, true);

        if moved.map_err(&map_io)? {
            self.remove_copied_source(source).await;
        }
        Ok(())
    }

    /// The copy already landed, so a source that cannot be deleted is only a warning
    async fn remove_copied_source(&self, source: &Path) {
        if let Err(e) = self.delete_file(source, false).await {
            warn!(path = %source.display(), error = %e, "Failed to delete source after copy");
        }
    }

    /// Delete stale duplicates of a freshly sorted file.
    ///
    /// The first duplicate sharing the target's folder hands its sidecar
    /// files (subtitles, artwork, nfo) over to the target's name.
    async fn replace_duplicates(&self, duplicates: &[String], target: &Path) {
        let target_dir = target.parent();
        let mut renamed_sidecars = false;

        for duplicate in duplicates {
            let path = Path::new(duplicate);
            if paths_equal_ignore_case(path, target) {
                continue;
            }

            let same_dir = match (path.parent(), target_dir) {
                (Some(a), Some(b)) => paths_equal_ignore_case(a, b),
                _ => false,
            };
            let rename_sidecars = same_dir && !renamed_sidecars;
            if rename_sidecars {
                renamed_sidecars = true;
            }

            if let Err(e) = self.delete_library_file(path, rename_sidecars, target).await {
                warn!(path = %path.display(), error = %e, "Failed to delete duplicate file");
            }
        }
    }

    /// Delete a library file, optionally renaming its sidecars to `new_path`'s stem
    pub async fn delete_library_file(
        &self,
        path: &Path,
        rename_sidecars: bool,
        new_path: &Path,
    ) -> std::io::Result<()> {
        info!(path = %path.display(), "Removing duplicate episode");
        self.delete_file(path, true).await?;

        if rename_sidecars {
            self.rename_sidecars(path, new_path).await;
        }
        Ok(())
    }

    /// Delete one file under monitor bracketing
    pub async fn delete_file(&self, path: &Path, refresh: bool) -> std::io::Result<()> {
        self.monitor.report_change_beginning(path);
        let deleted = tokio::fs::remove_file(path).await;
        self.monitor.report_change_complete(path, refresh);
        deleted
    }

    /// Remove an empty folder under monitor bracketing
    pub async fn remove_empty_folder(&self, path: &Path) -> std::io::Result<()> {
        self.monitor.report_change_beginning(path);
        let removed = tokio::fs::remove_dir(path).await;
        self.monitor.report_change_complete(path, false);
        removed
    }

    async fn rename_sidecars(&self, old_path: &Path, new_path: &Path) {
        let Some(folder) = old_path.parent() else {
            return;
        };
        let Ok(mut entries) = tokio::fs::read_dir(folder).await else {
            return;
        };

        let old_stem = file_stem(old_path);
        let old_prefix = old_stem.to_lowercase();
        let new_stem = file_stem(new_path);

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path.is_file() || paths_equal_ignore_case(&path, new_path) {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            let (Some(prefix), Some(suffix)) = (name.get(..old_stem.len()), name.get(old_stem.len()..)) else {
                continue;
            };
            if prefix.to_lowercase() != old_prefix || !suffix.starts_with('.') {
                continue;
            }

            let renamed = folder.join(format!("{}{}", new_stem, suffix));
            if renamed.exists() {
                continue;
            }

            self.monitor.report_change_beginning(&path);
            self.monitor.report_change_beginning(&renamed);
            let outcome = tokio::fs::rename(&path, &renamed).await;
            self.monitor.report_change_complete(&path, false);
            self.monitor.report_change_complete(&renamed, true);

            match outcome {
                Ok(()) => debug!(from = %path.display(), to = %renamed.display(), "Renamed sidecar file"),
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to rename sidecar file"),
            }
        }
    }
}

/// Sibling path a copy is staged at before it replaces `target`
fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

/// Copy `source` over `target` through a staged sibling, so an existing
/// target stays intact until the copy is complete. Cancellation surfaces as
/// `ErrorKind::Interrupted`.
async fn copy_file(source: &Path, target: &Path, cancel: &CancellationToken) -> std::io::Result<()> {
    let partial = partial_path(target);
    let staged = match stream_into(source, &partial, cancel).await {
        Ok(()) => tokio::fs::rename(&partial, target).await,
        Err(e) => Err(e),
    };
    if staged.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    staged
}

async fn stream_into(source: &Path, target: &Path, cancel: &CancellationToken) -> std::io::Result<()> {
    let mut reader = tokio::fs::File::open(source).await?;
    let mut writer = tokio::fs::File::create(target).await?;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            return Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "copy cancelled"));
        }
        copied = tokio::io::copy(&mut reader, &mut writer) => {
            copied?;
        }
    }

    writer.flush().await?;
    Ok(())
}
