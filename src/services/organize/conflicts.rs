//! Conflict and duplicate detection for a target path

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::collaborators::EpisodeFile;
use crate::services::file_utils::{file_stem, is_video_file, paths_equal_ignore_case};

/// What is already at (or around) a target path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConflictCheck {
    pub exists: bool,
    /// Target exists with the source's byte size. A weak check by intent:
    /// it only makes copy-mode reruns idempotent.
    pub is_same_file_as_source: bool,
    pub duplicates: Vec<PathBuf>,
}

impl ConflictCheck {
    /// Why organizing should stop here when not overwriting, if it should
    pub fn skip_reason(&self, source: &Path, target: &Path, copy_mode: bool) -> Option<String> {
        if copy_mode && self.exists && self.is_same_file_as_source {
            return Some(format!(
                "File '{}' already copied to new path '{}', stopping organization",
                source.display(),
                target.display()
            ));
        }

        if self.exists {
            return Some(format!(
                "File '{}' already exists as '{}', stopping organization",
                source.display(),
                target.display()
            ));
        }

        if !self.duplicates.is_empty() {
            let paths: Vec<String> = self.duplicates.iter().map(|p| p.display().to_string()).collect();
            return Some(format!(
                "File '{}' already exists as '{}', stopping organization",
                source.display(),
                paths.join("', '")
            ));
        }

        None
    }

    pub fn duplicate_strings(&self) -> Vec<String> {
        self.duplicates.iter().map(|p| p.to_string_lossy().to_string()).collect()
    }
}

/// Whether a library episode represents the same season/episode (range).
///
/// Ending episodes must agree exactly: a double episode and a single one
/// at its first number are different items.
pub fn is_same_episode(
    existing: &EpisodeFile,
    season: i32,
    episode: i32,
    ending_episode: Option<i32>,
) -> bool {
    existing.season_number == Some(season)
        && existing.episode_number == Some(episode)
        && existing.ending_episode_number == ending_episode
}

/// Other files representing the same item, excluding `target` and `source`.
///
/// Covers library episodes with the same numbering and, for both episodes
/// and movies, video files next to the target sharing its file stem.
pub async fn find_duplicates(
    source: &Path,
    target: &Path,
    library_files: &[EpisodeFile],
    numbering: Option<(i32, i32, Option<i32>)>,
) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some((season, episode, ending_episode)) = numbering {
        candidates.extend(
            library_files
                .iter()
                .filter(|f| !f.is_virtual && is_same_episode(f, season, episode, ending_episode))
                .map(|f| f.path.clone())
                .filter(|p| p.exists()),
        );
    }

    if let Some(folder) = target.parent()
        && let Ok(mut entries) = tokio::fs::read_dir(folder).await
    {
        let target_stem = file_stem(target).to_lowercase();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_file() && is_video_file(&path) && file_stem(&path).to_lowercase() == target_stem {
                candidates.push(path);
            }
        }
    }

    let mut seen = HashSet::new();
    let duplicates: Vec<PathBuf> = candidates
        .into_iter()
        .filter(|p| !paths_equal_ignore_case(p, target) && !paths_equal_ignore_case(p, source))
        .filter(|p| seen.insert(p.to_string_lossy().to_lowercase()))
        .collect();

    if !duplicates.is_empty() {
        debug!(
            target = %target.display(),
            count = duplicates.len(),
            "Found duplicates of target"
        );
    }
    duplicates
}

/// Inspect the target path and its duplicates
pub async fn check_conflicts(
    source: &Path,
    target: &Path,
    library_files: &[EpisodeFile],
    numbering: Option<(i32, i32, Option<i32>)>,
) -> ConflictCheck {
    let exists = target.exists();

    let is_same_file_as_source = if exists {
        match (tokio::fs::metadata(source).await, tokio::fs::metadata(target).await) {
            (Ok(s), Ok(t)) => s.len() == t.len(),
            _ => false,
        }
    } else {
        false
    };

    ConflictCheck {
        exists,
        is_same_file_as_source,
        duplicates: find_duplicates(source, target, library_files, numbering).await,
    }
}
