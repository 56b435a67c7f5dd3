//! Fakes shared by the organizer strategy and service tests

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::collaborators::{EpisodeMetadata, EpisodeSearch, LibraryMonitor, MetadataProvider, Series};
use super::file_mover::FileOrganizer;
use super::progress::InProgressTracker;

/// Answers every search with the same records
#[derive(Default)]
pub struct StaticProvider {
    pub results: Vec<EpisodeMetadata>,
    pub searches: Mutex<Vec<EpisodeSearch>>,
}

impl StaticProvider {
    pub fn titled(season: i32, episode: i32, title: &str) -> Self {
        Self {
            results: vec![EpisodeMetadata {
                name: Some(title.to_string()),
                season_number: Some(season),
                episode_number: Some(episode),
                ..Default::default()
            }],
            ..Default::default()
        }
    }
}

#[async_trait]
impl MetadataProvider for StaticProvider {
    async fn search_episode(&self, search: &EpisodeSearch) -> Result<Vec<EpisodeMetadata>> {
        self.searches.lock().push(search.clone());
        Ok(self.results.clone())
    }
}

#[derive(Default)]
pub struct NullMonitor;

impl LibraryMonitor for NullMonitor {
    fn report_change_beginning(&self, _path: &Path) {}

    fn report_change_complete(&self, _path: &Path, _refresh: bool) {}
}

pub fn file_organizer() -> FileOrganizer {
    let (events, _) = broadcast::channel(64);
    FileOrganizer::new(Arc::new(NullMonitor), InProgressTracker::new(), events)
}

pub fn identified_series(name: &str, root: &Path) -> Series {
    Series {
        id: Uuid::new_v4(),
        name: name.to_string(),
        year: None,
        path: root.join(name),
        provider_ids: BTreeMap::from([("tvmaze".to_string(), "1".to_string())]),
        episodes_without_season_folders: false,
        metadata_language: Some("en".to_string()),
        metadata_country: None,
    }
}

/// Write a small file, creating parent folders
pub fn touch(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
