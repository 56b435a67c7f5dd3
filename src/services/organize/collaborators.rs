//! Contracts for the systems the organizer depends on but does not own:
//! options storage, the metadata provider, the library catalog and the
//! file-change notifier.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::types::AutoOrganizeOptions;

/// A series known to the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: Uuid,
    pub name: String,
    pub year: Option<i32>,
    pub path: PathBuf,
    /// Provider name (`tvmaze`, `tvdb`, `imdb`, ...) to provider id
    pub provider_ids: BTreeMap<String, String>,
    /// Episodes sit directly in the series folder
    pub episodes_without_season_folders: bool,
    pub metadata_language: Option<String>,
    pub metadata_country: Option<String>,
}

impl Series {
    pub fn is_identified(&self) -> bool {
        self.provider_ids.values().any(|v| !v.trim().is_empty())
    }
}

/// A season folder that exists on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonFolder {
    pub season_number: i32,
    pub path: PathBuf,
}

/// An episode the library knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeFile {
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub ending_episode_number: Option<i32>,
    pub path: PathBuf,
    /// Placeholder entries (missing/remote episodes) have no file behind them
    pub is_virtual: bool,
}

/// Criteria for an episode lookup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeSearch {
    pub series_name: String,
    pub series_provider_ids: BTreeMap<String, String>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub ending_episode_number: Option<i32>,
    pub air_date: Option<NaiveDate>,
    pub language: Option<String>,
    pub country: Option<String>,
}

impl EpisodeSearch {
    pub fn for_series(series: &Series) -> Self {
        Self {
            series_name: series.name.clone(),
            series_provider_ids: series.provider_ids.clone(),
            language: series.metadata_language.clone(),
            country: series.metadata_country.clone(),
            ..Default::default()
        }
    }
}

/// Episode record returned by a metadata provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub name: Option<String>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub ending_episode_number: Option<i32>,
    pub air_date: Option<NaiveDate>,
}

/// Storage for [AutoOrganizeOptions]
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn get_auto_organize_options(&self) -> Result<AutoOrganizeOptions>;

    async fn save_auto_organize_options(&self, options: &AutoOrganizeOptions) -> Result<()>;
}

/// Remote episode metadata. The first result is authoritative.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn search_episode(&self, search: &EpisodeSearch) -> Result<Vec<EpisodeMetadata>>;
}

/// The library catalog
#[async_trait]
pub trait LibraryIndex: Send + Sync {
    async fn list_series(&self) -> Result<Vec<Series>>;

    async fn get_series(&self, id: Uuid) -> Result<Option<Series>>;

    async fn season_folders(&self, series_id: Uuid) -> Result<Vec<SeasonFolder>>;

    async fn episode_files(&self, series_id: Uuid) -> Result<Vec<EpisodeFile>>;

    /// Persist a series created from a correction request
    async fn register_series(&self, _series: &Series) -> Result<()> {
        Ok(())
    }
}

/// Notified around every file mutation so a watcher does not treat the
/// organizer's own writes as external changes.
pub trait LibraryMonitor: Send + Sync {
    fn report_change_beginning(&self, path: &Path);

    fn report_change_complete(&self, path: &Path, refresh: bool);
}
