//! TVMaze API client for episode metadata
//!
//! TVMaze is a free API that doesn't require authentication.
//! Base URL: https://api.tvmaze.com

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::services::organize::{EpisodeMetadata, EpisodeSearch, MetadataProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.tvmaze.com";

/// TVMaze API client
#[derive(Clone)]
pub struct TvMazeClient {
    client: Client,
    base_url: String,
}

/// Show details from TVMaze, reduced to what lookups need
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvMazeShow {
    pub id: u32,
    pub name: String,
    pub premiered: Option<String>,
    pub externals: Option<TvMazeExternals>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvMazeExternals {
    pub tvrage: Option<u32>,
    pub thetvdb: Option<u32>,
    pub imdb: Option<String>,
}

/// Episode from TVMaze
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvMazeEpisode {
    pub id: u32,
    pub name: String,
    pub season: Option<i32>,
    /// Absent for specials
    pub number: Option<i32>,
    pub airdate: Option<String>,
}

impl TvMazeEpisode {
    pub fn air_date(&self) -> Option<NaiveDate> {
        self.airdate
            .as_ref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    fn into_metadata(self, ending_episode: Option<i32>) -> EpisodeMetadata {
        let air_date = self.air_date();
        EpisodeMetadata {
            name: Some(self.name).filter(|n| !n.trim().is_empty()),
            season_number: self.season,
            episode_number: self.number,
            ending_episode_number: ending_episode,
            air_date,
        }
    }
}

/// How a series' provider ids identify it on TVMaze
#[derive(Debug, Clone, PartialEq, Eq)]
enum ShowRef {
    TvMaze(u32),
    TheTvdb(String),
    Imdb(String),
}

fn show_ref(provider_ids: &BTreeMap<String, String>) -> Option<ShowRef> {
    let get = |key: &str| {
        provider_ids
            .iter()
            .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    };

    if let Some(id) = get("tvmaze").and_then(|v| v.parse().ok()) {
        return Some(ShowRef::TvMaze(id));
    }
    if let Some(id) = get("tvdb").or_else(|| get("thetvdb")) {
        return Some(ShowRef::TheTvdb(id));
    }
    get("imdb").map(ShowRef::Imdb)
}

impl TvMazeClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, Duration::from_secs(30))
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("autoorganize/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send a request; 404 means "no such record" and is `None`
    async fn fetch<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<Option<T>> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to fetch {} from TVMaze", what))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            anyhow::bail!("TVMaze {} request failed with status: {}", what, response.status());
        }

        let value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse TVMaze {}", what))?;
        Ok(Some(value))
    }

    /// Look up a show by an external id (`thetvdb` or `imdb`)
    pub async fn lookup_show(&self, key: &str, value: &str) -> Result<Option<TvMazeShow>> {
        debug!(key = %key, value = %value, "Looking up TVMaze show");
        let url = format!("{}/lookup/shows", self.base_url);
        self.fetch(self.client.get(&url).query(&[(key, value)]), "show lookup")
            .await
    }

    async fn resolve_show_id(&self, provider_ids: &BTreeMap<String, String>) -> Result<Option<u32>> {
        let show = match show_ref(provider_ids) {
            Some(ShowRef::TvMaze(id)) => return Ok(Some(id)),
            Some(ShowRef::TheTvdb(id)) => self.lookup_show("thetvdb", &id).await?,
            Some(ShowRef::Imdb(id)) => self.lookup_show("imdb", &id).await?,
            None => None,
        };
        Ok(show.map(|s| s.id))
    }

    pub async fn episode_by_number(&self, show_id: u32, season: i32, episode: i32) -> Result<Option<TvMazeEpisode>> {
        let url = format!("{}/shows/{}/episodebynumber", self.base_url, show_id);
        let query = [("season", season.to_string()), ("number", episode.to_string())];
        self.fetch(self.client.get(&url).query(&query), "episode").await
    }

    pub async fn episodes_by_date(&self, show_id: u32, date: NaiveDate) -> Result<Vec<TvMazeEpisode>> {
        let url = format!("{}/shows/{}/episodesbydate", self.base_url, show_id);
        let query = [("date", date.format("%Y-%m-%d").to_string())];
        Ok(self
            .fetch(self.client.get(&url).query(&query), "episodes by date")
            .await?
            .unwrap_or_default())
    }
}

impl Default for TvMazeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for TvMazeClient {
    async fn search_episode(&self, search: &EpisodeSearch) -> Result<Vec<EpisodeMetadata>> {
        let Some(show_id) = self.resolve_show_id(&search.series_provider_ids).await? else {
            debug!(series = %search.series_name, "Series has no id TVMaze can resolve");
            return Ok(Vec::new());
        };

        if let (Some(season), Some(episode)) = (search.season_number, search.episode_number) {
            info!(show_id, season, episode, "Fetching episode from TVMaze");
            let found = self.episode_by_number(show_id, season, episode).await?;
            return Ok(found
                .map(|e| e.into_metadata(search.ending_episode_number))
                .into_iter()
                .collect());
        }

        if let Some(air_date) = search.air_date {
            info!(show_id, %air_date, "Fetching episodes by air date from TVMaze");
            let episodes = self.episodes_by_date(show_id, air_date).await?;
            return Ok(episodes.into_iter().map(|e| e.into_metadata(None)).collect());
        }

        Ok(Vec::new())
    }
}
