//! Confirm episode numbering and fetch the episode title from the metadata provider

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::collaborators::{EpisodeMetadata, EpisodeSearch, MetadataProvider, Series};
use super::error::{OrganizeError, OrganizeResult};

/// Numbering as guessed from the file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeGuess {
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub ending_episode: Option<i32>,
    pub air_date: Option<NaiveDate>,
}

/// Numbering the file will be placed under
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifiedEpisode {
    pub season: i32,
    pub episode: i32,
    pub ending_episode: Option<i32>,
    /// Empty when the provider has no record
    pub title: String,
}

/// Identify an episode of `series`.
///
/// With season and episode numbers the numbering is trusted and a missing
/// provider record only means an empty title. With only an air date the
/// provider must supply the numbers.
pub async fn identify(
    provider: &dyn MetadataProvider,
    series: &Series,
    guess: &EpisodeGuess,
    source_name: &str,
    cancel: &CancellationToken,
) -> OrganizeResult<IdentifiedEpisode> {
    if let (Some(season), Some(episode)) = (guess.season, guess.episode) {
        let search = EpisodeSearch {
            season_number: Some(season),
            episode_number: Some(episode),
            ending_episode_number: guess.ending_episode,
            ..EpisodeSearch::for_series(series)
        };

        let found = search_first(provider, &search, cancel).await?;
        if found.is_none() {
            info!(
                series = %series.name,
                season,
                episode,
                "No provider record for episode, continuing without a title"
            );
        }

        let found = found.unwrap_or_default();
        return Ok(IdentifiedEpisode {
            season: found.season_number.unwrap_or(season),
            episode: found.episode_number.unwrap_or(episode),
            ending_episode: guess.ending_episode.or(found.ending_episode_number),
            title: found.name.unwrap_or_default(),
        });
    }

    if let Some(air_date) = guess.air_date {
        let search = EpisodeSearch {
            air_date: Some(air_date),
            ..EpisodeSearch::for_series(series)
        };

        let found = search_first(provider, &search, cancel).await?;
        let lookup_failed = || OrganizeError::AirDateLookupFailed {
            series: series.name.clone(),
            air_date: air_date.format("%Y-%m-%d").to_string(),
        };

        let found = found.ok_or_else(lookup_failed)?;
        let (Some(season), Some(episode)) = (found.season_number, found.episode_number) else {
            return Err(lookup_failed());
        };

        debug!(series = %series.name, %air_date, season, episode, "Resolved episode by air date");
        return Ok(IdentifiedEpisode {
            season,
            episode,
            ending_episode: found.ending_episode_number,
            title: found.name.unwrap_or_default(),
        });
    }

    Err(OrganizeError::EpisodeNumbersUndetermined(source_name.to_string()))
}

async fn search_first(
    provider: &dyn MetadataProvider,
    search: &EpisodeSearch,
    cancel: &CancellationToken,
) -> OrganizeResult<Option<EpisodeMetadata>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OrganizeError::Cancelled),
        results = provider.search_episode(search) => Ok(results?.into_iter().next()),
    }
}
