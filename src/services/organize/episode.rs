//! Episode strategy: parse, match a library series, identify, place

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::collaborators::{ConfigProvider, LibraryIndex, MetadataProvider, Series};
use super::conflicts::check_conflicts;
use super::episode_identifier::{EpisodeGuess, IdentifiedEpisode, identify};
use super::error::{OrganizeError, OrganizeResult};
use super::file_mover::{FileOrganizer, SortOptions};
use super::naming::{EpisodeNaming, build_episode_path};
use super::series_matcher::find_series;
use super::types::{AutoOrganizeOptions, FileSortingStatus, OrganizationResult, OrganizerType};
use crate::services::file_utils::extension_of;
use crate::services::filename_parser::{parse_episode, parse_movie, parse_name};

/// A correction naming the exact episode a file is
#[derive(Debug, Clone)]
pub struct EpisodeCorrection<'a> {
    pub series: &'a Series,
    pub season: i32,
    pub episode: i32,
    pub ending_episode: Option<i32>,
    pub remember_correction: bool,
}

/// How one sort attempt treats an existing target
#[derive(Debug, Clone, Copy)]
struct SortAttempt {
    overwrite: bool,
    /// Completed moves seen when the attempt started
    moves_seen: u64,
}

#[derive(Clone)]
pub struct EpisodeOrganizer {
    config: Arc<dyn ConfigProvider>,
    metadata: Arc<dyn MetadataProvider>,
    library: Arc<dyn LibraryIndex>,
    files: FileOrganizer,
}

impl EpisodeOrganizer {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        metadata: Arc<dyn MetadataProvider>,
        library: Arc<dyn LibraryIndex>,
        files: FileOrganizer,
    ) -> Self {
        Self {
            config,
            metadata,
            library,
            files,
        }
    }

    /// Organize a freshly discovered file, recording the outcome on `result`.
    ///
    /// Errors are the outcomes the caller records as failures, plus
    /// `ItemInProgress`, `AlreadyOrganized` and `Cancelled` which it must not record.
    pub async fn organize_file(
        &self,
        result: &mut OrganizationResult,
        options: &AutoOrganizeOptions,
        cancel: &CancellationToken,
    ) -> OrganizeResult<()> {
        let moves_seen = self.files.moves_seen(result.id);
        let source = PathBuf::from(&result.original_path);
        result.organizer_type = OrganizerType::Episode;

        if let Some(movie) = parse_movie(&source) {
            result.extracted_movie_name = Some(movie.name);
            result.extracted_movie_year = movie.year;
        }

        let parsed = parse_episode(&source).unwrap_or_default();
        let Some(raw_name) = parsed.series_name.clone().filter(|n| !n.trim().is_empty()) else {
            return Err(OrganizeError::NameNotDetermined(result.original_path.clone()));
        };

        let name = parse_name(&raw_name);
        result.extracted_name = Some(name.name.clone());
        result.extracted_year = name.year;
        result.extracted_season_number = parsed.season;
        result.extracted_episode_number = parsed.episode;
        result.extracted_ending_episode_number = parsed.ending_episode;

        debug!(
            path = %source.display(),
            series = %raw_name,
            season = ?parsed.season,
            episode = ?parsed.episode,
            "Extracted episode information"
        );

        let series = find_series(
            self.library.as_ref(),
            options,
            &name.name,
            name.year,
            &[raw_name.as_str(), name.name.as_str()],
        )
        .await?
        .ok_or_else(|| OrganizeError::SeriesNotFound(raw_name.clone()))?;

        if !series.is_identified() {
            return Err(OrganizeError::SeriesNotIdentified(series.name.clone()));
        }

        let guess = EpisodeGuess {
            season: parsed.season,
            episode: parsed.episode,
            ending_episode: parsed.ending_episode,
            air_date: parsed.air_date(),
        };
        let identified = identify(self.metadata.as_ref(), &series, &guess, &result.original_path, cancel).await?;

        let attempt = SortAttempt {
            overwrite: options.tv.overwrite_existing,
            moves_seen,
        };
        self.sort_episode(result, &series, &identified, options, attempt, cancel)
            .await
    }

    /// Organize a file as the episode the user named. Always overwrites.
    pub async fn organize_with_correction(
        &self,
        result: &mut OrganizationResult,
        correction: &EpisodeCorrection<'_>,
        options: &AutoOrganizeOptions,
        cancel: &CancellationToken,
    ) -> OrganizeResult<()> {
        let moves_seen = self.files.moves_seen(result.id);
        result.organizer_type = OrganizerType::Episode;

        let guess = EpisodeGuess {
            season: Some(correction.season),
            episode: Some(correction.episode),
            ending_episode: correction.ending_episode,
            air_date: None,
        };
        let identified =
            identify(self.metadata.as_ref(), correction.series, &guess, &result.original_path, cancel).await?;

        let attempt = SortAttempt {
            overwrite: true,
            moves_seen,
        };
        self.sort_episode(result, correction.series, &identified, options, attempt, cancel)
            .await?;

        if correction.remember_correction
            && result.status == FileSortingStatus::Success
            && let Some(match_string) = result.extracted_name.clone()
        {
            self.remember_correction(correction.series, &match_string).await?;
        }

        Ok(())
    }

    async fn sort_episode(
        &self,
        result: &mut OrganizationResult,
        series: &Series,
        episode: &IdentifiedEpisode,
        options: &AutoOrganizeOptions,
        attempt: SortAttempt,
        cancel: &CancellationToken,
    ) -> OrganizeResult<()> {
        let source = PathBuf::from(&result.original_path);
        info!(path = %source.display(), series = %series.path.display(), "Sorting file into series");

        let season_folders = self.library.season_folders(series.id).await?;
        let extension = extension_of(&source);
        let naming = EpisodeNaming {
            season: episode.season,
            episode: episode.episode,
            ending_episode: episode.ending_episode,
            title: &episode.title,
            extension: &extension,
        };
        let target = build_episode_path(series, &season_folders, &naming, &options.tv)?;
        result.target_path = Some(target.to_string_lossy().to_string());
        info!(path = %source.display(), target = %target.display(), "Sorting file to new path");

        let claim = self.files.claim(result, attempt.moves_seen)?;
        let library_files = self.library.episode_files(series.id).await?;
        let numbering = (episode.season, episode.episode, episode.ending_episode);
        let check = check_conflicts(&source, &target, &library_files, Some(numbering)).await;
        result.duplicate_paths = check.duplicate_strings();

        if !attempt.overwrite && let Some(message) = check.skip_reason(&source, &target, options.tv.copy_original_file) {
            info!(path = %source.display(), "{}", message);
            result.skip(message);
            return Ok(());
        }

        let sort = SortOptions {
            copy: options.tv.copy_original_file,
            replace_duplicates: attempt.overwrite,
        };
        self.files.perform_file_sorting(result, claim, sort, cancel).await
    }

    /// Add `match_string` to the series' smart-match entry, saving the
    /// options only when it was not already listed.
    async fn remember_correction(&self, series: &Series, match_string: &str) -> OrganizeResult<()> {
        let mut options = self.config.get_auto_organize_options().await?;
        if options.remember_match(series.id, OrganizerType::Episode, &series.name, match_string) {
            info!(series = %series.name, match_string = %match_string, "Remembering series correction");
            self.config.save_auto_organize_options(&options).await?;
        }
        Ok(())
    }
}

/// Library folder for a series created by a correction: "Name (Year)" under the target folder
pub fn new_series_path(target_folder: &Path, name: &str, year: Option<i32>) -> PathBuf {
    let name = crate::services::file_utils::valid_filename(name.trim());
    match year {
        Some(year) => target_folder.join(format!("{} ({})", name, year)),
        None => target_folder.join(name),
    }
}
