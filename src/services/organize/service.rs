//! Organizer service
//!
//! Owns the ledger, the in-progress tracker and the two strategies, and
//! turns each organize attempt into exactly one ledger outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::collaborators::{ConfigProvider, LibraryIndex, LibraryMonitor, MetadataProvider, Series};
use super::episode::{EpisodeCorrection, EpisodeOrganizer, new_series_path};
use super::error::{OrganizeError, OrganizeResult};
use super::events::{EventSender, OrganizerEvent};
use super::file_mover::FileOrganizer;
use super::leftovers::{CleanupSummary, clean_folder};
use super::ledger::{DatePolicy, OrganizationLedger};
use super::movie::MovieOrganizer;
use super::progress::InProgressTracker;
use super::types::{AutoOrganizeOptions, OrganizationResult, OrganizerType, QueryResult, ResultQuery};
use crate::db::Database;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything the organizer needs from the rest of the application
#[derive(Clone)]
pub struct OrganizerDeps {
    pub db: Database,
    pub config: Arc<dyn ConfigProvider>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub library: Arc<dyn LibraryIndex>,
    pub monitor: Arc<dyn LibraryMonitor>,
}

/// The series a manual episode correction points at
#[derive(Debug, Clone)]
pub enum SeriesSelection {
    Existing(Uuid),
    /// A series not yet in the library; it is registered under
    /// `target_folder` as "Name (Year)"
    New {
        name: String,
        year: Option<i32>,
        provider_ids: BTreeMap<String, String>,
        target_folder: PathBuf,
    },
}

/// A user's correction of an existing ledger row
#[derive(Debug, Clone)]
pub enum CorrectionRequest {
    Episode {
        result_id: Uuid,
        series: SeriesSelection,
        season: i32,
        episode: i32,
        ending_episode: Option<i32>,
        remember_correction: bool,
    },
    Movie {
        result_id: Uuid,
        name: String,
        year: Option<i32>,
        target_folder: PathBuf,
    },
}

impl CorrectionRequest {
    pub fn result_id(&self) -> Uuid {
        match self {
            Self::Episode { result_id, .. } | Self::Movie { result_id, .. } => *result_id,
        }
    }
}

pub struct OrganizerService {
    config: Arc<dyn ConfigProvider>,
    library: Arc<dyn LibraryIndex>,
    ledger: OrganizationLedger,
    files: FileOrganizer,
    episodes: EpisodeOrganizer,
    movies: MovieOrganizer,
    events: EventSender,
}

impl OrganizerService {
    pub fn new(deps: OrganizerDeps) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let files = FileOrganizer::new(deps.monitor, InProgressTracker::new(), events.clone());

        Self {
            ledger: OrganizationLedger::new(deps.db.organization_results(), events.clone()),
            episodes: EpisodeOrganizer::new(
                deps.config.clone(),
                deps.metadata,
                deps.library.clone(),
                files.clone(),
            ),
            movies: MovieOrganizer::new(files.clone()),
            config: deps.config,
            library: deps.library,
            files,
            events,
        }
    }

    /// Current auto-organize options
    pub async fn options(&self) -> OrganizeResult<AutoOrganizeOptions> {
        Ok(self.config.get_auto_organize_options().await?)
    }

    pub async fn save_options(&self, options: &AutoOrganizeOptions) -> OrganizeResult<()> {
        self.config.save_auto_organize_options(options).await?;
        info!(
            enabled = options.enabled,
            watch_locations = options.watch_locations.len(),
            "Saved auto-organize options"
        );
        Ok(())
    }

    /// Organize a file found in a watch location.
    ///
    /// Returns the recorded result. When another call is moving the file, or
    /// already moved it while this call was identifying it, nothing is
    /// recorded and the stored result is returned.
    pub async fn organize_file(&self, path: &Path, cancel: &CancellationToken) -> OrganizeResult<OrganizationResult> {
        let options = self.options().await?;
        let source = path.to_string_lossy().to_string();
        let size = tokio::fs::metadata(path)
            .await
            .map(|m| i64::try_from(m.len()).unwrap_or(i64::MAX))
            .unwrap_or(0);

        let mut result = OrganizationResult::new(&source, OrganizerType::Episode, size);

        match self.episodes.organize_file(&mut result, &options, cancel).await {
            Ok(()) => {}
            Err(e) if e.is_in_progress() => {
                debug!(path = %source, error = %e, "File is handled by another call");
                return Ok(self.ledger.get_result(result.id).await?.unwrap_or(result));
            }
            Err(OrganizeError::Cancelled) => return Err(OrganizeError::Cancelled),
            Err(e) => {
                warn!(path = %source, error = %e, "Failed to organize file");
                result.fail(e.to_string());
            }
        }

        self.ledger.save(&mut result, DatePolicy::AdvanceOnSuccess).await?;
        Ok(result)
    }

    /// Re-organize a ledger row as the series episode or movie the user named.
    /// The row keeps its place in the log.
    pub async fn organize_with_correction(
        &self,
        request: CorrectionRequest,
        cancel: &CancellationToken,
    ) -> OrganizeResult<OrganizationResult> {
        let result_id = request.result_id();
        let previous = self
            .ledger
            .get_result(result_id)
            .await?
            .ok_or(OrganizeError::ResultNotFound(result_id))?;
        let options = self.options().await?;
        let mut result = previous.clone();
        let source_folder = Path::new(&result.original_path).parent().map(Path::to_path_buf);
        let source_existed = Path::new(&result.original_path).exists();

        let outcome = match &request {
            CorrectionRequest::Episode {
                series,
                season,
                episode,
                ending_episode,
                remember_correction,
                ..
            } => {
                let series = self.resolve_series(series).await?;
                info!(result_id = %result_id, series = %series.name, season, episode, "Applying episode correction");
                let correction = EpisodeCorrection {
                    series: &series,
                    season: *season,
                    episode: *episode,
                    ending_episode: *ending_episode,
                    remember_correction: *remember_correction,
                };
                self.episodes
                    .organize_with_correction(&mut result, &correction, &options, cancel)
                    .await
            }
            CorrectionRequest::Movie {
                name,
                year,
                target_folder,
                ..
            } => {
                info!(result_id = %result_id, movie = %name, "Applying movie correction");
                self.movies
                    .organize_with_correction(&mut result, name, *year, target_folder, &options, cancel)
                    .await
            }
        };

        match outcome {
            Ok(()) => {}
            Err(e) if e.is_in_progress() => {
                debug!(result_id = %result_id, error = %e, "Result is handled by another call");
                return Ok(self.ledger.get_result(result_id).await?.unwrap_or(previous));
            }
            Err(OrganizeError::Cancelled) => return Err(OrganizeError::Cancelled),
            Err(e) => {
                warn!(result_id = %result_id, error = %e, "Failed to apply correction");
                result.fail(e.to_string());
            }
        }

        self.ledger.save(&mut result, DatePolicy::Preserve).await?;

        if source_existed && let Some(folder) = source_folder {
            clean_folder(&self.files, &options, &folder).await;
        }

        Ok(result)
    }

    async fn resolve_series(&self, selection: &SeriesSelection) -> OrganizeResult<Series> {
        match selection {
            SeriesSelection::Existing(id) => self
                .library
                .get_series(*id)
                .await?
                .ok_or(OrganizeError::SeriesIdNotFound(*id)),
            SeriesSelection::New {
                name,
                year,
                provider_ids,
                target_folder,
            } => {
                let series = Series {
                    id: Uuid::new_v4(),
                    name: name.trim().to_string(),
                    year: *year,
                    path: new_series_path(target_folder, name, *year),
                    provider_ids: provider_ids.clone(),
                    episodes_without_season_folders: false,
                    metadata_language: None,
                    metadata_country: None,
                };
                info!(series = %series.name, path = %series.path.display(), "Registering new series");
                self.library.register_series(&series).await?;
                Ok(series)
            }
        }
    }

    pub async fn get_results(&self, query: ResultQuery) -> OrganizeResult<QueryResult<OrganizationResult>> {
        Ok(self.ledger.get_results(query).await?)
    }

    pub async fn get_result(&self, id: Uuid) -> OrganizeResult<OrganizationResult> {
        self.ledger
            .get_result(id)
            .await?
            .ok_or(OrganizeError::ResultNotFound(id))
    }

    pub async fn clear_log(&self) -> OrganizeResult<u64> {
        let removed = self.ledger.clear().await?;
        info!(removed, "Cleared organization log");
        Ok(removed)
    }

    /// Delete a row's source file, then the row
    pub async fn delete_original_file(&self, id: Uuid) -> OrganizeResult<()> {
        let result = self.get_result(id).await?;
        let path = Path::new(&result.original_path);

        match self.files.delete_file(path, true).await {
            Ok(()) => info!(path = %path.display(), "Deleted original file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Original file already gone");
            }
            Err(e) => return Err(e.into()),
        }

        self.ledger.delete(id).await?;
        Ok(())
    }

    /// Leftover and empty-folder cleanup for one folder
    pub async fn clean_folder(&self, options: &AutoOrganizeOptions, folder: &Path) -> CleanupSummary {
        clean_folder(&self.files, options, folder).await
    }

    pub fn in_progress_ids(&self) -> Vec<Uuid> {
        self.files.tracker().ids()
    }

    pub fn tracker(&self) -> &InProgressTracker {
        self.files.tracker()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OrganizerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::organize::test_support::{NullMonitor, StaticProvider, identified_series, touch};
    use crate::services::organize::types::FileSortingStatus;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    async fn service(provider: StaticProvider) -> (OrganizerService, Database) {
        let db = Database::connect_in_memory().await.unwrap();
        let service = OrganizerService::new(OrganizerDeps {
            db: db.clone(),
            config: Arc::new(db.settings()),
            metadata: Arc::new(provider),
            library: Arc::new(db.library()),
            monitor: Arc::new(NullMonitor),
        });
        (service, db)
    }

    #[tokio::test]
    async fn test_failure_is_recorded_once() {
        let (service, _db) = service(StaticProvider::default()).await;
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Unknown.Show.S01E01.mkv");
        touch(&source, b"x");

        let first = service.organize_file(&source, &CancellationToken::new()).await.unwrap();
        assert_eq!(first.status, FileSortingStatus::Failure);
        assert_eq!(first.status_message, "Unable to find series in library matching name Unknown Show");

        let mut rx = service.subscribe();
        let second = service.organize_file(&source, &CancellationToken::new()).await.unwrap();
        assert_eq!(second.date, first.date);
        assert!(rx.try_recv().is_err());

        let page = service.get_results(ResultQuery::default()).await.unwrap();
        assert_eq!(page.total_record_count, 1);
    }

    #[tokio::test]
    async fn test_held_result_returns_previous() {
        let (service, db) = service(StaticProvider::default()).await;
        let dir = TempDir::new().unwrap();
        let series = identified_series("Show", &dir.path().join("tv"));
        db.library().create_series(&series).await.unwrap();
        let source = dir.path().join("Show.S01E01.mkv");
        touch(&source, b"x");

        let id = crate::services::organize::types::result_id_for_path(&source.to_string_lossy());
        let _guard = service.tracker().try_begin(id).unwrap();
        assert_eq!(service.in_progress_ids(), vec![id]);

        let result = service.organize_file(&source, &CancellationToken::new()).await.unwrap();
        assert_eq!(result.id, id);
        assert!(source.exists());
        assert!(service.get_result(id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_calls_keep_the_winning_move() {
        for _ in 0..10 {
            let (service, db) = service(StaticProvider::titled(1, 1, "Pilot")).await;
            let dir = TempDir::new().unwrap();
            let series = identified_series("Show", &dir.path().join("tv"));
            db.library().create_series(&series).await.unwrap();
            let source = dir.path().join("Show.S01E01.mkv");
            touch(&source, &vec![7u8; 4 * 1024 * 1024]);

            let cancel = CancellationToken::new();
            let (first, second) = tokio::join!(
                service.organize_file(&source, &cancel),
                service.organize_file(&source, &cancel)
            );
            let (first, second) = (first.unwrap(), second.unwrap());
            assert!(first.status == FileSortingStatus::Success || second.status == FileSortingStatus::Success);

            let stored = service.get_result(first.id).await.unwrap();
            assert_eq!(stored.status, FileSortingStatus::Success);
            let target = PathBuf::from(stored.target_path.unwrap());
            assert!(target.exists());
            assert!(!source.exists());
            assert_eq!(
                service.get_results(ResultQuery::default()).await.unwrap().total_record_count,
                1
            );
            assert!(service.in_progress_ids().is_empty());
        }
    }

    #[tokio::test]
    async fn test_correction_with_new_series() {
        let (service, db) = service(StaticProvider::titled(1, 4, "Four")).await;
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads").join("Foo.Bar.S01E04.mkv");
        touch(&source, b"x");

        let failed = service.organize_file(&source, &CancellationToken::new()).await.unwrap();
        assert_eq!(failed.status, FileSortingStatus::Failure);

        let request = CorrectionRequest::Episode {
            result_id: failed.id,
            series: SeriesSelection::New {
                name: "Foo Bar".to_string(),
                year: Some(2019),
                provider_ids: BTreeMap::from([("tvmaze".to_string(), "7".to_string())]),
                target_folder: dir.path().join("tv"),
            },
            season: 1,
            episode: 4,
            ending_episode: None,
            remember_correction: true,
        };
        let corrected = service
            .organize_with_correction(request, &CancellationToken::new())
            .await
            .unwrap();

        let expected = dir
            .path()
            .join("tv")
            .join("Foo Bar (2019)")
            .join("Season 01")
            .join("Foo Bar S01E04 Four.mkv");
        assert_eq!(corrected.status, FileSortingStatus::Success);
        assert_eq!(corrected.date, failed.date);
        assert!(expected.exists());
        assert_eq!(db.library().list_series().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let (service, _db) = service(StaticProvider::default()).await;
        let missing = Uuid::new_v4();

        assert_matches!(service.get_result(missing).await, Err(OrganizeError::ResultNotFound(id)) if id == missing);
        assert_matches!(
            service.delete_original_file(missing).await,
            Err(OrganizeError::ResultNotFound(_))
        );
    }

    #[tokio::test]
    async fn test_delete_original_file_removes_row() {
        let (service, _db) = service(StaticProvider::default()).await;
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Nothing.S01E01.mkv");
        touch(&source, b"x");

        let result = service.organize_file(&source, &CancellationToken::new()).await.unwrap();
        service.delete_original_file(result.id).await.unwrap();

        assert!(!source.exists());
        assert!(service.get_result(result.id).await.is_err());
    }
}
