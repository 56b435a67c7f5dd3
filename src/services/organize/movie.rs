//! Movie strategy: place a file under a user-chosen movie folder

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::conflicts::check_conflicts;
use super::error::{OrganizeError, OrganizeResult};
use super::file_mover::{FileOrganizer, SortOptions};
use super::naming::build_movie_path;
use super::types::{AutoOrganizeOptions, OrganizationResult, OrganizerType};
use crate::services::file_utils::{extension_of, file_stem};

#[derive(Clone)]
pub struct MovieOrganizer {
    files: FileOrganizer,
}

impl MovieOrganizer {
    pub fn new(files: FileOrganizer) -> Self {
        Self { files }
    }

    /// Organize a file as the named movie under `target_folder`.
    ///
    /// Corrections always overwrite: an existing target is replaced and
    /// same-stem videos in the movie folder are removed.
    pub async fn organize_with_correction(
        &self,
        result: &mut OrganizationResult,
        name: &str,
        year: Option<i32>,
        target_folder: &Path,
        options: &AutoOrganizeOptions,
        cancel: &CancellationToken,
    ) -> OrganizeResult<()> {
        let moves_seen = self.files.moves_seen(result.id);
        result.organizer_type = OrganizerType::Movie;

        let name = name.trim();
        if name.is_empty() {
            return Err(OrganizeError::MovieNameNotDetermined(result.original_path.clone()));
        }
        result.extracted_movie_name = Some(name.to_string());
        result.extracted_movie_year = year;

        let source = PathBuf::from(&result.original_path);
        info!(path = %source.display(), target = %target_folder.display(), "Sorting file into movie folder");

        let target = build_movie_path(
            target_folder,
            name,
            year,
            &file_stem(&source),
            &extension_of(&source),
            &options.movie,
        )?;
        result.target_path = Some(target.to_string_lossy().to_string());
        info!(path = %source.display(), target = %target.display(), "Sorting file to new path");

        let claim = self.files.claim(result, moves_seen)?;
        let check = check_conflicts(&source, &target, &[], None).await;
        result.duplicate_paths = check.duplicate_strings();

        let sort = SortOptions {
            copy: options.movie.copy_original_file,
            replace_duplicates: true,
        };
        self.files.perform_file_sorting(result, claim, sort, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::organize::test_support::{file_organizer, touch};
    use crate::services::organize::types::FileSortingStatus;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn result_for(path: &Path) -> OrganizationResult {
        OrganizationResult::new(&path.to_string_lossy(), OrganizerType::Episode, 8)
    }

    #[tokio::test]
    async fn test_movie_moved_into_named_folder() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("downloads").join("Movie.Name.2020.mkv");
        touch(&source, b"movie");
        let movies = dir.path().join("movies");

        let organizer = MovieOrganizer::new(file_organizer());
        let mut result = result_for(&source);
        organizer
            .organize_with_correction(
                &mut result,
                "Movie Name",
                Some(2020),
                &movies,
                &AutoOrganizeOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let expected = movies.join("Movie Name (2020)").join("Movie Name (2020).mkv");
        assert_eq!(result.status, FileSortingStatus::Success);
        assert_eq!(result.organizer_type, OrganizerType::Movie);
        assert_eq!(result.target_path, Some(expected.to_string_lossy().to_string()));
        assert!(expected.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_copy_mode_keeps_original() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Movie.Name.2020.mkv");
        touch(&source, b"movie");

        let mut options = AutoOrganizeOptions::default();
        options.movie.copy_original_file = true;

        let organizer = MovieOrganizer::new(file_organizer());
        let mut result = result_for(&source);
        organizer
            .organize_with_correction(
                &mut result,
                "Movie Name",
                Some(2020),
                &dir.path().join("movies"),
                &options,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status, FileSortingStatus::Success);
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_same_stem_video_is_replaced() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("Movie.Name.2020.mkv");
        touch(&source, b"movie");
        let folder = dir.path().join("movies").join("Movie Name (2020)");
        let old = folder.join("Movie Name (2020).avi");
        touch(&old, b"old");

        let organizer = MovieOrganizer::new(file_organizer());
        let mut result = result_for(&source);
        organizer
            .organize_with_correction(
                &mut result,
                "Movie Name",
                Some(2020),
                &dir.path().join("movies"),
                &AutoOrganizeOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.duplicate_paths, vec![old.to_string_lossy().to_string()]);
        assert!(!old.exists());
        assert!(folder.join("Movie Name (2020).mkv").exists());
    }

    #[tokio::test]
    async fn test_blank_name_fails() {
        let organizer = MovieOrganizer::new(file_organizer());
        let mut result = result_for(Path::new("/downloads/x.mkv"));
        let err = organizer
            .organize_with_correction(
                &mut result,
                "  ",
                None,
                Path::new("/movies"),
                &AutoOrganizeOptions::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, OrganizeError::MovieNameNotDetermined(_));
    }
}
