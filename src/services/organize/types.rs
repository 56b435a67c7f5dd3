//! Ledger records and auto-organize options

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which organizer strategy handled (or should handle) a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrganizerType {
    Episode,
    Movie,
}

impl OrganizerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episode => "episode",
            Self::Movie => "movie",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "movie" => Self::Movie,
            _ => Self::Episode,
        }
    }
}

/// Outcome of one organize attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileSortingStatus {
    Success,
    Failure,
    SkippedExisting,
}

impl FileSortingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::SkippedExisting => "skipped_existing",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "skipped_existing" => Self::SkippedExisting,
            _ => Self::Failure,
        }
    }
}

/// Current time at the microsecond precision the ledger stores
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Stable ledger id for a source path.
///
/// The same file presented on the next scan maps to the same row.
pub fn result_id_for_path(path: &str) -> Uuid {
    Uuid::from_bytes(md5::compute(path.as_bytes()).0)
}

/// One row of the organization ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationResult {
    pub id: Uuid,
    /// Last-touched timestamp; the log is ordered by it
    pub date: DateTime<Utc>,
    pub original_path: String,
    pub original_file_name: String,
    pub file_size_bytes: i64,
    pub organizer_type: OrganizerType,
    pub extracted_name: Option<String>,
    pub extracted_year: Option<i32>,
    pub extracted_season_number: Option<i32>,
    pub extracted_episode_number: Option<i32>,
    pub extracted_ending_episode_number: Option<i32>,
    /// Movie guess kept alongside the episode guess so a correction can be pre-filled
    pub extracted_movie_name: Option<String>,
    pub extracted_movie_year: Option<i32>,
    pub target_path: Option<String>,
    pub duplicate_paths: Vec<String>,
    pub status: FileSortingStatus,
    pub status_message: String,
}

impl OrganizationResult {
    pub fn new(original_path: &str, organizer_type: OrganizerType, file_size_bytes: i64) -> Self {
        let original_file_name = std::path::Path::new(original_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| original_path.to_string());

        Self {
            id: result_id_for_path(original_path),
            date: now(),
            original_path: original_path.to_string(),
            original_file_name,
            file_size_bytes,
            organizer_type,
            extracted_name: None,
            extracted_year: None,
            extracted_season_number: None,
            extracted_episode_number: None,
            extracted_ending_episode_number: None,
            extracted_movie_name: None,
            extracted_movie_year: None,
            target_path: None,
            duplicate_paths: Vec::new(),
            status: FileSortingStatus::Success,
            status_message: String::new(),
        }
    }

    pub fn succeed(&mut self) {
        self.status = FileSortingStatus::Success;
        self.status_message.clear();
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = FileSortingStatus::Failure;
        self.status_message = message.into();
    }

    pub fn skip(&mut self, message: impl Into<String>) {
        self.status = FileSortingStatus::SkippedExisting;
        self.status_message = message.into();
    }
}

/// A remembered mapping from raw extracted names to a confirmed series or movie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartMatchInfo {
    pub id: Uuid,
    pub organizer_type: OrganizerType,
    pub name: String,
    #[serde(default)]
    pub match_strings: Vec<String>,
}

impl SmartMatchInfo {
    pub fn new(id: Uuid, organizer_type: OrganizerType, name: impl Into<String>) -> Self {
        Self {
            id,
            organizer_type,
            name: name.into(),
            match_strings: Vec::new(),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.match_strings.iter().any(|s| s.to_lowercase() == value)
    }

    /// Append a match string unless already present (case-insensitive).
    /// Returns whether the list changed.
    pub fn add_match(&mut self, value: &str) -> bool {
        if value.trim().is_empty() || self.matches(value) {
            return false;
        }
        self.match_strings.push(value.to_string());
        true
    }
}

/// TV sub-options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TvOptions {
    pub season_folder_pattern: String,
    pub season_zero_folder_name: String,
    pub episode_name_pattern: String,
    pub multi_episode_name_pattern: String,
    pub copy_original_file: bool,
    pub overwrite_existing: bool,
}

impl Default for TvOptions {
    fn default() -> Self {
        Self {
            season_folder_pattern: "Season %0s".to_string(),
            season_zero_folder_name: "Specials".to_string(),
            episode_name_pattern: "%sn S%0sE%0e %en.%ext".to_string(),
            multi_episode_name_pattern: "%sn S%0sE%0e-E%0ed %en.%ext".to_string(),
            copy_original_file: false,
            overwrite_existing: false,
        }
    }
}

/// Movie sub-options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MovieOptions {
    pub folder_pattern: String,
    pub file_name_pattern: String,
    pub copy_original_file: bool,
}

impl Default for MovieOptions {
    fn default() -> Self {
        Self {
            folder_pattern: "%fn".to_string(),
            file_name_pattern: "%fn.%ext".to_string(),
            copy_original_file: false,
        }
    }
}

/// Global auto-organize options, persisted by the [ConfigProvider](super::ConfigProvider)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoOrganizeOptions {
    pub enabled: bool,
    pub watch_locations: Vec<String>,
    /// Extension allow-list without dots; empty means every video file
    pub extensions: Vec<String>,
    pub min_file_size_mb: u64,
    /// Files modified more recently than this are assumed to still be downloading
    pub min_file_age_secs: u64,
    pub leftover_file_extensions_to_delete: Vec<String>,
    pub delete_empty_folders: bool,
    pub tv: TvOptions,
    pub movie: MovieOptions,
    pub smart_match_infos: Vec<SmartMatchInfo>,
}

impl Default for AutoOrganizeOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            watch_locations: Vec::new(),
            extensions: Vec::new(),
            min_file_size_mb: 50,
            min_file_age_secs: 60,
            leftover_file_extensions_to_delete: Vec::new(),
            delete_empty_folders: false,
            tv: TvOptions::default(),
            movie: MovieOptions::default(),
            smart_match_infos: Vec::new(),
        }
    }
}

impl AutoOrganizeOptions {
    /// First smart-match entry of the given type listing any of the candidate strings
    pub fn find_smart_match(
        &self,
        organizer_type: OrganizerType,
        candidates: &[&str],
    ) -> Option<&SmartMatchInfo> {
        self.smart_match_infos.iter().find(|info| {
            info.organizer_type == organizer_type
                && candidates.iter().any(|c| !c.is_empty() && info.matches(c))
        })
    }

    /// Record `match_string` for the given series/movie, creating the entry if absent.
    /// Returns whether the options changed and need saving.
    pub fn remember_match(
        &mut self,
        id: Uuid,
        organizer_type: OrganizerType,
        name: &str,
        match_string: &str,
    ) -> bool {
        if match_string.trim().is_empty() {
            return false;
        }

        let index = match self
            .smart_match_infos
            .iter()
            .position(|i| i.id == id && i.organizer_type == organizer_type)
        {
            Some(index) => index,
            None => {
                self.smart_match_infos
                    .push(SmartMatchInfo::new(id, organizer_type, name));
                self.smart_match_infos.len() - 1
            }
        };

        self.smart_match_infos[index].add_match(match_string)
    }
}

/// Paging for the ledger listing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultQuery {
    pub start_index: Option<u32>,
    pub limit: Option<u32>,
}

/// One page of ledger rows
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult<T> {
    pub items: Vec<T>,
    pub total_record_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_id_is_stable_per_path() {
        let a = result_id_for_path("/downloads/Show.S01E01.mkv");
        let b = result_id_for_path("/downloads/Show.S01E01.mkv");
        let c = result_id_for_path("/downloads/Show.S01E02.mkv");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_new_result_extracts_file_name() {
        let result = OrganizationResult::new("/downloads/tv/Show.S01E01.mkv", OrganizerType::Episode, 10);
        assert_eq!(result.original_file_name, "Show.S01E01.mkv");
        assert_eq!(result.id, result_id_for_path("/downloads/tv/Show.S01E01.mkv"));
        assert!(result.duplicate_paths.is_empty());
    }

    #[test]
    fn test_smart_match_add_is_case_insensitive() {
        let mut info = SmartMatchInfo::new(Uuid::new_v4(), OrganizerType::Episode, "Foo Bar");
        assert!(info.add_match("foo bar"));
        assert!(!info.add_match("FOO BAR"));
        assert!(!info.add_match("  "));
        assert_eq!(info.match_strings, vec!["foo bar".to_string()]);
    }

    #[test]
    fn test_remember_match_creates_entry_once() {
        let mut options = AutoOrganizeOptions::default();
        let id = Uuid::new_v4();
        assert!(options.remember_match(id, OrganizerType::Episode, "Series X", "Foo Bar"));
        assert!(!options.remember_match(id, OrganizerType::Episode, "Series X", "foo bar"));
        assert!(options.remember_match(id, OrganizerType::Episode, "Series X", "Foo Bar US"));
        assert_eq!(options.smart_match_infos.len(), 1);
        assert_eq!(options.smart_match_infos[0].match_strings.len(), 2);

        let found = options.find_smart_match(OrganizerType::Episode, &["FOO BAR"]);
        assert_eq!(found.map(|i| i.id), Some(id));
        assert!(options.find_smart_match(OrganizerType::Movie, &["Foo Bar"]).is_none());
    }

    #[test]
    fn test_options_deserialize_with_missing_fields() {
        let options: AutoOrganizeOptions =
            serde_json::from_str(r#"{"enabled":true,"tv":{"copyOriginalFile":true}}"#).unwrap();
        assert!(options.enabled);
        assert!(options.tv.copy_original_file);
        assert_eq!(options.tv.season_folder_pattern, "Season %0s");
        assert_eq!(options.movie.file_name_pattern, "%fn.%ext");
    }
}
