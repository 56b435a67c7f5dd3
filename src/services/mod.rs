//! Organizer pipeline and its external integrations

pub mod file_utils;
pub mod filename_parser;
pub mod library_monitor;
pub mod organize;
pub mod text_utils;
pub mod tvmaze;

pub use library_monitor::{FileChangeSuppressor, LibraryChange};
pub use organize::{FolderScanner, OrganizerDeps, OrganizerService};
pub use tvmaze::TvMazeClient;
