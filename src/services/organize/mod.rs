//! Automatic media organization
//!
//! Files found in watch locations are parsed, matched against the library,
//! identified with the metadata provider and moved (or copied) into their
//! canonical library path. Every attempt is recorded in the organization
//! ledger, which is the audit trail shown to users.
//!
//! ```text
//! FolderScanner -> OrganizerService -> EpisodeOrganizer / MovieOrganizer
//!                        |                      |
//!                OrganizationLedger       FileOrganizer (+ InProgressTracker)
//! ```

pub mod collaborators;
pub mod conflicts;
pub mod episode;
pub mod episode_identifier;
pub mod error;
pub mod events;
pub mod file_mover;
pub mod ledger;
pub mod leftovers;
pub mod movie;
pub mod naming;
pub mod progress;
pub mod scanner;
pub mod series_matcher;
pub mod service;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use collaborators::{
    ConfigProvider, EpisodeFile, EpisodeMetadata, EpisodeSearch, LibraryIndex, LibraryMonitor, MetadataProvider,
    SeasonFolder, Series,
};
pub use error::{OrganizeError, OrganizeResult};
pub use events::OrganizerEvent;
pub use ledger::{DatePolicy, OrganizationLedger};
pub use progress::{InProgressTracker, ProgressGuard};
pub use scanner::{FolderScanner, ScanSummary};
pub use service::{CorrectionRequest, OrganizerDeps, OrganizerService, SeriesSelection};
pub use types::{
    AutoOrganizeOptions, FileSortingStatus, MovieOptions, OrganizationResult, OrganizerType, QueryResult,
    ResultQuery, SmartMatchInfo, TvOptions,
};
