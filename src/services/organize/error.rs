//! Error types for the organize pipeline
//!
//! The `Display` text of each variant is what ends up in a ledger row's
//! status message, so keep them readable for end users.

use thiserror::Error;
use uuid::Uuid;

pub type OrganizeResult<T> = std::result::Result<T, OrganizeError>;

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Unable to determine series name from {0}")]
    NameNotDetermined(String),

    #[error("Unable to determine movie name from {0}")]
    MovieNameNotDetermined(String),

    #[error("Unable to find series in library matching name {0}")]
    SeriesNotFound(String),

    #[error(
        "Series has not yet been identified: {0}. If you just added the series, please run a library scan or use the identify feature to identify it."
    )]
    SeriesNotIdentified(String),

    #[error("Unable to determine season/episode numbers or aired date from {0}")]
    EpisodeNumbersUndetermined(String),

    #[error("No provider metadata found for {series} - aired date {air_date}")]
    AirDateLookupFailed { series: String, air_date: String },

    #[error(
        "Unable to generate an episode file name shorter than {0} characters to constrain to the max path limit"
    )]
    PathTooLong(usize),

    #[error("Configured episode name pattern is empty")]
    EmptyNamePattern,

    #[error("Unable to sort {0} because target path could not be determined.")]
    TargetPathUndetermined(String),

    #[error("File is currently processed otherwise. Please try again later.")]
    ItemInProgress(Uuid),

    #[error("File was already organized by another request.")]
    AlreadyOrganized(Uuid),

    #[error("Failed to move file from {source_path} to {target_path}: {error}")]
    MoveFailed {
        source_path: String,
        target_path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("Organization cancelled")]
    Cancelled,

    #[error("Organization result not found: {0}")]
    ResultNotFound(Uuid),

    #[error("Series not found: {0}")]
    SeriesIdNotFound(Uuid),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OrganizeError {
    /// Another organize call owns or already finished this result; callers treat this as a no-op
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::ItemInProgress(_) | Self::AlreadyOrganized(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
