use chrono::NaiveDate;
use louvor_types::{SlotPosition, SongId};
use thiserror::Error;
use uuid::Uuid;

/// Failures raised by the store collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("repertoire slot {0} not found")]
    SlotNotFound(Uuid),

    #[error("roster entries already stored for {year}")]
    YearNotEmpty { year: i32 },

    /// Saving a featured song while another one already carries the flag.
    #[error("song {existing} is already the featured song of the week")]
    FeaturedConflict { existing: SongId },

    /// The stored data violates a catalog-wide invariant.
    #[error("catalog integrity violation: {0}")]
    Integrity(String),
}

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("group size must be at least 1")]
    InvalidGroupSize,

    #[error("rotating pool too small: groups of {required} need at least {required} members, {available} available")]
    InsufficientPool { required: usize, available: usize },

    #[error("member '{0}' appears more than once in the roster configuration")]
    DuplicateMember(String),

    #[error("date {0} appears more than once in one generation run")]
    DuplicateDate(NaiveDate),

    #[error("invalid year {year}: must be {min} or later")]
    InvalidYear { year: i32, min: i32 },

    #[error("roster entries already exist for {year}; delete them before generating again")]
    YearAlreadyGenerated { year: i32 },

    #[error("no Sundays could be computed for {year}")]
    NoSundays { year: i32 },

    /// Internal invariant violation on a generated entry.
    #[error("malformed roster entry for {date}: {reason}")]
    MalformedEntry { date: NaiveDate, reason: String },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RosterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::YearNotEmpty { year } => RosterError::YearAlreadyGenerated { year },
            other => RosterError::Store(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum RepertoireError {
    #[error("not enough songs to build the repertoire: required={required}, available={available}")]
    InsufficientCatalog { required: usize, available: usize },

    #[error("{} songs are flagged as featured this week: {}", ids.len(), join_ids(ids))]
    MultipleFeatured { ids: Vec<SongId> },

    #[error("a repertoire needs exactly {expected} songs, got {actual}")]
    WrongSongCount { expected: usize, actual: usize },

    #[error("song {0} not found")]
    SongNotFound(SongId),

    #[error("no slot at position {0} in the current week")]
    SlotNotFound(SlotPosition),

    /// The batch breaks a slot invariant (count, positions, uniqueness, featured pinning).
    #[error("invalid repertoire batch: {0}")]
    MalformedBatch(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join_ids(ids: &[SongId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
