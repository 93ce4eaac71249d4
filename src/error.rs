//! Error types for aggregation and scoring

use thiserror::Error;

use crate::models::{FeatureKey, RoomId, TrackId, UserId};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the aggregation and scoring engine and its collaborators
#[derive(Error, Debug)]
pub enum EngineError {
    /// No preference records exist for the room yet
    #[error("no preferences in this room yet; submit preferences before generating a playlist")]
    EmptyRoom,

    /// Fewer candidates survived filtering than were requested
    #[error("only {available} of {requested} requested tracks could be selected")]
    InsufficientCandidates { requested: usize, available: usize },

    /// A preference submission does not fit the feature schema
    #[error("invalid preference submission: {0}")]
    InvalidPreferenceSchema(#[from] SchemaViolation),

    /// A candidate supplied by the pool provider is malformed
    #[error("invalid candidate {track_id}: {reason}")]
    InvalidCandidate { track_id: TrackId, reason: String },

    /// Scoring configuration is out of range
    #[error("invalid scoring configuration: {0}")]
    InvalidScoringConfig(String),

    /// Aggregation input contained records from more than one room
    #[error("records from room {found} mixed into aggregation for room {expected}")]
    MixedRoomRecords { expected: RoomId, found: RoomId },

    /// Aggregation input contained two records for one user
    #[error("more than one preference record for user {user_id} in room {room_id}")]
    DuplicateRecord { room_id: RoomId, user_id: UserId },

    /// The candidate pool provider failed
    #[error("candidate pool unavailable: {0}")]
    CandidatePoolUnavailable(String),

    /// The preference record store failed
    #[error("preference store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Reasons a preference submission is rejected at the boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaViolation {
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("feature '{0}' supplied more than once")]
    DuplicateFeature(FeatureKey),

    #[error("feature '{feature}' value {value} is outside [0, 1]")]
    OutOfRange { feature: FeatureKey, value: f64 },

    #[error("new_vs_familiar value {0} is outside [0, 1]")]
    FamiliarityOutOfRange(f64),

    #[error("schema version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("{0} must not be blank")]
    BlankIdentifier(&'static str),

    #[error("genre tags must not be blank")]
    BlankGenreTag,
}
