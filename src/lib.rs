//! Turns a room's music preference submissions into a ranked shortlist of
//! candidate tracks for a shared playlist.
//!
//! [`aggregate`] reduces preference records into a [`VibeProfile`];
//! [`score`] ranks a candidate pool against it. [`VibeService`] wires both to
//! a [`PreferenceRecordStore`] and a [`CandidatePoolProvider`].

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod playlist;
pub mod pool;
pub mod service;
pub mod store;


pub use error::{EngineError, Result, SchemaViolation};
pub use models::{
    CandidateTrack, FeatureKey, PreferenceRecord, PreferenceSubmission, RoomId, TrackId, UserId,
    VibeProfile,
};
pub use playlist::{ScoredCandidate, ScoringConfig, ScoringOutcome};
pub use pool::{CandidatePoolProvider, StaticCandidatePool};
pub use service::VibeService;
pub use store::{InMemoryPreferenceStore, PreferenceRecordStore};

/// Reduce a room's preference records into its vibe profile
pub fn aggregate(records: &[PreferenceRecord]) -> Result<VibeProfile> {
    playlist::VibeAggregator::aggregate(records)
}

/// Rank candidates against a vibe profile under the given scoring config
pub fn score(
    profile: &VibeProfile,
    candidates: &[CandidateTrack],
    config: &ScoringConfig,
) -> Result<ScoringOutcome> {
    playlist::PlaylistGenerator::new(config.clone())?.generate_shortlist(profile, candidates)
}
