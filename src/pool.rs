//! Candidate pool providers

use crate::error::Result;
use crate::models::{CandidateTrack, RoomId, TrackId};

/// Supplies the deduplicated candidate tracks for a room.
///
/// `seed_track_ids` are the room's pooled "songs like these" hints. Failures
/// are reported as `CandidatePoolUnavailable`; the engine does not retry.
#[cfg_attr(test, mockall::automock)]
pub trait CandidatePoolProvider: Send + Sync {
    fn fetch_candidates(
        &self,
        room_id: &RoomId,
        seed_track_ids: &[TrackId],
    ) -> Result<Vec<CandidateTrack>>;
}

impl<T: CandidatePoolProvider + ?Sized> CandidatePoolProvider for Box<T> {
    fn fetch_candidates(&self, room_id: &RoomId, seed_track_ids: &[TrackId]) -> Result<Vec<CandidateTrack>> {
        (**self).fetch_candidates(room_id, seed_track_ids)
    }
}

/// A fixed candidate list, returned for every room
#[derive(Debug, Clone, Default)]
pub struct StaticCandidatePool {
    pub candidates: Vec<CandidateTrack>,
}

impl StaticCandidatePool {
    pub fn new(candidates: Vec<CandidateTrack>) -> Self {
        Self { candidates }
    }

    /// Load candidates from a JSON array file
    pub fn load_from_file(path: &str) -> anyhow::Result<StaticCandidatePool> {
        let content = std::fs::read_to_string(path)?;
        let candidates: Vec<CandidateTrack> = serde_json::from_str(&content)?;
        Ok(Self::new(candidates))
    }
}

impl CandidatePoolProvider for StaticCandidatePool {
    fn fetch_candidates(&self, _room_id: &RoomId, _seed_track_ids: &[TrackId]) -> Result<Vec<CandidateTrack>> {
        Ok(self.candidates.clone())
    }
}
