use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{EngineError, Result};
use crate::models::{RoomId, TrackId, UserId};

/// Named parts of a candidate's score, kept for explanation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreComponent {
    FeatureFit,
    GenreFit,
    FamiliarityFit,
    BaseScore,
    DiversityMultiplier,
}

/// Represents a selected track with its final score and rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub track_id: TrackId,
    pub score: f64,
    pub score_breakdown: BTreeMap<ScoreComponent, f64>,
    /// 1-based position in the shortlist
    pub rank: usize,
    pub popularity: f64,
    pub contributor_user_id: Option<UserId>,
    pub genre_tags: BTreeSet<String>,
}

/// Result of one scoring run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringOutcome {
    pub room_id: RoomId,
    pub ranked: Vec<ScoredCandidate>,
    pub requested: usize,
    /// Set when fewer than `requested` tracks survived filtering
    pub shortfall: bool,
    pub summary: ShortlistSummary,
}

impl ScoringOutcome {
    /// The ranked shortlist, or `InsufficientCandidates` when it came up short
    pub fn into_complete(self) -> Result<Vec<ScoredCandidate>> {
        if self.shortfall {
            return Err(EngineError::InsufficientCandidates {
                requested: self.requested,
                available: self.ranked.len(),
            });
        }
        Ok(self.ranked)
    }
}

/// Composition of a shortlist and what the constraints removed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortlistSummary {
    pub candidate_count: usize,
    pub excluded_by_hard_no: usize,
    pub skipped_by_contributor_cap: usize,
    /// Selected tracks whose score carries the diversity penalty
    pub penalized_count: usize,
    pub average_score: f64,
    pub genre_distribution: BTreeMap<String, usize>,
    pub contributor_distribution: BTreeMap<UserId, usize>,
}
