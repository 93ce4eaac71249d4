use std::collections::{BTreeSet, HashSet};

use crate::error::{EngineError, Result};
use crate::models::{CandidateTrack, VibeProfile, normalize_genre};

/// Candidate pool checks using static helper functions
pub struct CandidateFilters;

impl CandidateFilters {
    /// Reject a pool containing a malformed or duplicated candidate.
    ///
    /// Feature values must be finite and within [0, 1], popularity must be
    /// finite, and track ids must be non-blank and unique.
    pub fn validate_pool(candidates: &[CandidateTrack]) -> Result<()> {
        let mut seen = HashSet::with_capacity(candidates.len());

        for candidate in candidates {
            let invalid = |reason: String| EngineError::InvalidCandidate {
                track_id: candidate.track_id.clone(),
                reason,
            };

            if candidate.track_id.as_str().trim().is_empty() {
                return Err(invalid("track id is blank".to_string()));
            }
            if !seen.insert(&candidate.track_id) {
                return Err(invalid("track id appears more than once in the pool".to_string()));
            }
            if !candidate.popularity.is_finite() {
                return Err(invalid(format!("popularity {} is not finite", candidate.popularity)));
            }
            for (feature, value) in &candidate.feature_vector {
                if !value.is_finite() || !(0.0..=1.0).contains(value) {
                    return Err(invalid(format!("feature '{feature}' value {value} is outside [0, 1]")));
                }
            }
            if candidate.genre_tags.iter().any(|tag| tag.trim().is_empty()) {
                return Err(invalid("genre tags must not be blank".to_string()));
            }
        }

        Ok(())
    }

    /// Candidate genre tags, normalized the same way as submitted tags
    pub fn normalized_tags(candidate: &CandidateTrack) -> BTreeSet<String> {
        candidate
            .genre_tags
            .iter()
            .map(|tag| normalize_genre(tag))
            .collect()
    }

    /// Check whether any of the candidate's tags is a room hard-no
    pub fn matches_hard_no_genres(tags: &BTreeSet<String>, profile: &VibeProfile) -> bool {
        tags.iter().any(|tag| profile.hard_no_genres.contains(tag))
    }
}
