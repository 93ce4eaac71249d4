use tracing::{debug, info, warn};

use super::ScoringConfig;
use super::ScoringOutcome;
use super::filters::CandidateFilters;
use super::scoring::{CandidateScore, PlaylistScoring};
use super::selection::ShortlistSelection;
use crate::error::Result;
use crate::models::{CandidateTrack, VibeProfile};

/// Main shortlist generator
pub struct PlaylistGenerator {
    config: ScoringConfig,
}

impl PlaylistGenerator {
    /// Create a generator, rejecting out-of-range tunables up front
    pub fn new(config: ScoringConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Score a candidate pool against a room profile and select the shortlist.
    ///
    /// Coming up short of `top_n` is not an error: the outcome carries every
    /// track that survived filtering and sets `shortfall`.
    pub fn generate_shortlist(
        &self,
        profile: &VibeProfile,
        candidates: &[CandidateTrack],
    ) -> Result<ScoringOutcome> {
        CandidateFilters::validate_pool(candidates)?;

        let mut excluded_by_hard_no = 0;
        let scored: Vec<CandidateScore<'_>> = candidates
            .iter()
            .filter_map(|candidate| {
                let tags = CandidateFilters::normalized_tags(candidate);
                if CandidateFilters::matches_hard_no_genres(&tags, profile) {
                    debug!(track = %candidate.track_id, "Excluded by hard-no genre");
                    excluded_by_hard_no += 1;
                    return None;
                }
                Some(PlaylistScoring::score_candidate(candidate, tags, profile, &self.config))
            })
            .collect();

        let selection = ShortlistSelection::select(scored, &self.config);
        let ranked = ShortlistSelection::finalize(selection.selected, &self.config);
        let summary = ShortlistSelection::summarize(
            &ranked,
            candidates.len(),
            excluded_by_hard_no,
            selection.skipped_by_contributor_cap,
        );

        let shortfall = ranked.len() < self.config.top_n;
        if shortfall {
            warn!(
                room = %profile.room_id,
                requested = self.config.top_n,
                available = ranked.len(),
                "Not enough candidates to fill the shortlist"
            );
        }
        info!(
            room = %profile.room_id,
            candidates = candidates.len(),
            selected = ranked.len(),
            excluded = excluded_by_hard_no,
            "Generated shortlist"
        );

        Ok(ScoringOutcome {
            room_id: profile.room_id.clone(),
            ranked,
            requested: self.config.top_n,
            shortfall,
            summary,
        })
    }
}
