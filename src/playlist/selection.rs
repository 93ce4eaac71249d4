use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

use super::scoring::{CandidateScore, PlaylistScoring};
use super::{ScoreComponent, ScoredCandidate, ScoringConfig, ShortlistSummary};
use crate::models::UserId;

/// Tracks picked by the selection pass plus what the constraints discarded
pub struct Selection<'a> {
    pub selected: Vec<CandidateScore<'a>>,
    pub skipped_by_contributor_cap: usize,
}

/// Shortlist selection utilities
pub struct ShortlistSelection;

impl ShortlistSelection {
    /// Greedy selection pass over candidates already scored by the initial pass.
    ///
    /// The best remaining candidate is taken each round. A candidate whose
    /// genre overlap with an already-selected track exceeds the similarity
    /// threshold has its score multiplied by `1 - diversity_penalty` once and
    /// goes back into the pool at its new position. Candidates whose
    /// contributor has reached `max_tracks_per_contributor` are skipped.
    pub fn select<'a>(scored: Vec<CandidateScore<'a>>, config: &ScoringConfig) -> Selection<'a> {
        // Worst first, so the best remaining candidate is always at the back.
        let mut pool = scored;
        pool.sort_by(|a, b| PlaylistScoring::rank_order(b, a));

        let mut selected: Vec<CandidateScore<'a>> = Vec::with_capacity(config.top_n.min(pool.len()));
        let mut per_contributor: HashMap<&'a UserId, usize> = HashMap::new();
        let mut skipped_by_contributor_cap = 0;

        while selected.len() < config.top_n {
            let Some(mut entry) = pool.pop() else {
                break;
            };

            if let (Some(cap), Some(contributor)) = (
                config.max_tracks_per_contributor,
                entry.candidate.contributor_user_id.as_ref(),
            ) {
                if per_contributor.get(contributor).copied().unwrap_or(0) >= cap {
                    trace!(track = %entry.candidate.track_id, %contributor, "Contributor cap reached");
                    skipped_by_contributor_cap += 1;
                    continue;
                }
            }

            if !entry.penalized
                && config.diversity_penalty > 0.0
                && Self::max_similarity(&entry, &selected) > config.genre_similarity_threshold
            {
                entry.penalized = true;
                entry.score *= 1.0 - config.diversity_penalty;
                trace!(track = %entry.candidate.track_id, score = entry.score, "Diversity penalty applied");
                let position = pool.partition_point(|other| {
                    PlaylistScoring::rank_order(other, &entry) == Ordering::Greater
                });
                pool.insert(position, entry);
                continue;
            }

            if let Some(contributor) = entry.candidate.contributor_user_id.as_ref() {
                *per_contributor.entry(contributor).or_insert(0) += 1;
            }
            selected.push(entry);
        }

        Selection {
            selected,
            skipped_by_contributor_cap,
        }
    }

    /// Highest genre similarity between a candidate and the tracks selected so far
    fn max_similarity(entry: &CandidateScore<'_>, selected: &[CandidateScore<'_>]) -> f64 {
        selected
            .iter()
            .map(|other| PlaylistScoring::genre_similarity(&entry.tags, &other.tags))
            .fold(0.0, f64::max)
    }

    /// Truncate to `top_n`, order by the tie-break rule and attach 1-based ranks
    pub fn finalize(
        mut selected: Vec<CandidateScore<'_>>,
        config: &ScoringConfig,
    ) -> Vec<ScoredCandidate> {
        selected.sort_by(PlaylistScoring::rank_order);
        selected.truncate(config.top_n);

        selected
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let multiplier = if entry.penalized {
                    1.0 - config.diversity_penalty
                } else {
                    1.0
                };
                let score_breakdown = BTreeMap::from([
                    (ScoreComponent::FeatureFit, entry.feature_fit),
                    (ScoreComponent::GenreFit, entry.genre_fit),
                    (ScoreComponent::FamiliarityFit, entry.familiarity_fit),
                    (ScoreComponent::BaseScore, entry.base_score),
                    (ScoreComponent::DiversityMultiplier, multiplier),
                ]);

                ScoredCandidate {
                    track_id: entry.candidate.track_id.clone(),
                    score: entry.score,
                    score_breakdown,
                    rank: index + 1,
                    popularity: entry.candidate.popularity,
                    contributor_user_id: entry.candidate.contributor_user_id.clone(),
                    genre_tags: entry.tags,
                }
            })
            .collect()
    }

    /// Describe a finalized shortlist
    pub fn summarize(
        ranked: &[ScoredCandidate],
        candidate_count: usize,
        excluded_by_hard_no: usize,
        skipped_by_contributor_cap: usize,
    ) -> ShortlistSummary {
        let mut genre_distribution = BTreeMap::new();
        let mut contributor_distribution = BTreeMap::new();
        for candidate in ranked {
            for genre in &candidate.genre_tags {
                *genre_distribution.entry(genre.clone()).or_insert(0) += 1;
            }
            if let Some(contributor) = &candidate.contributor_user_id {
                *contributor_distribution.entry(contributor.clone()).or_insert(0) += 1;
            }
        }

        let average_score = if ranked.is_empty() {
            0.0
        } else {
            ranked.iter().map(|c| c.score).sum::<f64>() / ranked.len() as f64
        };
        let penalized_count = ranked
            .iter()
            .filter(|c| {
                c.score_breakdown
                    .get(&ScoreComponent::DiversityMultiplier)
                    .is_some_and(|m| *m < 1.0)
            })
            .count();

        ShortlistSummary {
            candidate_count,
            excluded_by_hard_no,
            skipped_by_contributor_cap,
            penalized_count,
            average_score,
            genre_distribution,
            contributor_distribution,
        }
    }
}
