use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::ScoringConfig;
use crate::models::{CandidateTrack, FeatureKey, NEUTRAL_FEATURE_VALUE, VibeProfile};

/// A candidate with its scoring components while it moves through selection
#[derive(Debug, Clone)]
pub struct CandidateScore<'a> {
    pub candidate: &'a CandidateTrack,
    /// Normalized genre tags of the candidate
    pub tags: BTreeSet<String>,
    pub feature_fit: f64,
    pub genre_fit: f64,
    pub familiarity_fit: f64,
    pub base_score: f64,
    /// Score after any diversity penalty
    pub score: f64,
    pub penalized: bool,
}

/// Scoring and calculation functionality
pub struct PlaylistScoring;

impl PlaylistScoring {
    /// Score one candidate against the profile (initial pass, no diversity penalty)
    pub fn score_candidate<'a>(
        candidate: &'a CandidateTrack,
        tags: BTreeSet<String>,
        profile: &VibeProfile,
        config: &ScoringConfig,
    ) -> CandidateScore<'a> {
        let feature_fit = Self::calculate_feature_fit(candidate, profile, config);
        let genre_fit = Self::calculate_genre_fit(&tags, profile);
        let familiarity_fit = Self::calculate_familiarity_fit(candidate, profile);
        let base_score = config.feature_fit_weight * feature_fit
            + config.genre_fit_weight * genre_fit
            + config.familiarity_weight * familiarity_fit;

        CandidateScore {
            candidate,
            tags,
            feature_fit,
            genre_fit,
            familiarity_fit,
            base_score,
            score: base_score,
            penalized: false,
        }
    }

    /// Calculate feature fit: 1 minus the weighted, normalized Euclidean distance
    /// between the candidate's features and the room centroid.
    ///
    /// Each dimension is weighted by `override / (1 + spread)`, so features the
    /// room disagrees on cost less. Returns 0.5 when every weight is zero.
    pub fn calculate_feature_fit(
        candidate: &CandidateTrack,
        profile: &VibeProfile,
        config: &ScoringConfig,
    ) -> f64 {
        let mut weighted_squares = 0.0;
        let mut total_weight = 0.0;

        for feature in FeatureKey::ALL {
            let weight = Self::dimension_weight(feature, profile, config);
            if weight == 0.0 {
                continue;
            }
            let target = profile
                .feature_centroid
                .get(&feature)
                .copied()
                .unwrap_or(NEUTRAL_FEATURE_VALUE);
            let diff = candidate.feature(feature) - target;
            weighted_squares += weight * diff * diff;
            total_weight += weight;
        }

        if total_weight == 0.0 {
            return NEUTRAL_FEATURE_VALUE;
        }

        let distance = (weighted_squares / total_weight).sqrt();
        (1.0 - distance).clamp(0.0, 1.0)
    }

    /// Distance weight for one feature dimension
    pub fn dimension_weight(feature: FeatureKey, profile: &VibeProfile, config: &ScoringConfig) -> f64 {
        let spread = profile.feature_spread.get(&feature).copied().unwrap_or(0.0);
        config.feature_multiplier(feature) / (1.0 + spread)
    }

    /// Calculate genre fit: mean room affinity over the candidate's tags.
    /// Tags the room never named count as zero; untagged candidates score zero.
    pub fn calculate_genre_fit(tags: &BTreeSet<String>, profile: &VibeProfile) -> f64 {
        if tags.is_empty() {
            return 0.0;
        }

        let total: f64 = tags
            .iter()
            .map(|tag| profile.genre_affinity.get(tag).copied().unwrap_or(0.0))
            .sum();
        total / tags.len() as f64
    }

    /// Calculate familiarity fit: how close the track's novelty (inverse
    /// popularity) sits to the room's new-vs-familiar preference
    pub fn calculate_familiarity_fit(candidate: &CandidateTrack, profile: &VibeProfile) -> f64 {
        let novelty = 1.0 - candidate.familiarity();
        1.0 - (profile.new_vs_familiar - novelty).abs()
    }

    /// Jaccard similarity of two genre tag sets (0.0 when both are empty)
    pub fn genre_similarity(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
        let union = a.union(b).count();
        if union == 0 {
            return 0.0;
        }
        a.intersection(b).count() as f64 / union as f64
    }

    /// Ranking order: higher score first, then higher popularity, then
    /// lexicographically smaller track id.
    pub fn rank_order(a: &CandidateScore<'_>, b: &CandidateScore<'_>) -> Ordering {
        Self::compare(
            (a.score, a.candidate.popularity, a.candidate.track_id.as_str()),
            (b.score, b.candidate.popularity, b.candidate.track_id.as_str()),
        )
    }

    /// Tie-break rule over (score, popularity, track id) triples.
    /// Negative zero compares equal to zero.
    pub fn compare(a: (f64, f64, &str), b: (f64, f64, &str)) -> Ordering {
        let (a_score, a_popularity) = (a.0 + 0.0, a.1 + 0.0);
        let (b_score, b_popularity) = (b.0 + 0.0, b.1 + 0.0);
        b_score
            .total_cmp(&a_score)
            .then_with(|| b_popularity.total_cmp(&a_popularity))
            .then_with(|| a.2.cmp(b.2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FeatureVector, RoomId, TrackId};
    use approx::assert_relative_eq;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn uniform(value: f64) -> FeatureVector {
        FeatureKey::ALL.into_iter().map(|f| (f, value)).collect()
    }

    fn create_profile(centroid: FeatureVector, spread: FeatureVector, affinity: &[(&str, f64)]) -> VibeProfile {
        VibeProfile {
            room_id: RoomId::from("room-1"),
            feature_centroid: centroid,
            feature_spread: spread,
            genre_affinity: affinity.iter().map(|(g, w)| (g.to_string(), *w)).collect(),
            seed_track_ids: vec![],
            hard_no_genres: BTreeSet::new(),
            event_type: None,
            new_vs_familiar: 0.5,
            contributing_user_count: 2,
            computed_at: Utc::now(),
        }
    }

    fn create_candidate(id: &str, features: FeatureVector) -> CandidateTrack {
        CandidateTrack {
            track_id: TrackId::from(id),
            feature_vector: features,
            genre_tags: BTreeSet::new(),
            contributor_user_id: None,
            popularity: 0.0,
        }
    }

    fn tags(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_feature_fit_exact_match_is_perfect() {
        let profile = create_profile(uniform(0.4), uniform(0.0), &[]);
        let candidate = create_candidate("t1", uniform(0.4));

        let fit = PlaylistScoring::calculate_feature_fit(&candidate, &profile, &ScoringConfig::default());
        assert_relative_eq!(fit, 1.0);
    }

    #[test]
    fn test_feature_fit_is_normalized_distance() {
        let profile = create_profile(uniform(0.0), uniform(0.0), &[]);
        let opposite = create_candidate("t1", uniform(1.0));
        let halfway = create_candidate("t2", uniform(0.5));
        let config = ScoringConfig::default();

        assert_relative_eq!(PlaylistScoring::calculate_feature_fit(&opposite, &profile, &config), 0.0);
        assert_relative_eq!(PlaylistScoring::calculate_feature_fit(&halfway, &profile, &config), 0.5);
    }

    #[test]
    fn test_disagreement_reduces_a_dimensions_weight() {
        let mut spread = uniform(0.0);
        spread.insert(FeatureKey::Energy, 0.4);
        let profile = create_profile(uniform(0.5), spread, &[]);

        let mut off_on_energy = uniform(0.5);
        off_on_energy.insert(FeatureKey::Energy, 1.0);
        let mut off_on_valence = uniform(0.5);
        off_on_valence.insert(FeatureKey::Valence, 1.0);

        let config = ScoringConfig::default();
        let energy_fit = PlaylistScoring::calculate_feature_fit(&create_candidate("a", off_on_energy), &profile, &config);
        let valence_fit = PlaylistScoring::calculate_feature_fit(&create_candidate("b", off_on_valence), &profile, &config);

        assert!(
            energy_fit > valence_fit,
            "missing on a disputed feature should cost less: energy {energy_fit}, valence {valence_fit}"
        );
        assert_relative_eq!(
            PlaylistScoring::dimension_weight(FeatureKey::Energy, &profile, &config),
            1.0 / 1.4
        );
    }

    #[test]
    fn test_override_emphasizes_a_feature() {
        let profile = create_profile(uniform(0.5), uniform(0.0), &[]);
        let mut features = uniform(0.5);
        features.insert(FeatureKey::Energy, 0.9);
        let candidate = create_candidate("t1", features);

        let plain = PlaylistScoring::calculate_feature_fit(&candidate, &profile, &ScoringConfig::default());
        let emphasized = ScoringConfig {
            feature_weights_override: Some(BTreeMap::from([(FeatureKey::Energy, 4.0)])),
            ..ScoringConfig::default()
        };
        let ignored = ScoringConfig {
            feature_weights_override: Some(BTreeMap::from([(FeatureKey::Energy, 0.0)])),
            ..ScoringConfig::default()
        };

        assert!(PlaylistScoring::calculate_feature_fit(&candidate, &profile, &emphasized) < plain);
        assert_relative_eq!(PlaylistScoring::calculate_feature_fit(&candidate, &profile, &ignored), 1.0);
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_neutral() {
        let profile = create_profile(uniform(0.5), uniform(0.0), &[]);
        let config = ScoringConfig {
            feature_weights_override: Some(FeatureKey::ALL.into_iter().map(|f| (f, 0.0)).collect()),
            ..ScoringConfig::default()
        };
        let fit = PlaylistScoring::calculate_feature_fit(&create_candidate("t1", uniform(1.0)), &profile, &config);
        assert_relative_eq!(fit, 0.5);
    }

    #[test]
    fn test_missing_candidate_features_are_neutral() {
        let profile = create_profile(uniform(0.5), uniform(0.0), &[]);
        let sparse = create_candidate("t1", FeatureVector::new());

        let fit = PlaylistScoring::calculate_feature_fit(&sparse, &profile, &ScoringConfig::default());
        assert_relative_eq!(fit, 1.0);
    }

    #[test]
    fn test_genre_fit_averages_affinity() {
        let profile = create_profile(uniform(0.5), uniform(0.0), &[("rock", 0.5), ("jazz", 1.0)]);

        assert_relative_eq!(PlaylistScoring::calculate_genre_fit(&tags(&["rock", "jazz"]), &profile), 0.75);
        assert_relative_eq!(PlaylistScoring::calculate_genre_fit(&tags(&["rock", "polka"]), &profile), 0.25);
        assert_relative_eq!(PlaylistScoring::calculate_genre_fit(&tags(&["polka"]), &profile), 0.0);
        assert_relative_eq!(PlaylistScoring::calculate_genre_fit(&BTreeSet::new(), &profile), 0.0);
    }

    #[test]
    fn test_combined_score_uses_component_weights() {
        let profile = create_profile(uniform(0.5), uniform(0.0), &[("rock", 0.5)]);
        let candidate = create_candidate("t1", uniform(0.5));

        let scored = PlaylistScoring::score_candidate(&candidate, tags(&["rock"]), &profile, &ScoringConfig::default());
        assert_relative_eq!(scored.feature_fit, 1.0);
        assert_relative_eq!(scored.genre_fit, 0.5);
        assert_relative_eq!(scored.base_score, 0.7 + 0.15);
        assert_relative_eq!(scored.score, scored.base_score);
        assert!(!scored.penalized);
    }

    #[test]
    fn test_familiarity_fit_follows_room_preference() {
        let mut profile = create_profile(uniform(0.5), uniform(0.0), &[]);
        let mut hit = create_candidate("hit", uniform(0.5));
        hit.popularity = 90.0;
        let mut deep_cut = create_candidate("deep-cut", uniform(0.5));
        deep_cut.popularity = 10.0;

        profile.new_vs_familiar = 1.0;
        assert_relative_eq!(PlaylistScoring::calculate_familiarity_fit(&deep_cut, &profile), 0.9, epsilon = 1e-12);
        assert_relative_eq!(PlaylistScoring::calculate_familiarity_fit(&hit, &profile), 0.1, epsilon = 1e-12);

        profile.new_vs_familiar = 0.0;
        assert_relative_eq!(PlaylistScoring::calculate_familiarity_fit(&hit, &profile), 0.9, epsilon = 1e-12);

        profile.new_vs_familiar = 0.5;
        assert_relative_eq!(PlaylistScoring::calculate_familiarity_fit(&hit, &profile), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_familiarity_only_counts_when_weighted() {
        let mut profile = create_profile(uniform(0.5), uniform(0.0), &[]);
        profile.new_vs_familiar = 0.0;
        let mut hit = create_candidate("hit", uniform(0.5));
        hit.popularity = 100.0;

        let plain = PlaylistScoring::score_candidate(&hit, BTreeSet::new(), &profile, &ScoringConfig::default());
        assert_relative_eq!(plain.familiarity_fit, 1.0);
        assert_relative_eq!(plain.base_score, 0.7);

        let weighted = ScoringConfig {
            familiarity_weight: 0.2,
            ..ScoringConfig::default()
        };
        let scored = PlaylistScoring::score_candidate(&hit, BTreeSet::new(), &profile, &weighted);
        assert_relative_eq!(scored.base_score, 0.7 + 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_genre_similarity() {
        assert_relative_eq!(PlaylistScoring::genre_similarity(&tags(&["rock"]), &tags(&["rock"])), 1.0);
        assert_relative_eq!(PlaylistScoring::genre_similarity(&tags(&["rock", "indie"]), &tags(&["rock"])), 0.5);
        assert_relative_eq!(PlaylistScoring::genre_similarity(&tags(&["rock"]), &tags(&["jazz"])), 0.0);
        assert_relative_eq!(PlaylistScoring::genre_similarity(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn test_tie_break_order() {
        assert_eq!(PlaylistScoring::compare((0.8, 1.0, "b"), (0.7, 99.0, "a")), Ordering::Less);
        assert_eq!(PlaylistScoring::compare((0.5, 20.0, "z"), (0.5, 10.0, "a")), Ordering::Less);
        assert_eq!(PlaylistScoring::compare((0.5, 10.0, "a"), (0.5, 10.0, "b")), Ordering::Less);
        assert_eq!(PlaylistScoring::compare((0.5, 10.0, "b"), (0.5, 10.0, "a")), Ordering::Greater);
    }

    #[test]
    fn test_signed_zero_popularity_falls_through_to_track_id() {
        assert_eq!(PlaylistScoring::compare((0.5, -0.0, "a"), (0.5, 0.0, "b")), Ordering::Less);
        assert_eq!(PlaylistScoring::compare((0.5, 0.0, "b"), (0.5, -0.0, "a")), Ordering::Greater);
        assert_eq!(PlaylistScoring::compare((-0.0, 1.0, "a"), (0.0, 1.0, "a")), Ordering::Equal);
    }
}
