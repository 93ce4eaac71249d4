use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{
    FeatureKey, FeatureVector, NEUTRAL_FEATURE_VALUE, PreferenceRecord, TrackId, VibeProfile,
};

/// Reduces a room's preference records into a single vibe profile
pub struct VibeAggregator;

impl VibeAggregator {
    /// Aggregate every record of one room into a fresh profile.
    ///
    /// Records are ordered by submission time (then user id) before any
    /// arithmetic, so the result does not depend on the order the store
    /// returned them in. Seed tracks keep that order with the first
    /// occurrence of each track id winning.
    ///
    /// Every record's values are checked against [0, 1] before use, whether
    /// or not it came through submission validation.
    pub fn aggregate(records: &[PreferenceRecord]) -> Result<VibeProfile> {
        let Some(first) = records.first() else {
            return Err(EngineError::EmptyRoom);
        };
        let room_id = first.room_id.clone();

        let mut ordered: Vec<&PreferenceRecord> = records.iter().collect();
        ordered.sort_by(|a, b| {
            a.submitted_at
                .cmp(&b.submitted_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let mut users = HashSet::new();
        for record in &ordered {
            if record.room_id != room_id {
                return Err(EngineError::MixedRoomRecords {
                    expected: room_id,
                    found: record.room_id.clone(),
                });
            }
            if !users.insert(&record.user_id) {
                return Err(EngineError::DuplicateRecord {
                    room_id,
                    user_id: record.user_id.clone(),
                });
            }
            record.check_values()?;
        }

        let (feature_centroid, feature_spread) = Self::feature_statistics(&ordered);
        let genre_affinity = Self::genre_affinity(&ordered);
        let seed_track_ids = Self::pooled_seeds(&ordered);
        let hard_no_genres: BTreeSet<String> = ordered
            .iter()
            .flat_map(|record| record.hard_no_genres.iter().cloned())
            .collect();
        let event_type = Self::dominant_event_type(&ordered);
        let familiarity: Vec<f64> = ordered
            .iter()
            .map(|record| record.new_vs_familiar.unwrap_or(NEUTRAL_FEATURE_VALUE))
            .collect();
        let new_vs_familiar = bounded_mean(&familiarity);
        let computed_at = ordered
            .iter()
            .map(|record| record.submitted_at)
            .max()
            .unwrap_or(first.submitted_at);

        debug!(
            room = %room_id,
            users = ordered.len(),
            genres = genre_affinity.len(),
            seeds = seed_track_ids.len(),
            "Aggregated vibe profile"
        );

        Ok(VibeProfile {
            room_id,
            feature_centroid,
            feature_spread,
            genre_affinity,
            seed_track_ids,
            hard_no_genres,
            event_type,
            new_vs_familiar,
            contributing_user_count: ordered.len(),
            computed_at,
        })
    }

    /// Per-feature mean (kept inside the observed range) and population standard deviation
    fn feature_statistics(records: &[&PreferenceRecord]) -> (FeatureVector, FeatureVector) {
        let mut centroid = FeatureVector::new();
        let mut spread = FeatureVector::new();
        let count = records.len() as f64;

        for feature in FeatureKey::ALL {
            let values: Vec<f64> = records
                .iter()
                .map(|record| {
                    record
                        .feature_weights
                        .get(&feature)
                        .copied()
                        .unwrap_or(NEUTRAL_FEATURE_VALUE)
                })
                .collect();

            let mean = bounded_mean(&values);
            let variance = values
                .iter()
                .map(|value| {
                    let diff = value - mean;
                    diff * diff
                })
                .sum::<f64>()
                / count;

            centroid.insert(feature, mean);
            spread.insert(feature, variance.sqrt());
        }

        (centroid, spread)
    }

    /// Share of records naming each genre
    fn genre_affinity(records: &[&PreferenceRecord]) -> BTreeMap<String, f64> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for record in records {
            for genre in &record.genre_tags {
                *counts.entry(genre.clone()).or_insert(0) += 1;
            }
        }

        let total = records.len() as f64;
        counts
            .into_iter()
            .map(|(genre, count)| (genre, count as f64 / total))
            .collect()
    }

    fn pooled_seeds(records: &[&PreferenceRecord]) -> Vec<TrackId> {
        let mut seen = HashSet::new();
        records
            .iter()
            .flat_map(|record| record.explicit_track_seeds.iter())
            .filter(|seed| seen.insert(*seed))
            .cloned()
            .collect()
    }

    /// Most common event type; ties go to the lexicographically smallest
    fn dominant_event_type(records: &[&PreferenceRecord]) -> Option<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for event in records.iter().filter_map(|record| record.event_type.as_deref()) {
            *counts.entry(event).or_insert(0) += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for (event, count) in counts {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((event, count));
            }
        }
        best.map(|(event, _)| event.to_string())
    }
}

/// Arithmetic mean kept inside the observed [min, max]; values must be finite
fn bounded_mean(values: &[f64]) -> f64 {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (values.iter().sum::<f64>() / values.len() as f64).clamp(min, max)
}
