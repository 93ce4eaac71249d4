use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result, SchemaViolation};

/// Version of the feature schema accepted in preference submissions
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Value a feature takes when a submission leaves it out
pub const NEUTRAL_FEATURE_VALUE: f64 = 0.5;

/// BPM range mapped onto the [0, 1] tempo feature
pub const TEMPO_BPM_FLOOR: f64 = 40.0;
pub const TEMPO_BPM_CEILING: f64 = 220.0;

/// Catalog popularity at which a track counts as fully familiar
pub const POPULARITY_CEILING: f64 = 100.0;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(RoomId);
string_id!(UserId);
string_id!(TrackId);

/// Audio features understood by schema version 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKey {
    Energy,
    Danceability,
    Tempo,
    Valence,
    Acousticness,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 5] = [
        FeatureKey::Energy,
        FeatureKey::Danceability,
        FeatureKey::Tempo,
        FeatureKey::Valence,
        FeatureKey::Acousticness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Energy => "energy",
            FeatureKey::Danceability => "danceability",
            FeatureKey::Tempo => "tempo",
            FeatureKey::Valence => "valence",
            FeatureKey::Acousticness => "acousticness",
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FeatureKey {
    type Err = SchemaViolation;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        FeatureKey::ALL
            .into_iter()
            .find(|feature| feature.as_str() == key)
            .ok_or_else(|| SchemaViolation::UnknownFeature(s.to_string()))
    }
}

/// Feature values keyed by schema feature, ordered for deterministic iteration
pub type FeatureVector = BTreeMap<FeatureKey, f64>;

/// Scale a raw tempo in BPM onto the [0, 1] tempo feature
pub fn scale_tempo_bpm(bpm: f64) -> f64 {
    ((bpm - TEMPO_BPM_FLOOR) / (TEMPO_BPM_CEILING - TEMPO_BPM_FLOOR)).clamp(0.0, 1.0)
}

/// Check that a preference value is finite and inside [0, 1]
pub fn is_unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Normalize a genre tag: trimmed and lower-cased
pub fn normalize_genre(tag: &str) -> String {
    tag.trim().to_lowercase()
}

fn default_schema_version() -> u32 {
    FEATURE_SCHEMA_VERSION
}

/// A preference submission as it arrives from a room member, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceSubmission {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub feature_weights: HashMap<String, f64>,
    #[serde(default)]
    pub genre_tags: Vec<String>,
    #[serde(default)]
    pub explicit_track_seeds: Vec<TrackId>,
    #[serde(default)]
    pub hard_no_genres: Vec<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    /// 0.0 wants familiar hits, 1.0 wants new discoveries
    #[serde(default)]
    pub new_vs_familiar: Option<f64>,
}

/// One validated preference submission for a (room, user) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub submitted_at: DateTime<Utc>,
    pub feature_weights: FeatureVector,
    pub genre_tags: BTreeSet<String>,
    pub explicit_track_seeds: Vec<TrackId>,
    pub hard_no_genres: BTreeSet<String>,
    pub event_type: Option<String>,
    #[serde(default)]
    pub new_vs_familiar: Option<f64>,
}

impl PreferenceRecord {
    /// Reject preference values outside [0, 1].
    ///
    /// Records built by [`PreferenceSubmission::validate`] always pass; this
    /// guards records that reach aggregation from a store or deserialization.
    pub fn check_values(&self) -> Result<()> {
        for (feature, value) in &self.feature_weights {
            if !is_unit_interval(*value) {
                return Err(SchemaViolation::OutOfRange {
                    feature: *feature,
                    value: *value,
                }
                .into());
            }
        }
        if let Some(value) = self.new_vs_familiar {
            if !is_unit_interval(value) {
                return Err(SchemaViolation::FamiliarityOutOfRange(value).into());
            }
        }
        Ok(())
    }
}

impl PreferenceSubmission {
    /// Validate against the feature schema and normalize into a record.
    ///
    /// Every schema feature is present on the resulting record; features the
    /// submission omits take [`NEUTRAL_FEATURE_VALUE`].
    pub fn validate(self) -> Result<PreferenceRecord> {
        if self.schema_version != FEATURE_SCHEMA_VERSION {
            return Err(SchemaViolation::UnsupportedVersion {
                found: self.schema_version,
                expected: FEATURE_SCHEMA_VERSION,
            }
            .into());
        }
        if self.room_id.as_str().trim().is_empty() {
            return Err(SchemaViolation::BlankIdentifier("room_id").into());
        }
        if self.user_id.as_str().trim().is_empty() {
            return Err(SchemaViolation::BlankIdentifier("user_id").into());
        }

        let mut feature_weights: FeatureVector = FeatureKey::ALL
            .into_iter()
            .map(|feature| (feature, NEUTRAL_FEATURE_VALUE))
            .collect();
        let mut supplied = BTreeSet::new();
        for (raw_key, value) in &self.feature_weights {
            let feature: FeatureKey = raw_key.parse()?;
            if !supplied.insert(feature) {
                return Err(SchemaViolation::DuplicateFeature(feature).into());
            }
            if !is_unit_interval(*value) {
                return Err(SchemaViolation::OutOfRange {
                    feature,
                    value: *value,
                }
                .into());
            }
            feature_weights.insert(feature, *value);
        }

        let genre_tags = normalize_tag_list(&self.genre_tags)?;
        let hard_no_genres = normalize_tag_list(&self.hard_no_genres)?;

        let mut seen = BTreeSet::new();
        let mut explicit_track_seeds = Vec::with_capacity(self.explicit_track_seeds.len());
        for seed in self.explicit_track_seeds {
            if seed.as_str().trim().is_empty() {
                return Err(SchemaViolation::BlankIdentifier("explicit_track_seeds").into());
            }
            if seen.insert(seed.clone()) {
                explicit_track_seeds.push(seed);
            }
        }

        let event_type = self
            .event_type
            .map(|event| event.trim().to_lowercase())
            .filter(|event| !event.is_empty());

        if let Some(value) = self.new_vs_familiar {
            if !is_unit_interval(value) {
                return Err(SchemaViolation::FamiliarityOutOfRange(value).into());
            }
        }

        Ok(PreferenceRecord {
            room_id: self.room_id,
            user_id: self.user_id,
            submitted_at: self.submitted_at,
            feature_weights,
            genre_tags,
            explicit_track_seeds,
            hard_no_genres,
            event_type,
            new_vs_familiar: self.new_vs_familiar,
        })
    }
}

fn normalize_tag_list(tags: &[String]) -> Result<BTreeSet<String>> {
    tags.iter()
        .map(|tag| {
            let normalized = normalize_genre(tag);
            if normalized.is_empty() {
                Err(EngineError::from(SchemaViolation::BlankGenreTag))
            } else {
                Ok(normalized)
            }
        })
        .collect()
}

/// Aggregated statistical summary of a room's preference records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeProfile {
    pub room_id: RoomId,
    pub feature_centroid: FeatureVector,
    pub feature_spread: FeatureVector,
    pub genre_affinity: BTreeMap<String, f64>,
    pub seed_track_ids: Vec<TrackId>,
    pub hard_no_genres: BTreeSet<String>,
    pub event_type: Option<String>,
    /// Mean new-vs-familiar preference, neutral for members who gave none
    pub new_vs_familiar: f64,
    pub contributing_user_count: usize,
    pub computed_at: DateTime<Utc>,
}

/// A track offered by the candidate pool provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub track_id: TrackId,
    #[serde(default)]
    pub feature_vector: FeatureVector,
    #[serde(default)]
    pub genre_tags: BTreeSet<String>,
    #[serde(default)]
    pub contributor_user_id: Option<UserId>,
    #[serde(default)]
    pub popularity: f64,
}

impl CandidateTrack {
    /// Feature value for scoring, neutral when the catalog did not supply it
    pub fn feature(&self, feature: FeatureKey) -> f64 {
        self.feature_vector
            .get(&feature)
            .copied()
            .unwrap_or(NEUTRAL_FEATURE_VALUE)
    }

    /// Popularity mapped onto [0, 1], where 1.0 is a well-known hit
    pub fn familiarity(&self) -> f64 {
        (self.popularity / POPULARITY_CEILING).clamp(0.0, 1.0)
    }
}
