use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::models::FeatureKey;

/// Tunables for scoring a candidate pool against a room's vibe profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Per-feature multipliers on the distance weight (1.0 when absent)
    pub feature_weights_override: Option<BTreeMap<FeatureKey, f64>>,
    /// Multiplier discount for candidates too similar to already-selected ones (0.0 to 1.0)
    pub diversity_penalty: f64,
    /// Cap on tracks sourced from one contributor's seeds (unlimited when absent)
    pub max_tracks_per_contributor: Option<usize>,
    /// Number of tracks to select
    pub top_n: usize,
    pub feature_fit_weight: f64,
    pub genre_fit_weight: f64,
    /// Weight of the popularity-based familiarity fit (off by default)
    pub familiarity_weight: f64,
    /// Genre-tag Jaccard similarity above which the diversity penalty applies
    pub genre_similarity_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            feature_weights_override: None,
            diversity_penalty: 0.2,
            max_tracks_per_contributor: None,
            top_n: 50,
            feature_fit_weight: 0.7,
            genre_fit_weight: 0.3,
            familiarity_weight: 0.0,
            genre_similarity_threshold: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Config that selects `top_n` tracks with every other tunable at its default
    pub fn with_top_n(top_n: usize) -> Self {
        Self {
            top_n,
            ..Self::default()
        }
    }

    /// Distance multiplier for a feature before disagreement down-weighting
    pub fn feature_multiplier(&self, feature: FeatureKey) -> f64 {
        self.feature_weights_override
            .as_ref()
            .and_then(|overrides| overrides.get(&feature).copied())
            .unwrap_or(1.0)
    }

    /// Reject out-of-range tunables before any scoring happens
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(invalid("top_n must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.diversity_penalty) {
            return Err(invalid(format!(
                "diversity_penalty {} is outside [0, 1]",
                self.diversity_penalty
            )));
        }
        if self.max_tracks_per_contributor == Some(0) {
            return Err(invalid("max_tracks_per_contributor must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.genre_similarity_threshold) {
            return Err(invalid(format!(
                "genre_similarity_threshold {} is outside [0, 1]",
                self.genre_similarity_threshold
            )));
        }
        for (name, weight) in [
            ("feature_fit_weight", self.feature_fit_weight),
            ("genre_fit_weight", self.genre_fit_weight),
            ("familiarity_weight", self.familiarity_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(format!("{name} must be a non-negative number")));
            }
        }
        if self.feature_fit_weight + self.genre_fit_weight + self.familiarity_weight == 0.0 {
            return Err(invalid("component weights cannot all be zero"));
        }
        if let Some(overrides) = &self.feature_weights_override {
            for (feature, weight) in overrides {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(invalid(format!(
                        "override for '{feature}' must be a non-negative number"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Load and validate a scoring configuration from a JSON file
    pub fn load_from_file(path: &str) -> anyhow::Result<ScoringConfig> {
        let content = std::fs::read_to_string(path)?;
        let config: ScoringConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::InvalidScoringConfig(message.into())
}
