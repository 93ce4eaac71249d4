use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, trace};
use ureq::Agent;
use urlencoding::encode;

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::models::{CandidateTrack, FeatureKey, FeatureVector, RoomId, TrackId, UserId, scale_tempo_bpm};
use crate::pool::CandidatePoolProvider;

/// Response structure for the room candidates endpoint
#[derive(Debug, Deserialize)]
pub struct CandidatesResponse {
    #[serde(default)]
    pub candidates: Vec<CatalogTrack>,
}

/// A track as the catalog service describes it
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTrack {
    pub id: String,
    #[serde(default)]
    pub features: HashMap<String, f64>,
    /// Raw tempo, used when `features` carries no scaled tempo
    #[serde(default)]
    pub tempo_bpm: Option<f64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub contributor_user_id: Option<String>,
    #[serde(default)]
    pub popularity: Option<f64>,
}

impl CatalogTrack {
    /// Convert into the engine's candidate shape.
    ///
    /// Only schema features are kept; the catalog may describe more.
    pub fn into_candidate(self) -> CandidateTrack {
        let mut feature_vector = FeatureVector::new();
        for (name, value) in &self.features {
            match name.parse::<FeatureKey>() {
                Ok(feature) => {
                    feature_vector.insert(feature, *value);
                }
                Err(_) => trace!(track = %self.id, feature = %name, "Ignoring non-schema feature"),
            }
        }
        if !feature_vector.contains_key(&FeatureKey::Tempo) {
            if let Some(bpm) = self.tempo_bpm {
                feature_vector.insert(FeatureKey::Tempo, scale_tempo_bpm(bpm));
            }
        }

        CandidateTrack {
            track_id: TrackId::from(self.id),
            feature_vector,
            genre_tags: self.genres.into_iter().collect::<BTreeSet<_>>(),
            contributor_user_id: self.contributor_user_id.map(UserId::from),
            popularity: self.popularity.unwrap_or(0.0),
        }
    }
}

/// HTTP client for the catalog service that supplies candidate tracks
pub struct CatalogClient {
    agent: Agent,
    base_url: String,
    api_token: Option<String>,
}

impl CatalogClient {
    /// Create a new client with configuration from environment
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.catalog_base_url.clone().ok_or_else(|| {
            EngineError::CandidatePoolUnavailable("CATALOG_BASE_URL is not set".to_string())
        })?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.catalog_timeout_secs))
            .build();

        Ok(CatalogClient {
            agent,
            base_url,
            api_token: config.catalog_api_token.clone(),
        })
    }

    fn candidates_url(&self, room_id: &RoomId, seed_track_ids: &[TrackId]) -> String {
        let seeds = seed_track_ids
            .iter()
            .map(TrackId::as_str)
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{}/rooms/{}/candidates?seeds={}",
            self.base_url.trim_end_matches('/'),
            encode(room_id.as_str()),
            encode(&seeds)
        )
    }
}

impl CandidatePoolProvider for CatalogClient {
    fn fetch_candidates(&self, room_id: &RoomId, seed_track_ids: &[TrackId]) -> Result<Vec<CandidateTrack>> {
        let url = self.candidates_url(room_id, seed_track_ids);
        debug!(room = %room_id, seeds = seed_track_ids.len(), "Fetching candidates from catalog");

        let mut request = self.agent.get(&url);
        if let Some(token) = &self.api_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request
            .call()
            .map_err(|e| EngineError::CandidatePoolUnavailable(format!("HTTP request failed: {e}")))?;

        let parsed: CandidatesResponse = response.into_json().map_err(|e| {
            EngineError::CandidatePoolUnavailable(format!("Failed to parse JSON response: {e}"))
        })?;

        debug!(room = %room_id, candidates = parsed.candidates.len(), "Catalog returned candidates");
        Ok(parsed
            .candidates
            .into_iter()
            .map(CatalogTrack::into_candidate)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn catalog_config(base_url: &str) -> Config {
        Config {
            catalog_base_url: Some(base_url.to_string()),
            catalog_api_token: None,
            catalog_timeout_secs: 5,
        }
    }

    #[test]
    fn test_catalog_track_conversion() {
        let json = r#"{
            "id": "spotify:track:1",
            "features": { "energy": 0.8, "Valence": 0.4, "loudness": -6.0 },
            "tempo_bpm": 130.0,
            "genres": ["Rock", "indie"],
            "contributor_user_id": "alice",
            "popularity": 71
        }"#;
        let track: CatalogTrack = serde_json::from_str(json).unwrap();
        let candidate = track.into_candidate();

        assert_eq!(candidate.track_id.as_str(), "spotify:track:1");
        assert_eq!(candidate.feature_vector.len(), 3);
        assert_relative_eq!(candidate.feature_vector[&FeatureKey::Energy], 0.8);
        assert_relative_eq!(candidate.feature_vector[&FeatureKey::Valence], 0.4);
        assert_relative_eq!(candidate.feature_vector[&FeatureKey::Tempo], 0.5);
        assert_eq!(candidate.contributor_user_id, Some(UserId::from("alice")));
        assert_relative_eq!(candidate.popularity, 71.0);
        assert!(candidate.genre_tags.contains("Rock"));
    }

    #[test]
    fn test_scaled_tempo_wins_over_raw_bpm() {
        let json = r#"{ "id": "t1", "features": { "tempo": 0.9 }, "tempo_bpm": 60.0 }"#;
        let candidate = serde_json::from_str::<CatalogTrack>(json).unwrap().into_candidate();

        assert_relative_eq!(candidate.feature_vector[&FeatureKey::Tempo], 0.9);
        assert_relative_eq!(candidate.popularity, 0.0);
        assert!(candidate.contributor_user_id.is_none());
    }

    #[test]
    fn test_candidates_url_encodes_room_and_seeds() {
        let client = CatalogClient::new(&catalog_config("http://catalog.local/api/")).unwrap();
        let url = client.candidates_url(
            &RoomId::from("room 7"),
            &[TrackId::from("t1"), TrackId::from("t&2")],
        );

        assert_eq!(
            url,
            "http://catalog.local/api/rooms/room%207/candidates?seeds=t1%2Ct%262"
        );
    }

    #[test]
    fn test_missing_base_url_is_unavailable() {
        let config = Config {
            catalog_base_url: None,
            catalog_api_token: None,
            catalog_timeout_secs: 5,
        };
        assert!(matches!(
            CatalogClient::new(&config),
            Err(EngineError::CandidatePoolUnavailable(_))
        ));
    }
}
