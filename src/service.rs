//! Room-level orchestration of submission, aggregation and scoring

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::models::{PreferenceSubmission, RoomId, VibeProfile};
use crate::playlist::{PlaylistGenerator, ScoringConfig, ScoringOutcome, VibeAggregator};
use crate::pool::CandidatePoolProvider;
use crate::store::PreferenceRecordStore;

/// Connects the record store, the aggregator and the candidate pool.
///
/// "Read all records, recompute, persist" runs under a per-room lock, so a
/// room's profile never races a concurrent submission to the same room.
/// Different rooms do not contend. A room's lock lives only while some
/// caller holds or waits on it.
pub struct VibeService<S, P> {
    store: S,
    provider: P,
    room_locks: Mutex<HashMap<RoomId, Arc<Mutex<()>>>>,
}

impl<S, P> VibeService<S, P>
where
    S: PreferenceRecordStore,
    P: CandidatePoolProvider,
{
    pub fn new(store: S, provider: P) -> Self {
        Self {
            store,
            provider,
            room_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn room_lock(&self, room_id: &RoomId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .room_locks
            .lock()
            .map_err(|_| EngineError::StoreUnavailable("room lock table poisoned".to_string()))?;
        Ok(locks.entry(room_id.clone()).or_default().clone())
    }

    /// Run `f` while holding the room's lock
    fn with_room_lock<T>(&self, room_id: &RoomId, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.room_lock(room_id)?;
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(_) => Err(EngineError::StoreUnavailable(format!(
                "lock for room {room_id} poisoned"
            ))),
        };
        self.release_room_lock(room_id, lock);
        result
    }

    /// Drop the room's table entry once no other caller holds a handle to it
    fn release_room_lock(&self, room_id: &RoomId, lock: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.room_locks.lock() else {
            return;
        };
        // One handle in the table, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(room_id);
        }
    }

    fn recompute(&self, room_id: &RoomId) -> Result<VibeProfile> {
        let records = self.store.list_records(room_id)?;
        let profile = VibeAggregator::aggregate(&records)?;
        self.store.save_profile(profile.clone())?;
        Ok(profile)
    }

    /// Validate and store a submission, then recompute the room profile
    pub fn submit(&self, submission: PreferenceSubmission) -> Result<VibeProfile> {
        let record = submission.validate()?;
        let room_id = record.room_id.clone();
        debug!(room = %room_id, user = %record.user_id, "Accepted preference submission");

        self.with_room_lock(&room_id, || {
            self.store.upsert_record(record)?;
            let profile = self.recompute(&room_id)?;
            info!(
                room = %room_id,
                users = profile.contributing_user_count,
                "Vibe profile refreshed"
            );
            Ok(profile)
        })
    }

    /// Recompute the room profile from the stored records
    pub fn refresh_profile(&self, room_id: &RoomId) -> Result<VibeProfile> {
        self.with_room_lock(room_id, || self.recompute(room_id))
    }

    /// The last persisted profile snapshot for the room
    pub fn current_profile(&self, room_id: &RoomId) -> Result<Option<VibeProfile>> {
        self.store.load_profile(room_id)
    }

    /// Score the room's candidate pool against its profile.
    ///
    /// Uses the persisted snapshot when one exists, recomputing lazily
    /// otherwise.
    pub fn build_shortlist(&self, room_id: &RoomId, config: ScoringConfig) -> Result<ScoringOutcome> {
        let generator = PlaylistGenerator::new(config)?;
        let profile = match self.store.load_profile(room_id)? {
            Some(profile) => profile,
            None => self.refresh_profile(room_id)?,
        };

        let candidates = self
            .provider
            .fetch_candidates(room_id, &profile.seed_track_ids)?;
        generator.generate_shortlist(&profile, &candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TrackId, UserId};
    use crate::pool::StaticCandidatePool;
    use crate::store::InMemoryPreferenceStore;
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;

    fn create_submission(room: &str, user: &str, minutes: i64, energy: f64) -> PreferenceSubmission {
        PreferenceSubmission {
            schema_version: crate::models::FEATURE_SCHEMA_VERSION,
            room_id: RoomId::from(room),
            user_id: UserId::from(user),
            submitted_at: Utc.with_ymd_and_hms(2025, 6, 14, 21, 0, 0).unwrap() + Duration::minutes(minutes),
            feature_weights: HashMap::from([("energy".to_string(), energy)]),
            genre_tags: vec!["house".to_string()],
            explicit_track_seeds: vec![TrackId::from(format!("seed-{user}"))],
            hard_no_genres: vec![],
            event_type: None,
            new_vs_familiar: None,
        }
    }

    fn create_service() -> VibeService<InMemoryPreferenceStore, StaticCandidatePool> {
        VibeService::new(InMemoryPreferenceStore::new(), StaticCandidatePool::default())
    }

    fn tracked_rooms<S, P>(service: &VibeService<S, P>) -> usize {
        service.room_locks.lock().unwrap().len()
    }

    #[test]
    fn test_concurrent_submissions_keep_every_member() {
        let service = create_service();
        let rooms = [("dance-floor", 12), ("lounge", 5)];

        std::thread::scope(|scope| {
            for (room, members) in rooms {
                for i in 0..members {
                    let service = &service;
                    scope.spawn(move || {
                        let energy = (i % 10) as f64 / 10.0;
                        service
                            .submit(create_submission(room, &format!("u{i}"), i as i64, energy))
                            .unwrap();
                    });
                }
            }
        });

        for (room, members) in rooms {
            let room_id = RoomId::from(room);
            let snapshot = service.current_profile(&room_id).unwrap().unwrap();
            assert_eq!(snapshot.contributing_user_count, members);
            assert_eq!(snapshot.seed_track_ids.len(), members);
            assert_eq!(snapshot, service.refresh_profile(&room_id).unwrap());
        }
    }

    #[test]
    fn test_concurrent_resubmissions_settle_on_one_record_per_user() {
        let service = create_service();
        let room_id = RoomId::from("dance-floor");

        std::thread::scope(|scope| {
            for round in 0..4 {
                for user in ["ana", "bo", "cy"] {
                    let service = &service;
                    scope.spawn(move || {
                        service
                            .submit(create_submission("dance-floor", user, round, 0.2 * round as f64))
                            .unwrap();
                    });
                }
            }
        });

        let snapshot = service.current_profile(&room_id).unwrap().unwrap();
        assert_eq!(snapshot.contributing_user_count, 3);
        assert_eq!(service.store().list_records(&room_id).unwrap().len(), 3);
        assert_eq!(snapshot, service.refresh_profile(&room_id).unwrap());
    }

    #[test]
    fn test_room_locks_are_released_after_use() {
        let service = create_service();
        service.submit(create_submission("lounge", "ana", 0, 0.4)).unwrap();
        assert_eq!(tracked_rooms(&service), 0);

        for i in 0..20 {
            let ghost = RoomId::from(format!("ghost-{i}"));
            assert!(matches!(
                service.build_shortlist(&ghost, ScoringConfig::default()),
                Err(EngineError::EmptyRoom)
            ));
        }
        assert_eq!(tracked_rooms(&service), 0);
    }
}
