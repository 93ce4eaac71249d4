//! Preference record storage

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::error::{EngineError, Result};
use crate::models::{PreferenceRecord, RoomId, UserId, VibeProfile};

/// Persistence capability for preference records and profile snapshots.
///
/// Implementations keep at most one record per (room, user): `upsert_record`
/// replaces any earlier submission from the same user.
#[cfg_attr(test, mockall::automock)]
pub trait PreferenceRecordStore: Send + Sync {
    fn list_records(&self, room_id: &RoomId) -> Result<Vec<PreferenceRecord>>;

    fn upsert_record(&self, record: PreferenceRecord) -> Result<()>;

    /// Replace the room's persisted profile snapshot
    fn save_profile(&self, profile: VibeProfile) -> Result<()>;

    fn load_profile(&self, room_id: &RoomId) -> Result<Option<VibeProfile>>;
}

#[derive(Default)]
struct RoomState {
    records: BTreeMap<UserId, PreferenceRecord>,
    profile: Option<VibeProfile>,
}

/// In-process store, used by the CLI and tests
#[derive(Default)]
pub struct InMemoryPreferenceStore {
    rooms: RwLock<HashMap<RoomId, RoomState>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> EngineError {
        EngineError::StoreUnavailable("in-memory store lock poisoned".to_string())
    }
}

impl PreferenceRecordStore for InMemoryPreferenceStore {
    fn list_records(&self, room_id: &RoomId) -> Result<Vec<PreferenceRecord>> {
        let rooms = self.rooms.read().map_err(|_| Self::poisoned())?;
        Ok(rooms
            .get(room_id)
            .map(|room| room.records.values().cloned().collect())
            .unwrap_or_default())
    }

    fn upsert_record(&self, record: PreferenceRecord) -> Result<()> {
        let mut rooms = self.rooms.write().map_err(|_| Self::poisoned())?;
        rooms
            .entry(record.room_id.clone())
            .or_default()
            .records
            .insert(record.user_id.clone(), record);
        Ok(())
    }

    fn save_profile(&self, profile: VibeProfile) -> Result<()> {
        let mut rooms = self.rooms.write().map_err(|_| Self::poisoned())?;
        let room_id = profile.room_id.clone();
        rooms.entry(room_id).or_default().profile = Some(profile);
        Ok(())
    }

    fn load_profile(&self, room_id: &RoomId) -> Result<Option<VibeProfile>> {
        let rooms = self.rooms.read().map_err(|_| Self::poisoned())?;
        Ok(rooms.get(room_id).and_then(|room| room.profile.clone()))
    }
}
