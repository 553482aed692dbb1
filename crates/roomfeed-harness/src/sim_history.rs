//! Scripted history store.
//!
//! Rooms are seeded with records up front. A room can be made to fail, or
//! held so its fetches block until the test releases them, which is how
//! tests line up a history response against live traffic or a room switch.
//!
//! The store also hands out record ids, the way the backend's table does,
//! so ids given to new messages never collide with seeded ones.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use roomfeed_client::{HistoryError, HistoryStore};
use roomfeed_proto::{ChatRecord, RoomId};
use tokio::sync::watch;

/// Status returned for rooms marked as failing.
pub const UNAVAILABLE_STATUS: u16 = 503;

/// In-memory history shared between the test and the runtime under test.
#[derive(Debug, Clone, Default)]
pub struct SimHistory {
    inner: Arc<Mutex<HistoryState>>,
}

#[derive(Debug, Default)]
struct HistoryState {
    rooms: HashMap<RoomId, Vec<ChatRecord>>,
    failing: HashSet<RoomId>,
    gates: HashMap<RoomId, watch::Sender<bool>>,
    calls: Vec<RoomId>,
    /// Highest id stored or handed out so far
    last_id: u64,
}

impl HistoryState {
    fn stamp(&mut self, mut record: ChatRecord) -> ChatRecord {
        match record.id {
            Some(id) => self.last_id = self.last_id.max(id),
            None => {
                self.last_id += 1;
                record.id = Some(self.last_id);
            },
        }
        record
    }
}

impl SimHistory {
    /// Empty store; every room has no history.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored history of `room_id`.
    ///
    /// Records without an id are given the next free one.
    pub fn seed(&self, room_id: RoomId, records: impl IntoIterator<Item = ChatRecord>) {
        let mut state = self.lock();
        let records: Vec<_> = records.into_iter().map(|record| state.stamp(record)).collect();
        state.rooms.insert(room_id, records);
    }

    /// Append one record to `room_id` and return it as stored.
    ///
    /// A record without an id is given one past every id seen so far.
    pub fn append(&self, room_id: RoomId, record: ChatRecord) -> ChatRecord {
        let mut state = self.lock();
        let record = state.stamp(record);
        state.rooms.entry(room_id).or_default().push(record.clone());
        record
    }

    /// Answer fetches of `room_id` with an error status.
    pub fn fail_room(&self, room_id: RoomId) {
        self.lock().failing.insert(room_id);
    }

    /// Block fetches of `room_id` until [`SimHistory::release`].
    pub fn hold(&self, room_id: RoomId) {
        let (gate, _) = watch::channel(false);
        self.lock().gates.insert(room_id, gate);
    }

    /// Let held fetches of `room_id` complete.
    pub fn release(&self, room_id: RoomId) {
        if let Some(gate) = self.lock().gates.remove(&room_id) {
            gate.send_replace(true);
        }
    }

    /// Rooms fetched so far, in request order.
    pub fn calls(&self) -> Vec<RoomId> {
        self.lock().calls.clone()
    }

    /// Stored records of `room_id`.
    pub fn records(&self, room_id: RoomId) -> Vec<ChatRecord> {
        self.lock().rooms.get(&room_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl HistoryStore for SimHistory {
    async fn fetch_history(&self, room_id: RoomId) -> Result<Vec<ChatRecord>, HistoryError> {
        let gate = {
            let mut state = self.lock();
            state.calls.push(room_id);
            state.gates.get(&room_id).map(watch::Sender::subscribe)
        };

        if let Some(mut gate) = gate {
            tracing::debug!(%room_id, "history fetch held");
            // A dropped gate counts as released.
            let _ = gate.wait_for(|open| *open).await;
        }

        let state = self.lock();
        if state.failing.contains(&room_id) {
            return Err(HistoryError::Status(UNAVAILABLE_STATUS));
        }
        Ok(state.rooms.get(&room_id).cloned().unwrap_or_default())
    }
}
