//! Per-room message timeline.
//!
//! A timeline is built once from a history page plus whatever live traffic
//! was buffered while the page was loading, then grows by live appends.
//! Every message is unique under [`DedupIndex`] rules.

use roomfeed_proto::RoomId;

use crate::message::{DedupIndex, Message};

/// Ordered, duplicate-free messages of one room.
#[derive(Debug, Clone)]
pub struct Timeline {
    room_id: RoomId,
    messages: Vec<Message>,
    index: DedupIndex,
}

impl Timeline {
    /// Empty timeline for `room_id`.
    pub fn new(room_id: RoomId) -> Self {
        Self { room_id, messages: Vec::new(), index: DedupIndex::new() }
    }

    /// Merge a history page with live messages buffered during the fetch.
    ///
    /// History entries are indexed first, so a buffered duplicate loses to
    /// its history counterpart. The result is sorted by creation time; the
    /// sort is stable and history precedes live, so ties keep history first
    /// and each source keeps its own relative order.
    pub fn merged(
        room_id: RoomId,
        history: impl IntoIterator<Item = Message>,
        buffered: impl IntoIterator<Item = Message>,
    ) -> Self {
        let mut timeline = Self::new(room_id);
        for message in history.into_iter().chain(buffered) {
            timeline.insert(message);
        }
        timeline.messages.sort_by_key(Message::created_at);
        timeline
    }

    /// Append a live message unless it is already present.
    ///
    /// Returns whether it was appended.
    pub fn push_live(&mut self, message: Message) -> bool {
        self.insert(message)
    }

    /// Room this timeline belongs to.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the timeline is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn insert(&mut self, message: Message) -> bool {
        if message.room_id() != self.room_id {
            tracing::debug!(
                timeline = %self.room_id,
                message = %message.room_id(),
                "dropping message for another room"
            );
            return false;
        }
        if !self.index.insert(&message) {
            tracing::trace!(room = %self.room_id, "duplicate message dropped");
            return false;
        }
        self.messages.push(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use roomfeed_proto::{AuthorId, ChatRecord};

    use super::*;
    use crate::message::Origin;

    fn at(room: u64, author: u64, content: &str, secs: i64, origin: Origin) -> Message {
        let record = ChatRecord {
            id: None,
            room_id: None,
            author_id: Some(AuthorId::new(author)),
            content: content.into(),
            created_at: Some(Utc.timestamp_opt(secs, 0).unwrap()),
        };
        Message::from_record(RoomId::new(room), record, origin, Utc.timestamp_opt(0, 0).unwrap())
    }

    fn contents(timeline: &Timeline) -> Vec<&str> {
        timeline.messages().iter().map(Message::content).collect()
    }

    #[test]
    fn merge_interleaves_by_timestamp() {
        let history = vec![at(1, 1, "a", 1, Origin::History), at(1, 1, "c", 3, Origin::History)];
        let buffered = vec![at(1, 2, "b", 2, Origin::Live), at(1, 2, "d", 4, Origin::Live)];

        let timeline = Timeline::merged(RoomId::new(1), history, buffered);
        assert_eq!(contents(&timeline), ["a", "b", "c", "d"]);
    }

    #[test]
    fn merge_prefers_history_copy() {
        let history = vec![at(1, 1, "hi", 1, Origin::History)];
        let buffered = vec![at(1, 1, "hi", 1, Origin::Live), at(1, 2, "yo", 2, Origin::Live)];

        let timeline = Timeline::merged(RoomId::new(1), history, buffered);
        assert_eq!(contents(&timeline), ["hi", "yo"]);
        assert_eq!(timeline.messages()[0].origin(), Origin::History);
    }

    #[test]
    fn ties_keep_history_first() {
        let history = vec![at(1, 1, "old", 5, Origin::History)];
        let buffered = vec![at(1, 2, "new", 5, Origin::Live)];

        let timeline = Timeline::merged(RoomId::new(1), history, buffered);
        assert_eq!(contents(&timeline), ["old", "new"]);
    }

    #[test]
    fn unordered_buffer_is_sorted_at_merge() {
        let buffered = vec![at(1, 1, "late", 9, Origin::Live), at(1, 1, "early", 2, Origin::Live)];
        let timeline = Timeline::merged(RoomId::new(1), Vec::new(), buffered);
        assert_eq!(contents(&timeline), ["early", "late"]);
    }

    #[test]
    fn push_live_skips_duplicates_and_other_rooms() {
        let mut timeline = Timeline::new(RoomId::new(1));
        assert!(timeline.push_live(at(1, 1, "x", 1, Origin::Live)));
        assert!(!timeline.push_live(at(1, 1, "x", 1, Origin::Live)));
        assert!(!timeline.push_live(at(2, 1, "y", 2, Origin::Live)));
        assert_eq!(timeline.len(), 1);
    }
}
