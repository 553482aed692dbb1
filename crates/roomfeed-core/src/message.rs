//! Timeline entries and their identity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use roomfeed_proto::{AuthorId, ChatRecord, OutboundChat, RoomId};

/// Where a timeline entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Returned by the history store.
    History,
    /// Delivered on the room topic.
    Live,
}

/// One chat message as shown on a timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: Option<u64>,
    room_id: RoomId,
    author_id: Option<AuthorId>,
    content: String,
    created_at: DateTime<Utc>,
    origin: Origin,
}

impl Message {
    /// Build from a decoded record.
    ///
    /// The room always comes from context (topic or history request), never
    /// from the record. `fallback_time` stands in for a missing timestamp.
    pub fn from_record(
        room_id: RoomId,
        record: ChatRecord,
        origin: Origin,
        fallback_time: DateTime<Utc>,
    ) -> Self {
        if record.room_id.is_some_and(|named| named != room_id) {
            tracing::debug!(%room_id, named = ?record.room_id, "record names another room");
        }
        Self {
            id: record.id,
            room_id,
            author_id: record.author_id,
            content: record.content,
            created_at: record.created_at.unwrap_or(fallback_time),
            origin,
        }
    }

    /// Backend-assigned id, if any.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Room the message belongs to.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Author, or `None` for anonymous messages.
    pub fn author_id(&self) -> Option<AuthorId> {
        self.author_id
    }

    /// Message text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Where the message came from.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    fn content_key(&self) -> ContentKey {
        ContentKey {
            room_id: self.room_id,
            author_id: self.author_id,
            created_at: self.created_at,
            content: self.content.clone(),
        }
    }
}

/// A message the local user is about to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundIntent {
    /// Target room.
    pub room_id: RoomId,
    /// Message text.
    pub content: String,
    /// Local user.
    pub author_id: AuthorId,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl From<OutboundIntent> for OutboundChat {
    fn from(intent: OutboundIntent) -> Self {
        Self {
            room_id: intent.room_id,
            content: intent.content,
            author_id: intent.author_id,
            created_at: intent.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContentKey {
    room_id: RoomId,
    author_id: Option<AuthorId>,
    created_at: DateTime<Utc>,
    content: String,
}

/// Identity index over the messages of one timeline.
///
/// Two messages are the same when both carry a backend id and the ids match,
/// or when room, author, timestamp and content all match and they do not
/// carry two different ids.
#[derive(Debug, Default, Clone)]
pub struct DedupIndex {
    /// Backend id -> content it was first seen with
    ids: HashMap<u64, String>,
    /// Content key -> ids seen with it (`None` for id-less messages)
    by_content: HashMap<ContentKey, Vec<Option<u64>>>,
}

impl DedupIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an equivalent message was already recorded.
    pub fn contains(&self, message: &Message) -> bool {
        if let Some((id, content)) = message.id.and_then(|id| self.ids.get_key_value(&id)) {
            if *content != message.content {
                tracing::warn!(
                    id,
                    room = %message.room_id,
                    "message id reused with different content"
                );
            }
            return true;
        }
        self.by_content.get(&message.content_key()).is_some_and(|seen| {
            seen.iter().any(|other| match (other, message.id) {
                (Some(a), Some(b)) => *a == b,
                _ => true,
            })
        })
    }

    /// Record `message`. Returns `false` if it was already present.
    pub fn insert(&mut self, message: &Message) -> bool {
        if self.contains(message) {
            return false;
        }
        if let Some(id) = message.id {
            self.ids.insert(id, message.content.clone());
        }
        self.by_content.entry(message.content_key()).or_default().push(message.id);
        true
    }

    /// Number of distinct messages recorded.
    pub fn len(&self) -> usize {
        self.by_content.values().map(Vec::len).sum()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.by_content.is_empty()
    }
}
