//! JSON bodies carried inside STOMP frames and returned by the history
//! endpoint.
//!
//! Field names follow the chat backend: `writerId` for the author and
//! `createdDate` for the timestamp. Readers also accept `authorId` and
//! `createdAt`, and every field except `content` is optional on the way in:
//! the broker may echo no more than `{"content": "..."}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AuthorId, Result, RoomId};

/// Body of a `SEND` to the publish route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundChat {
    /// Room the message is addressed to.
    pub room_id: RoomId,
    /// Message text.
    pub content: String,
    /// Author of the message.
    #[serde(rename = "writerId")]
    pub author_id: AuthorId,
    /// Client-side submission time.
    #[serde(rename = "createdDate", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl OutboundChat {
    /// Serialize to the JSON text placed in the frame body.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A chat message as delivered live on a room topic or listed by history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRecord {
    /// Stable message id, when the backend assigns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Room named by the sender. Live frames take the room from the topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Message author.
    #[serde(
        default,
        rename = "writerId",
        alias = "authorId",
        skip_serializing_if = "Option::is_none"
    )]
    pub author_id: Option<AuthorId>,
    /// Message text.
    pub content: String,
    /// Creation time assigned by the sender or the backend.
    #[serde(
        default,
        rename = "createdDate",
        alias = "createdAt",
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatRecord {
    /// Record carrying only content, as the minimal broker echo does.
    pub fn content_only(content: impl Into<String>) -> Self {
        Self { id: None, room_id: None, author_id: None, content: content.into(), created_at: None }
    }

    /// Parse a live frame body.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Parse a history listing.
    pub fn list_from_json(body: &str) -> Result<Vec<Self>> {
        Ok(serde_json::from_str(body)?)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<OutboundChat> for ChatRecord {
    fn from(chat: OutboundChat) -> Self {
        Self {
            id: None,
            room_id: Some(chat.room_id),
            author_id: Some(chat.author_id),
            content: chat.content,
            created_at: Some(chat.created_at),
        }
    }
}

/// Timestamp (de)serialization.
///
/// Writes RFC 3339 in UTC with millisecond precision. Reads RFC 3339 with any
/// offset, or a naive `YYYY-MM-DDTHH:MM:SS[.fraction]` which is taken as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    use crate::ProtocolError;

    /// Parse a timestamp in either accepted form.
    pub fn parse(raw: &str) -> crate::Result<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| ProtocolError::InvalidPayload(format!("invalid timestamp {raw:?}")))
    }

    /// Format a timestamp for the wire.
    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Serde serializer.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    /// Serde deserializer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    /// Optional timestamps; `null` and absent fields both read as `None`.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

        /// Serde serializer.
        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&super::format(value)),
                None => serializer.serialize_none(),
            }
        }

        /// Serde deserializer.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(D::Error::custom))
                .transpose()
        }
    }
}
