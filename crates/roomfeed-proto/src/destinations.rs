//! Broker destinations.
//!
//! Every room has exactly one topic, derived from its id. Outbound chat goes
//! to a single application route; the broker fans it back out on the room
//! topic named inside the payload.

use crate::{ProtocolError, Result, RoomId};

/// Prefix shared by all room topics.
pub const ROOM_TOPIC_PREFIX: &str = "/topic/greetings/";

/// Application route that accepts outbound chat messages.
pub const PUBLISH_DESTINATION: &str = "/app/hello";

/// Topic carrying live traffic for `room`.
pub fn room_topic(room: RoomId) -> String {
    format!("{ROOM_TOPIC_PREFIX}{room}")
}

/// Recover the room id from a topic produced by [`room_topic`].
pub fn room_from_topic(destination: &str) -> Result<RoomId> {
    destination
        .strip_prefix(ROOM_TOPIC_PREFIX)
        .and_then(|suffix| suffix.parse().ok())
        .ok_or_else(|| ProtocolError::NotARoomTopic(destination.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names_are_stable() {
        assert_eq!(room_topic(RoomId::new(1)), "/topic/greetings/1");
        assert_eq!(room_topic(RoomId::new(1)), room_topic(RoomId::new(1)));
    }

    #[test]
    fn topic_round_trips_to_room() {
        let room = RoomId::new(9001);
        assert_eq!(room_from_topic(&room_topic(room)).unwrap(), room);
    }

    #[test]
    fn foreign_destinations_are_rejected() {
        assert!(matches!(room_from_topic("/app/hello"), Err(ProtocolError::NotARoomTopic(_))));
        assert!(room_from_topic("/topic/greetings/abc").is_err());
        assert!(room_from_topic("/topic/greetings/").is_err());
    }
}
