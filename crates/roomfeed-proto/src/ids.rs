//! Identifiers shared across the wire and the session layer.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

/// Identifier of a chat room.
///
/// Opaque to the client: it is supplied by whoever picks the room and only
/// ever used to name the room's topic and history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(u64);

impl RoomId {
    /// Wrap a raw room number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw room number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RoomId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RoomId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Identifier of a message author (`writerId` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(u64);

impl AuthorId {
    /// Wrap a raw author number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw author number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for AuthorId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AuthorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_parses_trimmed_input() {
        assert_eq!(" 42 ".parse::<RoomId>().unwrap(), RoomId::new(42));
        assert!("lobby".parse::<RoomId>().is_err());
    }

    #[test]
    fn ids_serialize_as_bare_numbers() {
        assert_eq!(serde_json::to_string(&RoomId::new(7)).unwrap(), "7");
        assert_eq!(serde_json::from_str::<AuthorId>("123").unwrap(), AuthorId::new(123));
    }
}
