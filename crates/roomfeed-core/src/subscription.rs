//! Room subscription manager.
//!
//! Keeps at most one room topic subscribed. Switching rooms releases the
//! previous subscription before creating the next one, so the two
//! `UNSUBSCRIBE`/`SUBSCRIBE` frames leave in that order and deliveries for
//! the old room stop at the switch.

use chrono::{DateTime, Utc};
use roomfeed_proto::{
    ChatRecord, Frame, ProtocolError, RoomId, headers, room_from_topic, room_topic,
};

use crate::{
    connection::{Connection, ConnectionAction, SubscriptionHandle},
    error::SessionError,
    message::{Message, Origin},
};

/// The live subscription of the current room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    room_id: RoomId,
    handle: SubscriptionHandle,
    created_at: DateTime<Utc>,
}

impl Subscription {
    /// Subscribed room.
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Connection-level handle.
    pub fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// When the subscription was made.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Result of [`RoomSubscriptions::switch_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Switch {
    /// Already subscribed to that room; nothing happened.
    Unchanged,
    /// The subscription moved.
    Switched {
        /// Room left behind, if any
        previous: Option<RoomId>,
        /// Wire effects, unsubscribe first
        actions: Vec<ConnectionAction>,
    },
}

/// Holds the single active room subscription.
#[derive(Debug, Default)]
pub struct RoomSubscriptions {
    active: Option<Subscription>,
}

impl RoomSubscriptions {
    /// No room subscribed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Room currently subscribed.
    pub fn current_room(&self) -> Option<RoomId> {
        self.active.map(|sub| sub.room_id)
    }

    /// Active subscription, if any.
    pub fn active(&self) -> Option<&Subscription> {
        self.active.as_ref()
    }

    /// Make `room_id` the only subscribed room.
    ///
    /// # Errors
    ///
    /// `NotConnected` if the connection cannot subscribe. Nothing is
    /// released in that case.
    pub fn switch_to(
        &mut self,
        room_id: RoomId,
        connection: &mut Connection,
        now: DateTime<Utc>,
    ) -> Result<Switch, SessionError> {
        let still_live = self
            .active
            .is_some_and(|sub| sub.room_id == room_id && connection.is_active(sub.handle));
        if still_live {
            return Ok(Switch::Unchanged);
        }
        if !connection.is_connected() {
            return Err(SessionError::NotConnected { state: connection.state() });
        }

        let previous = self.current_room();
        let mut actions = self.release(connection);
        let (handle, subscribe) = connection.subscribe(&room_topic(room_id))?;
        actions.extend(subscribe);
        self.active = Some(Subscription { room_id, handle, created_at: now });

        tracing::info!(room = %room_id, ?previous, %handle, "switched room");
        Ok(Switch::Switched { previous, actions })
    }

    /// Drop the active subscription, if any.
    pub fn release(&mut self, connection: &mut Connection) -> Vec<ConnectionAction> {
        match self.active.take() {
            Some(sub) => connection.unsubscribe(sub.handle),
            None => vec![],
        }
    }

    /// Drop the slot after the connection has already torn its
    /// subscriptions down.
    pub fn forget(&mut self) {
        self.active = None;
    }

    /// Decode a delivery into a live message.
    ///
    /// `Ok(None)` when the frame belongs to a subscription that is no longer
    /// ours.
    ///
    /// # Errors
    ///
    /// `MalformedFrame` when the body is not a chat record or the frame's
    /// destination names a different room.
    pub fn decode(
        &self,
        handle: SubscriptionHandle,
        frame: &Frame,
        received_at: DateTime<Utc>,
    ) -> Result<Option<Message>, SessionError> {
        let Some(sub) = self.active.filter(|sub| sub.handle == handle) else {
            return Ok(None);
        };

        if let Some(destination) = frame.header(headers::DESTINATION) {
            let room = room_from_topic(destination).map_err(SessionError::MalformedFrame)?;
            if room != sub.room_id {
                return Err(SessionError::MalformedFrame(ProtocolError::NotARoomTopic(
                    destination.to_string(),
                )));
            }
        }

        let record = frame
            .body_str()
            .and_then(ChatRecord::from_json)
            .map_err(SessionError::MalformedFrame)?;
        Ok(Some(Message::from_record(sub.room_id, record, Origin::Live, received_at)))
    }
}
