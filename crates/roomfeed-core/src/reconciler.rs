//! History reconciliation.
//!
//! Entering a room subscribes first and fetches history second, so nothing
//! published in between is lost. Live messages that arrive before the
//! history page are buffered and merged into it; later ones are appended.
//!
//! ```text
//!          enter_room                 on_history (current request)
//! ┌──────┐ ────────> ┌──────────┐ ──────────────────────> ┌───────┐
//! │ Idle │           │ Fetching │  buffer live messages    │ Ready │ append live
//! └──────┘           └──────────┘                          └───────┘
//! ```
//!
//! Each fetch carries a [`HistoryRequest`] with a fresh request id. A
//! response whose request is not the one currently awaited is stale (the
//! user moved on, possibly to another room and back) and is discarded
//! without touching the timeline.

use chrono::{DateTime, TimeDelta, Utc};
use roomfeed_proto::{ChatRecord, RoomId};

use crate::{
    connection::{Connection, ConnectionAction},
    error::SessionError,
    message::{Message, Origin},
    subscription::{RoomSubscriptions, Switch},
    timeline::Timeline,
};

/// Identifies one history fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryRequest {
    /// Room whose history is wanted
    pub room_id: RoomId,
    /// Monotonic request id, unique per reconciler
    pub request_id: u64,
}

/// Result of [`HistoryReconciler::enter_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnterRoom {
    /// The room is already current.
    AlreadyActive,
    /// Subscribed; the caller must fetch history for `request`.
    Fetch {
        /// Fetch to start
        request: HistoryRequest,
        /// Subscription effects, to execute before fetching
        actions: Vec<ConnectionAction>,
    },
}

/// Result of [`HistoryReconciler::on_history`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    /// History merged; the timeline was replaced.
    Merged,
    /// History failed; the timeline holds only buffered live messages.
    Degraded(SessionError),
    /// Response for a request nobody waits for any more.
    Stale,
}

#[derive(Debug)]
enum Phase {
    Idle,
    Fetching { request: HistoryRequest, buffered: Vec<Message> },
    Ready { timeline: Timeline },
}

/// Builds the current room's timeline from history and live traffic.
#[derive(Debug)]
pub struct HistoryReconciler {
    phase: Phase,
    next_request: u64,
}

impl Default for HistoryReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryReconciler {
    /// No room entered.
    pub fn new() -> Self {
        Self { phase: Phase::Idle, next_request: 0 }
    }

    /// Switch the subscription to `room_id` and start a history fetch.
    ///
    /// The previous timeline is discarded as soon as the switch succeeds.
    ///
    /// # Errors
    ///
    /// Whatever [`RoomSubscriptions::switch_to`] returns; state is
    /// unchanged on error.
    pub fn enter_room(
        &mut self,
        room_id: RoomId,
        subscriptions: &mut RoomSubscriptions,
        connection: &mut Connection,
        now: DateTime<Utc>,
    ) -> Result<EnterRoom, SessionError> {
        match subscriptions.switch_to(room_id, connection, now)? {
            Switch::Unchanged => Ok(EnterRoom::AlreadyActive),
            Switch::Switched { actions, .. } => {
                self.next_request += 1;
                let request = HistoryRequest { room_id, request_id: self.next_request };
                self.phase = Phase::Fetching { request, buffered: Vec::new() };
                tracing::debug!(room = %room_id, request = request.request_id, "fetching history");
                Ok(EnterRoom::Fetch { request, actions })
            },
        }
    }

    /// Accept a live message for the current room.
    ///
    /// Returns the message if it was appended to the visible timeline.
    /// While history is loading it is buffered instead and `None` is
    /// returned.
    pub fn on_live(&mut self, message: Message) -> Option<Message> {
        match &mut self.phase {
            Phase::Fetching { request, buffered } if request.room_id == message.room_id() => {
                buffered.push(message);
                None
            },
            Phase::Ready { timeline } => timeline.push_live(message.clone()).then_some(message),
            _ => {
                tracing::debug!(room = %message.room_id(), "live message outside current room");
                None
            },
        }
    }

    /// Complete a history fetch.
    ///
    /// Records without a timestamp are stamped with `received_at` plus their
    /// position in nanoseconds, so rows that repeat the same text stay
    /// distinct and keep the store's order. On failure the timeline is built
    /// from the buffered live messages alone.
    pub fn on_history(
        &mut self,
        request: HistoryRequest,
        result: Result<Vec<ChatRecord>, String>,
        received_at: DateTime<Utc>,
    ) -> HistoryOutcome {
        let buffered = match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Fetching { request: current, buffered } if current == request => buffered,
            other => {
                self.phase = other;
                tracing::debug!(
                    room = %request.room_id,
                    request = request.request_id,
                    "discarding stale history response"
                );
                return HistoryOutcome::Stale;
            },
        };

        let (history, outcome) = match result {
            Ok(records) => {
                let history: Vec<_> = records
                    .into_iter()
                    .enumerate()
                    .map(|(position, record)| {
                        let fallback = received_at + TimeDelta::nanoseconds(position as i64);
                        Message::from_record(request.room_id, record, Origin::History, fallback)
                    })
                    .collect();
                tracing::debug!(
                    room = %request.room_id,
                    history = history.len(),
                    buffered = buffered.len(),
                    "merging history"
                );
                (history, HistoryOutcome::Merged)
            },
            Err(reason) => {
                let error = SessionError::HistoryFetch { room_id: request.room_id, reason };
                tracing::warn!(%error, "falling back to live messages");
                (Vec::new(), HistoryOutcome::Degraded(error))
            },
        };

        let timeline = Timeline::merged(request.room_id, history, buffered);
        self.phase = Phase::Ready { timeline };
        outcome
    }

    /// Forget the current room.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Room being loaded or shown.
    pub fn room_id(&self) -> Option<RoomId> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Fetching { request, .. } => Some(request.room_id),
            Phase::Ready { timeline } => Some(timeline.room_id()),
        }
    }

    /// Fetch currently awaited.
    pub fn pending(&self) -> Option<HistoryRequest> {
        match &self.phase {
            Phase::Fetching { request, .. } => Some(*request),
            _ => None,
        }
    }

    /// Visible messages. Empty while history is loading.
    pub fn messages(&self) -> &[Message] {
        match &self.phase {
            Phase::Ready { timeline } => timeline.messages(),
            _ => &[],
        }
    }
}
