//! World state captured at the end of a scenario.
//!
//! The World is what oracles inspect: the session as the presentation layer
//! saw it, plus what the broker and the history store saw from their side.

use roomfeed_client::{ClientError, TimelineView};
use roomfeed_core::{ConnectionState, Message, SessionNotice};
use roomfeed_proto::RoomId;

use crate::sim_broker::BrokerEvent;

/// A step the session refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    /// Index of the step in the scenario
    pub step: usize,
    /// Error returned by the session
    pub error: ClientError,
}

/// Final state of one scenario run.
#[derive(Debug, Clone)]
pub struct World {
    state: ConnectionState,
    timeline: TimelineView,
    notices: Vec<SessionNotice>,
    refusals: Vec<Refusal>,
    broker_log: Vec<BrokerEvent>,
    history_calls: Vec<RoomId>,
}

impl World {
    /// Assemble a world from what the run observed.
    pub fn new(
        state: ConnectionState,
        timeline: TimelineView,
        notices: Vec<SessionNotice>,
        refusals: Vec<Refusal>,
        broker_log: Vec<BrokerEvent>,
        history_calls: Vec<RoomId>,
    ) -> Self {
        Self { state, timeline, notices, refusals, broker_log, history_calls }
    }

    /// Connection state at the end of the run.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Room the timeline shows.
    pub fn room(&self) -> Option<RoomId> {
        self.timeline.room_id
    }

    /// Messages on the timeline, in display order.
    pub fn messages(&self) -> &[Message] {
        &self.timeline.messages
    }

    /// Message contents on the timeline, in display order.
    pub fn contents(&self) -> Vec<&str> {
        self.timeline.messages.iter().map(Message::content).collect()
    }

    /// Notices delivered during the run.
    pub fn notices(&self) -> &[SessionNotice] {
        &self.notices
    }

    /// Steps the session refused.
    pub fn refusals(&self) -> &[Refusal] {
        &self.refusals
    }

    /// Everything the broker saw.
    pub fn broker_log(&self) -> &[BrokerEvent] {
        &self.broker_log
    }

    /// Rooms whose history was requested, in order.
    pub fn history_calls(&self) -> &[RoomId] {
        &self.history_calls
    }

    /// Subscriptions the client never released, by destination.
    pub fn open_subscriptions(&self) -> Vec<&str> {
        let mut open: Vec<(u64, &str, &str)> = Vec::new();
        for event in &self.broker_log {
            match event {
                BrokerEvent::Subscribed { session, id, destination } => {
                    open.push((*session, id.as_str(), destination.as_str()));
                },
                BrokerEvent::Unsubscribed { session, id } => {
                    open.retain(|(s, open_id, _)| !(s == session && *open_id == id.as_str()));
                },
                BrokerEvent::Disconnected { session } => open.retain(|(s, _, _)| s != session),
                _ => {},
            }
        }
        open.into_iter().map(|(_, _, destination)| destination).collect()
    }

    /// Check that the timeline has no content twice.
    pub fn timeline_has_no_duplicates(&self) -> bool {
        let contents = self.contents();
        contents.iter().enumerate().all(|(i, content)| !contents[..i].contains(content))
    }
}
