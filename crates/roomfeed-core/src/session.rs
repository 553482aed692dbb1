//! Session facade.
//!
//! Composes the connection, the room subscription and the history
//! reconciler behind one event-driven API. The runtime feeds every input
//! (user intents, socket events, frames, history responses, timer ticks)
//! through [`Session::handle`] one at a time and executes the returned
//! [`SessionAction`]s in order. Nothing here blocks or performs I/O, so a
//! single owner serializes all mutation without locks.

use std::fmt;

use roomfeed_proto::{
    AuthorId, ChatRecord, Frame, OutboundChat, PUBLISH_DESTINATION, ProtocolError, RoomId,
};

use crate::{
    connection::{
        Connection, ConnectionAction, ConnectionConfig, ConnectionState, Credentials,
        FailureReason, SubscriptionHandle,
    },
    env::Environment,
    error::{ConnectionError, SessionError},
    message::{Message, OutboundIntent},
    reconciler::{EnterRoom, HistoryOutcome, HistoryReconciler, HistoryRequest},
    subscription::RoomSubscriptions,
};

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Author stamped on outbound messages
    pub author_id: AuthorId,
    /// Broker connection settings
    pub connection: ConnectionConfig,
}

impl SessionConfig {
    /// Defaults for everything but the author.
    pub fn new(author_id: AuthorId) -> Self {
        Self { author_id, connection: ConnectionConfig::default() }
    }
}

/// Inputs to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// User asked to connect.
    Connect(Credentials),
    /// User asked to disconnect.
    Disconnect,
    /// User picked a room.
    SwitchRoom(RoomId),
    /// User submitted a message for the current room.
    Send(String),
    /// Socket requested by [`SessionAction::OpenSocket`] is open.
    SocketOpened,
    /// Socket closed by the peer.
    SocketClosed,
    /// Socket failed to open, read or write.
    SocketError(String),
    /// Frame received from the broker.
    FrameReceived(Frame),
    /// Bytes received from the broker did not form a frame.
    FrameRejected(ProtocolError),
    /// History fetch completed.
    HistoryLoaded {
        /// The request being answered
        request: HistoryRequest,
        /// Records in backend order, or the failure reason
        result: Result<Vec<ChatRecord>, String>,
    },
    /// Periodic timer.
    Tick,
}

/// Effects for the runtime to execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Open a socket to the broker.
    OpenSocket(Credentials),
    /// Write a frame.
    SendFrame(Frame),
    /// Close the socket.
    CloseSocket,
    /// Fetch history and answer with [`SessionEvent::HistoryLoaded`].
    FetchHistory(HistoryRequest),
    /// Connection state changed.
    StateChanged(ConnectionState),
    /// Replace the visible timeline.
    TimelineReset {
        /// Room the timeline belongs to, `None` when no room is selected
        room_id: Option<RoomId>,
        /// Full message list
        messages: Vec<Message>,
    },
    /// Append one message to the visible timeline.
    TimelineAppended(Message),
    /// Advisory for the user.
    Notice(SessionNotice),
}

/// Advisory events that do not change the timeline by themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// History could not be loaded; the timeline shows live traffic only.
    HistoryUnavailable {
        /// Affected room
        room_id: RoomId,
        /// Failure reason
        reason: String,
    },
    /// An inbound frame was dropped.
    MalformedFrame {
        /// Decode error
        reason: String,
    },
    /// The broker rejected the session.
    BrokerError {
        /// Broker's message header
        message: String,
    },
    /// The connection dropped.
    ConnectionLost {
        /// What happened
        reason: String,
    },
}

impl fmt::Display for SessionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HistoryUnavailable { reason, .. } => {
                write!(f, "{reason} (showing live messages only)")
            },
            Self::MalformedFrame { reason } => write!(f, "dropped malformed frame: {reason}"),
            Self::BrokerError { message } => write!(f, "broker error: {message}"),
            Self::ConnectionLost { reason } => write!(f, "connection lost: {reason}"),
        }
    }
}

/// The session state machine.
#[derive(Debug)]
pub struct Session<E: Environment> {
    env: E,
    author_id: AuthorId,
    connection: Connection,
    subscriptions: RoomSubscriptions,
    reconciler: HistoryReconciler,
}

impl<E: Environment> Session<E> {
    /// New disconnected session.
    pub fn new(env: E, config: SessionConfig) -> Self {
        Self {
            env,
            author_id: config.author_id,
            connection: Connection::new(config.connection),
            subscriptions: RoomSubscriptions::new(),
            reconciler: HistoryReconciler::new(),
        }
    }

    /// Process one input.
    ///
    /// # Errors
    ///
    /// Only user intents fail: `NotConnected` for `SwitchRoom`/`Send`
    /// outside `Connected`, `NoActiveRoom` for `Send` before any room,
    /// `Connection` for `Connect` during a disconnect. Failed intents
    /// change nothing. Problems with inbound traffic are handled here and
    /// reported as [`SessionNotice`]s instead.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        let mut out = Vec::new();
        match event {
            SessionEvent::Connect(credentials) => {
                let actions = self.connection.connect(credentials, self.env.now())?;
                self.apply(actions, &mut out);
            },
            SessionEvent::Disconnect => self.disconnect(&mut out),
            SessionEvent::SwitchRoom(room_id) => self.switch_room(room_id, &mut out)?,
            SessionEvent::Send(content) => self.send(content, &mut out)?,
            SessionEvent::SocketOpened => {
                let actions = self.connection.socket_opened();
                self.apply(actions, &mut out);
            },
            SessionEvent::SocketClosed => {
                let actions = self.connection.socket_lost(FailureReason::SocketClosed);
                self.apply(actions, &mut out);
            },
            SessionEvent::SocketError(reason) => {
                let actions = self.connection.socket_lost(FailureReason::Socket(reason));
                self.apply(actions, &mut out);
            },
            SessionEvent::FrameReceived(frame) => self.on_frame(frame, &mut out),
            SessionEvent::FrameRejected(err) => {
                tracing::warn!(%err, "dropping undecodable frame");
                out.push(SessionAction::Notice(SessionNotice::MalformedFrame {
                    reason: err.to_string(),
                }));
            },
            SessionEvent::HistoryLoaded { request, result } => {
                self.on_history(request, result, &mut out);
            },
            SessionEvent::Tick => {
                let actions = self.connection.tick(self.env.now());
                self.apply(actions, &mut out);
            },
        }
        Ok(out)
    }

    /// Connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Room the user is in.
    pub fn current_room(&self) -> Option<RoomId> {
        self.subscriptions.current_room()
    }

    /// Visible timeline of the current room.
    pub fn timeline(&self) -> &[Message] {
        self.reconciler.messages()
    }

    /// History fetch currently awaited.
    pub fn pending_history(&self) -> Option<HistoryRequest> {
        self.reconciler.pending()
    }

    /// Currently active subscription handle.
    pub fn subscription(&self) -> Option<SubscriptionHandle> {
        self.subscriptions.active().map(|sub| sub.handle())
    }

    fn disconnect(&mut self, out: &mut Vec<SessionAction>) {
        let released = self.subscriptions.release(&mut self.connection);
        self.apply(released, out);

        if self.reconciler.room_id().is_some() {
            self.reconciler.reset();
            out.push(SessionAction::TimelineReset { room_id: None, messages: Vec::new() });
        }

        let actions = self.connection.disconnect(self.env.now());
        self.apply(actions, out);
    }

    fn switch_room(
        &mut self,
        room_id: RoomId,
        out: &mut Vec<SessionAction>,
    ) -> Result<(), SessionError> {
        let entered = self.reconciler.enter_room(
            room_id,
            &mut self.subscriptions,
            &mut self.connection,
            self.env.wall_clock(),
        )?;

        if let EnterRoom::Fetch { request, actions } = entered {
            self.apply(actions, out);
            out.push(SessionAction::TimelineReset { room_id: Some(room_id), messages: Vec::new() });
            out.push(SessionAction::FetchHistory(request));
        }
        Ok(())
    }

    fn send(&mut self, content: String, out: &mut Vec<SessionAction>) -> Result<(), SessionError> {
        let room_id = self.subscriptions.current_room().ok_or(SessionError::NoActiveRoom)?;
        let intent = OutboundIntent {
            room_id,
            content,
            author_id: self.author_id,
            created_at: self.env.wall_clock(),
        };
        let json = OutboundChat::from(intent).to_json().map_err(SessionError::MalformedFrame)?;

        let actions = self.connection.publish(PUBLISH_DESTINATION, json)?;
        self.apply(actions, out);
        Ok(())
    }

    fn on_frame(&mut self, frame: Frame, out: &mut Vec<SessionAction>) {
        match self.connection.handle_frame(frame) {
            Ok(actions) => self.apply(actions, out),
            Err(ConnectionError::Protocol(err)) => {
                tracing::warn!(%err, "dropping malformed frame");
                out.push(SessionAction::Notice(SessionNotice::MalformedFrame {
                    reason: err.to_string(),
                }));
            },
            Err(err) => tracing::warn!(%err, "ignoring frame"),
        }
    }

    fn on_history(
        &mut self,
        request: HistoryRequest,
        result: Result<Vec<ChatRecord>, String>,
        out: &mut Vec<SessionAction>,
    ) {
        match self.reconciler.on_history(request, result, self.env.wall_clock()) {
            HistoryOutcome::Stale => {},
            HistoryOutcome::Merged => out.push(self.timeline_reset()),
            HistoryOutcome::Degraded(error) => {
                out.push(self.timeline_reset());
                out.push(SessionAction::Notice(SessionNotice::HistoryUnavailable {
                    room_id: request.room_id,
                    reason: error.to_string(),
                }));
            },
        }
    }

    fn deliver(&mut self, handle: SubscriptionHandle, frame: &Frame, out: &mut Vec<SessionAction>) {
        match self.subscriptions.decode(handle, frame, self.env.wall_clock()) {
            Ok(Some(message)) => {
                if let Some(appended) = self.reconciler.on_live(message) {
                    out.push(SessionAction::TimelineAppended(appended));
                }
            },
            Ok(None) => {},
            Err(err) => {
                tracing::warn!(%err, %handle, "dropping live frame");
                out.push(SessionAction::Notice(SessionNotice::MalformedFrame {
                    reason: err.to_string(),
                }));
            },
        }
    }

    fn apply(&mut self, actions: Vec<ConnectionAction>, out: &mut Vec<SessionAction>) {
        for action in actions {
            match action {
                ConnectionAction::OpenSocket { credentials } => {
                    out.push(SessionAction::OpenSocket(credentials));
                },
                ConnectionAction::SendFrame(frame) => out.push(SessionAction::SendFrame(frame)),
                ConnectionAction::CloseSocket => out.push(SessionAction::CloseSocket),
                ConnectionAction::Deliver { handle, frame } => self.deliver(handle, &frame, out),
                ConnectionAction::Failed(reason) => {
                    let notice = match reason {
                        FailureReason::Broker { message } => SessionNotice::BrokerError { message },
                        other => SessionNotice::ConnectionLost { reason: other.to_string() },
                    };
                    out.push(SessionAction::Notice(notice));
                },
                ConnectionAction::StateChanged(state) => {
                    if matches!(state, ConnectionState::Failed | ConnectionState::Disconnected) {
                        self.subscriptions.forget();
                    }
                    out.push(SessionAction::StateChanged(state));
                },
            }
        }
    }

    fn timeline_reset(&self) -> SessionAction {
        SessionAction::TimelineReset {
            room_id: self.reconciler.room_id(),
            messages: self.reconciler.messages().to_vec(),
        }
    }
}
