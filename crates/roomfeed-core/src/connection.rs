//! Broker connection state machine.
//!
//! Owns the STOMP session: handshake, subscriptions, publishing and graceful
//! shutdown. Sockets are somebody else's problem; every method returns the
//! effects it wants as [`ConnectionAction`]s and the runtime executes them.
//!
//! # State Machine
//!
//! ```text
//!               connect              CONNECTED
//! Disconnected ─────────> Connecting ─────────> Connected
//!      ^                      │                     │
//!      │                      │ timeout / ERROR /   │ disconnect
//!      │                      │ socket lost         v
//!      │                      v               Disconnecting
//!      │                    Failed                  │
//!      └────────────────────────────────────────────┘
//!             RECEIPT / socket closed / timeout
//! ```
//!
//! `Connected` fails the same way as `Connecting` does.
//!
//! `Failed` is left with another `connect` (straight to `Connecting`) or a
//! `disconnect` (straight to `Disconnected`).
//!
//! # Subscriptions
//!
//! Each subscription gets a fresh [`SubscriptionHandle`], which doubles as
//! the STOMP `id` header. `MESSAGE` frames are routed by their
//! `subscription` header; frames for handles that are no longer active are
//! dropped, which is how late deliveries for a previous room are discarded.

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use roomfeed_proto::{Command, Frame, ProtocolError, headers};

use crate::error::ConnectionError;

/// Effects requested by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open a socket to the broker, then report back with
    /// [`Connection::socket_opened`] or [`Connection::socket_lost`].
    OpenSocket {
        /// Credentials for the socket upgrade request
        credentials: Credentials,
    },

    /// Write this frame to the socket.
    SendFrame(Frame),

    /// Close the socket.
    CloseSocket,

    /// Hand a `MESSAGE` frame to the owner of `handle`.
    Deliver {
        /// Subscription the frame arrived on
        handle: SubscriptionHandle,
        /// The frame itself
        frame: Frame,
    },

    /// The connection moved to a new state.
    StateChanged(ConnectionState),

    /// The connection failed; always followed by `StateChanged(Failed)`.
    Failed(FailureReason),
}

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No socket.
    Disconnected,
    /// Socket opening or STOMP handshake in flight.
    Connecting,
    /// Broker session established.
    Connected,
    /// `DISCONNECT` sent or socket closing.
    Disconnecting,
    /// Connection lost or rejected.
    Failed,
}

/// Why a connection ended up in [`ConnectionState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Broker sent an `ERROR` frame.
    Broker {
        /// The frame's `message` header
        message: String,
    },
    /// No `CONNECTED` within the handshake timeout.
    HandshakeTimeout(Duration),
    /// Socket closed by the peer.
    SocketClosed,
    /// Socket could not be opened, read or written.
    Socket(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broker { message } => write!(f, "broker error: {message}"),
            Self::HandshakeTimeout(after) => write!(f, "handshake timed out after {after:?}"),
            Self::SocketClosed => f.write_str("socket closed by peer"),
            Self::Socket(reason) => write!(f, "socket error: {reason}"),
        }
    }
}

/// Opaque bearer credentials, forwarded on the socket upgrade and in
/// `CONNECT`.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    bearer: Option<String>,
}

impl Credentials {
    /// No credentials.
    pub fn anonymous() -> Self {
        Self { bearer: None }
    }

    /// Bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self { bearer: Some(token.into()) }
    }

    /// The token, if any.
    pub fn token(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.bearer.is_some() { "Bearer <redacted>" } else { "anonymous" };
        f.debug_tuple("Credentials").field(&shown).finish()
    }
}

/// Identifies one subscription for the lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    /// Parse the `sub-N` form used on the wire.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.strip_prefix("sub-").and_then(|n| n.parse().ok()).map(Self)
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Time allowed from `connect` to `CONNECTED`, and from `DISCONNECT` to
    /// its receipt
    pub handshake_timeout: Duration,
    /// Value of the STOMP `host` header
    pub host: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { handshake_timeout: Duration::from_secs(10), host: "/".to_string() }
    }
}

/// Broker connection state machine.
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    config: ConnectionConfig,
    /// When the current Connecting/Disconnecting phase began
    phase_started: Option<Instant>,
    /// Credentials held until the socket opens
    pending_credentials: Option<Credentials>,
    session_id: Option<String>,
    /// Active handle -> destination
    subscriptions: HashMap<SubscriptionHandle, String>,
    next_subscription: u64,
    disconnect_receipt: Option<String>,
    next_receipt: u64,
}

impl Connection {
    /// Create a connection in `Disconnected`.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            config,
            phase_started: None,
            pending_credentials: None,
            session_id: None,
            subscriptions: HashMap::new(),
            next_subscription: 0,
            disconnect_receipt: None,
            next_receipt: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a broker session is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Session id from `CONNECTED`, if the broker sent one.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Whether `handle` still receives deliveries.
    #[must_use]
    pub fn is_active(&self, handle: SubscriptionHandle) -> bool {
        self.subscriptions.contains_key(&handle)
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Start connecting.
    ///
    /// A no-op while already connecting or connected.
    ///
    /// # Errors
    ///
    /// `InvalidState` while a disconnect is still in progress.
    pub fn connect(
        &mut self,
        credentials: Credentials,
        now: Instant,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                tracing::debug!(state = ?self.state, "connect ignored");
                Ok(vec![])
            },
            ConnectionState::Disconnecting => {
                Err(ConnectionError::InvalidState { state: self.state, operation: "connect" })
            },
            ConnectionState::Disconnected | ConnectionState::Failed => {
                self.phase_started = Some(now);
                self.pending_credentials = Some(credentials.clone());
                self.session_id = None;
                Ok(vec![
                    self.transition(ConnectionState::Connecting),
                    ConnectionAction::OpenSocket { credentials },
                ])
            },
        }
    }

    /// The socket asked for by `OpenSocket` is open; send `CONNECT`.
    ///
    /// If the connection is no longer waiting for a socket (it was cancelled
    /// in the meantime), the new socket is closed straight away.
    pub fn socket_opened(&mut self) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Connecting {
            tracing::debug!(state = ?self.state, "closing socket that opened too late");
            return vec![ConnectionAction::CloseSocket];
        }

        let credentials = self.pending_credentials.take().unwrap_or_default();
        vec![ConnectionAction::SendFrame(Frame::connect(&self.config.host, credentials.token()))]
    }

    /// The socket failed to open, failed mid-stream or was closed.
    ///
    /// Completes a pending disconnect; anywhere else it is a failure.
    pub fn socket_lost(&mut self, reason: FailureReason) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Disconnecting => self.finish_disconnect(),
            ConnectionState::Connecting | ConnectionState::Connected => self.fail(reason),
            ConnectionState::Disconnected | ConnectionState::Failed => vec![],
        }
    }

    /// Begin a graceful disconnect.
    ///
    /// From `Connected` a `DISCONNECT` with a receipt request is sent and
    /// the connection waits in `Disconnecting` for the receipt or for the
    /// socket to close. A handshake in flight is abandoned immediately.
    /// Calling it when already disconnected is a no-op.
    pub fn disconnect(&mut self, now: Instant) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connected => {
                self.next_receipt += 1;
                let receipt = format!("disconnect-{}", self.next_receipt);
                let frame = Frame::disconnect(&receipt);
                self.disconnect_receipt = Some(receipt);
                self.phase_started = Some(now);
                self.subscriptions.clear();
                vec![
                    self.transition(ConnectionState::Disconnecting),
                    ConnectionAction::SendFrame(frame),
                ]
            },
            ConnectionState::Connecting => {
                let mut actions = vec![self.transition(ConnectionState::Disconnecting)];
                actions.extend(self.finish_disconnect());
                actions
            },
            ConnectionState::Failed => {
                self.reset();
                vec![self.transition(ConnectionState::Disconnected)]
            },
            ConnectionState::Disconnected | ConnectionState::Disconnecting => vec![],
        }
    }

    /// Subscribe to `destination`.
    ///
    /// # Errors
    ///
    /// `NotConnected` unless a broker session is established.
    pub fn subscribe(
        &mut self,
        destination: &str,
    ) -> Result<(SubscriptionHandle, Vec<ConnectionAction>), ConnectionError> {
        self.require_connected()?;

        self.next_subscription += 1;
        let handle = SubscriptionHandle(self.next_subscription);
        self.subscriptions.insert(handle, destination.to_string());
        tracing::debug!(%handle, destination, "subscribing");

        let frame = Frame::subscribe(&handle.to_string(), destination);
        Ok((handle, vec![ConnectionAction::SendFrame(frame)]))
    }

    /// Drop a subscription. Deliveries for `handle` stop immediately.
    ///
    /// Idempotent; `UNSUBSCRIBE` is only sent while connected.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Vec<ConnectionAction> {
        if self.subscriptions.remove(&handle).is_none() {
            return vec![];
        }
        tracing::debug!(%handle, "unsubscribing");

        if self.is_connected() {
            vec![ConnectionAction::SendFrame(Frame::unsubscribe(&handle.to_string()))]
        } else {
            vec![]
        }
    }

    /// Publish a JSON body to `destination`.
    ///
    /// # Errors
    ///
    /// `NotConnected` unless a broker session is established.
    pub fn publish(
        &mut self,
        destination: &str,
        json: String,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        self.require_connected()?;
        Ok(vec![ConnectionAction::SendFrame(Frame::send(destination, json))])
    }

    /// Handle a frame received from the broker.
    ///
    /// # Errors
    ///
    /// `UnexpectedFrame` for frames that make no sense in the current state
    /// and `Protocol` for `MESSAGE` frames without a usable subscription.
    /// Neither changes state.
    pub fn handle_frame(&mut self, frame: Frame) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match (self.state, frame.command()) {
            (ConnectionState::Connecting, Command::Connected) => {
                self.session_id = frame.header(headers::SESSION).map(str::to_string);
                self.phase_started = None;
                tracing::info!(session = ?self.session_id, "connected to broker");
                Ok(vec![self.transition(ConnectionState::Connected)])
            },
            (
                ConnectionState::Connecting
                | ConnectionState::Connected
                | ConnectionState::Disconnecting,
                Command::Error,
            ) => {
                let message = frame.header(headers::MESSAGE).unwrap_or("unspecified").to_string();
                tracing::warn!(%message, body = ?frame.body_str().ok(), "broker error");
                Ok(self.fail(FailureReason::Broker { message }))
            },
            (ConnectionState::Connected | ConnectionState::Disconnecting, Command::Message) => {
                self.route_message(frame)
            },
            (ConnectionState::Disconnecting, Command::Receipt) => {
                let receipt = frame.require_header(headers::RECEIPT_ID)?;
                if self.disconnect_receipt.as_deref() == Some(receipt) {
                    Ok(self.finish_disconnect())
                } else {
                    tracing::debug!(receipt, "ignoring unrelated receipt");
                    Ok(vec![])
                }
            },
            (ConnectionState::Connected, Command::Receipt) => Ok(vec![]),
            (state, command) => Err(ConnectionError::UnexpectedFrame { state, command }),
        }
    }

    /// Check timeouts. Call periodically.
    pub fn tick(&mut self, now: Instant) -> Vec<ConnectionAction> {
        let Some(started) = self.phase_started else {
            return vec![];
        };
        let elapsed = now.duration_since(started);
        if elapsed <= self.config.handshake_timeout {
            return vec![];
        }

        match self.state {
            ConnectionState::Connecting => self.fail(FailureReason::HandshakeTimeout(elapsed)),
            ConnectionState::Disconnecting => {
                tracing::debug!(?elapsed, "no disconnect receipt, closing anyway");
                self.finish_disconnect()
            },
            _ => {
                self.phase_started = None;
                vec![]
            },
        }
    }

    fn route_message(&mut self, frame: Frame) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let raw = frame.require_header(headers::SUBSCRIPTION)?;
        let handle = SubscriptionHandle::parse(raw)
            .ok_or_else(|| ProtocolError::MalformedHeader(format!("subscription:{raw}")))?;

        match self.subscriptions.get(&handle) {
            Some(_) => Ok(vec![ConnectionAction::Deliver { handle, frame }]),
            None => {
                tracing::debug!(%handle, "dropping delivery for inactive subscription");
                Ok(vec![])
            },
        }
    }

    fn require_connected(&self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected { state: self.state })
        }
    }

    fn fail(&mut self, reason: FailureReason) -> Vec<ConnectionAction> {
        tracing::warn!(%reason, from = ?self.state, "connection failed");
        self.reset();
        vec![
            ConnectionAction::CloseSocket,
            ConnectionAction::Failed(reason),
            self.transition(ConnectionState::Failed),
        ]
    }

    fn finish_disconnect(&mut self) -> Vec<ConnectionAction> {
        self.reset();
        vec![ConnectionAction::CloseSocket, self.transition(ConnectionState::Disconnected)]
    }

    fn reset(&mut self) {
        self.phase_started = None;
        self.pending_credentials = None;
        self.session_id = None;
        self.subscriptions.clear();
        self.disconnect_receipt = None;
    }

    fn transition(&mut self, to: ConnectionState) -> ConnectionAction {
        tracing::debug!(from = ?self.state, ?to, "connection state change");
        self.state = to;
        ConnectionAction::StateChanged(to)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn connected(t0: Instant) -> Connection {
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(Credentials::anonymous(), t0).unwrap();
        conn.socket_opened();
        conn.handle_frame(Frame::connected("s-1")).unwrap();
        conn
    }

    fn sent(actions: &[ConnectionAction]) -> Vec<Frame> {
        actions
            .iter()
            .filter_map(|a| match a {
                ConnectionAction::SendFrame(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    fn delivery(handle: SubscriptionHandle) -> Frame {
        Frame::message(
            "/topic/greetings/1",
            &handle.to_string(),
            "m-1",
            Bytes::from_static(br#"{"content":"hi"}"#),
        )
    }

    #[test]
    fn connection_lifecycle() {
        let t0 = Instant::now();
        let mut conn = Connection::new(ConnectionConfig::default());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        let actions = conn.connect(Credentials::bearer("tok"), t0).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);
        assert_eq!(actions[0], ConnectionAction::StateChanged(ConnectionState::Connecting));
        assert!(matches!(actions[1], ConnectionAction::OpenSocket { .. }));

        let frames = sent(&conn.socket_opened());
        assert_eq!(frames[0].command(), Command::Connect);
        assert_eq!(frames[0].header("Authorization"), Some("Bearer tok"));

        let actions = conn.handle_frame(Frame::connected("s-1")).unwrap();
        assert_eq!(actions, vec![ConnectionAction::StateChanged(ConnectionState::Connected)]);
        assert_eq!(conn.session_id(), Some("s-1"));

        let actions = conn.disconnect(t0);
        assert_eq!(conn.state(), ConnectionState::Disconnecting);
        let frames = sent(&actions);
        assert_eq!(frames[0].command(), Command::Disconnect);
        let receipt = frames[0].header("receipt").unwrap().to_string();

        let actions = conn.handle_frame(Frame::receipt(&receipt)).unwrap();
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(actions.contains(&ConnectionAction::CloseSocket));
        assert_eq!(conn.session_id(), None);
    }

    #[test]
    fn connect_is_idempotent_while_connecting_or_connected() {
        let t0 = Instant::now();
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(Credentials::anonymous(), t0).unwrap();
        assert!(conn.connect(Credentials::anonymous(), t0).unwrap().is_empty());

        let mut conn = connected(t0);
        assert!(conn.connect(Credentials::anonymous(), t0).unwrap().is_empty());
        assert!(conn.is_connected());
    }

    #[test]
    fn connect_while_disconnecting_is_refused() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.disconnect(t0);

        let result = conn.connect(Credentials::anonymous(), t0);
        assert!(matches!(result, Err(ConnectionError::InvalidState { operation: "connect", .. })));
    }

    #[test]
    fn disconnect_when_disconnected_is_a_noop() {
        let mut conn = Connection::new(ConnectionConfig::default());
        assert!(conn.disconnect(Instant::now()).is_empty());
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_during_handshake_closes_immediately() {
        let t0 = Instant::now();
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(Credentials::anonymous(), t0).unwrap();

        let actions = conn.disconnect(t0);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert_eq!(
            actions,
            vec![
                ConnectionAction::StateChanged(ConnectionState::Disconnecting),
                ConnectionAction::CloseSocket,
                ConnectionAction::StateChanged(ConnectionState::Disconnected),
            ]
        );

        // Socket shows up after the cancel.
        assert_eq!(conn.socket_opened(), vec![ConnectionAction::CloseSocket]);
    }

    #[test]
    fn socket_close_completes_disconnect_without_receipt() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.disconnect(t0);

        conn.socket_lost(FailureReason::SocketClosed);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn missing_receipt_times_out_to_disconnected() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.disconnect(t0);

        assert!(conn.tick(t0 + Duration::from_secs(5)).is_empty());
        conn.tick(t0 + Duration::from_secs(11));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn handshake_timeout_fails_connection() {
        let t0 = Instant::now();
        let config = ConnectionConfig { handshake_timeout: Duration::from_secs(3), ..Default::default() };
        let mut conn = Connection::new(config);
        conn.connect(Credentials::anonymous(), t0).unwrap();
        conn.socket_opened();

        assert!(conn.tick(t0 + Duration::from_secs(2)).is_empty());

        let actions = conn.tick(t0 + Duration::from_secs(4));
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert!(actions.contains(&ConnectionAction::CloseSocket));
        assert!(
            actions
                .iter()
                .any(|a| matches!(a, ConnectionAction::Failed(FailureReason::HandshakeTimeout(_))))
        );
    }

    #[test]
    fn broker_error_fails_connection() {
        let t0 = Instant::now();
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.connect(Credentials::bearer("bad"), t0).unwrap();
        conn.socket_opened();

        let actions = conn.handle_frame(Frame::error("Access denied", "invalid token")).unwrap();
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert!(actions.contains(&ConnectionAction::Failed(FailureReason::Broker {
            message: "Access denied".into()
        })));
    }

    #[test]
    fn failed_connection_can_reconnect_or_reset() {
        let t0 = Instant::now();
        let mut conn = connected(t0);
        conn.socket_lost(FailureReason::SocketClosed);
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert_eq!(conn.active_subscriptions(), 0);

        conn.connect(Credentials::anonymous(), t0).unwrap();
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let mut conn = connected(t0);
        conn.socket_lost(FailureReason::Socket("reset".into()));
        conn.disconnect(t0);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn subscribe_requires_connection() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let result = conn.subscribe("/topic/greetings/1");
        assert!(matches!(
            result,
            Err(ConnectionError::NotConnected { state: ConnectionState::Disconnected })
        ));
        assert!(matches!(
            conn.publish("/app/hello", "{}".into()),
            Err(ConnectionError::NotConnected { .. })
        ));
    }

    #[test]
    fn subscriptions_get_distinct_handles() {
        let mut conn = connected(Instant::now());
        let (a, actions) = conn.subscribe("/topic/greetings/1").unwrap();
        let (b, _) = conn.subscribe("/topic/greetings/1").unwrap();
        assert_ne!(a, b);

        let frame = &sent(&actions)[0];
        assert_eq!(frame.command(), Command::Subscribe);
        assert_eq!(frame.header("id"), Some(a.to_string().as_str()));
        assert_eq!(frame.header("destination"), Some("/topic/greetings/1"));
    }

    #[test]
    fn deliveries_route_to_active_handles_only() {
        let mut conn = connected(Instant::now());
        let (handle, _) = conn.subscribe("/topic/greetings/1").unwrap();

        let actions = conn.handle_frame(delivery(handle)).unwrap();
        assert!(matches!(&actions[..], [ConnectionAction::Deliver { handle: h, .. }] if *h == handle));

        let frames = sent(&conn.unsubscribe(handle));
        assert_eq!(frames[0].command(), Command::Unsubscribe);
        assert!(!conn.is_active(handle));

        // Late delivery after unsubscribe.
        assert!(conn.handle_frame(delivery(handle)).unwrap().is_empty());
        // Unsubscribe again is a no-op.
        assert!(conn.unsubscribe(handle).is_empty());
    }

    #[test]
    fn message_without_subscription_header_is_a_protocol_error() {
        let mut conn = connected(Instant::now());
        let frame = Frame::new(Command::Message).with_header("destination", "/topic/greetings/1");
        assert!(matches!(conn.handle_frame(frame), Err(ConnectionError::Protocol(_))));
        assert!(conn.is_connected());
    }

    #[test]
    fn unexpected_frames_leave_state_alone() {
        let mut conn = Connection::new(ConnectionConfig::default());
        let result = conn.handle_frame(Frame::connected("s"));
        assert!(matches!(
            result,
            Err(ConnectionError::UnexpectedFrame { command: Command::Connected, .. })
        ));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn credentials_do_not_leak_into_debug_output() {
        let shown = format!("{:?}", Credentials::bearer("secret-token"));
        assert!(!shown.contains("secret-token"));
    }
}
