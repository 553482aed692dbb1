//! Simulated STOMP broker.
//!
//! Runs as a Turmoil host and behaves like the chat backend's message
//! broker: it answers `CONNECT`, tracks subscriptions per connection, and
//! rebroadcasts every `SEND` to the publish route onto the sender's room
//! topic, assigning a message id on the way. Everything a client asks of it
//! is appended to a log that tests assert against.
//!
//! ```text
//!  client ──CONNECT──────────────> broker ──CONNECTED──> client
//!  client ──SUBSCRIBE /topic/..──> broker
//!  client ──SEND /app/hello──────> broker ──MESSAGE────> every subscriber
//!  client ──DISCONNECT receipt──> broker ──RECEIPT────> client, then close
//! ```

use std::{
    collections::HashMap,
    io,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use roomfeed_proto::{
    ChatRecord, Command, Frame, FrameDecoder, PUBLISH_DESTINATION, RoomId, headers,
    room_from_topic, room_topic,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::mpsc,
};
use turmoil::net::{TcpListener, TcpStream};

use crate::sim_history::SimHistory;

/// Port the simulated broker listens on.
pub const BROKER_PORT: u16 = 61613;

const READ_CHUNK: usize = 4096;

/// What a client did, as seen by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEvent {
    /// `CONNECT`, with the bearer token if one was presented.
    Connected {
        /// Broker-assigned connection number
        session: u64,
        /// Bearer token from the `Authorization` header
        token: Option<String>,
    },
    /// `CONNECT` refused because the token did not match.
    Rejected {
        /// Broker-assigned connection number
        session: u64,
    },
    /// `SUBSCRIBE`.
    Subscribed {
        /// Broker-assigned connection number
        session: u64,
        /// Client-chosen subscription id
        id: String,
        /// Topic subscribed to
        destination: String,
    },
    /// `UNSUBSCRIBE`.
    Unsubscribed {
        /// Broker-assigned connection number
        session: u64,
        /// Subscription id released
        id: String,
    },
    /// `SEND`.
    Published {
        /// Broker-assigned connection number
        session: u64,
        /// Destination header
        destination: String,
        /// Frame body
        body: String,
    },
    /// `DISCONNECT`.
    Disconnected {
        /// Broker-assigned connection number
        session: u64,
    },
}

/// Handle to a broker. Clones share state, so a test can keep one while
/// the Turmoil host runs another.
#[derive(Debug, Clone, Default)]
pub struct SimBroker {
    inner: Arc<Mutex<BrokerState>>,
}

#[derive(Debug, Default)]
struct BrokerState {
    required_token: Option<String>,
    history: Option<SimHistory>,
    next_session: u64,
    next_message: u64,
    next_delivery: u64,
    connections: HashMap<u64, Peer>,
    log: Vec<BrokerEvent>,
}

#[derive(Debug)]
struct Peer {
    outbound: mpsc::UnboundedSender<Outbound>,
    subscriptions: HashMap<String, String>,
}

#[derive(Debug)]
enum Outbound {
    Frame(Frame),
    Close,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

impl SimBroker {
    /// Broker accepting any client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse `CONNECT` unless it carries `Bearer <token>`.
    #[must_use]
    pub fn with_required_token(self, token: impl Into<String>) -> Self {
        self.lock().required_token = Some(token.into());
        self
    }

    /// Store every rebroadcast message in `history`, as the backend does.
    #[must_use]
    pub fn with_history(self, history: SimHistory) -> Self {
        self.lock().history = Some(history);
        self
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept connections on `port` forever. Run inside a Turmoil host.
    pub async fn serve(self, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind((IpAddr::from(Ipv4Addr::UNSPECIFIED), port)).await?;
        loop {
            let (stream, peer) = listener.accept().await?;
            let broker = self.clone();
            tokio::spawn(async move {
                if let Err(err) = broker.connection(stream).await {
                    tracing::debug!(%peer, %err, "broker connection ended with error");
                }
            });
        }
    }

    /// Everything clients did so far.
    pub fn log(&self) -> Vec<BrokerEvent> {
        self.lock().log.clone()
    }

    /// Live subscriptions to the topic of `room_id`, across all connections.
    pub fn subscribers(&self, room_id: RoomId) -> usize {
        let topic = room_topic(room_id);
        self.lock()
            .connections
            .values()
            .flat_map(|peer| peer.subscriptions.values())
            .filter(|destination| **destination == topic)
            .count()
    }

    /// Deliver `record` to every subscriber of `room_id`, as if another
    /// participant had sent it. Returns the number of deliveries.
    pub fn inject(&self, room_id: RoomId, record: &ChatRecord) -> usize {
        match record.to_json() {
            Ok(body) => self.lock().deliver(room_id, &body),
            Err(err) => {
                tracing::warn!(%err, "unserializable record not injected");
                0
            },
        }
    }

    /// Deliver an arbitrary body to every subscriber of `room_id`.
    pub fn inject_raw(&self, room_id: RoomId, body: &str) -> usize {
        self.lock().deliver(room_id, body)
    }

    /// Close every client connection without a `RECEIPT`.
    pub fn drop_connections(&self) {
        let mut state = self.lock();
        for (session, peer) in state.connections.drain() {
            tracing::debug!(session, "dropping connection");
            let _ = peer.outbound.send(Outbound::Close);
        }
    }

    async fn connection(self, stream: TcpStream) -> io::Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (outbound, mut queue) = mpsc::unbounded_channel();
        let session = self.register(outbound.clone());

        let write = tokio::spawn(async move {
            while let Some(Outbound::Frame(frame)) = queue.recv().await {
                writer.write_all(&frame.to_bytes()).await?;
            }
            writer.shutdown().await
        });

        let mut decoder = FrameDecoder::new();
        let mut buf = vec![0; READ_CHUNK];
        'read: loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            decoder.extend(&buf[..n]);
            loop {
                match decoder.next_frame() {
                    Ok(Some(frame)) => {
                        if self.on_frame(session, &frame, &outbound) == Flow::Close {
                            break 'read;
                        }
                    },
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!(session, %err, "undecodable client frame");
                        let _ = outbound.send(Outbound::Frame(Frame::error(
                            "malformed frame",
                            &err.to_string(),
                        )));
                        break 'read;
                    },
                }
            }
        }

        let _ = outbound.send(Outbound::Close);
        self.lock().connections.remove(&session);
        drop(outbound);
        write.await.map_err(io::Error::other)?
    }

    fn register(&self, outbound: mpsc::UnboundedSender<Outbound>) -> u64 {
        let mut state = self.lock();
        state.next_session += 1;
        let session = state.next_session;
        state.connections.insert(session, Peer { outbound, subscriptions: HashMap::new() });
        session
    }

    fn on_frame(
        &self,
        session: u64,
        frame: &Frame,
        outbound: &mpsc::UnboundedSender<Outbound>,
    ) -> Flow {
        let reply = |frame: Frame| {
            let _ = outbound.send(Outbound::Frame(frame));
        };
        let mut state = self.lock();

        match frame.command() {
            Command::Connect => {
                let token = frame
                    .header(headers::AUTHORIZATION)
                    .and_then(|value| value.strip_prefix("Bearer "))
                    .map(str::to_string);
                if state.required_token.is_some() && state.required_token != token {
                    state.log.push(BrokerEvent::Rejected { session });
                    reply(Frame::error("unauthorized", "bearer token rejected"));
                    return Flow::Close;
                }
                state.log.push(BrokerEvent::Connected { session, token });
                reply(Frame::connected(&format!("sim-{session}")));
                Flow::Continue
            },
            Command::Subscribe => {
                let (Some(id), Some(destination)) =
                    (frame.header(headers::ID), frame.header(headers::DESTINATION))
                else {
                    reply(Frame::error("bad subscribe", "id and destination are required"));
                    return Flow::Close;
                };
                state.log.push(BrokerEvent::Subscribed {
                    session,
                    id: id.to_string(),
                    destination: destination.to_string(),
                });
                if let Some(peer) = state.connections.get_mut(&session) {
                    peer.subscriptions.insert(id.to_string(), destination.to_string());
                }
                Flow::Continue
            },
            Command::Unsubscribe => {
                let id = frame.header(headers::ID).unwrap_or_default().to_string();
                if let Some(peer) = state.connections.get_mut(&session) {
                    peer.subscriptions.remove(&id);
                }
                state.log.push(BrokerEvent::Unsubscribed { session, id });
                Flow::Continue
            },
            Command::Send => {
                let destination = frame.header(headers::DESTINATION).unwrap_or_default();
                let body = String::from_utf8_lossy(frame.body()).into_owned();
                state.log.push(BrokerEvent::Published {
                    session,
                    destination: destination.to_string(),
                    body: body.clone(),
                });
                if destination == PUBLISH_DESTINATION {
                    state.rebroadcast(&body);
                } else if let Ok(room_id) = room_from_topic(destination) {
                    state.deliver(room_id, &body);
                }
                Flow::Continue
            },
            Command::Disconnect => {
                state.log.push(BrokerEvent::Disconnected { session });
                if let Some(receipt) = frame.header(headers::RECEIPT) {
                    reply(Frame::receipt(receipt));
                }
                Flow::Close
            },
            other => {
                reply(Frame::error("unexpected command", other.as_str()));
                Flow::Close
            },
        }
    }
}

impl BrokerState {
    fn rebroadcast(&mut self, body: &str) {
        let mut record = match ChatRecord::from_json(body) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(%err, "dropping undecodable chat message");
                return;
            },
        };
        let Some(room_id) = record.room_id else {
            tracing::debug!("dropping chat message without a room");
            return;
        };

        record.id = None;
        let record = match &self.history {
            Some(history) => history.append(room_id, record),
            None => {
                self.next_message += 1;
                ChatRecord { id: Some(self.next_message), ..record }
            },
        };
        match record.to_json() {
            Ok(body) => {
                self.deliver(room_id, &body);
            },
            Err(err) => tracing::warn!(%err, "chat message not rebroadcast"),
        }
    }

    fn deliver(&mut self, room_id: RoomId, body: &str) -> usize {
        let topic = room_topic(room_id);
        let body = Bytes::copy_from_slice(body.as_bytes());
        let mut delivered = 0;

        for peer in self.connections.values() {
            for (id, destination) in &peer.subscriptions {
                if *destination != topic {
                    continue;
                }
                self.next_delivery += 1;
                let message_id = format!("msg-{}", self.next_delivery);
                let frame = Frame::message(&topic, id, &message_id, body.clone());
                if peer.outbound.send(Outbound::Frame(frame)).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}
