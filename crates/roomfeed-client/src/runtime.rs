//! Session actor.
//!
//! One task owns the [`Session`] and drains a single ordered queue. User
//! commands from [`SessionHandle`]s, frames from the socket reader, write
//! failures and history responses all enter that queue, so the session is
//! only ever touched by one task at a time.
//!
//! ```text
//!  SessionHandle ──┐
//!  socket reader ──┼──> queue ──> Runtime ──> Session::handle ──> actions
//!  history tasks ──┘                 │
//!                                    ├──> writer task ──> socket
//!                                    ├──> history task (re-enters queue)
//!                                    └──> watch / broadcast observers
//! ```
//!
//! Each opened socket is tagged with an epoch. Closing the socket bumps the
//! epoch, so anything its reader reports afterwards is ignored.

use std::{sync::Arc, time::Duration};

use roomfeed_core::{
    ConnectionState, Credentials, Environment, HistoryRequest, Message, Session, SessionAction,
    SessionConfig, SessionError, SessionEvent, SessionNotice,
};
use roomfeed_proto::{AuthorId, ChatRecord, Frame, ProtocolError, RoomId};
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    time::MissedTickBehavior,
};

use crate::{
    error::{ClientError, TransportError},
    transport::{FrameSink, FrameStream, HistoryStore, Transport},
};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Session settings
    pub session: SessionConfig,
    /// How often timeouts are checked
    pub tick_interval: Duration,
    /// Capacity of the command/event queue
    pub queue_depth: usize,
    /// Notices buffered per slow subscriber
    pub notice_capacity: usize,
}

impl ClientConfig {
    /// Defaults for everything but the author.
    pub fn new(author_id: AuthorId) -> Self {
        Self {
            session: SessionConfig::new(author_id),
            tick_interval: Duration::from_millis(250),
            queue_depth: 256,
            notice_capacity: 64,
        }
    }
}

/// Snapshot of the visible timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineView {
    /// Room shown, if any
    pub room_id: Option<RoomId>,
    /// Messages in display order
    pub messages: Vec<Message>,
}

enum Input {
    Command { event: SessionEvent, reply: oneshot::Sender<Result<(), SessionError>> },
    Io(Io),
}

enum Io {
    Opened { epoch: u64, sink: Box<dyn FrameSink> },
    OpenFailed { epoch: u64, error: TransportError },
    Frame { epoch: u64, frame: Frame },
    Rejected { epoch: u64, error: ProtocolError },
    Ended { epoch: u64, error: Option<TransportError> },
    WriteFailed { epoch: u64, error: TransportError },
    History { request: HistoryRequest, result: Result<Vec<ChatRecord>, String> },
}

/// Caller's side of a running session. Cheap to clone.
///
/// Operations return once the session has accepted or refused them;
/// their outcome (connected, history merged, message echoed) shows up on
/// the observers.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Input>,
    state: watch::Receiver<ConnectionState>,
    timeline: watch::Receiver<TimelineView>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionHandle {
    /// Connect to the broker.
    ///
    /// # Errors
    ///
    /// Refused while a disconnect is in progress.
    pub async fn connect(&self, credentials: Credentials) -> Result<(), ClientError> {
        self.submit(SessionEvent::Connect(credentials)).await
    }

    /// Leave the current room and disconnect.
    ///
    /// # Errors
    ///
    /// Only [`ClientError::Shutdown`].
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        self.submit(SessionEvent::Disconnect).await
    }

    /// Make `room_id` the current room.
    ///
    /// # Errors
    ///
    /// `NotConnected` unless connected.
    pub async fn switch_room(&self, room_id: RoomId) -> Result<(), ClientError> {
        self.submit(SessionEvent::SwitchRoom(room_id)).await
    }

    /// Publish a message to the current room.
    ///
    /// The message shows up on the timeline only once the broker echoes it.
    ///
    /// # Errors
    ///
    /// `NoActiveRoom` before any room was selected, `NotConnected` unless
    /// connected.
    pub async fn send(&self, content: impl Into<String>) -> Result<(), ClientError> {
        self.submit(SessionEvent::Send(content.into())).await
    }

    /// Connection state observer.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Timeline observer.
    pub fn timeline(&self) -> watch::Receiver<TimelineView> {
        self.timeline.clone()
    }

    /// Subscribe to advisory notices from now on.
    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    async fn submit(&self, event: SessionEvent) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Input::Command { event, reply })
            .await
            .map_err(|_| ClientError::Shutdown)?;
        response.await.map_err(|_| ClientError::Shutdown)?.map_err(ClientError::from)
    }
}

/// The session actor. Runs until every [`SessionHandle`] is dropped.
pub struct Runtime<T: Transport, H: HistoryStore, E: Environment> {
    session: Session<E>,
    transport: Arc<T>,
    history: Arc<H>,
    inbox: mpsc::Receiver<Input>,
    loopback: mpsc::WeakSender<Input>,
    epoch: u64,
    writer: Option<mpsc::UnboundedSender<Frame>>,
    tick_interval: Duration,
    state_tx: watch::Sender<ConnectionState>,
    timeline_tx: watch::Sender<TimelineView>,
    notice_tx: broadcast::Sender<SessionNotice>,
}

impl<T: Transport, H: HistoryStore, E: Environment> Runtime<T, H, E> {
    /// Build a runtime and the first handle to it.
    pub fn new(transport: T, history: H, env: E, config: ClientConfig) -> (Self, SessionHandle) {
        let (commands, inbox) = mpsc::channel(config.queue_depth.max(1));
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (timeline_tx, timeline) = watch::channel(TimelineView::default());
        let (notice_tx, _) = broadcast::channel(config.notice_capacity.max(1));

        let runtime = Self {
            session: Session::new(env, config.session),
            transport: Arc::new(transport),
            history: Arc::new(history),
            inbox,
            loopback: commands.downgrade(),
            epoch: 0,
            writer: None,
            tick_interval: config.tick_interval,
            state_tx,
            timeline_tx,
            notice_tx: notice_tx.clone(),
        };
        let handle = SessionHandle { commands, state, timeline, notices: notice_tx };
        (runtime, handle)
    }

    /// Process events until every handle is dropped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                input = self.inbox.recv() => match input {
                    Some(input) => self.process(input),
                    None => break,
                },
                _ = ticker.tick() => self.dispatch(SessionEvent::Tick),
            }
        }

        tracing::debug!("all session handles dropped, runtime exiting");
        self.writer = None;
    }

    fn process(&mut self, input: Input) {
        match input {
            Input::Command { event, reply } => {
                let result = self.session.handle(event).map(|actions| self.execute(actions));
                if let Err(err) = &result {
                    tracing::debug!(%err, "command refused");
                }
                let _ = reply.send(result);
            },
            Input::Io(io) => self.on_io(io),
        }
    }

    fn on_io(&mut self, io: Io) {
        match io {
            Io::Opened { epoch, sink } => {
                if epoch != self.epoch {
                    tracing::debug!(epoch, current = self.epoch, "closing stale socket");
                    tokio::spawn(close_sink(sink));
                    return;
                }
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(write_loop(sink, rx, epoch, self.loopback.clone()));
                self.writer = Some(tx);
                self.dispatch(SessionEvent::SocketOpened);
            },
            Io::OpenFailed { epoch, error } if epoch == self.epoch => {
                self.dispatch(SessionEvent::SocketError(error.to_string()));
            },
            Io::Frame { epoch, frame } if epoch == self.epoch => {
                tracing::trace!(command = %frame.command(), "frame received");
                self.dispatch(SessionEvent::FrameReceived(frame));
            },
            Io::Rejected { epoch, error } if epoch == self.epoch => {
                self.dispatch(SessionEvent::FrameRejected(error));
            },
            Io::Ended { epoch, error } if epoch == self.epoch => {
                self.writer = None;
                let event = match error {
                    Some(error) => SessionEvent::SocketError(error.to_string()),
                    None => SessionEvent::SocketClosed,
                };
                self.dispatch(event);
            },
            Io::WriteFailed { epoch, error } if epoch == self.epoch => {
                self.writer = None;
                self.dispatch(SessionEvent::SocketError(error.to_string()));
            },
            Io::History { request, result } => {
                self.dispatch(SessionEvent::HistoryLoaded { request, result });
            },
            Io::OpenFailed { .. }
            | Io::Frame { .. }
            | Io::Rejected { .. }
            | Io::Ended { .. }
            | Io::WriteFailed { .. } => {
                tracing::trace!("ignoring event from a previous socket");
            },
        }
    }

    fn dispatch(&mut self, event: SessionEvent) {
        match self.session.handle(event) {
            Ok(actions) => self.execute(actions),
            Err(err) => tracing::warn!(%err, "session rejected event"),
        }
    }

    fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::OpenSocket(credentials) => self.open_socket(credentials),
                SessionAction::SendFrame(frame) => {
                    let sent = self.writer.as_ref().is_some_and(|writer| writer.send(frame).is_ok());
                    if !sent {
                        tracing::warn!("no open socket, frame dropped");
                    }
                },
                SessionAction::CloseSocket => {
                    self.writer = None;
                    self.epoch += 1;
                },
                SessionAction::FetchHistory(request) => self.fetch_history(request),
                SessionAction::StateChanged(state) => {
                    tracing::info!(?state, "connection state");
                    self.state_tx.send_replace(state);
                },
                SessionAction::TimelineReset { room_id, messages } => {
                    self.timeline_tx.send_replace(TimelineView { room_id, messages });
                },
                SessionAction::TimelineAppended(message) => {
                    self.timeline_tx.send_modify(|view| view.messages.push(message));
                },
                SessionAction::Notice(notice) => {
                    tracing::info!(%notice, "session notice");
                    let _ = self.notice_tx.send(notice);
                },
            }
        }
    }

    fn open_socket(&mut self, credentials: Credentials) {
        self.epoch += 1;
        self.writer = None;
        let epoch = self.epoch;
        let transport = Arc::clone(&self.transport);
        let events = self.loopback.clone();

        tokio::spawn(async move {
            let (sink, stream) = match transport.open(&credentials).await {
                Ok(halves) => halves,
                Err(error) => {
                    tracing::warn!(%error, "socket open failed");
                    notify(&events, Io::OpenFailed { epoch, error }).await;
                    return;
                },
            };
            if notify(&events, Io::Opened { epoch, sink: Box::new(sink) }).await {
                read_loop(stream, epoch, &events).await;
            }
        });
    }

    fn fetch_history(&self, request: HistoryRequest) {
        let history = Arc::clone(&self.history);
        let events = self.loopback.clone();

        tokio::spawn(async move {
            let result = history.fetch_history(request.room_id).await.map_err(|err| err.to_string());
            notify(&events, Io::History { request, result }).await;
        });
    }
}

async fn read_loop<S: FrameStream>(mut stream: S, epoch: u64, events: &mpsc::WeakSender<Input>) {
    loop {
        let io = match stream.next().await {
            Some(Ok(frame)) => Io::Frame { epoch, frame },
            Some(Err(TransportError::Malformed(error))) => Io::Rejected { epoch, error },
            Some(Err(error)) => {
                notify(events, Io::Ended { epoch, error: Some(error) }).await;
                return;
            },
            None => {
                notify(events, Io::Ended { epoch, error: None }).await;
                return;
            },
        };
        if !notify(events, io).await {
            return;
        }
    }
}

async fn write_loop(
    mut sink: Box<dyn FrameSink>,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    epoch: u64,
    events: mpsc::WeakSender<Input>,
) {
    while let Some(frame) = frames.recv().await {
        if let Err(error) = sink.send(frame).await {
            tracing::warn!(%error, "socket write failed");
            notify(&events, Io::WriteFailed { epoch, error }).await;
            return;
        }
    }
    close_sink(sink).await;
}

async fn close_sink(mut sink: Box<dyn FrameSink>) {
    if let Err(error) = sink.close().await {
        tracing::debug!(%error, "socket close failed");
    }
}

/// Returns `false` once the runtime is gone.
async fn notify(events: &mpsc::WeakSender<Input>, io: Io) -> bool {
    match events.upgrade() {
        Some(sender) => sender.send(Input::Io(io)).await.is_ok(),
        None => false,
    }
}
