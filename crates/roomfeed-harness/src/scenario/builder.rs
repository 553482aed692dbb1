//! Scenario builder API.
//!
//! Provides a declarative API for scripting a session against the
//! simulated broker and history store, enforcing the Oracle Pattern.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use roomfeed_client::{ClientConfig, ClientError, SessionHandle};
use roomfeed_core::Credentials;
use roomfeed_proto::{AuthorId, ChatRecord, RoomId};
use tokio::sync::broadcast::error::TryRecvError;

use crate::{
    scenario::{OracleFn, Refusal, World},
    sim_broker::{BROKER_PORT, SimBroker},
    sim_env::SimEnv,
    sim_history::SimHistory,
    sim_transport::SimTransport,
};

const BROKER_HOST: &str = "broker";
const CLIENT_HOST: &str = "client";
const SIM_DURATION: Duration = Duration::from_secs(600);

/// One scripted action.
#[derive(Debug, Clone)]
pub enum Step {
    /// User connects.
    Connect(Credentials),
    /// User disconnects.
    Disconnect,
    /// User switches to a room.
    Join(RoomId),
    /// User sends to the current room.
    Send(String),
    /// Another participant's message reaches the room's subscribers.
    Inject {
        /// Target room
        room_id: RoomId,
        /// Message delivered
        record: ChatRecord,
    },
    /// An undecodable body reaches the room's subscribers.
    InjectRaw {
        /// Target room
        room_id: RoomId,
        /// Raw frame body
        body: String,
    },
    /// History fetches of a room block from now on.
    HoldHistory(RoomId),
    /// Held history fetches of a room complete.
    ReleaseHistory(RoomId),
    /// Broker closes every socket.
    DropConnection,
    /// Let extra virtual time pass.
    Wait(Duration),
}

/// Scenario builder.
///
/// Script a session step by step. Must call `.oracle()` to get a
/// [`RunnableScenario`].
pub struct Scenario {
    name: String,
    author: AuthorId,
    broker: SimBroker,
    history: SimHistory,
    steps: Vec<Step>,
    settle: Duration,
}

impl Scenario {
    /// Create a new scenario with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        let history = SimHistory::new();
        Self {
            name: name.into(),
            author: AuthorId::new(1),
            broker: SimBroker::new().with_history(history.clone()),
            history,
            steps: Vec::new(),
            settle: Duration::from_secs(1),
        }
    }

    /// Author id of the scripted user.
    pub fn author(mut self, author: AuthorId) -> Self {
        self.author = author;
        self
    }

    /// Broker refuses connections without this bearer token.
    pub fn required_token(mut self, token: impl Into<String>) -> Self {
        self.broker = self.broker.with_required_token(token);
        self
    }

    /// Stored history of a room before the run starts.
    pub fn history(self, room_id: RoomId, records: impl IntoIterator<Item = ChatRecord>) -> Self {
        self.history.seed(room_id, records);
        self
    }

    /// History of a room is unavailable.
    pub fn failing_history(self, room_id: RoomId) -> Self {
        self.history.fail_room(room_id);
        self
    }

    /// Virtual time allowed after each step for traffic to settle.
    pub fn settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Append a step.
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Connect without credentials.
    pub fn connect(self) -> Self {
        self.step(Step::Connect(Credentials::anonymous()))
    }

    /// Connect with a bearer token.
    pub fn connect_with(self, token: impl Into<String>) -> Self {
        self.step(Step::Connect(Credentials::bearer(token)))
    }

    /// Switch to `room_id`.
    pub fn join(self, room_id: RoomId) -> Self {
        self.step(Step::Join(room_id))
    }

    /// Send `content` to the current room.
    pub fn send(self, content: impl Into<String>) -> Self {
        self.step(Step::Send(content.into()))
    }

    /// Another participant posts `record` to `room_id`.
    pub fn inject(self, room_id: RoomId, record: ChatRecord) -> Self {
        self.step(Step::Inject { room_id, record })
    }

    /// Disconnect.
    pub fn disconnect(self) -> Self {
        self.step(Step::Disconnect)
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Starts the broker as a Turmoil host, runs the session runtime on a
    /// Turmoil client, performs every step followed by the settle time, and
    /// passes the final state to the oracle.
    pub fn run(self) -> Result<(), String> {
        let Scenario { name, author, broker, history, steps, settle } = self.scenario;

        let mut sim = turmoil::Builder::new().simulation_duration(SIM_DURATION).build();

        let host_broker = broker.clone();
        sim.host(BROKER_HOST, move || {
            let broker = host_broker.clone();
            async move { broker.serve(BROKER_PORT).await }
        });

        let outcome: Arc<Mutex<Option<World>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&outcome);
        sim.client(CLIENT_HOST, async move {
            let handle = roomfeed_client::spawn(
                SimTransport::new(format!("{BROKER_HOST}:{BROKER_PORT}")),
                history.clone(),
                SimEnv::new(),
                ClientConfig::new(author),
            );
            let mut notices = handle.notices();

            let mut refusals = Vec::new();
            for (index, step) in steps.into_iter().enumerate() {
                tracing::debug!(index, ?step, "scenario step");
                if let Err(error) = perform(&handle, &broker, &history, step).await {
                    refusals.push(Refusal { step: index, error });
                }
                tokio::time::sleep(settle).await;
            }

            let mut seen = Vec::new();
            loop {
                match notices.try_recv() {
                    Ok(notice) => seen.push(notice),
                    Err(TryRecvError::Lagged(_)) => {},
                    Err(_) => break,
                }
            }

            let timeline = handle.timeline().borrow().clone();
            let world = World::new(
                handle.connection_state(),
                timeline,
                seen,
                refusals,
                broker.log(),
                history.calls(),
            );
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(world);
            Ok(())
        });

        sim.run().map_err(|e| format!("Scenario '{name}': simulation failed: {e}"))?;

        let world = outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| format!("Scenario '{name}': client finished without a world"))?;

        (self.oracle)(&world).map_err(|e| format!("Scenario '{name}': {e}"))
    }
}

async fn perform(
    handle: &SessionHandle,
    broker: &SimBroker,
    history: &SimHistory,
    step: Step,
) -> Result<(), ClientError> {
    match step {
        Step::Connect(credentials) => handle.connect(credentials).await,
        Step::Disconnect => handle.disconnect().await,
        Step::Join(room_id) => handle.switch_room(room_id).await,
        Step::Send(content) => handle.send(content).await,
        Step::Inject { room_id, record } => {
            broker.inject(room_id, &record);
            Ok(())
        },
        Step::InjectRaw { room_id, body } => {
            broker.inject_raw(room_id, &body);
            Ok(())
        },
        Step::HoldHistory(room_id) => {
            history.hold(room_id);
            Ok(())
        },
        Step::ReleaseHistory(room_id) => {
            history.release(room_id);
            Ok(())
        },
        Step::DropConnection => {
            broker.drop_connections();
            Ok(())
        },
        Step::Wait(duration) => {
            tokio::time::sleep(duration).await;
            Ok(())
        },
    }
}
