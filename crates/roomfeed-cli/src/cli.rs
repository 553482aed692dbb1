//! Command-line arguments.

use clap::Parser;
use roomfeed_core::Credentials;
use roomfeed_proto::{AuthorId, RoomId};

/// Room chat over a STOMP broker.
#[derive(Debug, Clone, Parser)]
#[command(name = "roomfeed", version)]
#[command(about = "Room chat over a STOMP broker")]
pub struct Args {
    /// Broker WebSocket endpoint
    #[arg(long, env = "ROOMFEED_BROKER_URL", default_value = "ws://localhost:5000/ws/websocket")]
    pub broker_url: String,

    /// Base URL of the history service
    #[arg(long, env = "ROOMFEED_HISTORY_URL", default_value = "http://localhost:5000")]
    pub history_url: String,

    /// Bearer token for the broker and the history service
    #[arg(long, env = "ROOMFEED_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Author id stamped on sent messages
    #[arg(long, env = "ROOMFEED_AUTHOR_ID")]
    pub author_id: u64,

    /// Room to join once connected
    #[arg(long)]
    pub room: Option<u64>,

    /// Start disconnected instead of connecting right away
    #[arg(long)]
    pub offline: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Credentials presented on connect.
    pub fn credentials(&self) -> Credentials {
        self.token.clone().map_or_else(Credentials::anonymous, Credentials::bearer)
    }

    /// Author of sent messages.
    pub fn author(&self) -> AuthorId {
        AuthorId::new(self.author_id)
    }

    /// Room to join on startup.
    pub fn initial_room(&self) -> Option<RoomId> {
        self.room.map(RoomId::new)
    }
}
