//! Command parsing for the line-oriented front end.
//!
//! This module parses input lines into structured [`Command`] values.

use roomfeed_proto::RoomId;

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect to the broker.
    Connect,

    /// Disconnect from the broker.
    Disconnect,

    /// Switch to a room.
    Join {
        /// Room to show.
        room_id: RoomId,
    },

    /// Show the current room.
    Room,

    /// List the commands.
    Help,

    /// Quit the application.
    Quit,

    /// Send a message to the current room.
    Message {
        /// Message content.
        content: String,
    },

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// One line per command, for `/help`.
pub const HELP: &str = "\
/connect           connect to the broker
/disconnect        leave the room and disconnect
/join <room_id>    switch to a room
/room              show the current room
/quit              disconnect and exit
anything else      send to the current room";

/// Parse a user input line into a command.
///
/// Commands start with `/`. Anything else is treated as a message.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Message { content: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "connect" => Command::Connect,

        "disconnect" => Command::Disconnect,

        "join" => match parts.get(1) {
            Some(id_str) => match id_str.parse::<RoomId>() {
                Ok(room_id) => Command::Join { room_id },
                Err(_) => {
                    Command::InvalidArgs { command: "join".into(), error: "Invalid room ID".into() }
                },
            },
            None => Command::InvalidArgs {
                command: "join".into(),
                error: "Usage: /join <room_id>".into(),
            },
        },

        "room" => Command::Room,

        "help" | "h" => Command::Help,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
