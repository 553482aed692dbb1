//! Text rendering of session output.
//!
//! The timeline observer only ever holds the latest view, so
//! [`TimelinePrinter`] remembers what it already printed and works out
//! whether the new view extends it or replaces it.

use roomfeed_client::TimelineView;
use roomfeed_core::{ConnectionState, Message, SessionNotice};
use roomfeed_proto::RoomId;

/// Tracks the printed part of the timeline.
#[derive(Debug, Default)]
pub struct TimelinePrinter {
    room_id: Option<RoomId>,
    printed: Vec<Message>,
}

impl TimelinePrinter {
    /// Printer that has printed nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for `view`.
    ///
    /// Appends only print the new messages. A different room, or a view
    /// that no longer starts with what was printed (history merged in),
    /// reprints the whole timeline under a room header.
    pub fn update(&mut self, view: &TimelineView) -> Vec<String> {
        let extends =
            view.room_id == self.room_id && view.messages.starts_with(&self.printed);

        let mut lines = Vec::new();
        let fresh = if extends {
            &view.messages[self.printed.len()..]
        } else {
            lines.push(room_header(view.room_id));
            &view.messages[..]
        };
        lines.extend(fresh.iter().map(message_line));

        self.room_id = view.room_id;
        self.printed.clone_from(&view.messages);
        lines
    }
}

fn room_header(room_id: Option<RoomId>) -> String {
    match room_id {
        Some(room_id) => format!("--- room {room_id} ---"),
        None => "--- no room ---".to_string(),
    }
}

/// `[HH:MM:SS] author: content`.
pub fn message_line(message: &Message) -> String {
    let author = message.author_id().map_or_else(|| "anonymous".to_string(), |a| a.to_string());
    format!("[{}] {author}: {}", message.created_at().format("%H:%M:%S"), message.content())
}

/// Status line for a connection state change.
pub fn state_line(state: ConnectionState) -> String {
    let label = match state {
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnecting => "disconnecting",
        ConnectionState::Failed => "connection failed",
    };
    format!("* {label}")
}

/// Line for an advisory notice.
pub fn notice_line(notice: &SessionNotice) -> String {
    format!("! {notice}")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use roomfeed_core::Origin;
    use roomfeed_proto::{AuthorId, ChatRecord};

    use super::*;

    fn message(content: &str, author: Option<u64>) -> Message {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 5).unwrap();
        let record = ChatRecord {
            id: None,
            room_id: None,
            author_id: author.map(AuthorId::new),
            content: content.to_string(),
            created_at: Some(at),
        };
        Message::from_record(RoomId::new(1), record, Origin::Live, at)
    }

    fn view(room: Option<u64>, messages: Vec<Message>) -> TimelineView {
        TimelineView { room_id: room.map(RoomId::new), messages }
    }

    #[test]
    fn formats_message_with_author_and_time() {
        assert_eq!(message_line(&message("hi", Some(4))), "[09:30:05] 4: hi");
        assert_eq!(message_line(&message("hi", None)), "[09:30:05] anonymous: hi");
    }

    #[test]
    fn appends_print_only_new_messages() {
        let mut printer = TimelinePrinter::new();
        let a = message("a", Some(1));
        let b = message("b", Some(1));

        let first = printer.update(&view(Some(1), vec![a.clone()]));
        assert_eq!(first, ["--- room 1 ---", "[09:30:05] 1: a"]);

        let second = printer.update(&view(Some(1), vec![a, b]));
        assert_eq!(second, ["[09:30:05] 1: b"]);
    }

    #[test]
    fn merge_or_switch_reprints() {
        let mut printer = TimelinePrinter::new();
        let a = message("a", Some(1));
        let older = message("older", Some(2));
        printer.update(&view(Some(1), vec![a.clone()]));

        let merged = printer.update(&view(Some(1), vec![older, a]));
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], "--- room 1 ---");

        let switched = printer.update(&view(Some(2), Vec::new()));
        assert_eq!(switched, ["--- room 2 ---"]);

        let left = printer.update(&view(None, Vec::new()));
        assert_eq!(left, ["--- no room ---"]);
    }

    #[test]
    fn state_and_notice_lines() {
        assert_eq!(state_line(ConnectionState::Connected), "* connected");
        let notice = SessionNotice::BrokerError { message: "denied".to_string() };
        assert!(notice_line(&notice).starts_with("! "));
    }
}
