//! Property tests for the session facade.
//!
//! Random sequences of room switches, live deliveries (current and stale),
//! history responses (current and stale) and sends are driven through a
//! connected [`Session`]. After every step the wire traffic and the visible
//! timeline are checked against a small reference model.
//!
//! ```text
//! proptest generates: Vec<Op>
//!                        │
//!            ┌───────────┴───────────┐
//!            ▼                       ▼
//!         Session                 Expected
//!     (actions, timeline)     (contents per room)
//!            └───────── compare ─────┘
//! ```

use std::collections::BTreeSet;

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use roomfeed_core::{
    ConnectionState, Credentials, HistoryRequest, ManualEnv, Message, Session, SessionAction,
    SessionConfig, SessionError, SessionEvent, SubscriptionHandle,
};
use roomfeed_proto::{AuthorId, ChatRecord, Command, Frame, room_topic};

#[derive(Debug, Clone)]
enum Op {
    Switch(u64),
    Live { secs: i64 },
    StaleLive,
    History { overlap: usize, fresh: usize },
    StaleHistory,
    Send,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => (1..=3u64).prop_map(Op::Switch),
        5 => (0..1_000i64).prop_map(|secs| Op::Live { secs }),
        1 => Just(Op::StaleLive),
        2 => (0..4usize, 0..4usize).prop_map(|(overlap, fresh)| Op::History { overlap, fresh }),
        1 => Just(Op::StaleHistory),
        1 => Just(Op::Send),
    ]
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

/// Session plus the model of what its timeline should contain.
struct World {
    session: Session<ManualEnv>,
    next_content: u64,
    old_handles: Vec<SubscriptionHandle>,
    pending: Option<HistoryRequest>,
    stale_requests: Vec<HistoryRequest>,
    /// Subscription ids live on the wire
    wire_subscriptions: BTreeSet<String>,
    /// Contents the current room should show once history is in
    expected: BTreeSet<String>,
    /// Live records delivered for the current room
    live_seen: Vec<ChatRecord>,
    merged: bool,
}

impl World {
    fn connected() -> Self {
        let env = ManualEnv::starting_at(at(10_000));
        let session = Session::new(env, SessionConfig::new(AuthorId::new(7)));
        let mut world = Self {
            session,
            next_content: 0,
            old_handles: Vec::new(),
            pending: None,
            stale_requests: Vec::new(),
            wire_subscriptions: BTreeSet::new(),
            expected: BTreeSet::new(),
            live_seen: Vec::new(),
            merged: false,
        };
        world.handle(SessionEvent::Connect(Credentials::anonymous())).unwrap();
        world.handle(SessionEvent::SocketOpened).unwrap();
        world.handle(SessionEvent::FrameReceived(Frame::connected("s"))).unwrap();
        assert_eq!(world.session.connection_state(), ConnectionState::Connected);
        world
    }

    fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        let actions = self.session.handle(event)?;
        for action in &actions {
            match action {
                SessionAction::SendFrame(frame) if frame.command() == Command::Subscribe => {
                    self.wire_subscriptions.insert(frame.header("id").unwrap().to_string());
                },
                SessionAction::SendFrame(frame) if frame.command() == Command::Unsubscribe => {
                    self.wire_subscriptions.remove(frame.header("id").unwrap());
                },
                SessionAction::FetchHistory(request) => {
                    if let Some(previous) = self.pending.replace(*request) {
                        self.stale_requests.push(previous);
                    }
                    self.expected.clear();
                    self.live_seen.clear();
                    self.merged = false;
                },
                _ => {},
            }
        }
        Ok(actions)
    }

    fn fresh_record(&mut self, secs: i64) -> ChatRecord {
        self.next_content += 1;
        ChatRecord {
            id: None,
            room_id: None,
            author_id: Some(AuthorId::new(self.next_content % 3)),
            content: format!("m{}", self.next_content),
            created_at: Some(at(secs)),
        }
    }

    fn deliver(&mut self, handle: SubscriptionHandle, record: &ChatRecord) -> Vec<SessionAction> {
        let room = self.session.current_room().unwrap();
        let frame = Frame::message(
            &room_topic(room),
            &handle.to_string(),
            "m",
            Bytes::from(record.to_json().unwrap()),
        );
        self.handle(SessionEvent::FrameReceived(frame)).unwrap()
    }

    fn contents(&self) -> Vec<String> {
        self.session.timeline().iter().map(|m| m.content().to_string()).collect()
    }

    fn timeline(&self) -> Vec<Message> {
        self.session.timeline().to_vec()
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Switch(room) => {
                let before = self.session.subscription();
                if let Some(handle) = before {
                    if self.session.current_room() != Some((*room).into()) {
                        self.old_handles.push(handle);
                    }
                }
                self.handle(SessionEvent::SwitchRoom((*room).into())).unwrap();
                assert_eq!(self.session.current_room(), Some((*room).into()));
            },
            Op::Live { secs } => {
                let Some(handle) = self.session.subscription() else { return };
                let record = self.fresh_record(*secs);
                self.deliver(handle, &record);
                self.expected.insert(record.content.clone());
                self.live_seen.push(record);
            },
            Op::StaleLive => {
                let Some(handle) = self.old_handles.last().copied() else { return };
                if self.session.current_room().is_none() {
                    return;
                }
                let before = self.timeline();
                let record = self.fresh_record(1);
                let actions = self.deliver(handle, &record);
                assert!(actions.is_empty(), "stale delivery produced {actions:?}");
                assert_eq!(self.timeline(), before);
            },
            Op::History { overlap, fresh } => {
                let Some(request) = self.pending.take() else { return };
                let mut records: Vec<_> =
                    self.live_seen.iter().take(*overlap).cloned().collect();
                for i in 0..*fresh {
                    records.push(self.fresh_record(i as i64 * 100));
                }
                self.expected.extend(records.iter().map(|r| r.content.clone()));
                self.handle(SessionEvent::HistoryLoaded { request, result: Ok(records) }).unwrap();
                self.merged = true;
            },
            Op::StaleHistory => {
                let Some(request) = self.stale_requests.pop() else { return };
                let before = self.timeline();
                let stale = vec![ChatRecord::content_only("stale")];
                let actions = self
                    .handle(SessionEvent::HistoryLoaded { request, result: Ok(stale) })
                    .unwrap();
                assert!(actions.is_empty());
                assert_eq!(self.timeline(), before);
            },
            Op::Send => {
                let before = self.timeline();
                match self.handle(SessionEvent::Send("hello".into())) {
                    Ok(actions) => {
                        assert!(self.session.current_room().is_some());
                        assert!(matches!(
                            &actions[..],
                            [SessionAction::SendFrame(f)] if f.command() == Command::Send
                        ));
                    },
                    Err(err) => {
                        assert_eq!(err, SessionError::NoActiveRoom);
                        assert!(self.session.current_room().is_none());
                    },
                }
                assert_eq!(self.timeline(), before);
            },
        }
    }
}

proptest! {
    /// Wire subscriptions, timeline contents and stale handling stay
    /// consistent under any operation sequence.
    #[test]
    fn prop_session_matches_model(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let mut world = World::connected();

        for (i, op) in ops.iter().enumerate() {
            world.apply(op);

            prop_assert!(
                world.wire_subscriptions.len() <= 1,
                "step {}: {:?} left {:?} subscribed",
                i, op, world.wire_subscriptions
            );

            let room = world.session.current_room();
            for message in world.session.timeline() {
                prop_assert_eq!(Some(message.room_id()), room);
            }

            if world.merged {
                let contents = world.contents();
                let unique: BTreeSet<_> = contents.iter().cloned().collect();
                prop_assert_eq!(contents.len(), unique.len(), "duplicates at step {}", i);
                prop_assert_eq!(&unique, &world.expected, "step {}: {:?}", i, op);
            } else {
                prop_assert!(world.session.timeline().is_empty());
            }
        }
    }

    /// Merging sorts by creation time no matter how live frames arrived.
    #[test]
    fn prop_merge_sorts_buffered_frames(secs in prop::collection::vec(0..10_000i64, 0..20)) {
        let mut world = World::connected();
        world.apply(&Op::Switch(1));
        for s in &secs {
            world.apply(&Op::Live { secs: *s });
        }
        world.apply(&Op::History { overlap: 0, fresh: 0 });

        let times: Vec<_> = world.session.timeline().iter().map(Message::created_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        prop_assert_eq!(times, sorted);
        prop_assert_eq!(world.session.timeline().len(), secs.len());
    }
}
