//! Property tests over random user scripts.
//!
//! ```text
//! proptest generates: Vec<Action>
//!                          │
//!                          ▼
//!        Scenario (runtime + simulated broker under turmoil)
//!                          │
//!                          ▼
//!     oracles: one subscription, no duplicates, last room shown
//! ```

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use proptest::prelude::*;
use roomfeed_harness::scenario::{Scenario, Step, oracle};
use roomfeed_proto::{AuthorId, ChatRecord, RoomId};

const ROOMS: u64 = 3;

#[derive(Debug, Clone)]
enum Action {
    Join(u64),
    Send(u8),
    Peer { room: u64, n: u8 },
    HoldHistory(u64),
    ReleaseHistory(u64),
}

fn action_strategy() -> impl Strategy<Value = Action> {
    let room = 1..=ROOMS;
    prop_oneof![
        4 => room.clone().prop_map(Action::Join),
        3 => any::<u8>().prop_map(Action::Send),
        3 => (room.clone(), any::<u8>()).prop_map(|(room, n)| Action::Peer { room, n }),
        1 => room.clone().prop_map(Action::HoldHistory),
        1 => room.prop_map(Action::ReleaseHistory),
    ]
}

fn seeded(room: u64) -> Vec<ChatRecord> {
    let sim_start = DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap();
    (0..3)
        .map(|i| ChatRecord {
            id: Some(room * 100 + i),
            room_id: Some(RoomId::new(room)),
            author_id: Some(AuthorId::new(9)),
            content: format!("room {room} history {i}"),
            created_at: Some(sim_start - TimeDelta::minutes(10 - i as i64)),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Whatever the user does, the broker never holds two subscriptions for
    /// the session and the timeline never shows a message twice.
    #[test]
    fn prop_switching_keeps_one_subscription(
        actions in prop::collection::vec(action_strategy(), 1..10)
    ) {
        let mut scenario = Scenario::new("random switches")
            .settle(Duration::from_millis(400))
            .connect()
            .step(Step::Wait(Duration::from_secs(2)));
        for room in 1..=ROOMS {
            scenario = scenario.history(RoomId::new(room), seeded(room));
        }

        let mut last_room = None;
        let mut sends = 0u32;
        for action in &actions {
            scenario = match *action {
                Action::Join(room) => {
                    last_room = Some(RoomId::new(room));
                    scenario.join(RoomId::new(room))
                },
                Action::Send(n) => {
                    sends += 1;
                    scenario.send(format!("mine {sends} {n}"))
                },
                Action::Peer { room, n } => {
                    let record = ChatRecord {
                        id: Some(10_000 + u64::from(n)),
                        room_id: Some(RoomId::new(room)),
                        author_id: Some(AuthorId::new(2)),
                        content: format!("peer {n}"),
                        created_at: None,
                    };
                    scenario.inject(RoomId::new(room), record)
                },
                Action::HoldHistory(room) => scenario.step(Step::HoldHistory(RoomId::new(room))),
                Action::ReleaseHistory(room) => {
                    scenario.step(Step::ReleaseHistory(RoomId::new(room)))
                },
            };
        }
        // Nothing stays held at the end.
        for room in 1..=ROOMS {
            scenario = scenario.step(Step::ReleaseHistory(RoomId::new(room)));
        }

        let mut oracles = vec![oracle::at_most_one_subscription(), oracle::no_duplicates()];
        if let Some(room) = last_room {
            oracles.push(oracle::in_room(room));
        }
        let result = scenario.oracle(oracle::all_of(oracles)).run();
        prop_assert!(result.is_ok(), "{:?}", result);
    }
}
