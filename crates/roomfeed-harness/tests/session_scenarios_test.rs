//! End-to-end session scenarios.
//!
//! Each test drives the real runtime against the simulated broker and
//! history store under Turmoil and checks the final world with an oracle:
//! - History merge with live traffic and echoes
//! - Room switching and the single-subscription invariant
//! - Stale history after a quick switch
//! - Failure paths: broken history, rejected token, dropped socket,
//!   malformed frames

use chrono::{DateTime, TimeDelta, Utc};
use roomfeed_client::ClientError;
use roomfeed_core::{ConnectionState, SessionError, SessionNotice};
use roomfeed_harness::{
    BrokerEvent,
    scenario::{Scenario, Step, oracle},
};
use roomfeed_proto::{AuthorId, ChatRecord, RoomId, room_topic};

const LOBBY: RoomId = RoomId::new(1);
const KITCHEN: RoomId = RoomId::new(2);

/// Record stored `mins_ago` minutes before the simulation starts.
fn stored(id: u64, room_id: RoomId, content: &str, mins_ago: i64) -> ChatRecord {
    let sim_start = DateTime::<Utc>::from_timestamp(1_704_067_200, 0).unwrap();
    ChatRecord {
        id: Some(id),
        room_id: Some(room_id),
        author_id: Some(AuthorId::new(7)),
        content: content.to_string(),
        created_at: Some(sim_start - TimeDelta::minutes(mins_ago)),
    }
}

#[test]
fn history_then_own_message_echo() {
    let result = Scenario::new("history then echo")
        .history(LOBBY, [stored(1, LOBBY, "first", 10), stored(2, LOBBY, "second", 5)])
        .connect()
        .join(LOBBY)
        .send("hello")
        .oracle(oracle::all_of(vec![
            oracle::state_is(ConnectionState::Connected),
            oracle::in_room(LOBBY),
            oracle::timeline_is(&["first", "second", "hello"]),
            oracle::nothing_refused(),
            Box::new(|world| {
                let published = world.broker_log().iter().any(|event| {
                    matches!(event, BrokerEvent::Published { destination, body, .. }
                        if destination == "/app/hello" && body.contains("\"hello\""))
                });
                if published { Ok(()) } else { Err("SEND never reached the broker".into()) }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn switching_rooms_unsubscribes_before_subscribing() {
    let result = Scenario::new("switch rooms")
        .history(LOBBY, [stored(1, LOBBY, "lobby", 3)])
        .history(KITCHEN, [stored(2, KITCHEN, "kitchen", 3)])
        .connect()
        .join(LOBBY)
        .join(KITCHEN)
        .oracle(oracle::all_of(vec![
            oracle::in_room(KITCHEN),
            oracle::timeline_is(&["kitchen"]),
            oracle::at_most_one_subscription(),
            Box::new(|world| {
                let lobby = room_topic(LOBBY);
                let kitchen = room_topic(KITCHEN);
                let order: Vec<&str> = world
                    .broker_log()
                    .iter()
                    .filter_map(|event| match event {
                        BrokerEvent::Subscribed { destination, .. } if *destination == lobby => {
                            Some("sub lobby")
                        },
                        BrokerEvent::Subscribed { destination, .. } if *destination == kitchen => {
                            Some("sub kitchen")
                        },
                        BrokerEvent::Unsubscribed { .. } => Some("unsub"),
                        _ => None,
                    })
                    .collect();
                if order == ["sub lobby", "unsub", "sub kitchen"] {
                    Ok(())
                } else {
                    Err(format!("unexpected subscription order {order:?}"))
                }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn rejoining_same_room_keeps_subscription() {
    let result = Scenario::new("rejoin")
        .history(LOBBY, [stored(1, LOBBY, "only", 1)])
        .connect()
        .join(LOBBY)
        .join(LOBBY)
        .oracle(oracle::all_of(vec![
            oracle::timeline_is(&["only"]),
            Box::new(|world| {
                let subscribes = world
                    .broker_log()
                    .iter()
                    .filter(|event| matches!(event, BrokerEvent::Subscribed { .. }))
                    .count();
                assert_eq!(subscribes, 1);
                assert_eq!(world.history_calls(), [LOBBY]);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn live_messages_during_fetch_are_merged_once() {
    let result = Scenario::new("live during fetch")
        .history(LOBBY, [stored(1, LOBBY, "old", 30), stored(2, LOBBY, "overlap", 1)])
        .connect()
        .step(Step::HoldHistory(LOBBY))
        .join(LOBBY)
        .inject(LOBBY, stored(2, LOBBY, "overlap", 1))
        .inject(LOBBY, stored(3, LOBBY, "fresh", 0))
        .step(Step::ReleaseHistory(LOBBY))
        .oracle(oracle::all_of(vec![
            oracle::timeline_is(&["old", "overlap", "fresh"]),
            oracle::no_duplicates(),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn late_history_for_previous_room_is_ignored() {
    let result = Scenario::new("stale history")
        .history(LOBBY, [stored(1, LOBBY, "lobby history", 3)])
        .history(KITCHEN, [stored(2, KITCHEN, "kitchen history", 3)])
        .connect()
        .step(Step::HoldHistory(LOBBY))
        .join(LOBBY)
        .join(KITCHEN)
        .step(Step::ReleaseHistory(LOBBY))
        .oracle(oracle::all_of(vec![
            oracle::in_room(KITCHEN),
            oracle::timeline_is(&["kitchen history"]),
            Box::new(|world| {
                assert_eq!(world.history_calls(), [LOBBY, KITCHEN]);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn broken_history_degrades_to_live_only() {
    let result = Scenario::new("history unavailable")
        .failing_history(LOBBY)
        .connect()
        .join(LOBBY)
        .inject(LOBBY, stored(9, LOBBY, "live only", 0))
        .oracle(oracle::all_of(vec![
            oracle::state_is(ConnectionState::Connected),
            oracle::timeline_is(&["live only"]),
            Box::new(|world| {
                let notified = world.notices().iter().any(|notice| {
                    matches!(notice, SessionNotice::HistoryUnavailable { room_id, .. }
                        if *room_id == LOBBY)
                });
                if notified { Ok(()) } else { Err("no HistoryUnavailable notice".into()) }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn wrong_token_fails_then_right_token_connects() {
    let result = Scenario::new("bearer token")
        .required_token("s3cret")
        .connect_with("guess")
        .connect_with("s3cret")
        .oracle(oracle::all_of(vec![
            oracle::state_is(ConnectionState::Connected),
            Box::new(|world| {
                assert!(
                    world
                        .notices()
                        .iter()
                        .any(|notice| matches!(notice, SessionNotice::BrokerError { .. }))
                );
                let tokens: Vec<_> = world
                    .broker_log()
                    .iter()
                    .filter_map(|event| match event {
                        BrokerEvent::Connected { token, .. } => Some(token.clone()),
                        BrokerEvent::Rejected { .. } => Some(None),
                        _ => None,
                    })
                    .collect();
                assert_eq!(tokens, vec![None, Some("s3cret".to_string())]);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn dropped_socket_fails_and_keeps_timeline() {
    let result = Scenario::new("socket dropped")
        .history(LOBBY, [stored(1, LOBBY, "kept", 2)])
        .connect()
        .join(LOBBY)
        .step(Step::DropConnection)
        .oracle(oracle::all_of(vec![
            oracle::state_is(ConnectionState::Failed),
            oracle::in_room(LOBBY),
            oracle::timeline_is(&["kept"]),
            Box::new(|world| {
                let lost = world
                    .notices()
                    .iter()
                    .any(|notice| matches!(notice, SessionNotice::ConnectionLost { .. }));
                if lost { Ok(()) } else { Err("no ConnectionLost notice".into()) }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn reconnect_after_drop_resubscribes_on_join() {
    let result = Scenario::new("reconnect")
        .connect()
        .join(LOBBY)
        .step(Step::DropConnection)
        .connect()
        .join(LOBBY)
        .send("back again")
        .oracle(oracle::all_of(vec![
            oracle::state_is(ConnectionState::Connected),
            oracle::timeline_is(&["back again"]),
            oracle::nothing_refused(),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn disconnect_releases_subscription_and_clears_timeline() {
    let result = Scenario::new("disconnect")
        .history(LOBBY, [stored(1, LOBBY, "bye", 2)])
        .connect()
        .join(LOBBY)
        .disconnect()
        .oracle(oracle::all_of(vec![
            oracle::state_is(ConnectionState::Disconnected),
            Box::new(|world| {
                assert_eq!(world.room(), None);
                assert!(world.messages().is_empty());
                assert!(world.open_subscriptions().is_empty());

                let tail: Vec<_> = world
                    .broker_log()
                    .iter()
                    .rev()
                    .take(2)
                    .map(|event| match event {
                        BrokerEvent::Unsubscribed { .. } => "unsub",
                        BrokerEvent::Disconnected { .. } => "disconnect",
                        _ => "other",
                    })
                    .collect();
                assert_eq!(tail, ["disconnect", "unsub"]);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn commands_out_of_order_are_refused() {
    let result = Scenario::new("refusals")
        .join(LOBBY)
        .connect()
        .send("nowhere")
        .oracle(Box::new(|world| {
            let errors: Vec<_> = world.refusals().iter().map(|r| (r.step, r.error.clone())).collect();
            assert!(matches!(
                errors.as_slice(),
                [
                    (0, ClientError::Session(SessionError::NotConnected { .. })),
                    (2, ClientError::Session(SessionError::NoActiveRoom)),
                ]
            ));
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn malformed_live_body_is_reported_and_skipped() {
    let result = Scenario::new("malformed frame")
        .connect()
        .join(LOBBY)
        .step(Step::InjectRaw { room_id: LOBBY, body: "{not json".to_string() })
        .inject(LOBBY, stored(5, LOBBY, "still flowing", 0))
        .oracle(oracle::all_of(vec![
            oracle::state_is(ConnectionState::Connected),
            oracle::timeline_is(&["still flowing"]),
            Box::new(|world| {
                let reported = world
                    .notices()
                    .iter()
                    .any(|notice| matches!(notice, SessionNotice::MalformedFrame { .. }));
                if reported { Ok(()) } else { Err("no MalformedFrame notice".into()) }
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}
