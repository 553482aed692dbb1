//! Reusable oracles.
//!
//! Each helper returns an [`OracleFn`]; combine them with [`all_of`].

use roomfeed_core::ConnectionState;
use roomfeed_proto::RoomId;

use crate::scenario::{OracleFn, World};

/// Run every oracle, failing on the first that fails.
pub fn all_of(oracles: Vec<OracleFn>) -> OracleFn {
    Box::new(move |world: &World| oracles.iter().try_for_each(|oracle| oracle(world)))
}

/// The session ended in `expected`.
pub fn state_is(expected: ConnectionState) -> OracleFn {
    Box::new(move |world: &World| {
        if world.state() == expected {
            Ok(())
        } else {
            Err(format!("expected state {expected:?}, got {:?}", world.state()))
        }
    })
}

/// The timeline shows `room_id`.
pub fn in_room(room_id: RoomId) -> OracleFn {
    Box::new(move |world: &World| match world.room() {
        Some(room) if room == room_id => Ok(()),
        other => Err(format!("expected room {room_id}, timeline shows {other:?}")),
    })
}

/// The timeline shows exactly `expected`, in order.
pub fn timeline_is(expected: &[&str]) -> OracleFn {
    let expected: Vec<String> = expected.iter().map(|content| (*content).to_string()).collect();
    Box::new(move |world: &World| {
        let actual = world.contents();
        if actual == expected {
            Ok(())
        } else {
            Err(format!("expected timeline {expected:?}, got {actual:?}"))
        }
    })
}

/// No content appears twice on the timeline.
pub fn no_duplicates() -> OracleFn {
    Box::new(|world: &World| {
        if world.timeline_has_no_duplicates() {
            Ok(())
        } else {
            Err(format!("duplicate on timeline: {:?}", world.contents()))
        }
    })
}

/// At most one room subscription is open on the broker.
pub fn at_most_one_subscription() -> OracleFn {
    Box::new(|world: &World| {
        let open = world.open_subscriptions();
        if open.len() <= 1 {
            Ok(())
        } else {
            Err(format!("{} subscriptions open: {open:?}", open.len()))
        }
    })
}

/// No step was refused.
pub fn nothing_refused() -> OracleFn {
    Box::new(|world: &World| match world.refusals() {
        [] => Ok(()),
        refusals => Err(format!("steps refused: {refusals:?}")),
    })
}
