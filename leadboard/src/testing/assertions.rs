//! Board assertions.
//!
//! These take rendered lanes so they work on a [`crate::board::BoardStore`]
//! and on a mounted [`crate::session::BoardSession`] alike.

use crate::board::LaneView;
use crate::queue::MutationQueue;

/// Asserts that every lane is numbered 1..N.
pub fn assert_contiguous(lanes: &[LaneView]) {
    for lane in lanes {
        let orders: Vec<u32> = lane.contacts.iter().map(|c| c.order).collect();
        let expected: Vec<u32> = (1..).take(orders.len()).collect();
        assert_eq!(orders, expected, "Stage '{}' is not numbered 1..N", lane.stage.id);
    }
}

/// Asserts a lane's contact ids, in order.
pub fn assert_lane(lanes: &[LaneView], stage_id: &str, expected: &[&str]) {
    let lane = lanes
        .iter()
        .find(|l| l.stage.id == stage_id)
        .unwrap_or_else(|| panic!("Stage '{stage_id}' is not on the board"));
    let actual: Vec<&str> = lane.contacts.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(actual, expected, "Unexpected contacts in stage '{stage_id}'");
}

/// Asserts the queued (contact, stage, order) triples, in queue order.
pub fn assert_queued(queue: &MutationQueue, expected: &[(&str, &str, u32)]) {
    let snapshot = queue.flush_all();
    let actual: Vec<(&str, &str, u32)> = snapshot
        .iter()
        .map(|u| (u.contact_id.as_str(), u.stage_id.as_str(), u.order))
        .collect();
    assert_eq!(actual, expected, "Unexpected queue contents");
}
