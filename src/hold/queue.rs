//! Queue ordering and promotion rules shared by the hold service and the
//! circulation engine (which promotes inside its own return transaction).

use chrono::NaiveDateTime;
use crate::catalog::domain::model::ItemEntity;
use crate::hold::domain::model::HoldEntity;
use crate::store::memory::Tables;

// Next priority for a new hold on a title: one past the highest priority
// ever placed, canceled holds included. The counter only moves forward, so
// a cancellation never causes reuse or renumbering.
pub fn next_priority(tables: &Tables, title_id: &str) -> i64 {
    tables
        .holds_for_title(title_id)
        .iter()
        .map(|hold| hold.priority)
        .max()
        .unwrap_or(0)
        + 1
}

// Active unfulfilled hold by another patron that reserves this item: either
// an item-level hold on the copy or a title-level hold on its title.
pub fn blocking_hold(tables: &Tables, item: &ItemEntity, patron_id: &str) -> Option<HoldEntity> {
    tables
        .holds_for_title(item.title_id.as_str())
        .into_iter()
        .filter(|hold| hold.is_active() && hold.patron_id != patron_id)
        .find(|hold| match &hold.item_id {
            Some(held_item) => held_item == &item.item_id,
            None => true,
        })
}

// The requesting patron's own active holds satisfied by checking out this
// item; self-holds are fulfillment, not a conflict.
pub fn holds_fulfilled_by(tables: &Tables, item: &ItemEntity, patron_id: &str) -> Vec<HoldEntity> {
    tables
        .holds_for_title(item.title_id.as_str())
        .into_iter()
        .filter(|hold| hold.is_active() && hold.patron_id == patron_id)
        .filter(|hold| match &hold.item_id {
            Some(held_item) => held_item == &item.item_id,
            None => true,
        })
        .collect()
}

// Earliest waiting hold served by the freed copy. Item-level holds on that
// exact copy are served before any title-level hold: a copy-specific request
// can only ever be satisfied by this copy, while title-level waiters can
// take the next one. Within each class: ascending priority, then placed_at.
pub fn next_in_line(tables: &Tables, item: &ItemEntity) -> Option<HoldEntity> {
    let mut candidates: Vec<HoldEntity> = tables
        .holds_for_title(item.title_id.as_str())
        .into_iter()
        .filter(|hold| hold.is_waiting())
        .filter(|hold| match &hold.item_id {
            Some(held_item) => held_item == &item.item_id,
            None => true,
        })
        .collect();
    candidates.sort_by(|a, b| {
        let a_item_level = a.item_id.is_some();
        let b_item_level = b.item_id.is_some();
        b_item_level
            .cmp(&a_item_level)
            .then(a.priority.cmp(&b.priority))
            .then(a.placed_at.cmp(&b.placed_at))
    });
    candidates.into_iter().next()
}

// Moves the head of queue to the pickup shelf; no-op when nobody waits.
pub fn promote_next(tables: &mut Tables, item: &ItemEntity, pickup_window_days: i64,
                    now: NaiveDateTime) -> Option<HoldEntity> {
    let mut head = next_in_line(tables, item)?;
    head.promote(pickup_window_days, now);
    tables.upsert_hold(&head);
    Some(head)
}
