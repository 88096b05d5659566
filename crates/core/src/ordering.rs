//! Step ordering rules.
//!
//! Steps within a manual carry an `order_number` forming the contiguous
//! sequence `0..count-1`. The functions here decide what a mutation is
//! allowed to do; the metadata crate applies the result inside a single
//! transaction.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// A step id paired with its (current or requested) order number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOrder {
    /// Step id.
    pub id: i64,
    /// Zero-based position within the manual.
    pub order_number: i32,
}

impl StepOrder {
    pub fn new(id: i64, order_number: i32) -> Self {
        Self { id, order_number }
    }
}

/// Reasons an ordering mutation is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("order position {position} is out of range (manual has {count} steps)")]
    PositionOutOfRange { position: i32, count: i64 },

    #[error("step {0} appears more than once in the reorder request")]
    DuplicateStep(i64),

    #[error("step {step_id} has negative order number {order_number}")]
    NegativeOrder { step_id: i64, order_number: i32 },

    #[error("step {step_id} does not belong to this manual")]
    ForeignStep { step_id: i64 },

    #[error("resulting step order is not a contiguous sequence starting at 0")]
    NotContiguous,

    #[error("reorder request is empty")]
    Empty,
}

/// Order number for a step appended to a manual whose highest order is `existing_max`.
pub fn next_order(existing_max: Option<i32>) -> i32 {
    existing_max.map_or(0, |max| max.saturating_add(1))
}

/// Check an explicit insert position against the current step count.
///
/// Valid positions are `0..=count`. Inserting at `position` shifts every step
/// at or after it up by one, so the sequence stays contiguous.
pub fn validate_insert_position(position: i32, count: i64) -> Result<(), OrderingError> {
    if position < 0 || i64::from(position) > count {
        return Err(OrderingError::PositionOutOfRange { position, count });
    }
    Ok(())
}

/// Validate a bulk reorder request against the manual's current steps.
///
/// Steps not named in `requested` keep their current order. The merged
/// result must be exactly `0..count-1`.
pub fn validate_reorder(
    requested: &[StepOrder],
    current: &[StepOrder],
) -> Result<(), OrderingError> {
    if requested.is_empty() {
        return Err(OrderingError::Empty);
    }

    let mut merged: HashMap<i64, i32> = current
        .iter()
        .map(|step| (step.id, step.order_number))
        .collect();

    let mut seen = HashSet::with_capacity(requested.len());
    for entry in requested {
        if !seen.insert(entry.id) {
            return Err(OrderingError::DuplicateStep(entry.id));
        }
        if entry.order_number < 0 {
            return Err(OrderingError::NegativeOrder {
                step_id: entry.id,
                order_number: entry.order_number,
            });
        }
        match merged.get_mut(&entry.id) {
            Some(order) => *order = entry.order_number,
            None => return Err(OrderingError::ForeignStep { step_id: entry.id }),
        }
    }

    if !is_contiguous(merged.values().copied()) {
        return Err(OrderingError::NotContiguous);
    }
    Ok(())
}

/// True when `orders` is a permutation of `0..n`.
pub fn is_contiguous(orders: impl IntoIterator<Item = i32>) -> bool {
    let mut orders: Vec<i32> = orders.into_iter().collect();
    orders.sort_unstable();
    orders
        .iter()
        .enumerate()
        .all(|(idx, order)| i64::from(*order) == idx as i64)
}
