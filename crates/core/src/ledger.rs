//! Capacity ledger arithmetic.
//!
//! Pure counterparts of the conditional updates issued by
//! [`eventix_db::repositories::CapacityRepository`]. The database statements
//! are the source of truth. Snapshots and alert evaluation read counters
//! through [`Ledger`]; its `reserve`/`release`/`confirm` transitions exist only
//! as a model of those statements for the property tests below.

use std::collections::BTreeMap;

use eventix_db::entities::capacity;

pub use eventix_db::entities::capacity::ceiling;

/// Occupancy in percent, measured against `total`.
///
/// May exceed 100 when overbooking is in use. An event with no capacity
/// counts as full.
#[must_use]
pub const fn occupancy_percent(blocked: i32, total: i32) -> i64 {
    if total <= 0 {
        return 100;
    }
    blocked as i64 * 100 / total as i64
}

/// Severities whose threshold lies in `(before, after]`, lowest first.
#[must_use]
pub fn crossed_thresholds(
    thresholds: &BTreeMap<String, i32>,
    before: i64,
    after: i64,
) -> Vec<(String, i32)> {
    let mut crossed: Vec<(String, i32)> = thresholds
        .iter()
        .filter(|(_, pct)| before < i64::from(**pct) && i64::from(**pct) <= after)
        .map(|(severity, pct)| (severity.clone(), *pct))
        .collect();
    crossed.sort_by_key(|(_, pct)| *pct);
    crossed
}

/// In-memory view of one capacity row's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ledger {
    pub total: i32,
    pub blocked: i32,
    pub confirmed: i32,
    pub overbooking_percentage: i32,
    pub overbooking_enabled: bool,
}

impl Ledger {
    /// Ledger of a stored capacity row.
    #[must_use]
    pub const fn from_model(model: &capacity::Model) -> Self {
        Self {
            total: model.total_capacity,
            blocked: model.blocked_capacity,
            confirmed: model.confirmed_capacity,
            overbooking_percentage: model.overbooking_percentage,
            overbooking_enabled: model.overbooking_enabled,
        }
    }

    #[must_use]
    pub const fn ceiling(&self) -> i64 {
        ceiling(self.total, self.overbooking_percentage, self.overbooking_enabled)
    }

    /// Cached `available_capacity` value for these counters.
    #[must_use]
    pub const fn available(&self) -> i32 {
        let available = self.total - self.blocked;
        if available > 0 { available } else { 0 }
    }

    /// Units that can still be reserved before the ceiling is hit.
    #[must_use]
    pub const fn remaining(&self) -> i64 {
        let remaining = self.ceiling() - self.blocked as i64;
        if remaining > 0 { remaining } else { 0 }
    }

    #[must_use]
    pub const fn occupancy_percent(&self) -> i64 {
        occupancy_percent(self.blocked, self.total)
    }
}

/// Counter transitions mirrored from the repository statements.
#[cfg(test)]
impl Ledger {
    /// Empty ledger for a fresh event.
    #[must_use]
    pub const fn new(total: i32, overbooking_percentage: i32, overbooking_enabled: bool) -> Self {
        Self {
            total,
            blocked: 0,
            confirmed: 0,
            overbooking_percentage,
            overbooking_enabled,
        }
    }

    /// Whether `quantity` more units fit under the ceiling.
    #[must_use]
    pub const fn can_reserve(&self, quantity: i32) -> bool {
        quantity > 0 && self.blocked as i64 + quantity as i64 <= self.ceiling()
    }

    /// Counters after reserving `quantity`, or `None` if it does not fit.
    #[must_use]
    pub const fn reserve(self, quantity: i32) -> Option<Self> {
        if !self.can_reserve(quantity) {
            return None;
        }
        Some(Self {
            blocked: self.blocked + quantity,
            ..self
        })
    }

    /// Counters after releasing an active hold of `quantity`.
    #[must_use]
    pub const fn release(self, quantity: i32) -> Self {
        let blocked = self.blocked - quantity;
        Self {
            blocked: if blocked > 0 { blocked } else { 0 },
            ..self
        }
    }

    /// Counters after consuming an active hold of `quantity`.
    #[must_use]
    pub const fn confirm(self, quantity: i32) -> Self {
        Self {
            confirmed: self.confirmed + quantity,
            ..self
        }
    }
}
