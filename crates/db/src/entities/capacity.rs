//! Capacity entity.

use std::collections::BTreeMap;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SQL for the sellable ceiling of a row.
///
/// The overbooking allowance is floored by integer division.
pub const CEILING_SQL: &str = "(CASE WHEN overbooking_enabled \
     THEN total_capacity + (total_capacity * overbooking_percentage) / 100 \
     ELSE total_capacity END)";

/// Sellable ceiling: `total` plus the floored overbooking allowance.
///
/// Evaluates the same expression as [`CEILING_SQL`], for values that are
/// not stored yet.
#[must_use]
pub const fn ceiling(total: i32, overbooking_percentage: i32, overbooking_enabled: bool) -> i64 {
    let total = total as i64;
    if overbooking_enabled {
        total + total * overbooking_percentage as i64 / 100
    } else {
        total
    }
}

/// Sellable inventory of one event.
///
/// `available_capacity` is a cached `max(total - blocked, 0)`, and
/// `blocked_capacity` counts every hold that has not been released
/// (active and consumed alike). `confirmed_capacity` is the consumed share.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "capacity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning event.
    #[sea_orm(unique)]
    pub event_id: String,

    pub total_capacity: i32,

    pub available_capacity: i32,

    pub blocked_capacity: i32,

    pub confirmed_capacity: i32,

    /// Allowance above `total_capacity`, in percent (0-50).
    pub overbooking_percentage: i32,

    pub overbooking_enabled: bool,

    pub waitlist_enabled: bool,

    /// Lifetime of a hold, in minutes (5-60).
    pub lock_timeout_minutes: i32,

    /// Severity name to occupancy percentage.
    #[sea_orm(column_type = "JsonBinary")]
    pub alert_thresholds: Json,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    /// Soft delete marker.
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Alert thresholds as a severity to percentage map.
    ///
    /// Entries that are not integers are ignored.
    #[must_use]
    pub fn thresholds(&self) -> BTreeMap<String, i32> {
        self.alert_thresholds
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(severity, pct)| {
                        pct.as_i64().map(|p| (severity.clone(), p as i32))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether the record has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reservation_hold::Entity")]
    ReservationHold,
}

impl Related<super::reservation_hold::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReservationHold.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
