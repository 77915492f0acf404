//! Reservation hold entity.

use sea_orm::Iterable;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a hold: `active` until it is either consumed or released.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum HoldStatus {
    /// Capacity is held, waiting for payment.
    #[sea_orm(string_value = "active")]
    #[default]
    Active,
    /// Capacity was handed back to the sellable pool.
    #[sea_orm(string_value = "released")]
    Released,
    /// Payment captured; the capacity is permanently taken.
    #[sea_orm(string_value = "consumed")]
    Consumed,
}

impl HoldStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Released | Self::Consumed)
    }

    /// Transition table: only `active -> consumed` and `active -> released`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Consumed) | (Self::Active, Self::Released)
        )
    }

    /// Statuses from which `target` is reachable in one step.
    #[must_use]
    pub fn sources_of(target: Self) -> Vec<Self> {
        Self::iter()
            .filter(|status| status.can_transition_to(target))
            .collect()
    }
}

impl std::fmt::Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Released => "released",
            Self::Consumed => "consumed",
        };
        f.write_str(s)
    }
}

/// Why a hold was released.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ReleaseReason {
    /// Explicit cancellation by the organizer.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
    /// Released by the reconciliation sweep after `expires_at`.
    #[sea_orm(string_value = "expired")]
    Expired,
}

/// A temporary decrement of sellable capacity.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reservation_hold")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub event_id: String,

    /// Owning group registration.
    #[sea_orm(indexed)]
    pub group_registration_id: String,

    pub quantity: i32,

    pub status: HoldStatus,

    #[sea_orm(nullable)]
    pub release_reason: Option<ReleaseReason>,

    #[sea_orm(indexed)]
    pub expires_at: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub released_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub consumed_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether the hold is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::capacity::Entity",
        from = "Column::EventId",
        to = "super::capacity::Column::EventId",
        on_delete = "Cascade"
    )]
    Capacity,
}

impl Related<super::capacity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Capacity.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
