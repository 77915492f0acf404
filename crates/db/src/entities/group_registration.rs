//! Group registration entity.

use sea_orm::Iterable;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle of a group registration.
///
/// Stored and serialized with the platform's status names
/// (`BORRADOR`, `PENDIENTE_PAGO`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[derive(Default)]
pub enum RegistrationStatus {
    /// Checkout started, nothing submitted yet.
    #[sea_orm(string_value = "BORRADOR")]
    #[serde(rename = "BORRADOR")]
    #[default]
    Draft,
    /// Payment intent submitted to the gateway.
    #[sea_orm(string_value = "PENDIENTE_PAGO")]
    #[serde(rename = "PENDIENTE_PAGO")]
    PendingPayment,
    /// Gateway confirmed the capture.
    #[sea_orm(string_value = "PAGADO")]
    #[serde(rename = "PAGADO")]
    Paid,
    /// Hold consumed; seats are sold.
    #[sea_orm(string_value = "CONFIRMADO")]
    #[serde(rename = "CONFIRMADO")]
    Confirmed,
    #[sea_orm(string_value = "CANCELADO")]
    #[serde(rename = "CANCELADO")]
    Cancelled,
    /// Hold expired before payment.
    #[sea_orm(string_value = "EXPIRADO")]
    #[serde(rename = "EXPIRADO")]
    Expired,
    #[sea_orm(string_value = "REEMBOLSADO")]
    #[serde(rename = "REEMBOLSADO")]
    Refunded,
}

impl RegistrationStatus {
    /// Statuses reachable in one step from `self`.
    #[must_use]
    pub const fn next_states(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::PendingPayment, Self::Cancelled, Self::Expired],
            Self::PendingPayment => &[Self::Paid, Self::Cancelled, Self::Expired],
            Self::Paid => &[Self::Confirmed, Self::Refunded],
            Self::Confirmed => &[Self::Cancelled, Self::Refunded],
            Self::Cancelled | Self::Expired | Self::Refunded => &[],
        }
    }

    /// Whether `self -> next` is in the transition table.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next_states().contains(&next)
    }

    /// Statuses from which `target` is reachable in one step.
    #[must_use]
    pub fn sources_of(target: Self) -> Vec<Self> {
        Self::iter()
            .filter(|status| status.can_transition_to(target))
            .collect()
    }

    /// Whether the registration is finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired | Self::Refunded)
    }

    /// Whether the linked hold is still expected to be active.
    #[must_use]
    pub const fn awaits_payment(self) -> bool {
        matches!(self, Self::Draft | Self::PendingPayment)
    }

    /// Platform status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "BORRADOR",
            Self::PendingPayment => "PENDIENTE_PAGO",
            Self::Paid => "PAGADO",
            Self::Confirmed => "CONFIRMADO",
            Self::Cancelled => "CANCELADO",
            Self::Expired => "EXPIRADO",
            Self::Refunded => "REEMBOLSADO",
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A multi-participant purchase under one organizer.
///
/// Pricing fields are written once at creation so later tier changes do not
/// rewrite history.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "group_registration")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub group_code: String,

    #[sea_orm(indexed)]
    pub event_id: String,

    #[sea_orm(indexed)]
    pub organizer_id: String,

    /// Linked capacity hold.
    #[sea_orm(unique)]
    pub hold_id: String,

    pub participant_count: i32,

    /// Per-participant price in minor currency units.
    pub base_price: i64,

    pub group_discount_percent: i32,

    pub discount_amount: i64,

    pub final_price: i64,

    pub status: RegistrationStatus,

    pub reservation_expires_at: DateTimeWithTimeZone,

    /// Gateway capture or contract reference.
    #[sea_orm(nullable)]
    pub payment_reference: Option<String>,

    #[sea_orm(nullable)]
    pub paid_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub confirmed_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub cancelled_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::reservation_hold::Entity",
        from = "Column::HoldId",
        to = "super::reservation_hold::Column::Id",
        on_delete = "Restrict"
    )]
    ReservationHold,
}

impl Related<super::reservation_hold::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReservationHold.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses_have_no_exits() {
        for status in RegistrationStatus::iter() {
            assert_eq!(status.is_terminal(), status.next_states().is_empty());
        }
    }

    #[test]
    fn test_expired_only_from_unpaid_states() {
        let sources = RegistrationStatus::sources_of(RegistrationStatus::Expired);
        assert_eq!(
            sources,
            vec![RegistrationStatus::Draft, RegistrationStatus::PendingPayment]
        );
    }

    #[test]
    fn test_confirmed_only_from_paid() {
        assert_eq!(
            RegistrationStatus::sources_of(RegistrationStatus::Confirmed),
            vec![RegistrationStatus::Paid]
        );
        assert!(!RegistrationStatus::PendingPayment.can_transition_to(RegistrationStatus::Confirmed));
    }

    #[test]
    fn test_serde_uses_platform_names() {
        let json = serde_json::to_string(&RegistrationStatus::PendingPayment).unwrap_or_default();
        assert_eq!(json, "\"PENDIENTE_PAGO\"");
        assert_eq!(RegistrationStatus::Refunded.to_string(), "REEMBOLSADO");
    }
}
