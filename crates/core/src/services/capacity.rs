//! Capacity service.
//!
//! Owns the per-event capacity record and the hold lifecycle. The `*_in`
//! variants run on a caller-supplied connection so the group registration
//! service can compose them into its own transactions.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use eventix_common::{AppError, AppResult, id::IdGenerator};
use eventix_db::entities::reservation_hold::{HoldStatus, ReleaseReason};
use eventix_db::entities::{capacity, reservation_hold};
use eventix_db::repositories::{CapacityRepository, CapacitySettings, ReservationHoldRepository};
use sea_orm::{ConnectionTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ledger::{Ledger, ceiling, crossed_thresholds, occupancy_percent};
use crate::services::notifier::{CapacityEvent, CapacityNotifierService, notify_quietly};

/// Input for configuring the capacity of an event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureCapacityInput {
    #[validate(range(min = 0, max = 1_000_000))]
    pub total_capacity: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 50))]
    pub overbooking_percentage: i32,
    #[serde(default)]
    pub overbooking_enabled: bool,
    #[serde(default)]
    pub waitlist_enabled: bool,
    #[validate(range(min = 5, max = 60))]
    pub lock_timeout_minutes: Option<i32>,
    /// Severity name to occupancy percentage (1-100).
    #[serde(default)]
    pub alert_thresholds: BTreeMap<String, i32>,
}

/// Availability of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacitySnapshot {
    pub event_id: String,
    pub total_capacity: i32,
    pub available_capacity: i32,
    pub blocked_capacity: i32,
    pub confirmed_capacity: i32,
    pub overbooking_enabled: bool,
    pub overbooking_percentage: i32,
    pub ceiling: i64,
    /// Units that can still be reserved, overbooking included.
    pub remaining: i64,
    pub occupancy_percent: i64,
    pub waitlist_enabled: bool,
    /// Sold out with the waitlist switched on.
    pub waitlist_open: bool,
    pub lock_timeout_minutes: i32,
    pub alert_thresholds: BTreeMap<String, i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<capacity::Model> for CapacitySnapshot {
    fn from(model: capacity::Model) -> Self {
        let ledger = Ledger::from_model(&model);
        let remaining = ledger.remaining();
        Self {
            alert_thresholds: model.thresholds(),
            event_id: model.event_id,
            total_capacity: model.total_capacity,
            available_capacity: model.available_capacity,
            blocked_capacity: model.blocked_capacity,
            confirmed_capacity: model.confirmed_capacity,
            overbooking_enabled: model.overbooking_enabled,
            overbooking_percentage: model.overbooking_percentage,
            ceiling: ledger.ceiling(),
            remaining,
            occupancy_percent: ledger.occupancy_percent(),
            waitlist_enabled: model.waitlist_enabled,
            waitlist_open: model.waitlist_enabled && remaining == 0,
            lock_timeout_minutes: model.lock_timeout_minutes,
            updated_at: model.updated_at.map(Into::into),
        }
    }
}

/// A freshly created hold together with the capacity row it drew from.
#[derive(Debug, Clone)]
pub struct ReservedHold {
    pub hold: reservation_hold::Model,
    /// Capacity row as updated by the reservation.
    pub capacity: capacity::Model,
}

/// Service for event capacity and reservation holds.
#[derive(Clone)]
pub struct CapacityService {
    capacity_repo: CapacityRepository,
    notifier: CapacityNotifierService,
    default_lock_timeout_minutes: i32,
    id_gen: IdGenerator,
}

impl CapacityService {
    /// Create a new capacity service.
    #[must_use]
    pub const fn new(
        capacity_repo: CapacityRepository,
        notifier: CapacityNotifierService,
        default_lock_timeout_minutes: i32,
    ) -> Self {
        Self {
            capacity_repo,
            notifier,
            default_lock_timeout_minutes,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create or reconfigure the capacity of an event.
    ///
    /// Reconfiguring fails with `Conflict` when the new ceiling would fall
    /// below what is already blocked. Configuring a removed record restores it.
    pub async fn configure(
        &self,
        event_id: &str,
        input: ConfigureCapacityInput,
    ) -> AppResult<CapacitySnapshot> {
        input.validate()?;
        validate_event_id(event_id)?;
        validate_thresholds(&input.alert_thresholds)?;

        let now = Utc::now();
        let existing = self.capacity_repo.find_by_event_id(event_id).await?;

        let settings = CapacitySettings {
            total_capacity: input.total_capacity,
            overbooking_percentage: input.overbooking_percentage,
            overbooking_enabled: input.overbooking_enabled,
            waitlist_enabled: input.waitlist_enabled,
            lock_timeout_minutes: input
                .lock_timeout_minutes
                .or_else(|| existing.as_ref().map(|c| c.lock_timeout_minutes))
                .unwrap_or(self.default_lock_timeout_minutes),
            alert_thresholds: serde_json::to_value(&input.alert_thresholds)
                .map_err(|e| AppError::Internal(e.to_string()))?,
        };

        let created = match existing {
            Some(_) => false,
            None => {
                let model = capacity::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    event_id: Set(event_id.to_string()),
                    total_capacity: Set(settings.total_capacity),
                    available_capacity: Set(settings.total_capacity),
                    blocked_capacity: Set(0),
                    confirmed_capacity: Set(0),
                    overbooking_percentage: Set(settings.overbooking_percentage),
                    overbooking_enabled: Set(settings.overbooking_enabled),
                    waitlist_enabled: Set(settings.waitlist_enabled),
                    lock_timeout_minutes: Set(settings.lock_timeout_minutes),
                    alert_thresholds: Set(settings.alert_thresholds.clone()),
                    created_at: Set(now.into()),
                    updated_at: Set(None),
                    deleted_at: Set(None),
                };
                self.capacity_repo.insert_if_absent(model).await?
            }
        };

        if created {
            tracing::info!(
                event_id = event_id,
                total = settings.total_capacity,
                "Capacity created"
            );
        } else {
            // Either the row existed, or a concurrent configure inserted it first.
            if !self
                .capacity_repo
                .update_settings(event_id, &settings, now)
                .await?
            {
                return Err(AppError::Conflict(format!(
                    "Blocked capacity of event {event_id} exceeds the new ceiling of {}",
                    ceiling(
                        settings.total_capacity,
                        settings.overbooking_percentage,
                        settings.overbooking_enabled,
                    )
                )));
            }
            tracing::info!(
                event_id = event_id,
                total = settings.total_capacity,
                "Capacity reconfigured"
            );
        }

        self.get(event_id).await
    }

    /// Availability snapshot of an event.
    pub async fn get(&self, event_id: &str) -> AppResult<CapacitySnapshot> {
        self.capacity_repo
            .get_live_by_event_id(event_id)
            .await
            .map(CapacitySnapshot::from)
    }

    /// Soft delete the capacity of an event.
    pub async fn remove(&self, event_id: &str) -> AppResult<()> {
        self.capacity_repo.get_live_by_event_id(event_id).await?;

        if !self.capacity_repo.soft_delete(event_id, Utc::now()).await? {
            return Err(AppError::Conflict(format!(
                "Event {event_id} still has active reservation holds"
            )));
        }

        tracing::info!(event_id = event_id, "Capacity removed");
        Ok(())
    }

    /// Reserve capacity and create an active hold in its own transaction.
    pub async fn reserve(
        &self,
        event_id: &str,
        quantity: i32,
        group_registration_id: &str,
    ) -> AppResult<reservation_hold::Model> {
        let txn = self
            .capacity_repo
            .db()
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let reserved = self
            .reserve_in(
                &txn,
                event_id,
                quantity,
                group_registration_id,
                self.id_gen.generate(),
                Utc::now(),
            )
            .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.notify_thresholds(&reserved.capacity, quantity).await;
        Ok(reserved.hold)
    }

    /// Reserve capacity and create an active hold on `conn`.
    ///
    /// The counter update is a single conditional statement, so concurrent
    /// reservations for the same event serialize on the capacity row and can
    /// never push `blocked_capacity` past the ceiling.
    pub async fn reserve_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        event_id: &str,
        quantity: i32,
        group_registration_id: &str,
        hold_id: String,
        now: DateTime<Utc>,
    ) -> AppResult<ReservedHold> {
        if quantity <= 0 {
            return Err(AppError::BadRequest(
                "Reservation quantity must be positive".to_string(),
            ));
        }

        if !CapacityRepository::try_reserve(conn, event_id, quantity, now).await? {
            return Err(match CapacityRepository::find_by_event_id_in(conn, event_id).await? {
                Some(record) if !record.is_deleted() => {
                    let remaining = Ledger::from_model(&record).remaining();
                    tracing::debug!(
                        event_id = event_id,
                        quantity = quantity,
                        remaining = remaining,
                        "Reservation refused"
                    );
                    AppError::CapacityExceeded(format!(
                        "Event {event_id} has {remaining} units left, {quantity} requested"
                    ))
                }
                _ => AppError::NotFound(format!("Capacity not found for event: {event_id}")),
            });
        }

        let capacity = CapacityRepository::get_live_by_event_id_in(conn, event_id).await?;
        let expires_at = now + Duration::minutes(i64::from(capacity.lock_timeout_minutes));

        let hold = ReservationHoldRepository::create(
            conn,
            reservation_hold::ActiveModel {
                id: Set(hold_id),
                event_id: Set(event_id.to_string()),
                group_registration_id: Set(group_registration_id.to_string()),
                quantity: Set(quantity),
                status: Set(HoldStatus::Active),
                release_reason: Set(None),
                expires_at: Set(expires_at.into()),
                created_at: Set(now.into()),
                released_at: Set(None),
                consumed_at: Set(None),
            },
        )
        .await?;

        tracing::info!(
            event_id = event_id,
            hold_id = %hold.id,
            quantity = quantity,
            blocked = capacity.blocked_capacity,
            "Capacity reserved"
        );

        Ok(ReservedHold { hold, capacity })
    }

    /// Release a hold in its own transaction. Releasing twice is a no-op.
    pub async fn release(&self, hold_id: &str) -> AppResult<bool> {
        let txn = self
            .capacity_repo
            .db()
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let released = Self::release_in(&txn, hold_id, Utc::now()).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(released)
    }

    /// Release an active hold on `conn` and hand its quantity back.
    ///
    /// Returns whether this call released the hold; `false` means it was
    /// already released. A consumed hold cannot be released.
    pub async fn release_in<C: ConnectionTrait>(
        conn: &C,
        hold_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let hold = ReservationHoldRepository::get_by_id_in(conn, hold_id).await?;

        if ReservationHoldRepository::mark_released(conn, hold_id, ReleaseReason::Cancelled, now)
            .await?
        {
            CapacityRepository::restore(conn, &hold.event_id, hold.quantity, now).await?;
            tracing::info!(
                event_id = %hold.event_id,
                hold_id = hold_id,
                quantity = hold.quantity,
                "Hold released"
            );
            return Ok(true);
        }

        let current = ReservationHoldRepository::get_by_id_in(conn, hold_id).await?;
        if current.status == HoldStatus::Released {
            return Ok(false);
        }
        if current.status.can_transition_to(HoldStatus::Released) {
            return Err(AppError::Conflict(format!(
                "Hold {hold_id} changed concurrently"
            )));
        }
        tracing::warn!(
            hold_id = hold_id,
            status = %current.status,
            "Refusing to release a hold"
        );
        Err(AppError::InvalidHoldTransition(format!(
            "Hold {hold_id} is {} and cannot be released",
            current.status
        )))
    }

    /// Consume a hold in its own transaction.
    pub async fn confirm(&self, hold_id: &str) -> AppResult<reservation_hold::Model> {
        let txn = self
            .capacity_repo
            .db()
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let hold = Self::confirm_in(&txn, hold_id, Utc::now()).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(hold)
    }

    /// Consume an active, unexpired hold on `conn`.
    ///
    /// Fails with `HoldExpired` when the hold ran out (swept or not yet), and
    /// with `InvalidHoldTransition` when it is already consumed or was cancelled.
    pub async fn confirm_in<C: ConnectionTrait>(
        conn: &C,
        hold_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<reservation_hold::Model> {
        let hold = ReservationHoldRepository::get_by_id_in(conn, hold_id).await?;

        if ReservationHoldRepository::mark_consumed(conn, hold_id, now).await? {
            CapacityRepository::record_confirmed(conn, &hold.event_id, hold.quantity, now).await?;
            tracing::info!(
                event_id = %hold.event_id,
                hold_id = hold_id,
                quantity = hold.quantity,
                "Hold consumed"
            );
            return Ok(reservation_hold::Model {
                status: HoldStatus::Consumed,
                consumed_at: Some(now.into()),
                ..hold
            });
        }

        let current = ReservationHoldRepository::get_by_id_in(conn, hold_id).await?;
        match (current.status, current.release_reason) {
            // Still allowed by the table, so only the expiry guard refused it.
            (status, _) if status.can_transition_to(HoldStatus::Consumed) => Err(
                AppError::HoldExpired(format!("Hold {hold_id} expired at {}", current.expires_at)),
            ),
            (HoldStatus::Released, Some(ReleaseReason::Expired)) => Err(AppError::HoldExpired(
                format!("Hold {hold_id} expired at {}", current.expires_at),
            )),
            (status, _) => {
                tracing::warn!(
                    hold_id = hold_id,
                    status = %status,
                    "Refusing to consume a hold that is not active"
                );
                Err(AppError::InvalidHoldTransition(format!(
                    "Hold {hold_id} is {status} and cannot be consumed"
                )))
            }
        }
    }

    /// Emit threshold alerts for a reservation of `quantity` that left the
    /// row at `after`. Never fails.
    pub async fn notify_thresholds(&self, after: &capacity::Model, quantity: i32) {
        let total = after.total_capacity;
        let before_pct = occupancy_percent(after.blocked_capacity - quantity, total);
        let after_pct = occupancy_percent(after.blocked_capacity, total);

        for (severity, threshold) in crossed_thresholds(&after.thresholds(), before_pct, after_pct)
        {
            tracing::info!(
                event_id = %after.event_id,
                severity = %severity,
                occupancy = after_pct,
                "Capacity threshold crossed"
            );
            notify_quietly(
                &self.notifier,
                CapacityEvent::ThresholdCrossed {
                    event_id: after.event_id.clone(),
                    severity,
                    threshold_percent: threshold,
                    occupancy_percent: after_pct,
                },
            )
            .await;
        }
    }
}

fn validate_event_id(event_id: &str) -> AppResult<()> {
    if event_id.trim().is_empty() || event_id.len() > 64 {
        return Err(AppError::Validation(
            "eventId must be between 1 and 64 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_thresholds(thresholds: &BTreeMap<String, i32>) -> AppResult<()> {
    for (severity, pct) in thresholds {
        if severity.trim().is_empty() {
            return Err(AppError::Validation(
                "alert threshold names must not be empty".to_string(),
            ));
        }
        if !(1..=100).contains(pct) {
            return Err(AppError::Validation(format!(
                "alert threshold {severity} must be between 1 and 100, got {pct}"
            )));
        }
    }
    Ok(())
}
