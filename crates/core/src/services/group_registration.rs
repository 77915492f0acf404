//! Group registration service.
//!
//! Keeps each registration's status in lockstep with its capacity hold: every
//! write that moves both happens in one transaction.

use chrono::{DateTime, Utc};
use eventix_common::config::DiscountTier;
use eventix_common::{AppError, AppResult, id::IdGenerator};
use eventix_db::entities::group_registration::{self, RegistrationStatus};
use eventix_db::entities::reservation_hold;
use eventix_db::repositories::{GroupRegistrationRepository, ReservationHoldRepository};
use sea_orm::{ConnectionTrait, DatabaseTransaction, Set, TransactionTrait};
use serde::Deserialize;
use validator::Validate;

use crate::pricing::{GroupPricing, tier_discount};
use crate::services::capacity::CapacityService;

/// Input for starting a group checkout.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRegistrationInput {
    #[validate(length(min = 1, max = 64))]
    pub event_id: String,
    #[validate(length(min = 1, max = 64))]
    pub organizer_id: String,
    /// Number of participants, and the quantity held.
    #[validate(range(min = 1, max = 500))]
    pub quantity: i32,
    /// Per-participant price in minor currency units.
    #[validate(range(min = 0))]
    pub base_price: Option<i64>,
    /// Overrides the configured discount tiers.
    #[validate(range(min = 0, max = 100))]
    pub group_discount_percent: Option<i32>,
}

/// Service for group registrations.
#[derive(Clone)]
pub struct GroupRegistrationService {
    registration_repo: GroupRegistrationRepository,
    capacity_service: CapacityService,
    discount_tiers: Vec<DiscountTier>,
    id_gen: IdGenerator,
}

impl GroupRegistrationService {
    /// Create a new group registration service.
    #[must_use]
    pub fn new(
        registration_repo: GroupRegistrationRepository,
        capacity_service: CapacityService,
        discount_tiers: Vec<DiscountTier>,
    ) -> Self {
        Self {
            registration_repo,
            capacity_service,
            discount_tiers,
            id_gen: IdGenerator::new(),
        }
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.registration_repo
            .db()
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Reserve capacity and open a registration in `BORRADOR`.
    ///
    /// The hold and the registration are written in one transaction, so a
    /// refused reservation leaves nothing behind.
    pub async fn create(
        &self,
        input: CreateGroupRegistrationInput,
    ) -> AppResult<group_registration::Model> {
        input.validate()?;

        let discount_percent = input
            .group_discount_percent
            .unwrap_or_else(|| tier_discount(&self.discount_tiers, input.quantity));
        let pricing =
            GroupPricing::compute(input.base_price.unwrap_or(0), input.quantity, discount_percent)?;

        let now = Utc::now();
        let registration_id = self.id_gen.generate();

        let txn = self.begin().await?;

        let reserved = self
            .capacity_service
            .reserve_in(
                &txn,
                &input.event_id,
                input.quantity,
                &registration_id,
                self.id_gen.generate(),
                now,
            )
            .await?;

        let registration = GroupRegistrationRepository::create(
            &txn,
            group_registration::ActiveModel {
                id: Set(registration_id),
                group_code: Set(self.id_gen.generate_group_code()),
                event_id: Set(input.event_id.clone()),
                organizer_id: Set(input.organizer_id.clone()),
                hold_id: Set(reserved.hold.id.clone()),
                participant_count: Set(pricing.participant_count),
                base_price: Set(pricing.base_price),
                group_discount_percent: Set(pricing.group_discount_percent),
                discount_amount: Set(pricing.discount_amount),
                final_price: Set(pricing.final_price),
                status: Set(RegistrationStatus::Draft),
                reservation_expires_at: Set(reserved.hold.expires_at),
                payment_reference: Set(None),
                paid_at: Set(None),
                confirmed_at: Set(None),
                cancelled_at: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(None),
                deleted_at: Set(None),
            },
        )
        .await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            group_code = %registration.group_code,
            event_id = %registration.event_id,
            participants = registration.participant_count,
            "Group registration created"
        );

        self.capacity_service
            .notify_thresholds(&reserved.capacity, input.quantity)
            .await;

        Ok(registration)
    }

    /// Get a registration by group code.
    pub async fn get(&self, group_code: &str) -> AppResult<group_registration::Model> {
        self.registration_repo.get_by_group_code(group_code).await
    }

    /// List registrations of an event.
    pub async fn list_by_event(
        &self,
        event_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_registration::Model>> {
        self.registration_repo
            .find_by_event(event_id, limit, offset)
            .await
    }

    /// List registrations of an organizer.
    pub async fn list_by_organizer(
        &self,
        organizer_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_registration::Model>> {
        self.registration_repo
            .find_by_organizer(organizer_id, limit, offset)
            .await
    }

    /// `BORRADOR -> PENDIENTE_PAGO`, while the hold is still live.
    pub async fn submit_payment_intent(
        &self,
        group_code: &str,
    ) -> AppResult<group_registration::Model> {
        let db = self.registration_repo.db();
        let registration = self.registration_repo.get_by_group_code(group_code).await?;
        ensure_transition(&registration, RegistrationStatus::PendingPayment)?;

        let now = Utc::now();
        let hold = ReservationHoldRepository::get_by_id_in(db, &registration.hold_id).await?;
        if hold.status.is_terminal() || hold.is_expired_at(now) {
            return Err(AppError::HoldExpired(format!(
                "Reservation {group_code} expired at {}",
                hold.expires_at
            )));
        }

        apply_transition(db, &registration, RegistrationStatus::PendingPayment, None, now).await?;

        tracing::info!(group_code = group_code, "Payment intent submitted");
        Ok(with_status(registration, RegistrationStatus::PendingPayment, now))
    }

    /// Payment captured: mark paid, consume the hold and confirm.
    ///
    /// A registration still in `BORRADOR` is walked through `PENDIENTE_PAGO`
    /// first. All steps share one transaction; if the hold cannot be consumed
    /// nothing is written.
    pub async fn confirm_payment(
        &self,
        group_code: &str,
        payment_reference: Option<&str>,
    ) -> AppResult<group_registration::Model> {
        let now = Utc::now();
        let txn = self.begin().await?;
        let mut registration =
            GroupRegistrationRepository::get_by_group_code_in(&txn, group_code).await?;

        match registration.status {
            RegistrationStatus::Draft | RegistrationStatus::PendingPayment => {
                if registration.status == RegistrationStatus::Draft {
                    apply_transition(
                        &txn,
                        &registration,
                        RegistrationStatus::PendingPayment,
                        None,
                        now,
                    )
                    .await?;
                    registration =
                        with_status(registration, RegistrationStatus::PendingPayment, now);
                }
                apply_transition(
                    &txn,
                    &registration,
                    RegistrationStatus::Paid,
                    payment_reference,
                    now,
                )
                .await?;
                registration = with_status(registration, RegistrationStatus::Paid, now);
                registration.paid_at = Some(now.into());
                if let Some(reference) = payment_reference {
                    registration.payment_reference = Some(reference.to_string());
                }
            }
            RegistrationStatus::Paid => {}
            RegistrationStatus::Expired => {
                return Err(AppError::HoldExpired(format!(
                    "Reservation {group_code} expired at {}",
                    registration.reservation_expires_at
                )));
            }
            status @ (RegistrationStatus::Confirmed
            | RegistrationStatus::Cancelled
            | RegistrationStatus::Refunded) => {
                tracing::warn!(
                    group_code = group_code,
                    status = %status,
                    "Payment confirmation for a settled registration"
                );
                return Err(AppError::InvalidHoldTransition(format!(
                    "Reservation {group_code} is {status}; its hold is no longer active"
                )));
            }
        }

        CapacityService::confirm_in(&txn, &registration.hold_id, now).await?;
        apply_transition(&txn, &registration, RegistrationStatus::Confirmed, None, now).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(group_code = group_code, "Group registration confirmed");

        let mut confirmed = with_status(registration, RegistrationStatus::Confirmed, now);
        confirmed.confirmed_at = Some(now.into());
        Ok(confirmed)
    }

    /// Cancel a registration.
    ///
    /// Before payment the hold is released and the capacity returns to the
    /// pool. A confirmed registration keeps its consumed hold.
    pub async fn cancel(&self, group_code: &str) -> AppResult<group_registration::Model> {
        let now = Utc::now();
        let txn = self.begin().await?;
        let registration =
            GroupRegistrationRepository::get_by_group_code_in(&txn, group_code).await?;
        ensure_transition(&registration, RegistrationStatus::Cancelled)?;

        if registration.status.awaits_payment() {
            CapacityService::release_in(&txn, &registration.hold_id, now).await?;
        }
        apply_transition(&txn, &registration, RegistrationStatus::Cancelled, None, now).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            group_code = group_code,
            from = %registration.status,
            "Group registration cancelled"
        );

        let mut cancelled = with_status(registration, RegistrationStatus::Cancelled, now);
        cancelled.cancelled_at = Some(now.into());
        Ok(cancelled)
    }

    /// `PAGADO | CONFIRMADO -> REEMBOLSADO`. Sold capacity is not returned.
    pub async fn refund(&self, group_code: &str) -> AppResult<group_registration::Model> {
        let now = Utc::now();
        let registration = self.registration_repo.get_by_group_code(group_code).await?;
        ensure_transition(&registration, RegistrationStatus::Refunded)?;

        apply_transition(
            self.registration_repo.db(),
            &registration,
            RegistrationStatus::Refunded,
            None,
            now,
        )
        .await?;

        tracing::info!(group_code = group_code, "Group registration refunded");
        Ok(with_status(registration, RegistrationStatus::Refunded, now))
    }

    /// Soft delete a finished registration.
    pub async fn archive(&self, group_code: &str) -> AppResult<()> {
        let registration = self.registration_repo.get_by_group_code(group_code).await?;
        if !registration.status.is_terminal() {
            return Err(AppError::InvalidStatusTransition(format!(
                "Reservation {group_code} is {} and cannot be archived",
                registration.status
            )));
        }

        if !self
            .registration_repo
            .soft_delete(&registration.id, Utc::now())
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Reservation {group_code} changed concurrently"
            )));
        }

        tracing::info!(group_code = group_code, "Group registration archived");
        Ok(())
    }

    /// Move the registration owning a released hold to `EXPIRADO`.
    ///
    /// Returns the registration when this call expired it; registrations that
    /// already left `BORRADOR`/`PENDIENTE_PAGO` are left alone.
    pub async fn expire_for_hold<C: ConnectionTrait>(
        conn: &C,
        hold: &reservation_hold::Model,
        now: DateTime<Utc>,
    ) -> AppResult<Option<group_registration::Model>> {
        let Some(registration) = GroupRegistrationRepository::find_by_hold_id_in(conn, &hold.id).await?
        else {
            return Ok(None);
        };

        if !registration.status.awaits_payment()
            || !GroupRegistrationRepository::transition(
                conn,
                &registration.id,
                RegistrationStatus::Expired,
                None,
                now,
            )
            .await?
        {
            return Ok(None);
        }

        Ok(Some(with_status(registration, RegistrationStatus::Expired, now)))
    }
}

fn ensure_transition(
    registration: &group_registration::Model,
    target: RegistrationStatus,
) -> AppResult<()> {
    if registration.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(AppError::InvalidStatusTransition(format!(
            "Reservation {} cannot move from {} to {target}",
            registration.group_code, registration.status
        )))
    }
}

/// Conditional status write; losing a race surfaces as an invalid transition.
async fn apply_transition<C: ConnectionTrait>(
    conn: &C,
    registration: &group_registration::Model,
    target: RegistrationStatus,
    payment_reference: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if GroupRegistrationRepository::transition(conn, &registration.id, target, payment_reference, now)
        .await?
    {
        Ok(())
    } else {
        Err(AppError::InvalidStatusTransition(format!(
            "Reservation {} is no longer {}",
            registration.group_code, registration.status
        )))
    }
}

fn with_status(
    registration: group_registration::Model,
    status: RegistrationStatus,
    now: DateTime<Utc>,
) -> group_registration::Model {
    group_registration::Model {
        status,
        updated_at: Some(now.into()),
        ..registration
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::notifier::NoOpNotifier;
    use chrono::Duration;
    use eventix_db::entities::capacity;
    use eventix_db::entities::reservation_hold::{HoldStatus, ReleaseReason};
    use eventix_db::repositories::CapacityRepository;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;
    use std::sync::Arc;

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn create_test_capacity() -> capacity::Model {
        capacity::Model {
            id: "cap1".to_string(),
            event_id: "evt1".to_string(),
            total_capacity: 100,
            available_capacity: 90,
            blocked_capacity: 10,
            confirmed_capacity: 0,
            overbooking_percentage: 0,
            overbooking_enabled: false,
            waitlist_enabled: false,
            lock_timeout_minutes: 15,
            alert_thresholds: json!({}),
            created_at: Utc::now().into(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn create_test_hold(
        status: HoldStatus,
        reason: Option<ReleaseReason>,
        expires_in_minutes: i64,
    ) -> reservation_hold::Model {
        let now = Utc::now();
        reservation_hold::Model {
            id: "hold1".to_string(),
            event_id: "evt1".to_string(),
            group_registration_id: "reg1".to_string(),
            quantity: 10,
            status,
            release_reason: reason,
            expires_at: (now + Duration::minutes(expires_in_minutes)).into(),
            created_at: now.into(),
            released_at: None,
            consumed_at: None,
        }
    }

    fn create_test_registration(status: RegistrationStatus) -> group_registration::Model {
        let now = Utc::now();
        group_registration::Model {
            id: "reg1".to_string(),
            group_code: "GRP-ABCDEFGHJK".to_string(),
            event_id: "evt1".to_string(),
            organizer_id: "org1".to_string(),
            hold_id: "hold1".to_string(),
            participant_count: 10,
            base_price: 5000,
            group_discount_percent: 10,
            discount_amount: 5000,
            final_price: 45000,
            status,
            reservation_expires_at: (now + Duration::minutes(15)).into(),
            payment_reference: None,
            paid_at: None,
            confirmed_at: None,
            cancelled_at: None,
            created_at: now.into(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn default_tiers() -> Vec<DiscountTier> {
        vec![
            DiscountTier {
                min_participants: 5,
                percent: 5,
            },
            DiscountTier {
                min_participants: 10,
                percent: 10,
            },
        ]
    }

    fn service(db: MockDatabase) -> GroupRegistrationService {
        let db = Arc::new(db.into_connection());
        let capacity_service =
            CapacityService::new(CapacityRepository::new(db.clone()), Arc::new(NoOpNotifier), 15);
        GroupRegistrationService::new(
            GroupRegistrationRepository::new(db),
            capacity_service,
            default_tiers(),
        )
    }

    fn create_input(quantity: i32) -> CreateGroupRegistrationInput {
        CreateGroupRegistrationInput {
            event_id: "evt1".to_string(),
            organizer_id: "org1".to_string(),
            quantity,
            base_price: Some(5000),
            group_discount_percent: None,
        }
    }

    #[tokio::test]
    async fn test_create_reserves_and_opens_draft() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(1)])
            .append_query_results([[create_test_capacity()]])
            .append_query_results([[create_test_hold(HoldStatus::Active, None, 15)]])
            .append_query_results([[create_test_registration(RegistrationStatus::Draft)]]);

        let registration = service(db).create(create_input(10)).await.unwrap();

        assert_eq!(registration.status, RegistrationStatus::Draft);
        assert_eq!(registration.hold_id, "hold1");
    }

    #[tokio::test]
    async fn test_create_refused_when_sold_out() {
        let mut full = create_test_capacity();
        full.blocked_capacity = 100;
        full.available_capacity = 0;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([exec(0)])
            .append_query_results([[full]]);

        let result = service(db).create(create_input(10)).await;
        assert!(matches!(result, Err(AppError::CapacityExceeded(_))));
    }

    #[tokio::test]
    async fn test_create_validates_quantity() {
        let result = service(MockDatabase::new(DatabaseBackend::Postgres))
            .create(create_input(0))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_submit_with_expired_hold() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Draft)]])
            .append_query_results([[create_test_hold(HoldStatus::Active, None, -1)]]);

        let result = service(db).submit_payment_intent("GRP-ABCDEFGHJK").await;
        assert!(matches!(result, Err(AppError::HoldExpired(_))));
    }

    #[tokio::test]
    async fn test_submit_moves_to_pending_payment() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Draft)]])
            .append_query_results([[create_test_hold(HoldStatus::Active, None, 10)]])
            .append_exec_results([exec(1)]);

        let registration = service(db)
            .submit_payment_intent("GRP-ABCDEFGHJK")
            .await
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_confirm_payment_from_pending() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                RegistrationStatus::PendingPayment,
            )]])
            .append_query_results([[create_test_hold(HoldStatus::Active, None, 10)]])
            // paid, consumed, confirmed counter, confirmed status
            .append_exec_results([exec(1), exec(1), exec(1), exec(1)]);

        let registration = service(db)
            .confirm_payment("GRP-ABCDEFGHJK", Some("pay_123"))
            .await
            .unwrap();

        assert_eq!(registration.status, RegistrationStatus::Confirmed);
        assert_eq!(registration.payment_reference.as_deref(), Some("pay_123"));
        assert!(registration.paid_at.is_some());
        assert!(registration.confirmed_at.is_some());
    }

    #[tokio::test]
    async fn test_confirm_payment_after_expiry() {
        let expired = create_test_hold(HoldStatus::Active, None, -1);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Paid)]])
            .append_query_results([[expired.clone()], [expired]])
            .append_exec_results([exec(0)]);

        let result = service(db)
            .confirm_payment("GRP-ABCDEFGHJK", None)
            .await;
        assert!(matches!(result, Err(AppError::HoldExpired(_))));
    }

    #[tokio::test]
    async fn test_confirm_payment_of_expired_registration() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Expired)]]);

        let result = service(db)
            .confirm_payment("GRP-ABCDEFGHJK", None)
            .await;
        assert!(matches!(result, Err(AppError::HoldExpired(_))));
    }

    #[tokio::test]
    async fn test_confirm_payment_twice_is_invalid_hold_transition() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Confirmed)]]);

        let result = service(db)
            .confirm_payment("GRP-ABCDEFGHJK", None)
            .await;
        assert!(matches!(result, Err(AppError::InvalidHoldTransition(_))));
    }

    #[tokio::test]
    async fn test_cancel_draft_releases_hold() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Draft)]])
            .append_query_results([[create_test_hold(HoldStatus::Active, None, 10)]])
            // released, capacity restored, cancelled
            .append_exec_results([exec(1), exec(1), exec(1)]);

        let registration = service(db).cancel("GRP-ABCDEFGHJK").await.unwrap();

        assert_eq!(registration.status, RegistrationStatus::Cancelled);
        assert!(registration.cancelled_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_confirmed_keeps_hold() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Confirmed)]])
            .append_exec_results([exec(1)]);

        let registration = service(db).cancel("GRP-ABCDEFGHJK").await.unwrap();
        assert_eq!(registration.status, RegistrationStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_paid_is_invalid() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Paid)]]);

        let result = service(db).cancel("GRP-ABCDEFGHJK").await;
        assert!(matches!(result, Err(AppError::InvalidStatusTransition(_))));
    }

    #[tokio::test]
    async fn test_refund_requires_payment() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Draft)]]);

        let result = service(db).refund("GRP-ABCDEFGHJK").await;
        assert!(matches!(result, Err(AppError::InvalidStatusTransition(_))));
    }

    #[tokio::test]
    async fn test_archive_requires_terminal_status() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
            create_test_registration(RegistrationStatus::PendingPayment),
        ]]);

        let result = service(db).archive("GRP-ABCDEFGHJK").await;
        assert!(matches!(result, Err(AppError::InvalidStatusTransition(_))));
    }

    #[tokio::test]
    async fn test_expire_for_hold_skips_paid_registration() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(RegistrationStatus::Paid)]])
            .into_connection();
        let hold = create_test_hold(HoldStatus::Released, Some(ReleaseReason::Expired), -1);

        let expired = GroupRegistrationService::expire_for_hold(&db, &hold, Utc::now())
            .await
            .unwrap();
        assert!(expired.is_none());
    }
}
