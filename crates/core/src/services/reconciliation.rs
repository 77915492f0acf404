//! Capacity reconciliation.
//!
//! The sweep is the only writer that changes a hold without a user asking
//! for it, so every release and every expired registration is logged at
//! `info`.

use chrono::{DateTime, Utc};
use eventix_common::{AppError, AppResult};
use eventix_db::entities::reservation_hold::{self, HoldStatus, ReleaseReason};
use eventix_db::repositories::{CapacityRepository, ReservationHoldRepository};
use sea_orm::TransactionTrait;
use serde::Serialize;

use crate::services::group_registration::GroupRegistrationService;
use crate::services::notifier::{CapacityEvent, CapacityNotifierService, notify_quietly};

/// What happened to one expired hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Released and capacity restored.
    Released { registration_expired: bool },
    /// A concurrent confirm consumed the hold first.
    ReconciliationConflict,
    /// Already released by someone else.
    Skipped,
}

/// Totals of one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub scanned: u64,
    pub released: u64,
    pub expired_registrations: u64,
    pub conflicts: u64,
    pub skipped: u64,
    /// Holds whose transaction failed; they are retried on the next run.
    pub failed: u64,
}

impl SweepReport {
    fn record(&mut self, outcome: SweepOutcome) {
        match outcome {
            SweepOutcome::Released {
                registration_expired,
            } => {
                self.released += 1;
                if registration_expired {
                    self.expired_registrations += 1;
                }
            }
            SweepOutcome::ReconciliationConflict => self.conflicts += 1,
            SweepOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Service releasing holds whose payment window has passed.
#[derive(Clone)]
pub struct ReconciliationService {
    hold_repo: ReservationHoldRepository,
    notifier: CapacityNotifierService,
    batch_size: u64,
}

impl ReconciliationService {
    /// Create a new reconciliation service.
    #[must_use]
    pub const fn new(
        hold_repo: ReservationHoldRepository,
        notifier: CapacityNotifierService,
        batch_size: u64,
    ) -> Self {
        Self {
            hold_repo,
            notifier,
            batch_size,
        }
    }

    /// Release up to one batch of holds that expired before `now`.
    ///
    /// Each hold is handled in its own transaction, so one failure does not
    /// undo the rest of the batch.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let expired = self
            .hold_repo
            .find_expired_active(now, self.batch_size)
            .await?;

        let mut report = SweepReport {
            scanned: expired.len() as u64,
            ..SweepReport::default()
        };

        for hold in &expired {
            match self.expire_hold(hold, now).await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(hold_id = %hold.id, error = %e, "Failed to expire hold");
                }
            }
        }

        Ok(report)
    }

    /// Release one expired hold, restore its capacity and expire its registration.
    pub async fn expire_hold(
        &self,
        hold: &reservation_hold::Model,
        now: DateTime<Utc>,
    ) -> AppResult<SweepOutcome> {
        let txn = self
            .hold_repo
            .db()
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !ReservationHoldRepository::mark_released(&txn, &hold.id, ReleaseReason::Expired, now)
            .await?
        {
            let current = ReservationHoldRepository::get_by_id_in(&txn, &hold.id).await?;
            return Ok(if current.status == HoldStatus::Consumed {
                tracing::debug!(
                    hold_id = %hold.id,
                    event_id = %hold.event_id,
                    "Reconciliation conflict: hold already consumed"
                );
                SweepOutcome::ReconciliationConflict
            } else {
                SweepOutcome::Skipped
            });
        }

        CapacityRepository::restore(&txn, &hold.event_id, hold.quantity, now).await?;
        let registration = GroupRegistrationService::expire_for_hold(&txn, hold, now).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(
            hold_id = %hold.id,
            event_id = %hold.event_id,
            quantity = hold.quantity,
            expired_at = %hold.expires_at,
            "Expired hold released"
        );
        if let Some(registration) = &registration {
            tracing::info!(
                group_code = %registration.group_code,
                hold_id = %hold.id,
                "Group registration expired"
            );
        }

        notify_quietly(
            &self.notifier,
            CapacityEvent::HoldExpired {
                event_id: hold.event_id.clone(),
                hold_id: hold.id.clone(),
                group_registration_id: hold.group_registration_id.clone(),
                quantity: hold.quantity,
            },
        )
        .await;

        Ok(SweepOutcome::Released {
            registration_expired: registration.is_some(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::notifier::testing::RecordingNotifier;
    use chrono::Duration;
    use eventix_db::entities::group_registration::{self, RegistrationStatus};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn create_test_hold(status: HoldStatus) -> reservation_hold::Model {
        let now = Utc::now();
        reservation_hold::Model {
            id: "hold1".to_string(),
            event_id: "evt1".to_string(),
            group_registration_id: "reg1".to_string(),
            quantity: 4,
            status,
            release_reason: None,
            expires_at: (now - Duration::minutes(1)).into(),
            created_at: (now - Duration::minutes(16)).into(),
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
            participant_count: 4,
            base_price: 1000,
            group_discount_percent: 0,
            discount_amount: 0,
            final_price: 4000,
            status,
            reservation_expires_at: (now - Duration::minutes(1)).into(),
            payment_reference: None,
            paid_at: None,
            confirmed_at: None,
            cancelled_at: None,
            created_at: now.into(),
            updated_at: None,
            deleted_at: None,
        }
    }

    fn service(db: MockDatabase, notifier: CapacityNotifierService) -> ReconciliationService {
        let db = Arc::new(db.into_connection());
        ReconciliationService::new(ReservationHoldRepository::new(db), notifier, 100)
    }

    #[tokio::test]
    async fn test_sweep_releases_and_expires_pending_registration() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_hold(HoldStatus::Active)]])
            .append_query_results([[create_test_registration(
                RegistrationStatus::PendingPayment,
            )]])
            // hold released, capacity restored, registration expired
            .append_exec_results([exec(1), exec(1), exec(1)]);
        let recorder = Arc::new(RecordingNotifier::default());

        let report = service(db, recorder.clone()).sweep(Utc::now()).await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                scanned: 1,
                released: 1,
                expired_registrations: 1,
                ..SweepReport::default()
            }
        );
        assert!(matches!(
            recorder.events().as_slice(),
            [CapacityEvent::HoldExpired { quantity: 4, .. }]
        ));
    }

    #[tokio::test]
    async fn test_sweep_counts_consumed_hold_as_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [create_test_hold(HoldStatus::Active)],
                [create_test_hold(HoldStatus::Consumed)],
            ])
            .append_exec_results([exec(0)]);
        let recorder = Arc::new(RecordingNotifier::default());

        let report = service(db, recorder.clone()).sweep(Utc::now()).await.unwrap();

        assert_eq!(report.conflicts, 1);
        assert_eq!(report.released, 0);
        assert!(recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_sweep_skips_hold_released_concurrently() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                [create_test_hold(HoldStatus::Active)],
                [create_test_hold(HoldStatus::Released)],
            ])
            .append_exec_results([exec(0)]);

        let report = service(db, Arc::new(RecordingNotifier::default()))
            .sweep(Utc::now())
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.conflicts, 0);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_expired() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<reservation_hold::Model>::new()]);

        let report = service(db, Arc::new(RecordingNotifier::default()))
            .sweep(Utc::now())
            .await
            .unwrap();

        assert_eq!(report, SweepReport::default());
    }
}
