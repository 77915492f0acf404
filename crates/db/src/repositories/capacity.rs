//! Capacity repository.
//!
//! Every counter mutation is a single conditional `UPDATE`; the row lock taken
//! by that statement is what serializes concurrent reservations for one event.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use eventix_common::{AppError, AppResult};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
};

use crate::entities::capacity::{CEILING_SQL, ceiling};
use crate::entities::{Capacity, capacity};

/// New configuration values for a capacity row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacitySettings {
    pub total_capacity: i32,
    pub overbooking_percentage: i32,
    pub overbooking_enabled: bool,
    pub waitlist_enabled: bool,
    pub lock_timeout_minutes: i32,
    pub alert_thresholds: serde_json::Value,
}

/// Repository for capacity operations.
#[derive(Clone)]
pub struct CapacityRepository {
    db: Arc<DatabaseConnection>,
}

impl CapacityRepository {
    /// Create a new capacity repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find the capacity row of an event, soft-deleted rows included.
    pub async fn find_by_event_id(&self, event_id: &str) -> AppResult<Option<capacity::Model>> {
        Self::find_by_event_id_in(self.db.as_ref(), event_id).await
    }

    /// Find the capacity row of an event on the given connection.
    pub async fn find_by_event_id_in<C: ConnectionTrait>(
        conn: &C,
        event_id: &str,
    ) -> AppResult<Option<capacity::Model>> {
        Capacity::find()
            .filter(capacity::Column::EventId.eq(event_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the live (not deleted) capacity row of an event.
    pub async fn get_live_by_event_id(&self, event_id: &str) -> AppResult<capacity::Model> {
        Self::get_live_by_event_id_in(self.db.as_ref(), event_id).await
    }

    /// Get the live capacity row of an event on the given connection.
    pub async fn get_live_by_event_id_in<C: ConnectionTrait>(
        conn: &C,
        event_id: &str,
    ) -> AppResult<capacity::Model> {
        Self::find_by_event_id_in(conn, event_id)
            .await?
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| AppError::NotFound(format!("Capacity not found for event: {event_id}")))
    }

    /// Insert a capacity row unless the event already has one.
    ///
    /// Returns `false` when another row for the event won the unique index.
    pub async fn insert_if_absent(&self, model: capacity::ActiveModel) -> AppResult<bool> {
        let inserted = Capacity::insert(model)
            .on_conflict(
                OnConflict::column(capacity::Column::EventId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    /// Apply new settings, restoring a soft-deleted row.
    ///
    /// Applied only while the current `blocked_capacity` fits under the new
    /// ceiling. Returns whether the row was updated.
    pub async fn update_settings(
        &self,
        event_id: &str,
        settings: &CapacitySettings,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let total = settings.total_capacity;
        let result = Capacity::update_many()
            .col_expr(capacity::Column::TotalCapacity, Expr::value(total))
            .col_expr(
                capacity::Column::AvailableCapacity,
                Expr::cust(format!("GREATEST({total} - blocked_capacity, 0)")),
            )
            .col_expr(
                capacity::Column::OverbookingPercentage,
                Expr::value(settings.overbooking_percentage),
            )
            .col_expr(
                capacity::Column::OverbookingEnabled,
                Expr::value(settings.overbooking_enabled),
            )
            .col_expr(
                capacity::Column::WaitlistEnabled,
                Expr::value(settings.waitlist_enabled),
            )
            .col_expr(
                capacity::Column::LockTimeoutMinutes,
                Expr::value(settings.lock_timeout_minutes),
            )
            .col_expr(
                capacity::Column::AlertThresholds,
                Expr::value(settings.alert_thresholds.clone()),
            )
            .col_expr(capacity::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                capacity::Column::DeletedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(capacity::Column::EventId.eq(event_id))
            .filter(capacity::Column::BlockedCapacity.lte(ceiling(
                settings.total_capacity,
                settings.overbooking_percentage,
                settings.overbooking_enabled,
            )))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Atomically take `quantity` units out of the sellable pool.
    ///
    /// Returns `false` when the row is missing, deleted, or the reservation
    /// would push `blocked_capacity` past the ceiling.
    pub async fn try_reserve<C: ConnectionTrait>(
        conn: &C,
        event_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = Capacity::update_many()
            .col_expr(
                capacity::Column::BlockedCapacity,
                Expr::col(capacity::Column::BlockedCapacity).add(quantity),
            )
            .col_expr(
                capacity::Column::AvailableCapacity,
                Expr::cust(format!(
                    "GREATEST(total_capacity - blocked_capacity - {quantity}, 0)"
                )),
            )
            .col_expr(capacity::Column::UpdatedAt, Expr::value(now))
            .filter(capacity::Column::EventId.eq(event_id))
            .filter(capacity::Column::DeletedAt.is_null())
            .filter(Expr::cust(format!(
                "blocked_capacity + {quantity} <= {CEILING_SQL}"
            )))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Hand `quantity` units of a released hold back to the sellable pool.
    pub async fn restore<C: ConnectionTrait>(
        conn: &C,
        event_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        Capacity::update_many()
            .col_expr(
                capacity::Column::BlockedCapacity,
                Expr::cust(format!("GREATEST(blocked_capacity - {quantity}, 0)")),
            )
            .col_expr(
                capacity::Column::AvailableCapacity,
                Expr::cust(format!(
                    "GREATEST(total_capacity - GREATEST(blocked_capacity - {quantity}, 0), 0)"
                )),
            )
            .col_expr(capacity::Column::UpdatedAt, Expr::value(now))
            .filter(capacity::Column::EventId.eq(event_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Record a consumed hold. Available and blocked counters are untouched.
    pub async fn record_confirmed<C: ConnectionTrait>(
        conn: &C,
        event_id: &str,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        Capacity::update_many()
            .col_expr(
                capacity::Column::ConfirmedCapacity,
                Expr::col(capacity::Column::ConfirmedCapacity).add(quantity),
            )
            .col_expr(capacity::Column::UpdatedAt, Expr::value(now))
            .filter(capacity::Column::EventId.eq(event_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Soft delete the capacity of an event.
    ///
    /// Refused while the event still has active holds. Returns whether the
    /// row was marked deleted.
    pub async fn soft_delete(&self, event_id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let result = Capacity::update_many()
            .col_expr(capacity::Column::DeletedAt, Expr::value(now))
            .col_expr(capacity::Column::UpdatedAt, Expr::value(now))
            .filter(capacity::Column::EventId.eq(event_id))
            .filter(capacity::Column::DeletedAt.is_null())
            .filter(Expr::cust(
                "NOT EXISTS (SELECT 1 FROM reservation_hold h \
                 WHERE h.event_id = capacity.event_id AND h.status = 'active')",
            ))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn create_test_capacity(event_id: &str, total: i32, blocked: i32) -> capacity::Model {
        capacity::Model {
            id: "cap1".to_string(),
            event_id: event_id.to_string(),
            total_capacity: total,
            available_capacity: (total - blocked).max(0),
            blocked_capacity: blocked,
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

    #[tokio::test]
    async fn test_get_live_skips_deleted() {
        let mut deleted = create_test_capacity("evt1", 100, 0);
        deleted.deleted_at = Some(Utc::now().into());

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[deleted]])
                .into_connection(),
        );

        let repo = CapacityRepository::new(db);
        let result = repo.get_live_by_event_id("evt1").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_insert_if_absent_reports_losing_insert() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );
        let repo = CapacityRepository::new(db);
        let model: capacity::ActiveModel = create_test_capacity("evt1", 100, 0).into();

        assert!(repo.insert_if_absent(model.clone()).await.unwrap());
        assert!(!repo.insert_if_absent(model).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_reserve_reports_applied_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let now = Utc::now();
        assert!(CapacityRepository::try_reserve(&db, "evt1", 3, now).await.unwrap());
        assert!(!CapacityRepository::try_reserve(&db, "evt1", 3, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_try_reserve_is_a_single_conditional_update() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        CapacityRepository::try_reserve(&db, "evt1", 4, Utc::now())
            .await
            .unwrap();

        let log = db.into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = format!("{:?}", log[0]);
        assert!(sql.contains("blocked_capacity + 4 <= (CASE WHEN overbooking_enabled"));
    }

    #[tokio::test]
    async fn test_soft_delete_refused_when_nothing_updated() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = CapacityRepository::new(db);
        assert!(!repo.soft_delete("evt1", Utc::now()).await.unwrap());
    }
}
