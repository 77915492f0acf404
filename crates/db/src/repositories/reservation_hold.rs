//! Reservation hold repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use eventix_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::entities::reservation_hold::{HoldStatus, ReleaseReason};
use crate::entities::{ReservationHold, reservation_hold};

/// Repository for reservation hold operations.
#[derive(Clone)]
pub struct ReservationHoldRepository {
    db: Arc<DatabaseConnection>,
}

impl ReservationHoldRepository {
    /// Create a new reservation hold repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find a hold by ID on the given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<Option<reservation_hold::Model>> {
        ReservationHold::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a hold by ID on the given connection, returning an error if not found.
    pub async fn get_by_id_in<C: ConnectionTrait>(
        conn: &C,
        id: &str,
    ) -> AppResult<reservation_hold::Model> {
        Self::find_by_id_in(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation hold not found: {id}")))
    }

    /// Insert a hold.
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        model: reservation_hold::ActiveModel,
    ) -> AppResult<reservation_hold::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move a hold to `released` from any status the transition table allows.
    ///
    /// With [`ReleaseReason::Expired`] the update only applies to holds whose
    /// `expires_at` is before `now`. Returns whether this call performed the
    /// transition.
    pub async fn mark_released<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        reason: ReleaseReason,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut query = ReservationHold::update_many()
            .col_expr(
                reservation_hold::Column::Status,
                Expr::value(HoldStatus::Released),
            )
            .col_expr(
                reservation_hold::Column::ReleaseReason,
                Expr::value(Some(reason)),
            )
            .col_expr(reservation_hold::Column::ReleasedAt, Expr::value(now))
            .filter(reservation_hold::Column::Id.eq(id))
            .filter(reservation_hold::Column::Status.is_in(HoldStatus::sources_of(
                HoldStatus::Released,
            )));

        if reason == ReleaseReason::Expired {
            query = query.filter(reservation_hold::Column::ExpiresAt.lt(now));
        }

        let result = query
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Move an unexpired hold to `consumed` from any status the transition
    /// table allows.
    ///
    /// Returns whether this call performed the transition.
    pub async fn mark_consumed<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = ReservationHold::update_many()
            .col_expr(
                reservation_hold::Column::Status,
                Expr::value(HoldStatus::Consumed),
            )
            .col_expr(reservation_hold::Column::ConsumedAt, Expr::value(now))
            .filter(reservation_hold::Column::Id.eq(id))
            .filter(reservation_hold::Column::Status.is_in(HoldStatus::sources_of(
                HoldStatus::Consumed,
            )))
            .filter(reservation_hold::Column::ExpiresAt.gt(now))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Active holds whose expiry is before `now`, oldest expiry first.
    pub async fn find_expired_active(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<reservation_hold::Model>> {
        ReservationHold::find()
            .filter(reservation_hold::Column::Status.eq(HoldStatus::Active))
            .filter(reservation_hold::Column::ExpiresAt.lt(now))
            .order_by_asc(reservation_hold::Column::ExpiresAt)
            .order_by_asc(reservation_hold::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
