//! Group registration repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use eventix_common::{AppError, AppResult};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::entities::group_registration::RegistrationStatus;
use crate::entities::{GroupRegistration, group_registration};

/// Repository for group registration operations.
#[derive(Clone)]
pub struct GroupRegistrationRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupRegistrationRepository {
    /// Create a new group registration repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find a live registration by its group code on the given connection.
    pub async fn find_by_group_code_in<C: ConnectionTrait>(
        conn: &C,
        group_code: &str,
    ) -> AppResult<Option<group_registration::Model>> {
        GroupRegistration::find()
            .filter(group_registration::Column::GroupCode.eq(group_code))
            .filter(group_registration::Column::DeletedAt.is_null())
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a live registration by group code, returning an error if not found.
    pub async fn get_by_group_code(&self, group_code: &str) -> AppResult<group_registration::Model> {
        Self::get_by_group_code_in(self.db.as_ref(), group_code).await
    }

    /// Get a live registration by group code on the given connection.
    pub async fn get_by_group_code_in<C: ConnectionTrait>(
        conn: &C,
        group_code: &str,
    ) -> AppResult<group_registration::Model> {
        Self::find_by_group_code_in(conn, group_code)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group registration not found: {group_code}")))
    }

    /// Find the registration linked to a hold.
    pub async fn find_by_hold_id_in<C: ConnectionTrait>(
        conn: &C,
        hold_id: &str,
    ) -> AppResult<Option<group_registration::Model>> {
        GroupRegistration::find()
            .filter(group_registration::Column::HoldId.eq(hold_id))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a registration.
    pub async fn create<C: ConnectionTrait>(
        conn: &C,
        model: group_registration::ActiveModel,
    ) -> AppResult<group_registration::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Registrations of an event, newest first.
    pub async fn find_by_event(
        &self,
        event_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_registration::Model>> {
        GroupRegistration::find()
            .filter(group_registration::Column::EventId.eq(event_id))
            .filter(group_registration::Column::DeletedAt.is_null())
            .order_by_desc(group_registration::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Registrations of an organizer, newest first.
    pub async fn find_by_organizer(
        &self,
        organizer_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<group_registration::Model>> {
        GroupRegistration::find()
            .filter(group_registration::Column::OrganizerId.eq(organizer_id))
            .filter(group_registration::Column::DeletedAt.is_null())
            .order_by_desc(group_registration::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Move a registration to `target` if its current status allows it.
    ///
    /// The source statuses come from the transition table, so a concurrent
    /// writer that moved the row first makes this a no-op. Stamps the
    /// timestamp column that belongs to `target`, and stores
    /// `payment_reference` when given. Returns whether the row was updated.
    pub async fn transition<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        target: RegistrationStatus,
        payment_reference: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let sources = RegistrationStatus::sources_of(target);
        if sources.is_empty() {
            return Ok(false);
        }

        let mut query = GroupRegistration::update_many()
            .col_expr(group_registration::Column::Status, Expr::value(target))
            .col_expr(group_registration::Column::UpdatedAt, Expr::value(now));

        match target {
            RegistrationStatus::Paid => {
                query = query.col_expr(group_registration::Column::PaidAt, Expr::value(now));
            }
            RegistrationStatus::Confirmed => {
                query = query.col_expr(group_registration::Column::ConfirmedAt, Expr::value(now));
            }
            RegistrationStatus::Cancelled => {
                query = query.col_expr(group_registration::Column::CancelledAt, Expr::value(now));
            }
            _ => {}
        }

        if let Some(reference) = payment_reference {
            query = query.col_expr(
                group_registration::Column::PaymentReference,
                Expr::value(reference),
            );
        }

        let result = query
            .filter(group_registration::Column::Id.eq(id))
            .filter(group_registration::Column::DeletedAt.is_null())
            .filter(group_registration::Column::Status.is_in(sources))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Soft delete a registration in a terminal status.
    ///
    /// Returns whether the row was marked deleted.
    pub async fn soft_delete(&self, id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let result = GroupRegistration::update_many()
            .col_expr(group_registration::Column::DeletedAt, Expr::value(now))
            .col_expr(group_registration::Column::UpdatedAt, Expr::value(now))
            .filter(group_registration::Column::Id.eq(id))
            .filter(group_registration::Column::DeletedAt.is_null())
            .filter(group_registration::Column::Status.is_in([
                RegistrationStatus::Cancelled,
                RegistrationStatus::Expired,
                RegistrationStatus::Refunded,
            ]))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}
