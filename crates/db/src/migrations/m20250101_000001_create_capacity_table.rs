//! Create `capacity` table.

use sea_orm_migration::prelude::*;

use crate::entities::capacity::CEILING_SQL;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Capacity::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Capacity::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Capacity::EventId)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(Capacity::TotalCapacity)
                            .integer()
                            .not_null()
                            .check(Expr::col(Capacity::TotalCapacity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Capacity::AvailableCapacity)
                            .integer()
                            .not_null()
                            .check(Expr::col(Capacity::AvailableCapacity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Capacity::BlockedCapacity)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Capacity::BlockedCapacity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Capacity::ConfirmedCapacity)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Capacity::ConfirmedCapacity).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Capacity::OverbookingPercentage)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Capacity::OverbookingPercentage).between(0, 50)),
                    )
                    .col(
                        ColumnDef::new(Capacity::OverbookingEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Capacity::WaitlistEnabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Capacity::LockTimeoutMinutes)
                            .integer()
                            .not_null()
                            .default(15)
                            .check(Expr::col(Capacity::LockTimeoutMinutes).between(5, 60)),
                    )
                    .col(
                        ColumnDef::new(Capacity::AlertThresholds)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Capacity::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Capacity::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Capacity::DeletedAt).timestamp_with_time_zone())
                    .check(Expr::cust(format!("blocked_capacity <= {CEILING_SQL}")))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_capacity_deleted_at")
                    .table(Capacity::Table)
                    .col(Capacity::DeletedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Capacity::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Capacity {
    Table,
    Id,
    EventId,
    TotalCapacity,
    AvailableCapacity,
    BlockedCapacity,
    ConfirmedCapacity,
    OverbookingPercentage,
    OverbookingEnabled,
    WaitlistEnabled,
    LockTimeoutMinutes,
    AlertThresholds,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}
