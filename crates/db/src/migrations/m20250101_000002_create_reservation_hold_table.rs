//! Create `reservation_hold` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReservationHold::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReservationHold::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReservationHold::EventId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReservationHold::GroupRegistrationId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReservationHold::Quantity)
                            .integer()
                            .not_null()
                            .check(Expr::col(ReservationHold::Quantity).gt(0)),
                    )
                    .col(
                        ColumnDef::new(ReservationHold::Status)
                            .string_len(16)
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(ReservationHold::ReleaseReason).string_len(16))
                    .col(
                        ColumnDef::new(ReservationHold::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ReservationHold::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(ReservationHold::ReleasedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(ReservationHold::ConsumedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_reservation_hold_event")
                            .from(ReservationHold::Table, ReservationHold::EventId)
                            .to(Capacity::Table, Capacity::EventId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_hold_event_id")
                    .table(ReservationHold::Table)
                    .col(ReservationHold::EventId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_hold_group_registration_id")
                    .table(ReservationHold::Table)
                    .col(ReservationHold::GroupRegistrationId)
                    .to_owned(),
            )
            .await?;

        // The sweep scans active holds by expiry.
        manager
            .create_index(
                Index::create()
                    .name("idx_reservation_hold_status_expires_at")
                    .table(ReservationHold::Table)
                    .col(ReservationHold::Status)
                    .col(ReservationHold::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReservationHold::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ReservationHold {
    Table,
    Id,
    EventId,
    GroupRegistrationId,
    Quantity,
    Status,
    ReleaseReason,
    ExpiresAt,
    CreatedAt,
    ReleasedAt,
    ConsumedAt,
}

#[derive(Iden)]
enum Capacity {
    Table,
    EventId,
}
