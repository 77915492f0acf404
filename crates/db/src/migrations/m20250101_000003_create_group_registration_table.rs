//! Create `group_registration` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GroupRegistration::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GroupRegistration::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::GroupCode)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::EventId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::OrganizerId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::HoldId)
                            .string_len(32)
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::ParticipantCount)
                            .integer()
                            .not_null()
                            .check(Expr::col(GroupRegistration::ParticipantCount).gt(0)),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::BasePrice)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::GroupDiscountPercent)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(GroupRegistration::GroupDiscountPercent).between(0, 100)),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::DiscountAmount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::FinalPrice)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::Status)
                            .string_len(20)
                            .not_null()
                            .default("BORRADOR"),
                    )
                    .col(
                        ColumnDef::new(GroupRegistration::ReservationExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GroupRegistration::PaymentReference).string_len(128))
                    .col(ColumnDef::new(GroupRegistration::PaidAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(GroupRegistration::ConfirmedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(GroupRegistration::CancelledAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(GroupRegistration::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(GroupRegistration::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(GroupRegistration::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_group_registration_hold")
                            .from(GroupRegistration::Table, GroupRegistration::HoldId)
                            .to(ReservationHold::Table, ReservationHold::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_registration_event_id")
                    .table(GroupRegistration::Table)
                    .col(GroupRegistration::EventId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_registration_organizer_id")
                    .table(GroupRegistration::Table)
                    .col(GroupRegistration::OrganizerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_group_registration_status")
                    .table(GroupRegistration::Table)
                    .col(GroupRegistration::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GroupRegistration::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GroupRegistration {
    Table,
    Id,
    GroupCode,
    EventId,
    OrganizerId,
    HoldId,
    ParticipantCount,
    BasePrice,
    GroupDiscountPercent,
    DiscountAmount,
    FinalPrice,
    Status,
    ReservationExpiresAt,
    PaymentReference,
    PaidAt,
    ConfirmedAt,
    CancelledAt,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(Iden)]
enum ReservationHold {
    Table,
    Id,
}
