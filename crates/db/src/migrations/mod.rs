//! Database migrations.
//!
//! Schema migrations for the database.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_capacity_table;
mod m20250101_000002_create_reservation_hold_table;
mod m20250101_000003_create_group_registration_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_capacity_table::Migration),
            Box::new(m20250101_000002_create_reservation_hold_table::Migration),
            Box::new(m20250101_000003_create_group_registration_table::Migration),
        ]
    }
}
