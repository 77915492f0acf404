//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `eventix_test`)
//!   `TEST_DB_PASSWORD` (default: `eventix_test`)
//!   `TEST_DB_NAME` (default: `eventix_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use eventix_db::entities::capacity;
use eventix_db::entities::reservation_hold::{self, HoldStatus, ReleaseReason};
use eventix_db::repositories::{CapacityRepository, ReservationHoldRepository};
use eventix_db::test_utils::{TestDatabase, TestDbConfig, TestRedisConfig};
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde_json::json;

async fn seed_capacity(db: &TestDatabase, event_id: &str, total: i32, overbooking_pct: i32) {
    capacity::ActiveModel {
        id: Set(format!("cap-{event_id}")),
        event_id: Set(event_id.to_string()),
        total_capacity: Set(total),
        available_capacity: Set(total),
        blocked_capacity: Set(0),
        confirmed_capacity: Set(0),
        overbooking_percentage: Set(overbooking_pct),
        overbooking_enabled: Set(overbooking_pct > 0),
        waitlist_enabled: Set(false),
        lock_timeout_minutes: Set(15),
        alert_thresholds: Set(json!({ "warning": 80 })),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
        deleted_at: Set(None),
    }
    .insert(db.connection())
    .await
    .expect("Failed to seed capacity");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_reserves_never_exceed_ceiling() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    seed_capacity(&db, "evt-race", 100, 10).await;

    let conn = Arc::new(db.conn.clone());
    let mut handles = Vec::new();
    for _ in 0..40 {
        let conn = conn.clone();
        handles.push(tokio::spawn(async move {
            let txn = conn.begin().await.unwrap();
            let applied = CapacityRepository::try_reserve(&txn, "evt-race", 5, Utc::now())
                .await
                .unwrap();
            txn.commit().await.unwrap();
            applied
        }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }

    // Ceiling is 110, so exactly 22 reservations of 5 fit.
    assert_eq!(granted, 22);

    let record = CapacityRepository::new(conn.clone())
        .get_live_by_event_id("evt-race")
        .await
        .unwrap();
    assert_eq!(record.blocked_capacity, 110);
    assert_eq!(record.available_capacity, 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_sql_ceiling_matches_rust_ceiling() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let now = Utc::now();

    for (total, pct) in [(15, 10), (9, 10), (100, 0), (101, 50), (7, 33)] {
        let event_id = format!("evt-ceiling-{total}-{pct}");
        seed_capacity(&db, &event_id, total, pct).await;
        let expected = capacity::ceiling(total, pct, pct > 0);

        let fits = i32::try_from(expected).unwrap();
        assert!(
            CapacityRepository::try_reserve(db.connection(), &event_id, fits, now)
                .await
                .unwrap()
        );
        assert!(
            !CapacityRepository::try_reserve(db.connection(), &event_id, 1, now)
                .await
                .unwrap(),
            "{total} at {pct}% took more than {expected}"
        );
    }

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_reserve_then_restore_round_trips() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    seed_capacity(&db, "evt-rt", 100, 0).await;
    let now = Utc::now();

    assert!(
        CapacityRepository::try_reserve(db.connection(), "evt-rt", 30, now)
            .await
            .unwrap()
    );
    CapacityRepository::restore(db.connection(), "evt-rt", 30, now)
        .await
        .unwrap();

    let record = CapacityRepository::new(Arc::new(db.conn.clone()))
        .get_live_by_event_id("evt-rt")
        .await
        .unwrap();
    assert_eq!(record.available_capacity, 100);
    assert_eq!(record.blocked_capacity, 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_expired_hold_released_once() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    seed_capacity(&db, "evt-exp", 50, 0).await;
    let now = Utc::now();

    reservation_hold::ActiveModel {
        id: Set("hold-exp".to_string()),
        event_id: Set("evt-exp".to_string()),
        group_registration_id: Set("reg-exp".to_string()),
        quantity: Set(5),
        status: Set(HoldStatus::Active),
        release_reason: Set(None),
        expires_at: Set((now - Duration::minutes(1)).into()),
        created_at: Set((now - Duration::minutes(16)).into()),
        released_at: Set(None),
        consumed_at: Set(None),
    }
    .insert(db.connection())
    .await
    .unwrap();

    let repo = ReservationHoldRepository::new(Arc::new(db.conn.clone()));
    let expired = repo.find_expired_active(now, 10).await.unwrap();
    assert_eq!(expired.len(), 1);

    let first =
        ReservationHoldRepository::mark_released(db.connection(), "hold-exp", ReleaseReason::Expired, now)
            .await
            .unwrap();
    let second =
        ReservationHoldRepository::mark_released(db.connection(), "hold-exp", ReleaseReason::Expired, now)
            .await
            .unwrap();
    assert!(first);
    assert!(!second);

    // Consuming a released hold is refused.
    assert!(
        !ReservationHoldRepository::mark_consumed(db.connection(), "hold-exp", now)
            .await
            .unwrap()
    );

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_cleanup() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    let result = db.cleanup().await;
    assert!(result.is_ok(), "Cleanup failed: {:?}", result.err());
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_redis_config_from_env() {
    let config = TestRedisConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
}
