//! Redis-backed capacity notifier.
//!
//! Queues capacity events for the apalis notification worker, so a slow
//! webhook never holds up a reservation.

use apalis::prelude::*;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use eventix_common::{AppError, AppResult};
use eventix_core::{CapacityEvent, CapacityNotifier};

use crate::jobs::NotificationJob;

/// Redis-backed capacity notifier.
#[derive(Clone)]
pub struct RedisCapacityNotifier {
    storage: RedisStorage<NotificationJob>,
}

impl RedisCapacityNotifier {
    /// Create a new Redis capacity notifier.
    #[must_use]
    pub const fn new(storage: RedisStorage<NotificationJob>) -> Self {
        Self { storage }
    }
}

/// Connect the notification job storage, namespaced under `prefix`.
pub async fn connect_notification_storage(
    redis_url: &str,
    prefix: &str,
) -> AppResult<RedisStorage<NotificationJob>> {
    let client =
        redis::Client::open(redis_url).map_err(|e| AppError::Queue(e.to_string()))?;
    let conn = redis::aio::ConnectionManager::new(client)
        .await
        .map_err(|e| AppError::Queue(e.to_string()))?;

    let config = apalis_redis::Config::default().set_namespace(&format!("{prefix}:notifications"));
    Ok(RedisStorage::new_with_config(conn, config))
}

#[async_trait]
impl CapacityNotifier for RedisCapacityNotifier {
    async fn notify(&self, event: CapacityEvent) -> AppResult<()> {
        let event_id = event.event_id().to_string();
        let job = NotificationJob::new(event);
        let kind = job.kind();

        self.storage
            .clone()
            .push(job)
            .await
            .map_err(|e| AppError::Queue(format!("Failed to queue notification: {e}")))?;

        tracing::debug!(event_id = %event_id, kind = kind, "Queued capacity notification");
        Ok(())
    }
}
