//! Capacity notifier.
//!
//! Services report capacity events through [`CapacityNotifier`] without
//! depending on the transport. The queue crate provides the Redis-backed
//! implementation.

use std::sync::Arc;

use async_trait::async_trait;
use eventix_common::AppResult;
use serde::{Deserialize, Serialize};

/// Events worth telling operators about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CapacityEvent {
    /// A reservation pushed occupancy across an alert threshold.
    #[serde(rename_all = "camelCase")]
    ThresholdCrossed {
        event_id: String,
        severity: String,
        threshold_percent: i32,
        occupancy_percent: i64,
    },
    /// The reconciliation sweep released a hold nobody paid for.
    #[serde(rename_all = "camelCase")]
    HoldExpired {
        event_id: String,
        hold_id: String,
        group_registration_id: String,
        quantity: i32,
    },
}

impl CapacityEvent {
    /// Event the notification concerns.
    #[must_use]
    pub fn event_id(&self) -> &str {
        match self {
            Self::ThresholdCrossed { event_id, .. } | Self::HoldExpired { event_id, .. } => event_id,
        }
    }
}

/// Sink for capacity events.
#[async_trait]
pub trait CapacityNotifier: Send + Sync {
    /// Hand an event to the transport.
    async fn notify(&self, event: CapacityEvent) -> AppResult<()>;
}

/// A no-op notifier for tests or when notifications are disabled.
#[derive(Clone, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl CapacityNotifier for NoOpNotifier {
    async fn notify(&self, _event: CapacityEvent) -> AppResult<()> {
        Ok(())
    }
}

/// Wrapper for boxed `CapacityNotifier` trait object.
pub type CapacityNotifierService = Arc<dyn CapacityNotifier>;

/// Deliver an event, logging instead of failing when the transport errors.
pub(crate) async fn notify_quietly(notifier: &CapacityNotifierService, event: CapacityEvent) {
    let event_id = event.event_id().to_string();
    if let Err(e) = notifier.notify(event).await {
        tracing::warn!(event_id = %event_id, error = %e, "Failed to enqueue capacity notification");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Notifier that remembers every event, optionally failing each call.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub events: Mutex<Vec<CapacityEvent>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        #[allow(clippy::unwrap_used)]
        pub fn events(&self) -> Vec<CapacityEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CapacityNotifier for RecordingNotifier {
        #[allow(clippy::unwrap_used)]
        async fn notify(&self, event: CapacityEvent) -> AppResult<()> {
            self.events.lock().unwrap().push(event);
            if self.fail {
                return Err(eventix_common::AppError::Queue("redis unavailable".to_string()));
            }
            Ok(())
        }
    }
}
