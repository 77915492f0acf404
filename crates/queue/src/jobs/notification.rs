//! Capacity notification job.

use chrono::{DateTime, Utc};
use eventix_core::CapacityEvent;
use serde::{Deserialize, Serialize};

/// Job to deliver a capacity event to the operator webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    /// Event to deliver.
    pub event: CapacityEvent,

    /// When the event was queued.
    pub queued_at: DateTime<Utc>,
}

impl NotificationJob {
    /// Create a new notification job.
    #[must_use]
    pub fn new(event: CapacityEvent) -> Self {
        Self {
            event,
            queued_at: Utc::now(),
        }
    }

    /// Value of the `X-Eventix-Event` header.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self.event {
            CapacityEvent::ThresholdCrossed { .. } => "threshold_crossed",
            CapacityEvent::HoldExpired { .. } => "hold_expired",
        }
    }
}
