//! Job workers.

mod notification;

pub use notification::{DeliveryOutcome, NotificationContext, classify_response, notification_worker};
