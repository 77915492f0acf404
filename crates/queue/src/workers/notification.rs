//! Notification worker.

use std::time::Duration;

use apalis::prelude::*;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use crate::jobs::NotificationJob;

/// Context for the notification worker.
#[derive(Clone)]
pub struct NotificationContext {
    pub http_client: Client,
    /// Operator endpoint receiving capacity events.
    pub webhook_url: String,
    pub user_agent: String,
}

impl NotificationContext {
    /// Create a new notification context.
    pub fn new(
        webhook_url: String,
        user_agent: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            webhook_url,
            user_agent,
        })
    }
}

/// How a webhook response is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The receiver accepted the event.
    Delivered,
    /// The receiver rejected the payload; retrying will not help.
    Dropped,
    /// Transient failure; the job is retried.
    Retry,
}

/// Classify a webhook response status.
#[must_use]
pub fn classify_response(status: StatusCode) -> DeliveryOutcome {
    if status.is_success() {
        DeliveryOutcome::Delivered
    } else if status.is_client_error()
        && status != StatusCode::REQUEST_TIMEOUT
        && status != StatusCode::TOO_MANY_REQUESTS
    {
        DeliveryOutcome::Dropped
    } else {
        DeliveryOutcome::Retry
    }
}

/// Worker function for delivering capacity notifications.
///
/// # Errors
/// Returns an error when the webhook is unreachable or answers with a
/// retryable status, so the job is retried.
pub async fn notification_worker(
    job: NotificationJob,
    ctx: Data<NotificationContext>,
) -> Result<(), Error> {
    let event_id = job.event.event_id().to_string();

    match deliver_notification(&job, &ctx).await {
        Ok(()) => {
            debug!(event_id = %event_id, kind = job.kind(), "Notification delivered");
            Ok(())
        }
        Err(e) => {
            error!(event_id = %event_id, kind = job.kind(), error = %e, "Failed to deliver notification");
            Err(Error::Failed(e.into()))
        }
    }
}

async fn deliver_notification(
    job: &NotificationJob,
    ctx: &NotificationContext,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let response = ctx
        .http_client
        .post(&ctx.webhook_url)
        .header("User-Agent", &ctx.user_agent)
        .header("X-Eventix-Event", job.kind())
        .json(&job.event)
        .send()
        .await?;

    let status = response.status();
    match classify_response(status) {
        DeliveryOutcome::Delivered => Ok(()),
        DeliveryOutcome::Dropped => {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_id = %job.event.event_id(),
                status = %status,
                body = %body,
                "Webhook rejected notification, dropping"
            );
            Ok(())
        }
        DeliveryOutcome::Retry => {
            let body = response.text().await.unwrap_or_default();
            Err(format!("Webhook error {status}: {body}").into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_response() {
        assert_eq!(classify_response(StatusCode::OK), DeliveryOutcome::Delivered);
        assert_eq!(
            classify_response(StatusCode::NO_CONTENT),
            DeliveryOutcome::Delivered
        );
        assert_eq!(
            classify_response(StatusCode::BAD_REQUEST),
            DeliveryOutcome::Dropped
        );
        assert_eq!(classify_response(StatusCode::GONE), DeliveryOutcome::Dropped);
        assert_eq!(
            classify_response(StatusCode::TOO_MANY_REQUESTS),
            DeliveryOutcome::Retry
        );
        assert_eq!(
            classify_response(StatusCode::BAD_GATEWAY),
            DeliveryOutcome::Retry
        );
    }
}
