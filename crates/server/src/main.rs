//! Eventix server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apalis::layers::retry::RetryPolicy;
use apalis::prelude::*;
use axum::{Router, middleware};
use eventix_api::{middleware::AppState, middleware::no_store, router as api_router};
use eventix_common::Config;
use eventix_core::{
    CapacityNotifierService, CapacityService, GroupRegistrationService, NoOpNotifier,
    ReconciliationService,
};
use eventix_db::repositories::{
    CapacityRepository, GroupRegistrationRepository, ReservationHoldRepository,
};
use eventix_queue::{
    NotificationContext, RedisCapacityNotifier, SchedulerConfig, connect_notification_storage,
    notification_worker, run_scheduler,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Delivery attempts per notification before it is given up.
const NOTIFICATION_RETRIES: usize = 5;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eventix=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting eventix server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = eventix_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    eventix_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Initialize repositories
    let capacity_repo = CapacityRepository::new(Arc::clone(&db));
    let hold_repo = ReservationHoldRepository::new(Arc::clone(&db));
    let registration_repo = GroupRegistrationRepository::new(Arc::clone(&db));

    // Notification queue
    let notification_setup = match (
        config.notifications.enabled,
        config.notifications.webhook_url.clone(),
    ) {
        (true, Some(webhook_url)) => {
            info!("Connecting to Redis...");
            let storage =
                connect_notification_storage(&config.redis.url, &config.redis.prefix).await?;
            info!("Connected to Redis notification queue");
            Some((storage, webhook_url))
        }
        (true, None) => {
            warn!("Notifications enabled without a webhook URL; capacity events are discarded");
            None
        }
        (false, _) => None,
    };

    let notifier: CapacityNotifierService = match &notification_setup {
        Some((storage, _)) => Arc::new(RedisCapacityNotifier::new(storage.clone())),
        None => Arc::new(NoOpNotifier),
    };

    // Initialize services
    let reservations = &config.reservations;
    let capacity_service = CapacityService::new(
        capacity_repo,
        notifier.clone(),
        reservations.default_lock_timeout_minutes,
    );
    let group_registration_service = GroupRegistrationService::new(
        registration_repo,
        capacity_service.clone(),
        reservations.discount_tiers.clone(),
    );
    let reconciliation_service =
        ReconciliationService::new(hold_repo, notifier, reservations.sweep_batch_size);

    // Start reconciliation scheduler
    let scheduler = run_scheduler(
        SchedulerConfig {
            reconciliation_interval: Duration::from_secs(reservations.sweep_interval_secs),
        },
        Arc::new(reconciliation_service),
    );
    info!(
        interval_secs = reservations.sweep_interval_secs,
        batch_size = reservations.sweep_batch_size,
        "Reconciliation scheduler started"
    );

    // Start notification worker
    if let Some((storage, webhook_url)) = notification_setup {
        info!("Starting notification worker...");
        let user_agent = format!("eventix/{}", env!("CARGO_PKG_VERSION"));
        let ctx = NotificationContext::new(
            webhook_url,
            user_agent,
            Duration::from_secs(config.notifications.timeout_secs),
        )?;

        tokio::spawn(async move {
            let monitor = Monitor::new().register({
                WorkerBuilder::new("notification")
                    .data(ctx)
                    .retry(RetryPolicy::retries(NOTIFICATION_RETRIES))
                    .backend(storage)
                    .build_fn(notification_worker)
            });

            if let Err(e) = monitor.run().await {
                tracing::error!(error = %e, "Notification worker failed");
            }
        });
        info!("Notification worker started");
    }

    let state = AppState {
        capacity_service,
        group_registration_service,
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn(no_store))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.abort();
    info!("Server shutdown complete");
    Ok(())
}
