//! Application configuration.

use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::Path;

use crate::{AppError, AppResult};

/// Accepted hold lifetimes, in minutes.
pub const LOCK_TIMEOUT_MINUTES: RangeInclusive<i32> = 5..=60;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration (notification queue).
    pub redis: RedisConfig,
    /// Reservation and reconciliation settings.
    #[serde(default)]
    pub reservations: ReservationConfig,
    /// Outbound notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// A group discount tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DiscountTier {
    /// Smallest participant count the tier applies to.
    pub min_participants: i32,
    /// Discount in percent (0-100).
    pub percent: i32,
}

/// Reservation and reconciliation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    /// Seconds between reconciliation sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Maximum number of expired holds handled per sweep.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: u64,
    /// Lock timeout applied when a capacity is configured without one.
    #[serde(default = "default_lock_timeout_minutes")]
    pub default_lock_timeout_minutes: i32,
    /// Group discount tiers, applied when a reservation carries no explicit discount.
    #[serde(default = "default_discount_tiers")]
    pub discount_tiers: Vec<DiscountTier>,
}

impl ReservationConfig {
    /// Reject values the sweep and the hold timer cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        if self.sweep_interval_secs == 0 {
            return Err(AppError::Config(
                "reservations.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.sweep_batch_size == 0 {
            return Err(AppError::Config(
                "reservations.sweep_batch_size must be at least 1".to_string(),
            ));
        }
        if !LOCK_TIMEOUT_MINUTES.contains(&self.default_lock_timeout_minutes) {
            return Err(AppError::Config(format!(
                "reservations.default_lock_timeout_minutes must be within {}..={}, got {}",
                LOCK_TIMEOUT_MINUTES.start(),
                LOCK_TIMEOUT_MINUTES.end(),
                self.default_lock_timeout_minutes
            )));
        }
        Ok(())
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            sweep_batch_size: default_sweep_batch_size(),
            default_lock_timeout_minutes: default_lock_timeout_minutes(),
            discount_tiers: default_discount_tiers(),
        }
    }
}

/// Outbound notification configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    /// Whether capacity events are queued for delivery.
    #[serde(default)]
    pub enabled: bool,
    /// Webhook receiving capacity events.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Request timeout for webhook delivery, in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    50
}

const fn default_min_connections() -> u32 {
    5
}

fn default_redis_prefix() -> String {
    "eventix".to_string()
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

const fn default_sweep_batch_size() -> u64 {
    500
}

const fn default_lock_timeout_minutes() -> i32 {
    15
}

fn default_discount_tiers() -> Vec<DiscountTier> {
    vec![
        DiscountTier {
            min_participants: 5,
            percent: 5,
        },
        DiscountTier {
            min_participants: 10,
            percent: 10,
        },
        DiscountTier {
            min_participants: 20,
            percent: 15,
        },
    ]
}

const fn default_webhook_timeout_secs() -> u64 {
    10
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `EVENTIX_ENV`)
    /// 4. Environment variables with `EVENTIX_` prefix
    ///
    /// The result is validated before it is returned.
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let env = std::env::var("EVENTIX_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("EVENTIX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::validated(config.try_deserialize()?)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("EVENTIX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::validated(config.try_deserialize()?)
    }

    fn validated(config: Self) -> AppResult<Self> {
        config.reservations.validate()?;
        Ok(config)
    }
}
