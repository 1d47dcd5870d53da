//! Pipeline configuration
//!
//! Loaded from environment variables (after `.env`). Every binary reads the
//! same `Config`; each uses only the parts it needs, but all required values
//! must be present for any of them to start.

use std::time::Duration;

use shared::error::AppError;
use thiserror::Error;

use crate::worker::{RedeliveryMode, StageTimings};

/// Configuration error, fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::config(err.to_string())
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    /// Webhook HTTP port
    pub http_port: u16,
    /// Log level filter (overridden by RUST_LOG)
    pub log_level: String,
    /// JSON console output
    pub log_json: bool,
    /// Directory for rotating app/audit log files
    pub log_dir: Option<String>,

    /// CreationQueue URL
    pub creation_queue_url: String,
    /// FulfillmentQueue URL
    pub fulfillment_queue_url: String,
    /// Orders table name
    pub orders_table: String,
    /// Endpoint override for local AWS emulators
    pub aws_endpoint_url: Option<String>,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Accepted age of a webhook signature timestamp
    pub webhook_tolerance: Duration,

    /// Bounded long-poll wait per receive
    pub receive_wait: Duration,
    /// Delay between worker iterations
    pub poll_interval: Duration,
    /// Delay after a failed iteration
    pub error_backoff: Duration,
    /// Max messages per creation batch (1..=10)
    pub creation_batch_size: i32,
    pub redelivery_mode: RedeliveryMode,
    pub stage_timings: StageTimings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let creation_batch_size: i32 = env.parse_or("CREATION_BATCH_SIZE", 10)?;
        if !(1..=10).contains(&creation_batch_size) {
            return Err(ConfigError::Invalid {
                name: "CREATION_BATCH_SIZE",
                value: creation_batch_size.to_string(),
                reason: "must be between 1 and 10".into(),
            });
        }

        let stage_timings = StageTimings {
            processing_delay: env.millis_or("PROCESSING_DELAY_MS", 2_000)?,
            packaging_duration: env.millis_or("PACKAGING_DURATION_MS", 180_000)?,
            packaging_steps: env.steps_or("PACKAGING_STEPS", 6)?,
            shipping_duration: env.millis_or("SHIPPING_DURATION_MS", 600_000)?,
            shipping_steps: env.steps_or("SHIPPING_STEPS", 20)?,
        };

        Ok(Self {
            environment: env
                .optional("ENVIRONMENT")
                .unwrap_or_else(|| "development".into()),
            http_port: env.parse_or("HTTP_PORT", 3000)?,
            log_level: env.optional("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: env.parse_or("LOG_JSON", false)?,
            log_dir: env.optional("LOG_DIR"),

            creation_queue_url: env.require("CREATION_QUEUE_URL")?,
            fulfillment_queue_url: env.require("FULFILLMENT_QUEUE_URL")?,
            orders_table: env.require("ORDERS_TABLE")?,
            aws_endpoint_url: env.optional("AWS_ENDPOINT_URL"),

            stripe_webhook_secret: env.require("STRIPE_WEBHOOK_SECRET")?,
            webhook_tolerance: Duration::from_secs(env.parse_or("WEBHOOK_TOLERANCE_SECS", 300)?),

            receive_wait: Duration::from_secs(env.parse_or("RECEIVE_WAIT_SECS", 20)?),
            poll_interval: env.required_millis("POLL_INTERVAL_MS")?,
            error_backoff: env.millis_or("ERROR_BACKOFF_MS", 10_000)?,
            creation_batch_size,
            redelivery_mode: env.parse_or("REDELIVERY_MODE", RedeliveryMode::default())?,
            stage_timings,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Shared AWS SDK configuration, honouring the endpoint override
    pub async fn aws_sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(ref endpoint) = self.aws_endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        loader.load().await
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank, trimmed
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(value) => parse(name, value),
            None => Ok(default),
        }
    }

    fn millis_or(&self, name: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.parse_or(name, default).map(Duration::from_millis)
    }

    fn required_millis(&self, name: &'static str) -> Result<Duration, ConfigError> {
        let value = self.require(name)?;
        parse::<u64>(name, value).map(Duration::from_millis)
    }

    fn steps_or(&self, name: &'static str, default: u32) -> Result<u32, ConfigError> {
        let steps = self.parse_or(name, default)?;
        if steps == 0 {
            return Err(ConfigError::Invalid {
                name,
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(steps)
    }
}

fn parse<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}
