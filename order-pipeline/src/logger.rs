//! Logging Infrastructure
//!
//! Structured logging shared by all pipeline binaries:
//! - Console output, pretty for development, JSON for production
//! - Optional daily rotating application logs
//! - Optional daily rotating audit logs (target `audit`)

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, filter::filter_fn, fmt, layer::SubscriberExt, prelude::*};

/// Tracing target for audit records
pub const AUDIT_TARGET: &str = "audit";

/// Initialize the logging system
///
/// # Arguments
/// * `level` - Log level (e.g., "info", "debug", "warn"), overridden by `RUST_LOG`
/// * `json_format` - Whether to use JSON format (true for production)
/// * `log_dir` - Optional directory for file logging (`<dir>/app`, `<dir>/audit`)
///
/// # Examples
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// // Development setup (console only)
/// order_pipeline::logger::init_logger_with_file("debug", false, None)?;
/// # Ok(())
/// # }
/// ```
pub fn init_logger_with_file(
    level: &str,
    json_format: bool,
    log_dir: Option<&str>,
) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = if json_format {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let file_layers = match log_dir {
        Some(dir) => Some(file_layers(Path::new(dir), json_format)?),
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layers)
        .try_init()?;

    Ok(())
}

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// App file gets everything except audit records; audit file gets only those
fn file_layers<S>(log_dir: &Path, json_format: bool) -> anyhow::Result<Vec<BoxedLayer<S>>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let app_log_dir = log_dir.join("app");
    let audit_log_dir = log_dir.join("audit");
    fs::create_dir_all(&app_log_dir)?;
    fs::create_dir_all(&audit_log_dir)?;

    let app_log = RollingFileAppender::new(Rotation::DAILY, app_log_dir, "app");
    let audit_log = RollingFileAppender::new(Rotation::DAILY, audit_log_dir, "audit");

    let app_filter = filter_fn(|meta| meta.target() != AUDIT_TARGET);
    let audit_filter = filter_fn(|meta| meta.target() == AUDIT_TARGET);

    let layers = if json_format {
        vec![
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_thread_ids(true)
                .with_writer(std::sync::Mutex::new(app_log))
                .with_filter(app_filter)
                .boxed(),
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_writer(std::sync::Mutex::new(audit_log))
                .with_filter(audit_filter)
                .boxed(),
        ]
    } else {
        vec![
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(app_log))
                .with_filter(app_filter)
                .boxed(),
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(audit_log))
                .with_filter(audit_filter)
                .boxed(),
        ]
    };

    Ok(layers)
}

/// Audit log helper - records payment and order lifecycle facts
///
/// Audit records go to the `audit` target and, when a log directory is
/// configured, to their own `audit-YYYY-MM-DD` files.
///
/// # Examples
/// ```no_run
/// order_pipeline::audit_log!("payment_succeeded", payment_intent_id = "pi_1", amount = 1999, "PAYMENT_LOG");
/// ```
#[macro_export]
macro_rules! audit_log {
    ($action:expr, $($arg:tt)*) => {
        tracing::info!(
            target: "audit",
            action = $action,
            timestamp = %::chrono::Utc::now().to_rfc3339(),
            $($arg)*
        );
    };
}
