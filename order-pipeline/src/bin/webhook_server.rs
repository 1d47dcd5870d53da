//! webhook-server: payment webhook ingestion
//!
//! Verifies Stripe deliveries and publishes CreationMessages.

use std::sync::Arc;

use order_pipeline::queue::SqsQueue;
use order_pipeline::stripe::SignatureVerifier;
use order_pipeline::webhook::{WebhookIngestor, api};
use order_pipeline::{Config, logger, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    logger::init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    tracing::info!(
        environment = %config.environment,
        version = env!("CARGO_PKG_VERSION"),
        "Starting webhook server"
    );

    let sdk_config = config.aws_sdk_config().await;
    let creation_queue = Arc::new(SqsQueue::from_sdk_config(
        &sdk_config,
        &config.creation_queue_url,
    ));
    let verifier = SignatureVerifier::new(&config.stripe_webhook_secret, config.webhook_tolerance);
    let ingestor = Arc::new(WebhookIngestor::new(verifier, creation_queue));

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Webhook server listening on {addr}");

    axum::serve(listener, api::router(ingestor))
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    tracing::info!("Webhook server stopped");
    Ok(())
}
