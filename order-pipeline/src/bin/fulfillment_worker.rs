//! fulfillment-worker: FulfillmentQueue poll loop

use std::sync::Arc;

use order_pipeline::queue::SqsQueue;
use order_pipeline::store::DynamoOrderStore;
use order_pipeline::worker::{FulfillmentWorker, WorkerContext, WorkerSettings};
use order_pipeline::{Config, logger, shutdown};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    logger::init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    let settings = WorkerSettings::from_config(&config);
    tracing::info!(
        environment = %config.environment,
        queue_url = %config.fulfillment_queue_url,
        table = %config.orders_table,
        "Starting fulfillment worker"
    );

    let sdk_config = config.aws_sdk_config().await;
    let queue = Arc::new(SqsQueue::from_sdk_config(
        &sdk_config,
        &config.fulfillment_queue_url,
    ));
    let store = Arc::new(DynamoOrderStore::from_sdk_config(
        &sdk_config,
        &config.orders_table,
    ));

    let ctx = WorkerContext::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        shutdown::shutdown_signal().await;
        if let Some(task) = signal_ctx.current() {
            tracing::info!(order_id = %task.order_id, "Finishing current stage before exit");
        }
        signal_ctx.request_shutdown();
    });

    FulfillmentWorker::new(queue, store, ctx, settings).run().await;
    Ok(())
}
