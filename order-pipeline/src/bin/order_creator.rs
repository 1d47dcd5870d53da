//! order-creator: CreationQueue consumer

use std::sync::Arc;

use order_pipeline::creator::{AlwaysFulfill, CreationConsumer, OrderCreator};
use order_pipeline::queue::SqsQueue;
use order_pipeline::store::DynamoOrderStore;
use order_pipeline::{Config, logger, shutdown};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    logger::init_logger_with_file(&config.log_level, config.log_json, config.log_dir.as_deref())?;

    tracing::info!(environment = %config.environment, "Starting order creator");

    let sdk_config = config.aws_sdk_config().await;
    let creation_queue = Arc::new(SqsQueue::from_sdk_config(
        &sdk_config,
        &config.creation_queue_url,
    ));
    let fulfillment_queue = Arc::new(SqsQueue::from_sdk_config(
        &sdk_config,
        &config.fulfillment_queue_url,
    ));
    let store = Arc::new(DynamoOrderStore::from_sdk_config(
        &sdk_config,
        &config.orders_table,
    ));

    let creator = OrderCreator::new(store, fulfillment_queue, Arc::new(AlwaysFulfill));
    let consumer = CreationConsumer::new(
        creation_queue,
        creator,
        config.creation_batch_size,
        config.receive_wait,
        config.error_backoff,
    );

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown::shutdown_signal().await;
        signal_token.cancel();
    });

    consumer.run(token).await;
    Ok(())
}
