//! order-pipeline: payment webhook to fulfilled order
//!
//! Components, leaf first:
//! - [`store`]: order aggregate persistence (DynamoDB, in-memory)
//! - [`queue`]: at-least-once task queues with visibility timeout (SQS, in-memory)
//! - [`webhook`]: signed payment event ingestion and HTTP surface
//! - [`creator`]: CreationQueue batch consumer that materializes orders
//! - [`worker`]: FulfillmentQueue poll loop driving the order state machine
//!
//! Each component ships as its own binary under `src/bin/`.

pub mod config;
pub mod creator;
pub mod logger;
pub mod queue;
pub mod shutdown;
pub mod store;
pub mod stripe;
pub mod webhook;
pub mod worker;

pub use config::{Config, ConfigError};
pub use creator::{CreationConsumer, OrderCreator, RoutingPolicy};
pub use queue::{MemoryQueue, SqsQueue, TaskQueue};
pub use store::{DynamoOrderStore, MemoryOrderStore, OrderStore};
pub use webhook::WebhookIngestor;
pub use worker::{FulfillmentWorker, RedeliveryMode, WorkerContext};
