//! DynamoDB order store
//!
//! One item per order keyed by `orderId`. Status updates are a single
//! `UpdateItem` with `list_append` on the log and a `ConditionExpression`
//! guarding existence and, for conditional updates, the expected status.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use serde_json::Value;
use shared::order::{Order, StatusUpdate};
use tracing::debug;

use super::{OrderStore, StoreError};

const KEY: &str = "orderId";

pub struct DynamoOrderStore {
    client: Client,
    table_name: String,
}

impl DynamoOrderStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(Client::new(config), table_name)
    }
}

#[async_trait]
impl OrderStore for DynamoOrderStore {
    async fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(KEY, AttributeValue::S(order_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| {
                StoreError::Unavailable(format!("get_item failed: {}", DisplayErrorContext(&e)))
            })?;

        match output.item() {
            Some(item) => order_from_item(order_id, item).map(Some),
            None => Ok(None),
        }
    }

    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        let item = order_to_item(order)?;
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(orderId)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::AlreadyExists(order.order_id.clone()))
            }
            Err(e) => Err(StoreError::Unavailable(format!(
                "put_item failed: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }

    async fn update_status(
        &self,
        order_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), StoreError> {
        // Validate and stamp locally so the appended entry sorts after the last one
        let mut order = self
            .get(order_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;
        let entry = order
            .apply(update)
            .map_err(|e| StoreError::from_transition(order_id, e))?
            .clone();

        let log = to_json(order_id, &entry)?;
        let timestamp = to_json(order_id, &entry.timestamp)?;

        let mut condition = String::from("attribute_exists(orderId)");
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(KEY, AttributeValue::S(order_id.to_string()))
            .update_expression(
                "SET orderStatus = :status, updatedAt = :ts, \
                 logs = list_append(if_not_exists(logs, :empty), :log)",
            )
            .expression_attribute_values(":status", AttributeValue::S(update.status.to_string()))
            .expression_attribute_values(":ts", to_attr(&timestamp))
            .expression_attribute_values(":log", AttributeValue::L(vec![to_attr(&log)]))
            .expression_attribute_values(":empty", AttributeValue::L(vec![]));
        if let Some(expected) = update.expected {
            condition.push_str(" AND orderStatus = :expected");
            request = request
                .expression_attribute_values(":expected", AttributeValue::S(expected.to_string()));
        }

        match request.condition_expression(condition).send().await {
            Ok(_) => {
                debug!(order_id = %order_id, status = %update.status, "Order status updated");
                Ok(())
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                match update.expected {
                    Some(expected) => Err(StoreError::Conflict {
                        order_id: order_id.to_string(),
                        expected,
                    }),
                    None => Err(StoreError::NotFound(order_id.to_string())),
                }
            }
            Err(e) => Err(StoreError::Unavailable(format!(
                "update_item failed: {}",
                DisplayErrorContext(&e)
            ))),
        }
    }
}

fn to_json<T: serde::Serialize>(order_id: &str, value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Corrupt {
        order_id: order_id.to_string(),
        reason: e.to_string(),
    })
}

fn order_to_item(order: &Order) -> Result<HashMap<String, AttributeValue>, StoreError> {
    match to_json(&order.order_id, order)? {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), to_attr(v))).collect()),
        _ => Err(StoreError::Corrupt {
            order_id: order.order_id.clone(),
            reason: "order did not serialize to an object".into(),
        }),
    }
}

fn order_from_item(
    order_id: &str,
    item: &HashMap<String, AttributeValue>,
) -> Result<Order, StoreError> {
    let corrupt = |reason: String| StoreError::Corrupt {
        order_id: order_id.to_string(),
        reason,
    };
    let mut map = serde_json::Map::with_capacity(item.len());
    for (key, attr) in item {
        map.insert(key.clone(), from_attr(attr).map_err(corrupt)?);
    }
    serde_json::from_value(Value::Object(map)).map_err(|e| corrupt(e.to_string()))
}

fn to_attr(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(items) => AttributeValue::L(items.iter().map(to_attr).collect()),
        Value::Object(map) => {
            AttributeValue::M(map.iter().map(|(k, v)| (k.clone(), to_attr(v))).collect())
        }
    }
}

fn from_attr(attr: &AttributeValue) -> Result<Value, String> {
    Ok(match attr {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => {
            if let Ok(i) = n.parse::<i64>() {
                Value::from(i)
            } else {
                let f: f64 = n.parse().map_err(|_| format!("invalid number {n:?}"))?;
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("non-finite number {n:?}"))?
            }
        }
        AttributeValue::L(items) => {
            Value::Array(items.iter().map(from_attr).collect::<Result<_, _>>()?)
        }
        AttributeValue::M(map) => Value::Object(
            map.iter()
                .map(|(k, v)| from_attr(v).map(|v| (k.clone(), v)))
                .collect::<Result<_, _>>()?,
        ),
        other => return Err(format!("unsupported attribute {other:?}")),
    })
}
