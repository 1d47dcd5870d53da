//! HTTP routes for the webhook server
//!
//! - `POST /webhook`, `POST /stripe/webhook`: raw body for signature verification
//! - `GET /health`

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{HeaderMap, HeaderName, HeaderValue};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::{WebhookIngestor, WebhookResponse};

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Create the webhook router
pub fn router(ingestor: Arc<WebhookIngestor>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhook", post(handle_webhook))
        .route("/stripe/webhook", post(handle_webhook))
        .layer(TraceLayer::new_for_http())
        // Set wraps Propagate so generated ids reach the response too
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            XRequestId,
        ))
        .with_state(ingestor)
}

/// Must receive the raw body (not JSON) for HMAC signature verification
async fn handle_webhook(
    State(ingestor): State<Arc<WebhookIngestor>>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    ingestor.handle(&body, signature).await
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "order-pipeline",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
