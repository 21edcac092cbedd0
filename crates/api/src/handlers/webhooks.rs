//! Webhook endpoints (spec.md §4.5, §6): order-create attribution and
//! shop-data redaction. Both are authenticated by an HMAC-SHA256 signature
//! over the exact raw request body, compared in constant time
//! (`engine_domain::verify_webhook_signature`) — unauthenticated requests
//! get a 401 before the body is ever parsed as JSON.
//!
//! Neither webhook's payload carries the shop host the way the
//! session-facing endpoints do (the platform's order/redact payloads have
//! no such field), so both take it as a query parameter instead.

use crate::{error::ApiError, state::AppState};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use engine_core::{Error, ShopId};
use engine_domain::{verify_webhook_signature, OrderPayload};
use serde::{Deserialize, Serialize};
use tracing::warn;

const SIGNATURE_HEADER: &str = "x-webhook-hmac-sha256";

#[derive(Debug, Deserialize)]
pub struct WebhookQuery {
    pub shop: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
}

fn extract_signature<'a>(headers: &'a HeaderMap) -> Result<&'a str, ApiError> {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::unauthorized("missing webhook signature header").into())
}

/// `POST /webhooks/orders/create` — verifies the signature, runs
/// attribution (C5), and enqueues a `RecomputeAllocationJob` per touched
/// optimization rather than recomputing inline (spec.md §9's work-queue
/// redesign flag).
pub async fn orders_create(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = extract_signature(&headers)?;
    verify_webhook_signature(&raw_body, signature, &state.config.webhook.hmac_secret)?;

    let order: OrderPayload = serde_json::from_slice(&raw_body)
        .map_err(|e| Error::invalid_argument(format!("malformed order webhook payload: {e}")))?;

    let shop = ShopId::from(query.shop);
    let pipeline = state.attribution_pipeline();
    let touched = pipeline.process_order(&shop, &order).await?;

    for optimization_id in touched {
        if let Err(e) = state.enqueue_recompute_allocation(&shop, optimization_id).await {
            warn!(
                error = %e,
                optimization_id = %optimization_id,
                "failed to enqueue recompute_allocation job after order attribution"
            );
        }
    }

    Ok(Json(WebhookAck { success: true }))
}

/// `POST /webhooks/shop/redact` — authenticated the same way as the order
/// webhook; purges every row scoped to the shop (spec.md §7 scenario 6).
/// No PII is stored by this service, so the handler only acknowledges and
/// deletes.
pub async fn shop_redact(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = extract_signature(&headers)?;
    verify_webhook_signature(&raw_body, signature, &state.config.webhook.hmac_secret)?;

    let shop = ShopId::from(query.shop);
    state.store.delete_all_shop_data(&shop).await?;

    Ok(Json(WebhookAck { success: true }))
}
