//! `POST /impression` — one call per rendered variant; bumps the
//! optimization's impression counters (spec.md §4.4, §6).

use crate::{error::ApiError, state::AppState};
use axum::{extract::State, Json};
use engine_core::OptimizationId;
use engine_domain::Variant;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ImpressionRequest {
    pub shop: String,
    pub session_id: String,
    pub optimization_id: uuid::Uuid,
    pub variant: Variant,
    #[serde(default)]
    pub context: Value,
}

#[derive(Debug, Serialize)]
pub struct ImpressionResponse {
    pub success: bool,
}

pub async fn record_impression(
    State(state): State<AppState>,
    Json(body): Json<ImpressionRequest>,
) -> Result<Json<ImpressionResponse>, ApiError> {
    let shop = body.shop.into();
    let optimization_id = OptimizationId::from(body.optimization_id);

    state
        .assignment_service()
        .record_impression(&shop, optimization_id, &body.session_id, body.variant, body.context)
        .await?;

    Ok(Json(ImpressionResponse { success: true }))
}
