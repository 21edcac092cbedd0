//! `POST /assign` — storefront calls this once per (session, optimization)
//! pair it encounters on a product page; C3 draws (or reaffirms) the
//! sticky variant (spec.md §4.4, §6).

use crate::{error::ApiError, state::AppState};
use axum::{extract::State, Json};
use engine_core::OptimizationId;
use engine_domain::{production_rng, Variant};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub shop: String,
    pub session_id: String,
    pub optimization_id: uuid::Uuid,
    /// Wire-compatible with spec.md §6's body shape; the assigned variant
    /// is always server-computed (C3 owns the draw), so this is accepted
    /// but never consulted.
    #[serde(default)]
    pub variant: Option<Variant>,
}

#[derive(Debug, Serialize)]
pub struct AssignResponse {
    pub success: bool,
}

pub async fn assign(
    State(state): State<AppState>,
    Json(body): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, ApiError> {
    let shop = body.shop.into();
    let optimization_id = OptimizationId::from(body.optimization_id);

    let mut rng = production_rng();
    state
        .assignment_service()
        .assign(&shop, optimization_id, &body.session_id, &mut rng)
        .await?;

    Ok(Json(AssignResponse { success: true }))
}
