//! `GET /assignments/:session_id` — lets the storefront script recover a
//! visitor's existing sticky variants without re-assigning (spec.md §6).
//! Already filtered to non-expired rows by `Store::get_session_assignments`.

use crate::{error::ApiError, state::AppState};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use engine_core::ShopId;
use engine_domain::Variant;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AssignmentsQuery {
    pub shop: String,
}

#[derive(Debug, Serialize)]
pub struct AssignmentEntry {
    pub optimization_id: uuid::Uuid,
    pub variant: Variant,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AssignmentsResponse {
    pub assignments: Vec<AssignmentEntry>,
}

pub async fn list_assignments(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<AssignmentsQuery>,
) -> Result<Json<AssignmentsResponse>, ApiError> {
    let shop = ShopId::from(query.shop);

    let assignments = state.store.get_session_assignments(&shop, &session_id).await?;

    let assignments = assignments
        .into_iter()
        .map(|a| AssignmentEntry {
            optimization_id: a.optimization_id.0,
            variant: a.variant,
            expires_at: a.expires_at,
        })
        .collect();

    Ok(Json(AssignmentsResponse { assignments }))
}
