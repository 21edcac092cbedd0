//! `GET /optimizations` — the storefront's catalog of currently running
//! experiments for a shop (C1/C3). Public, CORS-open: the embed script
//! calls this on every product page load before it knows which session it
//! is, so the response carries no session-specific data.

use crate::{error::ApiError, state::AppState};
use axum::{extract::Query, extract::State, Json};
use engine_core::ShopId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct OptimizationsQuery {
    pub shop: String,
}

/// A single entry in the `/optimizations` listing. `scope` names where on
/// the product page the variant applies; today every optimization is
/// product-page scoped (spec.md §1), so this is a constant rather than a
/// per-row value.
#[derive(Debug, Serialize)]
pub struct OptimizationListing {
    pub id: uuid::Uuid,
    pub external_product_id: String,
    pub optimization_type: engine_domain::OptimizationType,
    pub control_data: Value,
    pub variant_data: Value,
    pub scope: &'static str,
}

#[derive(Debug, Serialize)]
pub struct OptimizationsResponse {
    pub optimizations: Vec<OptimizationListing>,
}

pub async fn list_optimizations(
    State(state): State<AppState>,
    Query(query): Query<OptimizationsQuery>,
) -> Result<Json<OptimizationsResponse>, ApiError> {
    let shop = ShopId::from(query.shop);

    let optimizations = state.store.active_optimizations_for_shop(&shop).await?;

    let mut listings = Vec::with_capacity(optimizations.len());
    for optimization in optimizations {
        let product = state
            .store
            .get_product(&shop, optimization.product_id)
            .await?
            .ok_or_else(|| engine_core::Error::data_integrity("active optimization references a missing product"))?;
        listings.push(OptimizationListing {
            id: optimization.id.0,
            external_product_id: product.external_product_id,
            optimization_type: optimization.optimization_type,
            control_data: optimization.control_data,
            variant_data: optimization.variant_data,
            scope: "product_page",
        });
    }

    Ok(Json(OptimizationsResponse { optimizations: listings }))
}
