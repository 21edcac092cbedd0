//! Append-only impression/conversion event logs (spec.md §3). Kept
//! separately from the aggregate counters they roll up into — the
//! aggregates are authoritative for allocation math, these are the audit
//! trail and the seed data for test reconstructions.

use super::optimization::Variant;
use chrono::{DateTime, Utc};
use engine_core::{OptimizationId, ShopId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OptimizationImpression {
    pub id: Uuid,
    pub shop: ShopId,
    pub optimization_id: OptimizationId,
    pub session_id: String,
    pub variant: Variant,
    pub context: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl OptimizationImpression {
    pub fn new(shop: ShopId, optimization_id: OptimizationId, session_id: String, variant: Variant, context: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            shop,
            optimization_id,
            session_id,
            variant,
            context,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OptimizationConversion {
    pub id: Uuid,
    pub shop: ShopId,
    pub optimization_id: OptimizationId,
    pub session_id: String,
    pub variant: Variant,
    pub revenue: Decimal,
    pub order_external_id: String,
    pub recorded_at: DateTime<Utc>,
}

impl OptimizationConversion {
    pub fn new(
        shop: ShopId,
        optimization_id: OptimizationId,
        session_id: String,
        variant: Variant,
        revenue: Decimal,
        order_external_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shop,
            optimization_id,
            session_id,
            variant,
            revenue,
            order_external_id,
            recorded_at: Utc::now(),
        }
    }
}
