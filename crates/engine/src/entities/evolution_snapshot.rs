//! EvolutionSnapshot — append-only per-optimization time series (C7).
//! Strictly ordered by cumulative impressions; read-only reporting, no
//! feedback into the Bayesian engine.

use chrono::{DateTime, Utc};
use engine_core::{OptimizationId, ShopId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvolutionSnapshot {
    pub id: Uuid,
    pub shop: ShopId,
    pub optimization_id: OptimizationId,
    pub impressions: i64,
    pub control_impressions: i64,
    pub variant_impressions: i64,
    pub control_conversions: i64,
    pub variant_conversions: i64,
    pub control_revenue: Decimal,
    pub variant_revenue: Decimal,
    pub control_rpv: f64,
    pub variant_rpv: f64,
    pub control_allocation: f64,
    pub variant_allocation: f64,
    pub recorded_at: DateTime<Utc>,
}
