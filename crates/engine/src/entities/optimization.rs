//! Optimization — the experiment unit. See SPEC_FULL.md §3/§4.2-4.3.

use chrono::{DateTime, Utc};
use engine_core::{OptimizationId, ProductId, ShopId};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "optimization_type", rename_all = "snake_case")]
pub enum OptimizationType {
    Title,
    Description,
    Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "optimization_status", rename_all = "snake_case")]
pub enum OptimizationStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "variant_arm", rename_all = "snake_case")]
pub enum Variant {
    Control,
    Variant,
}

impl Variant {
    pub fn other(self) -> Self {
        match self {
            Variant::Control => Variant::Variant,
            Variant::Variant => Variant::Control,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Control => write!(f, "control"),
            Variant::Variant => write!(f, "variant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "risk_mode", rename_all = "snake_case")]
pub enum RiskMode {
    Cautious,
    Balanced,
    Aggressive,
}

impl RiskMode {
    /// (min_share, max_share) clamp on the variant's allocation. spec.md §4.2
    /// names each mode's "control floor / variant floor" pair (cautious
    /// 75/5, balanced 50/5, aggressive 25/5); the variant's range is then
    /// `[variant_floor, 100 - control_floor]`.
    pub fn variant_share_bounds(self) -> (f64, f64) {
        match self {
            RiskMode::Cautious => (0.05, 0.25),
            RiskMode::Balanced => (0.05, 0.50),
            RiskMode::Aggressive => (0.05, 0.75),
        }
    }
}

/// Tagged, versioned Bayesian state — replaces the source's opaque JSON
/// config blob (SPEC_FULL.md §9 / DESIGN.md Open Question 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum BayesianState {
    #[serde(rename = "1")]
    V1 {
        conversion_rate_prior_mean: f64,
        aov_prior_mean: f64,
        risk_mode: RiskMode,
        safety_budget: i32,
        promotion_check_count: u32,
        last_update_at: Option<DateTime<Utc>>,
    },
}

impl BayesianState {
    pub fn seed(risk_mode: RiskMode, product_price: Decimal, safety_budget: i32) -> Self {
        let aov = product_price.to_f64().unwrap_or(0.0).max(0.01);
        BayesianState::V1 {
            conversion_rate_prior_mean: 0.02,
            aov_prior_mean: aov,
            risk_mode,
            safety_budget,
            promotion_check_count: 0,
            last_update_at: None,
        }
    }

    pub fn risk_mode(&self) -> RiskMode {
        match self {
            BayesianState::V1 { risk_mode, .. } => *risk_mode,
        }
    }

    pub fn safety_budget(&self) -> i32 {
        match self {
            BayesianState::V1 { safety_budget, .. } => *safety_budget,
        }
    }

    pub fn promotion_check_count(&self) -> u32 {
        match self {
            BayesianState::V1 { promotion_check_count, .. } => *promotion_check_count,
        }
    }
}

/// Per-arm aggregate counters. `control_*` and `variant_*` must always sum to
/// the unprefixed total (the counter-conservation invariant in spec.md §8).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ArmAggregates {
    pub impressions: i64,
    pub control_impressions: i64,
    pub variant_impressions: i64,
    pub conversions: i64,
    pub control_conversions: i64,
    pub variant_conversions: i64,
    pub revenue: Decimal,
    pub control_revenue: Decimal,
    pub variant_revenue: Decimal,
}

impl ArmAggregates {
    pub fn arpu(&self) -> Decimal {
        if self.conversions == 0 {
            Decimal::ZERO
        } else {
            self.revenue / Decimal::from(self.conversions)
        }
    }

    pub fn rpv(&self, variant: Variant) -> f64 {
        let (impressions, revenue) = match variant {
            Variant::Control => (self.control_impressions, self.control_revenue),
            Variant::Variant => (self.variant_impressions, self.variant_revenue),
        };
        if impressions == 0 {
            0.0
        } else {
            revenue.to_f64().unwrap_or(0.0) / impressions as f64
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct OptimizationRow {
    pub id: OptimizationId,
    pub shop: ShopId,
    pub product_id: ProductId,
    pub optimization_type: OptimizationType,
    pub control_data: serde_json::Value,
    pub variant_data: serde_json::Value,
    pub status: OptimizationStatus,
    pub control_allocation: f64,
    pub variant_allocation: f64,
    pub bayesian_state: serde_json::Value,
    pub impressions: i64,
    pub control_impressions: i64,
    pub variant_impressions: i64,
    pub conversions: i64,
    pub control_conversions: i64,
    pub variant_conversions: i64,
    pub revenue: Decimal,
    pub control_revenue: Decimal,
    pub variant_revenue: Decimal,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory, typed view of an `OptimizationRow` — the Bayesian engine and
/// lifecycle controller operate on this, not on the raw JSON column.
#[derive(Debug, Clone)]
pub struct Optimization {
    pub id: OptimizationId,
    pub shop: ShopId,
    pub product_id: ProductId,
    pub optimization_type: OptimizationType,
    pub control_data: serde_json::Value,
    pub variant_data: serde_json::Value,
    pub status: OptimizationStatus,
    pub control_allocation: f64,
    pub variant_allocation: f64,
    pub bayesian_state: BayesianState,
    pub aggregates: ArmAggregates,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Optimization {
    pub fn arpu(&self) -> Decimal {
        self.aggregates.arpu()
    }
}

impl TryFrom<OptimizationRow> for Optimization {
    type Error = engine_core::Error;

    fn try_from(row: OptimizationRow) -> Result<Self, Self::Error> {
        let bayesian_state: BayesianState = serde_json::from_value(row.bayesian_state)
            .map_err(|e| engine_core::Error::data_integrity(format!("corrupt bayesian_state: {e}")))?;

        Ok(Self {
            id: row.id,
            shop: row.shop,
            product_id: row.product_id,
            optimization_type: row.optimization_type,
            control_data: row.control_data,
            variant_data: row.variant_data,
            status: row.status,
            control_allocation: row.control_allocation,
            variant_allocation: row.variant_allocation,
            bayesian_state,
            aggregates: ArmAggregates {
                impressions: row.impressions,
                control_impressions: row.control_impressions,
                variant_impressions: row.variant_impressions,
                conversions: row.conversions,
                control_conversions: row.control_conversions,
                variant_conversions: row.variant_conversions,
                revenue: row.revenue,
                control_revenue: row.control_revenue,
                variant_revenue: row.variant_revenue,
            },
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
