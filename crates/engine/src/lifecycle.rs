//! # Lifecycle Controller (C4)
//!
//! The Optimization state machine (spec.md §4.3), with the external
//! catalog-mutation collaborator injected the way the teacher injects
//! `Arc<dyn AIEngine>`/`Arc<dyn PricingEngine>` into `DefaultProductService`.

use crate::bayesian::{seed_state, BayesianEngine, Verdict};
use crate::entities::{Optimization, OptimizationStatus, OptimizationType, ProductVariantOption, RiskMode};
use crate::store::Store;
use async_trait::async_trait;
use engine_core::{Error, OptimizationId, Result, ShopId};
use rand::rngs::StdRng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Catalog calls are retried this many times (attempts, not retries) before
/// the transition is abandoned (spec.md §5's "retriable up to a small
/// bound").
const CATALOG_MAX_ATTEMPTS: u32 = 3;
const CATALOG_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// External catalog-mutation collaborator (spec.md §6). Idempotent by
/// contract; the lifecycle controller retries a failing call up to
/// `CATALOG_MAX_ATTEMPTS` times before aborting the transition (spec.md §5).
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn apply_variant_prices(&self, shop: &ShopId, external_product_id: &str, variants: &[ProductVariantOption]) -> Result<()>;
    async fn restore_prices(&self, shop: &ShopId, external_product_id: &str, variants: &[ProductVariantOption]) -> Result<()>;
}

pub struct LifecycleController {
    store: Arc<dyn Store>,
    catalog: Arc<dyn CatalogClient>,
    bayesian: BayesianEngine,
}

impl LifecycleController {
    pub fn new(store: Arc<dyn Store>, catalog: Arc<dyn CatalogClient>, min_sample_size: u32, allocation_smoothing: f64) -> Self {
        Self {
            store,
            catalog,
            bayesian: BayesianEngine::new(min_sample_size, allocation_smoothing),
        }
    }

    /// `activate`: source status must be `draft`; refuses a conflicting
    /// active optimization for the same (product, type); seeds Bayesian
    /// state from product price; for price-type optimizations, instructs
    /// the catalog collaborator before committing.
    pub async fn activate(&self, shop: &ShopId, optimization_id: OptimizationId, risk_mode: RiskMode, safety_budget: i32) -> Result<Optimization> {
        let mut optimization = self.require(shop, optimization_id).await?;

        if optimization.status != OptimizationStatus::Draft {
            return Err(Error::state_conflict(format!(
                "optimization {optimization_id} is not in draft status"
            )));
        }

        let conflicting = self
            .store
            .active_optimizations_by_product(shop, optimization.product_id, Some(optimization.optimization_type))
            .await?;
        if let Some(existing) = conflicting.first() {
            return Err(Error::state_conflict(format!(
                "optimization {} is already active for this product and type",
                existing.id
            )));
        }

        let product = self
            .store
            .get_product(shop, optimization.product_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("product {} not found", optimization.product_id)))?;

        if optimization.optimization_type == OptimizationType::Price {
            let variants: Vec<ProductVariantOption> = serde_json::from_value(optimization.variant_data.clone())
                .map_err(|e| Error::invalid_argument(format!("variant_data is not a price payload: {e}")))?;
            Self::retry_catalog_call(|| self.catalog.apply_variant_prices(shop, &product.external_product_id, &variants))
                .await
                .map_err(|e| Error::collaborator_failure(format!("catalog apply_variant_prices failed: {e}")))?;
        }

        optimization.status = OptimizationStatus::Active;
        optimization.bayesian_state = seed_state(risk_mode, product.price, safety_budget);
        optimization.start_date = Some(chrono::Utc::now());
        optimization.updated_at = chrono::Utc::now();

        self.store.update_optimization(&optimization).await
    }

    /// `deactivate` (completed): source must be `active`; for price-type,
    /// restores control prices.
    pub async fn deactivate(&self, shop: &ShopId, optimization_id: OptimizationId) -> Result<Optimization> {
        let mut optimization = self.require(shop, optimization_id).await?;

        if optimization.status != OptimizationStatus::Active {
            return Err(Error::state_conflict(format!("optimization {optimization_id} is not active")));
        }

        if optimization.optimization_type == OptimizationType::Price {
            let product = self
                .store
                .get_product(shop, optimization.product_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("product {} not found", optimization.product_id)))?;
            let variants: Vec<ProductVariantOption> = serde_json::from_value(optimization.control_data.clone())
                .map_err(|e| Error::invalid_argument(format!("control_data is not a price payload: {e}")))?;
            Self::retry_catalog_call(|| self.catalog.restore_prices(shop, &product.external_product_id, &variants))
                .await
                .map_err(|e| Error::collaborator_failure(format!("catalog restore_prices failed: {e}")))?;
        }

        optimization.status = OptimizationStatus::Completed;
        optimization.end_date = Some(chrono::Utc::now());
        optimization.updated_at = chrono::Utc::now();

        self.store.update_optimization(&optimization).await
    }

    pub async fn pause(&self, shop: &ShopId, optimization_id: OptimizationId) -> Result<Optimization> {
        let mut optimization = self.require(shop, optimization_id).await?;
        if optimization.status != OptimizationStatus::Active {
            return Err(Error::state_conflict(format!("optimization {optimization_id} is not active")));
        }
        optimization.status = OptimizationStatus::Paused;
        optimization.updated_at = chrono::Utc::now();
        self.store.update_optimization(&optimization).await
    }

    pub async fn resume(&self, shop: &ShopId, optimization_id: OptimizationId) -> Result<Optimization> {
        let mut optimization = self.require(shop, optimization_id).await?;
        if optimization.status != OptimizationStatus::Paused {
            return Err(Error::state_conflict(format!("optimization {optimization_id} is not paused")));
        }
        optimization.status = OptimizationStatus::Active;
        optimization.updated_at = chrono::Utc::now();
        self.store.update_optimization(&optimization).await
    }

    /// Asks C2 for an updated allocation/verdict and persists both the new
    /// allocation and the Bayesian state atomically with any status change
    /// (spec.md §4.3's "all transitions persist... atomically").
    pub async fn recompute_allocation(&self, shop: &ShopId, optimization_id: OptimizationId, rng: &mut StdRng) -> Result<Optimization> {
        let mut optimization = self.require(shop, optimization_id).await?;

        if optimization.status != OptimizationStatus::Active {
            return Ok(optimization);
        }

        let update = self.bayesian.update(
            &optimization.aggregates,
            optimization.control_allocation,
            optimization.variant_allocation,
            &optimization.bayesian_state,
            rng,
        );

        optimization.control_allocation = update.control_allocation;
        optimization.variant_allocation = update.variant_allocation;
        optimization.bayesian_state = update.new_state;
        optimization.updated_at = chrono::Utc::now();

        match update.verdict {
            Verdict::Promote => {
                optimization.status = OptimizationStatus::Completed;
                optimization.end_date = Some(chrono::Utc::now());
            }
            Verdict::Stop => {
                optimization.status = OptimizationStatus::Cancelled;
                optimization.end_date = Some(chrono::Utc::now());
            }
            Verdict::Continue => {}
        }

        self.store.update_optimization(&optimization).await
    }

    async fn require(&self, shop: &ShopId, optimization_id: OptimizationId) -> Result<Optimization> {
        self.store
            .get_optimization(shop, optimization_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("optimization {optimization_id} not found")))
    }

    /// Retries a catalog collaborator call up to `CATALOG_MAX_ATTEMPTS`
    /// times with linear backoff before giving up; the caller still maps the
    /// final error to `CollaboratorFailure`.
    async fn retry_catalog_call<F, Fut>(mut call: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= CATALOG_MAX_ATTEMPTS => return Err(e),
                Err(_) => {
                    tokio::time::sleep(CATALOG_RETRY_BASE_DELAY * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}
