//! # Evolution Recorder (C7)
//!
//! Append-only snapshotting for time-series reporting (spec.md §4.7). Pure
//! read/write against the store; never feeds back into C2.

use crate::entities::{EvolutionSnapshot, Optimization};
use crate::store::Store;
use engine_core::{Result, ShopId};
use std::sync::Arc;
use uuid::Uuid;

pub struct EvolutionRecorder {
    store: Arc<dyn Store>,
    snapshot_interval_impressions: u64,
}

impl EvolutionRecorder {
    pub fn new(store: Arc<dyn Store>, snapshot_interval_impressions: u64) -> Self {
        Self {
            store,
            snapshot_interval_impressions,
        }
    }

    /// Appends a snapshot unconditionally — called at every allocation
    /// update (spec.md §4.7).
    pub async fn record(&self, shop: &ShopId, optimization: &Optimization) -> Result<()> {
        let snapshot = Self::build_snapshot(shop, optimization);
        self.store.insert_snapshots(&[snapshot]).await
    }

    /// Appends a snapshot only if `impressions` has crossed another
    /// multiple of the configured interval since the last recorded value —
    /// used by batch simulation (spec.md §4.7's "every 100 impressions").
    pub async fn record_if_due(&self, shop: &ShopId, optimization: &Optimization, previous_impressions: i64) -> Result<()> {
        let interval = self.snapshot_interval_impressions as i64;
        if interval <= 0 {
            return Ok(());
        }
        let crossed = optimization.aggregates.impressions / interval > previous_impressions / interval;
        if crossed {
            self.record(shop, optimization).await?;
        }
        Ok(())
    }

    fn build_snapshot(shop: &ShopId, optimization: &Optimization) -> EvolutionSnapshot {
        use crate::entities::Variant;

        EvolutionSnapshot {
            id: Uuid::new_v4(),
            shop: shop.clone(),
            optimization_id: optimization.id,
            impressions: optimization.aggregates.impressions,
            control_impressions: optimization.aggregates.control_impressions,
            variant_impressions: optimization.aggregates.variant_impressions,
            control_conversions: optimization.aggregates.control_conversions,
            variant_conversions: optimization.aggregates.variant_conversions,
            control_revenue: optimization.aggregates.control_revenue,
            variant_revenue: optimization.aggregates.variant_revenue,
            control_rpv: optimization.aggregates.rpv(Variant::Control),
            variant_rpv: optimization.aggregates.rpv(Variant::Variant),
            control_allocation: optimization.control_allocation,
            variant_allocation: optimization.variant_allocation,
            recorded_at: chrono::Utc::now(),
        }
    }
}
