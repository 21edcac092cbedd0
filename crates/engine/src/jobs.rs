//! Background jobs dispatched through `engine_core::jobs` (SPEC_FULL.md
//! §9's "split inline webhook work into a job queue" redesign flag): the
//! webhook handler acknowledges Shopify/BigCommerce immediately after
//! crediting conversions, then enqueues one of these per touched
//! optimization instead of recomputing allocation inline.

use crate::bayesian::production_rng;
use crate::evolution::EvolutionRecorder;
use crate::lifecycle::LifecycleController;
use async_trait::async_trait;
use engine_core::jobs::traits::{JobContext, JobHandlerConfig};
use engine_core::jobs::{JobHandler, JobPriority, JobResult, SerializableJob};
use engine_core::{OptimizationId, ShopId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecomputeAllocationJob {
    pub shop: ShopId,
    pub optimization_id: OptimizationId,
}

impl RecomputeAllocationJob {
    pub fn new(shop: ShopId, optimization_id: OptimizationId) -> Self {
        Self { shop, optimization_id }
    }
}

impl SerializableJob for RecomputeAllocationJob {
    fn job_type(&self) -> &'static str {
        "recompute_allocation"
    }

    fn serialize(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn deserialize(data: &serde_json::Value) -> Result<Box<dyn SerializableJob>, serde_json::Error> {
        let job: RecomputeAllocationJob = serde_json::from_value(data.clone())?;
        Ok(Box::new(job))
    }

    fn priority(&self) -> JobPriority {
        JobPriority::High
    }

    fn max_attempts(&self) -> u32 {
        5
    }
}

/// Registered with `engine_core::jobs::JobExecutor` to actually run
/// [`RecomputeAllocationJob`]s. Draws a fresh OS-seeded generator per job,
/// since production allocation recomputation must not be reproducible
/// (spec.md §4.4).
pub struct RecomputeAllocationHandler {
    lifecycle: Arc<LifecycleController>,
    evolution: Arc<EvolutionRecorder>,
}

impl RecomputeAllocationHandler {
    pub fn new(lifecycle: Arc<LifecycleController>, evolution: Arc<EvolutionRecorder>) -> Self {
        Self { lifecycle, evolution }
    }
}

#[async_trait]
impl JobHandler for RecomputeAllocationHandler {
    fn job_type(&self) -> &'static str {
        "recompute_allocation"
    }

    async fn handle(&self, job_data: &serde_json::Value, _context: &JobContext) -> JobResult {
        let job: RecomputeAllocationJob = match serde_json::from_value(job_data.clone()) {
            Ok(job) => job,
            Err(e) => return JobResult::failed(format!("invalid recompute_allocation payload: {e}")),
        };

        let mut rng = production_rng();
        match self.lifecycle.recompute_allocation(&job.shop, job.optimization_id, &mut rng).await {
            Ok(optimization) => {
                if let Err(e) = self.evolution.record(&job.shop, &optimization).await {
                    return JobResult::retry(format!("allocation recompute succeeded but snapshot failed: {e}"));
                }
                JobResult::success_with_result(serde_json::json!({
                    "optimization_id": optimization.id,
                    "status": optimization.status,
                    "control_allocation": optimization.control_allocation,
                    "variant_allocation": optimization.variant_allocation,
                }))
            }
            Err(e) => JobResult::retry(format!("allocation recompute failed: {e}")),
        }
    }

    fn validate_job_data(&self, job_data: &serde_json::Value) -> Result<(), engine_core::Error> {
        serde_json::from_value::<RecomputeAllocationJob>(job_data.clone())
            .map(|_| ())
            .map_err(|e| engine_core::Error::invalid_argument(format!("invalid recompute_allocation payload: {e}")))
    }

    fn config(&self) -> JobHandlerConfig {
        JobHandlerConfig {
            max_concurrent_jobs: Some(20),
            default_timeout: Some(30),
            default_max_attempts: Some(5),
        }
    }
}
