use crate::catalog::HttpCatalogClient;
use engine_core::jobs::{ExecutorConfig, JobExecutor, JobQueue, RedisJobQueue};
use engine_core::{Config, DatabasePool, Error, Result};
use engine_domain::{AssignmentService, AttributionPipeline, CatalogClient, EvolutionRecorder, LifecycleController, PostgresStore, Store};
use redis::aio::ConnectionManager;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: DatabasePool,
    pub redis: ConnectionManager,
    pub store: Arc<dyn Store>,
    pub catalog: Arc<dyn CatalogClient>,
    pub job_queue: Arc<dyn JobQueue>,
}

impl AppState {
    pub fn new(config: Config, db: DatabasePool, redis: ConnectionManager, job_queue: Arc<dyn JobQueue>) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(PostgresStore::new(db.clone()));
        let catalog: Arc<dyn CatalogClient> = Arc::new(HttpCatalogClient::new(&config.catalog)?);

        Ok(Self {
            config,
            db,
            redis,
            store,
            catalog,
            job_queue,
        })
    }

    /// Per-request sticky assignment / impression / conversion service
    /// (C3) — stateless beyond `store`, so a fresh instance per request
    /// costs nothing (mirrors the teacher's `state.customer_service(...)`
    /// per-request construction).
    pub fn assignment_service(&self) -> Arc<AssignmentService> {
        Arc::new(AssignmentService::new(self.store.clone(), self.config.engine.assignment_ttl_days))
    }

    /// Optimization state machine (C4), with the HTTP catalog collaborator
    /// injected.
    pub fn lifecycle(&self) -> Arc<LifecycleController> {
        Arc::new(LifecycleController::new(
            self.store.clone(),
            self.catalog.clone(),
            self.config.engine.default_min_sample_size,
            self.config.engine.allocation_smoothing,
        ))
    }

    /// Order-webhook attribution pipeline (C5).
    pub fn attribution_pipeline(&self) -> AttributionPipeline {
        AttributionPipeline::new(
            self.store.clone(),
            self.assignment_service(),
            self.lifecycle(),
            self.config.webhook.session_note_attribute.clone(),
        )
    }

    /// Evolution snapshot recorder (C7).
    pub fn evolution_recorder(&self) -> EvolutionRecorder {
        EvolutionRecorder::new(self.store.clone(), self.config.engine.snapshot_interval_impressions)
    }

    /// Enqueues a `RecomputeAllocationJob` for each touched optimization
    /// instead of recomputing allocation inline on the webhook's request
    /// path (spec.md §9's "split into a work queue" redesign flag).
    pub async fn enqueue_recompute_allocation(&self, shop: &engine_core::ShopId, optimization_id: engine_core::OptimizationId) -> Result<()> {
        let job = engine_domain::RecomputeAllocationJob::new(shop.clone(), optimization_id);
        let queued = engine_core::jobs::types::QueuedJob::new(&job)
            .map_err(|e| Error::internal(format!("failed to serialize recompute_allocation job: {e}")))?;
        self.job_queue
            .enqueue(queued)
            .await
            .map(|_| ())
            .map_err(|e| Error::internal(format!("failed to enqueue recompute_allocation job: {e}")))
    }
}

/// Builds the job executor wired with the one handler this service
/// registers, and its backing Redis queue. Called once at startup
/// (`main.rs`); the returned `JobExecutor` is started after `AppState` is
/// built so the handler can hold an `Arc<LifecycleController>` built from
/// the same store/catalog the HTTP handlers use.
pub async fn build_job_queue(redis: ConnectionManager) -> Arc<dyn JobQueue> {
    Arc::new(RedisJobQueue::new(redis, "engine:jobs"))
}

pub fn default_executor_config() -> ExecutorConfig {
    ExecutorConfig::default()
}

pub fn new_job_executor(queue: Arc<dyn JobQueue>) -> JobExecutor {
    JobExecutor::new(queue, default_executor_config())
}
