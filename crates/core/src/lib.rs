pub mod config;
pub mod database;
pub mod error;
pub mod jobs;
pub mod types;

pub use config::{
    AppConfig, CatalogConfig, Config, CorsConfig, DatabaseConfig, EngineConfig, RedisConfig, ServerConfig, WebhookConfig,
};
pub use database::DatabasePool;
pub use error::{Error, ErrorCode, ErrorContext, Result};
pub use jobs::{JobExecutor, JobQueue, RedisJobQueue, SerializableJob};
pub use types::{OptimizationId, ProductId, SessionAssignmentId, ShopId};

// Re-export commonly used types from dependencies
pub use uuid::Uuid;
pub use chrono::{DateTime, Utc};
