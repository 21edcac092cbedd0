//! SessionAssignment — `(shop, session_id, optimization_id)` pinning to a
//! variant. Created on first assignment, immutable, expires at +90 days.

use super::optimization::Variant;
use chrono::{DateTime, Utc};
use engine_core::{OptimizationId, SessionAssignmentId, ShopId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SessionAssignment {
    pub id: SessionAssignmentId,
    pub shop: ShopId,
    pub session_id: String,
    pub optimization_id: OptimizationId,
    pub variant: Variant,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionAssignment {
    pub fn new(shop: ShopId, session_id: String, optimization_id: OptimizationId, variant: Variant, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: SessionAssignmentId::new(),
            shop,
            session_id,
            optimization_id,
            variant,
            created_at: now,
            expires_at: now + chrono::Duration::days(ttl_days),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
