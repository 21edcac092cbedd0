//! Shop — the tenant isolator. Every other entity in this crate carries a
//! `shop` column and every store query filters on it explicitly.

use chrono::{DateTime, Utc};
use engine_core::ShopId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shop {
    pub shop: ShopId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    pub fn new(shop: ShopId) -> Self {
        let now = Utc::now();
        Self {
            shop,
            created_at: now,
            updated_at: now,
        }
    }
}
