//! Product — `(shop, external_product_id)` unique. Mutated only by the
//! catalog-sync collaborator; the experimentation engine only reads it.

use chrono::{DateTime, Utc};
use engine_core::{ProductId, ShopId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProductVariantOption {
    pub id: String,
    pub price: Decimal,
    pub cost: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: ProductId,
    pub shop: ShopId,
    pub external_product_id: String,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub images: serde_json::Value,
    pub variants: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(shop: ShopId, external_product_id: String, title: String, description: String, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            shop,
            external_product_id,
            title,
            description,
            price,
            images: serde_json::Value::Array(Vec::new()),
            variants: serde_json::Value::Array(Vec::new()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn image_list(&self) -> Vec<String> {
        self.images
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn variant_options(&self) -> Vec<ProductVariantOption> {
        serde_json::from_value(self.variants.clone()).unwrap_or_default()
    }
}
