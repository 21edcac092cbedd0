//! Shared fixtures for the scenario suite. Mirrors the teacher's
//! `crates/auth/tests/integration/common.rs` `TestContext` pattern: a real
//! Postgres pool from `DATABASE_URL`, migrated once, with a throwaway shop
//! per test so runs never collide.

use engine_core::{DatabasePool, OptimizationId, ProductId, ShopId};
use engine_domain::{CatalogClient, Optimization, OptimizationStatus, OptimizationType, Product, ProductVariantOption, Store};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestContext {
    pub db: DatabasePool,
    pub store: Arc<dyn Store>,
    pub shop: ShopId,
}

impl TestContext {
    /// Requires `DATABASE_URL` to point at a disposable Postgres instance
    /// with this crate's migrations already applied (or applies them here).
    pub async fn new() -> Self {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set to run scenario tests");
        let config = engine_core::DatabaseConfig {
            url,
            max_connections: 5,
            min_connections: 1,
        };
        let db = DatabasePool::new(config).await.expect("failed to connect to test database");
        db.run_migrations().await.expect("failed to run migrations");

        let store: Arc<dyn Store> = Arc::new(engine_domain::PostgresStore::new(db.clone()));

        let shop = ShopId(format!("test-shop-{}", Uuid::new_v4()));
        store.put_shop(&engine_domain::Shop::new(shop.clone())).await.expect("failed to seed shop");

        Self { db, store, shop }
    }

    pub async fn cleanup(&self) {
        let _ = self.store.delete_all_shop_data(&self.shop).await;
    }

    pub async fn seed_product(&self, price: Decimal) -> Product {
        let product = Product::new(self.shop.clone(), Uuid::new_v4().to_string(), "Test Product".to_string(), "A widget".to_string(), price);
        self.store.put_product(&product).await.expect("failed to seed product")
    }

    pub async fn seed_draft_optimization(&self, product_id: ProductId, optimization_type: OptimizationType) -> Optimization {
        let now = chrono::Utc::now();
        let optimization = Optimization {
            id: OptimizationId::new(),
            shop: self.shop.clone(),
            product_id,
            optimization_type,
            control_data: serde_json::json!({"variants": []}),
            variant_data: serde_json::json!({"variants": []}),
            status: OptimizationStatus::Draft,
            control_allocation: 50.0,
            variant_allocation: 50.0,
            bayesian_state: engine_domain::seed_state(engine_domain::RiskMode::Balanced, Decimal::from(50), 50),
            aggregates: engine_domain::ArmAggregates::default(),
            start_date: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        };
        self.store.put_optimization(&optimization).await.expect("failed to seed optimization")
    }
}

/// No-op catalog collaborator — these scenarios exercise title/description
/// optimizations, which never call the catalog.
pub struct NoopCatalogClient;

#[async_trait::async_trait]
impl CatalogClient for NoopCatalogClient {
    async fn apply_variant_prices(&self, _shop: &ShopId, _external_product_id: &str, _variants: &[ProductVariantOption]) -> engine_core::Result<()> {
        Ok(())
    }

    async fn restore_prices(&self, _shop: &ShopId, _external_product_id: &str, _variants: &[ProductVariantOption]) -> engine_core::Result<()> {
        Ok(())
    }
}
