//! # Store (C1)
//!
//! Durable persistence for every entity in [`crate::entities`], with strict
//! shop-scoping: every read and write filters on `shop`, and `update_*`
//! silently drops any attempt to change the `shop` column of an existing row
//! (the cross-tenant-reassignment guard named in spec.md §4.1).
//!
//! Grounded on the teacher's `ProductRepository`/`PostgresProductRepository`
//! split (crates/master-data/src/product/repository.rs): a trait named by
//! the domain operations it supports, with a single Postgres implementation
//! holding a shared [`DatabasePool`].

use crate::entities::{
    EvolutionSnapshot, Optimization, OptimizationConversion, OptimizationImpression, OptimizationRow, OptimizationStatus,
    OptimizationType, Product, SessionAssignment, Shop,
};
use async_trait::async_trait;
use engine_core::{DatabasePool, Error, OptimizationId, ProductId, Result, ShopId};

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_shop(&self, shop: &ShopId) -> Result<Option<Shop>>;
    async fn put_shop(&self, shop: &Shop) -> Result<()>;

    async fn get_product(&self, shop: &ShopId, id: ProductId) -> Result<Option<Product>>;
    async fn get_product_by_external_id(&self, shop: &ShopId, external_product_id: &str) -> Result<Option<Product>>;
    async fn put_product(&self, product: &Product) -> Result<Product>;
    async fn update_product(&self, product: &Product) -> Result<Product>;
    async fn delete_product(&self, shop: &ShopId, id: ProductId) -> Result<()>;

    async fn get_optimization(&self, shop: &ShopId, id: OptimizationId) -> Result<Option<Optimization>>;
    async fn put_optimization(&self, optimization: &Optimization) -> Result<Optimization>;
    async fn update_optimization(&self, optimization: &Optimization) -> Result<Optimization>;
    async fn delete_optimization(&self, shop: &ShopId, id: OptimizationId) -> Result<()>;

    async fn active_optimizations_by_product(
        &self,
        shop: &ShopId,
        product_id: ProductId,
        optimization_type: Option<OptimizationType>,
    ) -> Result<Vec<Optimization>>;

    async fn active_optimizations_for_shop(&self, shop: &ShopId) -> Result<Vec<Optimization>>;

    async fn get_session_assignment(
        &self,
        shop: &ShopId,
        session_id: &str,
        optimization_id: OptimizationId,
    ) -> Result<Option<SessionAssignment>>;
    async fn get_session_assignments(&self, shop: &ShopId, session_id: &str) -> Result<Vec<SessionAssignment>>;
    async fn put_session_assignment(&self, assignment: &SessionAssignment) -> Result<SessionAssignment>;

    async fn insert_impressions(&self, impressions: &[OptimizationImpression]) -> Result<()>;
    async fn insert_conversions(&self, conversions: &[OptimizationConversion]) -> Result<()>;
    async fn insert_snapshots(&self, snapshots: &[EvolutionSnapshot]) -> Result<()>;

    /// Increments `impressions`/`{arm}_impressions` atomically (one `UPDATE
    /// ... SET x = x + 1`); this is the serializability mechanism named in
    /// spec.md §5.
    async fn bump_impression_counters(&self, shop: &ShopId, optimization_id: OptimizationId, variant: crate::entities::Variant) -> Result<()>;

    /// Increments conversion/revenue counters atomically and returns the
    /// optimization afterward so the caller can recompute ARPU.
    async fn bump_conversion_counters(
        &self,
        shop: &ShopId,
        optimization_id: OptimizationId,
        variant: crate::entities::Variant,
        revenue: rust_decimal::Decimal,
    ) -> Result<Optimization>;

    /// Order-id dedup (spec.md §9 Open Question 1 / DESIGN.md): returns
    /// `true` if this is the first time this order has been seen for this
    /// shop, inserting the dedup row atomically if so.
    async fn mark_order_processed(&self, shop: &ShopId, external_order_id: &str) -> Result<bool>;

    /// Idempotent tenant purge, deleting in FK-safe order.
    async fn delete_all_shop_data(&self, shop: &ShopId) -> Result<()>;
}

pub struct PostgresStore {
    db: DatabasePool,
}

impl PostgresStore {
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    fn pool(&self) -> &sqlx::PgPool {
        &self.db.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_shop(&self, shop: &ShopId) -> Result<Option<Shop>> {
        let row = sqlx::query_as!(
            Shop,
            r#"SELECT shop as "shop: _", created_at, updated_at FROM shops WHERE shop = $1"#,
            shop.0
        )
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn put_shop(&self, shop: &Shop) -> Result<()> {
        sqlx::query!(
            r#"
            INSERT INTO shops (shop, created_at, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (shop) DO NOTHING
            "#,
            shop.shop.0,
            shop.created_at,
            shop.updated_at,
        )
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_product(&self, shop: &ShopId, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query_as!(
            Product,
            r#"
            SELECT id as "id: _", shop as "shop: _", external_product_id, title, description, price,
                   images, variants, created_at, updated_at
            FROM products WHERE shop = $1 AND id = $2
            "#,
            shop.0,
            id.0,
        )
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn get_product_by_external_id(&self, shop: &ShopId, external_product_id: &str) -> Result<Option<Product>> {
        let row = sqlx::query_as!(
            Product,
            r#"
            SELECT id as "id: _", shop as "shop: _", external_product_id, title, description, price,
                   images, variants, created_at, updated_at
            FROM products WHERE shop = $1 AND external_product_id = $2
            "#,
            shop.0,
            external_product_id,
        )
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn put_product(&self, product: &Product) -> Result<Product> {
        sqlx::query!(
            r#"
            INSERT INTO products (id, shop, external_product_id, title, description, price, images, variants, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            product.id.0,
            product.shop.0,
            product.external_product_id,
            product.title,
            product.description,
            product.price,
            product.images,
            product.variants,
            product.created_at,
            product.updated_at,
        )
        .execute(self.pool())
        .await?;
        Ok(product.clone())
    }

    async fn update_product(&self, product: &Product) -> Result<Product> {
        // `shop` is intentionally absent from the SET list — updates can
        // never move a product to a different tenant.
        sqlx::query!(
            r#"
            UPDATE products
            SET title = $3, description = $4, price = $5, images = $6, variants = $7, updated_at = $8
            WHERE shop = $1 AND id = $2
            "#,
            product.shop.0,
            product.id.0,
            product.title,
            product.description,
            product.price,
            product.images,
            product.variants,
            product.updated_at,
        )
        .execute(self.pool())
        .await?;
        Ok(product.clone())
    }

    async fn delete_product(&self, shop: &ShopId, id: ProductId) -> Result<()> {
        sqlx::query!("DELETE FROM products WHERE shop = $1 AND id = $2", shop.0, id.0)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn get_optimization(&self, shop: &ShopId, id: OptimizationId) -> Result<Option<Optimization>> {
        let row = self.fetch_optimization_row(shop, id).await?;
        row.map(Optimization::try_from).transpose()
    }

    async fn put_optimization(&self, optimization: &Optimization) -> Result<Optimization> {
        let bayesian_state = serde_json::to_value(&optimization.bayesian_state)?;
        sqlx::query!(
            r#"
            INSERT INTO optimizations (
                id, shop, product_id, optimization_type, control_data, variant_data, status,
                control_allocation, variant_allocation, bayesian_state,
                impressions, control_impressions, variant_impressions,
                conversions, control_conversions, variant_conversions,
                revenue, control_revenue, variant_revenue,
                start_date, end_date, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21,$22,$23)
            "#,
            optimization.id.0,
            optimization.shop.0,
            optimization.product_id.0,
            optimization.optimization_type as _,
            optimization.control_data,
            optimization.variant_data,
            optimization.status as _,
            optimization.control_allocation,
            optimization.variant_allocation,
            bayesian_state,
            optimization.aggregates.impressions,
            optimization.aggregates.control_impressions,
            optimization.aggregates.variant_impressions,
            optimization.aggregates.conversions,
            optimization.aggregates.control_conversions,
            optimization.aggregates.variant_conversions,
            optimization.aggregates.revenue,
            optimization.aggregates.control_revenue,
            optimization.aggregates.variant_revenue,
            optimization.start_date,
            optimization.end_date,
            optimization.created_at,
            optimization.updated_at,
        )
        .execute(self.pool())
        .await?;
        Ok(optimization.clone())
    }

    async fn update_optimization(&self, optimization: &Optimization) -> Result<Optimization> {
        let bayesian_state = serde_json::to_value(&optimization.bayesian_state)?;
        sqlx::query!(
            r#"
            UPDATE optimizations SET
                control_data = $3, variant_data = $4, status = $5,
                control_allocation = $6, variant_allocation = $7, bayesian_state = $8,
                impressions = $9, control_impressions = $10, variant_impressions = $11,
                conversions = $12, control_conversions = $13, variant_conversions = $14,
                revenue = $15, control_revenue = $16, variant_revenue = $17,
                start_date = $18, end_date = $19, updated_at = $20
            WHERE shop = $1 AND id = $2
            "#,
            optimization.shop.0,
            optimization.id.0,
            optimization.control_data,
            optimization.variant_data,
            optimization.status as _,
            optimization.control_allocation,
            optimization.variant_allocation,
            bayesian_state,
            optimization.aggregates.impressions,
            optimization.aggregates.control_impressions,
            optimization.aggregates.variant_impressions,
            optimization.aggregates.conversions,
            optimization.aggregates.control_conversions,
            optimization.aggregates.variant_conversions,
            optimization.aggregates.revenue,
            optimization.aggregates.control_revenue,
            optimization.aggregates.variant_revenue,
            optimization.start_date,
            optimization.end_date,
            optimization.updated_at,
        )
        .execute(self.pool())
        .await?;
        Ok(optimization.clone())
    }

    async fn delete_optimization(&self, shop: &ShopId, id: OptimizationId) -> Result<()> {
        sqlx::query!("DELETE FROM optimizations WHERE shop = $1 AND id = $2", shop.0, id.0)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn active_optimizations_by_product(
        &self,
        shop: &ShopId,
        product_id: ProductId,
        optimization_type: Option<OptimizationType>,
    ) -> Result<Vec<Optimization>> {
        let rows = sqlx::query_as!(
            OptimizationRow,
            r#"
            SELECT id as "id: _", shop as "shop: _", product_id as "product_id: _",
                   optimization_type as "optimization_type: _", control_data, variant_data,
                   status as "status: _", control_allocation, variant_allocation, bayesian_state,
                   impressions, control_impressions, variant_impressions,
                   conversions, control_conversions, variant_conversions,
                   revenue, control_revenue, variant_revenue,
                   start_date, end_date, created_at, updated_at
            FROM optimizations
            WHERE shop = $1 AND product_id = $2 AND status = 'active'
              AND ($3::optimization_type IS NULL OR optimization_type = $3)
            "#,
            shop.0,
            product_id.0,
            optimization_type as _,
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(Optimization::try_from).collect()
    }

    async fn active_optimizations_for_shop(&self, shop: &ShopId) -> Result<Vec<Optimization>> {
        let rows = sqlx::query_as!(
            OptimizationRow,
            r#"
            SELECT id as "id: _", shop as "shop: _", product_id as "product_id: _",
                   optimization_type as "optimization_type: _", control_data, variant_data,
                   status as "status: _", control_allocation, variant_allocation, bayesian_state,
                   impressions, control_impressions, variant_impressions,
                   conversions, control_conversions, variant_conversions,
                   revenue, control_revenue, variant_revenue,
                   start_date, end_date, created_at, updated_at
            FROM optimizations
            WHERE shop = $1 AND status = 'active'
            "#,
            shop.0,
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(Optimization::try_from).collect()
    }

    async fn get_session_assignment(
        &self,
        shop: &ShopId,
        session_id: &str,
        optimization_id: OptimizationId,
    ) -> Result<Option<SessionAssignment>> {
        let row = sqlx::query_as!(
            SessionAssignment,
            r#"
            SELECT id as "id: _", shop as "shop: _", session_id, optimization_id as "optimization_id: _",
                   variant as "variant: _", created_at, expires_at
            FROM session_assignments
            WHERE shop = $1 AND session_id = $2 AND optimization_id = $3
            "#,
            shop.0,
            session_id,
            optimization_id.0,
        )
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    async fn get_session_assignments(&self, shop: &ShopId, session_id: &str) -> Result<Vec<SessionAssignment>> {
        let rows = sqlx::query_as!(
            SessionAssignment,
            r#"
            SELECT id as "id: _", shop as "shop: _", session_id, optimization_id as "optimization_id: _",
                   variant as "variant: _", created_at, expires_at
            FROM session_assignments
            WHERE shop = $1 AND session_id = $2 AND expires_at > now()
            "#,
            shop.0,
            session_id,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    async fn put_session_assignment(&self, assignment: &SessionAssignment) -> Result<SessionAssignment> {
        // Uniqueness on (shop, session_id, optimization_id) makes concurrent
        // duplicate inserts collapse to the first writer (spec.md §5) — but
        // only while the existing row is still live. An `ON CONFLICT DO
        // UPDATE ... WHERE` filter would skip the update (and the
        // `RETURNING` row) entirely for the unexpired case, starving
        // `fetch_one` below, so the CASE expressions always perform the
        // UPDATE and RETURNING fires every time; they just choose between
        // the old and new values depending on whether the existing row has
        // expired. An expired row is replaced wholesale (fresh id, variant,
        // timestamps); a live row is left untouched.
        let row = sqlx::query_as!(
            SessionAssignment,
            r#"
            INSERT INTO session_assignments (id, shop, session_id, optimization_id, variant, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (shop, session_id, optimization_id) DO UPDATE SET
                id = CASE WHEN session_assignments.expires_at <= now() THEN EXCLUDED.id ELSE session_assignments.id END,
                variant = CASE WHEN session_assignments.expires_at <= now() THEN EXCLUDED.variant ELSE session_assignments.variant END,
                created_at = CASE WHEN session_assignments.expires_at <= now() THEN EXCLUDED.created_at ELSE session_assignments.created_at END,
                expires_at = CASE WHEN session_assignments.expires_at <= now() THEN EXCLUDED.expires_at ELSE session_assignments.expires_at END
            RETURNING id as "id: _", shop as "shop: _", session_id, optimization_id as "optimization_id: _",
                      variant as "variant: _", created_at, expires_at
            "#,
            assignment.id.0,
            assignment.shop.0,
            assignment.session_id,
            assignment.optimization_id.0,
            assignment.variant as _,
            assignment.created_at,
            assignment.expires_at,
        )
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// One `UNNEST`-based multi-row statement per chunk rather than one
    /// round trip per row (spec.md §5's batch-write requirement).
    async fn insert_impressions(&self, impressions: &[OptimizationImpression]) -> Result<()> {
        if impressions.is_empty() {
            return Ok(());
        }
        let mut tx = self.db.pool.begin().await?;
        for chunk in impressions.chunks(10_000) {
            let ids: Vec<uuid::Uuid> = chunk.iter().map(|i| i.id).collect();
            let shops: Vec<String> = chunk.iter().map(|i| i.shop.0.clone()).collect();
            let optimization_ids: Vec<uuid::Uuid> = chunk.iter().map(|i| i.optimization_id.0).collect();
            let session_ids: Vec<String> = chunk.iter().map(|i| i.session_id.clone()).collect();
            let variants: Vec<crate::entities::Variant> = chunk.iter().map(|i| i.variant).collect();
            let contexts: Vec<serde_json::Value> = chunk.iter().map(|i| i.context.clone()).collect();
            let recorded_ats: Vec<chrono::DateTime<chrono::Utc>> = chunk.iter().map(|i| i.recorded_at).collect();

            sqlx::query!(
                r#"
                INSERT INTO optimization_impressions (id, shop, optimization_id, session_id, variant, context, recorded_at)
                SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::uuid[], $4::text[], $5::variant_arm[], $6::jsonb[], $7::timestamptz[])
                "#,
                &ids,
                &shops,
                &optimization_ids,
                &session_ids,
                &variants as _,
                &contexts,
                &recorded_ats,
            )
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Same batching as `insert_impressions` (spec.md §5).
    async fn insert_conversions(&self, conversions: &[OptimizationConversion]) -> Result<()> {
        if conversions.is_empty() {
            return Ok(());
        }
        let mut tx = self.db.pool.begin().await?;
        for chunk in conversions.chunks(10_000) {
            let ids: Vec<uuid::Uuid> = chunk.iter().map(|c| c.id).collect();
            let shops: Vec<String> = chunk.iter().map(|c| c.shop.0.clone()).collect();
            let optimization_ids: Vec<uuid::Uuid> = chunk.iter().map(|c| c.optimization_id.0).collect();
            let session_ids: Vec<String> = chunk.iter().map(|c| c.session_id.clone()).collect();
            let variants: Vec<crate::entities::Variant> = chunk.iter().map(|c| c.variant).collect();
            let revenues: Vec<rust_decimal::Decimal> = chunk.iter().map(|c| c.revenue).collect();
            let order_external_ids: Vec<String> = chunk.iter().map(|c| c.order_external_id.clone()).collect();
            let recorded_ats: Vec<chrono::DateTime<chrono::Utc>> = chunk.iter().map(|c| c.recorded_at).collect();

            sqlx::query!(
                r#"
                INSERT INTO optimization_conversions
                    (id, shop, optimization_id, session_id, variant, revenue, order_external_id, recorded_at)
                SELECT * FROM UNNEST(
                    $1::uuid[], $2::text[], $3::uuid[], $4::text[], $5::variant_arm[],
                    $6::numeric[], $7::text[], $8::timestamptz[]
                )
                "#,
                &ids,
                &shops,
                &optimization_ids,
                &session_ids,
                &variants as _,
                &revenues,
                &order_external_ids,
                &recorded_ats,
            )
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_snapshots(&self, snapshots: &[EvolutionSnapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let mut tx = self.db.pool.begin().await?;
        for chunk in snapshots.chunks(10_000) {
            for snapshot in chunk {
                sqlx::query!(
                    r#"
                    INSERT INTO optimization_evolution_snapshots
                        (id, shop, optimization_id, impressions, control_impressions, variant_impressions,
                         control_conversions, variant_conversions, control_revenue, variant_revenue,
                         control_rpv, variant_rpv, control_allocation, variant_allocation, recorded_at)
                    VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
                    "#,
                    snapshot.id,
                    snapshot.shop.0,
                    snapshot.optimization_id.0,
                    snapshot.impressions,
                    snapshot.control_impressions,
                    snapshot.variant_impressions,
                    snapshot.control_conversions,
                    snapshot.variant_conversions,
                    snapshot.control_revenue,
                    snapshot.variant_revenue,
                    snapshot.control_rpv,
                    snapshot.variant_rpv,
                    snapshot.control_allocation,
                    snapshot.variant_allocation,
                    snapshot.recorded_at,
                )
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn bump_impression_counters(&self, shop: &ShopId, optimization_id: OptimizationId, variant: crate::entities::Variant) -> Result<()> {
        use crate::entities::Variant as V;
        match variant {
            V::Control => {
                sqlx::query!(
                    r#"
                    UPDATE optimizations
                    SET impressions = impressions + 1, control_impressions = control_impressions + 1, updated_at = now()
                    WHERE shop = $1 AND id = $2 AND status = 'active'
                    "#,
                    shop.0,
                    optimization_id.0,
                )
                .execute(self.pool())
                .await?;
            }
            V::Variant => {
                sqlx::query!(
                    r#"
                    UPDATE optimizations
                    SET impressions = impressions + 1, variant_impressions = variant_impressions + 1, updated_at = now()
                    WHERE shop = $1 AND id = $2 AND status = 'active'
                    "#,
                    shop.0,
                    optimization_id.0,
                )
                .execute(self.pool())
                .await?;
            }
        }
        Ok(())
    }

    async fn bump_conversion_counters(
        &self,
        shop: &ShopId,
        optimization_id: OptimizationId,
        variant: crate::entities::Variant,
        revenue: rust_decimal::Decimal,
    ) -> Result<Optimization> {
        use crate::entities::Variant as V;
        match variant {
            V::Control => {
                sqlx::query!(
                    r#"
                    UPDATE optimizations
                    SET conversions = conversions + 1, control_conversions = control_conversions + 1,
                        revenue = revenue + $3, control_revenue = control_revenue + $3, updated_at = now()
                    WHERE shop = $1 AND id = $2
                    "#,
                    shop.0,
                    optimization_id.0,
                    revenue,
                )
                .execute(self.pool())
                .await?;
            }
            V::Variant => {
                sqlx::query!(
                    r#"
                    UPDATE optimizations
                    SET conversions = conversions + 1, variant_conversions = variant_conversions + 1,
                        revenue = revenue + $3, variant_revenue = variant_revenue + $3, updated_at = now()
                    WHERE shop = $1 AND id = $2
                    "#,
                    shop.0,
                    optimization_id.0,
                    revenue,
                )
                .execute(self.pool())
                .await?;
            }
        }

        self.get_optimization(shop, optimization_id)
            .await?
            .ok_or_else(|| Error::not_found("optimization disappeared during conversion crediting"))
    }

    async fn mark_order_processed(&self, shop: &ShopId, external_order_id: &str) -> Result<bool> {
        let result = sqlx::query!(
            r#"
            INSERT INTO processed_orders (shop, external_order_id, processed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (shop, external_order_id) DO NOTHING
            "#,
            shop.0,
            external_order_id,
        )
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_all_shop_data(&self, shop: &ShopId) -> Result<()> {
        let mut tx = self.db.pool.begin().await?;
        sqlx::query!("DELETE FROM optimization_evolution_snapshots WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query!("DELETE FROM optimization_conversions WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query!("DELETE FROM optimization_impressions WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query!("DELETE FROM session_assignments WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query!("DELETE FROM optimizations WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query!("DELETE FROM products WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query!("DELETE FROM processed_orders WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query!("DELETE FROM shops WHERE shop = $1", shop.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

impl PostgresStore {
    async fn fetch_optimization_row(&self, shop: &ShopId, id: OptimizationId) -> Result<Option<OptimizationRow>> {
        let row = sqlx::query_as!(
            OptimizationRow,
            r#"
            SELECT id as "id: _", shop as "shop: _", product_id as "product_id: _",
                   optimization_type as "optimization_type: _", control_data, variant_data,
                   status as "status: _", control_allocation, variant_allocation, bayesian_state,
                   impressions, control_impressions, variant_impressions,
                   conversions, control_conversions, variant_conversions,
                   revenue, control_revenue, variant_revenue,
                   start_date, end_date, created_at, updated_at
            FROM optimizations
            WHERE shop = $1 AND id = $2
            "#,
            shop.0,
            id.0,
        )
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }
}
