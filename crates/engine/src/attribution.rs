//! # Attribution Pipeline (C5)
//!
//! Order webhook → session → assignment → variant reconciliation (spec.md
//! §4.5). Missing products/sessions/assignments are expected and must not
//! surface as errors; only HMAC failures and storage errors do.

use crate::assignment::AssignmentService;
use crate::entities::OptimizationType;
use crate::lifecycle::LifecycleController;
use crate::store::Store;
use engine_core::{Error, OptimizationId, Result, ShopId};
use hmac::{Hmac, Mac};
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineItem {
    pub product_external_id: String,
    pub price: Decimal,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderNoteAttribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    pub id: String,
    pub line_items: Vec<OrderLineItem>,
    pub note_attributes: Vec<OrderNoteAttribute>,
}

/// Verifies an HMAC-SHA256 signature over the exact raw request body,
/// comparing in constant time (spec.md §6). `signature` is the
/// base64-or-hex-encoded header value as sent by the platform.
pub fn verify_webhook_signature(raw_body: &[u8], signature_hex: &str, secret: &str) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| Error::internal(format!("invalid hmac key: {e}")))?;
    mac.update(raw_body);

    let expected = hex::decode(signature_hex).map_err(|_| Error::unauthorized("malformed webhook signature"))?;

    mac.verify_slice(&expected).map_err(|_| Error::unauthorized("webhook signature mismatch"))
}

pub struct AttributionPipeline {
    store: Arc<dyn Store>,
    assignment_service: Arc<AssignmentService>,
    lifecycle: Arc<LifecycleController>,
    session_note_attribute: String,
}

impl AttributionPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        assignment_service: Arc<AssignmentService>,
        lifecycle: Arc<LifecycleController>,
        session_note_attribute: String,
    ) -> Self {
        Self {
            store,
            assignment_service,
            lifecycle,
            session_note_attribute,
        }
    }

    /// Returns the list of optimization ids whose allocation should be
    /// recomputed after crediting (the caller enqueues this — spec.md §9's
    /// "split into a work queue" redesign flag).
    pub async fn process_order(&self, shop: &ShopId, order: &OrderPayload) -> Result<Vec<OptimizationId>> {
        if !self.store.mark_order_processed(shop, &order.id).await? {
            // Already processed: idempotent no-op, not an error.
            return Ok(Vec::new());
        }

        let session_id = match order
            .note_attributes
            .iter()
            .find(|attr| attr.name == self.session_note_attribute)
        {
            Some(attr) => attr.value.clone(),
            None => return Ok(Vec::new()),
        };

        let assignments = self.store.get_session_assignments(shop, &session_id).await?;
        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let assignment_by_optimization: std::collections::HashMap<_, _> =
            assignments.into_iter().map(|a| (a.optimization_id, a.variant)).collect();

        let mut touched_optimizations = Vec::new();

        for line_item in &order.line_items {
            let product = match self.store.get_product_by_external_id(shop, &line_item.product_external_id).await? {
                Some(product) => product,
                None => continue,
            };

            let active_optimizations = self
                .store
                .active_optimizations_by_product(shop, product.id, None::<OptimizationType>)
                .await?;

            for optimization in active_optimizations {
                let variant = match assignment_by_optimization.get(&optimization.id) {
                    Some(variant) => *variant,
                    None => continue,
                };

                let revenue = line_item.price * Decimal::from(line_item.quantity);
                self.assignment_service
                    .record_conversion(shop, optimization.id, &session_id, variant, revenue, &order.id)
                    .await?;

                touched_optimizations.push(optimization.id);
            }
        }

        Ok(touched_optimizations)
    }

    /// Invokes C4 to request a fresh allocation update for each touched
    /// optimization — step 6 of spec.md §4.5.
    pub async fn recompute_touched_allocations(&self, shop: &ShopId, optimization_ids: &[OptimizationId], rng: &mut StdRng) -> Result<()> {
        for optimization_id in optimization_ids {
            self.lifecycle.recompute_allocation(shop, *optimization_id, rng).await?;
        }
        Ok(())
    }
}
