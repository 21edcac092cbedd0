//! HTTP implementation of `engine_domain::CatalogClient` (spec.md §6's
//! "Catalog mutation" collaborator). The lifecycle controller calls this
//! only for `price`-type optimizations; `title`/`description` optimizations
//! never touch it.

use engine_core::{CatalogConfig, Error, Result, ShopId};
use engine_domain::{CatalogClient, ProductVariantOption};
use std::time::Duration;

pub struct HttpCatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| Error::internal(format!("failed to build catalog http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    async fn put_variant_prices(&self, shop: &ShopId, external_product_id: &str, variants: &[ProductVariantOption]) -> Result<()> {
        let url = format!("{}/shops/{}/products/{}/variants", self.base_url, shop, external_product_id);

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({ "variants": variants }))
            .send()
            .await
            .map_err(|e| Error::collaborator_failure(format!("catalog request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::collaborator_failure(format!(
                "catalog returned status {} for {}",
                response.status(),
                url
            )));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn apply_variant_prices(&self, shop: &ShopId, external_product_id: &str, variants: &[ProductVariantOption]) -> Result<()> {
        self.put_variant_prices(shop, external_product_id, variants).await
    }

    async fn restore_prices(&self, shop: &ShopId, external_product_id: &str, variants: &[ProductVariantOption]) -> Result<()> {
        self.put_variant_prices(shop, external_product_id, variants).await
    }
}
