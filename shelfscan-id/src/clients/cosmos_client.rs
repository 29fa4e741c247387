//! Cosmos Catalog Client
//!
//! Resolves validated product codes against the Bluesoft Cosmos GTIN catalog.
//!
//! # API Reference
//! - Endpoint: `GET {base}/gtins/{code}.json`
//! - Auth: `X-Cosmos-Token` header
//! - 404 means the code is not in the catalog
//!
//! Requests are rate limited client-side (governor) to stay inside the
//! account's quota.

use super::{api_error, build_http_client, CatalogLookup, CatalogProduct};
use crate::types::{CollaboratorError, TaxCodes};
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Cosmos API base URL
pub const COSMOS_API_URL: &str = "https://api.cosmos.bluesoft.com.br";

/// Default timeout for catalog requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Cosmos catalog client
pub struct CosmosClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl CosmosClient {
    /// Create client; `base_url` defaults to [`COSMOS_API_URL`]
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        requests_per_second: u32,
    ) -> Result<Self, CollaboratorError> {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http_client: build_http_client(DEFAULT_TIMEOUT)?,
            base_url: base_url
                .unwrap_or_else(|| COSMOS_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }
}

#[async_trait]
impl CatalogLookup for CosmosClient {
    async fn lookup(&self, code: &str) -> Result<Option<CatalogProduct>, CollaboratorError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/gtins/{}.json", self.base_url, code);
        debug!(code = %code, "Querying Cosmos catalog");

        let response = self
            .http_client
            .get(&url)
            .header("X-Cosmos-Token", &self.api_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(code = %code, "Code not in catalog");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(api_error("Cosmos", response).await);
        }

        let product: CosmosProduct = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(format!("Cosmos response: {}", e)))?;

        Ok(Some(product.into_catalog_product()))
    }
}

// ============================================================================
// Cosmos response format
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CosmosProduct {
    description: Option<String>,
    brand: Option<CosmosBrand>,
    category: Option<CosmosCategory>,
    ncm: Option<CosmosCode>,
    cest: Option<CosmosCode>,
    avg_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CosmosBrand {
    name: Option<String>,
}

/// Category arrives either as plain text or as an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CosmosCategory {
    Text(String),
    Object { description: Option<String> },
}

#[derive(Debug, Deserialize)]
struct CosmosCode {
    code: Option<String>,
    description: Option<String>,
}

impl CosmosProduct {
    pub(crate) fn into_catalog_product(self) -> CatalogProduct {
        let mut tax_codes = TaxCodes::new();
        if let Some(code) = self.ncm.as_ref().and_then(|n| non_blank(n.code.as_deref())) {
            tax_codes.insert("ncm".to_string(), code);
        }
        if let Some(code) = self.cest.as_ref().and_then(|c| non_blank(c.code.as_deref())) {
            tax_codes.insert("cest".to_string(), code);
        }

        let category = match self.category {
            Some(CosmosCategory::Text(text)) => non_blank(Some(&text)),
            Some(CosmosCategory::Object { description }) => non_blank(description.as_deref()),
            None => None,
        };

        CatalogProduct {
            description: non_blank(self.description.as_deref()),
            brand: self.brand.and_then(|b| non_blank(b.name.as_deref())),
            // Cosmos has no category for many items; the NCM description is a usable stand-in
            category: category
                .or_else(|| self.ncm.and_then(|n| non_blank(n.description.as_deref()))),
            subcategory: None,
            price: self.avg_price.filter(|p| p.is_finite() && *p > 0.0),
            tax_codes,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CatalogProduct {
        serde_json::from_str::<CosmosProduct>(json)
            .unwrap()
            .into_catalog_product()
    }

    #[test]
    fn test_full_response() {
        let product = parse(
            r#"{
                "gtin": 7891000315507,
                "description": "ACHOCOLATADO EM PO NESCAU 2.0 400G",
                "brand": {"name": "NESCAU", "picture": ""},
                "category": {"id": 1, "description": "Achocolatados"},
                "ncm": {"code": "18069000", "description": "Outras preparações"},
                "cest": {"code": "1700700", "description": "..."},
                "avg_price": 8.99
            }"#,
        );

        assert_eq!(
            product.description.as_deref(),
            Some("ACHOCOLATADO EM PO NESCAU 2.0 400G")
        );
        assert_eq!(product.brand.as_deref(), Some("NESCAU"));
        assert_eq!(product.category.as_deref(), Some("Achocolatados"));
        assert_eq!(product.price, Some(8.99));
        assert_eq!(product.tax_codes.get("ncm").map(String::as_str), Some("18069000"));
        assert_eq!(product.tax_codes.get("cest").map(String::as_str), Some("1700700"));
    }

    #[test]
    fn test_text_category_and_blank_codes() {
        let product = parse(
            r#"{
                "description": "Agua Mineral 500ml",
                "category": "Bebidas",
                "ncm": {"code": "  "},
                "cest": null
            }"#,
        );

        assert_eq!(product.category.as_deref(), Some("Bebidas"));
        assert!(product.tax_codes.is_empty());
        assert_eq!(product.brand, None);
    }

    #[test]
    fn test_ncm_description_fallback_category() {
        let product = parse(
            r#"{"description": "Detergente", "ncm": {"code": "34022000", "description": "Detergentes"}}"#,
        );
        assert_eq!(product.category.as_deref(), Some("Detergentes"));
    }
}
