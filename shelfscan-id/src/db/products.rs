//! Product records in SQLite
//!
//! `image_hash` is UNIQUE: two concurrent requests for the same image race
//! on insert and the loser sees [`InsertOutcome::UniqueConflict`].

use super::{processing_log, InsertOutcome, ProductStore};
use crate::types::{Category, ProcessingOutcome, ProductRecord, StrategySource, Vertical};
use crate::validators::normalize_category;
use async_trait::async_trait;
use chrono::Utc;
use shelfscan_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;

const SELECT_COLUMNS: &str = "SELECT id, image_hash, code, title, brand, category, subcategory, \
     price, tax_codes, vertical_attributes, confidence, source_strategy, vertical FROM products";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    #[allow(dead_code)]
    id: i64,
    image_hash: String,
    code: Option<String>,
    title: String,
    brand: Option<String>,
    category: String,
    subcategory: Option<String>,
    price: Option<f64>,
    tax_codes: String,
    vertical_attributes: String,
    confidence: f64,
    source_strategy: String,
    vertical: String,
}

impl ProductRow {
    fn into_record(self) -> Result<ProductRecord> {
        let tax_codes = serde_json::from_str(&self.tax_codes)
            .map_err(|e| Error::Internal(format!("Corrupt tax_codes for {}: {}", self.image_hash, e)))?;
        let vertical_attributes = serde_json::from_str(&self.vertical_attributes).map_err(|e| {
            Error::Internal(format!("Corrupt vertical_attributes for {}: {}", self.image_hash, e))
        })?;
        let source_strategy: StrategySource = self.source_strategy.parse().map_err(Error::Internal)?;
        let vertical: Vertical = self
            .vertical
            .parse()
            .map_err(|e| Error::Internal(format!("Corrupt vertical: {}", e)))?;

        Ok(ProductRecord {
            code: self.code,
            title: self.title,
            brand: self.brand,
            category: Category::from_name(&self.category)
                .unwrap_or_else(|| normalize_category(Some(&self.category))),
            subcategory: self.subcategory,
            price: self.price,
            tax_codes,
            vertical_attributes,
            confidence: self.confidence,
            source_strategy,
            vertical,
            image_hash: self.image_hash,
        })
    }
}

/// SQLite-backed [`ProductStore`]
#[derive(Clone)]
pub struct SqliteProductStore {
    pool: SqlitePool,
}

impl SqliteProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ProductStore for SqliteProductStore {
    async fn find_by_image_hash(&self, image_hash: &str) -> Result<Option<ProductRecord>> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("{} WHERE image_hash = ?", SELECT_COLUMNS))
                .bind(image_hash)
                .fetch_optional(&self.pool)
                .await?;

        row.map(ProductRow::into_record).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRecord>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProductRow::into_record).transpose()
    }

    async fn insert(&self, record: &ProductRecord) -> Result<InsertOutcome> {
        // Serialize before touching the database
        let tax_codes = serde_json::to_string(&record.tax_codes)
            .map_err(|e| Error::Internal(format!("Failed to serialize tax_codes: {}", e)))?;
        let attributes = serde_json::to_string(&record.vertical_attributes)
            .map_err(|e| Error::Internal(format!("Failed to serialize attributes: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                image_hash, code, title, brand, category, subcategory, price,
                tax_codes, vertical_attributes, confidence, source_strategy, vertical, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.image_hash)
        .bind(&record.code)
        .bind(&record.title)
        .bind(&record.brand)
        .bind(record.category.as_str())
        .bind(&record.subcategory)
        .bind(record.price)
        .bind(tax_codes)
        .bind(attributes)
        .bind(record.confidence)
        .bind(record.source_strategy.tag())
        .bind(record.vertical.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Inserted(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(image_hash = %record.image_hash, "Product already stored for image hash");
                Ok(InsertOutcome::UniqueConflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn log_processing(&self, outcome: &ProcessingOutcome) -> Result<()> {
        processing_log::insert_entry(&self.pool, outcome).await
    }
}
