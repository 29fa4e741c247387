//! Database access for shelfscan-id
//!
//! SQLite holds identified products (one row per image hash) and a
//! per-request processing log. The pipeline only talks to the
//! [`ProductStore`] trait; [`SqliteProductStore`] is the production
//! implementation.

pub mod processing_log;
pub mod products;

pub use products::SqliteProductStore;

use crate::types::{ProcessingOutcome, ProductRecord};
use async_trait::async_trait;
use shelfscan_common::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Result of inserting a product record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New row id
    Inserted(i64),
    /// A record with the same image hash already exists
    UniqueConflict,
}

/// Persistence for identified products
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn find_by_image_hash(&self, image_hash: &str) -> Result<Option<ProductRecord>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<ProductRecord>>;

    /// Insert unless the image hash is taken
    async fn insert(&self, record: &ProductRecord) -> Result<InsertOutcome>;

    async fn log_processing(&self, outcome: &ProcessingOutcome) -> Result<()>;
}

/// Initialize database connection pool
///
/// Creates the parent directory and the database file when missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database (single connection, so every query sees the same data)
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create products and processing_log tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_hash TEXT NOT NULL UNIQUE,
            code TEXT,
            title TEXT NOT NULL,
            brand TEXT,
            category TEXT NOT NULL,
            subcategory TEXT,
            price REAL,
            tax_codes TEXT NOT NULL DEFAULT '{}',
            vertical_attributes TEXT NOT NULL DEFAULT '{}',
            confidence REAL NOT NULL,
            source_strategy TEXT NOT NULL,
            vertical TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_code ON products(code)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_hash TEXT NOT NULL,
            elapsed_seconds REAL NOT NULL,
            success INTEGER NOT NULL,
            confidence REAL,
            error TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (products, processing_log)");

    Ok(())
}
