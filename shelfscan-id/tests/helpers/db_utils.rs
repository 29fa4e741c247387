//! Database Test Utilities

use anyhow::Result;
use shelfscan_id::db::{init_database_pool, init_memory_pool, SqliteProductStore};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

/// File-backed test database (kept alive by the returned TempDir)
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_shelfscan.db");
    let pool = init_database_pool(&db_path).await?;
    Ok((temp_dir, pool))
}

/// In-memory product store
pub async fn memory_store() -> Arc<SqliteProductStore> {
    let pool = init_memory_pool().await.unwrap();
    Arc::new(SqliteProductStore::new(pool))
}
