//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::StoreResult;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- One row per highlight
CREATE TABLE IF NOT EXISTS highlights (
    id TEXT PRIMARY KEY,
    file_key TEXT NOT NULL,
    page INTEGER NOT NULL,
    x REAL NOT NULL,
    y REAL NOT NULL,
    w REAL NOT NULL,
    h REAL NOT NULL,
    highlight_type TEXT NOT NULL,
    text TEXT,
    entity TEXT,
    color TEXT,
    opacity REAL,
    timestamp TEXT NOT NULL
);

-- Per-file reads and bulk deletes
CREATE INDEX IF NOT EXISTS idx_highlights_file_key ON highlights(file_key);
"#;
