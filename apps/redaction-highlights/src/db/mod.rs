//! Durable highlight storage
//!
//! The [`HighlightBackend`] trait is the persistence seam of the highlight
//! store. SQLite is the production backend; the in-memory backend serves
//! tests and throwaway sessions.

mod backend;
mod highlights;
mod schema;

pub use backend::{HighlightBackend, MemoryHighlightStore};
pub use highlights::SqliteHighlightStore;
pub use schema::initialize_schema;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::StoreResult;

/// Create a new database connection pool
pub async fn create_pool(database_url: &str) -> StoreResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}
