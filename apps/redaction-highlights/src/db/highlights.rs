//! SQLite storage for highlights

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};

use super::backend::HighlightBackend;
use crate::error::{StoreError, StoreResult};
use crate::highlights::{Highlight, HighlightType};

/// Highlight persistence backed by a SQLite pool
#[derive(Clone)]
pub struct SqliteHighlightStore {
    pool: SqlitePool,
}

impl SqliteHighlightStore {
    /// Create a store over an initialized pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Count highlights for a file
    pub async fn count_for_file(&self, file_key: &str) -> StoreResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM highlights WHERE file_key = ?")
            .bind(file_key)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }
}

fn upsert(highlight: &Highlight) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
    sqlx::query(
        r#"
        INSERT INTO highlights (
            id, file_key, page, x, y, w, h, highlight_type,
            text, entity, color, opacity, timestamp
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            file_key = excluded.file_key,
            page = excluded.page,
            x = excluded.x,
            y = excluded.y,
            w = excluded.w,
            h = excluded.h,
            highlight_type = excluded.highlight_type,
            text = excluded.text,
            entity = excluded.entity,
            color = excluded.color,
            opacity = excluded.opacity,
            timestamp = excluded.timestamp
        "#,
    )
    .bind(&highlight.id)
    .bind(&highlight.file_key)
    .bind(highlight.page as i64)
    .bind(highlight.x)
    .bind(highlight.y)
    .bind(highlight.w)
    .bind(highlight.h)
    .bind(highlight.highlight_type.as_str())
    .bind(&highlight.text)
    .bind(&highlight.entity)
    .bind(&highlight.color)
    .bind(highlight.opacity.map(f64::from))
    .bind(highlight.timestamp.to_rfc3339())
}

#[async_trait]
impl HighlightBackend for SqliteHighlightStore {
    async fn get_all(&self, file_key: Option<&str>) -> StoreResult<Vec<Highlight>> {
        let rows = match file_key {
            Some(file_key) => {
                sqlx::query_as::<_, HighlightRow>(
                    r#"
                    SELECT id, file_key, page, x, y, w, h, highlight_type,
                           text, entity, color, opacity, timestamp
                    FROM highlights
                    WHERE file_key = ?
                    ORDER BY page ASC, timestamp ASC, id ASC
                    "#,
                )
                .bind(file_key)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, HighlightRow>(
                    r#"
                    SELECT id, file_key, page, x, y, w, h, highlight_type,
                           text, entity, color, opacity, timestamp
                    FROM highlights
                    ORDER BY file_key ASC, page ASC, timestamp ASC, id ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(|r| r.into_highlight()).collect()
    }

    async fn put(&self, highlight: &Highlight) -> StoreResult<()> {
        upsert(highlight).execute(&self.pool).await?;
        Ok(())
    }

    async fn put_many(&self, highlights: &[Highlight]) -> StoreResult<()> {
        if highlights.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for highlight in highlights {
            upsert(highlight).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM highlights WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> StoreResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        // Chunked to stay under SQLite's bound parameter limit
        for chunk in ids.chunks(500) {
            let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
            let query = format!(
                "DELETE FROM highlights WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut q = sqlx::query(&query);
            for id in chunk {
                q = q.bind(id);
            }
            q.execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn delete_for_file(&self, file_key: &str) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM highlights WHERE file_key = ?")
            .bind(file_key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn clear(&self) -> StoreResult<()> {
        sqlx::query("DELETE FROM highlights")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Internal row type for SQLite queries
#[derive(sqlx::FromRow)]
struct HighlightRow {
    id: String,
    file_key: String,
    page: i64,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    highlight_type: String,
    text: Option<String>,
    entity: Option<String>,
    color: Option<String>,
    opacity: Option<f64>,
    timestamp: String,
}

impl HighlightRow {
    fn into_highlight(self) -> StoreResult<Highlight> {
        let highlight_type =
            HighlightType::parse(&self.highlight_type).ok_or_else(|| StoreError::CorruptRecord {
                id: self.id.clone(),
                reason: format!("unknown highlight type '{}'", self.highlight_type),
            })?;

        let page = u32::try_from(self.page).map_err(|_| StoreError::CorruptRecord {
            id: self.id.clone(),
            reason: format!("invalid page {}", self.page),
        })?;

        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)?.with_timezone(&Utc);

        Ok(Highlight {
            id: self.id,
            file_key: self.file_key,
            page,
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
            highlight_type,
            text: self.text,
            entity: self.entity,
            color: self.color,
            opacity: self.opacity.map(|o| o as f32),
            timestamp,
        })
    }
}
