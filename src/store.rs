use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{info, warn};

use crate::types::{Article, PipelineError, Result};

const MIGRATIONS: &[&str] = &[r#"
    CREATE TABLE IF NOT EXISTS articles (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        link TEXT NOT NULL,
        date TEXT NOT NULL,
        content TEXT NOT NULL,
        source TEXT NOT NULL,
        translated_content TEXT NOT NULL DEFAULT '',
        translated_title TEXT NOT NULL DEFAULT '',
        category TEXT NOT NULL DEFAULT ''
    )
    "#];

/// Durable article storage. Every operation opens and closes its own
/// connection scope; nothing is pooled across concurrent tasks.
pub struct ArticleStore {
    conn: String,
}

impl ArticleStore {
    pub fn new(conn: impl Into<String>) -> Self {
        Self { conn: conn.into() }
    }

    async fn open(&self) -> Result<SqlitePool> {
        let options = SqliteConnectOptions::from_str(&self.conn)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        for migration in MIGRATIONS {
            sqlx::query(migration).execute(&pool).await?;
        }
        Ok(pool)
    }

    /// The full set of persisted article ids, used for storage-aware dedup.
    pub async fn known_ids(&self) -> Result<HashSet<String>> {
        let pool = self.open().await?;
        let rows = sqlx::query("SELECT id FROM articles")
            .fetch_all(&pool)
            .await?;
        pool.close().await;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("id"))
            .collect())
    }

    /// Write articles with insert-or-ignore semantics keyed on id; a
    /// re-inserted id is a silent no-op. Returns the number of rows
    /// actually written. Row failures are logged and the loop continues.
    pub async fn insert_articles(&self, articles: &[Article]) -> Result<usize> {
        let pool = self.open().await?;

        let mut inserted = 0usize;
        for article in articles {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                (id, title, link, date, content, source, translated_content, translated_title, category)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&article.id)
            .bind(&article.title)
            .bind(&article.link)
            .bind(article.published_at.to_rfc3339())
            .bind(&article.content)
            .bind(&article.source)
            .bind(&article.translated_content)
            .bind(&article.translated_title)
            .bind(&article.category)
            .execute(&pool)
            .await;

            match result {
                Ok(done) => inserted += done.rows_affected() as usize,
                Err(e) => warn!("Error inserting article {}: {}", article.id, e),
            }
        }

        pool.close().await;
        info!(
            "Stored {} new articles out of {} candidates",
            inserted,
            articles.len()
        );
        Ok(inserted)
    }

    /// Articles published at or after `since`, newest first.
    pub async fn articles_since(&self, since: DateTime<Utc>) -> Result<Vec<Article>> {
        let pool = self.open().await?;
        let rows = sqlx::query("SELECT * FROM articles WHERE date >= ? ORDER BY date DESC")
            .bind(since.to_rfc3339())
            .fetch_all(&pool)
            .await?;
        pool.close().await;
        rows.iter().map(article_from_row).collect()
    }

    pub async fn article_by_id(&self, id: &str) -> Result<Option<Article>> {
        let pool = self.open().await?;
        let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
            .bind(id)
            .fetch_optional(&pool)
            .await?;
        pool.close().await;
        row.as_ref().map(article_from_row).transpose()
    }

    /// Distinct category values across all stored articles.
    pub async fn categories(&self) -> Result<Vec<String>> {
        let pool = self.open().await?;
        let rows = sqlx::query("SELECT DISTINCT category FROM articles ORDER BY category")
            .fetch_all(&pool)
            .await?;
        pool.close().await;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("category"))
            .collect())
    }

    /// Articles in one category published at or after `since`, newest first.
    pub async fn articles_by_category(
        &self,
        category: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Article>> {
        let pool = self.open().await?;
        let rows =
            sqlx::query("SELECT * FROM articles WHERE category = ? AND date >= ? ORDER BY date DESC")
                .bind(category)
                .bind(since.to_rfc3339())
                .fetch_all(&pool)
                .await?;
        pool.close().await;
        rows.iter().map(article_from_row).collect()
    }
}

fn article_from_row(row: &SqliteRow) -> Result<Article> {
    let date: String = row.try_get("date")?;
    let published_at = DateTime::parse_from_rfc3339(&date)
        .map_err(|e| PipelineError::Parse(format!("bad date in storage: {}", e)))?
        .with_timezone(&Utc);

    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        link: row.try_get("link")?,
        published_at,
        content: row.try_get("content")?,
        source: row.try_get("source")?,
        category: row.try_get("category")?,
        translated_content: row.try_get("translated_content")?,
        translated_title: row.try_get("translated_title")?,
    })
}
