//! # folio-db-sqlite
//!
//! Maps the SQLite relational model onto the `folio-core` domain models.
//! One store backs both the domain allow-list and the portfolio.

use async_trait::async_trait;
use folio_core::models::{DomainRecord, PortfolioEntry};
use folio_core::traits::{DomainRepo, PortfolioRepo};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;
use uuid::Uuid;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS domains (
    id      BLOB PRIMARY KEY,
    name    TEXT NOT NULL UNIQUE,
    allowed INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS portfolio (
    id         BLOB PRIMARY KEY,
    title      TEXT NOT NULL,
    summary    TEXT NOT NULL,
    url        TEXT,
    image      TEXT,
    tags       TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);
"#;

pub struct SqliteStore {
    pool: SqlitePool,
}

fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> Uuid {
    Uuid::from_slice(blob).unwrap_or_default()
}

fn domain_from_row(row: &SqliteRow) -> DomainRecord {
    DomainRecord {
        id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
        name: row.get("name"),
        allowed: row.get("allowed"),
    }
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// A private database living as long as the store.
    ///
    /// Every connection to `sqlite::memory:` sees its own database, so the
    /// pool is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        debug!("sqlite schema ready");
        Ok(())
    }

    /// Inserts portfolio entries whose id is not stored yet. Returns how many
    /// were added, so reseeding from the same file is harmless.
    pub async fn seed_portfolio(&self, entries: &[PortfolioEntry]) -> anyhow::Result<u64> {
        let mut added = 0;
        for entry in entries {
            added += sqlx::query(
                "INSERT INTO portfolio (id, title, summary, url, image, tags, created_at) VALUES (?, ?, ?, ?, ?, ?, ?) ON CONFLICT(id) DO NOTHING",
            )
            .bind(uuid_to_blob(entry.id))
            .bind(&entry.title)
            .bind(&entry.summary)
            .bind(&entry.url)
            .bind(&entry.image)
            .bind(serde_json::to_string(&entry.tags)?)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await?
            .rows_affected();
        }
        Ok(added)
    }

    async fn domain_by_id(&self, id: Uuid) -> anyhow::Result<Option<DomainRecord>> {
        let row = sqlx::query("SELECT id, name, allowed FROM domains WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(domain_from_row))
    }
}

#[async_trait]
impl DomainRepo for SqliteStore {
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<DomainRecord>> {
        let row = sqlx::query("SELECT id, name, allowed FROM domains WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(domain_from_row))
    }

    /// Concurrent first sightings race on the UNIQUE name; the loser's row is
    /// dropped and both callers read back the winner.
    async fn insert(&self, record: DomainRecord) -> anyhow::Result<DomainRecord> {
        sqlx::query(
            "INSERT INTO domains (id, name, allowed) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(uuid_to_blob(record.id))
        .bind(&record.name)
        .bind(record.allowed)
        .execute(&self.pool)
        .await?;

        self.find_by_name(&record.name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("domain {} vanished after insert", record.name))
    }

    async fn allow(&self, id: Uuid) -> anyhow::Result<Option<DomainRecord>> {
        let updated = sqlx::query("UPDATE domains SET allowed = 1 WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        self.domain_by_id(id).await
    }
}

#[async_trait]
impl PortfolioRepo for SqliteStore {
    async fn list_portfolio(&self) -> anyhow::Result<Vec<PortfolioEntry>> {
        let rows = sqlx::query(
            "SELECT id, title, summary, url, image, tags, created_at FROM portfolio ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PortfolioEntry {
                id: blob_to_uuid(row.get::<Vec<u8>, _>("id").as_slice()),
                title: row.get("title"),
                summary: row.get("summary"),
                url: row.get("url"),
                image: row.get("image"),
                tags: serde_json::from_str(&row.get::<String, _>("tags")).unwrap_or_default(),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
