// Postgres-backed cache store. Tables are append-only sets; re-appending an
// existing value is a no-op.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;

use discovery_common::{ArtistId, DiscoveryError, Result};

use crate::traits::CacheStore;

pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DiscoveryError::Database(e.into()))?;
        Ok(())
    }

    async fn read_column(&self, sql: &str) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar::<_, String>(sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn append(&self, sql: &str, values: &[String]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        sqlx::query(sql).bind(values).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn cached_artist_ids(&self) -> Result<Vec<ArtistId>> {
        self.read_column("SELECT artist_id FROM artist_cache ORDER BY added_at, artist_id")
            .await
    }

    async fn cached_release_ids(&self) -> Result<HashSet<String>> {
        let ids = self.read_column("SELECT release_id FROM release_cache").await?;
        Ok(ids.into_iter().collect())
    }

    async fn cached_release_names(&self) -> Result<HashSet<String>> {
        let names = self
            .read_column("SELECT signature FROM release_name_cache")
            .await?;
        Ok(names.into_iter().collect())
    }

    async fn append_artist_ids(&self, ids: &[ArtistId]) -> Result<()> {
        self.append(
            r#"
            INSERT INTO artist_cache (artist_id)
            SELECT * FROM UNNEST($1::text[])
            ON CONFLICT DO NOTHING
            "#,
            ids,
        )
        .await
    }

    async fn append_release_ids(&self, ids: &[String]) -> Result<()> {
        self.append(
            r#"
            INSERT INTO release_cache (release_id)
            SELECT * FROM UNNEST($1::text[])
            ON CONFLICT DO NOTHING
            "#,
            ids,
        )
        .await
    }

    async fn append_release_names(&self, names: &[String]) -> Result<()> {
        self.append(
            r#"
            INSERT INTO release_name_cache (signature)
            SELECT * FROM UNNEST($1::text[])
            ON CONFLICT DO NOTHING
            "#,
            names,
        )
        .await
    }
}
