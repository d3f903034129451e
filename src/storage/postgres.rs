use crate::storage::trait_def::{ensure_object, merge_top_level, now_millis, parse_body};
use crate::storage::{generate_document_id, Document, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq BIGSERIAL PRIMARY KEY,
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                data JSONB NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                UNIQUE (collection, doc_id)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn add_document(&self, collection: &str, data: &Value) -> StorageResult<String> {
        ensure_object(data)?;
        let id = generate_document_id();
        let now = now_millis();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
            VALUES ($1, $2, $3::jsonb, $4, $5)
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(data.to_string())
        .bind(now)
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;

        Ok(id)
    }

    async fn set_document(&self, collection: &str, id: &str, data: &Value) -> StorageResult<()> {
        ensure_object(data)?;
        let now = now_millis();

        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data, created_at, updated_at)
            VALUES ($1, $2, $3::jsonb, $4, $5)
            ON CONFLICT (collection, doc_id) DO UPDATE SET
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(data.to_string())
        .bind(now)
        .bind(now)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> StorageResult<Option<Document>> {
        let row = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT doc_id, data::text
            FROM documents
            WHERE collection = $1 AND doc_id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(|(id, body)| parse_body(id, &body)).transpose()
    }

    async fn list_documents(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT doc_id, data::text
            FROM documents
            WHERE collection = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(collection)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter()
            .map(|(id, body)| parse_body(id, &body))
            .collect()
    }

    async fn find_documents(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> StorageResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT doc_id, data::text
            FROM documents
            WHERE collection = $1 AND data->>$2 = $3
            ORDER BY seq ASC
            "#,
        )
        .bind(collection)
        .bind(field)
        .bind(value)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter()
            .map(|(id, body)| parse_body(id, &body))
            .collect()
    }

    async fn merge_document(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
    ) -> StorageResult<bool> {
        ensure_object(patch)?;
        let mut tx = self.pool.begin().await?;

        let body = sqlx::query_scalar::<_, String>(
            r#"
            SELECT data::text FROM documents
            WHERE collection = $1 AND doc_id = $2
            FOR UPDATE
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(body) = body else {
            return Ok(false);
        };

        let mut data = parse_body(id.to_string(), &body)?.data;
        merge_top_level(&mut data, patch)?;

        sqlx::query(
            r#"
            UPDATE documents
            SET data = $1::jsonb, updated_at = $2
            WHERE collection = $3 AND doc_id = $4
            "#,
        )
        .bind(data.to_string())
        .bind(now_millis())
        .bind(collection)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_id = $2")
            .bind(collection)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_collection(&self, collection: &str) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1")
            .bind(collection)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_documents(&self, collection: &str) -> StorageResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE collection = $1",
        )
        .bind(collection)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count.max(0) as u64)
    }
}
