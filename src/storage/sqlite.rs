use crate::storage::trait_def::{ensure_object, merge_top_level, now_millis, parse_body};
use crate::storage::{generate_document_id, Document, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
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
            VALUES (?, ?, ?, ?, ?)
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
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (collection, doc_id) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at
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
            SELECT doc_id, data
            FROM documents
            WHERE collection = ? AND doc_id = ?
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
            SELECT doc_id, data
            FROM documents
            WHERE collection = ?
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
        let path = format!("$.\"{}\"", field);

        let rows = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT doc_id, data
            FROM documents
            WHERE collection = ? AND json_extract(data, ?) = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(collection)
        .bind(path)
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
            "SELECT data FROM documents WHERE collection = ? AND doc_id = ?",
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
            SET data = ?, updated_at = ?
            WHERE collection = ? AND doc_id = ?
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
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_id = ?")
            .bind(collection)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_collection(&self, collection: &str) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(collection)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_documents(&self, collection: &str) -> StorageResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE collection = ?",
        )
        .bind(collection)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count.max(0) as u64)
    }
}
