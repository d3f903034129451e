use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("document body must be a JSON object")]
    InvalidDocument,
    #[error("corrupt document {id}: {source}")]
    Corrupt {
        id: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A raw document as it comes out of the store: an id plus a loosely-typed body.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Build the path of a subcollection nested under a document,
/// e.g. `banners/abc/views`.
pub fn subcollection(parent: &str, doc_id: &str, child: &str) -> String {
    format!("{}/{}/{}", parent, doc_id, child)
}

/// Document-store abstraction. Collections are addressed by path and
/// hold JSON object documents keyed by id.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a document under a freshly generated id and return the id
    async fn add_document(&self, collection: &str, data: &Value) -> StorageResult<String>;

    /// Create or overwrite the document with the given id
    async fn set_document(&self, collection: &str, id: &str, data: &Value) -> StorageResult<()>;

    async fn get_document(&self, collection: &str, id: &str) -> StorageResult<Option<Document>>;

    /// All documents of a collection in insertion order
    async fn list_documents(&self, collection: &str) -> StorageResult<Vec<Document>>;

    /// Documents whose top-level string field equals `value`
    async fn find_documents(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> StorageResult<Vec<Document>>;

    /// Overwrite the top-level fields of an existing document with those of `patch`.
    /// Returns false if the document does not exist.
    async fn merge_document(&self, collection: &str, id: &str, patch: &Value)
        -> StorageResult<bool>;

    async fn delete_document(&self, collection: &str, id: &str) -> StorageResult<bool>;

    /// Delete every document of a collection, returning how many were removed
    async fn delete_collection(&self, collection: &str) -> StorageResult<u64>;

    async fn count_documents(&self, collection: &str) -> StorageResult<u64>;
}

/// Generate a 20 character alphanumeric document id
pub fn generate_document_id() -> String {
    use rand::RngExt;

    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..20)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

pub(crate) fn ensure_object(data: &Value) -> StorageResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StorageError::InvalidDocument)
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Overwrite the top-level fields of `target` with those of `patch`.
pub(crate) fn merge_top_level(target: &mut Value, patch: &Value) -> StorageResult<()> {
    let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) else {
        return Err(StorageError::InvalidDocument);
    };
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
    Ok(())
}

pub(crate) fn parse_body(id: String, body: &str) -> StorageResult<Document> {
    match serde_json::from_str(body) {
        Ok(data) => Ok(Document { id, data }),
        Err(source) => Err(StorageError::Corrupt { id, source }),
    }
}
