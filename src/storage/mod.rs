pub mod postgres;
pub mod sqlite;
pub mod trait_def;


pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;
pub use trait_def::{
    generate_document_id, subcollection, Document, Storage, StorageError, StorageResult,
};
