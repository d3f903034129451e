//! Banner management and banner analytics

mod service;

pub use service::BannerService;

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Trim an id, rejecting blank input
pub(crate) fn require_id(value: &str, name: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{name} is required")));
    }
    Ok(trimmed.to_string())
}
