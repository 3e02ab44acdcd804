use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("analytics query failed")]
    Storage(#[from] StorageError),
}

impl QueryError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        QueryError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
