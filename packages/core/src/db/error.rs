//! Database Error Types
//!
//! Errors a `NodeStore` implementation reports. Service-level errors wrap
//! these; see `services::error`.

use thiserror::Error;

/// Store operation errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Targeted document does not exist
    #[error("Document not found: {id}")]
    NotFound { id: String },

    /// Read/query failure
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Write failure with context
    #[error("Write failed for document {id}: {context}")]
    WriteFailed { id: String, context: String },

    /// Failure injected by a test store
    #[error("Injected failure while updating document {id}")]
    InjectedFailure { id: String },
}

impl DatabaseError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a query failed error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::QueryFailed(msg.into())
    }

    /// Create a write failed error
    pub fn write_failed(id: impl Into<String>, context: impl Into<String>) -> Self {
        Self::WriteFailed {
            id: id.into(),
            context: context.into(),
        }
    }
}
