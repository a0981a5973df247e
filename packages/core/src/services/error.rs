//! Service Layer Error Types
//!
//! This module defines error types for path-maintenance operations, wrapping
//! Store failures with the operation they interrupted.

use crate::db::DatabaseError;
use crate::models::ValidationError;
use thiserror::Error;

/// Service operation errors
#[derive(Error, Debug)]
pub enum NodeServiceError {
    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// Referenced parent does not exist at save time
    #[error("Parent node not found: {parent_id}")]
    ParentNotFound { parent_id: String },

    /// Parent change would make a node its own ancestor
    #[error("Circular reference: node '{node_id}' cannot be moved under '{parent_id}'")]
    CircularReference { node_id: String, parent_id: String },

    /// Store failure while propagating a structural change to other documents
    ///
    /// Updates committed before the failure are not rolled back.
    #[error("{operation} aborted: {source}")]
    StorePropagationFailure {
        operation: String,
        #[source]
        source: DatabaseError,
    },

    /// Store failure while reading nodes for a children tree
    #[error("Children tree query failed: {source}")]
    QueryAssemblyFailure {
        #[source]
        source: DatabaseError,
    },

    /// Validation failed for node or configuration
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// Store operation failed
    #[error("Database operation failed: {0}")]
    DatabaseError(#[from] DatabaseError),
}

impl NodeServiceError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    /// Create a parent not found error
    pub fn parent_not_found(parent_id: impl Into<String>) -> Self {
        Self::ParentNotFound {
            parent_id: parent_id.into(),
        }
    }

    /// Create a circular reference error
    pub fn circular_reference(node_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self::CircularReference {
            node_id: node_id.into(),
            parent_id: parent_id.into(),
        }
    }

    /// Create a propagation failure for the named operation
    pub fn propagation_failure(operation: impl Into<String>, source: DatabaseError) -> Self {
        Self::StorePropagationFailure {
            operation: operation.into(),
            source,
        }
    }

    /// Create a tree query failure
    pub fn query_assembly_failure(source: DatabaseError) -> Self {
        Self::QueryAssemblyFailure { source }
    }

    /// True for failures that may have left a subtree half migrated
    pub fn is_partial_failure(&self) -> bool {
        matches!(self, Self::StorePropagationFailure { .. })
    }
}
