//! NodeStore Trait - Store Abstraction Layer
//!
//! This module defines the `NodeStore` trait, the only seam between the
//! path-maintenance logic and the persistent document collection. Query
//! execution, durability and indexing are the implementation's business.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: Every method is a suspension point
//! 2. **Ownership Semantics**: Writes take ownership of their values
//! 3. **No Hooks**: `upsert` is a raw write; lifecycle logic lives in
//!    `NodeService::save`
//! 4. **No Transactions**: Each call is durable on its own; multi-document
//!    atomicity is not assumed
//!
//! # Examples
//!
//! ```rust
//! use mpath_core::db::{InMemoryStore, NodeStore};
//! use mpath_core::models::{Node, NodeFilter};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store: Arc<dyn NodeStore> = Arc::new(InMemoryStore::new());
//! store.upsert(Node::new_with_id("eu".to_string(), None, json!({}))).await?;
//!
//! let found = store.find_one(&NodeFilter::new().with_id("eu".to_string())).await?;
//! assert!(found.is_some());
//! # Ok(())
//! # }
//! ```

use crate::db::DatabaseError;
use crate::models::{DeleteResult, FieldSelection, FindOptions, Node, NodeFilter, NodeUpdate};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Lazy stream of matching documents
pub type NodeStream = BoxStream<'static, Result<Node, DatabaseError>>;

/// Abstraction over the flat document collection
///
/// Implementations must be `Send + Sync`; the service shares one store
/// between concurrently running workers.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// First document matching the filter, if any
    async fn find_one(&self, filter: &NodeFilter) -> Result<Option<Node>, DatabaseError>;

    /// All documents matching the filter, projected and sorted
    ///
    /// `fields = None` returns whole documents.
    async fn find(
        &self,
        filter: &NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, DatabaseError>;

    /// Lazily stream every document matching the filter
    ///
    /// The match set is fixed when the stream is opened; documents created
    /// afterwards are not guaranteed to appear.
    async fn stream_matching(&self, filter: &NodeFilter) -> Result<NodeStream, DatabaseError>;

    /// Insert or replace a document by id
    async fn upsert(&self, node: Node) -> Result<Node, DatabaseError>;

    /// Apply a partial update to one document
    ///
    /// # Errors
    ///
    /// `DatabaseError::NotFound` if no document has this id.
    async fn update_by_id(&self, id: &str, update: NodeUpdate) -> Result<(), DatabaseError>;

    /// Delete every matching document, returning how many were removed
    async fn delete_matching(&self, filter: &NodeFilter) -> Result<usize, DatabaseError>;

    /// Delete one document (idempotent)
    async fn delete_by_id(&self, id: &str) -> Result<DeleteResult, DatabaseError>;
}
