//! Database Layer
//!
//! This module holds the Store collaborator the tree logic runs against:
//!
//! - `NodeStore` - async trait over the flat document collection
//! - `InMemoryStore` - reference implementation with operation counters
//! - `DatabaseError` - errors reported by Store implementations
//!
//! Query execution, indexing and durability are the Store's responsibility;
//! the services only build filters and interpret results.

mod error;
mod memory_store;
mod node_store;

pub use error::DatabaseError;
pub use memory_store::{InMemoryStore, StoreStats};
pub use node_store::{NodeStore, NodeStream};
