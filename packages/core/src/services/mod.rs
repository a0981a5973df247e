//! Business Services
//!
//! This module contains the path-maintenance services:
//!
//! - `NodeService` - Save/remove entry point and query facade
//! - `NodeLifecycleController` - Save and removal hooks that keep `path` in sync
//! - `SubtreeRewriter` - Streamed, bounded-concurrency prefix migration
//! - `TreeQueryService` - Children, descendants, parent, ancestors and trees
//!
//! Services coordinate between the Store and callers; they hold no state of
//! their own between operations.

pub mod error;
pub mod events;
pub mod lifecycle;
pub mod node_service;
pub mod query_service;
pub mod subtree_rewriter;
mod worker_pool;

pub use error::NodeServiceError;
pub use events::{HierarchyEvent, HIERARCHY_EVENT_CHANNEL_CAPACITY};
pub use lifecycle::{NodeLifecycleController, RemovalOutcome, SubtreeMove};
pub use node_service::NodeService;
pub use query_service::{ChildrenTreeArgs, TreeQueryService};
pub use subtree_rewriter::{RewriteReport, SubtreeRewriter};
