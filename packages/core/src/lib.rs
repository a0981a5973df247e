//! Materialized Path Core
//!
//! This crate keeps a tree of records stored in a flat document collection
//! queryable without recursive lookups. Every node carries its `parent` and a
//! materialized `path` of ancestor ids; the services keep the two consistent
//! across saves, moves and removals.
//!
//! # Architecture
//!
//! - **Flat Collection**: The Store sees standalone documents only
//! - **Prefix Queries**: A subtree is every document whose path starts with a
//!   node's child prefix
//! - **Streamed Migrations**: Moving a node rewrites its descendants through a
//!   bounded worker pool over a Store stream
//! - **Pluggable Store**: Persistence sits behind the async `NodeStore` trait
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, TrackedNode, TreeNode, filters, config)
//! - [`services`] - NodeService, lifecycle hooks, subtree rewriter, tree queries
//! - [`db`] - Store trait, in-memory Store and Store errors
//! - [`utils`] - Path codec and tree assembly for data already in hand

pub mod db;
pub mod models;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use models::*;
pub use services::*;
pub use utils::{assemble_tree, level};
