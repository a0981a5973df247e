//! Data Models
//!
//! This module contains the data structures used throughout the crate:
//!
//! - `Node` - A record in the flat collection, carrying `parent` and `path`
//! - `TrackedNode` - A node plus its persisted structural state
//! - `TreeNode` - Assembly output with nested `children`
//! - Store query types (`NodeFilter`, `FindOptions`, `FieldSelection`)
//! - `MpathConfig` - Setup-time configuration

mod config;
mod node;
mod query;

pub use config::{IdType, MpathConfig, OnDelete, TreeQueryErrorPolicy};
pub use node::{
    DeleteResult, Node, NodeUpdate, PersistedState, TrackedNode, TreeNode, ValidationError,
};
pub use query::{
    FieldSelection, FilterOperator, FindOptions, NodeFilter, PropertyFilter, SortDirection,
    SortKey,
};
