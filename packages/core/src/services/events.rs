//! Hierarchy change notifications
//!
//! `NodeService` broadcasts one event per completed structural operation.
//! Emission never blocks and never fails; with no subscribers the event is
//! dropped.

use crate::models::Node;
use serde::Serialize;

/// Broadcast channel capacity for hierarchy events
pub const HIERARCHY_EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HierarchyEvent {
    /// A node was written, with its freshly derived path
    NodeSaved { node: Node, created: bool },

    /// Descendant paths were migrated after a parent change
    #[serde(rename_all = "camelCase")]
    SubtreeRewritten {
        old_prefix: String,
        new_prefix: String,
        updated: usize,
    },

    /// A node was removed
    #[serde(rename_all = "camelCase")]
    NodeRemoved { id: String, existed: bool },

    /// Direct children of a removed node moved to its former parent
    #[serde(rename_all = "camelCase")]
    ChildrenReparented {
        removed_id: String,
        new_parent: Option<String>,
        count: usize,
    },

    /// The subtree below a removed node was deleted
    #[serde(rename_all = "camelCase")]
    SubtreeDeleted { removed_id: String, count: usize },
}
