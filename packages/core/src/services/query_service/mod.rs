//! Tree Query Service - Hierarchy Queries over Materialized Paths
//!
//! Each query is translated into a single `NodeFilter` for the Store, merged
//! with caller-supplied conditions. The condition a query owns (`parent`,
//! `path_prefix` or `ids`) overrides whatever the caller put there.
//!
//! # Query Shapes
//!
//! - Immediate children: `parent == node.id`
//! - All descendants: `path` starts with the node's child prefix
//! - Ancestors: `id` in the ids encoded in the node's `path`
//! - Children tree: a path-sorted `find`, level filtered, then assembled
//!
//! # Ordering
//!
//! Only the children tree imposes an order. Ancestors come back in whatever
//! order the Store and the caller's sort produce, not in path order.
//!
//! # Examples
//!
//! ```rust,no_run
//! use mpath_core::db::InMemoryStore;
//! use mpath_core::services::{ChildrenTreeArgs, TreeQueryService};
//! use mpath_core::models::MpathConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = Arc::new(InMemoryStore::new());
//! let queries = TreeQueryService::new(store, &MpathConfig::default());
//!
//! let forest = queries
//!     .get_children_tree(ChildrenTreeArgs::new().with_min_level(2))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::db::NodeStore;
use crate::models::{
    FieldSelection, FindOptions, MpathConfig, Node, NodeFilter, SortKey, TreeNode,
    TreeQueryErrorPolicy,
};
use crate::services::error::NodeServiceError;
use crate::utils::{ancestor_ids, assemble_tree};
use std::sync::Arc;

/// Arguments for a children-tree query
///
/// Every field is optional. With no root the whole collection is assembled.
#[derive(Debug, Clone, Default)]
pub struct ChildrenTreeArgs {
    /// Restrict the tree to this node's descendants (the node itself excluded)
    pub root_node: Option<Node>,
    /// Projection; `path` and `parent` are always added
    pub fields: Option<FieldSelection>,
    /// Extra Store conditions
    pub filters: NodeFilter,
    /// Drop nodes above this level before assembly (default 1)
    pub min_level: Option<usize>,
    /// Sort/limit options; `path` ascending is appended when not sorted on
    pub options: FindOptions,
}

impl ChildrenTreeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root_node(mut self, root: Node) -> Self {
        self.root_node = Some(root);
        self
    }

    pub fn with_fields(mut self, fields: FieldSelection) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn with_filters(mut self, filters: NodeFilter) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_min_level(mut self, min_level: usize) -> Self {
        self.min_level = Some(min_level);
        self
    }

    pub fn with_options(mut self, options: FindOptions) -> Self {
        self.options = options;
        self
    }
}

/// Read-only hierarchy queries
#[derive(Clone)]
pub struct TreeQueryService {
    store: Arc<dyn NodeStore>,
    separator: char,
    error_policy: TreeQueryErrorPolicy,
}

impl TreeQueryService {
    pub fn new(store: Arc<dyn NodeStore>, config: &MpathConfig) -> Self {
        Self {
            store,
            separator: config.path_separator,
            error_policy: config.tree_query_errors,
        }
    }

    /// Nodes whose `parent` is `node`
    pub async fn get_immediate_children(
        &self,
        node: &Node,
        conditions: NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, NodeServiceError> {
        let filter = conditions.with_parent(node.id.clone());
        Ok(self.store.find(&filter, fields, options).await?)
    }

    /// Every node below `node`, at any depth
    pub async fn get_all_descendants(
        &self,
        node: &Node,
        conditions: NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, NodeServiceError> {
        let filter = conditions.with_path_prefix(node.child_path(self.separator));
        Ok(self.store.find(&filter, fields, options).await?)
    }

    /// The node's parent, or `None` for a root or a dangling reference
    pub async fn get_parent(
        &self,
        node: &Node,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Option<Node>, NodeServiceError> {
        let Some(parent_id) = node.parent.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        let filter = NodeFilter::new().with_id(parent_id.to_string());
        let options = options.clone().with_limit(1);
        let found = self.store.find(&filter, fields, &options).await?;

        Ok(found.into_iter().next())
    }

    /// Every node whose id appears in `node`'s path
    ///
    /// The result is in Store order; sort on `path` ascending for root-first
    /// order.
    pub async fn get_ancestors(
        &self,
        node: &Node,
        conditions: NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, NodeServiceError> {
        let ids = ancestor_ids(node.path.as_deref().unwrap_or_default(), self.separator);
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let filter = conditions.with_ids(ids);
        Ok(self.store.find(&filter, fields, options).await?)
    }

    /// Nested tree of the collection, or of one node's descendants
    ///
    /// Under `TreeQueryErrorPolicy::LogAndEmpty` a Store failure is logged and
    /// yields an empty forest.
    pub async fn get_children_tree(
        &self,
        args: ChildrenTreeArgs,
    ) -> Result<Vec<TreeNode>, NodeServiceError> {
        let ChildrenTreeArgs {
            root_node,
            fields,
            mut filters,
            min_level,
            mut options,
        } = args;

        if let Some(root) = &root_node {
            filters.path_prefix = Some(root.child_path(self.separator));
        }

        let fields = fields.map(|mut selection| {
            selection.ensure("path");
            selection.ensure("parent");
            selection
        });

        if !options.sorts_on("path") {
            options.sort.push(SortKey::asc("path"));
        }

        let nodes = match self.store.find(&filters, fields.as_ref(), &options).await {
            Ok(nodes) => nodes,
            Err(e) => {
                return match self.error_policy {
                    TreeQueryErrorPolicy::LogAndEmpty => {
                        tracing::warn!("Children tree query failed, returning empty tree: {}", e);
                        Ok(Vec::new())
                    }
                    TreeQueryErrorPolicy::Propagate => {
                        Err(NodeServiceError::query_assembly_failure(e))
                    }
                };
            }
        };

        let min_level = min_level.unwrap_or(1);
        let separator = self.separator;
        let kept: Vec<Node> = nodes
            .into_iter()
            .filter(|node| node.level(separator) >= min_level)
            .collect();

        tracing::debug!("Assembling children tree from {} node(s)", kept.len());
        Ok(assemble_tree(kept))
    }
}

#[cfg(test)]
mod query_service_test;
