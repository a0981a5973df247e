//! Node Service - Materialized Path Maintenance
//!
//! `NodeService` is the entry point callers use instead of writing to the
//! Store directly. It validates nodes, runs the lifecycle hooks around every
//! save and removal, and exposes the hierarchy queries.
//!
//! # Save Semantics
//!
//! - A new node gets its path from its parent (`""` for roots)
//! - A node whose parent changed gets a new path, and every descendant's path
//!   is migrated before `save` returns
//! - Any other save writes the node and nothing else
//!
//! # Removal Semantics
//!
//! Governed by `MpathConfig::on_delete`:
//!
//! - `Reparent` (default): direct children move to the removed node's parent
//! - `Delete`: the whole subtree goes with the node
//!
//! Failures while migrating or reparenting descendants are reported as
//! `StorePropagationFailure` and are not rolled back.

use crate::db::NodeStore;
use crate::models::{
    DeleteResult, FieldSelection, FindOptions, MpathConfig, Node, NodeFilter, TrackedNode,
    TreeNode,
};
use crate::services::error::NodeServiceError;
use crate::services::events::{HierarchyEvent, HIERARCHY_EVENT_CHANNEL_CAPACITY};
use crate::services::lifecycle::{NodeLifecycleController, RemovalOutcome};
use crate::services::query_service::{ChildrenTreeArgs, TreeQueryService};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Core service for path-maintained nodes
///
/// # Examples
///
/// ```rust
/// use mpath_core::db::InMemoryStore;
/// use mpath_core::models::{Node, TrackedNode};
/// use mpath_core::services::NodeService;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let service = NodeService::new(Arc::new(InMemoryStore::new()))?;
///
/// let mut eu = TrackedNode::new(Node::new_with_id("eu".to_string(), None, json!({})));
/// service.save(&mut eu).await?;
///
/// let mut se = TrackedNode::new(Node::new_with_id(
///     "se".to_string(),
///     Some("eu".to_string()),
///     json!({ "name": "Sweden" }),
/// ));
/// service.save(&mut se).await?;
/// assert_eq!(se.node().path.as_deref(), Some("#eu#"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NodeService {
    /// Store for all persistence operations
    store: Arc<dyn NodeStore>,

    config: MpathConfig,

    lifecycle: NodeLifecycleController,

    queries: TreeQueryService,

    /// Broadcast channel for hierarchy events (128 subscriber capacity)
    event_tx: broadcast::Sender<HierarchyEvent>,
}

impl NodeService {
    /// Create a NodeService with the default configuration
    pub fn new(store: Arc<dyn NodeStore>) -> Result<Self, NodeServiceError> {
        Self::with_config(store, MpathConfig::default())
    }

    /// Create a NodeService with an explicit configuration
    ///
    /// # Errors
    ///
    /// `ValidationFailed` if the configuration is invalid.
    pub fn with_config(
        store: Arc<dyn NodeStore>,
        config: MpathConfig,
    ) -> Result<Self, NodeServiceError> {
        config.validate()?;

        let (event_tx, _) = broadcast::channel(HIERARCHY_EVENT_CHANNEL_CAPACITY);
        let lifecycle =
            NodeLifecycleController::new(store.clone(), config.clone(), event_tx.clone());
        let queries = TreeQueryService::new(store.clone(), &config);

        tracing::debug!(
            "NodeService ready (on_delete={:?}, separator='{}', concurrency={})",
            config.on_delete,
            config.path_separator,
            config.concurrency
        );

        Ok(Self {
            store,
            config,
            lifecycle,
            queries,
            event_tx,
        })
    }

    pub fn config(&self) -> &MpathConfig {
        &self.config
    }

    /// Get access to the underlying Store
    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// Subscribe to hierarchy events
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// # use mpath_core::db::InMemoryStore;
    /// # use mpath_core::services::NodeService;
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let service = NodeService::new(Arc::new(InMemoryStore::new()))?;
    /// let mut rx = service.subscribe_to_events();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = rx.recv().await {
    ///         println!("Event: {:?}", event);
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<HierarchyEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: HierarchyEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Depth of a node, root = 1
    pub fn level(&self, node: &Node) -> usize {
        node.level(self.config.path_separator)
    }

    /// Read a node for modification
    pub async fn load(&self, id: &str) -> Result<Option<TrackedNode>, NodeServiceError> {
        let node = self
            .store
            .find_one(&NodeFilter::new().with_id(id.to_string()))
            .await?;

        Ok(node.map(TrackedNode::from_persisted))
    }

    /// Read a node, failing if it does not exist
    pub async fn get(&self, id: &str) -> Result<TrackedNode, NodeServiceError> {
        self.load(id)
            .await?
            .ok_or_else(|| NodeServiceError::node_not_found(id))
    }

    /// Create or update a node
    ///
    /// Resolves only after the node and, for a parent change, its whole
    /// subtree have been written. With `IdType::Uuid` an empty id is replaced
    /// by a fresh UUID.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for a malformed node
    /// - `ParentNotFound` if `parent` does not exist; nothing is written
    /// - `CircularReference` if the new parent is inside the node's subtree
    /// - `StorePropagationFailure` if the node was written but migrating its
    ///   descendants failed part way
    pub async fn save(&self, doc: &mut TrackedNode) -> Result<Node, NodeServiceError> {
        if doc.is_new() && doc.id().is_empty() {
            if let Some(id) = self.config.id_type.generate() {
                doc.node_mut().id = id;
            }
        }

        doc.node().validate(self.config.path_separator)?;
        self.config.id_type.validate(doc.id())?;

        self.lifecycle.save_tracked(doc).await
    }

    /// Remove a node, handling its descendants per `on_delete`
    ///
    /// Descendants are handled before the node itself is deleted. A node whose
    /// `path` is `None` is deleted without touching any other document.
    /// Removing a node that no longer exists succeeds with `existed == false`.
    pub async fn remove(&self, node: &Node) -> Result<DeleteResult, NodeServiceError> {
        let outcome = self.lifecycle.before_remove(node).await?;
        if outcome == RemovalOutcome::Skipped {
            tracing::debug!("Removing {} without descendant handling", node.id);
        }

        let result = self.store.delete_by_id(&node.id).await?;
        tracing::info!("Removed {} (existed: {})", node.id, result.existed);

        self.emit_event(HierarchyEvent::NodeRemoved {
            id: node.id.clone(),
            existed: result.existed,
        });
        Ok(result)
    }

    /// Load and remove a node by id
    pub async fn remove_by_id(&self, id: &str) -> Result<DeleteResult, NodeServiceError> {
        match self.load(id).await? {
            Some(doc) => self.remove(doc.node()).await,
            None => Ok(DeleteResult::not_found()),
        }
    }

    // ========================================================================
    // Hierarchy queries
    // ========================================================================

    pub async fn get_immediate_children(
        &self,
        node: &Node,
        conditions: NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, NodeServiceError> {
        self.queries
            .get_immediate_children(node, conditions, fields, options)
            .await
    }

    pub async fn get_all_descendants(
        &self,
        node: &Node,
        conditions: NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, NodeServiceError> {
        self.queries
            .get_all_descendants(node, conditions, fields, options)
            .await
    }

    pub async fn get_parent(
        &self,
        node: &Node,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Option<Node>, NodeServiceError> {
        self.queries.get_parent(node, fields, options).await
    }

    /// Ancestors in Store order; sort on `path` for root-first order
    pub async fn get_ancestors(
        &self,
        node: &Node,
        conditions: NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, NodeServiceError> {
        self.queries
            .get_ancestors(node, conditions, fields, options)
            .await
    }

    /// Children tree over the whole collection, or below `args.root_node`
    pub async fn get_children_tree(
        &self,
        args: ChildrenTreeArgs,
    ) -> Result<Vec<TreeNode>, NodeServiceError> {
        self.queries.get_children_tree(args).await
    }

    /// Children tree below `node`
    pub async fn get_node_children_tree(
        &self,
        node: &Node,
        args: ChildrenTreeArgs,
    ) -> Result<Vec<TreeNode>, NodeServiceError> {
        self.queries
            .get_children_tree(args.with_root_node(node.clone()))
            .await
    }
}
