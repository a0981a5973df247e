//! Node Lifecycle Controller
//!
//! Keeps `path` consistent with `parent` across saves and removals.
//!
//! # Save
//!
//! A save is structural only when the node is new or its `parent` differs
//! from the persisted value. For structural saves the controller:
//!
//! 1. Reads the parent and derives the node's own path from it (`""` for roots)
//! 2. Lets the node's own write carry that path
//! 3. For a moved existing node, migrates every descendant from the old child
//!    prefix to the new one
//!
//! Non-structural saves issue no Store traffic beyond the node's own write.
//!
//! # Removal
//!
//! Runs before the node itself is deleted, following `OnDelete`:
//!
//! - `Delete`: one bulk delete of everything below the node's child prefix
//! - `Reparent`: every direct child is saved with the removed node's former
//!   parent, which re-derives its path and cascades to its own descendants
//!
//! A node whose `path` is undefined is removed without touching any other
//! document.

use crate::db::NodeStore;
use crate::models::{MpathConfig, Node, NodeFilter, OnDelete, TrackedNode};
use crate::services::error::NodeServiceError;
use crate::services::events::HierarchyEvent;
use crate::services::subtree_rewriter::{RewriteReport, SubtreeRewriter};
use crate::services::worker_pool::run_bounded;
use crate::utils::{child_path, contains_segment};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Descendant migration owed by a save that moved an existing node
///
/// Produced by `prepare_save`, settled by `finish_save` once the node's own
/// write has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeMove {
    pub node_id: String,
    /// Child prefix before the move, e.g. `#eu#se#`
    pub old_prefix: String,
    /// Child prefix after the move, e.g. `#af#se#`
    pub new_prefix: String,
}

/// What a removal did to the removed node's descendants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The node's path was undefined; nothing else was touched
    Skipped,
    /// `Delete` policy: documents deleted below the node
    SubtreeDeleted { deleted: usize },
    /// `Reparent` policy: direct children moved to `new_parent`
    ChildrenReparented {
        reparented: usize,
        new_parent: Option<String>,
    },
}

/// Save and removal hooks for materialized paths
#[derive(Clone)]
pub struct NodeLifecycleController {
    store: Arc<dyn NodeStore>,
    config: MpathConfig,
    rewriter: SubtreeRewriter,
    event_tx: broadcast::Sender<HierarchyEvent>,
}

impl NodeLifecycleController {
    pub fn new(
        store: Arc<dyn NodeStore>,
        config: MpathConfig,
        event_tx: broadcast::Sender<HierarchyEvent>,
    ) -> Self {
        let rewriter = SubtreeRewriter::new(store.clone(), config.concurrency);
        Self {
            store,
            config,
            rewriter,
            event_tx,
        }
    }

    fn emit_event(&self, event: HierarchyEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Derive the node's path before its own write
    ///
    /// Assigns the new path to `doc` and returns the descendant migration the
    /// save owes, if any. Returns `Ok(None)` without any Store call when the
    /// node is neither new nor re-parented.
    ///
    /// # Errors
    ///
    /// - `ParentNotFound` if `parent` names a missing document
    /// - `CircularReference` if the parent lies inside the node's own subtree
    ///   (only when `reject_cycles` is set)
    pub async fn prepare_save(
        &self,
        doc: &mut TrackedNode,
    ) -> Result<Option<SubtreeMove>, NodeServiceError> {
        if !doc.is_new() && !doc.is_parent_modified() {
            tracing::debug!("Save of {} leaves the hierarchy unchanged", doc.id());
            return Ok(None);
        }

        let separator = self.config.path_separator;
        let parent_id = doc.node().parent.clone().filter(|p| !p.is_empty());

        let new_path = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .store
                    .find_one(&NodeFilter::new().with_id(parent_id.clone()))
                    .await?
                    .ok_or_else(|| NodeServiceError::parent_not_found(&parent_id))?;

                if self.config.reject_cycles {
                    self.ensure_acyclic(doc.id(), &parent)?;
                }

                parent.child_path(separator)
            }
            None => String::new(),
        };

        tracing::debug!("Derived path '{}' for {}", new_path, doc.id());

        let pending = if doc.is_new() {
            None
        } else {
            match doc.persisted_path() {
                Some(old_path) => {
                    let old_prefix = child_path(old_path, doc.id(), separator);
                    let new_prefix = child_path(&new_path, doc.id(), separator);
                    (old_prefix != new_prefix).then(|| SubtreeMove {
                        node_id: doc.id().to_string(),
                        old_prefix,
                        new_prefix,
                    })
                }
                None => {
                    tracing::warn!(
                        "{} changed parent with an undefined path; descendants left as they are",
                        doc.id()
                    );
                    None
                }
            }
        };

        doc.node_mut().path = Some(new_path);
        Ok(pending)
    }

    fn ensure_acyclic(&self, node_id: &str, parent: &Node) -> Result<(), NodeServiceError> {
        let inside_subtree = parent.id == node_id
            || parent.path.as_deref().is_some_and(|path| {
                contains_segment(path, node_id, self.config.path_separator)
            });

        if inside_subtree {
            return Err(NodeServiceError::circular_reference(node_id, &parent.id));
        }
        Ok(())
    }

    /// Migrate descendants after the moved node's own write succeeded
    pub async fn finish_save(
        &self,
        pending: SubtreeMove,
    ) -> Result<RewriteReport, NodeServiceError> {
        tracing::info!(
            "Moving subtree of {} from '{}' to '{}'",
            pending.node_id,
            pending.old_prefix,
            pending.new_prefix
        );

        let report = self
            .rewriter
            .rewrite_prefix(&pending.old_prefix, &pending.new_prefix)
            .await?;

        self.emit_event(HierarchyEvent::SubtreeRewritten {
            old_prefix: report.old_prefix.clone(),
            new_prefix: report.new_prefix.clone(),
            updated: report.updated,
        });
        Ok(report)
    }

    /// Full save: derive the path, write the node, then migrate descendants
    ///
    /// Completes only when the descendant migration has settled. On success
    /// `doc` is marked persisted.
    pub async fn save_tracked(&self, doc: &mut TrackedNode) -> Result<Node, NodeServiceError> {
        let created = doc.is_new();
        let pending = self.prepare_save(doc).await?;

        let saved = self.store.upsert(doc.node().clone()).await?;
        doc.mark_persisted();
        self.emit_event(HierarchyEvent::NodeSaved {
            node: saved.clone(),
            created,
        });

        if let Some(pending) = pending {
            self.finish_save(pending).await?;
        }

        Ok(saved)
    }

    /// Fix up the hierarchy below a node that is about to be deleted
    ///
    /// Does not delete the node itself.
    ///
    /// # Errors
    ///
    /// `StorePropagationFailure` when the bulk delete, the child stream or a
    /// child's save fails at the Store. A failed reparent is not rolled back.
    /// `ParentNotFound` if the removed node's former parent no longer exists.
    pub async fn before_remove(&self, node: &Node) -> Result<RemovalOutcome, NodeServiceError> {
        if node.path.is_none() {
            tracing::debug!("{} has an undefined path; skipping descendant handling", node.id);
            return Ok(RemovalOutcome::Skipped);
        }

        match self.config.on_delete {
            OnDelete::Delete => self.delete_subtree(node).await,
            OnDelete::Reparent => self.reparent_children(node).await,
        }
    }

    async fn delete_subtree(&self, node: &Node) -> Result<RemovalOutcome, NodeServiceError> {
        let prefix = node.child_path(self.config.path_separator);
        let deleted = self
            .store
            .delete_matching(&NodeFilter::new().with_path_prefix(prefix.clone()))
            .await
            .map_err(|e| NodeServiceError::propagation_failure("Subtree delete", e))?;

        tracing::info!("Deleted {} descendant(s) of {} below '{}'", deleted, node.id, prefix);
        self.emit_event(HierarchyEvent::SubtreeDeleted {
            removed_id: node.id.clone(),
            count: deleted,
        });
        Ok(RemovalOutcome::SubtreeDeleted { deleted })
    }

    async fn reparent_children(&self, node: &Node) -> Result<RemovalOutcome, NodeServiceError> {
        let new_parent = node.parent.clone().filter(|p| !p.is_empty());
        let operation = format!("Reparenting children of {}", node.id);

        let children = self
            .store
            .stream_matching(&NodeFilter::new().with_parent(node.id.clone()))
            .await
            .map_err(|e| NodeServiceError::propagation_failure(&operation, e))?;

        let new_parent_ref = &new_parent;
        let reparented = run_bounded(children, self.config.concurrency, |child| async move {
            let mut doc = TrackedNode::from_persisted(child);
            doc.set_parent(new_parent_ref.clone());
            self.save_tracked(&mut doc).await.map(|_| true)
        })
        .await
        .map_err(|e| match e {
            NodeServiceError::DatabaseError(source) => {
                NodeServiceError::propagation_failure(&operation, source)
            }
            other => other,
        })?;

        tracing::info!(
            "Moved {} child(ren) of {} to {:?}",
            reparented,
            node.id,
            new_parent
        );
        self.emit_event(HierarchyEvent::ChildrenReparented {
            removed_id: node.id.clone(),
            new_parent: new_parent.clone(),
            count: reparented,
        });
        Ok(RemovalOutcome::ChildrenReparented {
            reparented,
            new_parent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryStore;
    use crate::services::events::HIERARCHY_EVENT_CHANNEL_CAPACITY;
    use serde_json::json;

    fn controller(store: &InMemoryStore, config: MpathConfig) -> NodeLifecycleController {
        let (event_tx, _) = broadcast::channel(HIERARCHY_EVENT_CHANNEL_CAPACITY);
        NodeLifecycleController::new(Arc::new(store.clone()), config, event_tx)
    }

    fn new_doc(id: &str, parent: Option<&str>) -> TrackedNode {
        TrackedNode::new(Node::new_with_id(
            id.to_string(),
            parent.map(str::to_string),
            json!({}),
        ))
    }

    #[tokio::test]
    async fn test_prepare_save_derives_paths() {
        let store = InMemoryStore::new();
        let lifecycle = controller(&store, MpathConfig::default());

        let mut eu = new_doc("eu", None);
        lifecycle.save_tracked(&mut eu).await.unwrap();
        let mut se = new_doc("se", Some("eu"));
        lifecycle.save_tracked(&mut se).await.unwrap();
        let mut sthlm = new_doc("sthlm", Some("se"));
        let pending = lifecycle.prepare_save(&mut sthlm).await.unwrap();

        assert!(pending.is_none());
        assert_eq!(eu.node().path.as_deref(), Some(""));
        assert_eq!(se.node().path.as_deref(), Some("#eu#"));
        assert_eq!(sthlm.node().path.as_deref(), Some("#eu#se#"));
    }

    #[tokio::test]
    async fn test_prepare_save_is_silent_without_structural_change() {
        let store = InMemoryStore::new();
        let lifecycle = controller(&store, MpathConfig::default());
        let mut doc = TrackedNode::from_persisted(Node::new_with_id(
            "se".to_string(),
            Some("missing".to_string()),
            json!({}),
        ));
        doc.merge_properties(json!({ "name": "Sweden" }));

        assert!(lifecycle.prepare_save(&mut doc).await.unwrap().is_none());
        assert_eq!(store.stats().total(), 0);
    }

    #[tokio::test]
    async fn test_prepare_save_missing_parent() {
        let store = InMemoryStore::new();
        let lifecycle = controller(&store, MpathConfig::default());
        let mut doc = new_doc("se", Some("nowhere"));

        let err = lifecycle.prepare_save(&mut doc).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::ParentNotFound { .. }));
        assert_eq!(doc.node().path.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_prepare_save_reports_subtree_move() {
        let store = InMemoryStore::new();
        let lifecycle = controller(&store, MpathConfig::default());
        for (id, parent) in [("af", None), ("eu", None), ("se", Some("eu"))] {
            lifecycle.save_tracked(&mut new_doc(id, parent)).await.unwrap();
        }

        let mut se = TrackedNode::from_persisted(store.get_node("se").await.unwrap());
        se.set_parent(Some("af".to_string()));
        let pending = lifecycle.prepare_save(&mut se).await.unwrap().unwrap();

        assert_eq!(pending.old_prefix, "#eu#se#");
        assert_eq!(pending.new_prefix, "#af#se#");
        assert_eq!(se.node().path.as_deref(), Some("#af#"));
    }

    #[tokio::test]
    async fn test_cycle_rejection_is_configurable() {
        let store = InMemoryStore::new();
        let lifecycle = controller(&store, MpathConfig::default());
        for (id, parent) in [("a", None), ("b", Some("a")), ("c", Some("b"))] {
            lifecycle.save_tracked(&mut new_doc(id, parent)).await.unwrap();
        }

        let mut a = TrackedNode::from_persisted(store.get_node("a").await.unwrap());
        a.set_parent(Some("c".to_string()));
        let err = lifecycle.prepare_save(&mut a).await.unwrap_err();
        assert!(matches!(err, NodeServiceError::CircularReference { .. }));

        let permissive = controller(&store, MpathConfig::default().with_reject_cycles(false));
        let mut a = TrackedNode::from_persisted(store.get_node("a").await.unwrap());
        a.set_parent(Some("c".to_string()));
        assert!(permissive.prepare_save(&mut a).await.is_ok());
    }

    #[tokio::test]
    async fn test_before_remove_skips_undefined_path() {
        let store = InMemoryStore::new();
        let lifecycle = controller(&store, MpathConfig::default());
        let mut node = Node::new_with_id("se".to_string(), Some("eu".to_string()), json!({}));
        node.path = None;

        let outcome = lifecycle.before_remove(&node).await.unwrap();
        assert_eq!(outcome, RemovalOutcome::Skipped);
        assert_eq!(store.stats().total(), 0);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let store = InMemoryStore::new();
        let (event_tx, mut rx) = broadcast::channel(HIERARCHY_EVENT_CHANNEL_CAPACITY);
        let lifecycle =
            NodeLifecycleController::new(Arc::new(store.clone()), MpathConfig::default(), event_tx);

        lifecycle.save_tracked(&mut new_doc("eu", None)).await.unwrap();

        match rx.recv().await.unwrap() {
            HierarchyEvent::NodeSaved { node, created } => {
                assert_eq!(node.id, "eu");
                assert!(created);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
