//! Subtree path migration
//!
//! Moves every document below one path prefix to another by rewriting the
//! leading part of its `path`. Matches are streamed from the Store and updated
//! through the bounded worker pool, so a subtree of any size is migrated
//! without loading it into memory.
//!
//! # Failure semantics
//!
//! Each document is updated at most once. When an update fails, no further
//! documents are taken from the stream, in-flight updates settle, and the
//! failure is returned as `StorePropagationFailure`. Updates that already
//! committed stay committed, so a failed rewrite can leave the subtree with a
//! mix of old and new paths.

use crate::db::NodeStore;
use crate::models::{NodeFilter, NodeUpdate};
use crate::services::error::NodeServiceError;
use crate::services::worker_pool::run_bounded;
use crate::utils::replace_prefix;
use serde::Serialize;
use std::sync::Arc;

/// Outcome of a completed prefix rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteReport {
    pub old_prefix: String,
    pub new_prefix: String,
    /// Documents whose path was rewritten
    pub updated: usize,
}

/// Rewrites path prefixes across a subtree
#[derive(Clone)]
pub struct SubtreeRewriter {
    store: Arc<dyn NodeStore>,
    concurrency: usize,
}

impl SubtreeRewriter {
    pub fn new(store: Arc<dyn NodeStore>, concurrency: usize) -> Self {
        Self { store, concurrency }
    }

    /// Replace `old_prefix` with `new_prefix` on every path that starts with it
    ///
    /// Only documents matched when the stream opens are guaranteed to be
    /// visited. Returns once every dispatched update has settled.
    ///
    /// # Errors
    ///
    /// `StorePropagationFailure` if opening the stream, reading from it, or any
    /// update fails. Nothing is rolled back.
    pub async fn rewrite_prefix(
        &self,
        old_prefix: &str,
        new_prefix: &str,
    ) -> Result<RewriteReport, NodeServiceError> {
        let mut report = RewriteReport {
            old_prefix: old_prefix.to_string(),
            new_prefix: new_prefix.to_string(),
            updated: 0,
        };

        if old_prefix == new_prefix || old_prefix.is_empty() {
            tracing::debug!("Skipping rewrite of '{}': nothing to move", old_prefix);
            return Ok(report);
        }

        let operation = format!("Subtree rewrite '{}' -> '{}'", old_prefix, new_prefix);
        let filter = NodeFilter::new().with_path_prefix(old_prefix.to_string());
        let stream = self
            .store
            .stream_matching(&filter)
            .await
            .map_err(|e| NodeServiceError::propagation_failure(&operation, e))?;

        let store = &self.store;
        let result = run_bounded(stream, self.concurrency, |node| async move {
            // The stream may hand back a document that no longer sits under the prefix
            let Some(path) = node.path.as_deref() else {
                return Ok(false);
            };
            let Some(rewritten) = replace_prefix(path, old_prefix, new_prefix) else {
                return Ok(false);
            };

            tracing::debug!("Rewriting path of {}: '{}' -> '{}'", node.id, path, rewritten);
            store
                .update_by_id(&node.id, NodeUpdate::new().with_path(rewritten))
                .await
                .map(|_| true)
        })
        .await;

        match result {
            Ok(updated) => {
                report.updated = updated;
                tracing::info!(
                    "Migrated {} descendant(s) from '{}' to '{}'",
                    updated,
                    old_prefix,
                    new_prefix
                );
                Ok(report)
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", operation, e);
                Err(NodeServiceError::propagation_failure(operation, e))
            }
        }
    }
}
