//! In-memory NodeStore
//!
//! A reference `NodeStore` backed by a `BTreeMap`, used by the test suite and
//! the demo binary. Besides the trait it offers operation counters and update
//! failure injection, which is how the service's Store traffic and partial
//! failure behaviour are observed in tests.

use crate::db::{DatabaseError, NodeStore, NodeStream};
use crate::models::{DeleteResult, FieldSelection, FindOptions, Node, NodeFilter, NodeUpdate};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of the store's operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// `find_one`, `find` and `stream_matching` calls
    pub reads: usize,
    /// `upsert`, `update_by_id`, `delete_matching` and `delete_by_id` calls
    pub writes: usize,
    /// `update_by_id` calls alone
    pub updates: usize,
    /// Highest number of `update_by_id` calls observed running at once
    pub max_concurrent_updates: usize,
}

impl StoreStats {
    pub fn total(&self) -> usize {
        self.reads + self.writes
    }
}

#[derive(Default)]
struct Counters {
    reads: AtomicUsize,
    writes: AtomicUsize,
    updates: AtomicUsize,
    in_flight_updates: AtomicUsize,
    max_concurrent_updates: AtomicUsize,
}

/// Ordered in-memory document collection
///
/// Documents are kept ordered by id, which is also the natural order of
/// unsorted `find` results.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    nodes: Arc<RwLock<BTreeMap<String, Node>>>,
    counters: Arc<Counters>,
    failing_updates: Arc<RwLock<HashSet<String>>>,
    update_delay: Option<Duration>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose `update_by_id` takes at least `delay`
    ///
    /// Slow updates make the worker pool's concurrency observable.
    pub fn with_update_delay(delay: Duration) -> Self {
        Self {
            update_delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make every subsequent `update_by_id` of `id` fail
    pub async fn fail_updates_for(&self, id: impl Into<String>) {
        self.failing_updates.write().await.insert(id.into());
    }

    /// Read a document without touching the counters
    pub async fn get_node(&self, id: &str) -> Option<Node> {
        self.nodes.read().await.get(id).cloned()
    }

    /// Every document, ordered by id, without touching the counters
    pub async fn snapshot(&self) -> Vec<Node> {
        self.nodes.read().await.values().cloned().collect()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    /// Current operation counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.counters.reads.load(Ordering::SeqCst),
            writes: self.counters.writes.load(Ordering::SeqCst),
            updates: self.counters.updates.load(Ordering::SeqCst),
            max_concurrent_updates: self.counters.max_concurrent_updates.load(Ordering::SeqCst),
        }
    }

    /// Zero every counter
    pub fn reset_stats(&self) {
        self.counters.reads.store(0, Ordering::SeqCst);
        self.counters.writes.store(0, Ordering::SeqCst);
        self.counters.updates.store(0, Ordering::SeqCst);
        self.counters.max_concurrent_updates.store(0, Ordering::SeqCst);
    }

    fn count_read(&self) {
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn count_write(&self) {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NodeStore for InMemoryStore {
    async fn find_one(&self, filter: &NodeFilter) -> Result<Option<Node>, DatabaseError> {
        self.count_read();
        let nodes = self.nodes.read().await;

        Ok(nodes.values().find(|node| filter.matches(node)).cloned())
    }

    async fn find(
        &self,
        filter: &NodeFilter,
        fields: Option<&FieldSelection>,
        options: &FindOptions,
    ) -> Result<Vec<Node>, DatabaseError> {
        self.count_read();
        let mut matched: Vec<Node> = {
            let nodes = self.nodes.read().await;
            nodes
                .values()
                .filter(|node| filter.matches(node))
                .cloned()
                .collect()
        };

        if !options.sort.is_empty() {
            matched.sort_by(|a, b| options.compare(a, b));
        }

        let results = matched
            .into_iter()
            .skip(options.offset.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|node| match fields {
                Some(selection) => selection.project(node),
                None => node,
            })
            .collect();

        Ok(results)
    }

    async fn stream_matching(&self, filter: &NodeFilter) -> Result<NodeStream, DatabaseError> {
        self.count_read();
        let ids: Vec<String> = {
            let nodes = self.nodes.read().await;
            nodes
                .values()
                .filter(|node| filter.matches(node))
                .map(|node| node.id.clone())
                .collect()
        };

        tracing::debug!("Opened stream over {} matching documents", ids.len());

        let nodes = self.nodes.clone();
        let stream = futures::stream::iter(ids)
            .then(move |id| {
                let nodes = nodes.clone();
                async move { nodes.read().await.get(&id).cloned() }
            })
            .filter_map(|node| async move { node.map(Ok::<Node, DatabaseError>) });

        Ok(stream.boxed())
    }

    async fn upsert(&self, node: Node) -> Result<Node, DatabaseError> {
        self.count_write();
        self.nodes
            .write()
            .await
            .insert(node.id.clone(), node.clone());

        Ok(node)
    }

    async fn update_by_id(&self, id: &str, update: NodeUpdate) -> Result<(), DatabaseError> {
        self.count_write();
        self.counters.updates.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.counters.in_flight_updates.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters
            .max_concurrent_updates
            .fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing_updates.read().await.contains(id) {
            Err(DatabaseError::InjectedFailure { id: id.to_string() })
        } else {
            match self.nodes.write().await.get_mut(id) {
                Some(node) => {
                    update.apply_to(node);
                    Ok(())
                }
                None => Err(DatabaseError::not_found(id)),
            }
        };

        self.counters.in_flight_updates.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete_matching(&self, filter: &NodeFilter) -> Result<usize, DatabaseError> {
        self.count_write();
        let mut nodes = self.nodes.write().await;
        let before = nodes.len();
        nodes.retain(|_, node| !filter.matches(node));

        Ok(before - nodes.len())
    }

    async fn delete_by_id(&self, id: &str) -> Result<DeleteResult, DatabaseError> {
        self.count_write();
        match self.nodes.write().await.remove(id) {
            Some(_) => Ok(DeleteResult::existed()),
            None => Ok(DeleteResult::not_found()),
        }
    }
}
