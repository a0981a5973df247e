//! Bounded-concurrency consumption of a node stream
//!
//! At most `width` work futures run at once. Each streamed document is handed
//! to exactly one worker. After the first failure no further documents are
//! pulled, but work already dispatched runs to completion before the failure
//! is returned.
//!
//! A worker reports `true` when it wrote something and `false` when it looked
//! at the node and left it alone; only writes are counted.

use crate::db::{DatabaseError, NodeStream};
use crate::models::Node;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;

/// Run `work` over every streamed node, `width` at a time
///
/// Returns the number of nodes whose work reported a write, or the first
/// error.
pub(crate) async fn run_bounded<F, Fut, E>(
    mut stream: NodeStream,
    width: usize,
    mut work: F,
) -> Result<usize, E>
where
    F: FnMut(Node) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<DatabaseError>,
{
    let width = width.max(1);
    let mut in_flight = FuturesUnordered::new();
    let mut first_error: Option<E> = None;
    let mut exhausted = false;
    let mut completed = 0;

    loop {
        while first_error.is_none() && !exhausted && in_flight.len() < width {
            match stream.next().await {
                Some(Ok(node)) => in_flight.push(work(node)),
                Some(Err(e)) => first_error = Some(E::from(e)),
                None => exhausted = true,
            }
        }

        match in_flight.next().await {
            Some(Ok(true)) => completed += 1,
            Some(Ok(false)) => {}
            Some(Err(e)) => {
                if first_error.is_none() {
                    tracing::warn!(
                        "Worker failed; draining {} in-flight task(s) and stopping",
                        in_flight.len()
                    );
                    first_error = Some(e);
                }
            }
            None => break,
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(completed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn nodes(count: usize) -> NodeStream {
        let items: Vec<Result<Node, DatabaseError>> = (0..count)
            .map(|i| Ok(Node::new_with_id(format!("n{}", i), None, json!({}))))
            .collect();
        futures::stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn test_processes_every_node_once() {
        let seen = Arc::new(AtomicUsize::new(0));
        let processed = run_bounded::<_, _, DatabaseError>(nodes(23), 5, |_| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        })
        .await
        .unwrap();

        assert_eq!(processed, 23);
        assert_eq!(seen.load(Ordering::SeqCst), 23);
    }

    #[tokio::test]
    async fn test_never_exceeds_width() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        run_bounded::<_, _, DatabaseError>(nodes(20), 3, |_| {
            let running = running.clone();
            let peak = peak.clone();
            async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Ok(true)
            }
        })
        .await
        .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failure_stops_pulling_but_drains_in_flight() {
        let finished = Arc::new(AtomicUsize::new(0));

        let result = run_bounded(nodes(50), 4, |node| {
            let finished = finished.clone();
            async move {
                if node.id == "n1" {
                    return Err(DatabaseError::query_failed("boom"));
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        })
        .await;

        assert!(matches!(result, Err(DatabaseError::QueryFailed(_))));
        // n0, n2 and n3 were already dispatched alongside n1 and completed
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stream_error_is_returned() {
        let items: Vec<Result<Node, DatabaseError>> = vec![
            Ok(Node::new_with_id("a".to_string(), None, json!({}))),
            Err(DatabaseError::query_failed("cursor lost")),
            Ok(Node::new_with_id("b".to_string(), None, json!({}))),
        ];

        let result =
            run_bounded::<_, _, DatabaseError>(futures::stream::iter(items).boxed(), 2, |_| async {
                Ok(true)
            })
            .await;

        assert!(matches!(result, Err(DatabaseError::QueryFailed(_))));
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let processed = run_bounded::<_, _, DatabaseError>(nodes(0), 5, |_| async { Ok(true) })
            .await
            .unwrap();
        assert_eq!(processed, 0);
    }

    #[tokio::test]
    async fn test_only_writes_are_counted() {
        let visited = Arc::new(AtomicUsize::new(0));
        let written = run_bounded::<_, _, DatabaseError>(nodes(10), 3, |node| {
            let visited = visited.clone();
            async move {
                visited.fetch_add(1, Ordering::SeqCst);
                // Even-numbered nodes are left untouched
                let index: usize = node.id[1..].parse().unwrap();
                Ok(index % 2 == 1)
            }
        })
        .await
        .unwrap();

        assert_eq!(visited.load(Ordering::SeqCst), 10);
        assert_eq!(written, 5);
    }
}
