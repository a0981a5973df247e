//! Tests for TreeQueryService
//!
//! Queries run against an `InMemoryStore` seeded with paths directly, so
//! these tests do not depend on the lifecycle controller.

#[cfg(test)]
mod tests {
    use crate::db::{DatabaseError, InMemoryStore, NodeStore, NodeStream};
    use crate::models::{
        DeleteResult, FieldSelection, FilterOperator, FindOptions, MpathConfig, Node, NodeFilter,
        NodeUpdate, PropertyFilter, SortKey, TreeQueryErrorPolicy,
    };
    use crate::services::error::NodeServiceError;
    use crate::services::query_service::{ChildrenTreeArgs, TreeQueryService};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    /// Store whose every read fails
    struct UnreachableStore;

    #[async_trait]
    impl NodeStore for UnreachableStore {
        async fn find_one(&self, _: &NodeFilter) -> Result<Option<Node>, DatabaseError> {
            Err(DatabaseError::query_failed("connection refused"))
        }

        async fn find(
            &self,
            _: &NodeFilter,
            _: Option<&FieldSelection>,
            _: &FindOptions,
        ) -> Result<Vec<Node>, DatabaseError> {
            Err(DatabaseError::query_failed("connection refused"))
        }

        async fn stream_matching(&self, _: &NodeFilter) -> Result<NodeStream, DatabaseError> {
            Err(DatabaseError::query_failed("connection refused"))
        }

        async fn upsert(&self, node: Node) -> Result<Node, DatabaseError> {
            Err(DatabaseError::write_failed(node.id, "read-only"))
        }

        async fn update_by_id(&self, id: &str, _: NodeUpdate) -> Result<(), DatabaseError> {
            Err(DatabaseError::write_failed(id, "read-only"))
        }

        async fn delete_matching(&self, _: &NodeFilter) -> Result<usize, DatabaseError> {
            Err(DatabaseError::query_failed("connection refused"))
        }

        async fn delete_by_id(&self, id: &str) -> Result<DeleteResult, DatabaseError> {
            Err(DatabaseError::write_failed(id, "read-only"))
        }
    }

    fn located(id: &str, parent: Option<&str>, path: &str) -> Node {
        let mut node = Node::new_with_id(
            id.to_string(),
            parent.map(str::to_string),
            json!({ "name": id.to_uppercase(), "rank": id.len() }),
        );
        node.path = Some(path.to_string());
        node
    }

    /// Helper to create a query service over the location fixture
    async fn create_test_services() -> (TreeQueryService, InMemoryStore) {
        let store = InMemoryStore::new();
        for node in [
            located("af", None, ""),
            located("eu", None, ""),
            located("no", Some("eu"), "#eu#"),
            located("se", Some("eu"), "#eu#"),
            located("sthlm", Some("se"), "#eu#se#"),
            located("skansen", Some("sthlm"), "#eu#se#sthlm#"),
        ] {
            store.upsert(node).await.unwrap();
        }
        store.reset_stats();

        let service = TreeQueryService::new(Arc::new(store.clone()), &MpathConfig::default());
        (service, store)
    }

    fn ids(nodes: &[Node]) -> Vec<&str> {
        nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_immediate_children() {
        let (service, store) = create_test_services().await;
        let eu = store.get_node("eu").await.unwrap();

        let children = service
            .get_immediate_children(&eu, NodeFilter::new(), None, &FindOptions::new())
            .await
            .unwrap();

        assert_eq!(ids(&children), vec!["no", "se"]);
    }

    #[tokio::test]
    async fn test_immediate_children_owned_condition_wins() {
        let (service, store) = create_test_services().await;
        let eu = store.get_node("eu").await.unwrap();

        // Caller's parent condition is replaced by eu
        let conditions = NodeFilter::new()
            .with_parent("af".to_string())
            .with_property_filter(
                PropertyFilter::new("name".to_string(), FilterOperator::Equals, json!("SE"))
                    .unwrap(),
            );
        let children = service
            .get_immediate_children(&eu, conditions, None, &FindOptions::new())
            .await
            .unwrap();

        assert_eq!(ids(&children), vec!["se"]);
    }

    #[tokio::test]
    async fn test_all_descendants() {
        let (service, store) = create_test_services().await;
        let eu = store.get_node("eu").await.unwrap();
        let se = store.get_node("se").await.unwrap();

        let below_eu = service
            .get_all_descendants(&eu, NodeFilter::new(), None, &FindOptions::new())
            .await
            .unwrap();
        let below_se = service
            .get_all_descendants(&se, NodeFilter::new(), None, &FindOptions::new())
            .await
            .unwrap();

        assert_eq!(ids(&below_eu), vec!["no", "se", "skansen", "sthlm"]);
        assert_eq!(ids(&below_se), vec!["skansen", "sthlm"]);
    }

    #[tokio::test]
    async fn test_get_parent() {
        let (service, store) = create_test_services().await;
        let sthlm = store.get_node("sthlm").await.unwrap();
        let af = store.get_node("af").await.unwrap();

        let parent = service
            .get_parent(&sthlm, Some(&FieldSelection::parse("name")), &FindOptions::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(parent.id, "se");
        assert_eq!(parent.properties, json!({ "name": "SE" }));

        store.reset_stats();
        let none = service
            .get_parent(&af, None, &FindOptions::new())
            .await
            .unwrap();
        assert!(none.is_none());
        assert_eq!(store.stats().reads, 0);
    }

    #[tokio::test]
    async fn test_ancestors_are_exactly_the_path_ids() {
        let (service, store) = create_test_services().await;
        let skansen = store.get_node("skansen").await.unwrap();

        let unsorted = service
            .get_ancestors(&skansen, NodeFilter::new(), None, &FindOptions::new())
            .await
            .unwrap();
        let mut found = ids(&unsorted);
        found.sort_unstable();
        assert_eq!(found, vec!["eu", "se", "sthlm"]);

        let root_first = service
            .get_ancestors(
                &skansen,
                NodeFilter::new(),
                None,
                &FindOptions::new().with_sort(SortKey::asc("path")),
            )
            .await
            .unwrap();
        assert_eq!(ids(&root_first), vec!["eu", "se", "sthlm"]);
    }

    #[tokio::test]
    async fn test_root_has_no_ancestors() {
        let (service, store) = create_test_services().await;
        let eu = store.get_node("eu").await.unwrap();

        let ancestors = service
            .get_ancestors(&eu, NodeFilter::new(), None, &FindOptions::new())
            .await
            .unwrap();

        assert!(ancestors.is_empty());
        assert_eq!(store.stats().reads, 0);
    }

    #[tokio::test]
    async fn test_children_tree_of_collection() {
        let (service, _store) = create_test_services().await;

        let forest = service
            .get_children_tree(ChildrenTreeArgs::new())
            .await
            .unwrap();

        let roots: Vec<_> = forest.iter().map(|t| t.node.id.as_str()).collect();
        assert_eq!(roots, vec!["af", "eu"]);
        assert_eq!(forest[1].size(), 5);
        let sthlm = forest[1].find("sthlm").unwrap();
        assert_eq!(sthlm.children[0].node.id, "skansen");
    }

    #[tokio::test]
    async fn test_children_tree_scoped_to_root_node() {
        let (service, store) = create_test_services().await;
        let eu = store.get_node("eu").await.unwrap();

        let forest = service
            .get_children_tree(ChildrenTreeArgs::new().with_root_node(eu))
            .await
            .unwrap();

        let roots: Vec<_> = forest.iter().map(|t| t.node.id.as_str()).collect();
        assert_eq!(roots, vec!["no", "se"]);
        assert_eq!(forest[1].children[0].node.id, "sthlm");
    }

    #[tokio::test]
    async fn test_children_tree_forces_structural_fields() {
        let (service, _store) = create_test_services().await;

        let forest = service
            .get_children_tree(ChildrenTreeArgs::new().with_fields(FieldSelection::parse("name")))
            .await
            .unwrap();

        let eu = forest.iter().find(|t| t.node.id == "eu").unwrap();
        let se = eu.find("se").unwrap();
        assert_eq!(se.node.parent.as_deref(), Some("eu"));
        assert_eq!(se.node.path.as_deref(), Some("#eu#"));
        assert_eq!(se.node.properties, json!({ "name": "SE" }));
    }

    #[tokio::test]
    async fn test_children_tree_appends_path_sort() {
        let (service, _store) = create_test_services().await;

        // Sorting on rank alone would put children before parents
        let options = FindOptions::new().with_sort(SortKey::desc("rank"));
        let forest = service
            .get_children_tree(ChildrenTreeArgs::new().with_options(options))
            .await
            .unwrap();

        let total: usize = forest.iter().map(|t| t.size()).sum();
        assert_eq!(total, 6);
        assert_eq!(forest.len(), 2);
    }

    #[tokio::test]
    async fn test_children_tree_min_level() {
        let (service, _store) = create_test_services().await;

        let forest = service
            .get_children_tree(ChildrenTreeArgs::new().with_min_level(3))
            .await
            .unwrap();

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].node.id, "sthlm");
        assert_eq!(forest[0].children[0].node.id, "skansen");
    }

    #[tokio::test]
    async fn test_children_tree_swallows_store_errors_by_default() {
        let service = TreeQueryService::new(Arc::new(UnreachableStore), &MpathConfig::default());

        let forest = service
            .get_children_tree(ChildrenTreeArgs::new())
            .await
            .unwrap();

        assert!(forest.is_empty());
    }

    #[tokio::test]
    async fn test_children_tree_can_propagate_store_errors() {
        let config =
            MpathConfig::default().with_tree_query_errors(TreeQueryErrorPolicy::Propagate);
        let service = TreeQueryService::new(Arc::new(UnreachableStore), &config);

        let err = service
            .get_children_tree(ChildrenTreeArgs::new())
            .await
            .unwrap_err();

        assert!(matches!(err, NodeServiceError::QueryAssemblyFailure { .. }));
    }
}
