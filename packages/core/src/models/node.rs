//! Node Data Structures
//!
//! This module defines the `Node` record stored in the flat document collection
//! and the types that travel alongside it.
//!
//! # Architecture
//!
//! - **Flat Collection**: Every node is a standalone document; the hierarchy is
//!   carried by two fields, `parent` and `path`
//! - **Materialized Path**: `path` encodes the chain of ancestor ids, e.g.
//!   `#eu#se#` for a node whose ancestors are `eu` then `se`
//! - **Derived Level**: `level` is computed from `path`, never stored
//! - **Free-form Payload**: Everything else lives in the JSON `properties` field
//!
//! # Examples
//!
//! ```rust
//! use mpath_core::models::Node;
//! use serde_json::json;
//!
//! let europe = Node::new_with_id("eu".to_string(), None, json!({ "name": "Europe" }));
//! let sweden = Node::new_with_id(
//!     "se".to_string(),
//!     Some("eu".to_string()),
//!     json!({ "name": "Sweden" }),
//! );
//! assert!(europe.parent.is_none());
//! assert_eq!(sweden.parent.as_deref(), Some("eu"));
//! ```

use crate::utils::path_codec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for Node and configuration values
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid node ID format: {0}")]
    InvalidId(String),

    #[error("Invalid parent reference: {0}")]
    InvalidParent(String),

    #[error("Properties validation failed: {0}")]
    InvalidProperties(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A record in the flat document collection.
///
/// # Fields
///
/// - `id`: Unique identifier (caller supplied, or a UUID when configured)
/// - `parent`: Optional reference to the parent node's id (`None` = root)
/// - `path`: Materialized ancestor chain; `Some("")` for a persisted root,
///   `None` when the path is undefined (e.g. projected away by a query)
/// - `properties`: JSON object with all remaining fields
/// - `created_at` / `modified_at`: Timestamps maintained by the service
///
/// `path` is derived on save from the parent. Callers never set it, though
/// they may clear it to `None` to remove a node without touching its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier
    pub id: String,

    /// Parent node ID (`None` means root)
    #[serde(default)]
    pub parent: Option<String>,

    /// Materialized ancestor path (`None` = undefined)
    #[serde(default)]
    pub path: Option<String>,

    /// All entity-specific fields
    #[serde(default = "empty_properties")]
    pub properties: serde_json::Value,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn empty_properties() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl Node {
    /// Create a new Node with an auto-generated UUID
    ///
    /// The path starts out as the empty root path; it is recomputed from
    /// `parent` when the node is saved.
    pub fn new(parent: Option<String>, properties: serde_json::Value) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), parent, properties)
    }

    /// Create a new Node with a caller-supplied ID
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use mpath_core::models::Node;
    /// # use serde_json::json;
    /// let node = Node::new_with_id("sthlm".to_string(), Some("se".to_string()), json!({}));
    /// assert_eq!(node.id, "sthlm");
    /// assert_eq!(node.path.as_deref(), Some(""));
    /// ```
    pub fn new_with_id(id: String, parent: Option<String>, properties: serde_json::Value) -> Self {
        let now = Utc::now();

        Self {
            id,
            parent,
            path: Some(String::new()),
            properties,
            created_at: now,
            modified_at: now,
        }
    }

    /// Validate node structure against a path separator
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` is empty
    /// - `id` contains the path separator (path parsing would break)
    /// - `properties` is not a JSON object
    /// - Node references itself as parent
    pub fn validate(&self, separator: char) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::MissingField("id".to_string()));
        }

        if self.id.contains(separator) {
            return Err(ValidationError::InvalidId(format!(
                "'{}' contains the path separator '{}'",
                self.id, separator
            )));
        }

        if !self.properties.is_object() {
            return Err(ValidationError::InvalidProperties(
                "properties must be a JSON object".to_string(),
            ));
        }

        if self.parent.as_deref() == Some(self.id.as_str()) {
            return Err(ValidationError::InvalidParent(
                "Node cannot be its own parent".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if this node is a root (no parent)
    pub fn is_root(&self) -> bool {
        self.parent.as_deref().map_or(true, str::is_empty)
    }

    /// Depth of the node in the tree, root = 1
    ///
    /// An undefined path is treated like the empty root path.
    pub fn level(&self, separator: char) -> usize {
        path_codec::level(self.path.as_deref().unwrap_or_default(), separator)
    }

    /// The path every child of this node carries
    pub fn child_path(&self, separator: char) -> String {
        path_codec::child_path(self.path.as_deref().unwrap_or_default(), &self.id, separator)
    }

    /// Update the node's properties
    pub fn set_properties(&mut self, properties: serde_json::Value) {
        self.properties = properties;
        self.modified_at = Utc::now();
    }

    /// Merge properties with existing properties (shallow merge)
    pub fn merge_properties(&mut self, updates: serde_json::Value) {
        if let (Some(existing), Some(new)) = (self.properties.as_object_mut(), updates.as_object())
        {
            for (key, value) in new {
                existing.insert(key.clone(), value.clone());
            }
            self.modified_at = Utc::now();
        }
    }
}

/// A node together with the persisted snapshot of its structural fields.
///
/// The snapshot is what lets the lifecycle decide, without a Store round
/// trip, whether a save is a creation, a parent change, or neither.
///
/// # Examples
///
/// ```rust
/// # use mpath_core::models::{Node, TrackedNode};
/// # use serde_json::json;
/// let mut doc = TrackedNode::new(Node::new_with_id("se".to_string(), None, json!({})));
/// assert!(doc.is_new());
///
/// doc.mark_persisted();
/// assert!(!doc.is_new());
/// assert!(!doc.is_parent_modified());
///
/// doc.set_parent(Some("af".to_string()));
/// assert!(doc.is_parent_modified());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedNode {
    node: Node,
    persisted: Option<PersistedState>,
}

/// Structural fields as last written to the Store
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub parent: Option<String>,
    pub path: Option<String>,
}

impl TrackedNode {
    /// Wrap a node that has never been saved
    pub fn new(node: Node) -> Self {
        Self {
            node,
            persisted: None,
        }
    }

    /// Wrap a node freshly read from the Store
    pub fn from_persisted(node: Node) -> Self {
        let persisted = Some(PersistedState {
            parent: node.parent.clone(),
            path: node.path.clone(),
        });
        Self { node, persisted }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }

    /// True until the node has been saved once
    pub fn is_new(&self) -> bool {
        self.persisted.is_none()
    }

    /// True when `parent` differs from its persisted value
    ///
    /// `None` and `Some("")` both mean "root" and compare equal.
    pub fn is_parent_modified(&self) -> bool {
        match &self.persisted {
            Some(state) => normalize_parent(&state.parent) != normalize_parent(&self.node.parent),
            None => false,
        }
    }

    /// Path as last written to the Store (`None` for new or undefined)
    pub fn persisted_path(&self) -> Option<&str> {
        self.persisted.as_ref().and_then(|s| s.path.as_deref())
    }

    /// Change the node's parent (`None` = make it a root)
    pub fn set_parent(&mut self, parent: Option<String>) {
        self.node.parent = parent.filter(|p| !p.is_empty());
        self.node.modified_at = Utc::now();
    }

    /// Change the node's parent to the given node
    pub fn set_parent_node(&mut self, parent: &Node) {
        self.set_parent(Some(parent.id.clone()));
    }

    /// Update non-structural fields
    pub fn set_properties(&mut self, properties: serde_json::Value) {
        self.node.set_properties(properties);
    }

    /// Merge non-structural fields (shallow)
    pub fn merge_properties(&mut self, updates: serde_json::Value) {
        self.node.merge_properties(updates);
    }

    pub(crate) fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    /// Record the current structural fields as persisted
    pub fn mark_persisted(&mut self) {
        self.persisted = Some(PersistedState {
            parent: self.node.parent.clone(),
            path: self.node.path.clone(),
        });
    }
}

fn normalize_parent(parent: &Option<String>) -> Option<&str> {
    parent.as_deref().filter(|p| !p.is_empty())
}

/// Custom deserializer for optional fields that accepts both plain values and nested Options
///
/// Maps three input formats to the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (set to NULL)
/// - "value" → Some(Some("value")) (set to value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update applied with `NodeStore::update_by_id`
///
/// `parent` and `path` use the double-Option pattern:
///
/// - `None`: Don't change this field
/// - `Some(None)`: Set the field to NULL
/// - `Some(Some(value))`: Set the field to the specified value
///
/// # Examples
///
/// ```rust
/// # use mpath_core::models::NodeUpdate;
/// let update = NodeUpdate::new().with_path("#af#se#".to_string());
/// assert!(!update.is_empty());
/// assert!(update.parent.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    /// Update parent reference
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent: Option<Option<String>>,

    /// Update materialized path
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub path: Option<Option<String>>,

    /// Replace properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl NodeUpdate {
    /// Create a new empty NodeUpdate
    pub fn new() -> Self {
        Self::default()
    }

    /// Set path update
    pub fn with_path(mut self, path: String) -> Self {
        self.path = Some(Some(path));
        self
    }

    /// Set parent update
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set properties update
    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Check if update contains any changes
    pub fn is_empty(&self) -> bool {
        self.parent.is_none() && self.path.is_none() && self.properties.is_none()
    }

    /// Apply this update to a node in place
    pub fn apply_to(self, node: &mut Node) {
        if let Some(parent) = self.parent {
            node.parent = parent;
        }
        if let Some(path) = self.path {
            node.path = path;
        }
        if let Some(properties) = self.properties {
            node.properties = properties;
        }
        node.modified_at = Utc::now();
    }
}

/// A node with its assembled children
///
/// Produced by the tree assembler; `children` is never persisted. Serializes
/// as the node's own fields plus a `children` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            count += 1;
            stack.extend(tree.children.iter());
        }
        count
    }

    /// Find a node anywhere in this subtree by id, searching depth-first in
    /// sibling order
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        let mut stack = vec![self];
        while let Some(tree) = stack.pop() {
            if tree.node.id == id {
                return Some(tree);
            }
            stack.extend(tree.children.iter().rev());
        }
        None
    }
}

/// Result of a delete operation
///
/// Deleting a node that does not exist succeeds; `existed` reports whether
/// anything was actually removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResult {
    /// Whether the node existed before deletion
    pub existed: bool,
}

impl DeleteResult {
    /// Create a DeleteResult indicating the node existed
    pub fn existed() -> Self {
        Self { existed: true }
    }

    /// Create a DeleteResult indicating the node didn't exist
    pub fn not_found() -> Self {
        Self { existed: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_creation() {
        let node = Node::new(None, json!({ "name": "Africa" }));

        assert!(!node.id.is_empty());
        assert!(node.parent.is_none());
        assert_eq!(node.path.as_deref(), Some(""));
        assert!(node.is_root());
    }

    #[test]
    fn test_node_validation() {
        let node = Node::new_with_id("eu".to_string(), None, json!({}));
        assert!(node.validate('#').is_ok());
    }

    #[test]
    fn test_node_validation_rejects_separator_in_id() {
        let node = Node::new_with_id("e#u".to_string(), None, json!({}));
        assert!(matches!(
            node.validate('#'),
            Err(ValidationError::InvalidId(_))
        ));
        assert!(node.validate('/').is_ok());
    }

    #[test]
    fn test_node_validation_invalid_properties() {
        let mut node = Node::new_with_id("eu".to_string(), None, json!({}));
        node.properties = json!("not an object");

        assert!(matches!(
            node.validate('#'),
            Err(ValidationError::InvalidProperties(_))
        ));
    }

    #[test]
    fn test_node_validation_circular_parent() {
        let node = Node::new_with_id("eu".to_string(), Some("eu".to_string()), json!({}));

        assert!(matches!(
            node.validate('#'),
            Err(ValidationError::InvalidParent(_))
        ));
    }

    #[test]
    fn test_node_level_and_child_path() {
        let mut node = Node::new_with_id("sthlm".to_string(), Some("se".to_string()), json!({}));
        node.path = Some("#eu#se#".to_string());

        assert_eq!(node.level('#'), 3);
        assert_eq!(node.child_path('#'), "#eu#se#sthlm#");

        node.path = None;
        assert_eq!(node.level('#'), 1);
        assert_eq!(node.child_path('#'), "#sthlm#");
    }

    #[test]
    fn test_tracked_node_parent_modification() {
        let mut doc = TrackedNode::from_persisted(Node::new_with_id(
            "se".to_string(),
            Some("eu".to_string()),
            json!({}),
        ));
        assert!(!doc.is_new());
        assert!(!doc.is_parent_modified());

        doc.set_parent(Some("eu".to_string()));
        assert!(!doc.is_parent_modified());

        doc.set_parent(Some("af".to_string()));
        assert!(doc.is_parent_modified());
    }

    #[test]
    fn test_tracked_node_empty_parent_is_root() {
        let mut doc =
            TrackedNode::from_persisted(Node::new_with_id("eu".to_string(), None, json!({})));

        doc.set_parent(Some(String::new()));
        assert!(doc.node().parent.is_none());
        assert!(!doc.is_parent_modified());
    }

    #[test]
    fn test_node_update_apply() {
        let mut node = Node::new_with_id("se".to_string(), Some("eu".to_string()), json!({}));
        NodeUpdate::new()
            .with_parent(Some("af".to_string()))
            .with_path("#af#".to_string())
            .apply_to(&mut node);

        assert_eq!(node.parent.as_deref(), Some("af"));
        assert_eq!(node.path.as_deref(), Some("#af#"));
    }

    #[test]
    fn test_node_update_deserializes_null_as_clear() {
        let update: NodeUpdate = serde_json::from_value(json!({ "parent": null })).unwrap();
        assert_eq!(update.parent, Some(None));
        assert!(update.path.is_none());
    }

    #[test]
    fn test_tree_node_serializes_children_inline() {
        let tree = TreeNode {
            node: Node::new_with_id("eu".to_string(), None, json!({})),
            children: vec![TreeNode::leaf(Node::new_with_id(
                "se".to_string(),
                Some("eu".to_string()),
                json!({}),
            ))],
        };

        let value = serde_json::to_value(&tree).unwrap();
        assert_eq!(value["id"], "eu");
        assert_eq!(value["children"][0]["id"], "se");
        assert_eq!(tree.size(), 2);
        assert!(tree.find("se").is_some());
    }
}
