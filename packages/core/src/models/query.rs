//! Store Query Types
//!
//! Filters, projections and find options passed to `NodeStore`. These are
//! plain data; the Store decides how to execute them.

use super::node::{Node, ValidationError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison operator for property filters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FilterOperator {
    /// Equality (=)
    Equals,
    /// Inequality (!=)
    NotEquals,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal (<=)
    LessThanOrEqual,
    /// String contains
    Contains,
    /// String starts with
    StartsWith,
    /// String ends with
    EndsWith,
}

/// Filter on a top-level key of a node's `properties`
///
/// # Examples
///
/// ```rust
/// # use mpath_core::models::{PropertyFilter, FilterOperator};
/// # use serde_json::json;
/// let filter = PropertyFilter::new("name".to_string(), FilterOperator::Equals, json!("Sweden"));
/// assert!(filter.is_ok());
///
/// let filter = PropertyFilter::new(String::new(), FilterOperator::Equals, json!("Sweden"));
/// assert!(filter.is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyFilter {
    /// Property key
    pub key: String,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Value to compare against
    pub value: serde_json::Value,
}

impl PropertyFilter {
    /// Create a new PropertyFilter, rejecting empty keys
    pub fn new(
        key: String,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        if key.is_empty() {
            return Err(ValidationError::InvalidProperties(
                "property filter key cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            key,
            operator,
            value,
        })
    }

    /// Evaluate this filter against a node
    pub fn matches(&self, node: &Node) -> bool {
        let Some(actual) = node.properties.get(&self.key) else {
            return self.operator == FilterOperator::NotEquals;
        };

        match self.operator {
            FilterOperator::Equals => actual == &self.value,
            FilterOperator::NotEquals => actual != &self.value,
            FilterOperator::GreaterThan => {
                compare_json(actual, &self.value) == Some(Ordering::Greater)
            }
            FilterOperator::GreaterThanOrEqual => matches!(
                compare_json(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOperator::LessThan => compare_json(actual, &self.value) == Some(Ordering::Less),
            FilterOperator::LessThanOrEqual => matches!(
                compare_json(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOperator::Contains => match (actual.as_str(), self.value.as_str()) {
                (Some(a), Some(v)) => a.contains(v),
                _ => false,
            },
            FilterOperator::StartsWith => match (actual.as_str(), self.value.as_str()) {
                (Some(a), Some(v)) => a.starts_with(v),
                _ => false,
            },
            FilterOperator::EndsWith => match (actual.as_str(), self.value.as_str()) {
                (Some(a), Some(v)) => a.ends_with(v),
                _ => false,
            },
        }
    }
}

/// Ordering between two JSON scalars of the same kind
pub(crate) fn compare_json(a: &serde_json::Value, b: &serde_json::Value) -> Option<Ordering> {
    use serde_json::Value;

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Conditions selecting nodes from the Store (all AND-ed together)
///
/// # Examples
///
/// ```rust
/// # use mpath_core::models::NodeFilter;
/// // Direct children of "eu"
/// let filter = NodeFilter::new().with_parent("eu".to_string());
///
/// // Whole subtree below "eu"
/// let filter = NodeFilter::new().with_path_prefix("#eu#".to_string());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    /// Filter by a single id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Filter by id membership
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,

    /// Filter by parent id (equality)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Anchored prefix match on `path`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    /// Filter for root nodes only (or non-roots only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_root: Option<bool>,

    /// Filters on `properties` values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_filters: Option<Vec<PropertyFilter>>,
}

impl NodeFilter {
    /// Create a new empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by a single id
    pub fn with_id(mut self, id: String) -> Self {
        self.id = Some(id);
        self
    }

    /// Filter by specific ids
    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Filter by parent id
    pub fn with_parent(mut self, parent: String) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Filter by anchored path prefix
    pub fn with_path_prefix(mut self, prefix: String) -> Self {
        self.path_prefix = Some(prefix);
        self
    }

    /// Filter for root nodes only
    pub fn with_is_root(mut self, is_root: bool) -> Self {
        self.is_root = Some(is_root);
        self
    }

    /// Add a property filter (can be called multiple times)
    pub fn with_property_filter(mut self, filter: PropertyFilter) -> Self {
        self.property_filters.get_or_insert_with(Vec::new).push(filter);
        self
    }

    /// Evaluate every condition against a node
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(id) = &self.id {
            if &node.id != id {
                return false;
            }
        }

        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| id == &node.id) {
                return false;
            }
        }

        if let Some(parent) = &self.parent {
            if node.parent.as_deref() != Some(parent.as_str()) {
                return false;
            }
        }

        if let Some(prefix) = &self.path_prefix {
            match node.path.as_deref() {
                Some(path) if path.starts_with(prefix.as_str()) => {}
                _ => return false,
            }
        }

        if let Some(is_root) = self.is_root {
            if node.is_root() != is_root {
                return false;
            }
        }

        self.property_filters
            .iter()
            .flatten()
            .all(|filter| filter.matches(node))
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

/// One sort key: `id`, `parent`, `path`, or a property name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Compare two nodes on this key; missing values sort first
    pub fn compare(&self, a: &Node, b: &Node) -> Ordering {
        let ordering = match self.field.as_str() {
            "id" => a.id.cmp(&b.id),
            "parent" => a.parent.cmp(&b.parent),
            "path" => a.path.cmp(&b.path),
            key => match (a.properties.get(key), b.properties.get(key)) {
                (Some(x), Some(y)) => compare_json(x, y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        };

        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

/// Options for `NodeStore::find`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    /// Sort keys, applied in order
    #[serde(default)]
    pub sort: Vec<SortKey>,

    /// Limit number of results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Offset for pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sort key
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sorts_on(&self, field: &str) -> bool {
        self.sort.iter().any(|key| key.field == field)
    }

    /// Compare two nodes on every sort key in turn
    pub fn compare(&self, a: &Node, b: &Node) -> Ordering {
        self.sort
            .iter()
            .map(|key| key.compare(a, b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// Field projection for `NodeStore::find`
///
/// `id` is always returned. `parent` and `path` are returned only when named;
/// any other name selects a key of `properties`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldSelection {
    pub fields: Vec<String>,
}

impl FieldSelection {
    /// Build a projection from a space-separated field list, e.g. `"name path"`
    pub fn parse(fields: &str) -> Self {
        Self {
            fields: fields.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn includes(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Add a field if it is not already selected
    pub fn ensure(&mut self, field: &str) {
        if !self.includes(field) {
            self.fields.push(field.to_string());
        }
    }

    /// Project a node down to the selected fields
    pub fn project(&self, mut node: Node) -> Node {
        if !self.includes("parent") {
            node.parent = None;
        }
        if !self.includes("path") {
            node.path = None;
        }
        if let Some(properties) = node.properties.as_object_mut() {
            properties.retain(|key, _| self.includes(key));
        }
        node
    }
}
