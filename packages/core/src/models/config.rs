//! Configuration for the materialized-path service
use super::node::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound for the worker pool width
const MAX_CONCURRENCY: usize = 256;

/// What happens to a removed node's descendants
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum OnDelete {
    /// Delete the whole subtree below the removed node
    Delete,
    /// Attach direct children to the removed node's former parent
    #[default]
    Reparent,
}

/// Concrete type of node identifiers
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    /// Any caller-supplied string
    #[default]
    String,
    /// UUIDs; generated when a node is saved with an empty id
    Uuid,
}

impl IdType {
    /// Check a caller-supplied id against this id type
    pub fn validate(&self, id: &str) -> Result<(), ValidationError> {
        match self {
            IdType::String => Ok(()),
            IdType::Uuid => Uuid::parse_str(id)
                .map(|_| ())
                .map_err(|_| ValidationError::InvalidId(format!("'{}' is not a UUID", id))),
        }
    }

    /// Generate a fresh id, if this id type supports generation
    pub fn generate(&self) -> Option<String> {
        match self {
            IdType::String => None,
            IdType::Uuid => Some(Uuid::new_v4().to_string()),
        }
    }
}

/// How Store errors during a children-tree query are handled
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TreeQueryErrorPolicy {
    /// Log the error and return an empty tree
    #[default]
    LogAndEmpty,
    /// Return the error to the caller
    Propagate,
}

/// Settings supplied once when building a `NodeService`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MpathConfig {
    /// Removal policy
    pub on_delete: OnDelete,

    /// Identifier type
    pub id_type: IdType,

    /// Character delimiting ids inside a path
    pub path_separator: char,

    /// Maximum in-flight Store updates for subtree rewrites and reparenting
    pub concurrency: usize,

    /// Store error handling for children-tree queries
    pub tree_query_errors: TreeQueryErrorPolicy,

    /// Reject parent changes that would make a node its own ancestor
    pub reject_cycles: bool,
}

impl Default for MpathConfig {
    fn default() -> Self {
        Self {
            on_delete: OnDelete::Reparent,
            id_type: IdType::String,
            path_separator: '#',
            concurrency: 5,
            tree_query_errors: TreeQueryErrorPolicy::LogAndEmpty,
            reject_cycles: true,
        }
    }
}

impl MpathConfig {
    pub fn with_on_delete(mut self, on_delete: OnDelete) -> Self {
        self.on_delete = on_delete;
        self
    }

    pub fn with_id_type(mut self, id_type: IdType) -> Self {
        self.id_type = id_type;
        self
    }

    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_tree_query_errors(mut self, policy: TreeQueryErrorPolicy) -> Self {
        self.tree_query_errors = policy;
        self
    }

    pub fn with_reject_cycles(mut self, reject: bool) -> Self {
        self.reject_cycles = reject;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path_separator.is_alphanumeric() || self.path_separator.is_whitespace() {
            return Err(ValidationError::InvalidConfig(format!(
                "path_separator '{}' must not be alphanumeric or whitespace",
                self.path_separator
            )));
        }

        if self.id_type == IdType::Uuid && self.path_separator == '-' {
            return Err(ValidationError::InvalidConfig(
                "path_separator '-' collides with UUID ids".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(ValidationError::InvalidConfig(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.concurrency > MAX_CONCURRENCY {
            return Err(ValidationError::InvalidConfig(format!(
                "concurrency cannot exceed {}",
                MAX_CONCURRENCY
            )));
        }

        Ok(())
    }
}
