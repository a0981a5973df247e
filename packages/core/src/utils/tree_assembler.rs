//! Flat list to tree reconstruction
//!
//! Builds the id → position map over the whole list before linking any child,
//! so the result does not depend on input order. Query results are still
//! sorted by `path` so siblings come out in a stable order.

use crate::models::{Node, TreeNode};
use std::collections::HashMap;

/// Nest a flat list of nodes under their parents
///
/// A node whose `parent` is present in the list becomes that parent's child;
/// every other node is returned as a root. Children and roots keep their
/// relative input order. Nodes caught in a parent cycle inside the list are
/// returned as roots as well, so no input node is ever dropped.
///
/// # Examples
///
/// ```
/// use mpath_core::models::Node;
/// use mpath_core::utils::assemble_tree;
/// use serde_json::json;
///
/// let nodes = vec![
///     Node::new_with_id("se".to_string(), Some("eu".to_string()), json!({})),
///     Node::new_with_id("eu".to_string(), None, json!({})),
/// ];
/// let roots = assemble_tree(nodes);
/// assert_eq!(roots.len(), 1);
/// assert_eq!(roots[0].node.id, "eu");
/// assert_eq!(roots[0].children[0].node.id, "se");
/// ```
pub fn assemble_tree(nodes: Vec<Node>) -> Vec<TreeNode> {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(nodes.len());
    for (position, node) in nodes.iter().enumerate() {
        positions.entry(node.id.clone()).or_insert(position);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut roots = Vec::new();
    for (position, node) in nodes.iter().enumerate() {
        match node.parent.as_deref().and_then(|parent| positions.get(parent)) {
            Some(&parent) if parent != position => children[parent].push(position),
            _ => roots.push(position),
        }
    }

    let mut slots: Vec<Option<Node>> = nodes.into_iter().map(Some).collect();
    let mut tree = Vec::with_capacity(roots.len());

    // Roots first; anything left afterwards was only reachable through a cycle
    for start in roots.into_iter().chain(0..slots.len()) {
        let Some(node) = slots[start].take() else {
            continue;
        };

        let mut stack = vec![Frame::new(node, &children[start])];
        while let Some(frame) = stack.last_mut() {
            match frame.pending.next() {
                Some(&child) => {
                    if let Some(node) = slots[child].take() {
                        stack.push(Frame::new(node, &children[child]));
                    }
                }
                None => {
                    if let Some(done) = stack.pop() {
                        let subtree = TreeNode {
                            node: done.node,
                            children: done.built,
                        };
                        match stack.last_mut() {
                            Some(parent) => parent.built.push(subtree),
                            None => tree.push(subtree),
                        }
                    }
                }
            }
        }
    }

    tree
}

/// A node whose children are still being assembled
struct Frame<'a> {
    node: Node,
    built: Vec<TreeNode>,
    pending: std::slice::Iter<'a, usize>,
}

impl<'a> Frame<'a> {
    fn new(node: Node, children: &'a [usize]) -> Self {
        Self {
            node,
            built: Vec::with_capacity(children.len()),
            pending: children.iter(),
        }
    }
}

/// Flatten a forest back into a list, parents before children (pre-order)
pub fn flatten_tree(roots: Vec<TreeNode>) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut stack: Vec<TreeNode> = roots.into_iter().rev().collect();

    while let Some(TreeNode { node, children }) = stack.pop() {
        nodes.push(node);
        stack.extend(children.into_iter().rev());
    }

    nodes
}
