//! Materialized path encoding
//!
//! A non-root path is the chain of ancestor ids, each followed by the
//! separator and the whole led by one: `#eu#se#`. A root's path is empty.
//! None of these functions touch the Store.

/// The path a child of the node at `node_path` with id `node_id` carries
///
/// # Examples
///
/// ```
/// use mpath_core::utils::child_path;
///
/// assert_eq!(child_path("", "eu", '#'), "#eu#");
/// assert_eq!(child_path("#eu#", "se", '#'), "#eu#se#");
/// ```
pub fn child_path(node_path: &str, node_id: &str, separator: char) -> String {
    let mut path = String::with_capacity(node_path.len() + node_id.len() + 2);
    if node_path.is_empty() {
        path.push(separator);
    } else {
        path.push_str(node_path);
    }
    path.push_str(node_id);
    path.push(separator);
    path
}

/// Depth of a node from its path, root = 1
///
/// # Examples
///
/// ```
/// use mpath_core::utils::level;
///
/// assert_eq!(level("", '#'), 1);
/// assert_eq!(level("#eu#", '#'), 2);
/// assert_eq!(level("#eu#se#", '#'), 3);
/// ```
pub fn level(path: &str, separator: char) -> usize {
    segments(path, separator).count() + 1
}

/// Ancestor ids encoded in a path, root first
///
/// # Examples
///
/// ```
/// use mpath_core::utils::ancestor_ids;
///
/// assert_eq!(ancestor_ids("#eu#se#", '#'), vec!["eu", "se"]);
/// assert!(ancestor_ids("", '#').is_empty());
/// ```
pub fn ancestor_ids(path: &str, separator: char) -> Vec<String> {
    segments(path, separator).map(str::to_string).collect()
}

/// True if `id` appears as one of the path's segments
pub fn contains_segment(path: &str, id: &str, separator: char) -> bool {
    segments(path, separator).any(|segment| segment == id)
}

/// Swap `old_prefix` for `new_prefix`, leaving the suffix untouched
///
/// Returns `None` when `path` does not start with `old_prefix`.
///
/// # Examples
///
/// ```
/// use mpath_core::utils::replace_prefix;
///
/// assert_eq!(
///     replace_prefix("#eu#se#sthlm#", "#eu#se#", "#af#se#").as_deref(),
///     Some("#af#se#sthlm#")
/// );
/// assert_eq!(replace_prefix("#af#", "#eu#", "#no#"), None);
/// ```
pub fn replace_prefix(path: &str, old_prefix: &str, new_prefix: &str) -> Option<String> {
    path.strip_prefix(old_prefix)
        .map(|suffix| format!("{}{}", new_prefix, suffix))
}

fn segments(path: &str, separator: char) -> impl Iterator<Item = &str> {
    path.split(separator).filter(|segment| !segment.is_empty())
}
