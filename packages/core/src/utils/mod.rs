//! Pure helpers for callers that already hold node data
//!
//! - `path_codec` - child paths, levels and ancestor ids from a materialized path
//! - `tree_assembler` - flat list to nested tree and back

pub mod path_codec;
pub mod tree_assembler;

pub use path_codec::{ancestor_ids, child_path, contains_segment, level, replace_prefix};
pub use tree_assembler::{assemble_tree, flatten_tree};
