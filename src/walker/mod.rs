//! Concurrent traversal of the scanned subtree.

mod tree_walker;

pub use tree_walker::{TreeWalker, WalkerCreationError};
