//! Verification utilities for tree consistency checking.
//!
//! [`check_tree`] walks a built tree and checks that:
//! 1. Every parent hash is `H(0x01 || left || right)` of its children
//! 2. Leaf counts and heights add up from the leaves
//! 3. Every left subtree spans the largest power of two below its parent's
//!    leaf count, which is the RFC6962 shape
//! 4. The leaves, read left to right, are the store's leaf hashes in order

use super::node::TreeNode;
use super::tree::MerkleTree;
use crate::error::{MerkleError, Result};
use crate::utils::hasher::{self, Hash32, Hasher};

/// Checks every invariant of a built tree.
///
/// # Errors
/// [`MerkleError::Inconsistent`] naming the first violation found
pub fn check_tree(tree: &MerkleTree) -> Result<()> {
    let leaves = tree.leaf_hashes();
    if tree.leaf_count() != leaves.len() {
        return Err(inconsistent(format!(
            "root spans {} leaves, store holds {}",
            tree.leaf_count(),
            leaves.len()
        )));
    }
    if tree.stats().leaf_count != leaves.len() {
        return Err(inconsistent(format!(
            "build stats count {} leaves, store holds {}",
            tree.stats().leaf_count,
            leaves.len()
        )));
    }
    check_node(tree.hasher(), tree.root(), leaves, 0)
}

/// Checks the subtree `node`, whose leaves are `leaves[offset..]`.
fn check_node(
    hasher: &dyn Hasher,
    node: &TreeNode,
    leaves: &[Hash32],
    offset: usize,
) -> Result<()> {
    let Some((left, right)) = node.children() else {
        return match leaves.get(offset) {
            Some(h) if h == node.hash() && node.leaf_count() == 1 && node.height() == 0 => Ok(()),
            _ => Err(inconsistent(format!("leaf {} mismatch", offset))),
        };
    };

    let n = node.leaf_count();
    if left.leaf_count() + right.leaf_count() != n {
        return Err(inconsistent(format!("leaf count at offset {} does not add up", offset)));
    }
    if n < 2 || left.leaf_count() != split_point(n) {
        return Err(inconsistent(format!(
            "subtree of {} leaves at offset {} splits at {}",
            n,
            offset,
            left.leaf_count()
        )));
    }
    if node.height() != 1 + left.height().max(right.height()) {
        return Err(inconsistent(format!("height at offset {} does not add up", offset)));
    }
    if *node.hash() != hasher::hash_children(hasher, left.hash(), right.hash()) {
        return Err(inconsistent(format!(
            "hash mismatch for subtree of {} leaves at offset {}",
            n, offset
        )));
    }

    check_node(hasher, left, leaves, offset)?;
    check_node(hasher, right, leaves, offset + left.leaf_count())
}

/// Largest power of two strictly below `n`, for `n >= 2`.
fn split_point(n: usize) -> usize {
    1 << (usize::BITS - 1 - (n - 1).leading_zeros())
}

fn inconsistent(msg: String) -> MerkleError {
    MerkleError::Inconsistent(msg)
}
