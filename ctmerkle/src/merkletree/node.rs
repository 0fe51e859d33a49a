//! Owned binary tree nodes.
//!
//! Every node owns its children, so a tree is freed by dropping its root. A
//! node either has both children or none: an odd node at some level is
//! promoted unchanged instead of getting a single-child parent.
//!
//! Child storage is reserved with `try_reserve_exact`, so running out of
//! memory mid-build surfaces as
//! [`MerkleError::AllocationFailed`](crate::error::MerkleError::AllocationFailed)
//! instead of aborting the process.

use crate::error::Result;
use crate::utils::hasher::{self, Hash32, Hasher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    hash: Hash32,
    // empty for leaves, `[left, right]` otherwise
    children: Vec<TreeNode>,
    leaf_count: usize,
    height: usize,
}

impl TreeNode {
    /// Creates a leaf node from an already domain-separated leaf hash.
    pub fn leaf(hash: Hash32) -> Self {
        Self {
            hash,
            children: Vec::new(),
            leaf_count: 1,
            height: 0,
        }
    }

    /// Creates the parent of two adjacent nodes, `left` preceding `right`
    /// in leaf order.
    ///
    /// # Errors
    /// [`MerkleError::AllocationFailed`](crate::error::MerkleError::AllocationFailed)
    /// if the child slots cannot be reserved
    pub fn parent(hasher: &dyn Hasher, left: TreeNode, right: TreeNode) -> Result<Self> {
        let hash = hasher::hash_children(hasher, &left.hash, &right.hash);
        let leaf_count = left.leaf_count + right.leaf_count;
        let height = 1 + left.height.max(right.height);
        let mut children = Vec::new();
        children.try_reserve_exact(2)?;
        children.push(left);
        children.push(right);
        Ok(Self {
            hash,
            children,
            leaf_count,
            height,
        })
    }

    pub fn hash(&self) -> &Hash32 {
        &self.hash
    }

    pub fn left(&self) -> Option<&TreeNode> {
        self.children().map(|(l, _)| l)
    }

    pub fn right(&self) -> Option<&TreeNode> {
        self.children().map(|(_, r)| r)
    }

    /// Both children, or `None` for a leaf.
    pub fn children(&self) -> Option<(&TreeNode, &TreeNode)> {
        match self.children.as_slice() {
            [l, r] => Some((l, r)),
            _ => None,
        }
    }

    /// Number of leaves spanned by this subtree.
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Longest path to a leaf beneath this node; 0 for leaves.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hasher::{hash_leaf, Sha256Hasher};

    #[test]
    fn test_parent_invariants() {
        let h = &Sha256Hasher;
        let a = TreeNode::leaf(hash_leaf(h, b"a"));
        let b = TreeNode::leaf(hash_leaf(h, b"b"));
        let c = TreeNode::leaf(hash_leaf(h, b"c"));
        let ab = TreeNode::parent(h, a.clone(), b.clone()).unwrap();
        assert_eq!(ab.leaf_count(), 2);
        assert_eq!(ab.height(), 1);
        assert_eq!(*ab.hash(), hasher::hash_children(h, a.hash(), b.hash()));

        let abc = TreeNode::parent(h, ab, c.clone()).unwrap();
        assert_eq!(abc.leaf_count(), 3);
        assert_eq!(abc.height(), 2);
        assert_eq!(abc.left().map(TreeNode::leaf_count), Some(2));
        assert!(abc.right().is_some_and(TreeNode::is_leaf));
        assert_eq!(abc.children().map(|(_, r)| r), Some(&c));
        assert!(!abc.is_leaf());
    }

    #[test]
    fn test_leaf_has_no_children() {
        let leaf = TreeNode::leaf([7u8; 32]);
        assert!(leaf.is_leaf());
        assert!(leaf.children().is_none());
        assert_eq!(leaf.leaf_count(), 1);
        assert_eq!(leaf.height(), 0);
    }
}
