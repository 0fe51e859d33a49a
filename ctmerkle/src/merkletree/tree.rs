//! A built, immutable Merkle tree.
//!
//! A [`MerkleTree`] only exists in the built state: it is produced by
//! [`LeafStore::build`](super::leafstore::LeafStore::build), which consumes
//! the store, and it has no way to add or remove leaves. A larger log needs a
//! fresh store and a fresh build. Since nothing mutates a tree after
//! construction, any number of threads may generate proofs from it at once.

use once_cell::sync::OnceCell;

use super::builder::BuildStats;
use super::consistency::{self, ConsistencyProof};
use super::leafstore::LeafStore;
use super::node::TreeNode;
use super::proof::{self, InclusionProof};
use super::sparse::{SparseMerkleTree, SparseProof};
use crate::error::{MerkleError, Result};
use crate::utils::hasher::{self, Hash32, Hasher};

#[derive(Debug)]
pub struct MerkleTree {
    leaves: LeafStore,
    root: TreeNode,
    stats: BuildStats,
    sparse: OnceCell<SparseMerkleTree>,
}

impl MerkleTree {
    pub(crate) fn from_parts(leaves: LeafStore, root: TreeNode, stats: BuildStats) -> Self {
        Self {
            leaves,
            root,
            stats,
            sparse: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn root_hash(&self) -> Hash32 {
        *self.root.hash()
    }

    pub fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }

    /// Capacity of the store the tree was built from.
    pub fn capacity(&self) -> usize {
        self.leaves.capacity()
    }

    pub fn height(&self) -> usize {
        self.root.height()
    }

    pub fn leaf_hashes(&self) -> &[Hash32] {
        self.leaves.leaf_hashes()
    }

    pub fn leaf_hash(&self, index: usize) -> Option<Hash32> {
        self.leaves.leaf_hash(index)
    }

    pub fn hasher(&self) -> &'static dyn Hasher {
        self.leaves.hasher()
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Root of the tree made of the first `size` leaves, i.e. the root this
    /// log published when it held `size` entries.
    ///
    /// # Errors
    /// [`MerkleError::InvalidTreeSize`] unless `0 < size <= leaf_count()`
    pub fn root_at(&self, size: usize) -> Result<Hash32> {
        if size == 0 || size > self.leaf_count() {
            return Err(MerkleError::InvalidTreeSize {
                old_size: size,
                new_size: self.leaf_count(),
            });
        }
        Ok(prefix_root(self.hasher(), &self.root, size))
    }

    /// See [`proof::generate_inclusion_proof`].
    pub fn generate_inclusion_proof(&self, leaf_index: usize) -> Result<InclusionProof> {
        proof::generate_inclusion_proof(self, leaf_index)
    }

    /// See [`consistency::generate_consistency_proof`].
    pub fn generate_consistency_proof(&self, old_size: usize) -> Result<ConsistencyProof> {
        consistency::generate_consistency_proof(self, old_size)
    }

    /// A sparse tree keyed by every leaf hash of this log, built on first
    /// use and kept for the lifetime of the tree.
    pub fn sparse_index(&self) -> &SparseMerkleTree {
        self.sparse.get_or_init(|| {
            let mut sparse = SparseMerkleTree::new(self.hasher());
            for h in self.leaf_hashes() {
                sparse.insert(*h, *h);
            }
            sparse
        })
    }

    /// Proves that `data` is not a leaf record of this log, against
    /// `sparse_index().root()`.
    ///
    /// # Errors
    /// [`MerkleError::KeyPresent`] if `data` was added to the log
    pub fn prove_absent<T: AsRef<[u8]>>(&self, data: T) -> Result<SparseProof> {
        let key = hasher::hash_leaf(self.hasher(), data);
        self.sparse_index().generate_non_inclusion_proof(&key)
    }
}

/// MTH(D[0:size]) for a subtree holding at least `size` leaves.
///
/// The RFC6962 split of a prefix longer than the left subtree is the left
/// subtree itself, so only the right-hand side needs recomputing.
fn prefix_root(hasher: &dyn Hasher, node: &TreeNode, size: usize) -> Hash32 {
    match node.children() {
        Some((left, right)) if size < node.leaf_count() => {
            let k = left.leaf_count();
            if size <= k {
                prefix_root(hasher, left, size)
            } else {
                let r = prefix_root(hasher, right, size - k);
                hasher::hash_children(hasher, left.hash(), &r)
            }
        }
        _ => *node.hash(),
    }
}
