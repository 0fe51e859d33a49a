//! Inclusion proofs: the sibling path from one leaf to the root.
//!
//! A proof carries no reference to the tree it came from. Checking it needs
//! only the proof, the leaf hash and the published root, and costs one hash
//! per path entry.
//!
//! # Wire format
//! ```text
//! +------------------+------------------+----------------+
//! | leaf index (8B)  | tree size (8B)   | path len (4B)  |
//! +------------------+------------------+----------------+
//! | path len x 32B sibling hashes, leaf level first      |
//! +------------------------------------------------------+
//! | ceil(path len / 8)B direction bitmap, LSB first      |
//! +------------------------------------------------------+
//! ```

use log::trace;
use serde::{Deserialize, Serialize};

use super::tree::MerkleTree;
use crate::def::{HASH_SIZE, INCLUSION_PROOF_HEADER_LEN};
use crate::error::{MerkleError, Result};
use crate::utils::codec::{self, CodecError, Reader};
use crate::utils::hasher::{self, Hash32, Hasher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Position of the proven leaf, 0-based
    pub leaf_index: usize,
    /// Leaf count of the tree the proof was generated from
    pub tree_size: usize,
    /// Sibling hashes, leaf level first, root excluded
    pub path: Vec<Hash32>,
    /// `directions[i]` is true when `path[i]` is the left-hand sibling
    pub directions: Vec<bool>,
}

/// Collects the sibling path of `leaf_index`.
///
/// The walk starts at the root: when the target lies in the left subtree the
/// right child's hash is recorded, and the other way round. The collected
/// path is returned leaf level first.
///
/// # Errors
/// - [`MerkleError::IndexOutOfRange`] if `leaf_index >= tree.leaf_count()`
/// - [`MerkleError::AllocationFailed`] if the path cannot be allocated
pub fn generate_inclusion_proof(tree: &MerkleTree, leaf_index: usize) -> Result<InclusionProof> {
    let tree_size = tree.leaf_count();
    if leaf_index >= tree_size {
        return Err(MerkleError::IndexOutOfRange {
            index: leaf_index,
            tree_size,
        });
    }

    let mut path = Vec::new();
    path.try_reserve_exact(tree.height())?;
    let mut directions = Vec::new();
    directions.try_reserve_exact(tree.height())?;

    let mut node = tree.root();
    let mut index = leaf_index;
    while let Some((left, right)) = node.children() {
        let k = left.leaf_count();
        if index < k {
            path.push(*right.hash());
            directions.push(false);
            node = left;
        } else {
            path.push(*left.hash());
            directions.push(true);
            index -= k;
            node = right;
        }
    }
    path.reverse();
    directions.reverse();

    trace!(
        "inclusion proof for leaf {} of {}: {} hashes",
        leaf_index,
        tree_size,
        path.len()
    );
    Ok(InclusionProof {
        leaf_index,
        tree_size,
        path,
        directions,
    })
}

/// Checks `proof` with the process-wide hasher.
/// See [`verify_inclusion_proof_with`].
pub fn verify_inclusion_proof(
    proof: &InclusionProof,
    leaf_hash: &Hash32,
    root_hash: &Hash32,
) -> bool {
    verify_inclusion_proof_with(hasher::active(), proof, leaf_hash, root_hash)
}

/// Recomputes the root from `leaf_hash` and the proof path and compares it
/// with `root_hash` bytewise.
///
/// An empty path is valid only for a single-leaf tree, whose root is the
/// leaf hash itself. Proofs whose shape does not match their
/// `(leaf_index, tree_size)` are rejected without hashing.
pub fn verify_inclusion_proof_with(
    hasher: &dyn Hasher,
    proof: &InclusionProof,
    leaf_hash: &Hash32,
    root_hash: &Hash32,
) -> bool {
    if !proof.is_well_formed() {
        return false;
    }
    let computed = proof
        .path
        .iter()
        .zip(&proof.directions)
        .fold(*leaf_hash, |current, (sibling, &on_left)| {
            hasher::hash_with_sibling(hasher, &current, sibling, on_left)
        });
    computed == *root_hash
}

/// Calls `f` with the side of each sibling on the path of `leaf_index` in a
/// tree of `tree_size` leaves, leaf level first. A node that is the odd one
/// out at its level is promoted and contributes no sibling.
fn for_each_expected_direction(leaf_index: usize, tree_size: usize, mut f: impl FnMut(bool)) {
    let (mut index, mut size) = (leaf_index, tree_size);
    while size > 1 {
        if index % 2 == 1 {
            f(true);
        } else if index + 1 < size {
            f(false);
        }
        index /= 2;
        size = size.div_ceil(2);
    }
}

impl InclusionProof {
    /// Number of path entries a proof for `leaf_index` in a tree of
    /// `tree_size` leaves has.
    pub fn expected_path_len(leaf_index: usize, tree_size: usize) -> usize {
        let mut len = 0;
        for_each_expected_direction(leaf_index, tree_size, |_| len += 1);
        len
    }

    /// True if path and directions agree with each other and with the
    /// position of the leaf in a tree of `tree_size` leaves.
    pub fn is_well_formed(&self) -> bool {
        if self.path.len() != self.directions.len() || self.leaf_index >= self.tree_size {
            return false;
        }
        let mut i = 0;
        let mut matches = true;
        for_each_expected_direction(self.leaf_index, self.tree_size, |d| {
            matches &= self.directions.get(i) == Some(&d);
            i += 1;
        });
        matches && i == self.directions.len()
    }

    pub fn verify(&self, hasher: &dyn Hasher, leaf_hash: &Hash32, root_hash: &Hash32) -> bool {
        verify_inclusion_proof_with(hasher, self, leaf_hash, root_hash)
    }

    /// Encodes the proof in the wire format above.
    ///
    /// # Errors
    /// - [`CodecError::LengthMismatch`] if path and directions differ in length
    /// - [`CodecError::PathTooLong`] if the path is longer than
    ///   [`MAX_PROOF_PATH_LEN`](crate::def::MAX_PROOF_PATH_LEN)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.path.len() != self.directions.len() {
            return Err(CodecError::LengthMismatch {
                path: self.path.len(),
                directions: self.directions.len(),
            }
            .into());
        }
        let mut out = Vec::with_capacity(
            INCLUSION_PROOF_HEADER_LEN
                + self.path.len() * HASH_SIZE
                + codec::directions_len(self.directions.len()),
        );
        codec::put_u64(&mut out, self.leaf_index as u64);
        codec::put_u64(&mut out, self.tree_size as u64);
        codec::put_path_len(&mut out, self.path.len())?;
        for h in &self.path {
            out.extend_from_slice(h);
        }
        codec::put_directions(&mut out, &self.directions);
        Ok(out)
    }

    /// Decodes a proof written by [`InclusionProof::to_bytes`].
    ///
    /// Only the encoding is checked here; a decoded proof still has to pass
    /// verification.
    pub fn from_bytes(bz: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bz);
        let leaf_index = reader.read_usize()?;
        let tree_size = reader.read_usize()?;
        let len = reader.read_path_len()?;
        let mut path = Vec::with_capacity(len);
        for _ in 0..len {
            path.push(reader.read_hash()?);
        }
        let directions = codec::read_directions(&mut reader, len)?;
        reader.finish()?;
        Ok(Self {
            leaf_index,
            tree_size,
            path,
            directions,
        })
    }
}
