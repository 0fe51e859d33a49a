//! Consistency proofs between two sizes of the same append-only log.
//!
//! A consistency proof shows that the tree of `old_size` leaves is a prefix
//! of the tree of `new_size` leaves, i.e. the log only appended. Generation
//! follows RFC 6962 section 2.1.2; verification follows RFC 9162 section
//! 2.1.4.2. Every hash the generator needs is a node of the built tree, so
//! no subtree is ever rehashed.

use serde::{Deserialize, Serialize};

use super::node::TreeNode;
use super::tree::MerkleTree;
use crate::def::{CONSISTENCY_PROOF_HEADER_LEN, HASH_SIZE};
use crate::error::{MerkleError, Result};
use crate::utils::codec::{self, Reader};
use crate::utils::hasher::{self, Hash32, Hasher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyProof {
    pub old_size: usize,
    pub new_size: usize,
    pub path: Vec<Hash32>,
}

/// PROOF(old_size, D[leaf_count]).
///
/// # Errors
/// - [`MerkleError::InvalidTreeSize`] unless `0 < old_size <= tree.leaf_count()`
/// - [`MerkleError::AllocationFailed`] if the path cannot be allocated
pub fn generate_consistency_proof(tree: &MerkleTree, old_size: usize) -> Result<ConsistencyProof> {
    let new_size = tree.leaf_count();
    if old_size == 0 || old_size > new_size {
        return Err(MerkleError::InvalidTreeSize { old_size, new_size });
    }
    let mut path = Vec::new();
    path.try_reserve_exact(tree.height() + 1)?;
    if old_size < new_size {
        subproof(old_size, tree.root(), true, &mut path);
    }
    Ok(ConsistencyProof {
        old_size,
        new_size,
        path,
    })
}

/// SUBPROOF(m, D[node], complete). `complete` is set while `node` is still
/// known to be a subtree hash the verifier already holds.
fn subproof(m: usize, node: &TreeNode, complete: bool, out: &mut Vec<Hash32>) {
    match node.children() {
        Some((left, right)) if m < node.leaf_count() => {
            let k = left.leaf_count();
            if m <= k {
                subproof(m, left, complete, out);
                out.push(*right.hash());
            } else {
                subproof(m - k, right, false, out);
                out.push(*left.hash());
            }
        }
        _ => {
            if !complete {
                out.push(*node.hash());
            }
        }
    }
}

/// Checks `proof` with the process-wide hasher.
pub fn verify_consistency_proof(
    proof: &ConsistencyProof,
    old_root: &Hash32,
    new_root: &Hash32,
) -> bool {
    verify_consistency_proof_with(hasher::active(), proof, old_root, new_root)
}

/// True if `old_root` (a tree of `proof.old_size` leaves) and `new_root`
/// (a tree of `proof.new_size` leaves) are roots of the same log.
pub fn verify_consistency_proof_with(
    hasher: &dyn Hasher,
    proof: &ConsistencyProof,
    old_root: &Hash32,
    new_root: &Hash32,
) -> bool {
    let (first, second) = (proof.old_size, proof.new_size);
    if first == 0 || first > second {
        return false;
    }
    if first == second {
        return proof.path.is_empty() && old_root == new_root;
    }
    if proof.path.is_empty() {
        return false;
    }

    // a power-of-two old tree is itself a node of the new tree
    let seed = first.is_power_of_two().then_some(old_root);
    let mut path = seed.into_iter().chain(proof.path.iter());

    let (mut fnode, mut snode) = (first - 1, second - 1);
    while fnode & 1 == 1 {
        fnode >>= 1;
        snode >>= 1;
    }
    let Some(start) = path.next() else {
        return false;
    };
    let (mut fr, mut sr) = (*start, *start);
    for c in path {
        if snode == 0 {
            return false;
        }
        if fnode & 1 == 1 || fnode == snode {
            fr = hasher::hash_children(hasher, c, &fr);
            sr = hasher::hash_children(hasher, c, &sr);
            while fnode & 1 == 0 && fnode != 0 {
                fnode >>= 1;
                snode >>= 1;
            }
        } else {
            sr = hasher::hash_children(hasher, &sr, c);
        }
        fnode >>= 1;
        snode >>= 1;
    }
    fr == *old_root && sr == *new_root && snode == 0
}

impl ConsistencyProof {
    pub fn verify(&self, hasher: &dyn Hasher, old_root: &Hash32, new_root: &Hash32) -> bool {
        verify_consistency_proof_with(hasher, self, old_root, new_root)
    }

    /// # Errors
    /// [`CodecError::PathTooLong`](crate::utils::codec::CodecError::PathTooLong)
    /// if the path is longer than [`MAX_PROOF_PATH_LEN`](crate::def::MAX_PROOF_PATH_LEN)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out =
            Vec::with_capacity(CONSISTENCY_PROOF_HEADER_LEN + self.path.len() * HASH_SIZE);
        codec::put_u64(&mut out, self.old_size as u64);
        codec::put_u64(&mut out, self.new_size as u64);
        codec::put_path_len(&mut out, self.path.len())?;
        for h in &self.path {
            out.extend_from_slice(h);
        }
        Ok(out)
    }

    pub fn from_bytes(bz: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bz);
        let old_size = reader.read_usize()?;
        let new_size = reader.read_usize()?;
        let len = reader.read_path_len()?;
        let mut path = Vec::with_capacity(len);
        for _ in 0..len {
            path.push(reader.read_hash()?);
        }
        reader.finish()?;
        Ok(Self {
            old_size,
            new_size,
            path,
        })
    }
}
