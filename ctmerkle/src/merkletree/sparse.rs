//! Sparse Merkle tree over 256-bit keys, for proofs of absence.
//!
//! Every possible key owns one leaf slot at depth [`SPARSE_TREE_HEIGHT`];
//! bit `d` of the key, most significant first, picks the child at depth `d`.
//! A slot holds either the value inserted under its key or
//! [`ZERO_HASH32`]. Empty subtrees are never materialized: the hash of an
//! empty subtree of height `h` is the precomputed `defaults[h]`.
//!
//! A non-inclusion proof for `key` is the 256 sibling hashes along its path.
//! Folding them over the empty leaf must give the published root.
//!
//! Root and proofs are served from a node cache, filled on first use after
//! the last insert. It records the hash of every subtree holding two or more
//! keys, and for each subtree holding exactly one key, that key with the
//! subtree hash. A proof then walks the key path by lookups and only rehashes
//! the single-key chain it ends in, if any.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::def::{MIN_LEAVES_PER_WORKER, SPARSE_TREE_HEIGHT};
use crate::error::{MerkleError, Result};
use crate::utils::hasher::{self, Hash32, Hasher, ZERO_HASH32};

pub struct SparseMerkleTree {
    hasher: &'static dyn Hasher,
    leaves: BTreeMap<Hash32, Hash32>,
    defaults: Vec<Hash32>,
    cache: OnceCell<NodeCache>,
}

/// Path of one key in a [`SparseMerkleTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseProof {
    pub key: Hash32,
    /// Sibling hashes, leaf level first; always [`SPARSE_TREE_HEIGHT`] long
    pub siblings: Vec<Hash32>,
}

/// A subtree is named by its depth and the key bits above it.
type NodeId = (usize, Hash32);

#[derive(Debug, Clone, Copy)]
enum CachedNode {
    /// Two or more keys below
    Branch(Hash32),
    /// Exactly one key below
    Lone {
        hash: Hash32,
        key: Hash32,
        value: Hash32,
    },
}

impl CachedNode {
    fn hash(&self) -> &Hash32 {
        match self {
            CachedNode::Branch(hash) | CachedNode::Lone { hash, .. } => hash,
        }
    }
}

#[derive(Debug)]
struct NodeCache {
    root: Hash32,
    // subtrees that are absent here are empty, or lie under a `Lone` node
    nodes: HashMap<NodeId, CachedNode>,
}

/// Bit `depth` of `key`, most significant bit of byte 0 first.
fn key_bit(key: &Hash32, depth: usize) -> bool {
    key[depth / 8] & (0x80 >> (depth % 8)) != 0
}

/// `key` with every bit from `depth` on cleared.
fn key_prefix(key: &Hash32, depth: usize) -> Hash32 {
    let mut prefix = ZERO_HASH32;
    let full = depth / 8;
    prefix[..full].copy_from_slice(&key[..full]);
    if depth % 8 != 0 {
        prefix[full] = key[full] & !(0xff >> (depth % 8));
    }
    prefix
}

/// Id of the sibling, at `depth + 1`, of the node on the path of `key`.
fn sibling_id(key: &Hash32, depth: usize) -> NodeId {
    let mut prefix = key_prefix(key, depth + 1);
    prefix[depth / 8] ^= 0x80 >> (depth % 8);
    (depth + 1, prefix)
}

/// Index of the first bit where `a` and `b` differ.
fn first_diff_bit(a: &Hash32, b: &Hash32) -> Option<usize> {
    let i = a.iter().zip(b).position(|(x, y)| x != y)?;
    Some(i * 8 + (a[i] ^ b[i]).leading_zeros() as usize)
}

type Entry = (Hash32, Hash32);

/// Splits key-sorted entries sharing their first `depth` bits into the left
/// and right subtrees at `depth`.
fn split_at_bit(entries: &[Entry], depth: usize) -> (&[Entry], &[Entry]) {
    entries.split_at(entries.partition_point(|(k, _)| !key_bit(k, depth)))
}

/// `defaults[h]` is the hash of an empty subtree of height `h`.
fn default_hashes(hasher: &dyn Hasher) -> Vec<Hash32> {
    let mut defaults = Vec::with_capacity(SPARSE_TREE_HEIGHT + 1);
    defaults.push(ZERO_HASH32);
    for h in 0..SPARSE_TREE_HEIGHT {
        let below = defaults[h];
        defaults.push(hasher::hash_children(hasher, &below, &below));
    }
    defaults
}

impl SparseMerkleTree {
    pub fn new(hasher: &'static dyn Hasher) -> Self {
        Self {
            hasher,
            leaves: BTreeMap::new(),
            defaults: default_hashes(hasher),
            cache: OnceCell::new(),
        }
    }

    /// Sets the slot of `key` to `value` and returns the previous value.
    ///
    /// A value of [`ZERO_HASH32`] cannot be told apart from an empty slot.
    pub fn insert(&mut self, key: Hash32, value: Hash32) -> Option<Hash32> {
        self.cache.take();
        self.leaves.insert(key, value)
    }

    pub fn get(&self, key: &Hash32) -> Option<&Hash32> {
        self.leaves.get(key)
    }

    pub fn contains(&self, key: &Hash32) -> bool {
        self.leaves.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn hasher(&self) -> &'static dyn Hasher {
        self.hasher
    }

    /// Hash of an empty subtree of `height`, `0 <= height <= 256`.
    pub fn default_hash(&self, height: usize) -> Option<&Hash32> {
        self.defaults.get(height)
    }

    /// Hash of the empty sibling met at `depth` on any key path.
    fn empty_sibling(&self, depth: usize) -> Hash32 {
        self.defaults[SPARSE_TREE_HEIGHT - 1 - depth]
    }

    pub fn root(&self) -> Hash32 {
        self.cache().root
    }

    fn cache(&self) -> &NodeCache {
        self.cache.get_or_init(|| {
            let entries: Vec<Entry> = self.leaves.iter().map(|(k, v)| (*k, *v)).collect();
            let mut nodes = Vec::new();
            let root = self.fill(&entries, 0, &mut nodes);
            debug!(
                "sparse cache filled: {} keys, {} nodes",
                entries.len(),
                nodes.len()
            );
            NodeCache {
                root,
                nodes: nodes.into_iter().collect(),
            }
        })
    }

    /// Hashes the subtree at `depth` holding `entries`, which all share the
    /// first `depth` key bits and are sorted by key, and records every
    /// non-empty subtree it visits down to the single-key ones.
    fn fill(
        &self,
        entries: &[Entry],
        depth: usize,
        out: &mut Vec<(NodeId, CachedNode)>,
    ) -> Hash32 {
        match entries {
            [] => self.defaults[SPARSE_TREE_HEIGHT - depth],
            [(key, value)] => {
                let hash = self.lone_hash(key, value, depth);
                let node = CachedNode::Lone {
                    hash,
                    key: *key,
                    value: *value,
                };
                out.push(((depth, key_prefix(key, depth)), node));
                hash
            }
            [(first, _), ..] => {
                let (left, right) = split_at_bit(entries, depth);
                let (l, r) = if entries.len() >= 2 * MIN_LEAVES_PER_WORKER {
                    let mut right_out = Vec::new();
                    let (l, r) = rayon::join(
                        || self.fill(left, depth + 1, out),
                        || self.fill(right, depth + 1, &mut right_out),
                    );
                    out.append(&mut right_out);
                    (l, r)
                } else {
                    (
                        self.fill(left, depth + 1, out),
                        self.fill(right, depth + 1, out),
                    )
                };
                let hash = hasher::hash_children(self.hasher, &l, &r);
                out.push(((depth, key_prefix(first, depth)), CachedNode::Branch(hash)));
                hash
            }
        }
    }

    /// Hash of the subtree at `depth` whose only occupied slot is `key`.
    fn lone_hash(&self, key: &Hash32, value: &Hash32, depth: usize) -> Hash32 {
        (depth..SPARSE_TREE_HEIGHT).rev().fold(*value, |current, d| {
            let empty = self.empty_sibling(d);
            hasher::hash_with_sibling(self.hasher, &current, &empty, key_bit(key, d))
        })
    }

    /// Sibling path of `key`, whether or not it is present.
    pub fn prove(&self, key: &Hash32) -> SparseProof {
        let cache = self.cache();
        let mut siblings = Vec::with_capacity(SPARSE_TREE_HEIGHT);
        let mut node = cache.nodes.get(&(0, ZERO_HASH32));
        for depth in 0..SPARSE_TREE_HEIGHT {
            match node {
                Some(CachedNode::Branch(_)) => {
                    let sibling = cache
                        .nodes
                        .get(&sibling_id(key, depth))
                        .map_or_else(|| self.empty_sibling(depth), |n| *n.hash());
                    siblings.push(sibling);
                    node = cache.nodes.get(&(depth + 1, key_prefix(key, depth + 1)));
                }
                Some(CachedNode::Lone {
                    key: lone_key,
                    value,
                    ..
                }) => {
                    // the lone key hangs off this path where it first differs
                    let fork = first_diff_bit(key, lone_key);
                    for d in depth..SPARSE_TREE_HEIGHT {
                        siblings.push(match fork {
                            Some(f) if f == d => self.lone_hash(lone_key, value, d + 1),
                            _ => self.empty_sibling(d),
                        });
                    }
                    break;
                }
                None => {
                    siblings.extend((depth..SPARSE_TREE_HEIGHT).map(|d| self.empty_sibling(d)));
                    break;
                }
            }
        }
        siblings.reverse();
        SparseProof { key: *key, siblings }
    }

    /// Proves that `key` has no value in this tree.
    ///
    /// # Errors
    /// [`MerkleError::KeyPresent`] if a value was inserted under `key`
    pub fn generate_non_inclusion_proof(&self, key: &Hash32) -> Result<SparseProof> {
        if self.contains(key) {
            return Err(MerkleError::KeyPresent);
        }
        Ok(self.prove(key))
    }
}

impl std::fmt::Debug for SparseMerkleTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SparseMerkleTree")
            .field("hasher", &self.hasher.name())
            .field("len", &self.leaves.len())
            .field("cached", &self.cache.get().is_some())
            .finish()
    }
}

impl SparseProof {
    /// Root implied by placing `leaf` in the slot of `self.key`, or `None`
    /// if the path has the wrong length.
    pub fn compute_root(&self, hasher: &dyn Hasher, leaf: &Hash32) -> Option<Hash32> {
        if self.siblings.len() != SPARSE_TREE_HEIGHT {
            return None;
        }
        let root = self
            .siblings
            .iter()
            .enumerate()
            .fold(*leaf, |current, (i, sibling)| {
                let sibling_on_left = key_bit(&self.key, SPARSE_TREE_HEIGHT - 1 - i);
                hasher::hash_with_sibling(hasher, &current, sibling, sibling_on_left)
            });
        Some(root)
    }

    /// True if the slot of `self.key` is empty in the tree with `root`.
    pub fn verify_non_inclusion(&self, hasher: &dyn Hasher, root: &Hash32) -> bool {
        self.verify_inclusion(hasher, &ZERO_HASH32, root)
    }

    /// True if the slot of `self.key` holds `value` in the tree with `root`.
    pub fn verify_inclusion(&self, hasher: &dyn Hasher, value: &Hash32, root: &Hash32) -> bool {
        self.compute_root(hasher, value).as_ref() == Some(root)
    }
}
