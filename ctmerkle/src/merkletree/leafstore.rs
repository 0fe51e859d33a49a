//! Append-only store of leaf hashes, the input to tree construction.
//!
//! Raw records are hashed with the leaf prefix as they arrive and only the
//! digest is kept. Insertion order is leaf order.

use log::debug;
use rayon::prelude::*;

use super::builder;
use super::tree::MerkleTree;
use crate::config::Config;
use crate::error::{MerkleError, Result};
use crate::utils::hasher::{self, Hash32, Hasher};

#[derive(Debug)]
pub struct LeafStore {
    leaf_hashes: Vec<Hash32>,
    capacity: usize,
    hasher: &'static dyn Hasher,
}

impl LeafStore {
    /// Creates an empty store for up to `capacity` leaves, hashed with the
    /// process-wide hasher.
    ///
    /// # Errors
    /// [`MerkleError::AllocationFailed`] if the digest array cannot be reserved
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_hasher(capacity, hasher::active())
    }

    /// Creates an empty store of `config.initial_capacity` leaves, hashed
    /// with the process-wide hasher.
    pub fn with_config(config: &Config) -> Result<Self> {
        Self::new(config.initial_capacity)
    }

    /// Creates an empty store hashed with an explicit `hasher`.
    ///
    /// Proofs from a tree built on such a store are checked against
    /// [`MerkleTree::hasher`] with
    /// [`verify_inclusion_proof_with`](super::proof::verify_inclusion_proof_with).
    /// The process-wide verifier accepts them only if `hasher` is also the
    /// installed one.
    pub fn with_hasher(capacity: usize, hasher: &'static dyn Hasher) -> Result<Self> {
        let mut leaf_hashes = Vec::new();
        leaf_hashes.try_reserve_exact(capacity)?;
        Ok(Self {
            leaf_hashes,
            capacity,
            hasher,
        })
    }

    /// Hashes `data` as `H(0x00 || data)` and appends it.
    ///
    /// # Errors
    /// [`MerkleError::CapacityExceeded`] once `len() == capacity()`; nothing is
    /// appended in that case
    pub fn add_leaf<T: AsRef<[u8]>>(&mut self, data: T) -> Result<()> {
        self.ensure_room(1)?;
        let h = hasher::hash_leaf(self.hasher, data);
        self.leaf_hashes.push(h);
        Ok(())
    }

    /// Appends a leaf hash computed elsewhere. The caller is responsible for
    /// having applied the leaf prefix with the same hasher.
    pub fn add_leaf_hash(&mut self, leaf_hash: Hash32) -> Result<()> {
        self.ensure_room(1)?;
        self.leaf_hashes.push(leaf_hash);
        Ok(())
    }

    /// Hashes a batch of records in parallel and appends them in input order.
    ///
    /// The batch is all-or-nothing: if it does not fit, nothing is appended.
    pub fn extend_leaves<I, T>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]> + Sync,
    {
        let records: Vec<T> = records.into_iter().collect();
        self.ensure_room(records.len())?;
        let hasher = self.hasher;
        let hashes: Vec<Hash32> = records
            .par_iter()
            .map(|r| hasher::hash_leaf(hasher, r))
            .collect();
        self.leaf_hashes.extend_from_slice(&hashes);
        Ok(())
    }

    /// Raises the capacity by `additional` leaves.
    ///
    /// # Errors
    /// [`MerkleError::AllocationFailed`] if the larger array cannot be reserved;
    /// the store is unchanged in that case
    pub fn grow(&mut self, additional: usize) -> Result<()> {
        let new_capacity = self
            .capacity
            .checked_add(additional)
            .ok_or(MerkleError::CapacityExceeded {
                capacity: self.capacity,
            })?;
        self.leaf_hashes
            .try_reserve_exact(new_capacity - self.leaf_hashes.len())?;
        debug!("leaf store grown from {} to {}", self.capacity, new_capacity);
        self.capacity = new_capacity;
        Ok(())
    }

    fn ensure_room(&self, n: usize) -> Result<()> {
        if n > self.remaining() {
            return Err(MerkleError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Builds the tree, consuming the store.
    ///
    /// # Errors
    /// - [`MerkleError::EmptyTree`] if no leaf was added
    /// - [`MerkleError::AllocationFailed`] if a level or node cannot be allocated
    /// - [`MerkleError::WorkerPanicked`] if a build thread died
    pub fn build(self, config: &Config) -> Result<MerkleTree> {
        builder::build(self, config)
    }

    pub fn len(&self) -> usize {
        self.leaf_hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_hashes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.leaf_hashes.len()
    }

    pub fn leaf_hashes(&self) -> &[Hash32] {
        &self.leaf_hashes
    }

    pub fn leaf_hash(&self, index: usize) -> Option<Hash32> {
        self.leaf_hashes.get(index).copied()
    }

    pub fn hasher(&self) -> &'static dyn Hasher {
        self.hasher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkletree::proof::verify_inclusion_proof;
    use crate::utils::hasher::HasherKind;

    fn store(capacity: usize) -> LeafStore {
        LeafStore::with_hasher(capacity, HasherKind::Sha256.hasher()).unwrap()
    }

    #[test]
    fn test_add_leaf_hashes_with_prefix() {
        let mut s = store(4);
        s.add_leaf(b"hello").unwrap();
        assert_eq!(
            hex::encode(s.leaf_hash(0).unwrap()),
            "8a2a5c9b768827de5a9552c38a044c66959c68f6d2f21b5260af54d2f87db827"
        );
        assert_eq!(s.len(), 1);
        assert_eq!(s.remaining(), 3);
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut s = store(2);
        s.add_leaf(b"a").unwrap();
        s.add_leaf(b"b").unwrap();
        assert!(matches!(
            s.add_leaf(b"c"),
            Err(MerkleError::CapacityExceeded { capacity: 2 })
        ));
        assert!(matches!(
            s.add_leaf_hash([0u8; 32]),
            Err(MerkleError::CapacityExceeded { capacity: 2 })
        ));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_grow_after_full() {
        let mut s = store(1);
        s.add_leaf(b"a").unwrap();
        assert!(s.add_leaf(b"b").is_err());
        s.grow(3).unwrap();
        assert_eq!(s.capacity(), 4);
        s.add_leaf(b"b").unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_grow_overflow() {
        let mut s = store(1);
        assert!(matches!(
            s.grow(usize::MAX),
            Err(MerkleError::CapacityExceeded { capacity: 1 })
        ));
        assert_eq!(s.capacity(), 1);
    }

    #[test]
    fn test_extend_matches_sequential() {
        let records: Vec<String> = (0..1000).map(|i| format!("leaf_data_{}", i)).collect();
        let mut seq = store(1000);
        for r in &records {
            seq.add_leaf(r).unwrap();
        }
        let mut par = store(1000);
        par.extend_leaves(&records).unwrap();
        assert_eq!(seq.leaf_hashes(), par.leaf_hashes());
    }

    #[test]
    fn test_extend_is_all_or_nothing() {
        let mut s = store(3);
        s.add_leaf(b"x").unwrap();
        let r = s.extend_leaves(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert!(matches!(r, Err(MerkleError::CapacityExceeded { capacity: 3 })));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_with_config_uses_active_hasher() {
        let config = Config::new(7, 1, 1);
        let mut s = LeafStore::with_config(&config).unwrap();
        assert_eq!(s.capacity(), 7);
        assert_eq!(s.hasher().kind(), hasher::active_kind());

        for i in 0..7 {
            s.add_leaf(format!("leaf{}", i)).unwrap();
        }
        let tree = s.build(&config).unwrap();
        for i in 0..7 {
            let proof = tree.generate_inclusion_proof(i).unwrap();
            let leaf = tree.leaf_hash(i).unwrap();
            assert!(verify_inclusion_proof(&proof, &leaf, &tree.root_hash()));
        }
    }

    #[test]
    fn test_build_empty_fails() {
        let s = store(4);
        assert!(matches!(
            s.build(&Config::single_threaded()),
            Err(MerkleError::EmptyTree)
        ));
    }
}
