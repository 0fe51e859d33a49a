//! ctmerkle is an RFC6962 Merkle tree for append-only verifiable logs.
//!
//! # Overview
//! ctmerkle provides:
//! - A bounded leaf store that hashes records with the RFC6962 leaf prefix
//! - Parallel bottom-up tree construction with odd-node promotion
//! - Inclusion proofs, verifiable against the root alone
//! - Consistency proofs between two sizes of the same log
//! - Non-inclusion proofs backed by a 256-level sparse Merkle tree
//!
//! # Architecture
//!
//! ## Core Components
//! - [`LeafStore`]: Append-only collection of leaf hashes with a capacity
//!   - Hashes records as `H(0x00 || data)` on arrival
//!   - Fails with `CapacityExceeded` when full, until grown
//!
//! - [`MerkleTree`]: The immutable built tree
//!   - Produced by [`LeafStore::build`], which consumes the store
//!   - Generates inclusion and consistency proofs
//!   - Safe to share between threads
//!
//! - [`InclusionProof`]: Sibling path from one leaf to the root
//!   - Verified with [`verify_inclusion_proof`] without access to the tree
//!
//! ## Supporting Components
//! - Hashing: a [`Hasher`](utils::hasher::Hasher) capability, SHA-256 or
//!   BLAKE2s-256, fixed once per process
//! - Codec: compact little-endian proof encoding
//! - Check: invariant validation of built trees
//!
//! # Example Usage
//! ```
//! use ctmerkle::{verify_inclusion_proof, Config, LeafStore};
//!
//! let mut store = LeafStore::new(100).unwrap();
//! for i in 0..5 {
//!     store.add_leaf(format!("leaf{}", i)).unwrap();
//! }
//! let tree = store.build(&Config::default()).unwrap();
//!
//! let proof = tree.generate_inclusion_proof(2).unwrap();
//! let leaf = tree.leaf_hash(2).unwrap();
//! assert!(verify_inclusion_proof(&proof, &leaf, &tree.root_hash()));
//! ```

pub mod config;
pub mod def;
pub mod error;
pub mod merkletree;
pub mod utils;

pub use config::Config;
pub use error::{MerkleError, Result};
pub use merkletree::check::check_tree;
pub use merkletree::consistency::{
    generate_consistency_proof, verify_consistency_proof, verify_consistency_proof_with,
};
pub use merkletree::proof::{
    generate_inclusion_proof, verify_inclusion_proof, verify_inclusion_proof_with,
};
pub use merkletree::{
    BuildStats, ConsistencyProof, InclusionProof, LeafStore, MerkleTree, SparseMerkleTree,
    SparseProof,
};
pub use utils::hasher::{Hash32, HasherKind};
