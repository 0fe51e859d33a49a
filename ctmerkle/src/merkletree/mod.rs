//! RFC6962 Merkle tree for append-only logs.
//!
//! This module provides the whole tree lifecycle:
//!
//! - [`LeafStore`]: bounded, append-only collection of leaf hashes
//! - [`builder`]: parallel bottom-up construction into a [`MerkleTree`]
//! - [`proof`]: inclusion proof generation and verification
//! - [`consistency`]: append-only proofs between two tree sizes
//! - [`sparse`]: sparse Merkle tree for non-inclusion proofs
//! - [`check`]: tree invariant validation
//!
//! A store becomes a tree by [`LeafStore::build`], which consumes it. The
//! tree is immutable from then on and can serve proofs from any number of
//! threads.

pub mod builder;
pub mod check;
pub mod consistency;
pub mod leafstore;
pub mod node;
pub mod proof;
pub mod sparse;
pub mod tree;

pub use builder::BuildStats;
pub use consistency::ConsistencyProof;
pub use leafstore::LeafStore;
pub use node::TreeNode;
pub use proof::InclusionProof;
pub use sparse::{SparseMerkleTree, SparseProof};
pub use tree::MerkleTree;
