use std::collections::TryReserveError;

use thiserror::Error;

use crate::utils::codec::CodecError;

pub type Result<T> = std::result::Result<T, MerkleError>;

/// Errors returned by the leaf store, the builder and the proof generators.
///
/// A proof that fails to verify is not an error: the verifiers return `bool`.
#[derive(Error, Debug)]
pub enum MerkleError {
    #[error("Leaf store is full: capacity {capacity} reached")]
    CapacityExceeded { capacity: usize },

    #[error("Cannot build a tree from zero leaves")]
    EmptyTree,

    #[error("Leaf index {index} out of range for tree of size {tree_size}")]
    IndexOutOfRange { index: usize, tree_size: usize },

    #[error("Allocation failed: {0}")]
    AllocationFailed(#[from] TryReserveError),

    #[error("Invalid tree sizes: old size {old_size}, new size {new_size}")]
    InvalidTreeSize { old_size: usize, new_size: usize },

    #[error("Key is present in the tree; absence cannot be proven")]
    KeyPresent,

    #[error("Hasher {active} already installed, cannot switch to {requested}")]
    HasherAlreadyInstalled {
        active: &'static str,
        requested: &'static str,
    },

    #[error("A build worker panicked")]
    WorkerPanicked,

    #[error("Malformed proof: {0}")]
    Decode(#[from] CodecError),

    #[error("Tree invariant violated: {0}")]
    Inconsistent(String),
}
