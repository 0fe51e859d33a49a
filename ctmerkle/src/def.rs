//! Core definitions and constants for ctmerkle.
//!
//! This module contains the constants shared by the tree builder, the proof
//! engines and the wire codec:
//! - RFC6962 domain separation prefixes
//! - Digest and proof encoding sizes
//! - Sparse tree dimensions
//! - Build tuning defaults
//!
//! # Security Notes
//! The two prefix bytes are part of the RFC6962 construction. Changing either
//! one breaks interoperability with every other certificate-transparency log
//! and allows a leaf hash to be replayed as an internal node hash.

/// Prefix byte hashed in front of every leaf record.
/// MTH({d(0)}) = HASH(0x00 || d(0))
pub const LEAF_PREFIX: u8 = 0x00;

/// Prefix byte hashed in front of every pair of child hashes.
/// MTH(D[n]) = HASH(0x01 || MTH(D[0:k]) || MTH(D[k:n]))
pub const NODE_PREFIX: u8 = 0x01;

/// Output size of every supported hasher (32 bytes).
pub const HASH_SIZE: usize = 32;

/// Height of the sparse tree used for non-inclusion proofs.
/// One level per bit of a 256-bit key.
pub const SPARSE_TREE_HEIGHT: usize = HASH_SIZE * 8;

/// Leaf capacity used when the caller does not choose one.
pub const DEFAULT_LEAF_CAPACITY: usize = 1 << 20;

/// A level is only split across workers when every worker gets at least
/// this many nodes. Smaller levels are reduced on the calling thread.
pub const MIN_LEAVES_PER_WORKER: usize = 4096;

/// Encoded header of an inclusion proof:
/// +------------------+------------------+----------------+
/// | leaf index (8B)  | tree size (8B)   | path len (4B)  |
/// +------------------+------------------+----------------+
pub const INCLUSION_PROOF_HEADER_LEN: usize = 8 + 8 + 4;

/// Encoded header of a consistency proof:
/// +------------------+------------------+----------------+
/// | old size (8B)    | new size (8B)    | path len (4B)  |
/// +------------------+------------------+----------------+
pub const CONSISTENCY_PROOF_HEADER_LEN: usize = 8 + 8 + 4;

/// Longest path a proof may carry. A tree of `usize` leaves is at most 64
/// levels high; anything longer cannot come from a real tree.
pub const MAX_PROOF_PATH_LEN: usize = 64;
