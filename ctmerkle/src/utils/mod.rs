//! Utility modules for ctmerkle.
//!
//! - Hashing capability and domain-separated helpers
//! - Proof byte encoding/decoding

pub mod codec;
pub mod hasher;
