//! Hashing capability used by the Merkle tree.
//!
//! The tree never names a concrete hash function. It talks to a [`Hasher`]
//! trait object and only through two helpers:
//! - [`hash_leaf`]: `H(0x00 || data)`
//! - [`hash_children`]: `H(0x01 || left || right)`
//!
//! Two implementations are provided, SHA-256 (the RFC6962 default) and
//! BLAKE2s-256. A process picks one once with [`install`]; every later call
//! to [`active`] returns the same hasher.

use std::fmt;

use blake2::Blake2s256;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use strum::{Display, EnumString, IntoStaticStr};

use crate::def::{HASH_SIZE, LEAF_PREFIX, NODE_PREFIX};
use crate::error::{MerkleError, Result};

/// Type alias for a 32-byte hash value.
/// Used for leaf hashes, internal node hashes and roots.
pub type Hash32 = [u8; HASH_SIZE];

/// A constant representing a hash of all zeros.
/// Used as the empty leaf of the sparse tree.
pub const ZERO_HASH32: Hash32 = [0u8; HASH_SIZE];

/// A fixed-output, collision-resistant hash primitive.
///
/// Implementations must be deterministic and produce exactly [`HASH_SIZE`]
/// bytes. They are shared between build workers, hence `Send + Sync`.
pub trait Hasher: Send + Sync + fmt::Debug {
    /// Which implementation this is.
    fn kind(&self) -> HasherKind;

    /// Lowercase name of the implementation, as accepted by
    /// `HasherKind::from_str`.
    fn name(&self) -> &'static str {
        self.kind().into()
    }

    /// Computes `H(prefix || parts[0] || parts[1] || ...)`.
    fn hash(&self, prefix: u8, parts: &[&[u8]]) -> Hash32;
}

/// Selector for the available [`Hasher`] implementations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HasherKind {
    #[default]
    Sha256,
    Blake2s,
}

impl HasherKind {
    /// Returns the shared instance for this kind.
    pub fn hasher(self) -> &'static dyn Hasher {
        match self {
            HasherKind::Sha256 => &SHA256,
            HasherKind::Blake2s => &BLAKE2S,
        }
    }
}

/// SHA-256, the hash function RFC6962 logs use.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

/// BLAKE2s with a 256-bit output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake2sHasher;

static SHA256: Sha256Hasher = Sha256Hasher;
static BLAKE2S: Blake2sHasher = Blake2sHasher;

static ACTIVE: OnceCell<HasherKind> = OnceCell::new();

fn digest_with<D: Digest>(prefix: u8, parts: &[&[u8]]) -> Hash32 {
    let mut hasher = D::new();
    hasher.update([prefix]);
    for part in parts {
        hasher.update(*part);
    }
    let mut out = ZERO_HASH32;
    out.copy_from_slice(&hasher.finalize());
    out
}

impl Hasher for Sha256Hasher {
    fn kind(&self) -> HasherKind {
        HasherKind::Sha256
    }

    fn hash(&self, prefix: u8, parts: &[&[u8]]) -> Hash32 {
        digest_with::<Sha256>(prefix, parts)
    }
}

impl Hasher for Blake2sHasher {
    fn kind(&self) -> HasherKind {
        HasherKind::Blake2s
    }

    fn hash(&self, prefix: u8, parts: &[&[u8]]) -> Hash32 {
        digest_with::<Blake2s256>(prefix, parts)
    }
}

/// Selects the process-wide hasher.
///
/// The first call wins. Installing the same kind again is a no-op; installing
/// a different kind afterwards fails, so trees built earlier in the process
/// keep matching the hasher later proofs are checked with.
///
/// # Errors
/// [`MerkleError::HasherAlreadyInstalled`] if another kind is already active
pub fn install(kind: HasherKind) -> Result<&'static dyn Hasher> {
    let active = *ACTIVE.get_or_init(|| kind);
    if active != kind {
        return Err(MerkleError::HasherAlreadyInstalled {
            active: active.hasher().name(),
            requested: kind.hasher().name(),
        });
    }
    Ok(active.hasher())
}

/// Kind of the process-wide hasher. Fixes it to SHA-256 if nothing was
/// installed yet.
pub fn active_kind() -> HasherKind {
    *ACTIVE.get_or_init(HasherKind::default)
}

/// The process-wide hasher.
pub fn active() -> &'static dyn Hasher {
    active_kind().hasher()
}

/// Hashes a leaf record according to RFC 6962.
///
/// MTH({d(0)}) = HASH(0x00 || d(0))
pub fn hash_leaf<T: AsRef<[u8]>>(hasher: &dyn Hasher, data: T) -> Hash32 {
    hasher.hash(LEAF_PREFIX, &[data.as_ref()])
}

/// Hashes two child nodes according to RFC 6962.
///
/// MTH(D[n]) = HASH(0x01 || MTH(D[0:k]) || MTH(D[k:n]))
pub fn hash_children(hasher: &dyn Hasher, left: &Hash32, right: &Hash32) -> Hash32 {
    hasher.hash(NODE_PREFIX, &[left.as_slice(), right.as_slice()])
}

/// Like [`hash_children`], with `sibling` placed on the left when
/// `sibling_on_left` is set and on the right otherwise.
pub fn hash_with_sibling(
    hasher: &dyn Hasher,
    current: &Hash32,
    sibling: &Hash32,
    sibling_on_left: bool,
) -> Hash32 {
    if sibling_on_left {
        hash_children(hasher, sibling, current)
    } else {
        hash_children(hasher, current, sibling)
    }
}
