//! Encoding and decoding utilities for proof bytes.
//!
//! All integers are little-endian. Direction flags are packed eight to a
//! byte, least significant bit first; padding bits in the last byte must be
//! zero.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use crate::def::{HASH_SIZE, MAX_PROOF_PATH_LEN};
use crate::utils::hasher::Hash32;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("{0} trailing bytes after proof")]
    TrailingBytes(usize),
    #[error("Path length {len} exceeds the maximum of {max}")]
    PathTooLong { len: usize, max: usize },
    #[error("Path has {path} hashes but {directions} directions")]
    LengthMismatch { path: usize, directions: usize },
    #[error("Padding bits set in direction bitmap")]
    InvalidDirection,
    #[error("Value {0} does not fit in usize")]
    Overflow(u64),
}

/// Cursor over an encoded proof.
pub struct Reader<'a> {
    bz: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bz: &'a [u8]) -> Self {
        Self { bz, pos: 0 }
    }

    /// Takes the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let available = self.bz.len() - self.pos;
        if n > available {
            return Err(CodecError::Truncated {
                needed: n,
                available,
            });
        }
        let out = &self.bz[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    pub fn read_usize(&mut self) -> Result<usize, CodecError> {
        let n = self.read_u64()?;
        usize::try_from(n).map_err(|_| CodecError::Overflow(n))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub fn read_hash(&mut self) -> Result<Hash32, CodecError> {
        let mut h = [0u8; HASH_SIZE];
        h.copy_from_slice(self.take(HASH_SIZE)?);
        Ok(h)
    }

    /// Reads a path length prefix and rejects lengths no real tree produces.
    pub fn read_path_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_u32()? as usize;
        if len > MAX_PROOF_PATH_LEN {
            return Err(CodecError::PathTooLong {
                len,
                max: MAX_PROOF_PATH_LEN,
            });
        }
        Ok(len)
    }

    /// Fails unless every byte was consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.bz.len() - self.pos {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

pub fn put_u64(out: &mut Vec<u8>, n: u64) {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, n);
    out.extend_from_slice(&buf);
}

pub fn put_u32(out: &mut Vec<u8>, n: u32) {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, n);
    out.extend_from_slice(&buf);
}

/// Writes a path length prefix. Lengths [`Reader::read_path_len`] would
/// reject are refused, so whatever is written can be read back.
pub fn put_path_len(out: &mut Vec<u8>, len: usize) -> Result<(), CodecError> {
    if len > MAX_PROOF_PATH_LEN {
        return Err(CodecError::PathTooLong {
            len,
            max: MAX_PROOF_PATH_LEN,
        });
    }
    put_u32(out, len as u32);
    Ok(())
}

/// Number of bytes needed to pack `count` direction flags.
pub fn directions_len(count: usize) -> usize {
    count.div_ceil(8)
}

pub fn put_directions(out: &mut Vec<u8>, directions: &[bool]) {
    let start = out.len();
    out.resize(start + directions_len(directions.len()), 0);
    for (i, &d) in directions.iter().enumerate() {
        if d {
            out[start + i / 8] |= 1 << (i % 8);
        }
    }
}

pub fn read_directions(reader: &mut Reader<'_>, count: usize) -> Result<Vec<bool>, CodecError> {
    let bz = reader.take(directions_len(count))?;
    let directions: Vec<bool> = (0..count).map(|i| bz[i / 8] & (1 << (i % 8)) != 0).collect();
    if count % 8 != 0 {
        let used_mask = (1u8 << (count % 8)) - 1;
        if bz[bz.len() - 1] & !used_mask != 0 {
            return Err(CodecError::InvalidDirection);
        }
    }
    Ok(directions)
}
