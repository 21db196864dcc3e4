//! # Filter
//!
//! A bit-array membership filter for the SiltKV storage engine.
//!
//! Every SSTable carries one of these in its filter block so the read path
//! can skip tables that definitely do not contain a key. The filter answers
//! "definitely not present" or "maybe present":
//!
//! - **False positives are allowed** — a `possibly_contains` hit may still
//!   miss in the data block.
//! - **False negatives are not** — a key that was added always reports
//!   present.
//!
//! Bits are probed by double hashing: two CRC-32 seed hashes (the second
//! over the key with a `_salt` suffix) combined as `h1 + i*h2` for each of
//! the `k` probes. CRC-32 is deterministic across processes, so a filter
//! written by one process is valid in any other.

use codec::{get_bytes, get_u32, put_bytes, put_u32, UnderflowError};

/// Default target false-positive probability.
pub const DEFAULT_FP_RATE: f64 = 0.01;

/// Element budget used when a filter is sized for an empty input.
pub const MIN_CAPACITY: usize = 10;

/// A Bloom filter over opaque byte-string keys.
///
/// Serialized as `(num_hashes: u32, size_in_bits: u32, ceil(bits/8) bytes)`
/// with bit `j` stored at byte `j / 8`, LSB first within the byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloomFilter {
    num_hashes: u32,
    num_bits: u32,
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Sizes a filter for `expected` elements at the default 1% target
    /// false-positive rate.
    pub fn new(expected: usize) -> Self {
        Self::with_fp_rate(expected, DEFAULT_FP_RATE)
    }

    /// Sizes a filter for `expected` elements at false-positive rate `p`.
    ///
    /// Uses the standard sizing: `m = ceil(-n*ln(p) / ln(2)^2)` bits and
    /// `k = ceil((m/n) * ln(2))` probes. An `expected` of zero is sized
    /// against [`MIN_CAPACITY`] elements instead.
    pub fn with_fp_rate(expected: usize, p: f64) -> Self {
        let n = if expected == 0 { MIN_CAPACITY } else { expected } as f64;
        let m = (-n * p.ln() / (2f64.ln().powi(2))).ceil() as u32;
        let k = ((f64::from(m) / n) * 2f64.ln()).ceil() as u32;
        Self {
            num_hashes: k,
            num_bits: m,
            bits: vec![0u8; m.div_ceil(8) as usize],
        }
    }

    /// Sets the probe bits for `key`.
    pub fn add(&mut self, key: &[u8]) {
        if self.num_bits == 0 {
            return;
        }
        let (h1, h2) = seed_hashes(key);
        for i in 0..u64::from(self.num_hashes) {
            let pos = ((h1.wrapping_add(i.wrapping_mul(h2))) % u64::from(self.num_bits)) as usize;
            self.bits[pos / 8] |= 1 << (pos % 8);
        }
    }

    /// Returns `false` if `key` was definitely never added; `true` if it
    /// may have been. An empty filter reports nothing present.
    pub fn possibly_contains(&self, key: &[u8]) -> bool {
        if self.num_bits == 0 {
            return false;
        }
        let (h1, h2) = seed_hashes(key);
        for i in 0..u64::from(self.num_hashes) {
            let pos = ((h1.wrapping_add(i.wrapping_mul(h2))) % u64::from(self.num_bits)) as usize;
            if self.bits[pos / 8] & (1 << (pos % 8)) == 0 {
                return false;
            }
        }
        true
    }

    /// Serializes the filter as a self-describing blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + self.bits.len());
        put_u32(&mut buf, self.num_hashes);
        put_u32(&mut buf, self.num_bits);
        put_bytes(&mut buf, &self.bits);
        buf
    }

    /// Deserializes a filter previously produced by [`to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`UnderflowError`] if the blob is truncated.
    ///
    /// [`to_bytes`]: BloomFilter::to_bytes
    pub fn from_bytes(buf: &[u8]) -> Result<Self, UnderflowError> {
        let mut offset = 0;
        let num_hashes = get_u32(buf, &mut offset)?;
        let num_bits = get_u32(buf, &mut offset)?;
        let bits = get_bytes(buf, &mut offset, num_bits.div_ceil(8) as usize)?.to_vec();
        Ok(Self {
            num_hashes,
            num_bits,
            bits,
        })
    }

    /// Number of probe positions per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Size of the bit array.
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }
}

fn seed_hashes(key: &[u8]) -> (u64, u64) {
    let h1 = crc32fast::hash(key);
    let mut salted = crc32fast::Hasher::new();
    salted.update(key);
    salted.update(b"_salt");
    (u64::from(h1), u64::from(salted.finalize()))
}
