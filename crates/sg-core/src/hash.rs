//! Hash functions for ScriptGuard
//!
//! Uses Murmur3 32-bit with several seeds:
//!
//! - two seeds form a 64-bit composite key for domain hashing (`Hash64`)
//! - four seeds form the 128-bit scriptlet fingerprint (`ScriptletId`)
//!
//! # Sentinel Handling
//!
//! An all-zero `Hash64` is reserved as the empty sentinel.
//! We ensure this never occurs by OR-ing `lo |= 1` after hashing.

use std::fmt;

/// 64-bit hash represented as two 32-bit parts.
/// Used for domain hashing with extremely low collision probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[repr(C)]
pub struct Hash64 {
    pub lo: u32,
    pub hi: u32,
}

impl Hash64 {
    /// Check if this hash is the empty sentinel (0, 0).
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.lo == 0 && self.hi == 0
    }
}

// Default seeds for the two domain hash passes
const SEED_LO: u32 = 0x9e3779b9; // Golden ratio
const SEED_HI: u32 = 0x85ebca6b; // Murmur3 constant

// Seeds for the four scriptlet id words
const ID_SEEDS: [u32; 4] = [SEED_LO, SEED_HI, 0xc2b2ae35, 0x27d4eb2f];

/// Murmur3 32-bit hash implementation.
#[inline]
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let len = data.len();
    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);

        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    // Process remaining bytes
    let tail = chunks.remainder();
    let mut k: u32 = 0;
    if tail.len() >= 3 {
        k ^= (tail[2] as u32) << 16;
    }
    if tail.len() >= 2 {
        k ^= (tail[1] as u32) << 8;
    }
    if !tail.is_empty() {
        k ^= tail[0] as u32;
        let k = k.wrapping_mul(0xcc9e2d51);
        let k = k.rotate_left(15);
        let k = k.wrapping_mul(0x1b873593);
        h ^= k;
    }

    // Finalization
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;

    h
}

/// Compute 64-bit hash as (lo, hi) pair using two Murmur3 passes.
/// Ensures the result is never (0, 0) by OR-ing lo with 1.
#[inline]
pub fn hash64(data: &[u8]) -> Hash64 {
    let mut lo = murmur3_32(data, SEED_LO);
    let hi = murmur3_32(data, SEED_HI);

    // Avoid (0, 0) sentinel
    if lo == 0 && hi == 0 {
        lo = 1;
    }

    Hash64 { lo, hi }
}

/// Hash a domain string for lookup in domain scopes.
/// Lowercases the input before hashing for case-insensitive matching.
#[inline]
pub fn hash_domain(domain: &str) -> Hash64 {
    // Fast lowercase conversion for ASCII domains; longer input spills to the heap
    let bytes = domain.as_bytes();
    let mut buf = [0u8; 256];
    if bytes.len() > buf.len() {
        return hash64(domain.to_ascii_lowercase().as_bytes());
    }

    for (i, &b) in bytes.iter().enumerate() {
        buf[i] = b.to_ascii_lowercase();
    }

    hash64(&buf[..bytes.len()])
}

// =============================================================================
// Scriptlet Id
// =============================================================================

/// Stable fingerprint of a rule body.
///
/// Rendered as 32 lowercase hex characters. The body is hashed byte-for-byte,
/// so bodies that differ in whitespace get different ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptletId(u128);

impl ScriptletId {
    /// Fingerprint a rule body.
    pub fn from_rule_body(body: &str) -> Self {
        let data = body.as_bytes();
        let id = ID_SEEDS
            .iter()
            .fold(0u128, |acc, &seed| (acc << 32) | murmur3_32(data, seed) as u128);
        Self(id)
    }
}

impl fmt::Display for ScriptletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for ScriptletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptletId({})", self)
    }
}
