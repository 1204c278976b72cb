//! Deterministic fingerprints for wiring diagrams.
//!
//! Provides domain-separated, length-prefixed SHA-256 hashing over canonical
//! byte encodings. Two diagrams with the same node and edge sets have equal
//! fingerprints regardless of the order those sets were written in.
//!
//! # References
//! - *SHA-256*: [FIPS 180-4, Secure Hash Standard, 2015]
//! - *Injective length-prefixed encodings*: [Bernstein, "Netstrings", 1997]

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain for whole-diagram structural fingerprints (v0).
pub const DOMAIN_DIAGRAM_V0: &[u8] = b"WIRING_DIAGRAM_V0";

/// Domain for parameter-record fingerprints (v0).
pub const DOMAIN_PARAMS_V0: &[u8] = b"PARAMETER_RECORD_V0";

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of `data` with domain separation.
    ///
    /// Input is `b"SGW:<domain>:v1" || len(data) as u64 LE || data`.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"SGW:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// Lowercase hex rendering of the full hash.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Types with a deterministic canonical byte encoding.
pub trait Canonicalizable {
    /// Serialize to canonical byte representation.
    fn to_canonical_bytes(&self) -> Vec<u8>;

    /// Compute domain-separated hash of canonical bytes.
    fn fingerprint_in(&self, domain: &[u8]) -> HashValue {
        HashValue::hash_with_domain(domain, &self.to_canonical_bytes())
    }
}

/// Appends a length-prefixed string.
pub(crate) fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

impl Canonicalizable for crate::params::ParameterRecord {
    fn to_canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40);
        out.extend_from_slice(&self.rotation.to_le_bytes());
        out.extend_from_slice(&self.match_threshold.to_bits().to_le_bytes());
        out.extend_from_slice(&self.update_probability.to_bits().to_le_bytes());
        put_str(&mut out, self.mix_mode.name());
        out.push(self.invert_on_secondary as u8);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MixMode, ParameterRecord};

    #[test]
    fn domain_separation() {
        let a = HashValue::hash_with_domain(b"A", b"payload");
        let b = HashValue::hash_with_domain(b"B", b"payload");
        assert_ne!(a, b);
        assert_eq!(a, HashValue::hash_with_domain(b"A", b"payload"));
    }

    #[test]
    fn length_prefix_prevents_concatenation_collisions() {
        let mut x = Vec::new();
        put_str(&mut x, "ab");
        put_str(&mut x, "c");
        let mut y = Vec::new();
        put_str(&mut y, "a");
        put_str(&mut y, "bc");
        assert_ne!(x, y);
    }

    #[test]
    fn parameter_fingerprint_tracks_fields() {
        let base = ParameterRecord::default();
        let other = ParameterRecord {
            mix_mode: MixMode::Majority,
            ..base
        };
        assert_eq!(
            base.fingerprint_in(DOMAIN_PARAMS_V0),
            ParameterRecord::default().fingerprint_in(DOMAIN_PARAMS_V0)
        );
        assert_ne!(base.fingerprint_in(DOMAIN_PARAMS_V0), other.fingerprint_in(DOMAIN_PARAMS_V0));
        assert_eq!(HashValue::zero().to_hex().len(), 64);
    }
}
