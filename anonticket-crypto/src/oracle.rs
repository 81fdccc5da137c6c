//! Hashing into the scalar field and into G1.
//!
//! Scalars are derived from a wide SHA3-512 digest reduced modulo the group order. Points come
//! from a [`RandomOracle`], which supports two modes selected by the [`Domain`] of the query:
//!
//! - [`Domain::RandomOracle`] models an ideal random oracle: the first query on an input draws a
//!   fresh random point and every later query on the same input returns that point. The table
//!   only lives as long as the oracle (or until [`RandomOracle::clear()`]), so answers are stable
//!   within a run and unrelated across runs.
//! - [`Domain::Derived`] maps the input deterministically to a point with unknown discrete log,
//!   identical for every oracle instance.

use crate::common::*;
use rand::{rngs::StdRng, SeedableRng};
use sha3::{Digest, Sha3_256, Sha3_512};
use std::collections::HashMap;

/// Domain separation for point queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    /// Memoized fresh randomness, scoped to one oracle instance.
    RandomOracle(&'static str),
    /// Deterministic derivation, identical across instances.
    Derived(&'static str),
}

/// Hash a sequence of byte strings to a scalar.
///
/// Each part is length-prefixed, so distinct sequences never collide by concatenation.
pub fn hash_to_scalar(parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    wide.copy_from_slice(hasher.finalize().as_slice());
    Scalar::from_bytes_wide(&wide)
}

/// Hash a list of scalars to a scalar.
pub fn hash_scalars(scalars: &[Scalar]) -> Scalar {
    let encoded: Vec<[u8; 32]> = scalars.iter().map(Scalar::to_bytes).collect();
    let parts: Vec<&[u8]> = encoded.iter().map(|bytes| &bytes[..]).collect();
    hash_to_scalar(&parts)
}

/// Memo table for hashing into G1.
#[derive(Debug, Default, Clone)]
pub struct RandomOracle {
    table: HashMap<(Domain, Vec<u8>), G1Affine>,
}

impl RandomOracle {
    /// Create an oracle with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `data` to a point of G1 in the given domain.
    ///
    /// The `rng` is only consulted for the first query on an input in the
    /// [`Domain::RandomOracle`] mode.
    pub fn hash_to_point(&mut self, domain: Domain, data: &[u8], rng: &mut impl Rng) -> G1Affine {
        match domain {
            Domain::RandomOracle(_) => *self
                .table
                .entry((domain, data.to_vec()))
                .or_insert_with(|| random_non_identity::<G1Projective>(rng).into()),
            Domain::Derived(label) => derive_point(label, data),
        }
    }

    /// Number of memoized answers.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Forget every memoized answer.
    pub fn clear(&mut self) {
        self.table.clear();
    }
}

fn derive_point(label: &str, data: &[u8]) -> G1Affine {
    let mut hasher = Sha3_256::new();
    hasher.update((label.len() as u64).to_le_bytes());
    hasher.update(label.as_bytes());
    hasher.update(data);
    let mut seed = [0u8; 32];
    seed.copy_from_slice(hasher.finalize().as_slice());
    random_non_identity::<G1Projective>(&mut StdRng::from_seed(seed)).into()
}

#[cfg(test)]
mod test {
    use super::*;

    const SERVICE: Domain = Domain::RandomOracle("service");

    #[test]
    fn random_oracle_answers_are_stable_within_a_run() {
        let mut rng = rand::thread_rng();
        let mut oracle = RandomOracle::new();
        let first = oracle.hash_to_point(SERVICE, b"gate-7", &mut rng);
        let second = oracle.hash_to_point(SERVICE, b"gate-7", &mut rng);
        assert_eq!(first, second);
        assert_ne!(first, oracle.hash_to_point(SERVICE, b"gate-8", &mut rng));
        assert_eq!(oracle.len(), 2);
    }

    #[test]
    fn random_oracle_answers_change_after_clear() {
        let mut rng = rand::thread_rng();
        let mut oracle = RandomOracle::new();
        let before = oracle.hash_to_point(SERVICE, b"gate-7", &mut rng);
        oracle.clear();
        assert!(oracle.is_empty());
        let after = oracle.hash_to_point(SERVICE, b"gate-7", &mut rng);
        assert_ne!(before, after);
        assert_ne!(
            after,
            RandomOracle::new().hash_to_point(SERVICE, b"gate-7", &mut rng)
        );
    }

    #[test]
    fn derived_points_agree_across_oracles() {
        let mut rng = rand::thread_rng();
        let domain = Domain::Derived("verifier");
        let a = RandomOracle::new().hash_to_point(domain, b"museum", &mut rng);
        let b = RandomOracle::new().hash_to_point(domain, b"museum", &mut rng);
        assert_eq!(a, b);
        assert_ne!(
            a,
            RandomOracle::new().hash_to_point(Domain::Derived("other"), b"museum", &mut rng)
        );
    }

    #[test]
    fn scalar_hash_separates_parts() {
        assert_ne!(
            hash_to_scalar(&[&b"ab"[..], &b"c"[..]]),
            hash_to_scalar(&[&b"a"[..], &b"bc"[..]])
        );
        assert_eq!(hash_to_scalar(&[&b"ab"[..]]), hash_to_scalar(&[&b"ab"[..]]));
    }
}
