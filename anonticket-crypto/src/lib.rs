//! This crate includes the cryptographic building blocks of an anonymous ticketing system,
//! instantiated over the pairing-friendly curve BLS12-381:
//! - Arithmetic modulo the group order: extended Euclid inversion, rejection sampling and
//!   primality testing.
//! - Public group parameters and a memoizing random oracle.
//! - Weak Boneh-Boyen signatures and BBS+-style credentials issued by a central authority.
//! - Schnorr-style zero-knowledge proofs for discrete-log representations, credentials,
//!   signatures, set membership and ranges, composable through shared commitment scalars.

#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod arith;
pub mod credential;
pub mod keys;
pub mod oracle;
pub mod params;
pub mod proofs;
pub mod signature;

mod serde;

pub use crate::serde::SerializeElement;
pub use common::Rng;

use thiserror::*;

/// Error types that may arise from cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An element with no multiplicative inverse modulo the group order was inverted. This only
    /// happens when some parameter was generated incorrectly.
    #[error("element is not invertible modulo the group order")]
    NotInvertible,
    /// Group parameters failed validation.
    #[error("invalid group parameters: {0}")]
    InvalidParameters(String),
    /// A list of witnesses, scalars or attributes did not have the length the parameters require.
    #[error("expected {expected} elements, got {got}")]
    LengthMismatch {
        /// The length the parameters expect.
        expected: usize,
        /// The length actually provided.
        got: usize,
    },
    /// A relation referred to a witness index that does not exist.
    #[error("relation refers to witness {index}, but only {count} witnesses exist")]
    WitnessIndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The number of witnesses in the statement.
        count: usize,
    },
    /// A range proof was requested for a value outside its range.
    #[error("value {value} lies outside the range [{lower}, {upper})")]
    ValueOutsideRange {
        /// The value the prover tried to use.
        value: u64,
        /// Inclusive lower bound.
        lower: u64,
        /// Exclusive upper bound.
        upper: u64,
    },
    /// A range with no values in it, or a digit base that cannot decompose it.
    #[error("cannot build range constraints for [{lower}, {upper}) in base {base}")]
    InvalidRange {
        /// Inclusive lower bound.
        lower: u64,
        /// Exclusive upper bound.
        upper: u64,
        /// Digit base.
        base: u64,
    },
    /// A set-membership proof was requested for an element that is not in the public set.
    #[error("element is not a member of the public set")]
    ElementNotInSet,
    /// Bytes did not decode to a valid element.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

mod common {
    //! Common types used internally.

    pub use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
    pub use group::{Group, GroupEncoding};

    /// A trait synonym for a cryptographically secure random number generator. This trait is
    /// blanket-implemented for all valid types and will never need to be implemented by-hand.
    pub trait Rng: rand::CryptoRng + rand::RngCore {}
    impl<T: rand::CryptoRng + rand::RngCore> Rng for T {}

    /// Select a non-identity element from the group uniformly at random.
    pub fn random_non_identity<G>(rng: &mut impl Rng) -> G
    where
        G: Group<Scalar = Scalar>,
    {
        loop {
            let g = G::random(&mut *rng);
            if !bool::from(g.is_identity()) {
                return g;
            }
        }
    }

    /// Whether a point is the identity of its group.
    pub fn is_identity<G: Group>(g: &G) -> bool {
        bool::from(g.is_identity())
    }
}
