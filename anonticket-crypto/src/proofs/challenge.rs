//! Functionality for building challenge scalars with the Fiat-Shamir heuristic.
//!
//! Every proof in a conjunction must be fed into the same [`ChallengeBuilder`], together with
//! the public values the proofs talk about and any context (nonces, identifiers, policies) the
//! proof should be bound to. The prover and the verifier must consume the same items in the same
//! order.

use crate::{common::*, SerializeElement};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// A trait implemented by types which can feed their public components into a
/// [`ChallengeBuilder`].
pub trait ChallengeInput {
    /// Incorporate public components of this type into a [`ChallengeBuilder`].
    fn consume(&self, builder: &mut ChallengeBuilder);
}

impl<'a, T: ChallengeInput> ChallengeInput for &'a T {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        (**self).consume(builder);
    }
}

impl<T: ChallengeInput> ChallengeInput for [T] {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes((self.len() as u64).to_le_bytes());
        for item in self {
            item.consume(builder);
        }
    }
}

impl<T: ChallengeInput> ChallengeInput for Vec<T> {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        self.as_slice().consume(builder);
    }
}

impl ChallengeInput for Scalar {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_bytes());
    }
}

impl ChallengeInput for G1Affine {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_compressed());
    }
}

impl ChallengeInput for G1Projective {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&G1Affine::from(self));
    }
}

impl ChallengeInput for G2Affine {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes(self.to_compressed());
    }
}

/// A challenge scalar for use in a Schnorr-style proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge(#[serde(with = "SerializeElement")] Scalar);

impl Challenge {
    /// Retrieve the internal scalar value.
    pub fn to_scalar(self) -> Scalar {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_scalar(scalar: Scalar) -> Self {
        Challenge(scalar)
    }
}

/// Holds state used when building a [`Challenge`] using the Fiat-Shamir heuristic, as in a
/// non-interactive Schnorr proof.
#[derive(Debug)]
#[allow(missing_copy_implementations)]
pub struct ChallengeBuilder {
    hasher: Sha3_256,
}

impl Default for ChallengeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChallengeBuilder {
    /// Initialize a new, empty challenge.
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    /// Incorporate public data from some given type into the challenge.
    pub fn consume<T: ChallengeInput + ?Sized>(&mut self, object: &T) {
        object.consume(self);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::consume`].
    pub fn with<T: ChallengeInput + ?Sized>(mut self, object: &T) -> Self {
        object.consume(&mut self);
        self
    }

    /// Incorporate arbitrary bytes into the challenge. The length is hashed first, so adjacent
    /// byte strings cannot be confused with each other.
    pub fn consume_bytes(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::consume_bytes`].
    pub fn with_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.consume_bytes(bytes);
        self
    }

    /// Consume the builder and generate a [`Challenge`] from the accumulated data.
    pub fn finish(self) -> Challenge {
        let digest = self.hasher.finalize();
        let mut limbs = [0u64; 4];
        for (limb, chunk) in limbs.iter_mut().zip(digest.chunks_exact(8)) {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            *limb = u64::from_le_bytes(bytes);
        }
        Challenge(Scalar::from_raw(limbs))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn challenge_depends_on_every_input() {
        let base = ChallengeBuilder::new()
            .with_bytes(b"context")
            .with(&Scalar::from(5))
            .finish();
        let same = ChallengeBuilder::new()
            .with_bytes(b"context")
            .with(&Scalar::from(5))
            .finish();
        let different = ChallengeBuilder::new()
            .with_bytes(b"context")
            .with(&Scalar::from(6))
            .finish();
        assert_eq!(base, same);
        assert_ne!(base, different);
    }

    #[test]
    fn byte_boundaries_matter() {
        let split = ChallengeBuilder::new()
            .with_bytes(b"ab")
            .with_bytes(b"c")
            .finish();
        let joined = ChallengeBuilder::new().with_bytes(b"abc").finish();
        assert_ne!(split, joined);
    }
}
