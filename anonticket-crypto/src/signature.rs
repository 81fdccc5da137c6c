//! Weak Boneh-Boyen signatures on scalar messages with a caller-chosen base.
//!
//! A signature on `m` under secret key `x` with base `B` is `sigma = B^{1/(x+m)}`; it verifies if
//! `e(sigma, W * g2^m) == e(B, g2)` for `W = g2^x`. The base is usually a fixed generator (set
//! membership, digits) or a product of generators and public values (ticket tags).

use crate::{
    arith,
    common::*,
    keys::SecretKey,
    proofs::{ChallengeBuilder, ChallengeInput},
    Error, SerializeElement,
};
use serde::{Deserialize, Serialize};

/// A weak Boneh-Boyen signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "SerializeElement")] G1Affine);

impl Signature {
    /// Sign `message` on `base`.
    ///
    /// Fails only if `x + message == 0`, which a caller that checks for that before signing never
    /// sees.
    pub fn sign(secret_key: &SecretKey, message: &Scalar, base: &G1Projective) -> Result<Self, Error> {
        let exponent = arith::invert_scalar(&(secret_key.to_scalar() + message))?;
        Ok(Signature((base * exponent).into()))
    }

    /// Check the signature against `message`, `base` and the signer's G2 key.
    pub fn verify(
        &self,
        message: &Scalar,
        base: &G1Projective,
        verification_key: &G2Affine,
        g2: &G2Affine,
    ) -> bool {
        if bool::from(self.0.is_identity()) {
            return false;
        }
        let shifted_key = G2Affine::from(G2Projective::from(verification_key) + g2 * message);
        pairing(&self.0, &shifted_key) == pairing(&G1Affine::from(base), g2)
    }

    /// The signature as a point.
    pub fn to_g1(self) -> G1Affine {
        self.0
    }
}

impl ChallengeInput for Signature {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.0);
    }
}
