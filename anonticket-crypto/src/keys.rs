//! Discrete-log key pairs.
//!
//! One secret exponent `x` is published on three bases: `g` (credential subject keys), `g_tilde`
//! (tag keys) and the G2 generator (Boneh-Boyen verification keys).

use crate::{
    arith,
    common::*,
    params::GroupParameters,
    proofs::{ChallengeBuilder, ChallengeInput},
    SerializeElement,
};
use serde::{Deserialize, Serialize};

/// Secret exponent of a [`KeyPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKey(#[serde(with = "SerializeElement")] Scalar);

impl SecretKey {
    /// The exponent itself. It is a proof witness and must never leave its owner.
    pub fn to_scalar(self) -> Scalar {
        self.0
    }
}

/// Public half of a [`KeyPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    /// `g^x`
    #[serde(with = "SerializeElement")]
    y: G1Affine,
    /// `g_tilde^x`
    #[serde(with = "SerializeElement")]
    y_tilde: G1Affine,
    /// `g2^x`
    #[serde(with = "SerializeElement")]
    w: G2Affine,
}

impl PublicKey {
    fn from_secret_key(secret_key: &SecretKey, params: &GroupParameters) -> Self {
        PublicKey {
            y: (params.g() * secret_key.0).into(),
            y_tilde: (params.g_tilde() * secret_key.0).into(),
            w: (params.g2() * secret_key.0).into(),
        }
    }

    /// The key on the credential base `g`.
    pub fn credential_key(&self) -> G1Affine {
        self.y
    }

    /// The key on the tag base `g_tilde`.
    pub fn tag_key(&self) -> G1Affine {
        self.y_tilde
    }

    /// The key in G2.
    pub fn verification_key(&self) -> G2Affine {
        self.w
    }

    /// Check that all three parts share one exponent and none is the identity.
    pub fn is_well_formed(&self, params: &GroupParameters) -> bool {
        let g2 = params.g2();
        !bool::from(self.y.is_identity())
            && !bool::from(self.w.is_identity())
            && pairing(&self.y, &g2) == pairing(&params.g(), &self.w)
            && pairing(&self.y_tilde, &g2) == pairing(&params.g_tilde(), &self.w)
    }
}

impl ChallengeInput for PublicKey {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.y);
        builder.consume(&self.y_tilde);
        builder.consume(&self.w);
    }
}

/// A secret exponent and its public counterparts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair with a uniformly random non-zero exponent.
    pub fn new(rng: &mut impl Rng, params: &GroupParameters) -> Self {
        let secret_key = SecretKey(arith::random_nonzero_scalar(rng));
        let public_key = PublicKey::from_secret_key(&secret_key, params);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Secret half.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}
