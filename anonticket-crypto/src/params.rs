//! Public group parameters shared by every party in a run.
//!
//! The parameters fix the pairing groups (through the order `p`) and a collection of independent
//! generators. Every generator is sampled as a random point, so nobody knows a discrete-log
//! relation between any two of them. The only exception is the pair `theta1`, `theta2` used by
//! verifier delegation: their exponents with respect to `g_tilde` form the [`DelegationTrapdoor`],
//! which is handed to the central authority and nobody else.
//!
//! Parameters round-trip through JSON, and every decoded instance is validated before use.

use crate::{arith, common::*, Error, SerializeElement};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Number of `h` generators used to sign ticket bodies.
pub const TICKET_GENERATORS: usize = 4;

/// Number of `gs` generators reserved before the attribute generators: `g0` and `g1`.
const RESERVED_GS: usize = 2;

/// Exponents of `theta1` and `theta2` with respect to `g_tilde`.
///
/// Knowledge of these lets the central authority derive re-keys between verifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationTrapdoor {
    #[serde(with = "SerializeElement")]
    t1: Scalar,
    #[serde(with = "SerializeElement")]
    t2: Scalar,
}

impl DelegationTrapdoor {
    /// The exponent `t1 + t2 * id_hash` of `theta1 * theta2^{id_hash}` with respect to `g_tilde`.
    pub fn verifier_exponent(&self, id_hash: &Scalar) -> Scalar {
        self.t1 + self.t2 * id_hash
    }
}

/// Public parameters of the pairing groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedGroupParameters")]
pub struct GroupParameters {
    order: BigUint,
    #[serde(with = "SerializeElement")]
    g: G1Affine,
    #[serde(with = "SerializeElement")]
    g_tilde: G1Affine,
    #[serde(with = "SerializeElement")]
    g_bar: G1Affine,
    #[serde(with = "SerializeElement")]
    gs: Vec<G1Affine>,
    #[serde(with = "SerializeElement")]
    h: G1Affine,
    #[serde(with = "SerializeElement")]
    hs: Vec<G1Affine>,
    #[serde(with = "SerializeElement")]
    theta1: G1Affine,
    #[serde(with = "SerializeElement")]
    theta2: G1Affine,
    #[serde(with = "SerializeElement")]
    xi: G1Affine,
    #[serde(with = "SerializeElement")]
    rho: G1Affine,
    #[serde(with = "SerializeElement")]
    g2: G2Affine,
}

#[derive(Deserialize)]
struct UncheckedGroupParameters {
    order: BigUint,
    #[serde(with = "SerializeElement")]
    g: G1Affine,
    #[serde(with = "SerializeElement")]
    g_tilde: G1Affine,
    #[serde(with = "SerializeElement")]
    g_bar: G1Affine,
    #[serde(with = "SerializeElement")]
    gs: Vec<G1Affine>,
    #[serde(with = "SerializeElement")]
    h: G1Affine,
    #[serde(with = "SerializeElement")]
    hs: Vec<G1Affine>,
    #[serde(with = "SerializeElement")]
    theta1: G1Affine,
    #[serde(with = "SerializeElement")]
    theta2: G1Affine,
    #[serde(with = "SerializeElement")]
    xi: G1Affine,
    #[serde(with = "SerializeElement")]
    rho: G1Affine,
    #[serde(with = "SerializeElement")]
    g2: G2Affine,
}

impl TryFrom<UncheckedGroupParameters> for GroupParameters {
    type Error = Error;

    fn try_from(unchecked: UncheckedGroupParameters) -> Result<Self, Self::Error> {
        let params = GroupParameters {
            order: unchecked.order,
            g: unchecked.g,
            g_tilde: unchecked.g_tilde,
            g_bar: unchecked.g_bar,
            gs: unchecked.gs,
            h: unchecked.h,
            hs: unchecked.hs,
            theta1: unchecked.theta1,
            theta2: unchecked.theta2,
            xi: unchecked.xi,
            rho: unchecked.rho,
            g2: unchecked.g2,
        };
        params.validate()?;
        Ok(params)
    }
}

impl GroupParameters {
    /// Generate fresh parameters with room for `attribute_count` credential attributes.
    ///
    /// Returns the trapdoor for `theta1` and `theta2` alongside; it must go to the central
    /// authority only.
    pub fn generate(rng: &mut impl Rng, attribute_count: usize) -> (Self, DelegationTrapdoor) {
        let g_tilde: G1Projective = random_non_identity(rng);
        let trapdoor = DelegationTrapdoor {
            t1: arith::random_nonzero_scalar(rng),
            t2: arith::random_nonzero_scalar(rng),
        };

        let params = GroupParameters {
            order: arith::group_order(),
            g: random_g1(rng),
            g_tilde: g_tilde.into(),
            g_bar: random_g1(rng),
            gs: (0..RESERVED_GS + attribute_count)
                .map(|_| random_g1(rng))
                .collect(),
            h: random_g1(rng),
            hs: (0..TICKET_GENERATORS).map(|_| random_g1(rng)).collect(),
            theta1: (g_tilde * trapdoor.t1).into(),
            theta2: (g_tilde * trapdoor.t2).into(),
            xi: random_g1(rng),
            rho: random_g1(rng),
            g2: random_non_identity::<G2Projective>(rng).into(),
        };
        (params, trapdoor)
    }

    /// Check that the parameters describe the BLS12-381 groups and that no generator is the
    /// identity.
    pub fn validate(&self) -> Result<(), Error> {
        if self.order != arith::group_order() {
            return Err(Error::InvalidParameters(
                "group order does not match the curve's scalar field".to_string(),
            ));
        }
        if !arith::is_probable_prime(&self.order, &mut rand::thread_rng()) {
            return Err(Error::InvalidParameters(
                "group order is not prime".to_string(),
            ));
        }
        if self.gs.len() < RESERVED_GS {
            return Err(Error::InvalidParameters(format!(
                "expected at least {} credential generators, got {}",
                RESERVED_GS,
                self.gs.len()
            )));
        }
        if self.hs.len() != TICKET_GENERATORS {
            return Err(Error::InvalidParameters(format!(
                "expected {} ticket generators, got {}",
                TICKET_GENERATORS,
                self.hs.len()
            )));
        }

        let singles = [
            self.g,
            self.g_tilde,
            self.g_bar,
            self.h,
            self.theta1,
            self.theta2,
            self.xi,
            self.rho,
        ];
        let any_identity = singles
            .iter()
            .chain(self.gs.iter())
            .chain(self.hs.iter())
            .any(|point| bool::from(point.is_identity()));
        if any_identity || bool::from(self.g2.is_identity()) {
            return Err(Error::InvalidParameters(
                "a generator is the identity".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|err| Error::InvalidEncoding(err.to_string()))
    }

    /// Parse and validate parameters from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let unchecked: UncheckedGroupParameters =
            serde_json::from_str(json).map_err(|err| Error::InvalidEncoding(err.to_string()))?;
        Self::try_from(unchecked)
    }

    /// The order `p` of the groups.
    pub fn order(&self) -> &BigUint {
        &self.order
    }

    /// Base of credential public keys.
    pub fn g(&self) -> G1Affine {
        self.g
    }

    /// Base of tag keys: verifier keys, the tracing key and the delegation generators.
    pub fn g_tilde(&self) -> G1Affine {
        self.g_tilde
    }

    /// Base of signatures over public sets and digits.
    pub fn g_bar(&self) -> G1Affine {
        self.g_bar
    }

    /// First credential generator.
    pub fn g0(&self) -> G1Affine {
        self.gs[0]
    }

    /// Credential generator for identity hashes and tag hashes.
    pub fn g1(&self) -> G1Affine {
        self.gs[1]
    }

    /// Number of hidden attributes a credential can carry.
    pub fn attribute_count(&self) -> usize {
        self.gs.len() - RESERVED_GS
    }

    /// Generator for credential attribute `index`.
    pub fn attribute_generator(&self, index: usize) -> Result<G1Affine, Error> {
        self.gs
            .get(RESERVED_GS + index)
            .copied()
            .ok_or(Error::LengthMismatch {
                expected: self.attribute_count(),
                got: index + 1,
            })
    }

    /// Generator for the blinding exponent of credentials.
    pub fn h(&self) -> G1Affine {
        self.h
    }

    /// Generators for ticket bodies: serial, policy, aggregate tag hash, blinding.
    pub fn ticket_generators(&self) -> &[G1Affine] {
        &self.hs
    }

    /// First delegation generator.
    pub fn theta1(&self) -> G1Affine {
        self.theta1
    }

    /// Second delegation generator.
    pub fn theta2(&self) -> G1Affine {
        self.theta2
    }

    /// Base of pseudonyms.
    pub fn xi(&self) -> G1Affine {
        self.xi
    }

    /// Base of the double-spend equation.
    pub fn rho(&self) -> G1Affine {
        self.rho
    }

    /// Generator of G2.
    pub fn g2(&self) -> G2Affine {
        self.g2
    }
}

fn random_g1(rng: &mut impl Rng) -> G1Affine {
    random_non_identity::<G1Projective>(rng).into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_parameters_validate() {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 3);
        params.validate().unwrap();
        assert_eq!(params.attribute_count(), 3);
        assert!(params.attribute_generator(2).is_ok());
        assert!(params.attribute_generator(3).is_err());
    }

    #[test]
    fn trapdoor_matches_delegation_generators() {
        let mut rng = rand::thread_rng();
        let (params, trapdoor) = GroupParameters::generate(&mut rng, 0);
        let id_hash = Scalar::from(77);
        let expected = G1Projective::from(params.theta1()) + params.theta2() * id_hash;
        assert_eq!(
            G1Affine::from(params.g_tilde() * trapdoor.verifier_exponent(&id_hash)),
            G1Affine::from(expected)
        );
    }

    #[test]
    fn json_round_trip() {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 2);
        let json = params.to_json().unwrap();
        assert_eq!(GroupParameters::from_json(&json).unwrap(), params);
    }

    #[test]
    fn identity_generator_is_rejected() {
        let mut rng = rand::thread_rng();
        let (mut params, _) = GroupParameters::generate(&mut rng, 1);
        params.xi = G1Affine::identity();
        let json = serde_json::to_string(&params).unwrap();
        assert!(GroupParameters::from_json(&json).is_err());
    }

    #[test]
    fn truncated_ticket_generators_are_rejected() {
        let mut rng = rand::thread_rng();
        let (mut params, _) = GroupParameters::generate(&mut rng, 1);
        let _ = params.hs.pop();
        assert!(params.validate().is_err());
    }
}
