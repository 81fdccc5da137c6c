//! The cryptographic context of a run and the public directory of certified keys.

use crate::{types::*, Error};
use anonticket_crypto::{
    oracle::RandomOracle,
    params::DelegationTrapdoor,
    proofs::{RangeConstraintParameters, SetMembershipParameters},
};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeMap;

/// Where a [`CryptoContext`] draws its randomness from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Operating system randomness.
    Entropy,
    /// A fixed seed, for reproducible test vectors only.
    Deterministic([u8; 32]),
}

impl Default for Seed {
    fn default() -> Self {
        Seed::Entropy
    }
}

/// Group parameters, the random oracle table and the random number generator of a run.
///
/// Steps borrow the three parts separately, so they are public fields.
#[derive(Debug)]
pub struct CryptoContext {
    /// Public group parameters.
    pub params: GroupParameters,
    /// Memo table for hashing into G1; cleared at the start of every run.
    pub oracle: RandomOracle,
    /// The run's random number generator.
    pub rng: StdRng,
}

fn rng_from(seed: Seed) -> StdRng {
    match seed {
        Seed::Entropy => StdRng::from_entropy(),
        Seed::Deterministic(seed) => {
            log::warn!("using a deterministic seed; never do this outside of tests");
            StdRng::from_seed(seed)
        }
    }
}

impl CryptoContext {
    /// Generate fresh parameters with room for `attribute_count` credential attributes.
    ///
    /// The returned trapdoor belongs to the central authority.
    pub fn new(attribute_count: usize, seed: Seed) -> (Self, DelegationTrapdoor) {
        let mut rng = rng_from(seed);
        let (params, trapdoor) = GroupParameters::generate(&mut rng, attribute_count);
        let context = CryptoContext {
            params,
            oracle: RandomOracle::new(),
            rng,
        };
        (context, trapdoor)
    }

    /// Use previously persisted parameters. Without a trapdoor, re-keys cannot be derived.
    pub fn from_parameters(params: GroupParameters, seed: Seed) -> Result<Self, Error> {
        params.validate().map_err(|e| {
            log::error!("rejecting group parameters: {}", e);
            Error::Parameters(e.to_string())
        })?;
        Ok(CryptoContext {
            params,
            oracle: RandomOracle::new(),
            rng: rng_from(seed),
        })
    }

    /// Load persisted parameters from JSON.
    pub fn from_json(json: &str, seed: Seed) -> Result<Self, Error> {
        let params = GroupParameters::from_json(json).map_err(|e| {
            log::error!("rejecting group parameters: {}", e);
            Error::Parameters(e.to_string())
        })?;
        Self::from_parameters(params, seed)
    }
}

/// Public keys certified by the central authority, and the public parameters it published.
#[derive(Debug, Clone)]
pub struct Directory {
    authority: PublicKey,
    issuer: Option<PublicKey>,
    central_verifier: Option<PublicKey>,
    verifiers: BTreeMap<String, PublicKey>,
    statuses: Option<SetMembershipParameters>,
    fares: RangeConstraintParameters,
}

impl Directory {
    pub(crate) fn new(
        authority: PublicKey,
        statuses: Option<SetMembershipParameters>,
        fares: RangeConstraintParameters,
    ) -> Self {
        Directory {
            authority,
            issuer: None,
            central_verifier: None,
            verifiers: BTreeMap::new(),
            statuses,
            fares,
        }
    }

    pub(crate) fn set_issuer(&mut self, key: PublicKey) {
        self.issuer = Some(key);
    }

    pub(crate) fn set_central_verifier(&mut self, key: PublicKey) {
        self.central_verifier = Some(key);
    }

    pub(crate) fn add_verifier(&mut self, name: &str, key: PublicKey) {
        let _ = self.verifiers.insert(name.to_string(), key);
    }

    /// The central authority's key.
    pub fn authority(&self) -> &PublicKey {
        &self.authority
    }

    /// The issuer's key.
    pub fn issuer(&self) -> Result<&PublicKey, Error> {
        self.issuer.as_ref().ok_or(Error::NotRegistered("issuer"))
    }

    /// The central verifier's key.
    pub fn central_verifier(&self) -> Result<&PublicKey, Error> {
        self.central_verifier
            .as_ref()
            .ok_or(Error::NotRegistered("central verifier"))
    }

    /// The key of the verifier `name`.
    pub fn verifier(&self, name: &str) -> Result<&PublicKey, Error> {
        self.verifiers
            .get(name)
            .ok_or_else(|| Error::UnknownVerifier(name.to_string()))
    }

    /// The signed set of discount statuses, if the run has one.
    pub fn statuses(&self) -> Option<&SetMembershipParameters> {
        self.statuses.as_ref()
    }

    /// Digit signatures for fare band range proofs.
    pub fn fares(&self) -> &RangeConstraintParameters {
        &self.fares
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deterministic_seeds_reproduce_parameters() {
        let (first, _) = CryptoContext::new(2, Seed::Deterministic([7; 32]));
        let (second, _) = CryptoContext::new(2, Seed::Deterministic([7; 32]));
        let (third, _) = CryptoContext::new(2, Seed::Deterministic([8; 32]));
        assert_eq!(first.params, second.params);
        assert_ne!(first.params, third.params);
    }

    #[test]
    fn persisted_parameters_reproduce_pairings() {
        let (context, _) = CryptoContext::new(2, Seed::Entropy);
        let json = context.params.to_json().unwrap();
        let loaded = CryptoContext::from_json(&json, Seed::Entropy).unwrap();
        assert_eq!(
            pairing(&loaded.params.g(), &loaded.params.g2()),
            pairing(&context.params.g(), &context.params.g2())
        );
        assert!(matches!(
            CryptoContext::from_json("{}", Seed::Entropy),
            Err(Error::Parameters(_))
        ));
    }
}
