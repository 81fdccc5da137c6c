//! BBS+-style credentials issued by the central authority.
//!
//! A credential binds a subject's identity, its public key `Y = g^x` and a vector of attributes
//! under the authority's key. With
//!
//! `B = g0 * g1^{H(id)} * Y * h^d * prod gs_i^{m_i}`
//!
//! the credential is `(sigma, e, d)` with `sigma = B^{1/(x_CA + e)}` for fresh random `e` and `d`.
//! It verifies if `e(sigma, W_CA * g2^e) == e(B, g2)`.
//!
//! Possession of a credential is shown without revealing it using a
//! [`CredentialProof`](crate::proofs::CredentialProof).

use crate::{
    arith,
    common::*,
    keys::{PublicKey, SecretKey},
    oracle,
    params::GroupParameters,
    signature::Signature,
    Error, SerializeElement,
};
use serde::{Deserialize, Serialize};

/// The data a credential certifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialMessage {
    #[serde(with = "SerializeElement")]
    identity_hash: Scalar,
    #[serde(with = "SerializeElement")]
    subject_key: G1Affine,
    #[serde(with = "SerializeElement")]
    attributes: Vec<Scalar>,
}

impl CredentialMessage {
    /// Describe a subject by identifier, public key on `g` and attributes.
    pub fn new(identity: &str, subject_key: G1Affine, attributes: Vec<Scalar>) -> Self {
        CredentialMessage {
            identity_hash: identity_hash(identity),
            subject_key,
            attributes,
        }
    }

    /// Hash of the identifier.
    pub fn identity_hash(&self) -> Scalar {
        self.identity_hash
    }

    /// Public key of the subject.
    pub fn subject_key(&self) -> G1Affine {
        self.subject_key
    }

    /// Certified attributes.
    pub fn attributes(&self) -> &[Scalar] {
        &self.attributes
    }

    /// `B` for blinding exponent `d`.
    pub(crate) fn base(&self, blinding: &Scalar, params: &GroupParameters) -> Result<G1Projective, Error> {
        if self.attributes.len() > params.attribute_count() {
            return Err(Error::LengthMismatch {
                expected: params.attribute_count(),
                got: self.attributes.len(),
            });
        }
        let mut base = G1Projective::from(params.g0())
            + params.g1() * self.identity_hash
            + self.subject_key
            + params.h() * blinding;
        for (index, attribute) in self.attributes.iter().enumerate() {
            base += params.attribute_generator(index)? * attribute;
        }
        Ok(base)
    }
}

/// Hash an identifier into the scalar certified by a credential.
pub fn identity_hash(identity: &str) -> Scalar {
    oracle::hash_to_scalar(&[b"identity", identity.as_bytes()])
}

/// A credential `(sigma, e, d)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    sigma: Signature,
    #[serde(with = "SerializeElement")]
    e: Scalar,
    #[serde(with = "SerializeElement")]
    d: Scalar,
}

impl Credential {
    /// Issue a credential on `message` under the authority's secret key.
    pub fn issue(
        rng: &mut impl Rng,
        secret_key: &SecretKey,
        message: &CredentialMessage,
        params: &GroupParameters,
    ) -> Result<Self, Error> {
        let e = arith::random_nonzero_scalar(rng);
        let d = arith::random_nonzero_scalar(rng);
        let sigma = Signature::sign(secret_key, &e, &message.base(&d, params)?)?;
        Ok(Credential { sigma, e, d })
    }

    /// Check the credential against `message` and the authority's public key.
    pub fn verify(
        &self,
        message: &CredentialMessage,
        authority: &PublicKey,
        params: &GroupParameters,
    ) -> bool {
        match message.base(&self.d, params) {
            Ok(base) => self.sigma.verify(
                &self.e,
                &base,
                &authority.verification_key(),
                &params.g2(),
            ),
            Err(_) => false,
        }
    }

    pub(crate) fn sigma(&self) -> G1Affine {
        self.sigma.to_g1()
    }

    pub(crate) fn e(&self) -> Scalar {
        self.e
    }

    pub(crate) fn d(&self) -> Scalar {
        self.d
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keys::KeyPair;
    use ff::Field;

    fn setup() -> (GroupParameters, KeyPair, KeyPair, CredentialMessage) {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 2);
        let authority = KeyPair::new(&mut rng, &params);
        let subject = KeyPair::new(&mut rng, &params);
        let message = CredentialMessage::new(
            "alice",
            subject.public_key().credential_key(),
            vec![Scalar::from(34), Scalar::random(&mut rng)],
        );
        (params, authority, subject, message)
    }

    #[test]
    fn issued_credential_verifies() {
        let mut rng = rand::thread_rng();
        let (params, authority, _, message) = setup();
        let credential =
            Credential::issue(&mut rng, authority.secret_key(), &message, &params).unwrap();
        assert!(credential.verify(&message, authority.public_key(), &params));
    }

    #[test]
    fn credential_is_bound_to_identity_key_and_attributes() {
        let mut rng = rand::thread_rng();
        let (params, authority, subject, message) = setup();
        let credential =
            Credential::issue(&mut rng, authority.secret_key(), &message, &params).unwrap();

        let renamed = CredentialMessage::new(
            "mallory",
            subject.public_key().credential_key(),
            message.attributes().to_vec(),
        );
        assert!(!credential.verify(&renamed, authority.public_key(), &params));

        let other_key = KeyPair::new(&mut rng, &params);
        let rekeyed = CredentialMessage::new(
            "alice",
            other_key.public_key().credential_key(),
            message.attributes().to_vec(),
        );
        assert!(!credential.verify(&rekeyed, authority.public_key(), &params));

        let mut attributes = message.attributes().to_vec();
        attributes[0] = Scalar::from(12);
        let older = CredentialMessage::new("alice", subject.public_key().credential_key(), attributes);
        assert!(!credential.verify(&older, authority.public_key(), &params));
    }

    #[test]
    fn credential_fails_under_another_authority() {
        let mut rng = rand::thread_rng();
        let (params, authority, _, message) = setup();
        let credential =
            Credential::issue(&mut rng, authority.secret_key(), &message, &params).unwrap();
        let impostor = KeyPair::new(&mut rng, &params);
        assert!(!credential.verify(&message, impostor.public_key(), &params));
    }

    #[test]
    fn too_many_attributes_are_rejected() {
        let mut rng = rand::thread_rng();
        let (params, authority, subject, _) = setup();
        let message = CredentialMessage::new(
            "bob",
            subject.public_key().credential_key(),
            vec![Scalar::one(); 3],
        );
        assert!(matches!(
            Credential::issue(&mut rng, authority.secret_key(), &message, &params),
            Err(Error::LengthMismatch { expected: 2, got: 3 })
        ));
    }
}
