/*!
Credential issuance from the subject's side.

Every party other than the central authority and the verifiers registers the same way. The
subject generates a key pair and sends a [`RegistrationRequest`], which proves knowledge of its
secret key, and enters the [`Registering`] state. The authority answers with a
[`CredentialResponse`]. The subject checks the credential and [`complete()`](Registering::complete)s
registration, entering the [`Certified`] state. A credential that fails to verify aborts the run.
*/

use crate::{types::*, Error, Verification, VerificationFailure};
use anonticket_crypto::proofs::{KnowledgeProof, Relation, Statement};
use serde::{Deserialize, Serialize};

/// Message sent to the central authority to request a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Identifier of the subject.
    pub identity: String,
    /// Public key of the subject.
    pub public_key: PublicKey,
    /// Attributes to certify.
    #[serde(with = "SerializeElement")]
    pub attributes: Vec<Scalar>,
    /// Proof of knowledge of the secret key behind `public_key`.
    pub proof: KnowledgeProof,
}

impl RegistrationRequest {
    /// Statement proven by a registration request: one exponent on `g` and `g_tilde`.
    pub(crate) fn statement(public_key: &PublicKey, params: &GroupParameters) -> Statement {
        Statement::new(1)
            .with_relation(Relation::new(public_key.credential_key()).with_term(params.g(), 0))
            .with_relation(Relation::new(public_key.tag_key()).with_term(params.g_tilde(), 0))
    }

    pub(crate) fn context(identity: &str) -> Vec<u8> {
        [b"registration:".as_slice(), identity.as_bytes()].concat()
    }

    /// Check the key and the proof of knowledge.
    pub fn verify(&self, params: &GroupParameters) -> Result<(), Error> {
        Verification::from(self.public_key.is_well_formed(params))
            .or_fail(VerificationFailure::PublicKey)?;
        Verification::from(self.proof.verify(
            &Self::statement(&self.public_key, params),
            &Self::context(&self.identity),
        ))
        .or_fail(VerificationFailure::RegistrationProof)
    }

    /// The message the authority certifies.
    pub fn credential_message(&self) -> CredentialMessage {
        CredentialMessage::new(
            &self.identity,
            self.public_key.credential_key(),
            self.attributes.clone(),
        )
    }
}

/// Message returned by the central authority with a fresh credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialResponse {
    /// The credential.
    pub credential: Credential,
}

/// A subject that has requested a credential.
#[derive(Debug, Clone)]
pub struct Registering {
    identity: String,
    keys: KeyPair,
    message: CredentialMessage,
}

impl Registering {
    /// Generate keys for `identity` and request a credential on `attributes`.
    pub fn new(
        rng: &mut impl Rng,
        params: &GroupParameters,
        identity: &str,
        attributes: Vec<Scalar>,
    ) -> Result<(Self, RegistrationRequest), Error> {
        let keys = KeyPair::new(rng, params);
        let public_key = *keys.public_key();
        let proof = KnowledgeProof::prove(
            rng,
            &RegistrationRequest::statement(&public_key, params),
            vec![keys.secret_key().to_scalar()],
            &RegistrationRequest::context(identity),
        )?;
        let request = RegistrationRequest {
            identity: identity.to_string(),
            public_key,
            attributes: attributes.clone(),
            proof,
        };
        let message = CredentialMessage::new(identity, public_key.credential_key(), attributes);
        Ok((
            Registering {
                identity: identity.to_string(),
                keys,
                message,
            },
            request,
        ))
    }

    /// Accept the authority's response if the credential verifies.
    pub fn complete(
        self,
        response: CredentialResponse,
        authority: &PublicKey,
        params: &GroupParameters,
    ) -> Result<Certified, Error> {
        Verification::from(response.credential.verify(&self.message, authority, params))
            .or_fail(VerificationFailure::Credential)?;
        log::info!("{} accepted its credential", self.identity);
        Ok(Certified {
            identity: self.identity,
            keys: self.keys,
            message: self.message,
            credential: response.credential,
        })
    }
}

/// A subject holding a verified credential.
#[derive(Debug, Clone)]
pub struct Certified {
    identity: String,
    keys: KeyPair,
    message: CredentialMessage,
    credential: Credential,
}

impl Certified {
    /// Identifier of the subject.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The subject's keys.
    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    /// The certified message.
    pub fn message(&self) -> &CredentialMessage {
        &self.message
    }

    /// The credential.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}
