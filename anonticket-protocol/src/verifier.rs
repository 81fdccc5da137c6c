/*!
Verifiers.

A verifier is enrolled by the central authority, which hands it its keys and a credential. To
validate a ticket it sends a [`ValidationRequest`] with a fresh nonce, naming the tag slot it wants
to see: normally its own, or another verifier's when it holds a [`ReKey`] for it. It then checks
the [`Presentation`]:

1. the nonce is the one it issued, and the tag belongs to the requested slot,
2. the ticket is inside its validity window,
3. the tag hash matches the tag, serial and policy,
4. the tag was issued to this verifier, or to the delegator of a cached re-key,
5. the binding proof and the proof of knowledge of the issuer's signature verify,

and records the spend in its [`SpendLedger`], which flags any tag shown twice.
*/

use crate::{
    authority::Enrollment,
    delegation::{ReKey, ReKeyRequest},
    descriptor::ProtocolDescriptor,
    ledger::{SpendLedger, SpendTranscript, ValidationOutcome},
    ticket::hash_signature_base,
    types::*,
    user::{binding_statement, presentation_challenge, verifier_pseudonym_base, Presentation},
    Directory, Error, Verification, VerificationFailure,
};
use anonticket_crypto::{arith, oracle::RandomOracle};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message sent to a ticket holder to start a validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// The validating verifier.
    pub verifier: String,
    /// The verifier whose tag must be presented.
    pub slot: String,
    /// Fresh nonce `r`.
    #[serde(with = "SerializeElement")]
    pub nonce: Scalar,
}

/// A verifier of a run.
#[derive(Debug)]
pub struct Verifier {
    identity: String,
    keys: KeyPair,
    rekeys: HashMap<String, ReKey>,
    pending: Option<ValidationRequest>,
    ledger: SpendLedger,
}

impl Verifier {
    /// Accept an enrollment from the central authority.
    pub fn new(
        enrollment: Enrollment,
        authority: &PublicKey,
        params: &GroupParameters,
    ) -> Result<Self, Error> {
        Verification::from(enrollment.credential.verify(
            &enrollment.credential_message(),
            authority,
            params,
        ))
        .or_fail(VerificationFailure::Credential)?;
        Ok(Verifier {
            identity: enrollment.identity,
            keys: enrollment.keys,
            rekeys: HashMap::new(),
            pending: None,
            ledger: SpendLedger::default(),
        })
    }

    /// The verifier's name.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The verifier's public key.
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    /// The spend ledger.
    pub fn ledger(&self) -> &SpendLedger {
        &self.ledger
    }

    /// The re-key request needed to validate tags of `slot`, if one is missing.
    pub fn needs_rekey(&self, slot: &str) -> Option<ReKeyRequest> {
        if slot == self.identity || self.rekeys.contains_key(slot) {
            None
        } else {
            Some(ReKeyRequest {
                delegate: self.identity.clone(),
                delegator: slot.to_string(),
            })
        }
    }

    /// Cache a re-key from the central authority.
    pub fn accept_rekey(&mut self, rekey: ReKey) -> Result<(), Error> {
        if rekey.delegate() != self.identity {
            return Err(Error::DelegationUnavailable(format!(
                "re-key is addressed to {}",
                rekey.delegate()
            )));
        }
        log::debug!("{} can now validate tags of {}", self.identity, rekey.delegator());
        let _ = self.rekeys.insert(rekey.delegator().to_string(), rekey);
        Ok(())
    }

    /// Start validating the tag of `slot`.
    pub fn challenge(&mut self, rng: &mut impl Rng, slot: &str) -> Result<ValidationRequest, Error> {
        if self.needs_rekey(slot).is_some() {
            return Err(Error::DelegationUnavailable(format!(
                "{} holds no re-key for {}",
                self.identity, slot
            )));
        }
        let request = ValidationRequest {
            verifier: self.identity.clone(),
            slot: slot.to_string(),
            nonce: arith::random_nonzero_scalar(rng),
        };
        self.pending = Some(request.clone());
        Ok(request)
    }

    /// Check a presentation against the pending request and record the spend.
    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        &mut self,
        rng: &mut impl Rng,
        params: &GroupParameters,
        oracle: &mut RandomOracle,
        directory: &Directory,
        descriptor: &ProtocolDescriptor,
        presentation: &Presentation,
        now: u64,
    ) -> Result<ValidationOutcome, Error> {
        let request = self.pending.take().ok_or_else(|| {
            Error::UnexpectedStep(format!("{} has no pending validation", self.identity))
        })?;
        let tag = &presentation.tag;
        Verification::from(presentation.nonce == request.nonce)
            .or_fail(VerificationFailure::Nonce)?;
        Verification::from(tag.verifier == request.slot).or_fail(VerificationFailure::TagKey)?;
        Verification::from(presentation.policy.is_valid_at(now))
            .or_fail(VerificationFailure::ValidityWindow)?;
        Verification::from(
            tag.s == tag.expected_hash(&presentation.serial, &presentation.policy.hash()),
        )
        .or_fail(VerificationFailure::TagHash)?;

        let key_ok = if request.slot == self.identity {
            tag.check_designated(self.keys.secret_key())
        } else {
            self.rekeys
                .get(&request.slot)
                .map(|rekey| rekey.check_tag(tag, self.keys.secret_key(), params))
                .unwrap_or(false)
        };
        Verification::from(key_ok).or_fail(VerificationFailure::TagKey)?;

        let verifier_pseudonym = match (
            descriptor.per_verifier_pseudonyms,
            presentation.verifier_pseudonym,
        ) {
            (true, Some(pseudonym)) => Some((
                verifier_pseudonym_base(oracle, rng, &request.verifier),
                pseudonym,
            )),
            (false, None) => None,
            _ => {
                Verification::Failed.or_fail(VerificationFailure::Presentation)?;
                None
            }
        };
        let statement = binding_statement(
            params,
            directory.central_verifier()?,
            tag,
            &request.nonce,
            &presentation.spend_response,
            verifier_pseudonym,
        );
        let challenge = presentation_challenge(
            &request,
            &presentation.serial,
            &presentation.policy,
            &statement,
            &presentation.binding,
            &presentation.signature,
        );
        let issuer = directory.issuer()?;
        Verification::from(
            challenge == presentation.challenge
                && presentation.binding.verify_responses(&statement, challenge)
                && presentation.signature.verify_knowledge_of_signature(
                    &hash_signature_base(params, &tag.s),
                    &issuer.verification_key(),
                    &params.g2(),
                    challenge,
                ),
        )
        .or_fail(VerificationFailure::Presentation)?;

        let outcome = self.ledger.record(
            &request.slot,
            SpendTranscript {
                commitment: tag.q,
                response: presentation.spend_response,
                encryption: tag.p,
                tag_hash: tag.s,
                nonce: request.nonce,
            },
            params,
        );
        if outcome == ValidationOutcome::Valid {
            log::info!("{} validated a tag of {}", self.identity, request.slot);
        }
        Ok(outcome)
    }
}
