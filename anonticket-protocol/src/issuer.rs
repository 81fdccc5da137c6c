/*!
The ticket issuer.

A [`Certified`] issuer checks a [`TicketRequest`](crate::user::TicketRequest): the credential
proof, the pseudonym proof and any fare or discount claims, all under one challenge and linked
through their response scalars. It then prices the ticket from the claims, refuses serial numbers
it has already issued, and builds the ticket: one tag per verifier with a fresh opening `k`, the
issuer's signatures on each tag hash and on their aggregate, and the body signature bound to the
pseudonym.

The openings go back to the user alongside the ticket; they are needed to present each tag.
*/

use crate::{
    descriptor::ProtocolDescriptor,
    registration::Certified,
    ticket::{body_base, hash_signature_base, Aggregate, Policy, SignedTag, Tag, Ticket},
    types::*,
    user::{pseudonym_statement, request_challenge, TicketRequest},
    Directory, Error, Verification, VerificationFailure, AGE_ATTRIBUTE, STATUS_ATTRIBUTE,
    USER_ATTRIBUTES,
};
use anonticket_crypto::arith;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Message returned to the user with a fresh ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketIssued {
    /// The ticket.
    pub ticket: Ticket,
    /// The opening `k` of each tag, in tag order.
    #[serde(with = "SerializeElement")]
    pub openings: Vec<Scalar>,
}

/// The issuer of a run.
#[derive(Debug, Clone)]
pub struct Issuer {
    certified: Certified,
    serials: HashSet<[u8; 32]>,
}

impl Issuer {
    /// Start issuing with a verified credential.
    pub fn new(certified: Certified) -> Self {
        Issuer {
            certified,
            serials: HashSet::new(),
        }
    }

    /// The issuer's public key.
    pub fn public_key(&self) -> &PublicKey {
        self.certified.keys().public_key()
    }

    /// Check a ticket request and return the price it earns.
    pub fn verify_request(
        &self,
        params: &GroupParameters,
        directory: &Directory,
        descriptor: &ProtocolDescriptor,
        request: &TicketRequest,
    ) -> Result<u64, Error> {
        let statement = pseudonym_statement(params, request.pseudonym);
        let challenge = request_challenge(
            &descriptor.service,
            &request.serial,
            &statement,
            &request.credential,
            &request.pseudonym_proof,
            request
                .age
                .as_ref()
                .map(|claim| (claim.band, &claim.constraint as &dyn ChallengeInput)),
            request
                .status
                .as_ref()
                .map(|constraint| constraint as &dyn ChallengeInput),
        );

        let secret_key_response = request.credential.secret_key_response_scalar();
        let mut verified = challenge == request.challenge
            && request.credential.verify_knowledge_of_credential(
                directory.authority(),
                USER_ATTRIBUTES,
                params,
                challenge,
            )
            && request
                .pseudonym_proof
                .verify_responses(&statement, challenge)
            && secret_key_response.is_some()
            && secret_key_response
                == request
                    .pseudonym_proof
                    .conjunction_response_scalars()
                    .first()
                    .copied();

        if let Some(claim) = &request.age {
            let range = descriptor
                .fare_bands
                .get(claim.band)
                .ok_or_else(|| Error::Format(format!("no fare band {}", claim.band)))?
                .range()?;
            verified &= match request.credential.attribute_response_scalar(AGE_ATTRIBUTE) {
                Some(age_response) => claim.constraint.verify_range_constraint(
                    range,
                    directory.fares(),
                    params,
                    challenge,
                    age_response,
                ),
                None => false,
            };
        }
        if let Some(constraint) = &request.status {
            let statuses = directory
                .statuses()
                .ok_or_else(|| Error::Format("no status discount is offered".to_string()))?;
            verified &= match request.credential.attribute_response_scalar(STATUS_ATTRIBUTE) {
                Some(status_response) => constraint.verify_membership_constraint(
                    statuses,
                    params,
                    challenge,
                    status_response,
                ),
                None => false,
            };
        }
        Verification::from(verified).or_fail(VerificationFailure::TicketRequest)?;

        descriptor.price(
            request.age.as_ref().map(|claim| claim.band),
            request.status.is_some(),
        )
    }

    /// Check a ticket request and issue a ticket valid from `now`.
    pub fn issue(
        &mut self,
        rng: &mut impl Rng,
        params: &GroupParameters,
        directory: &Directory,
        descriptor: &ProtocolDescriptor,
        request: &TicketRequest,
        now: u64,
    ) -> Result<TicketIssued, Error> {
        let price = self.verify_request(params, directory, descriptor, request)?;
        if !self.serials.insert(request.serial.to_bytes()) {
            log::warn!("refused a ticket request with a reused serial number");
            return Err(Error::SerialReused);
        }

        let policy = Policy {
            service: descriptor.service.clone(),
            price,
            valid_from: now,
            valid_until: now.saturating_add(descriptor.validity),
        };
        let policy_hash = policy.hash();
        let central_verifier = directory.central_verifier()?;
        let secret_key = self.certified.keys().secret_key();

        let mut openings = Vec::with_capacity(descriptor.verifiers.len());
        let mut tags = Vec::with_capacity(descriptor.verifiers.len());
        for name in &descriptor.verifiers {
            let opening = arith::random_nonzero_scalar(rng);
            let tag = Tag::new(
                params,
                name,
                directory.verifier(name)?,
                central_verifier,
                &request.pseudonym,
                &opening,
                &request.serial,
                &policy_hash,
            );
            let exponent = arith::random_nonzero_scalar(rng);
            let signature = Signature::sign(
                secret_key,
                &exponent,
                &hash_signature_base(params, &tag.s),
            )?;
            openings.push(opening);
            tags.push(SignedTag {
                tag,
                exponent,
                signature,
            });
        }

        let aggregate_hash = Aggregate::expected_hash(&tags);
        let aggregate_exponent = arith::random_nonzero_scalar(rng);
        let aggregate = Aggregate {
            hash: aggregate_hash,
            exponent: aggregate_exponent,
            signature: Signature::sign(
                secret_key,
                &aggregate_exponent,
                &hash_signature_base(params, &aggregate_hash),
            )?,
        };

        let psi = arith::random_nonzero_scalar(rng);
        let omega = arith::random_nonzero_scalar(rng);
        let body = Signature::sign(
            secret_key,
            &omega,
            &body_base(
                params,
                &request.serial,
                &policy_hash,
                &aggregate_hash,
                &psi,
                &request.pseudonym,
            ),
        )?;

        log::info!(
            "issued a ticket for {} at price {} with {} tags",
            policy.service,
            policy.price,
            tags.len()
        );
        Ok(TicketIssued {
            ticket: Ticket {
                serial: request.serial,
                policy,
                psi,
                omega,
                body,
                tags,
                aggregate,
            },
            openings,
        })
    }
}
