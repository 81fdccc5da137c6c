/*!
Cryptographic routines for a ticket holder.

## Request

A [`Certified`] user starts a ticket request with [`TicketRequested::new()`]. The
[`TicketRequest`] it sends carries the pseudonym `Y = xi^x`, a fresh serial number and, under one
Fiat-Shamir challenge,

- a proof of knowledge of the user's credential, with the secret key and attributes hidden,
- a proof that `Y` uses the certified secret key,
- optionally a range constraint showing the hidden age lies in a fare band,
- optionally a membership constraint showing the hidden status earns a discount.

The claims are linked to the credential attributes through shared commitment scalars.

## Accept

On receiving [`TicketIssued`](crate::issuer::TicketIssued), the user recomputes every tag from
the openings, checks all issuer signatures and the price, and
[`complete()`](TicketRequested::complete)s into a [`HeldTicket`].

## Present

Given a verifier's [`ValidationRequest`] with nonce `r`, the holder
[`present()`](HeldTicket::present)s the tag for the requested slot: it reveals the public tag, the
spend response `E = x + r * k`, a proof binding the tag to `x` and `k`, and a proof of knowledge of
the issuer's signature on the tag hash. Presenting the same tag twice reveals `x` to the verifier.
*/

use crate::{
    descriptor::ProtocolDescriptor,
    issuer::TicketIssued,
    registration::Certified,
    ticket::{hash_signature_base, Policy, Tag, Ticket},
    types::*,
    verifier::ValidationRequest,
    Directory, Error, Verification, VerificationFailure, AGE_ATTRIBUTE, STATUS_ATTRIBUTE,
    USER_ATTRIBUTES,
};
use anonticket_crypto::{
    arith,
    oracle::{Domain, RandomOracle},
    proofs::{
        label_to_scalar, CredentialProof, CredentialProofBuilder, MembershipConstraint,
        MembershipConstraintBuilder, RangeConstraint, RangeConstraintBuilder, Relation,
        SignatureProof, SignatureProofBuilder, Statement, StatementProof, StatementProofBuilder,
    },
};
use serde::{Deserialize, Serialize};

/// Oracle domain of the per-verifier pseudonym bases.
pub(crate) const VERIFIER_PSEUDONYM_DOMAIN: Domain = Domain::RandomOracle("verifier-pseudonym");

/// The user's identity and the attributes certified for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identifier registered with the central authority.
    pub identity: String,
    /// Age in years.
    pub age: u64,
    /// Status label, such as `"student"`.
    pub status: String,
}

impl UserProfile {
    /// The credential attributes for this profile.
    pub fn attributes(&self) -> Vec<Scalar> {
        let mut attributes = vec![Scalar::zero(); USER_ATTRIBUTES];
        attributes[AGE_ATTRIBUTE] = Scalar::from(self.age);
        attributes[STATUS_ATTRIBUTE] = label_to_scalar(&self.status);
        attributes
    }
}

/// A claim that the hidden age lies in fare band `band`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeClaim {
    /// Index of the fare band in the descriptor.
    pub band: usize,
    /// The range constraint on the age attribute.
    pub constraint: RangeConstraint,
}

/// Message sent to the issuer to request a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRequest {
    /// The pseudonym `xi^x`.
    #[serde(with = "SerializeElement")]
    pub pseudonym: G1Affine,
    /// Serial number chosen by the user.
    #[serde(with = "SerializeElement")]
    pub serial: Scalar,
    /// The challenge shared by every proof in the request.
    pub challenge: Challenge,
    /// Proof of knowledge of a credential.
    pub credential: CredentialProof,
    /// Proof that the pseudonym uses the certified secret key.
    pub pseudonym_proof: StatementProof,
    /// Fare band claim.
    pub age: Option<AgeClaim>,
    /// Status discount claim.
    pub status: Option<MembershipConstraint>,
}

/// `Y = xi^x`
pub(crate) fn pseudonym_statement(params: &GroupParameters, pseudonym: G1Affine) -> Statement {
    Statement::new(1).with_relation(Relation::new(pseudonym).with_term(params.xi(), 0))
}

/// The challenge of a ticket request, computed identically from builders and from proofs.
#[allow(clippy::too_many_arguments)]
pub(crate) fn request_challenge(
    service: &str,
    serial: &Scalar,
    statement: &Statement,
    credential: &dyn ChallengeInput,
    pseudonym_proof: &dyn ChallengeInput,
    age: Option<(usize, &dyn ChallengeInput)>,
    status: Option<&dyn ChallengeInput>,
) -> Challenge {
    let mut builder = ChallengeBuilder::new()
        .with_bytes(b"ticket-request")
        .with_bytes(service)
        .with(serial)
        .with(statement)
        .with(credential)
        .with(pseudonym_proof);
    if let Some((band, constraint)) = age {
        builder.consume_bytes(b"age");
        builder.consume_bytes((band as u64).to_le_bytes());
        builder.consume(constraint);
    }
    if let Some(constraint) = status {
        builder.consume_bytes(b"status");
        builder.consume(constraint);
    }
    builder.finish()
}

/// A user waiting for a requested ticket.
#[derive(Debug, Clone)]
pub struct TicketRequested {
    secret_key: SecretKey,
    pseudonym: G1Affine,
    serial: Scalar,
    price: u64,
}

impl TicketRequested {
    /// Request a ticket, claiming every fare band and discount the profile qualifies for.
    pub fn new(
        rng: &mut impl Rng,
        params: &GroupParameters,
        certified: &Certified,
        profile: &UserProfile,
        descriptor: &ProtocolDescriptor,
        directory: &Directory,
    ) -> Result<(Self, TicketRequest), Error> {
        let secret_key = *certified.keys().secret_key();
        let x = secret_key.to_scalar();
        let pseudonym = G1Affine::from(params.xi() * x);
        let serial = arith::random_nonzero_scalar(rng);

        let age_builder = match descriptor.fare_band_for(profile.age) {
            Some(band) => {
                let range = descriptor.fare_bands[band].range()?;
                let builder = RangeConstraintBuilder::generate_constraint_commitments(
                    rng,
                    profile.age,
                    range,
                    directory.fares(),
                    params,
                )?;
                Some((band, builder))
            }
            None => None,
        };
        let status_builder = match directory.statuses() {
            Some(statuses) if descriptor.qualifies_for_discount(&profile.status) => {
                Some(MembershipConstraintBuilder::generate_constraint_commitments(
                    rng,
                    label_to_scalar(&profile.status),
                    statuses,
                    params,
                    None,
                )?)
            }
            _ => None,
        };

        let mut attribute_commitment_scalars = vec![None; USER_ATTRIBUTES];
        attribute_commitment_scalars[AGE_ATTRIBUTE] = age_builder
            .as_ref()
            .map(|(_, builder)| builder.commitment_scalar());
        attribute_commitment_scalars[STATUS_ATTRIBUTE] = status_builder
            .as_ref()
            .map(MembershipConstraintBuilder::commitment_scalar);
        let credential_builder = CredentialProofBuilder::generate_proof_commitments(
            rng,
            certified.credential(),
            certified.message(),
            x,
            None,
            &attribute_commitment_scalars,
            params,
        )?;

        let statement = pseudonym_statement(params, pseudonym);
        let pseudonym_builder = StatementProofBuilder::generate_proof_commitments(
            rng,
            &statement,
            vec![x],
            &[Some(credential_builder.secret_key_commitment_scalar())],
        )?;

        let challenge = request_challenge(
            &descriptor.service,
            &serial,
            &statement,
            &credential_builder,
            &pseudonym_builder,
            age_builder
                .as_ref()
                .map(|(band, builder)| (*band, builder as &dyn ChallengeInput)),
            status_builder
                .as_ref()
                .map(|builder| builder as &dyn ChallengeInput),
        );

        let price = descriptor.price(
            age_builder.as_ref().map(|(band, _)| *band),
            status_builder.is_some(),
        )?;
        let request = TicketRequest {
            pseudonym,
            serial,
            challenge,
            credential: credential_builder.generate_proof_response(challenge),
            pseudonym_proof: pseudonym_builder.generate_proof_response(challenge),
            age: age_builder.map(|(band, builder)| AgeClaim {
                band,
                constraint: builder.generate_constraint_response(challenge),
            }),
            status: status_builder.map(|builder| builder.generate_constraint_response(challenge)),
        };
        log::debug!("requesting a ticket at price {}", price);
        Ok((
            TicketRequested {
                secret_key,
                pseudonym,
                serial,
                price,
            },
            request,
        ))
    }

    /// Check the issued ticket against the request and accept it.
    pub fn complete(
        self,
        issued: TicketIssued,
        params: &GroupParameters,
        descriptor: &ProtocolDescriptor,
        directory: &Directory,
    ) -> Result<HeldTicket, Error> {
        let ticket = issued.ticket;
        let openings = issued.openings;
        let central_verifier = directory.central_verifier()?;
        let policy_hash = ticket.policy.hash();

        let mut well_formed = ticket.serial == self.serial
            && ticket.policy.service == descriptor.service
            && ticket.policy.price == self.price
            && ticket.tags.len() == descriptor.verifiers.len()
            && openings.len() == descriptor.verifiers.len();
        if well_formed {
            for ((signed, opening), name) in ticket.tags.iter().zip(&openings).zip(&descriptor.verifiers) {
                let expected = Tag::new(
                    params,
                    name,
                    directory.verifier(name)?,
                    central_verifier,
                    &self.pseudonym,
                    opening,
                    &self.serial,
                    &policy_hash,
                );
                well_formed &= signed.tag == expected;
            }
        }
        Verification::from(
            well_formed && ticket.verify_signatures(directory.issuer()?, params, &self.pseudonym),
        )
        .or_fail(VerificationFailure::IssuedTicket)?;

        log::info!("accepted a ticket for {}", ticket.policy.service);
        Ok(HeldTicket {
            secret_key: self.secret_key,
            ticket,
            openings,
        })
    }
}

/// Message sent to a verifier to present a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    /// The public part of the presented tag.
    pub tag: Tag,
    /// The nonce of the answered request.
    #[serde(with = "SerializeElement")]
    pub nonce: Scalar,
    /// Serial number of the ticket.
    #[serde(with = "SerializeElement")]
    pub serial: Scalar,
    /// Policy of the ticket.
    pub policy: Policy,
    /// The spend response `x + r * k`.
    #[serde(with = "SerializeElement")]
    pub spend_response: Scalar,
    /// The pseudonym specific to the validating verifier, when the protocol uses them.
    #[serde(with = "SerializeElement")]
    pub verifier_pseudonym: Option<G1Affine>,
    /// The challenge shared by both proofs.
    pub challenge: Challenge,
    /// Proof binding the tag to the holder's secret key and the tag opening.
    pub binding: StatementProof,
    /// Proof of knowledge of the issuer's signature on the tag hash.
    pub signature: SignatureProof,
}

/// The relations a presentation proves, over the witnesses `x` and `k`:
///
/// - `P = xi^x * Y_CV^k`
/// - `Q = g_tilde^k`
/// - `rho^E = rho^x * (rho^r)^k`
/// - `N_V = H(V)^x`, for per-verifier pseudonyms.
pub(crate) fn binding_statement(
    params: &GroupParameters,
    central_verifier: &PublicKey,
    tag: &Tag,
    nonce: &Scalar,
    spend_response: &Scalar,
    verifier_pseudonym: Option<(G1Affine, G1Affine)>,
) -> Statement {
    let mut statement = Statement::new(2)
        .with_relation(
            Relation::new(tag.p)
                .with_term(params.xi(), 0)
                .with_term(central_verifier.tag_key(), 1),
        )
        .with_relation(Relation::new(tag.q).with_term(params.g_tilde(), 1))
        .with_relation(
            Relation::new(params.rho() * spend_response)
                .with_term(params.rho(), 0)
                .with_term(params.rho() * nonce, 1),
        );
    if let Some((base, pseudonym)) = verifier_pseudonym {
        statement = statement.with_relation(Relation::new(pseudonym).with_term(base, 0));
    }
    statement
}

/// The challenge of a presentation, computed identically from builders and from proofs.
pub(crate) fn presentation_challenge(
    request: &ValidationRequest,
    serial: &Scalar,
    policy: &Policy,
    statement: &Statement,
    binding: &dyn ChallengeInput,
    signature: &dyn ChallengeInput,
) -> Challenge {
    ChallengeBuilder::new()
        .with_bytes(b"presentation")
        .with_bytes(&request.verifier)
        .with_bytes(&request.slot)
        .with(&request.nonce)
        .with(serial)
        .with(&policy.hash())
        .with(statement)
        .with(binding)
        .with(signature)
        .finish()
}

/// The base of the pseudonym for `verifier`.
pub(crate) fn verifier_pseudonym_base(
    oracle: &mut RandomOracle,
    rng: &mut impl Rng,
    verifier: &str,
) -> G1Affine {
    oracle.hash_to_point(VERIFIER_PSEUDONYM_DOMAIN, verifier.as_bytes(), rng)
}

/// A user holding a valid ticket.
#[derive(Debug, Clone)]
pub struct HeldTicket {
    secret_key: SecretKey,
    ticket: Ticket,
    openings: Vec<Scalar>,
}

impl HeldTicket {
    /// The ticket.
    pub fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Answer a verifier's validation request.
    pub fn present(
        &self,
        rng: &mut impl Rng,
        params: &GroupParameters,
        oracle: &mut RandomOracle,
        request: &ValidationRequest,
        descriptor: &ProtocolDescriptor,
        directory: &Directory,
    ) -> Result<Presentation, Error> {
        let index = self
            .ticket
            .tags
            .iter()
            .position(|signed| signed.tag.verifier == request.slot)
            .ok_or_else(|| Error::UnknownVerifier(request.slot.clone()))?;
        let signed = &self.ticket.tags[index];
        let opening = self.openings[index];
        let x = self.secret_key.to_scalar();
        let spend_response = x + request.nonce * opening;

        let verifier_pseudonym = if descriptor.per_verifier_pseudonyms {
            let base = verifier_pseudonym_base(oracle, rng, &request.verifier);
            Some((base, G1Affine::from(base * x)))
        } else {
            None
        };
        let statement = binding_statement(
            params,
            directory.central_verifier()?,
            &signed.tag,
            &request.nonce,
            &spend_response,
            verifier_pseudonym,
        );
        let no_conjunctions = vec![None; statement.witness_count()];
        let binding_builder = StatementProofBuilder::generate_proof_commitments(
            rng,
            &statement,
            vec![x, opening],
            &no_conjunctions,
        )?;
        let signature_builder = SignatureProofBuilder::generate_proof_commitments(
            rng,
            &signed.signature,
            signed.exponent,
            &hash_signature_base(params, &signed.tag.s),
            None,
        )?;

        let challenge = presentation_challenge(
            request,
            &self.ticket.serial,
            &self.ticket.policy,
            &statement,
            &binding_builder,
            &signature_builder,
        );
        log::debug!("presenting the tag for {} to {}", request.slot, request.verifier);
        Ok(Presentation {
            tag: signed.tag.clone(),
            nonce: request.nonce,
            serial: self.ticket.serial,
            policy: self.ticket.policy.clone(),
            spend_response,
            verifier_pseudonym: verifier_pseudonym.map(|(_, pseudonym)| pseudonym),
            challenge,
            binding: binding_builder.generate_proof_response(challenge),
            signature: signature_builder.generate_proof_response(challenge),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn profile_attributes_follow_the_layout() {
        let profile = UserProfile {
            identity: "alice".to_string(),
            age: 34,
            status: "student".to_string(),
        };
        let attributes = profile.attributes();
        assert_eq!(attributes.len(), USER_ATTRIBUTES);
        assert_eq!(attributes[AGE_ATTRIBUTE], Scalar::from(34));
        assert_eq!(attributes[STATUS_ATTRIBUTE], label_to_scalar("student"));
    }

    #[test]
    fn binding_statement_holds_for_honest_openings() {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 0);
        let central = KeyPair::new(&mut rng, &params);
        let verifier = KeyPair::new(&mut rng, &params);
        let x = arith::random_nonzero_scalar(&mut rng);
        let k = arith::random_nonzero_scalar(&mut rng);
        let nonce = arith::random_nonzero_scalar(&mut rng);
        let tag = Tag::new(
            &params,
            "gate",
            verifier.public_key(),
            central.public_key(),
            &G1Affine::from(params.xi() * x),
            &k,
            &Scalar::one(),
            &Scalar::one(),
        );

        let honest = binding_statement(
            &params,
            central.public_key(),
            &tag,
            &nonce,
            &(x + nonce * k),
            None,
        );
        assert!(honest.is_satisfied_by(&[x, k]));

        let shifted = binding_statement(
            &params,
            central.public_key(),
            &tag,
            &nonce,
            &(x + nonce * k + Scalar::one()),
            None,
        );
        assert!(!shifted.is_satisfied_by(&[x, k]));
    }
}
