/*!
The central verifier, which can trace a ticket back to its holder.

Every tag carries `P = Y * Y_CV^k` next to `Q = g_tilde^k`, so the central verifier, knowing
`x_CV`, recovers `Y = P / Q^{x_CV}` from each tag. [`trace()`](CentralVerifier::trace) decrypts all
of them and insists they agree before checking the tag hashes, the issuer's signatures and the
aggregate, and finally the body signature, which only verifies for the pseudonym the ticket was
issued to. A ticket assembled from tags of different tickets therefore fails to trace.
*/

use crate::{
    registration::Certified,
    ticket::{Aggregate, Policy, Ticket},
    types::*,
    Directory, Error, TicketFault,
};
use serde::{Deserialize, Serialize};

/// What tracing a ticket reveals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// The holder's pseudonym `xi^x`.
    #[serde(with = "SerializeElement")]
    pub pseudonym: G1Affine,
    /// The ticket serial number.
    #[serde(with = "SerializeElement")]
    pub serial: Scalar,
    /// The ticket policy.
    pub policy: Policy,
}

/// The central verifier of a run.
#[derive(Debug, Clone)]
pub struct CentralVerifier {
    certified: Certified,
}

impl CentralVerifier {
    /// Start tracing with a verified credential.
    pub fn new(certified: Certified) -> Self {
        CentralVerifier { certified }
    }

    /// The central verifier's public key.
    pub fn public_key(&self) -> &PublicKey {
        self.certified.keys().public_key()
    }

    /// Recover the holder of `ticket` and check the ticket is whole.
    pub fn trace(
        &self,
        ticket: &Ticket,
        directory: &Directory,
        params: &GroupParameters,
    ) -> Result<TraceRecord, Error> {
        let secret_key = self.certified.keys().secret_key();
        let fault = |fault: TicketFault| {
            log::warn!("ticket failed to trace: {}", fault);
            Err(Error::TicketInvalid(fault))
        };

        let mut tags = ticket.tags.iter();
        let pseudonym = match tags.next() {
            Some(first) => first.tag.decrypt(secret_key),
            None => return fault(TicketFault::NoTags),
        };
        for signed in tags {
            if signed.tag.decrypt(secret_key) != pseudonym {
                return fault(TicketFault::PseudonymMismatch(signed.tag.verifier.clone()));
            }
        }

        let issuer = directory.issuer()?;
        let policy_hash = ticket.policy.hash();
        for signed in &ticket.tags {
            if signed.tag.s != signed.tag.expected_hash(&ticket.serial, &policy_hash) {
                return fault(TicketFault::TagHash(signed.tag.verifier.clone()));
            }
            if !signed.verify_signature(issuer, params) {
                return fault(TicketFault::TagSignature(signed.tag.verifier.clone()));
            }
        }
        if ticket.aggregate.hash != Aggregate::expected_hash(&ticket.tags) {
            return fault(TicketFault::AggregateHash);
        }
        if !ticket.aggregate.verify_signature(issuer, params) {
            return fault(TicketFault::AggregateSignature);
        }
        if !ticket.body.verify(
            &ticket.omega,
            &ticket.body_base(params, &pseudonym),
            &issuer.verification_key(),
            &params.g2(),
        ) {
            return fault(TicketFault::BodySignature);
        }

        log::info!("traced a ticket for {}", ticket.policy.service);
        Ok(TraceRecord {
            pseudonym,
            serial: ticket.serial,
            policy: ticket.policy.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        authority::CentralAuthority,
        descriptor::ProtocolDescriptor,
        issuer::Issuer,
        registration::Registering,
        user::{TicketRequested, UserProfile},
        CryptoContext, Seed, USER_ATTRIBUTES,
    };

    struct Fixture {
        context: CryptoContext,
        descriptor: ProtocolDescriptor,
        authority: CentralAuthority,
        directory: Directory,
        issuer: Issuer,
        central_verifier: CentralVerifier,
    }

    fn certify(
        context: &mut CryptoContext,
        authority: &mut CentralAuthority,
        identity: &str,
        attributes: Vec<Scalar>,
    ) -> Certified {
        let (registering, request) =
            Registering::new(&mut context.rng, &context.params, identity, attributes).unwrap();
        let response = authority
            .issue_credential(&mut context.rng, &context.params, &request)
            .unwrap();
        registering
            .complete(response, authority.public_key(), &context.params)
            .unwrap()
    }

    fn fixture() -> Fixture {
        let descriptor = ProtocolDescriptor::ppets_abc();
        let (mut context, trapdoor) = CryptoContext::new(USER_ATTRIBUTES, Seed::Entropy);
        let (mut authority, mut directory) =
            CentralAuthority::new(&mut context.rng, &context.params, Some(trapdoor), &descriptor)
                .unwrap();
        let issuer = certify(&mut context, &mut authority, &descriptor.issuer, vec![]);
        directory.set_issuer(*issuer.keys().public_key());
        let central = certify(&mut context, &mut authority, &descriptor.central_verifier, vec![]);
        directory.set_central_verifier(*central.keys().public_key());
        for name in &descriptor.verifiers {
            let enrollment = authority
                .enroll_verifier(&mut context.rng, &context.params, name)
                .unwrap();
            directory.add_verifier(name, *enrollment.keys.public_key());
        }
        Fixture {
            context,
            descriptor,
            authority,
            directory,
            issuer: Issuer::new(issuer),
            central_verifier: CentralVerifier::new(central),
        }
    }

    /// Certify `identity`, issue it a ticket and return the ticket with the holder's pseudonym.
    fn ticket_for(fixture: &mut Fixture, identity: &str) -> (Ticket, G1Affine) {
        let profile = UserProfile {
            identity: identity.to_string(),
            age: 40,
            status: "senior".to_string(),
        };
        let certified = certify(
            &mut fixture.context,
            &mut fixture.authority,
            identity,
            profile.attributes(),
        );
        let (requested, request) = TicketRequested::new(
            &mut fixture.context.rng,
            &fixture.context.params,
            &certified,
            &profile,
            &fixture.descriptor,
            &fixture.directory,
        )
        .unwrap();
        let issued = fixture
            .issuer
            .issue(
                &mut fixture.context.rng,
                &fixture.context.params,
                &fixture.directory,
                &fixture.descriptor,
                &request,
                0,
            )
            .unwrap();
        let held = requested
            .complete(
                issued,
                &fixture.context.params,
                &fixture.descriptor,
                &fixture.directory,
            )
            .unwrap();
        let pseudonym = G1Affine::from(
            fixture.context.params.xi() * certified.keys().secret_key().to_scalar(),
        );
        (held.ticket().clone(), pseudonym)
    }

    fn trace(fixture: &Fixture, ticket: &Ticket) -> Result<TraceRecord, Error> {
        fixture
            .central_verifier
            .trace(ticket, &fixture.directory, &fixture.context.params)
    }

    #[test]
    fn honest_ticket_traces_to_its_holder() {
        let mut fixture = fixture();
        let (ticket, pseudonym) = ticket_for(&mut fixture, "alice");
        let record = trace(&fixture, &ticket).unwrap();
        assert_eq!(record.pseudonym, pseudonym);
        assert_eq!(record.serial, ticket.serial());
        assert_eq!(&record.policy, ticket.policy());
        // Half price for seniors.
        assert_eq!(record.policy.price, 5);
    }

    #[test]
    fn swapped_tag_is_detected() {
        let mut fixture = fixture();
        let (mut ticket, _) = ticket_for(&mut fixture, "alice");
        let (other, _) = ticket_for(&mut fixture, "bob");
        ticket.tags[1] = other.tags[1].clone();
        assert_eq!(
            trace(&fixture, &ticket),
            Err(Error::TicketInvalid(TicketFault::PseudonymMismatch(
                "gate-b".to_string()
            )))
        );
    }

    #[test]
    fn tampered_tickets_are_invalid() {
        let mut fixture = fixture();
        let (ticket, _) = ticket_for(&mut fixture, "alice");

        let mut empty = ticket.clone();
        empty.tags.clear();
        assert_eq!(
            trace(&fixture, &empty),
            Err(Error::TicketInvalid(TicketFault::NoTags))
        );

        let mut repriced = ticket.clone();
        repriced.policy.price = 0;
        assert_eq!(
            trace(&fixture, &repriced),
            Err(Error::TicketInvalid(TicketFault::TagHash(
                "gate-a".to_string()
            )))
        );

        let mut dropped = ticket.clone();
        let _ = dropped.tags.pop();
        assert_eq!(
            trace(&fixture, &dropped),
            Err(Error::TicketInvalid(TicketFault::AggregateHash))
        );

        let mut resigned = ticket.clone();
        resigned.omega += Scalar::one();
        assert_eq!(
            trace(&fixture, &resigned),
            Err(Error::TicketInvalid(TicketFault::BodySignature))
        );

        let mut forged = ticket;
        forged.aggregate.exponent += Scalar::one();
        assert_eq!(
            trace(&fixture, &forged),
            Err(Error::TicketInvalid(TicketFault::AggregateSignature))
        );
    }
}
