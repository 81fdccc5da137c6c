/*!
The step engine.

A [`SharedRunContext`] holds everything one protocol run needs: the [`CryptoContext`], the
[`ProtocolDescriptor`], the central authority, the published [`Directory`] and the state of every
other actor. A driver sequences the run by calling [`handle_incoming()`](SharedRunContext::handle_incoming)
once per message with the [`Step`] to execute and the bytes produced by the previous step. Each
step decodes its input, touches only the actors it names, and returns the encoded output message
or an [`Error`] that aborts the run.

A full run of every variant looks like this; each arrow is one step, and its output is the next
step's input.

```text
Register(Issuer) -> IssueCredential -> AcceptCredential(Issuer)
Register(CentralVerifier) -> IssueCredential -> AcceptCredential(CentralVerifier)
EnrollVerifier(V) -> AcceptEnrollment                        for every verifier V
Register(User) -> IssueCredential -> AcceptCredential(User)
RequestTicket -> IssueTicket -> AcceptTicket
Challenge { verifier, slot } -> Present -> Validate(verifier)    any number of times
SubmitTicket -> Trace
```

Steps that start an exchange take an empty [`acknowledgement()`](crate::wire::acknowledgement), and
steps that end one return it. A verifier challenged for another verifier's slot fetches the re-key
it needs from the authority on the spot; the explicit re-key steps run the same exchange as
messages.
*/

use crate::{
    authority::{CentralAuthority, Enrollment},
    central_verifier::CentralVerifier,
    delegation::{ReKey, ReKeyRequest},
    descriptor::ProtocolDescriptor,
    issuer::{Issuer, TicketIssued},
    ledger::ValidationOutcome,
    registration::{Certified, CredentialResponse, RegistrationRequest, Registering},
    ticket::Ticket,
    user::{HeldTicket, Presentation, TicketRequest, TicketRequested, UserProfile},
    verifier::{ValidationRequest, Verifier},
    wire::{self, label},
    CryptoContext, Directory, Error, Seed, USER_ATTRIBUTES,
};
use anonticket_crypto::params::DelegationTrapdoor;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, mem};

/// The parties that register with the central authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    /// The ticket holder.
    User,
    /// The ticket issuer.
    Issuer,
    /// The central verifier.
    CentralVerifier,
}

/// One protocol step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    /// A party generates keys and asks for a credential.
    Register(Party),
    /// The authority issues a credential.
    IssueCredential,
    /// A party checks its credential.
    AcceptCredential(Party),
    /// The authority enrolls the named verifier.
    EnrollVerifier(String),
    /// A verifier accepts its enrollment.
    AcceptEnrollment,
    /// The user requests a ticket.
    RequestTicket,
    /// The issuer issues a ticket.
    IssueTicket,
    /// The user checks the issued ticket.
    AcceptTicket,
    /// A verifier asks for the tag of `slot`.
    Challenge {
        /// The validating verifier.
        verifier: String,
        /// The verifier whose tag is requested.
        slot: String,
    },
    /// The user presents the requested tag.
    Present,
    /// The named verifier validates the presentation.
    Validate(String),
    /// A verifier asks for a re-key for the tags of `slot`.
    RequestReKey {
        /// The verifier asking.
        verifier: String,
        /// The verifier whose tags it wants to check.
        slot: String,
    },
    /// The authority derives a re-key.
    IssueReKey,
    /// The named verifier caches a re-key.
    AcceptReKey(String),
    /// The user hands the ticket over for tracing.
    SubmitTicket,
    /// The central verifier traces the ticket.
    Trace,
}

/// Lifecycle of a registered party.
#[derive(Debug)]
enum Phase<T> {
    Idle,
    Registering(Registering),
    Ready(T),
}

impl<T> Phase<T> {
    fn start(&mut self, registering: Registering, party: Party) -> Result<(), Error> {
        match self {
            Phase::Idle => {
                *self = Phase::Registering(registering);
                Ok(())
            }
            _ => Err(Error::UnexpectedStep(format!(
                "{:?} has already registered",
                party
            ))),
        }
    }

    fn registering(&mut self, party: Party) -> Result<Registering, Error> {
        match mem::replace(self, Phase::Idle) {
            Phase::Registering(registering) => Ok(registering),
            other => {
                *self = other;
                Err(Error::UnexpectedStep(format!(
                    "{:?} has no pending registration",
                    party
                )))
            }
        }
    }

    fn ready(&mut self, party: Party) -> Result<&mut T, Error> {
        match self {
            Phase::Ready(actor) => Ok(actor),
            _ => Err(Error::UnexpectedStep(format!(
                "{:?} is not certified",
                party
            ))),
        }
    }
}

/// A certified user and its tickets.
#[derive(Debug)]
struct Wallet {
    certified: Certified,
    requested: Option<TicketRequested>,
    held: Option<HeldTicket>,
}

impl Wallet {
    fn held(&self) -> Result<&HeldTicket, Error> {
        self.held
            .as_ref()
            .ok_or_else(|| Error::UnexpectedStep("the user holds no ticket".to_string()))
    }
}

/// Everything one protocol run shares.
#[derive(Debug)]
pub struct SharedRunContext {
    crypto: CryptoContext,
    trapdoor: Option<DelegationTrapdoor>,
    descriptor: ProtocolDescriptor,
    profile: UserProfile,
    authority: CentralAuthority,
    directory: Directory,
    user: Phase<Wallet>,
    issuer: Phase<Issuer>,
    central_verifier: Phase<CentralVerifier>,
    verifiers: BTreeMap<String, Verifier>,
    now: u64,
}

impl SharedRunContext {
    /// Set up a run with fresh group parameters.
    pub fn new(
        descriptor: ProtocolDescriptor,
        profile: UserProfile,
        seed: Seed,
    ) -> Result<Self, Error> {
        descriptor.validate()?;
        let (crypto, trapdoor) = CryptoContext::new(USER_ATTRIBUTES, seed);
        Self::with_context(descriptor, profile, crypto, Some(trapdoor))
    }

    /// Set up a run over an existing cryptographic context, such as persisted parameters.
    pub fn with_context(
        descriptor: ProtocolDescriptor,
        profile: UserProfile,
        mut crypto: CryptoContext,
        trapdoor: Option<DelegationTrapdoor>,
    ) -> Result<Self, Error> {
        descriptor.validate()?;
        if crypto.params.attribute_count() < USER_ATTRIBUTES {
            return Err(Error::Parameters(format!(
                "credentials need {} attributes, the parameters allow {}",
                USER_ATTRIBUTES,
                crypto.params.attribute_count()
            )));
        }
        let (authority, directory) =
            CentralAuthority::new(&mut crypto.rng, &crypto.params, trapdoor, &descriptor)?;
        log::info!("starting a {:?} run", descriptor.variant);
        Ok(SharedRunContext {
            crypto,
            trapdoor,
            descriptor,
            profile,
            authority,
            directory,
            user: Phase::Idle,
            issuer: Phase::Idle,
            central_verifier: Phase::Idle,
            verifiers: BTreeMap::new(),
            now: 0,
        })
    }

    /// Reset the run: new authority keys, no registered parties, an empty oracle table and empty
    /// spend ledgers. The group parameters and the trapdoor are kept.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.crypto.oracle.clear();
        let (authority, directory) = CentralAuthority::new(
            &mut self.crypto.rng,
            &self.crypto.params,
            self.trapdoor,
            &self.descriptor,
        )?;
        self.authority = authority;
        self.directory = directory;
        self.user = Phase::Idle;
        self.issuer = Phase::Idle;
        self.central_verifier = Phase::Idle;
        self.verifiers.clear();
        log::debug!("cleared the run context");
        Ok(())
    }

    /// Set the clock used for ticket validity, in seconds.
    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    /// The cryptographic context.
    pub fn crypto(&self) -> &CryptoContext {
        &self.crypto
    }

    /// The protocol descriptor.
    pub fn descriptor(&self) -> &ProtocolDescriptor {
        &self.descriptor
    }

    /// The published directory.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// The named verifier.
    pub fn verifier(&self, name: &str) -> Result<&Verifier, Error> {
        self.verifiers
            .get(name)
            .ok_or_else(|| Error::UnknownVerifier(name.to_string()))
    }

    /// The ticket the user currently holds.
    pub fn held_ticket(&self) -> Option<&Ticket> {
        match &self.user {
            Phase::Ready(wallet) => wallet.held.as_ref().map(HeldTicket::ticket),
            _ => None,
        }
    }

    fn identity_of(&self, party: Party) -> String {
        match party {
            Party::User => self.profile.identity.clone(),
            Party::Issuer => self.descriptor.issuer.clone(),
            Party::CentralVerifier => self.descriptor.central_verifier.clone(),
        }
    }

    fn verifier_mut(&mut self, name: &str) -> Result<&mut Verifier, Error> {
        self.verifiers
            .get_mut(name)
            .ok_or_else(|| Error::UnknownVerifier(name.to_string()))
    }

    /// Run `step` on the output of the previous step and return this step's output.
    pub fn handle_incoming(&mut self, step: &Step, incoming: &[u8]) -> Result<Vec<u8>, Error> {
        log::debug!("running step {:?}", step);
        match step {
            Step::Register(party) => {
                expect_acknowledgement(incoming)?;
                self.register(*party)
            }
            Step::IssueCredential => {
                let request: RegistrationRequest = wire::open(label::REGISTRATION_REQUEST, incoming)?;
                let response = self.authority.issue_credential(
                    &mut self.crypto.rng,
                    &self.crypto.params,
                    &request,
                )?;
                if request.identity == self.descriptor.issuer {
                    self.directory.set_issuer(request.public_key);
                } else if request.identity == self.descriptor.central_verifier {
                    self.directory.set_central_verifier(request.public_key);
                }
                wire::seal(label::CREDENTIAL_RESPONSE, &response)
            }
            Step::AcceptCredential(party) => {
                let response: CredentialResponse = wire::open(label::CREDENTIAL_RESPONSE, incoming)?;
                self.accept_credential(*party, response)?;
                wire::acknowledgement()
            }
            Step::EnrollVerifier(name) => {
                expect_acknowledgement(incoming)?;
                if !self.descriptor.verifiers.contains(name) {
                    return Err(Error::UnknownVerifier(name.clone()));
                }
                let enrollment =
                    self.authority
                        .enroll_verifier(&mut self.crypto.rng, &self.crypto.params, name)?;
                self.directory
                    .add_verifier(name, *enrollment.keys.public_key());
                wire::seal(label::ENROLLMENT, &enrollment)
            }
            Step::AcceptEnrollment => {
                let enrollment: Enrollment = wire::open(label::ENROLLMENT, incoming)?;
                let verifier =
                    Verifier::new(enrollment, self.directory.authority(), &self.crypto.params)?;
                log::info!("verifier {} is ready", verifier.identity());
                let _ = self
                    .verifiers
                    .insert(verifier.identity().to_string(), verifier);
                wire::acknowledgement()
            }
            Step::RequestTicket => {
                expect_acknowledgement(incoming)?;
                let wallet = self.user.ready(Party::User)?;
                let (requested, request) = TicketRequested::new(
                    &mut self.crypto.rng,
                    &self.crypto.params,
                    &wallet.certified,
                    &self.profile,
                    &self.descriptor,
                    &self.directory,
                )?;
                wallet.requested = Some(requested);
                wire::seal(label::TICKET_REQUEST, &request)
            }
            Step::IssueTicket => {
                let request: TicketRequest = wire::open(label::TICKET_REQUEST, incoming)?;
                let issuer = self.issuer.ready(Party::Issuer)?;
                let issued = issuer.issue(
                    &mut self.crypto.rng,
                    &self.crypto.params,
                    &self.directory,
                    &self.descriptor,
                    &request,
                    self.now,
                )?;
                wire::seal(label::TICKET_ISSUED, &issued)
            }
            Step::AcceptTicket => {
                let issued: TicketIssued = wire::open(label::TICKET_ISSUED, incoming)?;
                let wallet = self.user.ready(Party::User)?;
                let requested = wallet.requested.take().ok_or_else(|| {
                    Error::UnexpectedStep("the user has not requested a ticket".to_string())
                })?;
                wallet.held = Some(requested.complete(
                    issued,
                    &self.crypto.params,
                    &self.descriptor,
                    &self.directory,
                )?);
                wire::acknowledgement()
            }
            Step::Challenge { verifier, slot } => {
                expect_acknowledgement(incoming)?;
                self.ensure_rekey(verifier, slot)?;
                let request = self
                    .verifiers
                    .get_mut(verifier)
                    .ok_or_else(|| Error::UnknownVerifier(verifier.clone()))?
                    .challenge(&mut self.crypto.rng, slot)?;
                wire::seal(label::VALIDATION_REQUEST, &request)
            }
            Step::Present => {
                let request: ValidationRequest = wire::open(label::VALIDATION_REQUEST, incoming)?;
                let wallet = self.user.ready(Party::User)?;
                let presentation = wallet.held()?.present(
                    &mut self.crypto.rng,
                    &self.crypto.params,
                    &mut self.crypto.oracle,
                    &request,
                    &self.descriptor,
                    &self.directory,
                )?;
                wire::seal(label::PRESENTATION, &presentation)
            }
            Step::Validate(name) => {
                let presentation: Presentation = wire::open(label::PRESENTATION, incoming)?;
                let verifier = self
                    .verifiers
                    .get_mut(name)
                    .ok_or_else(|| Error::UnknownVerifier(name.clone()))?;
                let outcome: ValidationOutcome = verifier.validate(
                    &mut self.crypto.rng,
                    &self.crypto.params,
                    &mut self.crypto.oracle,
                    &self.directory,
                    &self.descriptor,
                    &presentation,
                    self.now,
                )?;
                wire::seal(label::VALIDATION_OUTCOME, &outcome)
            }
            Step::RequestReKey { verifier, slot } => {
                expect_acknowledgement(incoming)?;
                let verifier = self.verifier(verifier)?;
                let request = verifier.needs_rekey(slot).ok_or_else(|| {
                    Error::UnexpectedStep(format!(
                        "{} can already validate tags of {}",
                        verifier.identity(),
                        slot
                    ))
                })?;
                wire::seal(label::REKEY_REQUEST, &request)
            }
            Step::IssueReKey => {
                let request: ReKeyRequest = wire::open(label::REKEY_REQUEST, incoming)?;
                let rekey =
                    self.authority
                        .issue_rekey(&mut self.crypto.rng, &self.crypto.params, &request)?;
                wire::seal(label::REKEY, &rekey)
            }
            Step::AcceptReKey(name) => {
                let rekey: ReKey = wire::open(label::REKEY, incoming)?;
                self.verifier_mut(name)?.accept_rekey(rekey)?;
                wire::acknowledgement()
            }
            Step::SubmitTicket => {
                expect_acknowledgement(incoming)?;
                let wallet = self.user.ready(Party::User)?;
                wire::seal(label::TICKET, wallet.held()?.ticket())
            }
            Step::Trace => {
                let ticket: Ticket = wire::open(label::TICKET, incoming)?;
                let central_verifier = self.central_verifier.ready(Party::CentralVerifier)?;
                let record = central_verifier.trace(&ticket, &self.directory, &self.crypto.params)?;
                wire::seal(label::TRACE_RECORD, &record)
            }
        }
    }

    fn register(&mut self, party: Party) -> Result<Vec<u8>, Error> {
        let identity = self.identity_of(party);
        let attributes = match party {
            Party::User => self.profile.attributes(),
            Party::Issuer | Party::CentralVerifier => Vec::new(),
        };
        let (registering, request) = Registering::new(
            &mut self.crypto.rng,
            &self.crypto.params,
            &identity,
            attributes,
        )?;
        match party {
            Party::User => self.user.start(registering, party)?,
            Party::Issuer => self.issuer.start(registering, party)?,
            Party::CentralVerifier => self.central_verifier.start(registering, party)?,
        }
        wire::seal(label::REGISTRATION_REQUEST, &request)
    }

    fn accept_credential(&mut self, party: Party, response: CredentialResponse) -> Result<(), Error> {
        let authority = *self.directory.authority();
        let params = &self.crypto.params;
        match party {
            Party::User => {
                let certified = self
                    .user
                    .registering(party)?
                    .complete(response, &authority, params)?;
                self.user = Phase::Ready(Wallet {
                    certified,
                    requested: None,
                    held: None,
                });
            }
            Party::Issuer => {
                let certified = self
                    .issuer
                    .registering(party)?
                    .complete(response, &authority, params)?;
                self.issuer = Phase::Ready(Issuer::new(certified));
            }
            Party::CentralVerifier => {
                let certified = self
                    .central_verifier
                    .registering(party)?
                    .complete(response, &authority, params)?;
                self.central_verifier = Phase::Ready(CentralVerifier::new(certified));
            }
        }
        Ok(())
    }

    /// Give `verifier` the re-key for `slot` if it lacks one.
    fn ensure_rekey(&mut self, verifier: &str, slot: &str) -> Result<(), Error> {
        let request = match self.verifier(verifier)?.needs_rekey(slot) {
            Some(request) => request,
            None => return Ok(()),
        };
        let rekey = self
            .authority
            .issue_rekey(&mut self.crypto.rng, &self.crypto.params, &request)?;
        self.verifier_mut(verifier)?.accept_rekey(rekey)
    }
}

fn expect_acknowledgement(incoming: &[u8]) -> Result<(), Error> {
    if wire::decode_list(incoming)?.is_empty() {
        Ok(())
    } else {
        Err(Error::Format("expected an empty message".to_string()))
    }
}
