#![allow(dead_code)]

use anonticket_protocol::{
    wire::{self, label},
    Error, Party, ProtocolDescriptor, Seed, SharedRunContext, Step, ValidationOutcome,
};
use anonticket_protocol::{central_verifier::TraceRecord, user::UserProfile};

pub const TEST_SEED: Seed = Seed::Deterministic(*b"NEVER USE THIS FOR ANYTHING REAL");

// Show protocol logs when a test fails.
pub fn init_logging() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::max())
        .is_test(true)
        .try_init();
}

pub fn profile(identity: &str, age: u64, status: &str) -> UserProfile {
    UserProfile {
        identity: identity.to_string(),
        age,
        status: status.to_string(),
    }
}

pub fn ack() -> Vec<u8> {
    wire::acknowledgement().unwrap()
}

// Feed each step the output of the one before it.
pub fn run(
    context: &mut SharedRunContext,
    steps: &[Step],
    message: Vec<u8>,
) -> Result<Vec<u8>, Error> {
    steps
        .iter()
        .try_fold(message, |message, step| context.handle_incoming(step, &message))
}

pub fn register(context: &mut SharedRunContext, party: Party) -> Result<(), Error> {
    let _ = run(
        context,
        &[
            Step::Register(party),
            Step::IssueCredential,
            Step::AcceptCredential(party),
        ],
        ack(),
    )?;
    Ok(())
}

// Certify the issuer and central verifier and enroll every verifier.
pub fn setup(descriptor: ProtocolDescriptor, user: UserProfile) -> SharedRunContext {
    init_logging();
    let mut context = SharedRunContext::new(descriptor, user, Seed::Entropy).unwrap();
    enroll_all(&mut context);
    context
}

pub fn enroll_all(context: &mut SharedRunContext) {
    register(context, Party::Issuer).unwrap();
    register(context, Party::CentralVerifier).unwrap();
    for name in context.descriptor().verifiers.clone() {
        let _ = run(
            context,
            &[Step::EnrollVerifier(name), Step::AcceptEnrollment],
            ack(),
        )
        .unwrap();
    }
}

pub fn buy_ticket(context: &mut SharedRunContext) -> Result<(), Error> {
    let _ = run(
        context,
        &[Step::RequestTicket, Step::IssueTicket, Step::AcceptTicket],
        ack(),
    )?;
    Ok(())
}

pub fn validate(
    context: &mut SharedRunContext,
    verifier: &str,
    slot: &str,
) -> Result<ValidationOutcome, Error> {
    let outcome = run(
        context,
        &[
            Step::Challenge {
                verifier: verifier.to_string(),
                slot: slot.to_string(),
            },
            Step::Present,
            Step::Validate(verifier.to_string()),
        ],
        ack(),
    )?;
    wire::open(label::VALIDATION_OUTCOME, &outcome)
}

pub fn trace(context: &mut SharedRunContext) -> Result<TraceRecord, Error> {
    let record = run(context, &[Step::SubmitTicket, Step::Trace], ack())?;
    wire::open(label::TRACE_RECORD, &record)
}
