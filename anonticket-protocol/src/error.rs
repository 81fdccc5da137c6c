//! Errors that abort a protocol run.
//!
//! A detected double spend is not an error; see [`ValidationOutcome`](crate::ValidationOutcome).

use thiserror::*;

/// Error types that may arise while running a protocol step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Group parameters or the protocol descriptor are malformed.
    #[error("invalid parameters: {0}")]
    Parameters(String),
    /// A message had the wrong shape or an element failed to decode.
    #[error("malformed message: {0}")]
    Format(String),
    /// A proof, pairing equation or hash equality did not hold.
    #[error("verification failed: {0}")]
    Verification(VerificationFailure),
    /// Tracing found the ticket inconsistent.
    #[error("ticket is invalid: {0}")]
    TicketInvalid(TicketFault),
    /// A cryptographic primitive refused its input.
    #[error(transparent)]
    Crypto(#[from] anonticket_crypto::Error),
    /// A step was run in a state that does not allow it.
    #[error("unexpected step: {0}")]
    UnexpectedStep(String),
    /// A verifier name is not part of the run.
    #[error("unknown verifier {0:?}")]
    UnknownVerifier(String),
    /// A party whose keys a step needs has not been certified yet.
    #[error("{0} is not registered")]
    NotRegistered(&'static str),
    /// A ticket request reused a serial number already seen by the issuer.
    #[error("ticket serial number was already used")]
    SerialReused,
    /// An identity was registered twice with different keys.
    #[error("identity {0:?} is already registered with a different key")]
    IdentityConflict(String),
    /// A re-key cannot be produced or is missing.
    #[error("delegation is not available: {0}")]
    DelegationUnavailable(String),
}

/// The check that failed in an [`Error::Verification`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    /// A registration proof of knowledge of a secret key.
    #[error("proof of knowledge of the registered key")]
    RegistrationProof,
    /// A public key whose parts do not share one exponent.
    #[error("public key is malformed")]
    PublicKey,
    /// A credential returned by the central authority.
    #[error("credential from the central authority")]
    Credential,
    /// The proofs in a ticket request.
    #[error("ticket request proofs")]
    TicketRequest,
    /// A freshly issued ticket, checked by its holder.
    #[error("issued ticket")]
    IssuedTicket,
    /// A presentation answered a nonce the verifier did not send.
    #[error("presentation nonce")]
    Nonce,
    /// A ticket presented outside its validity window.
    #[error("ticket is not valid at this time")]
    ValidityWindow,
    /// A presented tag whose hash does not match its contents.
    #[error("tag hash")]
    TagHash,
    /// A presented tag that is not bound to the verifier's key.
    #[error("tag key check")]
    TagKey,
    /// The proofs in a presentation.
    #[error("presentation proofs")]
    Presentation,
}

/// The inconsistency found by tracing in an [`Error::TicketInvalid`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TicketFault {
    /// Two tags decrypt to different pseudonyms.
    #[error("tag for {0:?} belongs to a different pseudonym")]
    PseudonymMismatch(String),
    /// A ticket with no tags.
    #[error("ticket has no tags")]
    NoTags,
    /// A tag whose hash does not match its contents.
    #[error("tag hash for {0:?}")]
    TagHash(String),
    /// A tag without a valid issuer signature.
    #[error("tag signature for {0:?}")]
    TagSignature(String),
    /// The aggregate hash does not cover the tags.
    #[error("aggregate tag hash")]
    AggregateHash,
    /// The aggregate has no valid issuer signature.
    #[error("aggregate tag signature")]
    AggregateSignature,
    /// The ticket body has no valid issuer signature for the recovered pseudonym.
    #[error("ticket body signature")]
    BodySignature,
}
