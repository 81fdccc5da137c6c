/*!
Anonymous-credential ticketing protocols built on the primitives in `anonticket-crypto`.

A run involves five kinds of actors:

- the **central authority**, which certifies every other party, escrows verifier keys and derives
  re-keys for delegation ([`authority`]);
- a **user**, who registers hidden attributes, obtains tickets bound to a hidden pseudonym and
  presents them ([`user`]);
- an **issuer**, which checks the user's credential and pricing claims and issues tickets
  ([`issuer`]);
- **verifiers**, which validate presentations, detect double spending and, given a re-key, check
  tags issued to another verifier ([`verifier`], [`delegation`]);
- the **central verifier**, which traces a ticket back to its pseudonym ([`central_verifier`]).

The four protocol variants (PPETS-ABC, PPETS-FGP, AnonProxy and AnonSSO) share a single engine,
parameterized by a [`ProtocolDescriptor`]. The [`engine`] module drives a whole run one message at a
time over the ordered byte-string lists of the [`wire`] module.
*/
#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod authority;
pub mod central_verifier;
pub mod context;
pub mod delegation;
pub mod descriptor;
pub mod engine;
pub mod issuer;
pub mod ledger;
pub mod registration;
pub mod ticket;
pub mod user;
pub mod verifier;
pub mod wire;

mod error;

pub use context::{CryptoContext, Directory, Seed};
pub use descriptor::{ProtocolDescriptor, Variant};
pub use engine::{Party, SharedRunContext, Step};
pub use error::{Error, TicketFault, VerificationFailure};
pub use ledger::ValidationOutcome;

#[allow(unused)]
mod types {
    pub use anonticket_crypto::{
        credential::{Credential, CredentialMessage},
        keys::{KeyPair, PublicKey, SecretKey},
        params::GroupParameters,
        proofs::{Challenge, ChallengeBuilder, ChallengeInput},
        signature::Signature,
        Rng, SerializeElement,
    };
    pub use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
}

/// Index of the age attribute in user credentials.
pub const AGE_ATTRIBUTE: usize = 0;
/// Index of the status attribute in user credentials.
pub const STATUS_ATTRIBUTE: usize = 1;
/// Number of hidden attributes in user credentials.
pub const USER_ATTRIBUTES: usize = 2;

/// The result of a verification of some property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the result of a verification should always be checked"]
pub enum Verification {
    /// A verification succeeded.
    Verified,
    /// A verification failed.
    Failed,
}

impl From<bool> for Verification {
    fn from(b: bool) -> Self {
        if b {
            Self::Verified
        } else {
            Self::Failed
        }
    }
}

impl Verification {
    /// Turn a failed verification into an aborting [`Error::Verification`].
    pub fn or_fail(self, failure: VerificationFailure) -> Result<(), Error> {
        match self {
            Self::Verified => Ok(()),
            Self::Failed => {
                log::warn!("verification failed: {}", failure);
                Err(Error::Verification(failure))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn verification_maps_to_errors() {
        assert!(Verification::from(true)
            .or_fail(VerificationFailure::TicketRequest)
            .is_ok());
        assert!(matches!(
            Verification::from(false).or_fail(VerificationFailure::TicketRequest),
            Err(Error::Verification(VerificationFailure::TicketRequest))
        ));
    }
}
