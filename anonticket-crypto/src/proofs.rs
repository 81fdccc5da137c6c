//! Primitive components of zero-knowledge proofs, implemented as building blocks for larger
//! proofs.
//!
//! Every proof follows the same three-phase shape: a builder runs the commitment phase, the caller
//! derives one [`Challenge`] over all builders in a conjunction, and each builder turns into a
//! proof in the response phase. Verifiers recompute the challenge from the finished proofs and
//! check each proof against it.

mod challenge;
mod credential;
mod membership;
mod range;
mod schnorr;
mod signature;

pub use self::{
    challenge::*, credential::*, membership::*, range::*, schnorr::*, signature::*,
};
