//! Set-membership constraints: a hidden value lies in a public finite set.
//!
//! A trusted party publishes a weak Boneh-Boyen signature on every element of the set under a
//! one-time key, then discards the secret half. Proving knowledge of a signature on the hidden
//! value shows it is one of the signed elements.
//!
//! **This constraint is only meaningful in a conjunction.** Link it to the proof that contains the
//! value (typically a [`CredentialProof`](crate::proofs::CredentialProof) attribute) by passing
//! that proof's commitment scalar in, or by passing
//! [`MembershipConstraintBuilder::commitment_scalar()`] to that proof, and by comparing response
//! scalars in [`MembershipConstraint::verify_membership_constraint()`].

use crate::{
    common::*,
    keys::KeyPair,
    oracle,
    params::GroupParameters,
    proofs::{Challenge, ChallengeBuilder, ChallengeInput, SignatureProof, SignatureProofBuilder},
    signature::Signature,
    Error, SerializeElement,
};
use serde::{Deserialize, Serialize};

/// Public parameters for membership in one set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetMembershipParameters {
    #[serde(with = "SerializeElement")]
    verification_key: G2Affine,
    #[serde(with = "SerializeElement")]
    elements: Vec<Scalar>,
    signatures: Vec<Signature>,
}

impl SetMembershipParameters {
    /// Sign every element of `elements` under a fresh key whose secret half is dropped.
    pub fn new(
        rng: &mut impl Rng,
        elements: Vec<Scalar>,
        params: &GroupParameters,
    ) -> Result<Self, Error> {
        let keys = KeyPair::new(rng, params);
        let base = G1Projective::from(params.g_bar());
        let signatures = elements
            .iter()
            .map(|element| Signature::sign(keys.secret_key(), element, &base))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            verification_key: keys.public_key().verification_key(),
            elements,
            signatures,
        })
    }

    /// Parameters for a set of labels, each hashed with [`label_to_scalar`].
    pub fn from_labels<S: AsRef<str>>(
        rng: &mut impl Rng,
        labels: &[S],
        params: &GroupParameters,
    ) -> Result<Self, Error> {
        let elements = labels
            .iter()
            .map(|label| label_to_scalar(label.as_ref()))
            .collect();
        Self::new(rng, elements, params)
    }

    /// The signed elements.
    pub fn elements(&self) -> &[Scalar] {
        &self.elements
    }

    /// Whether `element` is a member.
    pub fn contains(&self, element: &Scalar) -> bool {
        self.elements.contains(element)
    }

    fn signature_for(&self, element: &Scalar) -> Result<&Signature, Error> {
        self.elements
            .iter()
            .position(|candidate| candidate == element)
            .and_then(|index| self.signatures.get(index))
            .ok_or(Error::ElementNotInSet)
    }
}

/// Map a label to the scalar used for it in sets and credential attributes.
pub fn label_to_scalar(label: &str) -> Scalar {
    oracle::hash_to_scalar(&[b"set-element", label.as_bytes()])
}

/// The commitment phase of a [`MembershipConstraint`].
#[derive(Debug, Clone)]
pub struct MembershipConstraintBuilder(SignatureProofBuilder);

/// A constraint that a hidden value is a member of a public set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipConstraint(SignatureProof);

impl MembershipConstraintBuilder {
    /// Run the commitment phase for the hidden `element`.
    pub fn generate_constraint_commitments(
        rng: &mut impl Rng,
        element: Scalar,
        set: &SetMembershipParameters,
        params: &GroupParameters,
        commitment_scalar: Option<Scalar>,
    ) -> Result<Self, Error> {
        let signature = set.signature_for(&element)?;
        Ok(Self(SignatureProofBuilder::generate_proof_commitments(
            rng,
            signature,
            element,
            &G1Projective::from(params.g_bar()),
            commitment_scalar,
        )?))
    }

    /// Commitment scalar for the hidden element.
    pub fn commitment_scalar(&self) -> Scalar {
        self.0.message_commitment_scalar()
    }

    /// Run the response phase.
    pub fn generate_constraint_response(self, challenge: Challenge) -> MembershipConstraint {
        MembershipConstraint(self.0.generate_proof_response(challenge))
    }
}

impl ChallengeInput for MembershipConstraintBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.0);
    }
}

impl MembershipConstraint {
    /// Verify the constraint. `expected_response_scalar` is the response scalar for the same value
    /// in the proof the constraint is linked to.
    pub fn verify_membership_constraint(
        &self,
        set: &SetMembershipParameters,
        params: &GroupParameters,
        challenge: Challenge,
        expected_response_scalar: Scalar,
    ) -> bool {
        self.0.message_response_scalar() == Some(expected_response_scalar)
            && self.0.verify_knowledge_of_signature(
                &G1Projective::from(params.g_bar()),
                &set.verification_key,
                &params.g2(),
                challenge,
            )
    }

    pub(crate) fn verify_unlinked(
        &self,
        set: &SetMembershipParameters,
        params: &GroupParameters,
        challenge: Challenge,
    ) -> Option<Scalar> {
        let response = self.0.message_response_scalar()?;
        if self.verify_membership_constraint(set, params, challenge, response) {
            Some(response)
        } else {
            None
        }
    }
}

impl ChallengeInput for MembershipConstraint {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.0);
    }
}
