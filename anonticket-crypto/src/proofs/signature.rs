//! Proofs of knowledge of a weak Boneh-Boyen [`Signature`] on a hidden message.
//!
//! For `sigma = B^{1/(x+m)}` the prover picks a fresh `v` and publishes `V = sigma^v` and
//! `V_bar = V^{-m} * B^v`. The verifier checks `V != 1` and `e(V, W) == e(V_bar, g2)`, which
//! needs no pairing on the prover side, plus a Schnorr proof of knowledge of `m` and `v` in
//! `V_bar = V^{-m} * B^v`.
//!
//! The message response scalar can be linked to other proofs in a conjunction.

use crate::{
    arith,
    common::*,
    proofs::{
        Challenge, ChallengeBuilder, ChallengeInput, Relation, Statement, StatementProof,
        StatementProofBuilder,
    },
    signature::Signature,
    Error, SerializeElement,
};
use serde::{Deserialize, Serialize};

const WITNESS_MESSAGE: usize = 0;
const WITNESS_BLINDING: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct BlindedSignature {
    #[serde(with = "SerializeElement")]
    v: G1Affine,
    #[serde(with = "SerializeElement")]
    v_bar: G1Affine,
}

impl BlindedSignature {
    fn statement(&self, base: &G1Projective) -> Statement {
        Statement::new(2).with_relation(
            Relation::new(self.v_bar)
                .with_term(-G1Projective::from(self.v), WITNESS_MESSAGE)
                .with_term(*base, WITNESS_BLINDING),
        )
    }
}

impl ChallengeInput for BlindedSignature {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.v);
        builder.consume(&self.v_bar);
    }
}

/// The commitment phase of a [`SignatureProof`].
#[derive(Debug, Clone)]
pub struct SignatureProofBuilder {
    blinded: BlindedSignature,
    builder: StatementProofBuilder,
}

/// A proof of knowledge of a signature on a hidden message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureProof {
    blinded: BlindedSignature,
    proof: StatementProof,
}

impl SignatureProofBuilder {
    /// Run the commitment phase for `signature` on `message` over `base`.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        signature: &Signature,
        message: Scalar,
        base: &G1Projective,
        message_commitment_scalar: Option<Scalar>,
    ) -> Result<Self, Error> {
        let v = arith::random_nonzero_scalar(rng);
        let v_point = signature.to_g1() * v;
        let blinded = BlindedSignature {
            v: v_point.into(),
            v_bar: (base * v - v_point * message).into(),
        };
        let builder = StatementProofBuilder::generate_proof_commitments(
            rng,
            &blinded.statement(base),
            vec![message, v],
            &[message_commitment_scalar, None],
        )?;
        Ok(Self { blinded, builder })
    }

    /// Commitment scalar for the message.
    pub fn message_commitment_scalar(&self) -> Scalar {
        self.builder.conjunction_commitment_scalars()[WITNESS_MESSAGE]
    }

    /// Run the response phase.
    pub fn generate_proof_response(self, challenge: Challenge) -> SignatureProof {
        SignatureProof {
            blinded: self.blinded,
            proof: self.builder.generate_proof_response(challenge),
        }
    }
}

impl ChallengeInput for SignatureProofBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.blinded);
        builder.consume(&self.builder);
    }
}

impl SignatureProof {
    /// Verify knowledge of a signature over `base` under `verification_key`.
    pub fn verify_knowledge_of_signature(
        &self,
        base: &G1Projective,
        verification_key: &G2Affine,
        g2: &G2Affine,
        challenge: Challenge,
    ) -> bool {
        !bool::from(self.blinded.v.is_identity())
            && pairing(&self.blinded.v, verification_key) == pairing(&self.blinded.v_bar, g2)
            && self
                .proof
                .verify_responses(&self.blinded.statement(base), challenge)
    }

    /// Response scalar for the hidden message.
    pub fn message_response_scalar(&self) -> Option<Scalar> {
        self.proof
            .conjunction_response_scalars()
            .get(WITNESS_MESSAGE)
            .copied()
    }
}

impl ChallengeInput for SignatureProof {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.blinded);
        builder.consume(&self.proof);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{keys::KeyPair, params::GroupParameters};
    use ff::Field;

    #[test]
    fn signature_proof_verifies() {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 0);
        let keys = KeyPair::new(&mut rng, &params);
        let base = G1Projective::from(params.g0()) + params.g1() * Scalar::from(99);
        let message = Scalar::random(&mut rng);
        let signature = Signature::sign(keys.secret_key(), &message, &base).unwrap();

        let builder =
            SignatureProofBuilder::generate_proof_commitments(&mut rng, &signature, message, &base, None)
                .unwrap();
        let challenge = ChallengeBuilder::new().with(&builder).finish();
        let proof = builder.generate_proof_response(challenge);

        let w = keys.public_key().verification_key();
        assert!(proof.verify_knowledge_of_signature(&base, &w, &params.g2(), challenge));

        let other_base = G1Projective::from(params.g0()) + params.g1() * Scalar::from(100);
        assert!(!proof.verify_knowledge_of_signature(&other_base, &w, &params.g2(), challenge));

        let other_keys = KeyPair::new(&mut rng, &params);
        assert!(!proof.verify_knowledge_of_signature(
            &base,
            &other_keys.public_key().verification_key(),
            &params.g2(),
            challenge
        ));
    }

    #[test]
    fn signature_proof_fails_on_wrong_message() {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 0);
        let keys = KeyPair::new(&mut rng, &params);
        let base = G1Projective::from(params.g_bar());
        let message = Scalar::random(&mut rng);
        let signature = Signature::sign(keys.secret_key(), &message, &base).unwrap();

        let builder = SignatureProofBuilder::generate_proof_commitments(
            &mut rng,
            &signature,
            message + Scalar::one(),
            &base,
            None,
        )
        .unwrap();
        let challenge = ChallengeBuilder::new().with(&builder).finish();
        let proof = builder.generate_proof_response(challenge);
        assert!(!proof.verify_knowledge_of_signature(
            &base,
            &keys.public_key().verification_key(),
            &params.g2(),
            challenge
        ));
    }
}
