//! Proofs of knowledge of a [`Credential`], the secret key it certifies, and its hidden
//! attributes.
//!
//! The prover randomizes the credential with fresh `r1`, `r2` and publishes
//!
//! - `A' = sigma^{r1}`,
//! - `A_bar = A'^{-e} * B^{r1}`,
//! - `D = B^{r1} * h^{-r2}`.
//!
//! The verifier checks `A' != 1` and `e(A', W_CA) == e(A_bar, g2)`, then a Schnorr proof of
//!
//! - `A_bar / D = A'^{-e} * h^{r2}`
//! - `g0 = D^{r3} * h^{-s'} * g^{-x} * g1^{-H(id)} * prod gs_i^{-m_i}`
//!
//! where `r3 = 1/r1` and `s' = d - r2 * r3`. The subject's secret key `x` and the attributes `m_i`
//! are witnesses, so they can be linked to other proofs in a conjunction.

use crate::{
    arith,
    common::*,
    credential::{Credential, CredentialMessage},
    keys::PublicKey,
    params::GroupParameters,
    proofs::{
        Challenge, ChallengeBuilder, ChallengeInput, Relation, Statement, StatementProof,
        StatementProofBuilder,
    },
    Error, SerializeElement,
};
use serde::{Deserialize, Serialize};

const WITNESS_E: usize = 0;
const WITNESS_R2: usize = 1;
const WITNESS_R3: usize = 2;
const WITNESS_S_PRIME: usize = 3;
const WITNESS_SECRET_KEY: usize = 4;
const WITNESS_IDENTITY: usize = 5;
const FIRST_ATTRIBUTE_WITNESS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct RandomizedCredential {
    #[serde(with = "SerializeElement")]
    a_prime: G1Affine,
    #[serde(with = "SerializeElement")]
    a_bar: G1Affine,
    #[serde(with = "SerializeElement")]
    d: G1Affine,
}

impl RandomizedCredential {
    fn statement(&self, attribute_count: usize, params: &GroupParameters) -> Result<Statement, Error> {
        let first = Relation::new(G1Projective::from(self.a_bar) - self.d)
            .with_term(-G1Projective::from(self.a_prime), WITNESS_E)
            .with_term(params.h(), WITNESS_R2);

        let mut second = Relation::new(params.g0())
            .with_term(self.d, WITNESS_R3)
            .with_term(-G1Projective::from(params.h()), WITNESS_S_PRIME)
            .with_term(-G1Projective::from(params.g()), WITNESS_SECRET_KEY)
            .with_term(-G1Projective::from(params.g1()), WITNESS_IDENTITY);
        for index in 0..attribute_count {
            second = second.with_term(
                -G1Projective::from(params.attribute_generator(index)?),
                FIRST_ATTRIBUTE_WITNESS + index,
            );
        }

        Ok(Statement::new(FIRST_ATTRIBUTE_WITNESS + attribute_count)
            .with_relation(first)
            .with_relation(second))
    }

    fn is_well_formed(&self, authority: &PublicKey, params: &GroupParameters) -> bool {
        !bool::from(self.a_prime.is_identity())
            && pairing(&self.a_prime, &authority.verification_key())
                == pairing(&self.a_bar, &params.g2())
    }
}

impl ChallengeInput for RandomizedCredential {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.a_prime);
        builder.consume(&self.a_bar);
        builder.consume(&self.d);
    }
}

/// The commitment phase of a [`CredentialProof`].
#[derive(Debug, Clone)]
pub struct CredentialProofBuilder {
    randomized: RandomizedCredential,
    builder: StatementProofBuilder,
}

/// A proof of knowledge of a credential, with its subject key and attributes kept hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialProof {
    randomized: RandomizedCredential,
    proof: StatementProof,
}

impl CredentialProofBuilder {
    /// Run the commitment phase.
    ///
    /// `secret_key_commitment_scalar` and `attribute_commitment_scalars` link the subject key and
    /// the attributes to other proofs; `attribute_commitment_scalars` must have one entry per
    /// attribute of the credential.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        credential: &Credential,
        message: &CredentialMessage,
        secret_key: Scalar,
        secret_key_commitment_scalar: Option<Scalar>,
        attribute_commitment_scalars: &[Option<Scalar>],
        params: &GroupParameters,
    ) -> Result<Self, Error> {
        let attribute_count = message.attributes().len();
        if attribute_commitment_scalars.len() != attribute_count {
            return Err(Error::LengthMismatch {
                expected: attribute_count,
                got: attribute_commitment_scalars.len(),
            });
        }

        let r1 = arith::random_nonzero_scalar(rng);
        let r2 = arith::random_nonzero_scalar(rng);
        let r3 = arith::invert_scalar(&r1)?;
        let b_r1 = message.base(&credential.d(), params)? * r1;
        let a_prime = credential.sigma() * r1;
        let randomized = RandomizedCredential {
            a_prime: a_prime.into(),
            a_bar: (b_r1 - a_prime * credential.e()).into(),
            d: (b_r1 - params.h() * r2).into(),
        };

        let statement = randomized.statement(attribute_count, params)?;
        let mut witnesses = vec![
            credential.e(),
            r2,
            r3,
            credential.d() - r2 * r3,
            secret_key,
            message.identity_hash(),
        ];
        witnesses.extend_from_slice(message.attributes());

        let mut conjunction_commitment_scalars = vec![None; FIRST_ATTRIBUTE_WITNESS];
        conjunction_commitment_scalars[WITNESS_SECRET_KEY] = secret_key_commitment_scalar;
        conjunction_commitment_scalars.extend_from_slice(attribute_commitment_scalars);

        let builder = StatementProofBuilder::generate_proof_commitments(
            rng,
            &statement,
            witnesses,
            &conjunction_commitment_scalars,
        )?;
        Ok(Self {
            randomized,
            builder,
        })
    }

    /// Commitment scalar for the subject's secret key.
    pub fn secret_key_commitment_scalar(&self) -> Scalar {
        self.builder.conjunction_commitment_scalars()[WITNESS_SECRET_KEY]
    }

    /// Commitment scalars for the attributes.
    pub fn attribute_commitment_scalars(&self) -> &[Scalar] {
        &self.builder.conjunction_commitment_scalars()[FIRST_ATTRIBUTE_WITNESS..]
    }

    /// Run the response phase.
    pub fn generate_proof_response(self, challenge: Challenge) -> CredentialProof {
        CredentialProof {
            randomized: self.randomized,
            proof: self.builder.generate_proof_response(challenge),
        }
    }
}

impl ChallengeInput for CredentialProofBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.randomized);
        builder.consume(&self.builder);
    }
}

impl CredentialProof {
    /// Verify knowledge of a credential from `authority` carrying `attribute_count` attributes.
    pub fn verify_knowledge_of_credential(
        &self,
        authority: &PublicKey,
        attribute_count: usize,
        params: &GroupParameters,
        challenge: Challenge,
    ) -> bool {
        if !self.randomized.is_well_formed(authority, params) {
            return false;
        }
        match self.randomized.statement(attribute_count, params) {
            Ok(statement) => self.proof.verify_responses(&statement, challenge),
            Err(_) => false,
        }
    }

    /// Response scalar for the subject's secret key.
    pub fn secret_key_response_scalar(&self) -> Option<Scalar> {
        self.proof
            .conjunction_response_scalars()
            .get(WITNESS_SECRET_KEY)
            .copied()
    }

    /// Response scalar for attribute `index`.
    pub fn attribute_response_scalar(&self, index: usize) -> Option<Scalar> {
        self.proof
            .conjunction_response_scalars()
            .get(FIRST_ATTRIBUTE_WITNESS + index)
            .copied()
    }
}

impl ChallengeInput for CredentialProof {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.randomized);
        builder.consume(&self.proof);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keys::KeyPair;
    use ff::Field;

    struct Fixture {
        params: GroupParameters,
        authority: KeyPair,
        subject: KeyPair,
        message: CredentialMessage,
        credential: Credential,
    }

    fn fixture() -> Fixture {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 2);
        let authority = KeyPair::new(&mut rng, &params);
        let subject = KeyPair::new(&mut rng, &params);
        let message = CredentialMessage::new(
            "alice",
            subject.public_key().credential_key(),
            vec![Scalar::from(30), Scalar::from(2)],
        );
        let credential =
            Credential::issue(&mut rng, authority.secret_key(), &message, &params).unwrap();
        Fixture {
            params,
            authority,
            subject,
            message,
            credential,
        }
    }

    fn prove(fx: &Fixture, secret_key: Scalar) -> (Challenge, CredentialProof) {
        let mut rng = rand::thread_rng();
        let builder = CredentialProofBuilder::generate_proof_commitments(
            &mut rng,
            &fx.credential,
            &fx.message,
            secret_key,
            None,
            &[None, None],
            &fx.params,
        )
        .unwrap();
        let challenge = ChallengeBuilder::new().with(&builder).finish();
        (challenge, builder.generate_proof_response(challenge))
    }

    #[test]
    fn credential_proof_verifies() {
        let fx = fixture();
        let (challenge, proof) = prove(&fx, fx.subject.secret_key().to_scalar());
        assert_eq!(ChallengeBuilder::new().with(&proof).finish(), challenge);
        assert!(proof.verify_knowledge_of_credential(
            fx.authority.public_key(),
            2,
            &fx.params,
            challenge
        ));
    }

    #[test]
    fn credential_proof_fails_with_wrong_secret_key() {
        let fx = fixture();
        let (challenge, proof) = prove(&fx, Scalar::random(rand::thread_rng()));
        assert!(!proof.verify_knowledge_of_credential(
            fx.authority.public_key(),
            2,
            &fx.params,
            challenge
        ));
    }

    #[test]
    fn credential_proof_fails_for_other_authority() {
        let fx = fixture();
        let (challenge, proof) = prove(&fx, fx.subject.secret_key().to_scalar());
        let impostor = KeyPair::new(&mut rand::thread_rng(), &fx.params);
        assert!(!proof.verify_knowledge_of_credential(
            impostor.public_key(),
            2,
            &fx.params,
            challenge
        ));
    }

    #[test]
    fn credential_proof_fails_with_wrong_attribute_count() {
        let fx = fixture();
        let (challenge, proof) = prove(&fx, fx.subject.secret_key().to_scalar());
        assert!(!proof.verify_knowledge_of_credential(
            fx.authority.public_key(),
            1,
            &fx.params,
            challenge
        ));
    }

    #[test]
    fn randomized_credentials_are_unlinkable_values() {
        let fx = fixture();
        let (_, first) = prove(&fx, fx.subject.secret_key().to_scalar());
        let (_, second) = prove(&fx, fx.subject.secret_key().to_scalar());
        assert_ne!(first.randomized.a_prime, second.randomized.a_prime);
        assert_ne!(first.randomized.d, second.randomized.d);
    }
}
