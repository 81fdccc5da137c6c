//! Schnorr-style proofs of knowledge of discrete-log representations in G1.
//!
//! A [`Statement`] is a list of [`Relation`]s of the form `P = B_1^{w_i} * ... * B_k^{w_j}` over a
//! shared vector of secret witnesses `w`. Several relations may use the same witness, which proves
//! the witness is equal across them. A single witness may also be linked to a witness in a
//! different proof (a credential proof, a range proof, ...) by passing the commitment scalar of one
//! as a conjunction commitment scalar to the other: under the same challenge, both proofs then
//! produce the same response scalar.
//!
//! The proof for one statement runs in three phases:
//!
//! 1. *Commitment*: [`StatementProofBuilder::generate_proof_commitments()`] picks a commitment
//!    scalar `s~_i` per witness (or takes the one provided for a conjunction) and computes
//!    `T = prod B^{s~}` for each relation.
//! 2. *Challenge*: the caller hashes the statement, the commitments, and any context with a
//!    [`ChallengeBuilder`].
//! 3. *Response*: [`StatementProofBuilder::generate_proof_response()`] returns
//!    `s^_i = s~_i - c * w_i`.
//!
//! The verifier recomputes the challenge from the transmitted commitments, and checks every
//! relation: `T == prod B^{s^} * P^c`.

use crate::{
    common::*,
    proofs::{Challenge, ChallengeBuilder, ChallengeInput},
    Error, SerializeElement,
};
use ff::Field;
use serde::{Deserialize, Serialize};

/// One relation `public = prod base_k ^ witness[index_k]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    public: G1Projective,
    terms: Vec<(G1Projective, usize)>,
}

impl Relation {
    /// Start a relation for the given public value.
    pub fn new(public: impl Into<G1Projective>) -> Self {
        Relation {
            public: public.into(),
            terms: Vec::new(),
        }
    }

    /// Add the factor `base ^ witness[index]`.
    pub fn with_term(mut self, base: impl Into<G1Projective>, index: usize) -> Self {
        self.terms.push((base.into(), index));
        self
    }

    /// The public value.
    pub fn public(&self) -> G1Projective {
        self.public
    }

    fn evaluate(&self, scalars: &[Scalar]) -> G1Projective {
        self.terms
            .iter()
            .map(|(base, index)| base * scalars[*index])
            .sum()
    }
}

impl ChallengeInput for Relation {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.public);
        builder.consume_bytes((self.terms.len() as u64).to_le_bytes());
        for (base, index) in &self.terms {
            builder.consume(base);
            builder.consume_bytes((*index as u64).to_le_bytes());
        }
    }
}

/// A conjunction of relations over one witness vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    witness_count: usize,
    relations: Vec<Relation>,
}

impl Statement {
    /// Start an empty statement over `witness_count` witnesses.
    pub fn new(witness_count: usize) -> Self {
        Statement {
            witness_count,
            relations: Vec::new(),
        }
    }

    /// Add a relation.
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Number of witnesses.
    pub fn witness_count(&self) -> usize {
        self.witness_count
    }

    /// The relations, in order.
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    fn check_indices(&self) -> Result<(), Error> {
        for (_, index) in self.relations.iter().flat_map(|r| r.terms.iter()) {
            if *index >= self.witness_count {
                return Err(Error::WitnessIndexOutOfBounds {
                    index: *index,
                    count: self.witness_count,
                });
            }
        }
        Ok(())
    }

    /// Whether the witnesses satisfy every relation.
    pub fn is_satisfied_by(&self, witnesses: &[Scalar]) -> bool {
        witnesses.len() == self.witness_count
            && self.check_indices().is_ok()
            && self
                .relations
                .iter()
                .all(|relation| relation.evaluate(witnesses) == relation.public)
    }
}

impl ChallengeInput for Statement {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume_bytes((self.witness_count as u64).to_le_bytes());
        builder.consume(&self.relations);
    }
}

/// The commitment phase of a [`StatementProof`].
#[derive(Debug, Clone)]
pub struct StatementProofBuilder {
    witnesses: Vec<Scalar>,
    commitment_scalars: Vec<Scalar>,
    commitments: Vec<G1Affine>,
}

/// A proof of knowledge of witnesses satisfying a [`Statement`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementProof {
    #[serde(with = "SerializeElement")]
    commitments: Vec<G1Affine>,
    #[serde(with = "SerializeElement")]
    responses: Vec<Scalar>,
}

impl StatementProofBuilder {
    /// Run the commitment phase of a Schnorr-style proof for `statement`.
    ///
    /// `conjunction_commitment_scalars` has one entry per witness; a `Some` entry fixes the
    /// commitment scalar for that witness so it can be linked to another proof.
    pub fn generate_proof_commitments(
        rng: &mut impl Rng,
        statement: &Statement,
        witnesses: Vec<Scalar>,
        conjunction_commitment_scalars: &[Option<Scalar>],
    ) -> Result<Self, Error> {
        statement.check_indices()?;
        if witnesses.len() != statement.witness_count {
            return Err(Error::LengthMismatch {
                expected: statement.witness_count,
                got: witnesses.len(),
            });
        }
        if conjunction_commitment_scalars.len() != statement.witness_count {
            return Err(Error::LengthMismatch {
                expected: statement.witness_count,
                got: conjunction_commitment_scalars.len(),
            });
        }

        let commitment_scalars: Vec<Scalar> = conjunction_commitment_scalars
            .iter()
            .map(|maybe| maybe.unwrap_or_else(|| Scalar::random(&mut *rng)))
            .collect();
        let commitments = statement
            .relations
            .iter()
            .map(|relation| relation.evaluate(&commitment_scalars).into())
            .collect();

        Ok(Self {
            witnesses,
            commitment_scalars,
            commitments,
        })
    }

    /// The commitment scalars, one per witness.
    pub fn conjunction_commitment_scalars(&self) -> &[Scalar] {
        &self.commitment_scalars
    }

    /// Run the response phase of the proof.
    pub fn generate_proof_response(self, challenge: Challenge) -> StatementProof {
        let c = challenge.to_scalar();
        let responses = self
            .commitment_scalars
            .iter()
            .zip(&self.witnesses)
            .map(|(commitment_scalar, witness)| commitment_scalar - c * witness)
            .collect();
        StatementProof {
            commitments: self.commitments,
            responses,
        }
    }
}

impl ChallengeInput for StatementProofBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.commitments);
    }
}

impl StatementProof {
    /// Check the response equation of every relation of `statement` under `challenge`.
    ///
    /// The caller is responsible for checking that `challenge` was derived from the statement,
    /// these commitments and the surrounding context.
    pub fn verify_responses(&self, statement: &Statement, challenge: Challenge) -> bool {
        if self.responses.len() != statement.witness_count
            || self.commitments.len() != statement.relations.len()
            || statement.check_indices().is_err()
        {
            return false;
        }

        let c = challenge.to_scalar();
        statement
            .relations
            .iter()
            .zip(&self.commitments)
            .all(|(relation, commitment)| {
                let recomputed = relation.evaluate(&self.responses) + relation.public * c;
                G1Projective::from(commitment) == recomputed
            })
    }

    /// The response scalars, one per witness, used to link witnesses across proofs.
    pub fn conjunction_response_scalars(&self) -> &[Scalar] {
        &self.responses
    }
}

impl ChallengeInput for StatementProof {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.commitments);
    }
}

/// A self-contained non-interactive proof of knowledge: a [`StatementProof`] together with its
/// challenge, bound to a context string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeProof {
    challenge: Challenge,
    proof: StatementProof,
}

impl KnowledgeProof {
    /// Prove knowledge of `witnesses` for `statement`.
    pub fn prove(
        rng: &mut impl Rng,
        statement: &Statement,
        witnesses: Vec<Scalar>,
        context: &[u8],
    ) -> Result<Self, Error> {
        let no_conjunctions = vec![None; statement.witness_count()];
        let builder = StatementProofBuilder::generate_proof_commitments(
            rng,
            statement,
            witnesses,
            &no_conjunctions,
        )?;
        let challenge = ChallengeBuilder::new()
            .with_bytes(context)
            .with(statement)
            .with(&builder)
            .finish();
        Ok(Self {
            challenge,
            proof: builder.generate_proof_response(challenge),
        })
    }

    /// Verify the proof against `statement` and `context`.
    pub fn verify(&self, statement: &Statement, context: &[u8]) -> bool {
        let recomputed = ChallengeBuilder::new()
            .with_bytes(context)
            .with(statement)
            .with(&self.proof)
            .finish();
        recomputed == self.challenge && self.proof.verify_responses(statement, self.challenge)
    }
}
