/*!
Tickets: a body bound to the holder's hidden pseudonym plus one tag per verifier.

For pseudonym `Y = xi^x`, serial `s_u`, policy hash `h_P` and a fresh `k` per verifier `V`, the
issuer computes

- `P = Y * Y_CV^k`, an ElGamal encryption of the pseudonym to the central verifier,
- `Q = g_tilde^k`,
- `T = Y_V^k`, which only `V` (or a delegate holding a re-key) can check,
- `E = (theta1 * theta2^{H(V)})^k`, the delegation witness,
- `s_V = H(P, Q, E, T, V, s_u, h_P)`, signed as `Z_V = (g0 * g1^{s_V})^{1/(x_I + e_V)}`.

The tag hashes are aggregated into `s_CV = H(s_V1, ..., s_Vn)`, signed the same way, and the body
`T_U = (g0 * h0^{s_u} * h1^{h_P} * h2^{s_CV} * h3^{psi} * Y)^{1/(x_I + omega)}` binds everything to
the pseudonym, which the ticket itself never contains.
*/

use crate::{types::*, Error};
use anonticket_crypto::{credential::identity_hash, oracle};
use serde::{Deserialize, Serialize};

/// What a ticket buys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Name of the service.
    pub service: String,
    /// Price paid.
    pub price: u64,
    /// Start of the validity window, inclusive.
    pub valid_from: u64,
    /// End of the validity window, exclusive.
    pub valid_until: u64,
}

impl Policy {
    /// Hash of the policy, bound into every tag and the body.
    pub fn hash(&self) -> Scalar {
        oracle::hash_to_scalar(&[
            b"policy",
            self.service.as_bytes(),
            &self.price.to_le_bytes(),
            &self.valid_from.to_le_bytes(),
            &self.valid_until.to_le_bytes(),
        ])
    }

    /// Whether `now` lies in the validity window.
    pub fn is_valid_at(&self, now: u64) -> bool {
        self.valid_from <= now && now < self.valid_until
    }
}

/// The public part of a tag, shown to its verifier at presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub(crate) verifier: String,
    #[serde(with = "SerializeElement")]
    pub(crate) p: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) q: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) e: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) t: G1Affine,
    #[serde(with = "SerializeElement")]
    pub(crate) s: Scalar,
}

impl Tag {
    /// Build the tag for `verifier` from the pseudonym and the opening `k`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        params: &GroupParameters,
        verifier: &str,
        verifier_key: &PublicKey,
        central_verifier_key: &PublicKey,
        pseudonym: &G1Affine,
        opening: &Scalar,
        serial: &Scalar,
        policy_hash: &Scalar,
    ) -> Self {
        let p = (central_verifier_key.tag_key() * opening + pseudonym).into();
        let q = (params.g_tilde() * opening).into();
        let e = (delegation_base(params, verifier) * opening).into();
        let t = (verifier_key.tag_key() * opening).into();
        let mut tag = Tag {
            verifier: verifier.to_string(),
            p,
            q,
            e,
            t,
            s: Scalar::zero(),
        };
        tag.s = tag.expected_hash(serial, policy_hash);
        tag
    }

    /// The verifier this tag was issued to.
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// The tag hash `s_V`.
    pub fn hash(&self) -> Scalar {
        self.s
    }

    /// The commitment component `Q`, stable across presentations of the same tag.
    pub fn commitment(&self) -> G1Affine {
        self.q
    }

    /// `H(P, Q, E, T, V, s_u, h_P)`.
    pub(crate) fn expected_hash(&self, serial: &Scalar, policy_hash: &Scalar) -> Scalar {
        oracle::hash_to_scalar(&[
            b"tag",
            &self.p.to_compressed(),
            &self.q.to_compressed(),
            &self.e.to_compressed(),
            &self.t.to_compressed(),
            self.verifier.as_bytes(),
            &serial.to_bytes(),
            &policy_hash.to_bytes(),
        ])
    }

    /// The designated-verifier check `T == Q^{x_V}`.
    pub fn check_designated(&self, verifier_key: &SecretKey) -> bool {
        self.t == G1Affine::from(self.q * verifier_key.to_scalar())
    }

    /// Decrypt the pseudonym with the central verifier's secret key.
    pub(crate) fn decrypt(&self, central_verifier_key: &SecretKey) -> G1Affine {
        (G1Projective::from(self.p) - self.q * central_verifier_key.to_scalar()).into()
    }
}

/// `theta1 * theta2^{H(verifier)}`
pub(crate) fn delegation_base(params: &GroupParameters, verifier: &str) -> G1Projective {
    G1Projective::from(params.theta1()) + params.theta2() * identity_hash(verifier)
}

/// The base `g0 * g1^m` for the issuer's signature on the tag or aggregate hash `m`.
pub(crate) fn hash_signature_base(params: &GroupParameters, message: &Scalar) -> G1Projective {
    G1Projective::from(params.g0()) + params.g1() * message
}

/// A tag together with the issuer's signature on its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTag {
    pub(crate) tag: Tag,
    #[serde(with = "SerializeElement")]
    pub(crate) exponent: Scalar,
    pub(crate) signature: Signature,
}

impl SignedTag {
    /// The public part.
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Check the issuer's signature `Z_V`.
    pub fn verify_signature(&self, issuer: &PublicKey, params: &GroupParameters) -> bool {
        self.signature.verify(
            &self.exponent,
            &hash_signature_base(params, &self.tag.s),
            &issuer.verification_key(),
            &params.g2(),
        )
    }
}

/// The aggregate `s_CV` over all tag hashes and the issuer's signature `Z_CV` on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    #[serde(with = "SerializeElement")]
    pub(crate) hash: Scalar,
    #[serde(with = "SerializeElement")]
    pub(crate) exponent: Scalar,
    pub(crate) signature: Signature,
}

impl Aggregate {
    /// `H(s_V1, ..., s_Vn)`
    pub(crate) fn expected_hash(tags: &[SignedTag]) -> Scalar {
        let hashes: Vec<Scalar> = tags.iter().map(|signed| signed.tag.s).collect();
        oracle::hash_scalars(&hashes)
    }

    /// Check the issuer's signature `Z_CV`.
    pub fn verify_signature(&self, issuer: &PublicKey, params: &GroupParameters) -> bool {
        self.signature.verify(
            &self.exponent,
            &hash_signature_base(params, &self.hash),
            &issuer.verification_key(),
            &params.g2(),
        )
    }
}

/// A ticket as issued. It does not contain the holder's pseudonym.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(with = "SerializeElement")]
    pub(crate) serial: Scalar,
    pub(crate) policy: Policy,
    #[serde(with = "SerializeElement")]
    pub(crate) psi: Scalar,
    #[serde(with = "SerializeElement")]
    pub(crate) omega: Scalar,
    pub(crate) body: Signature,
    pub(crate) tags: Vec<SignedTag>,
    pub(crate) aggregate: Aggregate,
}

impl Ticket {
    /// The serial number.
    pub fn serial(&self) -> Scalar {
        self.serial
    }

    /// What the ticket buys.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// The tags, one per verifier.
    pub fn tags(&self) -> &[SignedTag] {
        &self.tags
    }

    /// The tag for `verifier`.
    pub fn tag_for(&self, verifier: &str) -> Result<&SignedTag, Error> {
        self.tags
            .iter()
            .find(|signed| signed.tag.verifier == verifier)
            .ok_or_else(|| Error::UnknownVerifier(verifier.to_string()))
    }

    /// The base of the body signature `T_U` for `pseudonym`.
    pub(crate) fn body_base(&self, params: &GroupParameters, pseudonym: &G1Affine) -> G1Projective {
        body_base(
            params,
            &self.serial,
            &self.policy.hash(),
            &self.aggregate.hash,
            &self.psi,
            pseudonym,
        )
    }

    /// Check every tag hash and every issuer signature, given the pseudonym.
    pub(crate) fn verify_signatures(
        &self,
        issuer: &PublicKey,
        params: &GroupParameters,
        pseudonym: &G1Affine,
    ) -> bool {
        let policy_hash = self.policy.hash();
        !self.tags.is_empty()
            && self.tags.iter().all(|signed| {
                signed.tag.s == signed.tag.expected_hash(&self.serial, &policy_hash)
                    && signed.verify_signature(issuer, params)
            })
            && self.aggregate.hash == Aggregate::expected_hash(&self.tags)
            && self.aggregate.verify_signature(issuer, params)
            && self.body.verify(
                &self.omega,
                &self.body_base(params, pseudonym),
                &issuer.verification_key(),
                &params.g2(),
            )
    }
}

/// `g0 * h0^{s_u} * h1^{h_P} * h2^{s_CV} * h3^{psi} * Y`
pub(crate) fn body_base(
    params: &GroupParameters,
    serial: &Scalar,
    policy_hash: &Scalar,
    aggregate_hash: &Scalar,
    psi: &Scalar,
    pseudonym: &G1Affine,
) -> G1Projective {
    let hs = params.ticket_generators();
    G1Projective::from(params.g0())
        + hs[0] * serial
        + hs[1] * policy_hash
        + hs[2] * aggregate_hash
        + hs[3] * psi
        + pseudonym
}

#[cfg(test)]
mod test {
    use super::*;
    use anonticket_crypto::arith;

    #[test]
    fn policy_hash_covers_every_field() {
        let policy = Policy {
            service: "metro".to_string(),
            price: 10,
            valid_from: 100,
            valid_until: 200,
        };
        let variants = [
            Policy {
                service: "rail".to_string(),
                ..policy.clone()
            },
            Policy {
                price: 11,
                ..policy.clone()
            },
            Policy {
                valid_from: 101,
                ..policy.clone()
            },
            Policy {
                valid_until: 201,
                ..policy.clone()
            },
        ];
        for variant in &variants {
            assert_ne!(variant.hash(), policy.hash());
        }
        assert!(policy.is_valid_at(100));
        assert!(policy.is_valid_at(199));
        assert!(!policy.is_valid_at(200));
        assert!(!policy.is_valid_at(99));
    }

    #[test]
    fn tags_decrypt_to_the_pseudonym() {
        let mut rng = rand::thread_rng();
        let (params, _) = GroupParameters::generate(&mut rng, 0);
        let verifier = KeyPair::new(&mut rng, &params);
        let central = KeyPair::new(&mut rng, &params);
        let pseudonym = G1Affine::from(params.xi() * arith::random_nonzero_scalar(&mut rng));
        let serial = arith::random_nonzero_scalar(&mut rng);
        let opening = arith::random_nonzero_scalar(&mut rng);

        let tag = Tag::new(
            &params,
            "gate",
            verifier.public_key(),
            central.public_key(),
            &pseudonym,
            &opening,
            &serial,
            &Scalar::one(),
        );
        assert_eq!(tag.decrypt(central.secret_key()), pseudonym);
        assert_ne!(tag.decrypt(verifier.secret_key()), pseudonym);
        assert!(tag.check_designated(verifier.secret_key()));
        assert!(!tag.check_designated(central.secret_key()));
        assert_eq!(tag.hash(), tag.expected_hash(&serial, &Scalar::one()));
        assert_ne!(tag.hash(), tag.expected_hash(&serial, &Scalar::zero()));
    }
}
