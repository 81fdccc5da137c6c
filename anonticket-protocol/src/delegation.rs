/*!
Delegation: re-keys that let one verifier check tags issued to another.

Every tag for verifier `A` carries `Q = g_tilde^k`, `T = Y_A^k` and the delegation witness
`E = (theta1 * theta2^{H(A)})^k`. The central authority, which escrows verifier keys and holds the
[`DelegationTrapdoor`] `(t1, t2)`, derives for a delegate `B`

- `RK1 = g2^beta`,
- `RK2 = (t1 + t2 * H(A)) * beta + (x_B - x_A)`,

for a fresh `beta`. The delegate then checks `e(T, g2) == e(Q^{x_B - RK2}, g2) * e(E, RK1)`. When
`A = B` this is the ordinary check `T == Q^{x_A}` in disguise.

Verifiers ask for a re-key lazily, the first time they validate a tag of another verifier, and
both sides cache it per pair for the rest of the run.
*/

use crate::{ticket::Tag, types::*};
use anonticket_crypto::{arith, credential::identity_hash, params::DelegationTrapdoor};
use serde::{Deserialize, Serialize};

/// Message from a verifier asking to check tags of `delegator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReKeyRequest {
    /// The verifier that will run the check.
    pub delegate: String,
    /// The verifier the tags were issued to.
    pub delegator: String,
}

/// A re-key from `delegator` to `delegate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReKey {
    delegator: String,
    delegate: String,
    #[serde(with = "SerializeElement")]
    rk1: G2Affine,
    #[serde(with = "SerializeElement")]
    rk2: Scalar,
}

impl ReKey {
    pub(crate) fn derive(
        rng: &mut impl Rng,
        params: &GroupParameters,
        trapdoor: &DelegationTrapdoor,
        request: &ReKeyRequest,
        delegator_key: &SecretKey,
        delegate_key: &SecretKey,
    ) -> Self {
        let beta = arith::random_nonzero_scalar(rng);
        let exponent = trapdoor.verifier_exponent(&identity_hash(&request.delegator));
        ReKey {
            delegator: request.delegator.clone(),
            delegate: request.delegate.clone(),
            rk1: (params.g2() * beta).into(),
            rk2: exponent * beta + (delegate_key.to_scalar() - delegator_key.to_scalar()),
        }
    }

    /// The verifier whose tags this re-key opens.
    pub fn delegator(&self) -> &str {
        &self.delegator
    }

    /// The verifier this re-key was made for.
    pub fn delegate(&self) -> &str {
        &self.delegate
    }

    /// Check that `tag` was issued to the delegator, using the delegate's secret key.
    pub fn check_tag(&self, tag: &Tag, delegate_key: &SecretKey, params: &GroupParameters) -> bool {
        let g2 = params.g2();
        let shifted = G1Affine::from(tag.q * (delegate_key.to_scalar() - self.rk2));
        tag.verifier == self.delegator
            && pairing(&tag.t, &g2) == pairing(&shifted, &g2) + pairing(&tag.e, &self.rk1)
    }
}
