/*!
The central authority.

The authority certifies the issuer, the central verifier and users through
[`issue_credential()`](CentralAuthority::issue_credential), and onboards verifiers through
[`enroll_verifier()`](CentralAuthority::enroll_verifier), generating and escrowing their keys so that
it can later derive [`ReKey`]s between them. At setup it also signs the public sets used by pricing
claims and publishes them, with its key, in the [`Directory`].

Issuance is idempotent per identity: asking again with the same key and attributes returns the
credential computed the first time, while asking with different ones is refused.
*/

use crate::{
    delegation::{ReKey, ReKeyRequest},
    descriptor::ProtocolDescriptor,
    registration::{CredentialResponse, RegistrationRequest},
    types::*,
    Directory, Error,
};
use anonticket_crypto::{
    params::DelegationTrapdoor,
    proofs::{RangeConstraintParameters, SetMembershipParameters},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Key material the authority generated for a verifier, with a credential on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    /// Name of the verifier.
    pub identity: String,
    /// The verifier's keys; the authority keeps a copy.
    pub keys: KeyPair,
    /// The authority's credential on the verifier's key.
    pub credential: Credential,
}

impl Enrollment {
    /// The message certified for the verifier.
    pub fn credential_message(&self) -> CredentialMessage {
        CredentialMessage::new(
            &self.identity,
            self.keys.public_key().credential_key(),
            Vec::new(),
        )
    }
}

/// The central authority of a run.
#[derive(Debug)]
pub struct CentralAuthority {
    keys: KeyPair,
    trapdoor: Option<DelegationTrapdoor>,
    delegation: bool,
    issued: HashMap<String, (CredentialMessage, CredentialResponse)>,
    enrolled: HashMap<String, Enrollment>,
    rekeys: HashMap<(String, String), ReKey>,
}

impl CentralAuthority {
    /// Set up the authority for a run and publish the initial [`Directory`].
    ///
    /// Without a `trapdoor` the authority cannot derive re-keys.
    pub fn new(
        rng: &mut impl Rng,
        params: &GroupParameters,
        trapdoor: Option<DelegationTrapdoor>,
        descriptor: &ProtocolDescriptor,
    ) -> Result<(Self, Directory), Error> {
        let keys = KeyPair::new(rng, params);
        let statuses = match &descriptor.status_discount {
            Some(discount) => Some(SetMembershipParameters::from_labels(
                rng,
                &discount.statuses,
                params,
            )?),
            None => None,
        };
        let fares = RangeConstraintParameters::new(rng, descriptor.digit_base, params)?;
        let directory = Directory::new(*keys.public_key(), statuses, fares);
        let authority = CentralAuthority {
            keys,
            trapdoor,
            delegation: descriptor.delegation,
            issued: HashMap::new(),
            enrolled: HashMap::new(),
            rekeys: HashMap::new(),
        };
        Ok((authority, directory))
    }

    /// The authority's public key.
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    /// Check a registration request and issue a credential on it.
    pub fn issue_credential(
        &mut self,
        rng: &mut impl Rng,
        params: &GroupParameters,
        request: &RegistrationRequest,
    ) -> Result<CredentialResponse, Error> {
        request.verify(params)?;
        let message = request.credential_message();
        if let Some((certified, response)) = self.issued.get(&request.identity) {
            return if *certified == message {
                log::debug!("returning the existing credential of {}", request.identity);
                Ok(*response)
            } else {
                log::warn!("{} tried to register a second key", request.identity);
                Err(Error::IdentityConflict(request.identity.clone()))
            };
        }
        if self.enrolled.contains_key(&request.identity) {
            return Err(Error::IdentityConflict(request.identity.clone()));
        }

        let credential = Credential::issue(rng, self.keys.secret_key(), &message, params)?;
        let response = CredentialResponse { credential };
        let _ = self
            .issued
            .insert(request.identity.clone(), (message, response));
        log::info!("issued a credential to {}", request.identity);
        Ok(response)
    }

    /// Generate and escrow keys for the verifier `identity`, and certify them.
    pub fn enroll_verifier(
        &mut self,
        rng: &mut impl Rng,
        params: &GroupParameters,
        identity: &str,
    ) -> Result<Enrollment, Error> {
        if let Some(enrollment) = self.enrolled.get(identity) {
            log::debug!("returning the existing enrollment of {}", identity);
            return Ok(enrollment.clone());
        }
        if self.issued.contains_key(identity) {
            return Err(Error::IdentityConflict(identity.to_string()));
        }

        let keys = KeyPair::new(rng, params);
        let message = CredentialMessage::new(identity, keys.public_key().credential_key(), Vec::new());
        let credential = Credential::issue(rng, self.keys.secret_key(), &message, params)?;
        let enrollment = Enrollment {
            identity: identity.to_string(),
            keys,
            credential,
        };
        let _ = self
            .enrolled
            .insert(identity.to_string(), enrollment.clone());
        log::info!("enrolled verifier {}", identity);
        Ok(enrollment)
    }

    /// Derive the re-key that lets `request.delegate` check tags of `request.delegator`.
    pub fn issue_rekey(
        &mut self,
        rng: &mut impl Rng,
        params: &GroupParameters,
        request: &ReKeyRequest,
    ) -> Result<ReKey, Error> {
        if !self.delegation {
            return Err(Error::DelegationUnavailable(
                "the protocol does not allow delegation".to_string(),
            ));
        }
        let trapdoor = self.trapdoor.as_ref().ok_or_else(|| {
            Error::DelegationUnavailable("the authority holds no delegation trapdoor".to_string())
        })?;
        let pair = (request.delegator.clone(), request.delegate.clone());
        if let Some(rekey) = self.rekeys.get(&pair) {
            return Ok(rekey.clone());
        }

        let escrowed = |name: &str| {
            self.enrolled
                .get(name)
                .map(|enrollment| *enrollment.keys.secret_key())
                .ok_or_else(|| Error::UnknownVerifier(name.to_string()))
        };
        let delegator_key = escrowed(&request.delegator)?;
        let delegate_key = escrowed(&request.delegate)?;

        let rekey = ReKey::derive(rng, params, trapdoor, request, &delegator_key, &delegate_key);
        let _ = self.rekeys.insert(pair, rekey.clone());
        log::info!(
            "derived a re-key from {} to {}",
            request.delegator,
            request.delegate
        );
        Ok(rekey)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{registration::Registering, CryptoContext, Seed};

    fn setup(descriptor: &ProtocolDescriptor) -> (CryptoContext, CentralAuthority, Directory) {
        let (mut context, trapdoor) = CryptoContext::new(2, Seed::Entropy);
        let (authority, directory) =
            CentralAuthority::new(&mut context.rng, &context.params, Some(trapdoor), descriptor)
                .unwrap();
        (context, authority, directory)
    }

    #[test]
    fn issuance_is_idempotent_per_identity() {
        let (mut context, mut authority, _) = setup(&ProtocolDescriptor::ppets_abc());
        let (_, request) = Registering::new(
            &mut context.rng,
            &context.params,
            "alice",
            vec![Scalar::from(20), Scalar::from(3)],
        )
        .unwrap();
        let first = authority
            .issue_credential(&mut context.rng, &context.params, &request)
            .unwrap();
        let second = authority
            .issue_credential(&mut context.rng, &context.params, &request)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn second_key_for_an_identity_is_refused() {
        let (mut context, mut authority, _) = setup(&ProtocolDescriptor::ppets_abc());
        let (_, first) =
            Registering::new(&mut context.rng, &context.params, "alice", vec![]).unwrap();
        let (_, second) =
            Registering::new(&mut context.rng, &context.params, "alice", vec![]).unwrap();
        let _ = authority
            .issue_credential(&mut context.rng, &context.params, &first)
            .unwrap();
        assert_eq!(
            authority.issue_credential(&mut context.rng, &context.params, &second),
            Err(Error::IdentityConflict("alice".to_string()))
        );
    }

    #[test]
    fn enrollment_is_idempotent_and_certified() {
        let (mut context, mut authority, _) = setup(&ProtocolDescriptor::anon_proxy());
        let first = authority
            .enroll_verifier(&mut context.rng, &context.params, "entrance")
            .unwrap();
        let second = authority
            .enroll_verifier(&mut context.rng, &context.params, "entrance")
            .unwrap();
        assert_eq!(first, second);
        assert!(first.credential.verify(
            &first.credential_message(),
            authority.public_key(),
            &context.params
        ));
    }

    #[test]
    fn rekeys_are_cached_and_need_delegation() {
        let (mut context, mut authority, _) = setup(&ProtocolDescriptor::anon_proxy());
        for name in ["entrance", "backstage"] {
            let _ = authority
                .enroll_verifier(&mut context.rng, &context.params, name)
                .unwrap();
        }
        let request = ReKeyRequest {
            delegate: "backstage".to_string(),
            delegator: "entrance".to_string(),
        };
        let first = authority
            .issue_rekey(&mut context.rng, &context.params, &request)
            .unwrap();
        let second = authority
            .issue_rekey(&mut context.rng, &context.params, &request)
            .unwrap();
        assert_eq!(first, second);

        let unknown = ReKeyRequest {
            delegate: "backstage".to_string(),
            delegator: "cloakroom".to_string(),
        };
        assert!(matches!(
            authority.issue_rekey(&mut context.rng, &context.params, &unknown),
            Err(Error::UnknownVerifier(_))
        ));

        let (mut context, mut authority, _) = setup(&ProtocolDescriptor::ppets_abc());
        let _ = authority
            .enroll_verifier(&mut context.rng, &context.params, "gate-a")
            .unwrap();
        let request = ReKeyRequest {
            delegate: "gate-a".to_string(),
            delegator: "gate-a".to_string(),
        };
        assert!(matches!(
            authority.issue_rekey(&mut context.rng, &context.params, &request),
            Err(Error::DelegationUnavailable(_))
        ));
    }
}
