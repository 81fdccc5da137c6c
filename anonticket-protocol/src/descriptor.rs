//! Protocol descriptors: the configuration of one run.
//!
//! The four protocol variants share one engine and differ only in what their descriptor turns on:
//!
//! | Variant       | Pricing claims                  | Delegation | Per-verifier pseudonyms |
//! |---------------|---------------------------------|------------|-------------------------|
//! | PPETS-ABC     | status set discount             | no         | no                      |
//! | PPETS-FGP     | age fare bands (range proofs)   | no         | no                      |
//! | AnonProxy     | none                            | yes        | no                      |
//! | AnonSSO       | none                            | no         | yes                     |
//!
//! Descriptors round-trip through JSON.

use crate::Error;
use anonticket_crypto::proofs::{Range, MAX_DIGIT_BASE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The protocol variant a run instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    /// Privacy-preserving e-ticketing with attribute-based credentials.
    PpetsAbc,
    /// Privacy-preserving e-ticketing with fine-grained pricing.
    PpetsFgp,
    /// Anonymous tickets validated by proxy verifiers.
    AnonProxy,
    /// Anonymous single sign-on.
    AnonSso,
}

/// A price that applies to holders whose age lies in `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareBand {
    /// Inclusive lower bound.
    pub lower: u64,
    /// Exclusive upper bound.
    pub upper: u64,
    /// Price of a ticket in this band.
    pub price: u64,
}

impl FareBand {
    /// The age range of this band.
    pub fn range(&self) -> Result<Range, Error> {
        Ok(Range::new(self.lower, self.upper)?)
    }
}

/// A percentage discount for holders of one of the listed statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDiscount {
    /// Statuses that qualify.
    pub statuses: Vec<String>,
    /// Discount in percent.
    pub percent: u8,
}

/// The configuration of a protocol run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    /// The variant this descriptor instantiates.
    pub variant: Variant,
    /// Name of the service tickets are sold for.
    pub service: String,
    /// Identity of the issuer.
    pub issuer: String,
    /// Identity of the central verifier.
    pub central_verifier: String,
    /// Identities of the verifiers; every ticket carries one tag per verifier.
    pub verifiers: Vec<String>,
    /// Price without any claim.
    pub base_price: u64,
    /// Age bands with their prices.
    pub fare_bands: Vec<FareBand>,
    /// Digit base of the range proofs for fare bands.
    pub digit_base: u64,
    /// Status set discount.
    pub status_discount: Option<StatusDiscount>,
    /// Whether verifiers may check tags of other verifiers through re-keys.
    pub delegation: bool,
    /// Whether presentations carry a pseudonym specific to the validating verifier.
    pub per_verifier_pseudonyms: bool,
    /// How long an issued ticket stays valid.
    pub validity: u64,
}

impl ProtocolDescriptor {
    fn with_variant(variant: Variant, service: &str, verifiers: &[&str]) -> Self {
        ProtocolDescriptor {
            variant,
            service: service.to_string(),
            issuer: "issuer".to_string(),
            central_verifier: "central-verifier".to_string(),
            verifiers: verifiers.iter().map(|v| v.to_string()).collect(),
            base_price: 10,
            fare_bands: Vec::new(),
            digit_base: 4,
            status_discount: None,
            delegation: false,
            per_verifier_pseudonyms: false,
            validity: 24 * 60 * 60,
        }
    }

    /// PPETS-ABC: half price for students, seniors and disabled holders.
    pub fn ppets_abc() -> Self {
        Self {
            status_discount: Some(StatusDiscount {
                statuses: vec![
                    "student".to_string(),
                    "senior".to_string(),
                    "disabled".to_string(),
                ],
                percent: 50,
            }),
            ..Self::with_variant(Variant::PpetsAbc, "metro", &["gate-a", "gate-b", "gate-c"])
        }
    }

    /// PPETS-FGP: prices by age band.
    pub fn ppets_fgp() -> Self {
        Self {
            fare_bands: vec![
                FareBand {
                    lower: 0,
                    upper: 18,
                    price: 5,
                },
                FareBand {
                    lower: 18,
                    upper: 65,
                    price: 10,
                },
                FareBand {
                    lower: 65,
                    upper: 150,
                    price: 6,
                },
            ],
            ..Self::with_variant(Variant::PpetsFgp, "rail", &["platform-1", "platform-2"])
        }
    }

    /// AnonProxy: verifiers may validate each other's tags.
    pub fn anon_proxy() -> Self {
        Self {
            delegation: true,
            ..Self::with_variant(Variant::AnonProxy, "venue", &["entrance", "backstage"])
        }
    }

    /// AnonSSO: one ticket signs the holder into several services under per-service pseudonyms.
    pub fn anon_sso() -> Self {
        Self {
            base_price: 0,
            per_verifier_pseudonyms: true,
            ..Self::with_variant(Variant::AnonSso, "sso", &["mail", "calendar", "storage"])
        }
    }

    /// Check that the descriptor describes a runnable protocol.
    pub fn validate(&self) -> Result<(), Error> {
        let fail = |reason: String| {
            log::error!("invalid protocol descriptor: {}", reason);
            Err(Error::Parameters(reason))
        };

        if self.verifiers.is_empty() {
            return fail("at least one verifier is required".to_string());
        }
        let mut names = BTreeSet::new();
        for name in self
            .verifiers
            .iter()
            .chain([&self.issuer, &self.central_verifier])
        {
            if !names.insert(name.as_str()) {
                return fail(format!("party name {:?} is used twice", name));
            }
        }
        if !(2..=MAX_DIGIT_BASE).contains(&self.digit_base) {
            return fail(format!("digit base {} is not supported", self.digit_base));
        }
        for band in &self.fare_bands {
            if band.lower >= band.upper {
                return fail(format!("fare band [{}, {}) is empty", band.lower, band.upper));
            }
        }
        if let Some(discount) = &self.status_discount {
            if discount.percent > 100 || discount.statuses.is_empty() {
                return fail("status discount is malformed".to_string());
            }
        }
        if self.validity == 0 {
            return fail("tickets must be valid for some time".to_string());
        }
        Ok(())
    }

    /// Index of the first fare band containing `age`.
    pub fn fare_band_for(&self, age: u64) -> Option<usize> {
        self.fare_bands
            .iter()
            .position(|band| band.lower <= age && age < band.upper)
    }

    /// Whether `status` earns the status discount.
    pub fn qualifies_for_discount(&self, status: &str) -> bool {
        self.status_discount
            .as_ref()
            .map_or(false, |discount| discount.statuses.iter().any(|s| s == status))
    }

    /// The price for a ticket, given the proven fare band and whether a discount status was proven.
    pub fn price(&self, fare_band: Option<usize>, discounted: bool) -> Result<u64, Error> {
        let base = match fare_band {
            Some(index) => {
                self.fare_bands
                    .get(index)
                    .ok_or_else(|| Error::Format(format!("no fare band {}", index)))?
                    .price
            }
            None => self.base_price,
        };
        match (&self.status_discount, discounted) {
            (Some(discount), true) => {
                let off = u128::from(base) * u128::from(discount.percent) / 100;
                u64::try_from(off)
                    .ok()
                    .and_then(|off| base.checked_sub(off))
                    .ok_or_else(|| {
                        Error::Parameters(format!("{}% discount exceeds the price", discount.percent))
                    })
            }
            (None, true) => Err(Error::Format(
                "status claim without a status discount".to_string(),
            )),
            (_, false) => Ok(base),
        }
    }

    /// Serialize as JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Format(e.to_string()))
    }

    /// Parse and validate a JSON descriptor.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let descriptor: Self =
            serde_json::from_str(json).map_err(|e| Error::Parameters(e.to_string()))?;
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for descriptor in [
            ProtocolDescriptor::ppets_abc(),
            ProtocolDescriptor::ppets_fgp(),
            ProtocolDescriptor::anon_proxy(),
            ProtocolDescriptor::anon_sso(),
        ] {
            descriptor.validate().unwrap();
            let decoded = ProtocolDescriptor::from_json(&descriptor.to_json().unwrap()).unwrap();
            assert_eq!(decoded, descriptor);
        }
    }

    #[test]
    fn prices_follow_claims() {
        let fgp = ProtocolDescriptor::ppets_fgp();
        assert_eq!(fgp.fare_band_for(12), Some(0));
        assert_eq!(fgp.fare_band_for(70), Some(2));
        assert_eq!(fgp.fare_band_for(150), None);
        assert_eq!(fgp.price(Some(2), false).unwrap(), 6);
        assert_eq!(fgp.price(None, false).unwrap(), 10);
        assert!(fgp.price(Some(7), false).is_err());
        assert!(fgp.price(None, true).is_err());

        let abc = ProtocolDescriptor::ppets_abc();
        assert!(abc.qualifies_for_discount("senior"));
        assert!(!abc.qualifies_for_discount("adult"));
        assert_eq!(abc.price(None, true).unwrap(), 5);
    }

    #[test]
    fn large_prices_do_not_overflow() {
        let mut abc = ProtocolDescriptor::ppets_abc();
        abc.base_price = u64::MAX;
        assert_eq!(abc.price(None, false).unwrap(), u64::MAX);
        assert_eq!(abc.price(None, true).unwrap(), u64::MAX - u64::MAX / 2);

        if let Some(discount) = abc.status_discount.as_mut() {
            discount.percent = 200;
        }
        assert!(matches!(abc.price(None, true), Err(Error::Parameters(_))));
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        let mut duplicate = ProtocolDescriptor::anon_proxy();
        duplicate.verifiers.push("entrance".to_string());
        assert!(matches!(duplicate.validate(), Err(Error::Parameters(_))));

        let mut clash = ProtocolDescriptor::anon_proxy();
        clash.issuer = "entrance".to_string();
        assert!(clash.validate().is_err());

        let mut base = ProtocolDescriptor::ppets_fgp();
        base.digit_base = 1;
        assert!(base.validate().is_err());

        let mut band = ProtocolDescriptor::ppets_fgp();
        band.fare_bands[0].upper = 0;
        assert!(band.validate().is_err());

        let mut none = ProtocolDescriptor::anon_sso();
        none.verifiers.clear();
        assert!(none.validate().is_err());
    }
}
