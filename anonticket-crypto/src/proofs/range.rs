//! Range constraints: a hidden value `v` lies in a public interval `[lower, upper)`.
//!
//! These are Camenisch-Chaabouni-shelat range constraints over weak Boneh-Boyen digit signatures.
//! With digit base `q` and `k` the smallest count such that `q^k >= upper - lower`, the prover
//! writes both
//!
//! - `a = v - lower` and
//! - `b = v - upper + q^k`
//!
//! in `k` base-`q` digits and proves knowledge of a signature on each digit. Both are
//! non-negative and below `q^k` exactly when `lower <= v < upper`.
//!
//! The digits are tied to the value through the response scalars: with `s^_j` the digit responses
//! and `s^_v` the value's response in the linked proof, the verifier checks
//!
//! - `sum q^j * s^_j(a) == s^_v + c * lower`
//! - `sum q^j * s^_j(b) == s^_v + c * (upper - q^k)`.
//!
//! **This constraint is only meaningful in a conjunction** with the proof that contains `v`; use
//! [`RangeConstraintBuilder::commitment_scalar()`] as that proof's commitment scalar for `v`.

use crate::{
    arith,
    common::*,
    params::GroupParameters,
    proofs::{
        Challenge, ChallengeBuilder, ChallengeInput, MembershipConstraint,
        MembershipConstraintBuilder, SetMembershipParameters,
    },
    Error,
};
use ff::Field;
use serde::{Deserialize, Serialize};

/// Largest digit base supported; every digit gets its own published signature.
pub const MAX_DIGIT_BASE: u64 = 1 << 12;

/// Public parameters for range constraints: signatures on every digit `0..base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedRangeConstraintParameters")]
pub struct RangeConstraintParameters {
    base: u64,
    digits: SetMembershipParameters,
}

#[derive(Deserialize)]
struct UncheckedRangeConstraintParameters {
    base: u64,
    digits: SetMembershipParameters,
}

impl TryFrom<UncheckedRangeConstraintParameters> for RangeConstraintParameters {
    type Error = Error;

    fn try_from(unchecked: UncheckedRangeConstraintParameters) -> Result<Self, Self::Error> {
        check_base(unchecked.base)?;
        let expected = (0..unchecked.base).map(Scalar::from);
        if !unchecked.digits.elements().iter().copied().eq(expected) {
            return Err(Error::InvalidParameters(format!(
                "digit signatures do not cover base {}",
                unchecked.base
            )));
        }
        Ok(Self {
            base: unchecked.base,
            digits: unchecked.digits,
        })
    }
}

fn check_base(base: u64) -> Result<(), Error> {
    if !(2..=MAX_DIGIT_BASE).contains(&base) {
        return Err(Error::InvalidRange {
            lower: 0,
            upper: 0,
            base,
        });
    }
    Ok(())
}

impl RangeConstraintParameters {
    /// Sign every digit in base `base` under a fresh one-time key.
    pub fn new(rng: &mut impl Rng, base: u64, params: &GroupParameters) -> Result<Self, Error> {
        check_base(base)?;
        let digits = SetMembershipParameters::new(rng, (0..base).map(Scalar::from).collect(), params)?;
        Ok(Self { base, digits })
    }

    /// The digit base `q`.
    pub fn base(&self) -> u64 {
        self.base
    }
}

/// The half-open interval `[lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    lower: u64,
    upper: u64,
}

impl Range {
    /// Build `[lower, upper)`; the interval must not be empty.
    pub fn new(lower: u64, upper: u64) -> Result<Self, Error> {
        if lower >= upper {
            return Err(Error::InvalidRange {
                lower,
                upper,
                base: 0,
            });
        }
        Ok(Self { lower, upper })
    }

    /// Inclusive lower bound.
    pub fn lower(&self) -> u64 {
        self.lower
    }

    /// Exclusive upper bound.
    pub fn upper(&self) -> u64 {
        self.upper
    }

    /// Whether `value` lies in the interval.
    pub fn contains(&self, value: u64) -> bool {
        self.lower <= value && value < self.upper
    }

    /// Digit count `k` and `q^k` for base `q`.
    fn digits(&self, base: u64) -> (usize, u128) {
        let width = u128::from(self.upper - self.lower);
        let mut count = 1;
        let mut power = u128::from(base);
        while power < width {
            power *= u128::from(base);
            count += 1;
        }
        (count, power)
    }
}

fn decompose(mut value: u128, base: u64, count: usize) -> Vec<u64> {
    let base = u128::from(base);
    (0..count)
        .map(|_| {
            let digit = value % base;
            value /= base;
            digit as u64
        })
        .collect()
}

/// The commitment phase of a [`RangeConstraint`].
#[derive(Debug, Clone)]
pub struct RangeConstraintBuilder {
    lower_digits: Vec<MembershipConstraintBuilder>,
    upper_digits: Vec<MembershipConstraintBuilder>,
    commitment_scalar: Scalar,
}

/// A constraint that a hidden value lies in a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConstraint {
    lower_digits: Vec<MembershipConstraint>,
    upper_digits: Vec<MembershipConstraint>,
}

impl RangeConstraintBuilder {
    /// Run the commitment phase for `value` in `range`.
    pub fn generate_constraint_commitments(
        rng: &mut impl Rng,
        value: u64,
        range: Range,
        range_params: &RangeConstraintParameters,
        params: &GroupParameters,
    ) -> Result<Self, Error> {
        if !range.contains(value) {
            return Err(Error::ValueOutsideRange {
                value,
                lower: range.lower,
                upper: range.upper,
            });
        }
        let base = range_params.base;
        let (count, power) = range.digits(base);
        let lower_value = u128::from(value - range.lower);
        let upper_value = u128::from(value) + power - u128::from(range.upper);

        let (lower_digits, commitment_scalar) = Self::digit_builders(
            rng,
            decompose(lower_value, base, count),
            None,
            range_params,
            params,
        )?;
        let (upper_digits, _) = Self::digit_builders(
            rng,
            decompose(upper_value, base, count),
            Some(commitment_scalar),
            range_params,
            params,
        )?;

        Ok(Self {
            lower_digits,
            upper_digits,
            commitment_scalar,
        })
    }

    /// Builds one constraint per digit. Digits `1..k` get random commitment scalars; digit `0` gets
    /// whatever makes `sum q^j * s~_j` equal `target` (or a random one if there is no target).
    /// Returns the builders and `sum q^j * s~_j`.
    fn digit_builders(
        rng: &mut impl Rng,
        digits: Vec<u64>,
        target: Option<Scalar>,
        range_params: &RangeConstraintParameters,
        params: &GroupParameters,
    ) -> Result<(Vec<MembershipConstraintBuilder>, Scalar), Error> {
        let q = Scalar::from(range_params.base);
        let mut scalars: Vec<Scalar> = digits.iter().map(|_| Scalar::random(&mut *rng)).collect();

        let mut power = q;
        let mut higher_sum = Scalar::zero();
        for scalar in scalars.iter().skip(1) {
            higher_sum += power * scalar;
            power *= q;
        }
        if let Some(target) = target {
            scalars[0] = target - higher_sum;
        }
        let total = scalars[0] + higher_sum;

        let builders = digits
            .into_iter()
            .zip(scalars)
            .map(|(digit, scalar)| {
                MembershipConstraintBuilder::generate_constraint_commitments(
                    rng,
                    Scalar::from(digit),
                    &range_params.digits,
                    params,
                    Some(scalar),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((builders, total))
    }

    /// Commitment scalar for the value; use it for the value in the linked proof.
    pub fn commitment_scalar(&self) -> Scalar {
        self.commitment_scalar
    }

    /// Run the response phase.
    pub fn generate_constraint_response(self, challenge: Challenge) -> RangeConstraint {
        let respond = |builders: Vec<MembershipConstraintBuilder>| -> Vec<MembershipConstraint> {
            builders
                .into_iter()
                .map(|builder| builder.generate_constraint_response(challenge))
                .collect()
        };
        RangeConstraint {
            lower_digits: respond(self.lower_digits),
            upper_digits: respond(self.upper_digits),
        }
    }
}

impl ChallengeInput for RangeConstraintBuilder {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.lower_digits);
        builder.consume(&self.upper_digits);
    }
}

impl RangeConstraint {
    /// Verify the constraint for `range`. `expected_response_scalar` is the response scalar for the
    /// value in the linked proof.
    pub fn verify_range_constraint(
        &self,
        range: Range,
        range_params: &RangeConstraintParameters,
        params: &GroupParameters,
        challenge: Challenge,
        expected_response_scalar: Scalar,
    ) -> bool {
        let (count, power) = range.digits(range_params.base);
        if self.lower_digits.len() != count || self.upper_digits.len() != count {
            return false;
        }

        let c = challenge.to_scalar();
        let combine = |digits: &[MembershipConstraint]| -> Option<Scalar> {
            let q = Scalar::from(range_params.base);
            let mut power = Scalar::one();
            let mut sum = Scalar::zero();
            for digit in digits {
                sum += power * digit.verify_unlinked(&range_params.digits, params, challenge)?;
                power *= q;
            }
            Some(sum)
        };

        let lower_ok = combine(&self.lower_digits)
            .map(|sum| sum == expected_response_scalar + c * Scalar::from(range.lower));
        let upper_shift = Scalar::from(range.upper) - arith::scalar_from_u128(power);
        let upper_ok = combine(&self.upper_digits)
            .map(|sum| sum == expected_response_scalar + c * upper_shift);

        lower_ok == Some(true) && upper_ok == Some(true)
    }
}

impl ChallengeInput for RangeConstraint {
    fn consume(&self, builder: &mut ChallengeBuilder) {
        builder.consume(&self.lower_digits);
        builder.consume(&self.upper_digits);
    }
}
