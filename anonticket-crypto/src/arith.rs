//! Integer arithmetic modulo the prime order `p` shared by G1, G2 and GT.
//!
//! Inversion is done with the extended Euclidean algorithm over arbitrary-precision integers, so
//! that a non-invertible input is detected (gcd != 1) instead of silently mapping to zero.
//! Fresh exponents are drawn by rejection sampling: a candidate with as many bits as `p` is
//! accepted only if it lies in `[1, p - 1]`.

use crate::{common::*, Error};
use num_bigint::{BigInt, BigUint, RandBigInt, Sign};
use num_traits::{One, Signed, Zero};

/// Big-endian hex encoding of the order of the BLS12-381 groups.
const GROUP_ORDER_HEX: &str = "73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001";

/// Number of random Miller-Rabin witnesses tried on top of the small-prime sieve.
const MILLER_RABIN_ROUNDS: usize = 40;

const SMALL_PRIMES: [u32; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// The order `p` of the pairing groups.
pub fn group_order() -> BigUint {
    // The constant is valid hex, so parsing cannot fail.
    BigUint::parse_bytes(GROUP_ORDER_HEX.as_bytes(), 16).unwrap_or_default()
}

/// Output of the extended Euclidean algorithm: `gcd = a * x + m * y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedGcd {
    /// Greatest common divisor of the inputs, always non-negative.
    pub gcd: BigInt,
    /// Bezout coefficient of `a`.
    pub x: BigInt,
    /// Bezout coefficient of `m`.
    pub y: BigInt,
}

/// Run the extended Euclidean algorithm on `a` and `m`.
pub fn extended_gcd(a: &BigInt, m: &BigInt) -> ExtendedGcd {
    let (mut old_r, mut r) = (a.clone(), m.clone());
    let (mut old_x, mut x) = (BigInt::one(), BigInt::zero());
    let (mut old_y, mut y) = (BigInt::zero(), BigInt::one());

    while !r.is_zero() {
        let quotient = &old_r / &r;
        let next_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, next_r);
        let next_x = &old_x - &quotient * &x;
        old_x = std::mem::replace(&mut x, next_x);
        let next_y = &old_y - &quotient * &y;
        old_y = std::mem::replace(&mut y, next_y);
    }

    if old_r.is_negative() {
        ExtendedGcd {
            gcd: -old_r,
            x: -old_x,
            y: -old_y,
        }
    } else {
        ExtendedGcd {
            gcd: old_r,
            x: old_x,
            y: old_y,
        }
    }
}

/// Compute `a^{-1} mod m`.
///
/// Fails with [`Error::NotInvertible`] when `gcd(a, m) != 1`.
pub fn inverse(a: &BigUint, m: &BigUint) -> Result<BigUint, Error> {
    let modulus = BigInt::from_biguint(Sign::Plus, m.clone());
    let reduced = BigInt::from_biguint(Sign::Plus, a % m);
    let ExtendedGcd { gcd, x, .. } = extended_gcd(&reduced, &modulus);
    if !gcd.is_one() {
        return Err(Error::NotInvertible);
    }

    let normalized = ((x % &modulus) + &modulus) % &modulus;
    normalized.to_biguint().ok_or(Error::NotInvertible)
}

/// Invert a scalar modulo the group order.
pub fn invert_scalar(a: &Scalar) -> Result<Scalar, Error> {
    let inverted = inverse(&scalar_to_biguint(a), &group_order()).map_err(|err| {
        log::error!("attempted to invert a scalar that has no inverse modulo the group order");
        err
    })?;
    biguint_to_scalar(&inverted)
}

/// Draw an integer uniformly from `[1, p - 1]` by rejection sampling on `bits(p)`-bit candidates.
pub fn sample_below(rng: &mut impl Rng, p: &BigUint) -> BigUint {
    let bits = p.bits();
    loop {
        let candidate = rng.gen_biguint(bits);
        if !candidate.is_zero() && &candidate < p {
            return candidate;
        }
    }
}

/// Draw a uniformly random non-zero scalar.
pub fn random_nonzero_scalar(rng: &mut impl Rng) -> Scalar {
    let order = group_order();
    loop {
        // Values below the order always fit in a canonical scalar encoding.
        if let Ok(scalar) = biguint_to_scalar(&sample_below(rng, &order)) {
            return scalar;
        }
    }
}

/// Probabilistic primality test: trial division by small primes, then Miller-Rabin with random
/// witnesses.
pub fn is_probable_prime(n: &BigUint, rng: &mut impl Rng) -> bool {
    let two = BigUint::from(2u32);
    if n < &two {
        return false;
    }
    for small in SMALL_PRIMES.iter().map(|&p| BigUint::from(p)) {
        if n == &small {
            return true;
        }
        if (n % &small).is_zero() {
            return false;
        }
    }

    let n_minus_one = n - &BigUint::one();
    let trailing = n_minus_one.trailing_zeros().unwrap_or(0);
    let odd_part = &n_minus_one >> trailing;

    'witness: for _ in 0..MILLER_RABIN_ROUNDS {
        let base = rng.gen_biguint_range(&two, &n_minus_one);
        let mut x = base.modpow(&odd_part, n);
        if x.is_one() || x == n_minus_one {
            continue;
        }
        for _ in 1..trailing {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Interpret a scalar as a non-negative integer below the group order.
pub fn scalar_to_biguint(scalar: &Scalar) -> BigUint {
    BigUint::from_bytes_le(&scalar.to_bytes())
}

/// Convert an integer below the group order into a scalar.
pub fn biguint_to_scalar(value: &BigUint) -> Result<Scalar, Error> {
    let bytes = value.to_bytes_le();
    if bytes.len() > 32 {
        return Err(Error::InvalidEncoding(
            "integer does not fit in a scalar".to_string(),
        ));
    }
    let mut repr = [0u8; 32];
    repr[..bytes.len()].copy_from_slice(&bytes);
    Option::from(Scalar::from_bytes(&repr))
        .ok_or_else(|| Error::InvalidEncoding("integer exceeds the group order".to_string()))
}

/// Encode an integer smaller than 2^128 as a scalar.
pub fn scalar_from_u128(value: u128) -> Scalar {
    Scalar::from_raw([value as u64, (value >> 64) as u64, 0, 0])
}

#[cfg(test)]
mod test {
    use super::*;
    use ff::Field;

    #[test]
    fn extended_gcd_satisfies_bezout() {
        let a = BigInt::from(240);
        let m = BigInt::from(46);
        let ExtendedGcd { gcd, x, y } = extended_gcd(&a, &m);
        assert_eq!(gcd, BigInt::from(2));
        assert_eq!(&a * &x + &m * &y, gcd);
    }

    #[test]
    fn inverse_of_small_values() {
        let m = BigUint::from(97u32);
        for a in 1u32..97 {
            let inv = inverse(&BigUint::from(a), &m).unwrap();
            assert_eq!((BigUint::from(a) * inv) % &m, BigUint::one());
        }
    }

    #[test]
    fn inverse_fails_without_coprimality() {
        let m = BigUint::from(91u32);
        assert_eq!(
            inverse(&BigUint::from(13u32), &m),
            Err(Error::NotInvertible)
        );
        assert_eq!(inverse(&BigUint::zero(), &m), Err(Error::NotInvertible));
    }

    #[test]
    fn scalar_inverse_matches_field_inverse() {
        let mut rng = rand::thread_rng();
        for _ in 0..16 {
            let a = random_nonzero_scalar(&mut rng);
            let inv = invert_scalar(&a).unwrap();
            assert_eq!(a * inv, Scalar::one());
            assert_eq!(inv, Option::<Scalar>::from(a.invert()).unwrap());
        }
        assert_eq!(invert_scalar(&Scalar::zero()), Err(Error::NotInvertible));
    }

    #[test]
    fn samples_stay_in_range() {
        let mut rng = rand::thread_rng();
        let p = BigUint::from(11u32);
        for _ in 0..500 {
            let x = sample_below(&mut rng, &p);
            assert!(!x.is_zero() && x < p);
        }
    }

    #[test]
    fn group_order_is_prime() {
        let mut rng = rand::thread_rng();
        assert!(is_probable_prime(&group_order(), &mut rng));
        assert!(!is_probable_prime(&(group_order() + 2u32), &mut rng));
        assert!(is_probable_prime(&BigUint::from(7919u32), &mut rng));
        // Carmichael number.
        assert!(!is_probable_prime(&BigUint::from(561u32), &mut rng));
        assert!(!is_probable_prime(&BigUint::one(), &mut rng));
    }

    #[test]
    fn scalar_conversions_round_trip() {
        let mut rng = rand::thread_rng();
        let s = Scalar::random(&mut rng);
        assert_eq!(biguint_to_scalar(&scalar_to_biguint(&s)).unwrap(), s);
        assert!(biguint_to_scalar(&group_order()).is_err());
        assert_eq!(scalar_from_u128(1 << 70), Scalar::from(1 << 35) * Scalar::from(1 << 35));
    }
}
