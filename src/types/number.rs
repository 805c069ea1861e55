//! # Number Semiring
//!
//! Valuations combine in one of three number universes, selected once at
//! initialization: exact rationals, double-precision floats, or floats
//! interpreted as base-10 logarithms of the represented value. The universe
//! is a property of each value; operations are only defined between values
//! of the same universe and panic otherwise.

use std::{fmt, ops, str::FromStr};

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use thiserror::Error;

/// The number universe a [`Number`] lives in
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NumberMode {
    /// Arbitrary-precision rationals
    Ratio,
    /// Double-precision floats
    Float,
    /// Floats holding the base-10 logarithm of the represented value
    Log,
}

/// A semiring value. In the [`NumberMode::Log`] universe the payload is the
/// base-10 logarithm of the represented value and negative infinity encodes
/// zero; multiplication is payload addition and addition is a stable
/// log-sum-exp.
#[derive(Clone, Debug)]
pub enum Number {
    /// An exact rational
    Ratio(BigRational),
    /// A linear-scale float
    Float(f64),
    /// A float holding the base-10 logarithm of the represented value
    Log(f64),
}

/// Errors when parsing a [`Number`] from a string
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NumberError {
    /// The token is not a rational or decimal number
    #[error("invalid number '{0}'")]
    Invalid(String),
    /// A rational with a zero denominator
    #[error("zero denominator in '{0}'")]
    ZeroDenominator(String),
    /// Negative values have no base-10 logarithm
    #[error("negative value '{0}' in log-space universe")]
    NegativeInLogSpace(String),
}

impl Number {
    /// Parses a number from a rational string `p/q` or a decimal string, into
    /// the given universe. In the log universe the parsed value is stored as
    /// its base-10 logarithm, so `0` becomes negative infinity.
    pub fn parse(s: &str, mode: NumberMode) -> Result<Number, NumberError> {
        let s = s.trim();
        match mode {
            NumberMode::Ratio => {
                if let Some((numer, denom)) = s.split_once('/') {
                    let numer = BigInt::from_str(numer.trim())
                        .map_err(|_| NumberError::Invalid(s.to_string()))?;
                    let denom = BigInt::from_str(denom.trim())
                        .map_err(|_| NumberError::Invalid(s.to_string()))?;
                    if denom.is_zero() {
                        return Err(NumberError::ZeroDenominator(s.to_string()));
                    }
                    return Ok(Number::Ratio(BigRational::new(numer, denom)));
                }
                let ratio =
                    parse_decimal_ratio(s).ok_or_else(|| NumberError::Invalid(s.to_string()))?;
                Ok(Number::Ratio(ratio))
            }
            NumberMode::Float => Ok(Number::Float(parse_float(s)?)),
            NumberMode::Log => {
                let val = parse_float(s)?;
                if val < 0. {
                    return Err(NumberError::NegativeInLogSpace(s.to_string()));
                }
                Ok(Number::Log(val.log10()))
            }
        }
    }

    /// The additive identity of a universe (negative infinity in log space)
    pub fn zero(mode: NumberMode) -> Number {
        match mode {
            NumberMode::Ratio => Number::Ratio(BigRational::zero()),
            NumberMode::Float => Number::Float(0.),
            NumberMode::Log => Number::Log(f64::NEG_INFINITY),
        }
    }

    /// The multiplicative identity of a universe (zero in log space)
    pub fn one(mode: NumberMode) -> Number {
        match mode {
            NumberMode::Ratio => Number::Ratio(BigRational::one()),
            NumberMode::Float => Number::Float(1.),
            NumberMode::Log => Number::Log(0.),
        }
    }

    /// Wraps a base-10 logarithm as a log-universe value
    pub fn from_log10(log: f64) -> Number {
        Number::Log(log)
    }

    /// Gets the universe of the value
    pub fn mode(&self) -> NumberMode {
        match self {
            Number::Ratio(_) => NumberMode::Ratio,
            Number::Float(_) => NumberMode::Float,
            Number::Log(_) => NumberMode::Log,
        }
    }

    /// Checks whether the represented value is negative. Log-universe values
    /// are never negative.
    pub fn is_negative(&self) -> bool {
        match self {
            Number::Ratio(q) => q.is_negative(),
            Number::Float(f) => *f < 0.,
            Number::Log(_) => false,
        }
    }

    /// Computes `log10(10^a + 10^b)` for two log-universe values holding `a`
    /// and `b`, with negative infinity absorbing. The computation is
    /// stabilized around the maximum of the two operands.
    ///
    /// Panics if either operand is not in the log universe.
    pub fn log_sum_exp(&self, other: &Number) -> f64 {
        match (self, other) {
            (Number::Log(a), Number::Log(b)) => {
                if *a == f64::NEG_INFINITY {
                    return *b;
                }
                if *b == f64::NEG_INFINITY {
                    return *a;
                }
                let m = a.max(*b);
                (10f64.powf(a - m) + 10f64.powf(b - m)).log10() + m
            }
            _ => panic!("log_sum_exp outside the log universe"),
        }
    }

    /// Gets the base-10 logarithm of the represented value as a float. In the
    /// log universe this is the payload itself; in the rational universe the
    /// logarithm is computed from a `d * 2^e` decomposition of numerator and
    /// denominator so that values far beyond the float range stay finite.
    pub fn log10(&self) -> f64 {
        match self {
            Number::Ratio(q) => {
                if q.is_zero() {
                    return f64::NEG_INFINITY;
                }
                if q.is_negative() {
                    return f64::NAN;
                }
                log10_biguint(q.numer().magnitude()) - log10_biguint(q.denom().magnitude())
            }
            Number::Float(f) => f.log10(),
            Number::Log(f) => *f,
        }
    }

    /// Gets the underlying rational. Panics outside the rational universe.
    pub fn to_ratio(&self) -> &BigRational {
        match self {
            Number::Ratio(q) => q,
            _ => panic!("not a rational-universe number"),
        }
    }

    /// Gets the underlying float payload. Panics in the rational universe.
    pub fn to_float(&self) -> f64 {
        match self {
            Number::Float(f) | Number::Log(f) => *f,
            Number::Ratio(_) => panic!("not a float-universe number"),
        }
    }
}

fn parse_float(s: &str) -> Result<f64, NumberError> {
    if let Some((numer, denom)) = s.split_once('/') {
        let numer = f64::from_str(numer.trim()).map_err(|_| NumberError::Invalid(s.to_string()))?;
        let denom = f64::from_str(denom.trim()).map_err(|_| NumberError::Invalid(s.to_string()))?;
        if denom == 0. {
            return Err(NumberError::ZeroDenominator(s.to_string()));
        }
        return Ok(numer / denom);
    }
    f64::from_str(s).map_err(|_| NumberError::Invalid(s.to_string()))
}

/// Parses a decimal string (optional sign, fraction, exponent) into an exact
/// rational
fn parse_decimal_ratio(s: &str) -> Option<BigRational> {
    let (mant, exp) = match s.split_once(['e', 'E']) {
        Some((mant, exp)) => (mant, exp.parse::<i32>().ok()?),
        None => (s, 0),
    };
    let (negative, mant) = match mant.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mant.strip_prefix('+').unwrap_or(mant)),
    };
    let (int_part, frac_part) = match mant.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mant, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    let mut numer = BigInt::parse_bytes(format!("{int_part}{frac_part}").as_bytes(), 10)?;
    if negative {
        numer = -numer;
    }
    let mut denom = num_traits::pow(BigInt::from(10), frac_part.len());
    if exp >= 0 {
        numer *= num_traits::pow(BigInt::from(10), exp as usize);
    } else {
        denom *= num_traits::pow(BigInt::from(10), (-exp) as usize);
    }
    Some(BigRational::new(numer, denom))
}

/// `log10` of a big unsigned integer via its top 53 bits and bit length
fn log10_biguint(n: &BigUint) -> f64 {
    let bits = n.bits();
    if bits <= 53 {
        return n.to_f64().expect("53-bit value fits a float").log10();
    }
    let shift = bits - 53;
    let mantissa = (n >> shift).to_f64().expect("53-bit value fits a float");
    (mantissa.log2() + shift as f64) * std::f64::consts::LOG10_2
}

fn mixed_universes() -> ! {
    panic!("number universes mixed")
}

impl ops::Add for Number {
    type Output = Number;

    fn add(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Ratio(a), Number::Ratio(b)) => Number::Ratio(a + b),
            (Number::Float(a), Number::Float(b)) => Number::Float(a + b),
            (a @ Number::Log(_), b @ Number::Log(_)) => Number::Log(a.log_sum_exp(&b)),
            _ => mixed_universes(),
        }
    }
}

impl ops::AddAssign for Number {
    fn add_assign(&mut self, rhs: Number) {
        let lhs = std::mem::replace(self, Number::Float(0.));
        *self = lhs + rhs;
    }
}

impl ops::Sub for Number {
    type Output = Number;

    /// Subtraction; in the log universe defined for `self >= rhs` via a
    /// stabilized log-diff-exp
    fn sub(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Ratio(a), Number::Ratio(b)) => Number::Ratio(a - b),
            (Number::Float(a), Number::Float(b)) => Number::Float(a - b),
            (Number::Log(a), Number::Log(b)) => {
                if b == f64::NEG_INFINITY {
                    return Number::Log(a);
                }
                Number::Log((1. - 10f64.powf(b - a)).log10() + a)
            }
            _ => mixed_universes(),
        }
    }
}

impl ops::Mul for Number {
    type Output = Number;

    fn mul(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Ratio(a), Number::Ratio(b)) => Number::Ratio(a * b),
            (Number::Float(a), Number::Float(b)) => Number::Float(a * b),
            (Number::Log(a), Number::Log(b)) => Number::Log(a + b),
            _ => mixed_universes(),
        }
    }
}

impl ops::MulAssign for Number {
    fn mul_assign(&mut self, rhs: Number) {
        let lhs = std::mem::replace(self, Number::Float(0.));
        *self = lhs * rhs;
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Ratio(a), Number::Ratio(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a == b,
            (Number::Log(a), Number::Log(b)) => a == b,
            _ => mixed_universes(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Number::Ratio(a), Number::Ratio(b)) => a.partial_cmp(b),
            (Number::Float(a), Number::Float(b)) => a.partial_cmp(b),
            (Number::Log(a), Number::Log(b)) => a.partial_cmp(b),
            _ => mixed_universes(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Ratio(q) => write!(f, "{}", q),
            Number::Float(v) => write!(f, "{}", v),
            Number::Log(l) => write!(f, "{}", l),
        }
    }
}

#[cfg(test)]
mod tests {
    use num_rational::BigRational;

    use super::{Number, NumberMode};

    fn ratio(s: &str) -> Number {
        Number::parse(s, NumberMode::Ratio).unwrap()
    }

    fn float(s: &str) -> Number {
        Number::parse(s, NumberMode::Float).unwrap()
    }

    #[test]
    fn ratio_round_trip() {
        use std::str::FromStr;
        assert_eq!(
            ratio("3/4").to_ratio(),
            &BigRational::from_str("3/4").unwrap()
        );
        assert_eq!(
            ratio("-10/4").to_ratio(),
            &BigRational::from_str("-5/2").unwrap()
        );
    }

    #[test]
    fn ratio_from_decimal() {
        assert_eq!(ratio("0.25"), ratio("1/4"));
        assert_eq!(ratio("-1.5"), ratio("-3/2"));
        assert_eq!(ratio("2e3"), ratio("2000"));
        assert_eq!(ratio("25e-2"), ratio("1/4"));
        assert_eq!(ratio(".5"), ratio("1/2"));
    }

    #[test]
    fn ratio_rejects_garbage() {
        assert!(Number::parse("abc", NumberMode::Ratio).is_err());
        assert!(Number::parse("1/0", NumberMode::Ratio).is_err());
        assert!(Number::parse(".", NumberMode::Ratio).is_err());
    }

    #[test]
    fn semiring_laws_ratio() {
        let (a, b, c) = (ratio("1/3"), ratio("5/7"), ratio("-2/9"));
        assert_eq!(
            (a.clone() + b.clone()) + c.clone(),
            a.clone() + (b.clone() + c.clone())
        );
        assert_eq!(
            a.clone() * (b.clone() + c.clone()),
            a.clone() * b.clone() + a.clone() * c.clone()
        );
        assert_eq!(a.clone() + Number::zero(NumberMode::Ratio), a.clone());
        assert_eq!(a.clone() * Number::one(NumberMode::Ratio), a);
    }

    #[test]
    fn semiring_laws_float() {
        // exact binary fractions keep float arithmetic exact
        let (a, b, c) = (float("0.5"), float("0.25"), float("2"));
        assert_eq!(
            (a.clone() + b.clone()) + c.clone(),
            a.clone() + (b.clone() + c.clone())
        );
        assert_eq!(
            a.clone() * (b.clone() + c.clone()),
            a.clone() * b.clone() + a.clone() * c.clone()
        );
        assert_eq!(a.clone() + Number::zero(NumberMode::Float), a.clone());
        assert_eq!(a.clone() * Number::one(NumberMode::Float), a);
    }

    #[test]
    fn log_zero_and_one() {
        assert_eq!(Number::zero(NumberMode::Log).to_float(), f64::NEG_INFINITY);
        assert_eq!(Number::one(NumberMode::Log).to_float(), 0.);
        let parsed_zero = Number::parse("0", NumberMode::Log).unwrap();
        assert_eq!(parsed_zero.to_float(), f64::NEG_INFINITY);
    }

    #[test]
    fn log_sum_exp_absorbs_zero() {
        let a = Number::from_log10(-3.5);
        let zero = Number::zero(NumberMode::Log);
        assert_eq!(a.log_sum_exp(&zero), -3.5);
        assert_eq!(zero.log_sum_exp(&a), -3.5);
        assert_eq!(zero.log_sum_exp(&zero), f64::NEG_INFINITY);
    }

    #[test]
    fn log_sum_exp_is_stable() {
        // log10(10^-400 + 10^-400) = -400 + log10(2); naive exponentiation
        // would underflow to -inf
        let a = Number::from_log10(-400.);
        let sum = a.log_sum_exp(&a);
        assert!((sum - (-400. + 2f64.log10())).abs() < 1e-12);
    }

    #[test]
    fn log_multiplication_is_addition() {
        let a = Number::from_log10(-1.);
        let b = Number::from_log10(-2.);
        assert_eq!((a * b).to_float(), -3.);
    }

    #[test]
    fn log10_of_parsed() {
        assert!((float("1000").log10() - 3.).abs() < 1e-12);
        assert!((ratio("1000").log10() - 3.).abs() < 1e-12);
        assert_eq!(Number::parse("1", NumberMode::Log).unwrap().log10(), 0.);
    }

    #[test]
    fn log10_of_huge_ratio() {
        // 10^500 overflows f64 but its rational log10 must stay finite
        let huge = format!("1{}", "0".repeat(500));
        let n = ratio(&huge);
        assert!((n.log10() - 500.).abs() < 1e-9);
        let tiny = format!("1/{}", huge);
        let n = ratio(&tiny);
        assert!((n.log10() + 500.).abs() < 1e-9);
    }

    #[test]
    fn weight_completion_identity() {
        // w(v) + w(-v) = 1 completion as done after parsing
        let w = ratio("0.3");
        let complement = Number::one(NumberMode::Ratio) - w.clone();
        assert_eq!(complement, ratio("7/10"));
        assert_eq!(w + complement, Number::one(NumberMode::Ratio));
    }

    #[test]
    #[should_panic(expected = "number universes mixed")]
    fn mixed_universes_panic() {
        let _ = float("1") + ratio("1");
    }
}
