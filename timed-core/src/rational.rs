//! Exact rational arithmetic extended with the two infinities.
//!
//! Everything the symbolic layers compare or add is a [`Rational`]: clock
//! values, guard bounds, DBM entries and delays. Finite values are
//! arbitrary-precision [`BigRational`]s kept in lowest terms; the
//! infinities are explicit variants so that DBM entries like `(< ∞)` need
//! no out-of-band encoding.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use thiserror::Error;

/// Errors raised by the partial operations on [`Rational`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RationalError {
    #[error("denominator must be non-zero")]
    ZeroDenominator,
    #[error("undefined arithmetic: {0}")]
    Undefined(&'static str),
    #[error("cannot parse `{0}` as a rational")]
    Parse(String),
    #[error("operation requires a finite rational")]
    NotFinite,
}

/// An element of ℚ ∪ {−∞, +∞}.
///
/// The derived ordering relies on the variant order: `NegInfinity` sorts
/// below every finite value, `Infinity` above.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rational {
    NegInfinity,
    Finite(BigRational),
    Infinity,
}

impl Rational {
    pub fn zero() -> Self {
        Rational::Finite(BigRational::zero())
    }

    pub fn one() -> Self {
        Rational::Finite(BigRational::one())
    }

    pub fn infinity() -> Self {
        Rational::Infinity
    }

    pub fn neg_infinity() -> Self {
        Rational::NegInfinity
    }

    /// The nudge used by the delay solver to step off a strict bound.
    pub fn epsilon() -> Self {
        Rational::new(1, 1_000_000).expect("epsilon denominator is non-zero")
    }

    pub fn integer(n: i64) -> Self {
        Rational::Finite(BigRational::from_integer(BigInt::from(n)))
    }

    pub fn new(numerator: i64, denominator: i64) -> Result<Self, RationalError> {
        if denominator == 0 {
            return Err(RationalError::ZeroDenominator);
        }
        Ok(Rational::Finite(BigRational::new(
            BigInt::from(numerator),
            BigInt::from(denominator),
        )))
    }

    pub fn from_big(value: BigRational) -> Self {
        Rational::Finite(value)
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Rational::Finite(_))
    }

    pub fn is_infinite(&self) -> bool {
        !self.is_finite()
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Rational::Finite(v) if v.is_zero())
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Rational::NegInfinity => true,
            Rational::Finite(v) => v.is_negative(),
            Rational::Infinity => false,
        }
    }

    /// True iff this is a finite value with denominator 1.
    pub fn is_integer(&self) -> bool {
        matches!(self, Rational::Finite(v) if v.is_integer())
    }

    /// ⌊x⌋ as a machine integer. Only defined on finite values.
    pub fn floor_int(&self) -> Result<i64, RationalError> {
        match self {
            Rational::Finite(v) => v
                .floor()
                .to_integer()
                .to_i64()
                .ok_or(RationalError::Undefined("floor exceeds i64 range")),
            _ => Err(RationalError::NotFinite),
        }
    }

    /// The fractional part `x − ⌊x⌋`, in `[0, 1)`. Only defined on finite
    /// values.
    pub fn fract(&self) -> Result<Rational, RationalError> {
        match self {
            Rational::Finite(v) => Ok(Rational::Finite(v - v.floor())),
            _ => Err(RationalError::NotFinite),
        }
    }

    pub fn checked_add(&self, other: &Rational) -> Result<Rational, RationalError> {
        use Rational::*;
        match (self, other) {
            (Finite(a), Finite(b)) => Ok(Finite(a + b)),
            (Infinity, NegInfinity) | (NegInfinity, Infinity) => {
                Err(RationalError::Undefined("∞ − ∞"))
            }
            (Infinity, _) | (_, Infinity) => Ok(Infinity),
            (NegInfinity, _) | (_, NegInfinity) => Ok(NegInfinity),
        }
    }

    pub fn checked_sub(&self, other: &Rational) -> Result<Rational, RationalError> {
        self.checked_add(&other.checked_neg())
    }

    pub fn checked_neg(&self) -> Rational {
        match self {
            Rational::NegInfinity => Rational::Infinity,
            Rational::Finite(v) => Rational::Finite(-v),
            Rational::Infinity => Rational::NegInfinity,
        }
    }

    pub fn checked_mul(&self, other: &Rational) -> Result<Rational, RationalError> {
        use Rational::*;
        match (self, other) {
            (Finite(a), Finite(b)) => Ok(Finite(a * b)),
            (Finite(a), inf) | (inf, Finite(a)) => {
                if a.is_zero() {
                    Err(RationalError::Undefined("0 · ∞"))
                } else if a.is_negative() == matches!(inf, Infinity) {
                    Ok(NegInfinity)
                } else {
                    Ok(Infinity)
                }
            }
            (Infinity, Infinity) | (NegInfinity, NegInfinity) => Ok(Infinity),
            (Infinity, NegInfinity) | (NegInfinity, Infinity) => Ok(NegInfinity),
        }
    }

    pub fn checked_div(&self, other: &Rational) -> Result<Rational, RationalError> {
        use Rational::*;
        match (self, other) {
            (_, Finite(b)) if b.is_zero() => Err(RationalError::Undefined("division by zero")),
            (Finite(a), Finite(b)) => Ok(Finite(a / b)),
            (Finite(_), Infinity) | (Finite(_), NegInfinity) => Ok(Rational::zero()),
            (_, Infinity) | (_, NegInfinity) => Err(RationalError::Undefined("∞ ÷ ∞")),
            (Infinity, Finite(b)) => Ok(if b.is_negative() { NegInfinity } else { Infinity }),
            (NegInfinity, Finite(b)) => Ok(if b.is_negative() { Infinity } else { NegInfinity }),
        }
    }

    pub fn max(self, other: Rational) -> Rational {
        std::cmp::max(self, other)
    }

    pub fn min(self, other: Rational) -> Rational {
        std::cmp::min(self, other)
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Rational::integer(value)
    }
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident, $checked:ident, $what:literal) => {
        impl std::ops::$trait for &Rational {
            type Output = Rational;
            fn $method(self, rhs: &Rational) -> Rational {
                self.$checked(rhs).expect($what)
            }
        }
        impl std::ops::$trait for Rational {
            type Output = Rational;
            fn $method(self, rhs: Rational) -> Rational {
                (&self).$checked(&rhs).expect($what)
            }
        }
    };
}

forward_binop!(Add, add, checked_add, "rational addition of opposite infinities");
forward_binop!(Sub, sub, checked_sub, "rational subtraction of equal infinities");
forward_binop!(Mul, mul, checked_mul, "rational multiplication of zero and infinity");
forward_binop!(Div, div, checked_div, "undefined rational division");

impl std::ops::Neg for &Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        self.checked_neg()
    }
}

impl std::ops::Neg for Rational {
    type Output = Rational;
    fn neg(self) -> Rational {
        self.checked_neg()
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rational::NegInfinity => write!(f, "-inf"),
            Rational::Infinity => write!(f, "inf"),
            Rational::Finite(v) if v.is_integer() => write!(f, "{}", v.numer()),
            Rational::Finite(v) => write!(f, "{}/{}", v.numer(), v.denom()),
        }
    }
}

impl FromStr for Rational {
    type Err = RationalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "inf" | "+inf" => return Ok(Rational::Infinity),
            "-inf" => return Ok(Rational::NegInfinity),
            _ => {}
        }
        if let Some((n, d)) = s.split_once('/') {
            let numer = BigInt::from_str(n.trim()).map_err(|_| RationalError::Parse(s.into()))?;
            let denom = BigInt::from_str(d.trim()).map_err(|_| RationalError::Parse(s.into()))?;
            if denom.is_zero() {
                return Err(RationalError::ZeroDenominator);
            }
            return Ok(Rational::Finite(BigRational::new(numer, denom)));
        }
        if let Some((int_part, frac_part)) = s.split_once('.') {
            let negative = int_part.trim_start().starts_with('-');
            let int = if int_part.is_empty() || int_part == "-" {
                BigInt::zero()
            } else {
                BigInt::from_str(int_part).map_err(|_| RationalError::Parse(s.into()))?
            };
            let digits = frac_part.trim();
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(RationalError::Parse(s.into()));
            }
            let numer = BigInt::from_str(digits).map_err(|_| RationalError::Parse(s.into()))?;
            let denom = num_traits::pow(BigInt::from(10), digits.len());
            let frac = BigRational::new(numer, denom);
            let int = BigRational::from_integer(int);
            let value = if negative { int - frac } else { int + frac };
            return Ok(Rational::Finite(value));
        }
        let int = BigInt::from_str(s).map_err(|_| RationalError::Parse(s.into()))?;
        Ok(Rational::Finite(BigRational::from_integer(int)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn field_laws_on_samples() {
        let samples = [q(1, 2), q(-3, 4), Rational::integer(5), q(7, 3)];
        for a in &samples {
            for b in &samples {
                assert_eq!(a + b, b + a);
                for c in &samples {
                    assert_eq!(&(a + b) + c, a + &(b + c));
                    assert_eq!(a * &(b + c), &(a * b) + &(a * c));
                }
            }
            if !a.is_zero() {
                assert_eq!(a * &(&Rational::one() / a), Rational::one());
            }
        }
    }

    #[test]
    fn ordering_spans_infinities() {
        assert!(Rational::neg_infinity() < q(-1000, 1));
        assert!(q(1000, 1) < Rational::infinity());
        assert!(Rational::neg_infinity() < Rational::infinity());
    }

    #[test]
    fn infinity_absorbs_finite_addition() {
        assert_eq!(
            Rational::infinity().checked_add(&q(5, 2)).unwrap(),
            Rational::infinity()
        );
        assert!(Rational::infinity()
            .checked_sub(&Rational::infinity())
            .is_err());
    }

    #[test]
    fn integerness_floor_and_fraction() {
        assert!(Rational::integer(3).is_integer());
        assert!(!q(3, 2).is_integer());
        assert_eq!(q(7, 2).floor_int().unwrap(), 3);
        assert_eq!(q(7, 2).fract().unwrap(), q(1, 2));
        assert_eq!(q(-1, 2).floor_int().unwrap(), -1);
        assert_eq!(q(-1, 2).fract().unwrap(), q(1, 2));
    }

    #[test]
    fn parsing_accepts_all_notations() {
        assert_eq!("3".parse::<Rational>().unwrap(), Rational::integer(3));
        assert_eq!("3/2".parse::<Rational>().unwrap(), q(3, 2));
        assert_eq!("1.5".parse::<Rational>().unwrap(), q(3, 2));
        assert_eq!("-0.25".parse::<Rational>().unwrap(), q(-1, 4));
        assert_eq!("inf".parse::<Rational>().unwrap(), Rational::infinity());
        assert!("1/0".parse::<Rational>().is_err());
    }

    #[test]
    fn division_edge_cases() {
        assert!(q(0, 1).checked_div(&q(0, 1)).is_err());
        assert_eq!(
            q(1, 2).checked_div(&Rational::infinity()).unwrap(),
            Rational::zero()
        );
    }
}
