//! Total clock valuations.

use std::fmt;

use thiserror::Error;

use crate::math;
use crate::{Clock, Rational, ResetSet};

/// Errors raised by valuation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValuationError {
    #[error("cannot delay by negative amount {0}")]
    NegativeDelay(Rational),
    #[error("clock `{0}` is not part of this valuation")]
    UnknownClock(String),
}

/// A total mapping from a fixed set of clocks to non-negative rationals.
///
/// The zero clock is never stored; it reads 0 in every valuation. The
/// backing map is ordered by clock id, so valuations themselves order and
/// hash deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockValuation {
    values: math::OrderedMap<Clock, Rational>,
}

impl ClockValuation {
    pub fn new(values: math::OrderedMap<Clock, Rational>) -> Self {
        let values = values
            .into_iter()
            .filter(|(clock, _)| !clock.is_zero())
            .collect();
        Self { values }
    }

    /// The all-zero valuation over the given clocks.
    pub fn zero<'a, I>(clocks: I) -> Self
    where
        I: IntoIterator<Item = &'a Clock>,
    {
        Self {
            values: clocks
                .into_iter()
                .filter(|c| !c.is_zero())
                .map(|c| (c.clone(), Rational::zero()))
                .collect(),
        }
    }

    pub fn clocks(&self) -> impl Iterator<Item = &Clock> + '_ {
        self.values.keys()
    }

    pub fn clock_set(&self) -> math::OrderedSet<Clock> {
        self.values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value of `clock`; the zero clock reads 0.
    pub fn value(&self, clock: &Clock) -> Result<&Rational, ValuationError> {
        if clock.is_zero() {
            return Ok(ZERO_VALUE.get_or_init(Rational::zero));
        }
        self.values
            .get(clock)
            .ok_or_else(|| ValuationError::UnknownClock(clock.name().to_string()))
    }

    /// Advances every clock by `delay`.
    pub fn delay(&self, delay: &Rational) -> Result<ClockValuation, ValuationError> {
        if delay.is_negative() {
            return Err(ValuationError::NegativeDelay(delay.clone()));
        }
        Ok(Self {
            values: self
                .values
                .iter()
                .map(|(clock, value)| (clock.clone(), value + delay))
                .collect(),
        })
    }

    /// Sets every clock in `resets` to 0. All reset clocks must belong to
    /// the valuation's domain.
    pub fn reset(&self, resets: &ResetSet) -> Result<ClockValuation, ValuationError> {
        let mut values = self.values.clone();
        for clock in resets {
            if clock.is_zero() {
                continue;
            }
            match values.get_mut(clock) {
                Some(value) => *value = Rational::zero(),
                None => return Err(ValuationError::UnknownClock(clock.name().to_string())),
            }
        }
        Ok(Self { values })
    }

    /// The fractional part of `clock`'s value.
    pub fn fraction(&self, clock: &Clock) -> Result<Rational, ValuationError> {
        let value = self.value(clock)?;
        Ok(value
            .fract()
            .expect("clock valuations only hold finite values"))
    }

    pub fn is_fraction_zero(&self, clock: &Clock) -> Result<bool, ValuationError> {
        Ok(self.fraction(clock)?.is_zero())
    }
}

static ZERO_VALUE: std::sync::OnceLock<Rational> = std::sync::OnceLock::new();

impl fmt::Display for ClockValuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (clock, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{clock}={value}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clocks() -> (Clock, Clock) {
        (Clock::new("x"), Clock::new("y"))
    }

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn delay_zero_is_identity() {
        let (x, y) = clocks();
        let v = ClockValuation::zero([&x, &y]);
        assert_eq!(v.delay(&Rational::zero()).unwrap(), v);
    }

    #[test]
    fn delays_compose_additively() {
        let (x, y) = clocks();
        let v = ClockValuation::zero([&x, &y]);
        let once = v.delay(&q(1, 2)).unwrap().delay(&q(1, 3)).unwrap();
        let at_once = v.delay(&q(5, 6)).unwrap();
        assert_eq!(once, at_once);
    }

    #[test]
    fn negative_delay_is_rejected() {
        let (x, _) = clocks();
        let v = ClockValuation::zero([&x]);
        assert!(matches!(
            v.delay(&q(-1, 2)),
            Err(ValuationError::NegativeDelay(_))
        ));
    }

    #[test]
    fn reset_zeroes_exactly_the_given_clocks() {
        let (x, y) = clocks();
        let v = ClockValuation::zero([&x, &y]).delay(&q(3, 2)).unwrap();
        let resets: ResetSet = [x.clone()].into_iter().collect();
        let reset = v.reset(&resets).unwrap();
        assert!(reset.value(&x).unwrap().is_zero());
        assert_eq!(reset.value(&y).unwrap(), &q(3, 2));
    }

    #[test]
    fn disjoint_resets_compose_to_union() {
        let (x, y) = clocks();
        let v = ClockValuation::zero([&x, &y]).delay(&q(7, 4)).unwrap();
        let rx: ResetSet = [x.clone()].into_iter().collect();
        let ry: ResetSet = [y.clone()].into_iter().collect();
        let rxy: ResetSet = [x.clone(), y.clone()].into_iter().collect();
        assert_eq!(
            v.reset(&rx).unwrap().reset(&ry).unwrap(),
            v.reset(&rxy).unwrap()
        );
    }

    #[test]
    fn unknown_clock_reset_is_an_error() {
        let (x, y) = clocks();
        let v = ClockValuation::zero([&x]);
        let ry: ResetSet = [y.clone()].into_iter().collect();
        assert!(matches!(
            v.reset(&ry),
            Err(ValuationError::UnknownClock(_))
        ));
    }

    #[test]
    fn zero_clock_always_reads_zero() {
        let (x, _) = clocks();
        let v = ClockValuation::zero([&x]).delay(&q(2, 1)).unwrap();
        assert!(v.value(crate::zero_clock()).unwrap().is_zero());
    }

    #[test]
    fn fractions() {
        let (x, _) = clocks();
        let v = ClockValuation::zero([&x]).delay(&q(3, 2)).unwrap();
        assert_eq!(v.fraction(&x).unwrap(), q(1, 2));
        assert!(!v.is_fraction_zero(&x).unwrap());
    }
}
