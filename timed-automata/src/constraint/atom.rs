//! Atomic difference constraints, the building blocks of guards and DBMs.

use std::fmt;

use timed_core::{zero_clock, Clock, ClockValuation, Rational};

use super::GuardError;

/// Reported by [`AtomConstraint::negate`] when the negation collapses to a
/// constant. The DNF layer converts these into TRUE/FALSE constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrivialNegation {
    /// The negation is trivially true (the atom was contradictory).
    IsTrue,
    /// The negation is trivially false (the atom was a tautology).
    IsFalse,
}

/// A single difference constraint `left − right ⟨≤ | <⟩ bound`.
///
/// Single-clock bounds are encoded against the zero clock: `c ≤ 5` is
/// `c − x0 ≤ 5` and `c ≥ 3` is `x0 − c ≤ −3`. The only inadmissible atoms
/// are the self-contradictory ones over a single clock pair
/// (`c − c < 0`-shaped); constructors reject those.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomConstraint {
    left: Clock,
    right: Clock,
    bound: Rational,
    closed: bool,
}

impl AtomConstraint {
    pub fn try_new(
        left: Clock,
        right: Clock,
        bound: Rational,
        closed: bool,
    ) -> Result<Self, GuardError> {
        let atom = Self {
            left,
            right,
            bound,
            closed,
        };
        if atom.is_contradictory() {
            return Err(GuardError::ContradictoryAtom(atom.to_string()));
        }
        Ok(atom)
    }

    fn is_contradictory(&self) -> bool {
        if self.bound == Rational::neg_infinity() {
            return true;
        }
        if self.left != self.right {
            return false;
        }
        let zero = Rational::zero();
        self.bound < zero || (self.bound == zero && !self.closed)
    }

    /// `c1 − c2 < bound`.
    pub fn diff_less_than(c1: &Clock, c2: &Clock, bound: Rational) -> Result<Self, GuardError> {
        Self::try_new(c1.clone(), c2.clone(), bound, false)
    }

    /// `c1 − c2 ≤ bound`.
    pub fn diff_less_equal(c1: &Clock, c2: &Clock, bound: Rational) -> Result<Self, GuardError> {
        Self::try_new(c1.clone(), c2.clone(), bound, true)
    }

    /// `c < bound`.
    pub fn less_than(clock: &Clock, bound: Rational) -> Result<Self, GuardError> {
        Self::try_new(clock.clone(), zero_clock().clone(), bound, false)
    }

    /// `c ≤ bound`.
    pub fn less_equal(clock: &Clock, bound: Rational) -> Result<Self, GuardError> {
        Self::try_new(clock.clone(), zero_clock().clone(), bound, true)
    }

    /// `c > bound`, encoded as `x0 − c < −bound`.
    pub fn greater_than(clock: &Clock, bound: Rational) -> Result<Self, GuardError> {
        Self::try_new(zero_clock().clone(), clock.clone(), -bound, false)
    }

    /// `c ≥ bound`, encoded as `x0 − c ≤ −bound`.
    pub fn greater_equal(clock: &Clock, bound: Rational) -> Result<Self, GuardError> {
        Self::try_new(zero_clock().clone(), clock.clone(), -bound, true)
    }

    pub fn left(&self) -> &Clock {
        &self.left
    }

    pub fn right(&self) -> &Clock {
        &self.right
    }

    pub fn bound(&self) -> &Rational {
        &self.bound
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True when the atom cannot exclude any valuation (`c − c ≤ V` with
    /// `V ≥ 0`, or an infinite bound).
    pub fn is_tautology(&self) -> bool {
        if self.bound == Rational::infinity() {
            return true;
        }
        if self.left != self.right {
            return false;
        }
        let zero = Rational::zero();
        self.bound > zero || (self.bound == zero && self.closed)
    }

    /// The dual atom: `¬(c1 − c2 ≤ V)` is `c2 − c1 < −V` and
    /// `¬(c1 − c2 < V)` is `c2 − c1 ≤ −V`. Returns a tagged status when
    /// the result would be constant.
    pub fn negate(&self) -> Result<AtomConstraint, TrivialNegation> {
        if self.is_tautology() {
            return Err(TrivialNegation::IsFalse);
        }
        let negated = Self {
            left: self.right.clone(),
            right: self.left.clone(),
            bound: -&self.bound,
            closed: !self.closed,
        };
        if negated.is_contradictory() {
            // The original atom was a contradiction; its negation holds
            // everywhere. Constructors make this unreachable for atoms
            // built through the public API.
            return Err(TrivialNegation::IsTrue);
        }
        Ok(negated)
    }

    pub fn is_satisfied(&self, valuation: &ClockValuation) -> Result<bool, GuardError> {
        let left = valuation.value(&self.left)?;
        let right = valuation.value(&self.right)?;
        let difference = left - right;
        Ok(if self.closed {
            difference <= self.bound
        } else {
            difference < self.bound
        })
    }
}

impl fmt::Display for AtomConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.closed { "<=" } else { "<" };
        if self.right.is_zero() {
            write!(f, "{} {} {}", self.left, op, self.bound)
        } else if self.left.is_zero() {
            let reversed = if self.closed { ">=" } else { ">" };
            write!(f, "{} {} {}", self.right, reversed, -&self.bound)
        } else {
            write!(f, "{} - {} {} {}", self.left, self.right, op, self.bound)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn self_contradictory_atoms_are_rejected() {
        let x = Clock::new("x");
        assert!(AtomConstraint::try_new(x.clone(), x.clone(), Rational::zero(), false).is_err());
        assert!(AtomConstraint::try_new(x.clone(), x.clone(), q(-1, 1), true).is_err());
        assert!(AtomConstraint::try_new(x.clone(), x.clone(), Rational::zero(), true).is_ok());
    }

    #[test]
    fn negation_swaps_sides_and_strictness() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let atom = AtomConstraint::diff_less_equal(&x, &y, q(3, 2)).unwrap();
        let negated = atom.negate().unwrap();
        assert_eq!(negated.left(), &y);
        assert_eq!(negated.right(), &x);
        assert_eq!(negated.bound(), &q(-3, 2));
        assert!(!negated.is_closed());
        // Double negation restores the original.
        assert_eq!(negated.negate().unwrap(), atom);
    }

    #[test]
    fn negating_a_tautology_reports_trivially_false() {
        let x = Clock::new("x");
        let atom = AtomConstraint::try_new(x.clone(), x.clone(), Rational::zero(), true).unwrap();
        assert_eq!(atom.negate(), Err(TrivialNegation::IsFalse));
    }

    #[test]
    fn evaluation_against_valuations() {
        let x = Clock::new("x");
        let v = ClockValuation::zero([&x]).delay(&q(1, 2)).unwrap();
        assert!(AtomConstraint::less_than(&x, Rational::one())
            .unwrap()
            .is_satisfied(&v)
            .unwrap());
        assert!(!AtomConstraint::greater_equal(&x, Rational::one())
            .unwrap()
            .is_satisfied(&v)
            .unwrap());
    }

    #[test]
    fn lower_bound_display_reads_naturally() {
        let x = Clock::new("x");
        let atom = AtomConstraint::greater_equal(&x, Rational::one()).unwrap();
        assert_eq!(atom.to_string(), format!("{x} >= 1"));
    }
}
