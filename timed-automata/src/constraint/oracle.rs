//! The pluggable decision procedure for guard satisfiability and validity.

use tracing::trace;

use crate::dbm::dbm_of_constraint;

use super::{Constraint, DisjunctiveConstraint, ValidityStatus};

/// Outcome of an oracle query: the queried property holds, does not hold,
/// or could not be decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sat {
    Sat,
    Unsat,
    Unknown,
}

/// Decides satisfiability and validity of guards over the non-negative
/// orthant. `Unknown` answers are legal and must be treated conservatively
/// by callers (not complete, not deterministic, skip the branch).
pub trait ConstraintOracle {
    /// Is some non-negative valuation satisfying `constraint`?
    fn satisfiable(&self, constraint: &Constraint) -> Sat;

    /// Does `constraint` hold for every non-negative valuation?
    fn valid(&self, constraint: &Constraint) -> Sat;

    /// Is some non-negative valuation satisfying `dnf`?
    fn satisfiable_dnf(&self, dnf: &DisjunctiveConstraint) -> Sat;

    /// Does `dnf` hold for every non-negative valuation?
    fn valid_dnf(&self, dnf: &DisjunctiveConstraint) -> Sat;
}

/// The shipped oracle: a complete decision procedure for conjunctions of
/// rational difference atoms, by DBM canonicalisation and emptiness.
/// Answers are memoised in the formulas' validity caches.
#[derive(Debug, Default, Clone, Copy)]
pub struct DbmOracle;

impl DbmOracle {
    pub fn new() -> Self {
        Self
    }

    fn decide_satisfiable(constraint: &Constraint) -> bool {
        if constraint.is_true() {
            return true;
        }
        if constraint.is_false() {
            return false;
        }
        match dbm_of_constraint(constraint) {
            Some(dbm) => !dbm.is_empty(),
            None => false,
        }
    }
}

impl ConstraintOracle for DbmOracle {
    fn satisfiable(&self, constraint: &Constraint) -> Sat {
        let status = constraint.status().get_or_compute(
            |known| {
                matches!(
                    known,
                    ValidityStatus::True
                        | ValidityStatus::False
                        | ValidityStatus::SatisfiableUnknown
                )
            },
            || {
                if Self::decide_satisfiable(constraint) {
                    ValidityStatus::SatisfiableUnknown
                } else {
                    ValidityStatus::False
                }
            },
        );
        trace!(%constraint, ?status, "satisfiability check");
        match status {
            ValidityStatus::False => Sat::Unsat,
            _ => Sat::Sat,
        }
    }

    fn valid(&self, constraint: &Constraint) -> Sat {
        let status = constraint.status().get_or_compute(
            |known| matches!(known, ValidityStatus::True | ValidityStatus::False),
            || {
                let negated = constraint.negate();
                let refutable = negated
                    .disjuncts()
                    .any(|disjunct| Self::decide_satisfiable(disjunct));
                if refutable {
                    if Self::decide_satisfiable(constraint) {
                        ValidityStatus::SatisfiableUnknown
                    } else {
                        ValidityStatus::False
                    }
                } else {
                    ValidityStatus::True
                }
            },
        );
        trace!(%constraint, ?status, "validity check");
        match status {
            ValidityStatus::True => Sat::Sat,
            _ => Sat::Unsat,
        }
    }

    fn satisfiable_dnf(&self, dnf: &DisjunctiveConstraint) -> Sat {
        if dnf.is_true() {
            return Sat::Sat;
        }
        if dnf.is_false() {
            return Sat::Unsat;
        }
        let satisfiable = dnf
            .disjuncts()
            .any(|disjunct| matches!(self.satisfiable(disjunct), Sat::Sat));
        if satisfiable {
            dnf.status().set(ValidityStatus::SatisfiableUnknown);
            Sat::Sat
        } else {
            dnf.status().set(ValidityStatus::False);
            Sat::Unsat
        }
    }

    fn valid_dnf(&self, dnf: &DisjunctiveConstraint) -> Sat {
        if dnf.is_true() {
            return Sat::Sat;
        }
        if dnf.is_false() {
            return Sat::Unsat;
        }
        let negated = dnf.negate();
        match self.satisfiable_dnf(&negated) {
            Sat::Unsat => {
                dnf.status().set(ValidityStatus::True);
                Sat::Sat
            }
            _ => Sat::Unsat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::AtomConstraint;
    use timed_core::{math, Clock, Rational};

    fn clock_set(clocks: &[&Clock]) -> math::OrderedSet<Clock> {
        clocks.iter().map(|c| (*c).clone()).collect()
    }

    #[test]
    fn satisfiable_interval() {
        let x = Clock::new("x");
        let guard = Constraint::of(
            clock_set(&[&x]),
            [
                AtomConstraint::greater_equal(&x, Rational::one()).unwrap(),
                AtomConstraint::less_than(&x, Rational::integer(2)).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(DbmOracle.satisfiable(&guard), Sat::Sat);
        assert_eq!(DbmOracle.valid(&guard), Sat::Unsat);
    }

    #[test]
    fn unsatisfiable_interval_is_cached() {
        let x = Clock::new("x");
        let guard = Constraint::of(
            clock_set(&[&x]),
            [
                AtomConstraint::greater_equal(&x, Rational::integer(2)).unwrap(),
                AtomConstraint::less_than(&x, Rational::one()).unwrap(),
            ],
        )
        .unwrap();
        assert_eq!(DbmOracle.satisfiable(&guard), Sat::Unsat);
        assert_eq!(guard.known_status(), ValidityStatus::False);
        // A clone shares the cache.
        let clone = guard.clone();
        assert_eq!(clone.known_status(), ValidityStatus::False);
    }

    #[test]
    fn nonnegativity_is_valid() {
        let x = Clock::new("x");
        let guard = Constraint::of(
            clock_set(&[&x]),
            [AtomConstraint::greater_equal(&x, Rational::zero()).unwrap()],
        )
        .unwrap();
        assert_eq!(DbmOracle.valid(&guard), Sat::Sat);
        assert_eq!(guard.known_status(), ValidityStatus::True);
    }

    #[test]
    fn disjoint_negation_disjuncts_are_mutually_unsatisfiable() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let clocks = clock_set(&[&x, &y]);
        let guard = Constraint::of(
            clocks.clone(),
            [
                AtomConstraint::greater_equal(&x, Rational::one()).unwrap(),
                AtomConstraint::less_than(&y, Rational::integer(2)).unwrap(),
            ],
        )
        .unwrap();
        let disjoint = guard.to_dnf().negate_disjoint();
        let disjuncts: Vec<_> = disjoint.disjuncts().cloned().collect();
        for (i, a) in disjuncts.iter().enumerate() {
            for b in disjuncts.iter().skip(i + 1) {
                let overlap = a.and(b).unwrap();
                assert_eq!(DbmOracle.satisfiable(&overlap), Sat::Unsat);
            }
        }
    }
}
