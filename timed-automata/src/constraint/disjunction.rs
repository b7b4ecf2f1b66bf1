//! Disjunctive normal forms over conjunctions sharing a clock set.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use timed_core::{math, Clock, ClockValuation};

use super::{Constraint, GuardError, ValidityCache, ValidityStatus};

/// A set of [`Constraint`] disjuncts over one clock set.
///
/// The empty disjunction is FALSE; a disjunction containing a TRUE
/// conjunct collapses to TRUE. As with [`Constraint`], the validity cache
/// is the only mutable attachment and is ignored by equality and hashing.
#[derive(Debug, Clone)]
pub struct DisjunctiveConstraint {
    clocks: math::OrderedSet<Clock>,
    truth: Option<bool>,
    disjuncts: math::OrderedSet<Constraint>,
    status: ValidityCache,
}

impl DisjunctiveConstraint {
    pub fn top(clocks: math::OrderedSet<Clock>) -> Self {
        let disjuncts = std::iter::once(Constraint::top(clocks.clone())).collect();
        Self {
            clocks,
            truth: Some(true),
            disjuncts,
            status: ValidityCache::default(),
        }
    }

    pub fn bottom(clocks: math::OrderedSet<Clock>) -> Self {
        Self {
            clocks,
            truth: Some(false),
            disjuncts: math::OrderedSet::new(),
            status: ValidityCache::default(),
        }
    }

    /// Normalising constructor: drops FALSE disjuncts, collapses to TRUE
    /// when a TRUE disjunct is present, and to FALSE when nothing is left.
    pub fn of<I>(clocks: math::OrderedSet<Clock>, disjuncts: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = Constraint>,
    {
        let mut kept: math::OrderedSet<Constraint> = math::OrderedSet::new();
        for disjunct in disjuncts {
            if disjunct.clocks() != &clocks {
                return Err(GuardError::ClockSetMismatch);
            }
            if disjunct.is_true() {
                return Ok(Self::top(clocks));
            }
            if !disjunct.is_false() {
                kept.insert(disjunct);
            }
        }
        if kept.is_empty() {
            return Ok(Self::bottom(clocks));
        }
        Ok(Self {
            clocks,
            truth: None,
            disjuncts: kept,
            status: ValidityCache::default(),
        })
    }

    pub fn is_true(&self) -> bool {
        self.truth == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.truth == Some(false)
    }

    pub fn clocks(&self) -> &math::OrderedSet<Clock> {
        &self.clocks
    }

    pub fn disjuncts(&self) -> impl Iterator<Item = &Constraint> + '_ {
        self.disjuncts.iter()
    }

    pub fn status(&self) -> &ValidityCache {
        &self.status
    }

    pub fn known_status(&self) -> ValidityStatus {
        self.status.get()
    }

    fn same_clocks(&self, other: &DisjunctiveConstraint) -> Result<(), GuardError> {
        if self.clocks != other.clocks {
            return Err(GuardError::ClockSetMismatch);
        }
        Ok(())
    }

    /// Union of disjunct sets.
    pub fn or(&self, other: &DisjunctiveConstraint) -> Result<DisjunctiveConstraint, GuardError> {
        self.same_clocks(other)?;
        if self.is_true() || other.is_true() {
            return Ok(Self::top(self.clocks.clone()));
        }
        if self.is_false() {
            return Ok(other.clone());
        }
        if other.is_false() {
            return Ok(self.clone());
        }
        Self::of(
            self.clocks.clone(),
            self.disjuncts.iter().chain(other.disjuncts.iter()).cloned(),
        )
    }

    pub fn or_constraint(&self, constraint: &Constraint) -> Result<DisjunctiveConstraint, GuardError> {
        self.or(&constraint.to_dnf())
    }

    /// Distributes conjunction over the two disjunct sets.
    pub fn and(&self, other: &DisjunctiveConstraint) -> Result<DisjunctiveConstraint, GuardError> {
        self.same_clocks(other)?;
        if self.is_false() || other.is_false() {
            return Ok(Self::bottom(self.clocks.clone()));
        }
        if self.is_true() {
            return Ok(other.clone());
        }
        if other.is_true() {
            return Ok(self.clone());
        }
        let mut products = Vec::new();
        for left in &self.disjuncts {
            for right in &other.disjuncts {
                let intersection = left.and(right)?;
                if !intersection.is_false() {
                    products.push(intersection);
                }
            }
        }
        Self::of(self.clocks.clone(), products)
    }

    pub fn and_constraint(&self, constraint: &Constraint) -> Result<DisjunctiveConstraint, GuardError> {
        self.and(&constraint.to_dnf())
    }

    /// De Morgan negation, keeping the result in DNF.
    pub fn negate(&self) -> DisjunctiveConstraint {
        if self.is_true() {
            return Self::bottom(self.clocks.clone());
        }
        if self.is_false() {
            return Self::top(self.clocks.clone());
        }
        let mut result = Self::top(self.clocks.clone());
        for disjunct in &self.disjuncts {
            let negated = disjunct.negate();
            if negated.is_false() {
                return Self::bottom(self.clocks.clone());
            }
            result = result
                .and(&negated)
                .expect("negated disjuncts share the clock set");
            if result.is_false() {
                return result;
            }
        }
        result
    }

    /// Negation whose disjuncts are pairwise disjoint, obtained by
    /// iteratively subtracting each already emitted disjunct from the next
    /// candidate. Used to materialise the uncovered region when completing
    /// an automaton.
    pub fn negate_disjoint(&self) -> DisjunctiveConstraint {
        if self.is_true() {
            return Self::bottom(self.clocks.clone());
        }
        if self.is_false() {
            return Self::top(self.clocks.clone());
        }
        let simple = self.negate();
        if simple.is_true() || simple.is_false() {
            return simple;
        }

        let mut disjoint: Vec<Constraint> = Vec::new();
        let mut accumulated = Self::bottom(self.clocks.clone());
        for term in &simple.disjuncts {
            let fresh = term
                .to_dnf()
                .minus(&accumulated)
                .expect("subtraction stays within the clock set");
            if fresh.is_false() {
                continue;
            }
            disjoint.extend(fresh.disjuncts.iter().cloned());
            accumulated = accumulated
                .or(&fresh)
                .expect("accumulated region shares the clock set");
        }
        Self::of(self.clocks.clone(), disjoint)
            .expect("disjoint terms share the clock set")
    }

    /// `self ∧ ¬other`.
    pub fn minus(&self, other: &DisjunctiveConstraint) -> Result<DisjunctiveConstraint, GuardError> {
        self.same_clocks(other)?;
        if self.is_false() || other.is_true() {
            return Ok(Self::bottom(self.clocks.clone()));
        }
        if other.is_false() {
            return Ok(self.clone());
        }
        if self.is_true() {
            return Ok(other.negate());
        }
        let negated = other.negate();
        if negated.is_false() {
            return Ok(Self::bottom(self.clocks.clone()));
        }
        if negated.is_true() {
            return Ok(self.clone());
        }
        self.and(&negated)
    }

    /// True iff some disjunct is satisfied.
    pub fn is_satisfied(&self, valuation: &ClockValuation) -> Result<bool, GuardError> {
        if self.is_true() {
            return Ok(true);
        }
        if self.is_false() {
            return Ok(false);
        }
        for disjunct in &self.disjuncts {
            if disjunct.is_satisfied(valuation)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Simplifies every disjunct and drops the ones that collapse to
    /// FALSE.
    pub fn simplify(&self) -> DisjunctiveConstraint {
        if self.truth.is_some() {
            return self.clone();
        }
        let simplified = self.disjuncts.iter().map(Constraint::simplify);
        Self::of(self.clocks.clone(), simplified)
            .expect("simplified disjuncts share the clock set")
    }
}

impl PartialEq for DisjunctiveConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.clocks == other.clocks
            && self.truth == other.truth
            && self.disjuncts == other.disjuncts
    }
}

impl Eq for DisjunctiveConstraint {}

impl Hash for DisjunctiveConstraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.clocks.hash(state);
        self.truth.hash(state);
        self.disjuncts.hash(state);
    }
}

impl PartialOrd for DisjunctiveConstraint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DisjunctiveConstraint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.clocks
            .cmp(&other.clocks)
            .then_with(|| self.truth.cmp(&other.truth))
            .then_with(|| self.disjuncts.cmp(&other.disjuncts))
    }
}

impl fmt::Display for DisjunctiveConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_false() || self.disjuncts.is_empty() {
            return write!(f, "⊥");
        }
        for (i, disjunct) in self.disjuncts.iter().enumerate() {
            if i > 0 {
                write!(f, " ∨ ")?;
            }
            let rendered = disjunct.to_string();
            if rendered.contains('∧') {
                write!(f, "({rendered})")?;
            } else {
                write!(f, "{rendered}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::AtomConstraint;
    use timed_core::Rational;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn single(clock: &Clock, atom: AtomConstraint) -> Constraint {
        let clocks: math::OrderedSet<Clock> = std::iter::once(clock.clone()).collect();
        Constraint::of(clocks, [atom]).unwrap()
    }

    #[test]
    fn empty_disjunction_is_false() {
        let x = Clock::new("x");
        let clocks: math::OrderedSet<Clock> = std::iter::once(x).collect();
        let dnf = DisjunctiveConstraint::of(clocks, []).unwrap();
        assert!(dnf.is_false());
    }

    #[test]
    fn true_disjunct_collapses_to_top() {
        let x = Clock::new("x");
        let clocks: math::OrderedSet<Clock> = std::iter::once(x.clone()).collect();
        let dnf = DisjunctiveConstraint::of(
            clocks.clone(),
            [
                Constraint::top(clocks.clone()),
                single(&x, AtomConstraint::less_than(&x, Rational::one()).unwrap()),
            ],
        )
        .unwrap();
        assert!(dnf.is_true());
    }

    #[test]
    fn negate_disjoint_covers_the_complement_without_overlap() {
        let x = Clock::new("x");
        let below = single(&x, AtomConstraint::less_than(&x, Rational::one()).unwrap());
        let dnf = below.to_dnf();
        let complement = dnf.negate_disjoint();

        // x = 1/2 is covered by the original, not the complement.
        let inside = ClockValuation::zero([&x]).delay(&q(1, 2)).unwrap();
        assert!(dnf.is_satisfied(&inside).unwrap());
        assert!(!complement.is_satisfied(&inside).unwrap());

        // x = 2 is in the complement only, and exactly one disjunct of the
        // disjoint form covers it.
        let outside = ClockValuation::zero([&x]).delay(&q(2, 1)).unwrap();
        assert!(complement.is_satisfied(&outside).unwrap());
        let hits = complement
            .disjuncts()
            .filter(|d| d.is_satisfied(&outside).unwrap())
            .count();
        assert_eq!(hits, 1);
    }

    #[test]
    fn minus_carves_out_the_subtrahend() {
        let x = Clock::new("x");
        let all = DisjunctiveConstraint::top(std::iter::once(x.clone()).collect());
        let low = single(&x, AtomConstraint::less_than(&x, Rational::one()).unwrap()).to_dnf();
        let rest = all.minus(&low).unwrap();

        let inside = ClockValuation::zero([&x]).delay(&q(1, 2)).unwrap();
        let outside = ClockValuation::zero([&x]).delay(&q(3, 2)).unwrap();
        assert!(!rest.is_satisfied(&inside).unwrap());
        assert!(rest.is_satisfied(&outside).unwrap());
    }
}
