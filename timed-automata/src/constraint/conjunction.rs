//! Conjunctions of atomic difference constraints over a fixed clock set.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use timed_core::{math, Clock, ClockValuation, Rational};

use super::{
    AtomConstraint, DisjunctiveConstraint, GuardError, TrivialNegation, ValidityCache,
    ValidityStatus,
};

/// A conjunction of [`AtomConstraint`]s, always associated with the clock
/// set it is defined over.
///
/// Every non-zero clock not mentioned by an explicit atom receives the
/// implicit `c ≥ 0` atom at construction time, so a constraint is total
/// over its clock set. The TRUE and FALSE constants carry representative
/// atoms (`c ≥ 0` resp. `c < 0` per clock) like any other conjunction.
///
/// Structure (clocks, truth flag, atoms) is immutable; the only mutable
/// attachment is the shared [`ValidityCache`], which equality, ordering
/// and hashing ignore.
#[derive(Debug, Clone)]
pub struct Constraint {
    clocks: math::OrderedSet<Clock>,
    truth: Option<bool>,
    atoms: math::OrderedSet<AtomConstraint>,
    status: ValidityCache,
}

impl Constraint {
    /// The constraint satisfied by every valuation over `clocks`.
    pub fn top(clocks: math::OrderedSet<Clock>) -> Self {
        let atoms = clocks
            .iter()
            .filter(|c| !c.is_zero())
            .map(|c| {
                AtomConstraint::greater_equal(c, Rational::zero())
                    .expect("non-negativity atoms are well-formed")
            })
            .collect();
        Self {
            clocks,
            truth: Some(true),
            atoms,
            status: ValidityCache::default(),
        }
    }

    /// The unsatisfiable constraint over `clocks`.
    pub fn bottom(clocks: math::OrderedSet<Clock>) -> Self {
        let atoms = clocks
            .iter()
            .filter(|c| !c.is_zero())
            .map(|c| {
                AtomConstraint::less_than(c, Rational::zero())
                    .expect("negativity atoms are well-formed")
            })
            .collect();
        Self {
            clocks,
            truth: Some(false),
            atoms,
            status: ValidityCache::default(),
        }
    }

    /// Builds a conjunction from explicit atoms, adding the implicit
    /// `c ≥ 0` atom for every unmentioned non-zero clock.
    pub fn of<I>(clocks: math::OrderedSet<Clock>, atoms: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = AtomConstraint>,
    {
        let mut collected: math::OrderedSet<AtomConstraint> = math::OrderedSet::new();
        let mut mentioned: math::OrderedSet<Clock> = math::OrderedSet::new();
        for atom in atoms {
            for clock in [atom.left(), atom.right()] {
                if clock.is_zero() {
                    continue;
                }
                if !clocks.contains(clock) {
                    return Err(GuardError::ForeignClock {
                        atom: atom.to_string(),
                        clock: clock.name().to_string(),
                    });
                }
                mentioned.insert(clock.clone());
            }
            collected.insert(atom);
        }
        for clock in clocks.iter().filter(|c| !c.is_zero()) {
            if !mentioned.contains(clock) {
                collected.insert(
                    AtomConstraint::greater_equal(clock, Rational::zero())
                        .expect("non-negativity atoms are well-formed"),
                );
            }
        }
        Ok(Self {
            clocks,
            truth: None,
            atoms: collected,
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

    pub fn atoms(&self) -> impl Iterator<Item = &AtomConstraint> + '_ {
        self.atoms.iter()
    }

    /// The validity cache of this constraint value.
    pub fn status(&self) -> &ValidityCache {
        &self.status
    }

    pub fn known_status(&self) -> ValidityStatus {
        self.status.get()
    }

    fn same_clocks(&self, other: &Constraint) -> Result<(), GuardError> {
        if self.clocks != other.clocks {
            return Err(GuardError::ClockSetMismatch);
        }
        Ok(())
    }

    /// `self ∧ other` over the shared clock set.
    pub fn and(&self, other: &Constraint) -> Result<Constraint, GuardError> {
        self.same_clocks(other)?;
        if self.is_false() || other.is_false() {
            return Ok(Constraint::bottom(self.clocks.clone()));
        }
        if self.is_true() {
            return Ok(other.clone());
        }
        if other.is_true() {
            return Ok(self.clone());
        }
        let merged = self.atoms.iter().chain(other.atoms.iter()).cloned();
        Constraint::of(self.clocks.clone(), merged)
    }

    /// `self ∧ atom`.
    pub fn and_atom(&self, atom: AtomConstraint) -> Result<Constraint, GuardError> {
        if self.is_false() {
            return Ok(self.clone());
        }
        let atoms = if self.is_true() {
            std::iter::once(atom).collect::<Vec<_>>()
        } else {
            self.atoms.iter().cloned().chain(std::iter::once(atom)).collect()
        };
        Constraint::of(self.clocks.clone(), atoms)
    }

    /// `self ∨ other` as a two-disjunct DNF.
    pub fn or(&self, other: &Constraint) -> Result<DisjunctiveConstraint, GuardError> {
        self.same_clocks(other)?;
        DisjunctiveConstraint::of(self.clocks.clone(), [self.clone(), other.clone()])
    }

    /// De Morgan negation: one disjunct per negated atom.
    pub fn negate(&self) -> DisjunctiveConstraint {
        if self.is_true() {
            return DisjunctiveConstraint::bottom(self.clocks.clone());
        }
        if self.is_false() {
            return DisjunctiveConstraint::top(self.clocks.clone());
        }
        let mut disjuncts = Vec::new();
        for atom in &self.atoms {
            match atom.negate() {
                Ok(negated) => {
                    let disjunct = Constraint::of(self.clocks.clone(), [negated])
                        .expect("negated atoms stay within the clock set");
                    disjuncts.push(disjunct);
                }
                // A trivially false negation contributes nothing to the
                // disjunction; a trivially true one makes it TRUE.
                Err(TrivialNegation::IsFalse) => {}
                Err(TrivialNegation::IsTrue) => {
                    return DisjunctiveConstraint::top(self.clocks.clone());
                }
            }
        }
        DisjunctiveConstraint::of(self.clocks.clone(), disjuncts)
            .expect("negated disjuncts share the clock set")
    }

    /// `self ∧ ¬other` as a DNF.
    pub fn minus(&self, other: &Constraint) -> Result<DisjunctiveConstraint, GuardError> {
        self.same_clocks(other)?;
        if self.is_false() || other.is_true() {
            return Ok(DisjunctiveConstraint::bottom(self.clocks.clone()));
        }
        if other.is_false() {
            return Ok(self.to_dnf());
        }
        if self.is_true() {
            return Ok(other.negate());
        }
        let negated = other.negate();
        if negated.is_false() {
            return Ok(DisjunctiveConstraint::bottom(self.clocks.clone()));
        }
        if negated.is_true() {
            return Ok(self.to_dnf());
        }
        let mut kept = Vec::new();
        for term in negated.disjuncts() {
            let intersection = self.and(term)?;
            if !intersection.is_false() {
                kept.push(intersection);
            }
        }
        DisjunctiveConstraint::of(self.clocks.clone(), kept)
    }

    /// Wraps this conjunction as a one-disjunct DNF.
    pub fn to_dnf(&self) -> DisjunctiveConstraint {
        if self.is_true() {
            return DisjunctiveConstraint::top(self.clocks.clone());
        }
        if self.is_false() {
            return DisjunctiveConstraint::bottom(self.clocks.clone());
        }
        DisjunctiveConstraint::of(self.clocks.clone(), [self.clone()])
            .expect("a constraint shares its own clock set")
    }

    /// Concretely evaluates every atom against `valuation`.
    pub fn is_satisfied(&self, valuation: &ClockValuation) -> Result<bool, GuardError> {
        for clock in self.clocks.iter().filter(|c| !c.is_zero()) {
            valuation.value(clock)?;
        }
        for atom in &self.atoms {
            if !atom.is_satisfied(valuation)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Folds all single-clock atoms into at most one lower and one upper
    /// bound per clock, detecting empty intervals. Difference atoms are
    /// kept untouched.
    pub fn simplify(&self) -> Constraint {
        if self.truth.is_some() {
            return self.clone();
        }

        #[derive(Clone)]
        struct Bounds {
            lower: (Rational, bool),
            upper: (Rational, bool),
        }

        let mut per_clock: math::OrderedMap<Clock, Bounds> = math::OrderedMap::new();
        let mut difference_atoms = Vec::new();

        for atom in &self.atoms {
            let (left, right) = (atom.left(), atom.right());
            if !left.is_zero() && right.is_zero() {
                // Upper bound: c ≤/< V.
                let entry = per_clock.entry(left.clone()).or_insert_with(|| Bounds {
                    lower: (Rational::zero(), true),
                    upper: (Rational::infinity(), false),
                });
                let candidate = (atom.bound().clone(), atom.is_closed());
                if tighter_upper(&candidate, &entry.upper) {
                    entry.upper = candidate;
                }
            } else if left.is_zero() && !right.is_zero() {
                // Lower bound: c ≥/> −V.
                let entry = per_clock.entry(right.clone()).or_insert_with(|| Bounds {
                    lower: (Rational::zero(), true),
                    upper: (Rational::infinity(), false),
                });
                let candidate = (-atom.bound(), atom.is_closed());
                if tighter_lower(&candidate, &entry.lower) {
                    entry.lower = candidate;
                }
            } else if !left.is_zero() && !right.is_zero() {
                difference_atoms.push(atom.clone());
            }
            // Atoms over the zero clock alone are tautologies; drop them.
        }

        let mut atoms = difference_atoms;
        for (clock, bounds) in &per_clock {
            let (lower, lower_closed) = &bounds.lower;
            let (upper, upper_closed) = &bounds.upper;
            if lower > upper || (lower == upper && !(*lower_closed && *upper_closed)) {
                return Constraint::bottom(self.clocks.clone());
            }
            if lower > &Rational::zero() || !lower_closed {
                let atom = if *lower_closed {
                    AtomConstraint::greater_equal(clock, lower.clone())
                } else {
                    AtomConstraint::greater_than(clock, lower.clone())
                };
                atoms.push(atom.expect("folded lower bounds are well-formed"));
            }
            if upper < &Rational::infinity() {
                let atom = if *upper_closed {
                    AtomConstraint::less_equal(clock, upper.clone())
                } else {
                    AtomConstraint::less_than(clock, upper.clone())
                };
                atoms.push(atom.expect("folded upper bounds are well-formed"));
            }
        }

        Constraint::of(self.clocks.clone(), atoms)
            .expect("simplification stays within the clock set")
    }

    /// `self → other`, decided as unsatisfiability of `self ∧ ¬other`.
    /// An inconclusive oracle counts as "does not imply".
    pub fn implies<O: super::ConstraintOracle>(
        &self,
        other: &Constraint,
        oracle: &O,
    ) -> Result<bool, GuardError> {
        let difference = self.minus(other)?;
        Ok(matches!(
            oracle.satisfiable_dnf(&difference),
            super::Sat::Unsat
        ))
    }
}

/// True iff `a` is a strictly tighter upper bound than `b`.
fn tighter_upper(a: &(Rational, bool), b: &(Rational, bool)) -> bool {
    a.0 < b.0 || (a.0 == b.0 && !a.1 && b.1)
}

/// True iff `a` is a strictly tighter lower bound than `b`.
fn tighter_lower(a: &(Rational, bool), b: &(Rational, bool)) -> bool {
    a.0 > b.0 || (a.0 == b.0 && !a.1 && b.1)
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.clocks == other.clocks && self.truth == other.truth && self.atoms == other.atoms
    }
}

impl Eq for Constraint {}

impl Hash for Constraint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.clocks.hash(state);
        self.truth.hash(state);
        self.atoms.hash(state);
    }
}

impl PartialOrd for Constraint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Constraint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.clocks
            .cmp(&other.clocks)
            .then_with(|| self.truth.cmp(&other.truth))
            .then_with(|| self.atoms.cmp(&other.atoms))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_false() {
            return write!(f, "⊥");
        }
        if self.atoms.is_empty() {
            return write!(f, "⊤");
        }
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                write!(f, " ∧ ")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timed_core::ClockValuation;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn clock_set(clocks: &[&Clock]) -> math::OrderedSet<Clock> {
        clocks.iter().map(|c| (*c).clone()).collect()
    }

    #[test]
    fn unmentioned_clocks_get_nonnegativity() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let clocks = clock_set(&[&x, &y]);
        let guard = Constraint::of(
            clocks,
            [AtomConstraint::less_than(&x, Rational::one()).unwrap()],
        )
        .unwrap();
        // y >= 0 was added implicitly.
        assert_eq!(guard.atoms().count(), 2);
    }

    #[test]
    fn and_is_pointwise_conjunction() {
        let x = Clock::new("x");
        let clocks = clock_set(&[&x]);
        let lo = Constraint::of(
            clocks.clone(),
            [AtomConstraint::greater_equal(&x, Rational::one()).unwrap()],
        )
        .unwrap();
        let hi = Constraint::of(
            clocks.clone(),
            [AtomConstraint::less_than(&x, Rational::integer(2)).unwrap()],
        )
        .unwrap();
        let both = lo.and(&hi).unwrap();

        let inside = ClockValuation::zero([&x]).delay(&q(3, 2)).unwrap();
        let below = ClockValuation::zero([&x]).delay(&q(1, 2)).unwrap();
        assert!(both.is_satisfied(&inside).unwrap());
        assert!(!both.is_satisfied(&below).unwrap());
        assert_eq!(
            both.is_satisfied(&inside).unwrap(),
            lo.is_satisfied(&inside).unwrap() && hi.is_satisfied(&inside).unwrap()
        );
    }

    #[test]
    fn clock_set_mismatch_is_rejected() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let a = Constraint::top(clock_set(&[&x]));
        let b = Constraint::top(clock_set(&[&y]));
        assert_eq!(a.and(&b), Err(GuardError::ClockSetMismatch));
    }

    #[test]
    fn double_negation_is_logically_equivalent() {
        let x = Clock::new("x");
        let clocks = clock_set(&[&x]);
        let guard = Constraint::of(
            clocks,
            [AtomConstraint::greater_equal(&x, Rational::one()).unwrap()],
        )
        .unwrap();
        let back = guard.negate().negate();

        for num in 0..5 {
            let v = ClockValuation::zero([&x]).delay(&q(num, 2)).unwrap();
            assert_eq!(
                guard.is_satisfied(&v).unwrap(),
                back.is_satisfied(&v).unwrap()
            );
        }
    }

    #[test]
    fn simplify_detects_empty_intervals() {
        let x = Clock::new("x");
        let clocks = clock_set(&[&x]);
        let guard = Constraint::of(
            clocks,
            [
                AtomConstraint::greater_equal(&x, Rational::integer(3)).unwrap(),
                AtomConstraint::less_than(&x, Rational::integer(3)).unwrap(),
            ],
        )
        .unwrap();
        assert!(guard.simplify().is_false());
    }

    #[test]
    fn implication_is_decided_by_the_oracle() {
        let x = Clock::new("x");
        let clocks = clock_set(&[&x]);
        let narrow = Constraint::of(
            clocks.clone(),
            [
                AtomConstraint::greater_equal(&x, Rational::integer(2)).unwrap(),
                AtomConstraint::less_than(&x, Rational::integer(3)).unwrap(),
            ],
        )
        .unwrap();
        let wide = Constraint::of(
            clocks.clone(),
            [AtomConstraint::greater_equal(&x, Rational::one()).unwrap()],
        )
        .unwrap();
        let oracle = crate::constraint::DbmOracle::new();
        assert!(narrow.implies(&wide, &oracle).unwrap());
        assert!(!wide.implies(&narrow, &oracle).unwrap());
    }

    #[test]
    fn simplify_keeps_the_tightest_bounds() {
        let x = Clock::new("x");
        let clocks = clock_set(&[&x]);
        let guard = Constraint::of(
            clocks,
            [
                AtomConstraint::less_equal(&x, Rational::integer(5)).unwrap(),
                AtomConstraint::less_than(&x, Rational::integer(3)).unwrap(),
                AtomConstraint::greater_equal(&x, Rational::one()).unwrap(),
            ],
        )
        .unwrap();
        let simplified = guard.simplify();
        let atoms: Vec<String> = simplified.atoms().map(|a| a.to_string()).collect();
        assert!(atoms.iter().any(|a| a.contains("< 3")));
        assert!(!atoms.iter().any(|a| a.contains("5")));
    }
}
