//! Difference bound matrices over rational bounds.
//!
//! A DBM over clocks `c1..cn` is an `(n+1)×(n+1)` matrix of bounds on the
//! differences `ci − cj`, with the zero clock at index 0. Kept canonical
//! (all-pairs tightest bounds), it is the workhorse behind emptiness and
//! inclusion checks in the witness search and the constraint oracle.

use std::fmt;

use thiserror::Error;

use crate::constraint::{AtomConstraint, Constraint};
use timed_core::{zero_clock, Clock, Rational};

/// Errors raised by DBM operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbmError {
    #[error("clock `{0}` is not part of this DBM")]
    UnknownClock(String),
    #[error("DBMs range over different clock lists")]
    ClockSetMismatch,
}

/// One matrix entry: `ci − cj ⟨≤ | <⟩ value`.
///
/// The ordering makes the *tighter* bound smaller: bounds compare by
/// value first, and at equal value the strict bound sorts below the
/// closed one. `min` therefore picks the tightening candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DbmBound {
    value: Rational,
    closed: bool,
}

impl DbmBound {
    pub fn closed(value: Rational) -> Self {
        Self {
            value,
            closed: true,
        }
    }

    pub fn strict(value: Rational) -> Self {
        Self {
            value,
            closed: false,
        }
    }

    pub fn unbounded() -> Self {
        Self::strict(Rational::infinity())
    }

    pub fn value(&self) -> &Rational {
        &self.value
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_unbounded(&self) -> bool {
        self.value == Rational::infinity()
    }

    /// Bound addition along a path: values add, strictness propagates.
    fn add(&self, other: &DbmBound) -> DbmBound {
        DbmBound {
            value: &self.value + &other.value,
            closed: self.closed && other.closed,
        }
    }
}

impl PartialOrd for DbmBound {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DbmBound {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value
            .cmp(&other.value)
            // Strict before closed: at equal value the strict bound is
            // tighter.
            .then_with(|| self.closed.cmp(&other.closed))
    }
}

impl fmt::Display for DbmBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", if self.closed { "<=" } else { "<" }, self.value)
    }
}

/// A difference bound matrix over an ordered clock list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dbm {
    clocks: Vec<Clock>,
    bounds: Vec<DbmBound>,
}

impl Dbm {
    /// The non-negative orthant over the given clocks: `ci ≥ 0` for every
    /// clock, everything else unbounded.
    pub fn initial<'a, I>(clocks: I) -> Self
    where
        I: IntoIterator<Item = &'a Clock>,
    {
        let mut list = vec![zero_clock().clone()];
        let mut sorted: Vec<Clock> = clocks
            .into_iter()
            .filter(|c| !c.is_zero())
            .cloned()
            .collect();
        sorted.sort();
        sorted.dedup();
        list.extend(sorted);

        let size = list.len();
        let mut bounds = Vec::with_capacity(size * size);
        for i in 0..size {
            for j in 0..size {
                if i == j || i == 0 {
                    // Diagonal and row 0: x0 − cj ≤ 0, i.e. cj ≥ 0.
                    bounds.push(DbmBound::closed(Rational::zero()));
                } else {
                    bounds.push(DbmBound::unbounded());
                }
            }
        }
        Self {
            clocks: list,
            bounds,
        }
    }

    pub fn size(&self) -> usize {
        self.clocks.len()
    }

    pub fn clocks(&self) -> &[Clock] {
        &self.clocks
    }

    fn index_of(&self, clock: &Clock) -> Result<usize, DbmError> {
        self.clocks
            .iter()
            .position(|c| c == clock)
            .ok_or_else(|| DbmError::UnknownClock(clock.name().to_string()))
    }

    #[inline]
    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.clocks.len() + j
    }

    pub fn bound(&self, i: usize, j: usize) -> &DbmBound {
        &self.bounds[self.idx(i, j)]
    }

    fn set(&mut self, i: usize, j: usize, bound: DbmBound) {
        let idx = self.idx(i, j);
        self.bounds[idx] = bound;
    }

    /// Removes the upper bounds against the zero clock (time may elapse
    /// freely). First half of [`Dbm::future`].
    pub fn up(&mut self) {
        for i in 1..self.size() {
            self.set(i, 0, DbmBound::unbounded());
        }
    }

    /// Time elapse: `up` followed by canonicalisation.
    pub fn future(&mut self) {
        self.up();
        self.canonical();
    }

    /// Resets `clock` to 0 by copying the zero-clock row and column.
    pub fn reset(&mut self, clock: &Clock) -> Result<(), DbmError> {
        if clock.is_zero() {
            return Ok(());
        }
        let k = self.index_of(clock)?;
        for j in 0..self.size() {
            let from_row = self.bound(0, j).clone();
            self.set(k, j, from_row);
            let from_col = self.bound(j, 0).clone();
            self.set(j, k, from_col);
        }
        self.set(k, k, DbmBound::closed(Rational::zero()));
        Ok(())
    }

    /// Tightens the matrix with a single difference atom.
    pub fn intersect_atom(&mut self, atom: &AtomConstraint) -> Result<(), DbmError> {
        let i = self.index_of(atom.left())?;
        let j = self.index_of(atom.right())?;
        let candidate = if atom.is_closed() {
            DbmBound::closed(atom.bound().clone())
        } else {
            DbmBound::strict(atom.bound().clone())
        };
        if &candidate < self.bound(i, j) {
            self.set(i, j, candidate);
        }
        Ok(())
    }

    /// Tightens the matrix with every atom of a conjunction. The caller
    /// is expected to canonicalise before emptiness or inclusion checks.
    pub fn intersect(&mut self, guard: &Constraint) -> Result<(), DbmError> {
        for atom in guard.atoms() {
            if atom.bound() == &Rational::infinity() {
                continue;
            }
            self.intersect_atom(atom)?;
        }
        Ok(())
    }

    /// Floyd–Warshall tightening to canonical form. At equal path and
    /// direct values a strict path downgrades a closed direct bound.
    pub fn canonical(&mut self) {
        let size = self.size();
        for k in 0..size {
            for i in 0..size {
                if self.bound(i, k).is_unbounded() {
                    continue;
                }
                for j in 0..size {
                    if self.bound(k, j).is_unbounded() {
                        continue;
                    }
                    let path = self.bound(i, k).add(self.bound(k, j));
                    if &path < self.bound(i, j) {
                        self.set(i, j, path);
                    }
                }
            }
        }
    }

    /// Emptiness in canonical form: some diagonal entry is below `(≤ 0)`.
    pub fn is_empty(&self) -> bool {
        let zero = DbmBound::closed(Rational::zero());
        (0..self.size()).any(|i| self.bound(i, i) < &zero)
    }

    /// True iff every valuation of `other` also satisfies `self`,
    /// checked pointwise on the bounds. `self` should be canonical.
    pub fn includes(&self, other: &Dbm) -> Result<bool, DbmError> {
        if self.clocks != other.clocks {
            return Err(DbmError::ClockSetMismatch);
        }
        for idx in 0..self.bounds.len() {
            if other.bounds[idx] > self.bounds[idx] {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for Dbm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header: Vec<String> = self.clocks.iter().map(|c| c.to_string()).collect();
        writeln!(f, "      | {}", header.join("      "))?;
        for i in 0..self.size() {
            write!(f, "{:>5} |", self.clocks[i].to_string())?;
            for j in 0..self.size() {
                write!(f, " {}", self.bound(i, j))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Convenience: the canonical DBM for a conjunction over the non-negative
/// orthant, or `None` when the guard is the FALSE constant.
pub fn dbm_of_constraint(guard: &Constraint) -> Option<Dbm> {
    if guard.is_false() {
        return None;
    }
    let mut dbm = Dbm::initial(guard.clocks().iter());
    dbm.intersect(guard)
        .expect("a constraint's atoms range over its own clocks");
    dbm.canonical();
    Some(dbm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn two_clock_dbm() -> (Clock, Clock, Dbm) {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let dbm = Dbm::initial([&x, &y]);
        (x, y, dbm)
    }

    #[test]
    fn initial_dbm_is_nonempty_and_canonical() {
        let (_, _, mut dbm) = two_clock_dbm();
        assert!(!dbm.is_empty());
        let before = dbm.clone();
        dbm.canonical();
        assert_eq!(dbm, before);
    }

    #[test]
    fn canonicalisation_is_idempotent() {
        let (x, y, mut dbm) = two_clock_dbm();
        dbm.intersect_atom(&AtomConstraint::less_equal(&x, q(5, 2)).unwrap())
            .unwrap();
        dbm.intersect_atom(&AtomConstraint::diff_less_than(&x, &y, Rational::one()).unwrap())
            .unwrap();
        dbm.canonical();
        let once = dbm.clone();
        dbm.canonical();
        assert_eq!(dbm, once);
    }

    #[test]
    fn contradictory_bounds_empty_the_zone() {
        let (x, _, mut dbm) = two_clock_dbm();
        dbm.intersect_atom(&AtomConstraint::less_than(&x, Rational::one()).unwrap())
            .unwrap();
        dbm.intersect_atom(&AtomConstraint::greater_equal(&x, Rational::integer(2)).unwrap())
            .unwrap();
        dbm.canonical();
        assert!(dbm.is_empty());
    }

    #[test]
    fn strictness_alone_can_empty_the_zone() {
        let (x, _, mut dbm) = two_clock_dbm();
        dbm.intersect_atom(&AtomConstraint::less_than(&x, Rational::one()).unwrap())
            .unwrap();
        dbm.intersect_atom(&AtomConstraint::greater_equal(&x, Rational::one()).unwrap())
            .unwrap();
        dbm.canonical();
        assert!(dbm.is_empty());

        let (x2, _, mut closed) = two_clock_dbm();
        closed
            .intersect_atom(&AtomConstraint::less_equal(&x2, Rational::one()).unwrap())
            .unwrap();
        closed
            .intersect_atom(&AtomConstraint::greater_equal(&x2, Rational::one()).unwrap())
            .unwrap();
        closed.canonical();
        assert!(!closed.is_empty());
    }

    #[test]
    fn inclusion_is_pointwise() {
        let (x, _, mut narrow) = two_clock_dbm();
        let wide = narrow.clone();
        narrow
            .intersect_atom(&AtomConstraint::less_equal(&x, Rational::one()).unwrap())
            .unwrap();
        narrow.canonical();
        assert!(wide.includes(&narrow).unwrap());
        assert!(!narrow.includes(&wide).unwrap());
    }

    #[test]
    fn future_then_noop_reset_keeps_canonical_zone() {
        let (x, _, mut dbm) = two_clock_dbm();
        dbm.intersect_atom(&AtomConstraint::less_equal(&x, Rational::one()).unwrap())
            .unwrap();
        dbm.canonical();
        let mut elapsed = dbm.clone();
        elapsed.future();
        // After time elapse the upper bound on x is gone.
        assert!(elapsed.bound(1, 0).is_unbounded() || !elapsed.is_empty());
        assert!(elapsed.includes(&dbm).unwrap());
    }

    #[test]
    fn reset_pins_the_clock_to_zero() {
        let (x, y, mut dbm) = two_clock_dbm();
        dbm.future();
        dbm.intersect_atom(&AtomConstraint::greater_equal(&x, Rational::integer(3)).unwrap())
            .unwrap();
        dbm.canonical();
        dbm.reset(&x).unwrap();
        dbm.canonical();
        // x − x0 ≤ 0 and x0 − x ≤ 0 now hold.
        let i = dbm.index_of(&x).unwrap();
        assert_eq!(dbm.bound(i, 0), &DbmBound::closed(Rational::zero()));
        assert_eq!(dbm.bound(0, i), &DbmBound::closed(Rational::zero()));
        // y is unaffected below.
        let j = dbm.index_of(&y).unwrap();
        assert_eq!(dbm.bound(0, j), &DbmBound::closed(Rational::zero()));
    }

    #[test]
    fn unknown_clock_errors() {
        let (_, _, mut dbm) = two_clock_dbm();
        let stranger = Clock::new("z");
        assert!(matches!(
            dbm.reset(&stranger),
            Err(DbmError::UnknownClock(_))
        ));
    }
}
