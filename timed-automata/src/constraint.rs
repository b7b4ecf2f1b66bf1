//! The symbolic guard algebra: atomic difference constraints, their
//! conjunctions, and disjunctive normal forms over a fixed clock set.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use timed_core::ValuationError;

mod atom;
pub use atom::{AtomConstraint, TrivialNegation};

mod conjunction;
pub use conjunction::Constraint;

mod disjunction;
pub use disjunction::DisjunctiveConstraint;

mod oracle;
pub use oracle::{ConstraintOracle, DbmOracle, Sat};

/// Errors raised by guard construction and the boolean operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("operands are defined over different clock sets")]
    ClockSetMismatch,
    #[error("atom `{0}` is self-contradictory")]
    ContradictoryAtom(String),
    #[error("atom `{atom}` mentions clock `{clock}` outside the constraint's clock set")]
    ForeignClock { atom: String, clock: String },
    #[error(transparent)]
    Valuation(#[from] ValuationError),
}

/// The cached outcome of a validity/satisfiability check on a symbolic
/// formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityStatus {
    /// The formula holds for every non-negative valuation.
    True,
    /// The formula is unsatisfiable.
    False,
    /// The formula is satisfiable but not known to be valid.
    SatisfiableUnknown,
    /// No decision procedure has looked at the formula yet.
    NotChecked,
}

/// The lazily filled validity cache attached to every [`Constraint`] and
/// [`DisjunctiveConstraint`].
///
/// Clones share the cell, so a status established through one handle is
/// visible through all of them. Readers and writers synchronise on a
/// per-value mutex; the decision procedure computes under that lock after
/// re-checking (double-checked locking).
#[derive(Debug, Clone)]
pub struct ValidityCache(Arc<Mutex<ValidityStatus>>);

impl Default for ValidityCache {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(ValidityStatus::NotChecked)))
    }
}

impl ValidityCache {
    pub fn get(&self) -> ValidityStatus {
        *self.0.lock().expect("validity cache mutex poisoned")
    }

    pub fn set(&self, status: ValidityStatus) {
        *self.0.lock().expect("validity cache mutex poisoned") = status;
    }

    /// Runs `compute` under the cache lock unless a previous call already
    /// produced a decisive status accepted by `reuse`.
    pub fn get_or_compute<F, R>(&self, reuse: R, compute: F) -> ValidityStatus
    where
        F: FnOnce() -> ValidityStatus,
        R: Fn(ValidityStatus) -> bool,
    {
        let mut guard = self.0.lock().expect("validity cache mutex poisoned");
        if reuse(*guard) {
            return *guard;
        }
        let status = compute();
        if status != ValidityStatus::NotChecked {
            *guard = status;
        }
        status
    }
}
