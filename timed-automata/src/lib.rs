//! Symbolic machinery for deterministic timed automata: the guard algebra
//! (atomic difference constraints, conjunctions, DNF), the region
//! abstraction, difference bound matrices, timed words in their six
//! flavours, and the DTA model together with its language-level
//! operations (completion, complement, product, emptiness witness).

pub mod word;

pub mod constraint;
pub use constraint::{
    AtomConstraint, Constraint, ConstraintOracle, DbmOracle, DisjunctiveConstraint, GuardError,
    Sat, TrivialNegation, ValidityStatus,
};

pub mod dbm;
pub use dbm::{Dbm, DbmError};

pub mod region;
pub use region::{solver, Region};

pub mod location;
pub use location::{Location, Transition};

pub mod dta;
pub use dta::{Dta, DtaError, DtaRuntime, RunOutcome, StepOutcome};

pub mod serialize;

/// The prelude re-exports the whole symbolic toolbox; downstream crates
/// normally just `use timed_automata::prelude::*;`.
pub mod prelude {
    pub use timed_core::prelude::*;

    pub use crate::constraint::{
        AtomConstraint, Constraint, ConstraintOracle, DbmOracle, DisjunctiveConstraint,
        GuardError, Sat, TrivialNegation, ValidityStatus,
    };
    pub use crate::dbm::{Dbm, DbmError};
    pub use crate::dta::{Dta, DtaError, DtaRuntime, RunOutcome, StepOutcome};
    pub use crate::location::{Location, Transition};
    pub use crate::region::{solver, Region};
    pub use crate::word::{
        ClockTimedWord, DelayTimedWord, RegionTimedWord, ResetClockTimedWord, ResetDelayTimedWord,
        ResetRegionTimedWord, WordError,
    };
}
