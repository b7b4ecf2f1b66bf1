//! Leaf primitives for the timed-automata workspace: exact rational
//! arithmetic with infinities, identity-typed entities (clocks, actions,
//! locations live further up), clock valuations and the shared collection
//! aliases used across the other crates.

pub mod math;

mod id;
pub use id::IdGenerator;

pub mod rational;
pub use rational::{Rational, RationalError};

pub mod clock;
pub use clock::{zero_clock, Clock, ClockConfiguration, ClockError};

pub mod alphabet;
pub use alphabet::{Action, Alphabet};

pub mod valuation;
pub use valuation::{ClockValuation, ValuationError};

/// A set of clocks reset by a transition or a word step. Kept ordered so
/// that words and table rows hash deterministically.
pub type ResetSet = std::collections::BTreeSet<Clock>;

/// The prelude re-exports everything a consumer of the core crate usually
/// needs, so that `use timed_core::prelude::*;` suffices.
pub mod prelude {
    pub use super::math;
    pub use super::{
        zero_clock, Action, Alphabet, Clock, ClockConfiguration, ClockError, ClockValuation,
        IdGenerator, Rational, RationalError, ResetSet, ValuationError,
    };
}
