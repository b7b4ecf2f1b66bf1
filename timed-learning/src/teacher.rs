//! The teacher interface and its automaton-backed implementation.

use std::cell::Cell;

use thiserror::Error;
use tracing::debug;

use timed_automata::constraint::DbmOracle;
use timed_automata::dta::Dta;
use timed_automata::word::DelayTimedWord;

/// An error reported by a teacher. Propagated verbatim to the learner's
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("teacher failure: {0}")]
pub struct TeacherError(pub String);

/// A minimally adequate teacher for timed languages: total deterministic
/// membership queries plus equivalence queries that either confirm a
/// hypothesis or produce a word in the symmetric difference.
pub trait Teacher {
    fn membership(&self, word: &DelayTimedWord) -> Result<bool, TeacherError>;

    fn equivalence(&self, hypothesis: &Dta) -> Result<Option<DelayTimedWord>, TeacherError>;
}

/// A teacher that oracle-knows a target automaton. Membership runs the
/// word on the target; equivalence goes through complement, product and
/// the zone-based witness search. Query counts are tracked for reporting.
#[derive(Debug)]
pub struct DtaTeacher {
    target: Dta,
    oracle: DbmOracle,
    membership_queries: Cell<u64>,
    equivalence_queries: Cell<u64>,
}

impl DtaTeacher {
    pub fn new(target: Dta) -> Self {
        Self {
            target,
            oracle: DbmOracle::new(),
            membership_queries: Cell::new(0),
            equivalence_queries: Cell::new(0),
        }
    }

    pub fn target(&self) -> &Dta {
        &self.target
    }

    pub fn membership_queries(&self) -> u64 {
        self.membership_queries.get()
    }

    pub fn equivalence_queries(&self) -> u64 {
        self.equivalence_queries.get()
    }
}

impl Teacher for DtaTeacher {
    fn membership(&self, word: &DelayTimedWord) -> Result<bool, TeacherError> {
        self.membership_queries.set(self.membership_queries.get() + 1);
        let mut runtime = self
            .target
            .runtime()
            .map_err(|e| TeacherError(e.to_string()))?;
        let outcome = runtime
            .execute_delay_timed(word)
            .map_err(|e| TeacherError(e.to_string()))?;
        Ok(outcome.accepted)
    }

    fn equivalence(&self, hypothesis: &Dta) -> Result<Option<DelayTimedWord>, TeacherError> {
        self.equivalence_queries
            .set(self.equivalence_queries.get() + 1);
        let witness = self
            .target
            .equivalence_witness(hypothesis, &self.oracle)
            .map_err(|e| TeacherError(e.to_string()))?;
        if let Some(word) = &witness {
            debug!(%word, "equivalence query produced a counter-example");
        }
        Ok(witness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timed_automata::constraint::{AtomConstraint, Constraint};
    use timed_automata::location::{Location, Transition};
    use timed_core::{math, Action, Alphabet, Clock, ClockConfiguration, Rational, ResetSet};

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    /// The one-clock automaton accepting `{(a, t) : t ≥ 1}`.
    fn one_clock_target() -> (Dta, Action) {
        let mut alphabet = Alphabet::new();
        let a = alphabet.create_action("a");
        let x = Clock::new("x");
        let clocks: math::OrderedSet<Clock> = [x.clone()].into_iter().collect();
        let config = ClockConfiguration::new([(x.clone(), 1)].into_iter().collect());
        let l0 = Location::fresh();
        let l1 = Location::fresh();
        let mut dta = Dta::new(alphabet, clocks.clone(), Some(l0.clone()), config);
        dta.add_accepting_location(l1.clone());
        let guard = Constraint::of(
            clocks,
            [AtomConstraint::greater_equal(&x, Rational::one()).unwrap()],
        )
        .unwrap();
        dta.add_transition(Transition::new(l0, a.clone(), guard, ResetSet::new(), l1))
            .unwrap();
        (dta, a)
    }

    #[test]
    fn membership_follows_the_target_language() {
        let (target, a) = one_clock_target();
        let teacher = DtaTeacher::new(target);
        let late = DelayTimedWord::new(vec![(a.clone(), q(2, 1))]);
        assert!(teacher.membership(&late).unwrap());
        let early = DelayTimedWord::new(vec![(a, q(1, 2))]);
        assert!(!teacher.membership(&early).unwrap());
        assert_eq!(teacher.membership_queries(), 2);
    }

    #[test]
    fn equivalence_of_the_target_with_itself_holds() {
        let (target, _) = one_clock_target();
        let clone = target.clone();
        let teacher = DtaTeacher::new(target);
        assert_eq!(teacher.equivalence(&clone).unwrap(), None);
        assert_eq!(teacher.equivalence_queries(), 1);
    }
}
