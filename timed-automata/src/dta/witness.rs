//! Zone-based emptiness witness search and language equivalence.

use std::collections::VecDeque;

use tracing::{debug, trace};

use timed_core::{math, ClockValuation};

use crate::constraint::ConstraintOracle;
use crate::dbm::Dbm;
use crate::location::{Location, Transition};
use crate::region::solver;
use crate::word::DelayTimedWord;

use super::{Dta, DtaError};

impl Dta {
    /// Searches for a concrete word in the automaton's language.
    ///
    /// Best-first exploration over symbolic states `(location, zone)`,
    /// pruned by zone inclusion per location. On reaching an accepting
    /// location the transition path is replayed forward with concrete
    /// delays from the delay solver.
    pub fn find_witness(&self) -> Result<Option<DelayTimedWord>, DtaError> {
        let initial_location = self.initial().ok_or(DtaError::NoInitialLocation)?.clone();
        let initial_zone = Dbm::initial(self.clocks().iter());

        if self.is_accepting(&initial_location) && !initial_zone.is_empty() {
            return Ok(Some(DelayTimedWord::empty()));
        }

        type State = (Location, Dbm);
        let mut predecessors: math::Map<State, (State, Transition)> = math::Map::default();
        let mut passed: math::Map<Location, Vec<Dbm>> = math::Map::default();
        let mut worklist: VecDeque<State> = VecDeque::new();

        passed
            .entry(initial_location.clone())
            .or_default()
            .push(initial_zone.clone());
        worklist.push_back((initial_location, initial_zone));

        while let Some((location, zone)) = worklist.pop_front() {
            trace!(%location, "expanding symbolic state");
            for transition in self.outgoing(&location) {
                let mut next = zone.clone();
                next.future();
                next.intersect(transition.guard())?;
                next.canonical();
                if next.is_empty() {
                    continue;
                }
                for clock in transition.resets() {
                    next.reset(clock)?;
                }
                next.future();
                if next.is_empty() {
                    continue;
                }

                let target = transition.target().clone();
                let seen = passed.entry(target.clone()).or_default();
                if seen
                    .iter()
                    .any(|old| old.includes(&next).unwrap_or(false))
                {
                    continue;
                }
                // Keep the passed list an antichain: drop zones the new
                // one subsumes.
                seen.retain(|old| !next.includes(old).unwrap_or(false));
                seen.push(next.clone());

                let state = (target.clone(), next);
                predecessors.insert(
                    state.clone(),
                    ((location.clone(), zone.clone()), transition.clone()),
                );

                if self.is_accepting(&target) {
                    debug!(%target, "reached accepting location");
                    return Ok(Some(self.replay(&predecessors, state)?));
                }
                worklist.push_back(state);
            }
        }

        Ok(None)
    }

    /// Reconstructs the transition path into `last` and replays it with
    /// concrete delays.
    fn replay(
        &self,
        predecessors: &math::Map<(Location, Dbm), ((Location, Dbm), Transition)>,
        last: (Location, Dbm),
    ) -> Result<DelayTimedWord, DtaError> {
        let mut path = Vec::new();
        let mut state = last;
        while let Some((previous, transition)) = predecessors.get(&state) {
            path.push(transition.clone());
            state = previous.clone();
        }
        path.reverse();

        let mut valuation = ClockValuation::zero(self.clocks().iter());
        let mut steps = Vec::with_capacity(path.len());
        for transition in &path {
            let delay = solver::solve_delay(&valuation, transition.guard())
                .expect("zone reachability guarantees a feasible delay along the path");
            steps.push((transition.action().clone(), delay.clone()));
            valuation = valuation
                .delay(&delay)
                .expect("solved delays are non-negative")
                .reset(transition.resets())
                .expect("transition resets range over the automaton's clocks");
        }
        Ok(DelayTimedWord::new(steps))
    }

    /// Language equivalence with a counter-example: returns a word in the
    /// symmetric difference `L(self) Δ L(other)` or `None` when the two
    /// automata are equivalent.
    pub fn equivalence_witness<O: ConstraintOracle>(
        &self,
        other: &Dta,
        oracle: &O,
    ) -> Result<Option<DelayTimedWord>, DtaError> {
        let other_complement = other.complement(oracle)?;
        let in_self_not_other = self.intersect(&other_complement, oracle)?;
        if let Some(witness) = in_self_not_other.find_witness()? {
            return Ok(Some(witness));
        }

        let self_complement = self.complement(oracle)?;
        let in_other_not_self = other.intersect(&self_complement, oracle)?;
        in_other_not_self.find_witness()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::one_clock_geq_one;
    use super::*;
    use crate::constraint::{AtomConstraint, Constraint, DbmOracle};
    use timed_core::{Alphabet, Clock, ClockConfiguration, Rational, ResetSet};

    #[test]
    fn witness_exists_and_is_accepted() {
        let (dta, _, _) = one_clock_geq_one();
        let witness = dta.find_witness().unwrap().expect("language is non-empty");
        assert!(witness.total_delay() >= Rational::one());
        let mut runtime = dta.runtime().unwrap();
        assert!(runtime.execute_delay_timed(&witness).unwrap().accepted);
    }

    #[test]
    fn empty_language_has_no_witness() {
        let mut alphabet = Alphabet::new();
        let a = alphabet.create_action("a");
        let x = Clock::new("x");
        let clocks: timed_core::math::OrderedSet<Clock> = [x.clone()].into_iter().collect();
        let config = ClockConfiguration::new([(x.clone(), 1)].into_iter().collect());
        let l0 = crate::location::Location::fresh();
        let l1 = crate::location::Location::fresh();
        let mut dta = Dta::new(alphabet, clocks.clone(), Some(l0.clone()), config);
        dta.add_accepting_location(l1.clone());
        // Contradictory interval: x >= 2 and x < 1.
        let guard = Constraint::of(
            clocks,
            [
                AtomConstraint::greater_equal(&x, Rational::integer(2)).unwrap(),
                AtomConstraint::less_than(&x, Rational::one()).unwrap(),
            ],
        )
        .unwrap();
        dta.add_transition(crate::location::Transition::new(
            l0,
            a,
            guard,
            ResetSet::new(),
            l1,
        ))
        .unwrap();
        assert_eq!(dta.find_witness().unwrap(), None);
    }

    #[test]
    fn equivalent_automata_have_no_separating_word() {
        let (dta, _, _) = one_clock_geq_one();
        let oracle = DbmOracle::new();
        assert_eq!(dta.equivalence_witness(&dta, &oracle).unwrap(), None);
    }

    #[test]
    fn complement_separates_from_the_original() {
        let (dta, _, _) = one_clock_geq_one();
        let oracle = DbmOracle::new();
        let complement = dta.complement(&oracle).unwrap();
        let witness = dta
            .equivalence_witness(&complement, &oracle)
            .unwrap()
            .expect("an automaton differs from its complement");
        // The word must be accepted by exactly one of the two.
        let accepted_by_original = {
            let renamed = rename_into(&witness, &dta);
            dta.runtime()
                .unwrap()
                .execute_delay_timed(&renamed)
                .unwrap()
                .accepted
        };
        let accepted_by_complement = {
            let renamed = rename_into(&witness, &complement);
            complement
                .runtime()
                .unwrap()
                .execute_delay_timed(&renamed)
                .unwrap()
                .accepted
        };
        assert_ne!(accepted_by_original, accepted_by_complement);
    }

    /// Rebinds the word's actions to the target automaton's alphabet
    /// (product alphabets allocate fresh `Action` values with the same
    /// names).
    fn rename_into(word: &DelayTimedWord, dta: &Dta) -> DelayTimedWord {
        DelayTimedWord::new(
            word.steps()
                .iter()
                .map(|(action, delay)| {
                    (
                        dta.alphabet()
                            .lookup(action.name())
                            .expect("shared alphabet")
                            .clone(),
                        delay.clone(),
                    )
                })
                .collect(),
        )
    }
}
