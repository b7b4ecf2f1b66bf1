//! Concrete execution of timed words on an automaton.

use timed_core::{Action, ClockValuation, ResetSet};

use crate::location::{Location, Transition};
use crate::word::{
    DelayTimedWord, ResetClockTimedWord, ResetDelayTimedWord, ResetRegionTimedWord,
};

use super::{Dta, DtaError};

/// The result of a single step: either the taken transition with the
/// post-step state, or a rejection with its reason.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub transition: Option<Transition>,
    pub location: Location,
    pub valuation: ClockValuation,
    pub accepted: bool,
    pub reason: Option<String>,
}

impl StepOutcome {
    fn taken(transition: Transition, location: Location, valuation: ClockValuation) -> Self {
        Self {
            transition: Some(transition),
            location,
            valuation,
            accepted: true,
            reason: None,
        }
    }

    fn rejected(location: Location, valuation: ClockValuation, reason: &str) -> Self {
        Self {
            transition: None,
            location,
            valuation,
            accepted: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// The result of playing a whole word.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub steps: Vec<StepOutcome>,
    pub accepted: bool,
}

impl RunOutcome {
    pub fn first_reject_reason(&self) -> Option<&str> {
        self.steps
            .iter()
            .find(|s| !s.accepted)
            .and_then(|s| s.reason.as_deref())
    }
}

/// Drives a [`Dta`] along concrete words, maintaining the current
/// location and valuation. Supports snapshot push/pop of the state.
#[derive(Debug)]
pub struct DtaRuntime<'a> {
    dta: &'a Dta,
    location: Location,
    valuation: ClockValuation,
    history: Vec<(Location, ClockValuation)>,
}

impl<'a> DtaRuntime<'a> {
    pub fn new(dta: &'a Dta) -> Result<Self, DtaError> {
        let initial = dta.initial().cloned().ok_or(DtaError::NoInitialLocation)?;
        Ok(Self {
            dta,
            location: initial,
            valuation: ClockValuation::zero(dta.clocks().iter()),
            history: Vec::new(),
        })
    }

    /// Puts the runtime back at the initial location with all clocks 0.
    pub fn reset(&mut self) {
        self.location = self
            .dta
            .initial()
            .cloned()
            .expect("a constructed runtime has an initial location");
        self.valuation = ClockValuation::zero(self.dta.clocks().iter());
    }

    pub fn current_location(&self) -> &Location {
        &self.location
    }

    pub fn current_valuation(&self) -> &ClockValuation {
        &self.valuation
    }

    pub fn is_in_accepting_state(&self) -> bool {
        self.dta.is_accepting(&self.location)
    }

    pub fn save_snapshot(&mut self) {
        self.history.push((self.location.clone(), self.valuation.clone()));
    }

    pub fn restore_snapshot(&mut self) {
        if let Some((location, valuation)) = self.history.pop() {
            self.location = location;
            self.valuation = valuation;
        }
    }

    fn guard_holds(transition: &Transition, valuation: &ClockValuation) -> bool {
        transition
            .guard()
            .is_satisfied(valuation)
            .expect("transition guards range over the automaton's clocks")
    }

    /// One step with a fully delayed valuation and an expected reset set.
    /// Used by the reset-annotated word variants.
    fn step(
        &mut self,
        action: &Action,
        valuation: ClockValuation,
        expected_resets: &ResetSet,
    ) -> StepOutcome {
        let transitions = self.dta.transitions_for(&self.location, action);
        if transitions.is_empty() {
            return StepOutcome::rejected(self.location.clone(), valuation, "no such transition");
        }

        let satisfied: Vec<&Transition> = transitions
            .iter()
            .filter(|t| Self::guard_holds(t, &valuation))
            .collect();
        if satisfied.is_empty() {
            return StepOutcome::rejected(self.location.clone(), valuation, "no satisfied guard");
        }

        let Some(transition) = satisfied
            .iter()
            .find(|t| t.resets() == expected_resets)
            .copied()
        else {
            return StepOutcome::rejected(self.location.clone(), valuation, "reset mismatch");
        };

        self.valuation = valuation
            .reset(transition.resets())
            .expect("transition resets range over the automaton's clocks");
        self.location = transition.target().clone();
        StepOutcome::taken(transition.clone(), self.location.clone(), self.valuation.clone())
    }

    /// Plays a delay-timed word from the initial state. A step with no
    /// transition, no satisfied guard, or several satisfied guards (a
    /// determinism violation) rejects.
    pub fn execute_delay_timed(&mut self, word: &DelayTimedWord) -> Result<RunOutcome, DtaError> {
        self.reset();
        let mut steps = Vec::new();

        for (action, delay) in word.steps() {
            let delayed = self
                .valuation
                .delay(delay)
                .map_err(crate::word::WordError::from)?;

            let transitions = self.dta.transitions_for(&self.location, action);
            if transitions.is_empty() {
                steps.push(StepOutcome::rejected(
                    self.location.clone(),
                    delayed,
                    "no such transition",
                ));
                return Ok(RunOutcome {
                    steps,
                    accepted: false,
                });
            }

            let satisfied: Vec<&Transition> = transitions
                .iter()
                .filter(|t| Self::guard_holds(t, &delayed))
                .collect();
            if satisfied.is_empty() {
                steps.push(StepOutcome::rejected(
                    self.location.clone(),
                    delayed,
                    "no satisfied guard",
                ));
                return Ok(RunOutcome {
                    steps,
                    accepted: false,
                });
            }
            if satisfied.len() > 1 {
                steps.push(StepOutcome::rejected(
                    self.location.clone(),
                    delayed,
                    "several satisfied guards in a deterministic automaton",
                ));
                return Ok(RunOutcome {
                    steps,
                    accepted: false,
                });
            }

            let transition = satisfied[0];
            self.valuation = delayed
                .reset(transition.resets())
                .expect("transition resets range over the automaton's clocks");
            self.location = transition.target().clone();
            steps.push(StepOutcome::taken(
                transition.clone(),
                self.location.clone(),
                self.valuation.clone(),
            ));
        }

        let accepted = self.is_in_accepting_state();
        Ok(RunOutcome { steps, accepted })
    }

    /// Plays a reset-delay-timed word; the annotated resets must match
    /// the taken transitions.
    pub fn execute_reset_delay_timed(
        &mut self,
        word: &ResetDelayTimedWord,
    ) -> Result<RunOutcome, DtaError> {
        self.reset();
        let mut steps = Vec::new();
        let mut valuation = self.valuation.clone();

        for (action, delay, resets) in word.steps() {
            valuation = valuation
                .delay(delay)
                .map_err(crate::word::WordError::from)?;
            let outcome = self.step(action, valuation.clone(), resets);
            let ok = outcome.accepted;
            if ok {
                valuation = self.valuation.clone();
            }
            steps.push(outcome);
            if !ok {
                break;
            }
        }

        let accepted = steps.iter().all(|s| s.accepted) && self.is_in_accepting_state();
        Ok(RunOutcome { steps, accepted })
    }

    /// Plays a reset-clock-timed word; each step supplies the pre-reset
    /// valuation directly.
    pub fn execute_reset_clock_timed(
        &mut self,
        word: &ResetClockTimedWord,
    ) -> Result<RunOutcome, DtaError> {
        self.reset();
        let mut steps = Vec::new();

        for (action, valuation, resets) in word.steps() {
            let outcome = self.step(action, valuation.clone(), resets);
            let ok = outcome.accepted;
            steps.push(outcome);
            if !ok {
                break;
            }
        }

        let accepted = steps.iter().all(|s| s.accepted) && self.is_in_accepting_state();
        Ok(RunOutcome { steps, accepted })
    }

    /// Plays a reset-region-timed word on the canonical representative of
    /// each region.
    pub fn execute_reset_region_timed(
        &mut self,
        word: &ResetRegionTimedWord,
    ) -> Result<RunOutcome, DtaError> {
        self.reset();
        let mut steps = Vec::new();

        for (action, region, resets) in word.steps() {
            let representative = region.build_valuation();
            let outcome = self.step(action, representative, resets);
            let ok = outcome.accepted;
            steps.push(outcome);
            if !ok {
                break;
            }
        }

        let accepted = steps.iter().all(|s| s.accepted) && self.is_in_accepting_state();
        Ok(RunOutcome { steps, accepted })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::one_clock_geq_one;
    use super::*;
    use timed_core::Rational;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn accepts_late_and_rejects_early() {
        let (dta, _, a) = one_clock_geq_one();
        let mut runtime = dta.runtime().unwrap();

        let late = DelayTimedWord::new(vec![(a.clone(), q(2, 1))]);
        assert!(runtime.execute_delay_timed(&late).unwrap().accepted);

        let early = DelayTimedWord::new(vec![(a.clone(), q(1, 2))]);
        let outcome = runtime.execute_delay_timed(&early).unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.first_reject_reason(), Some("no satisfied guard"));
    }

    #[test]
    fn reset_mismatch_rejects() {
        let (dta, x, a) = one_clock_geq_one();
        let mut runtime = dta.runtime().unwrap();
        let v = ClockValuation::zero([&x]).delay(&q(2, 1)).unwrap();
        let wrong: ResetSet = [x.clone()].into_iter().collect();
        let word = ResetClockTimedWord::new(vec![(a, v, wrong)]);
        let outcome = runtime.execute_reset_clock_timed(&word).unwrap();
        assert!(!outcome.accepted);
        assert_eq!(outcome.first_reject_reason(), Some("reset mismatch"));
    }

    #[test]
    fn snapshots_restore_state() {
        let (dta, _, a) = one_clock_geq_one();
        let mut runtime = dta.runtime().unwrap();
        runtime.save_snapshot();
        let word = DelayTimedWord::new(vec![(a, q(2, 1))]);
        runtime.execute_delay_timed(&word).unwrap();
        assert!(runtime.is_in_accepting_state());
        runtime.restore_snapshot();
        assert!(!runtime.is_in_accepting_state());
    }

    #[test]
    fn region_words_run_on_canonical_representatives() {
        use crate::region::Region;
        use crate::word::ResetRegionTimedWord;

        let (dta, x, a) = one_clock_geq_one();
        let mut runtime = dta.runtime().unwrap();

        let late = ClockValuation::zero([&x]).delay(&q(1, 1)).unwrap();
        let region = Region::from_valuation(&late, dta.config()).unwrap();
        let word = ResetRegionTimedWord::new(vec![(a, region, ResetSet::new())]);
        assert!(runtime.execute_reset_region_timed(&word).unwrap().accepted);
    }

    #[test]
    fn empty_word_is_decided_by_the_initial_location() {
        let (dta, _, _) = one_clock_geq_one();
        let mut runtime = dta.runtime().unwrap();
        let outcome = runtime
            .execute_delay_timed(&DelayTimedWord::empty())
            .unwrap();
        assert!(!outcome.accepted);
    }
}
