//! The deterministic timed automaton model: locations, transitions,
//! accepting set, clocks with their ceilings, and bidirectional indices.

use std::cell::Cell;

use thiserror::Error;
use tracing::debug;

use timed_core::{math, Action, Alphabet, Clock, ClockConfiguration, ClockValuation, Rational};

use crate::constraint::GuardError;
use crate::dbm::DbmError;
use crate::location::{Location, Transition};
use crate::word::WordError;

mod runtime;
pub use runtime::{DtaRuntime, RunOutcome, StepOutcome};

mod ops;
mod witness;

/// Errors raised by automaton construction and the language operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DtaError {
    #[error("transition references unknown location `{0}`")]
    UnknownLocation(String),
    #[error("transition references unknown action `{0}`")]
    UnknownAction(String),
    #[error("automaton has no initial location")]
    NoInitialLocation,
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Dbm(#[from] DbmError),
    #[error(transparent)]
    Word(#[from] WordError),
}

/// A (not necessarily complete) deterministic timed automaton.
#[derive(Debug, Clone)]
pub struct Dta {
    alphabet: Alphabet,
    clocks: math::OrderedSet<Clock>,
    config: ClockConfiguration,
    initial: Option<Location>,
    locations: math::Set<Location>,
    accepting: math::OrderedSet<Location>,
    transitions: Vec<Transition>,
    outgoing: math::Map<Location, Vec<Transition>>,
    incoming: math::Map<Location, Vec<Transition>>,
    by_action: math::Map<(Location, Action), Vec<Transition>>,
    // Lazily computed largest integer guard constant; cleared on mutation.
    max_constant: Cell<Option<i64>>,
}

impl Dta {
    pub fn new(
        alphabet: Alphabet,
        clocks: math::OrderedSet<Clock>,
        initial: Option<Location>,
        config: ClockConfiguration,
    ) -> Self {
        let mut dta = Self {
            alphabet,
            clocks,
            config,
            initial: None,
            locations: math::Set::default(),
            accepting: math::OrderedSet::new(),
            transitions: Vec::new(),
            outgoing: math::Map::default(),
            incoming: math::Map::default(),
            by_action: math::Map::default(),
            max_constant: Cell::new(None),
        };
        if let Some(initial) = initial {
            dta.set_initial(initial);
        }
        dta
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn clocks(&self) -> &math::OrderedSet<Clock> {
        &self.clocks
    }

    pub fn config(&self) -> &ClockConfiguration {
        &self.config
    }

    pub fn initial(&self) -> Option<&Location> {
        self.initial.as_ref()
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> + '_ {
        self.locations.iter()
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn accepting(&self) -> impl Iterator<Item = &Location> + '_ {
        self.accepting.iter()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn add_location(&mut self, location: Location) {
        if self.locations.insert(location.clone()) {
            self.outgoing.entry(location.clone()).or_default();
            self.incoming.entry(location).or_default();
        }
    }

    pub fn add_accepting_location(&mut self, location: Location) {
        self.add_location(location.clone());
        self.accepting.insert(location);
    }

    pub fn set_initial(&mut self, location: Location) {
        self.add_location(location.clone());
        self.initial = Some(location);
    }

    pub fn is_accepting(&self, location: &Location) -> bool {
        self.accepting.contains(location)
    }

    /// Registers a transition. Both endpoints must already be locations of
    /// this automaton and the action part of its alphabet.
    pub fn add_transition(&mut self, transition: Transition) -> Result<(), DtaError> {
        if !self.locations.contains(transition.source()) {
            return Err(DtaError::UnknownLocation(
                transition.source().label().to_string(),
            ));
        }
        if !self.locations.contains(transition.target()) {
            return Err(DtaError::UnknownLocation(
                transition.target().label().to_string(),
            ));
        }
        if !self.alphabet.contains(transition.action()) {
            return Err(DtaError::UnknownAction(
                transition.action().name().to_string(),
            ));
        }

        self.outgoing
            .entry(transition.source().clone())
            .or_default()
            .push(transition.clone());
        self.incoming
            .entry(transition.target().clone())
            .or_default()
            .push(transition.clone());
        self.by_action
            .entry((transition.source().clone(), transition.action().clone()))
            .or_default()
            .push(transition.clone());
        self.transitions.push(transition);
        self.max_constant.set(None);
        Ok(())
    }

    /// Returns the sink location, creating one if none exists yet.
    pub fn ensure_sink(&mut self) -> Location {
        if let Some(sink) = self.locations.iter().find(|l| l.is_sink()) {
            return sink.clone();
        }
        let sink = Location::sink();
        debug!(%sink, "adding sink location");
        self.add_location(sink.clone());
        sink
    }

    pub fn outgoing(&self, location: &Location) -> &[Transition] {
        self.outgoing
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn incoming(&self, location: &Location) -> &[Transition] {
        self.incoming
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn transitions_for(&self, location: &Location, action: &Action) -> &[Transition] {
        self.by_action
            .get(&(location.clone(), action.clone()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn successors(&self, location: &Location) -> math::Set<&Location> {
        self.outgoing(location).iter().map(Transition::target).collect()
    }

    pub fn predecessors(&self, location: &Location) -> math::Set<&Location> {
        self.incoming(location).iter().map(Transition::source).collect()
    }

    /// The transition enabled from `location` under `action` after letting
    /// `delay` elapse on `valuation`, if any.
    pub fn find_enabled_transition(
        &self,
        location: &Location,
        valuation: &ClockValuation,
        action: &Action,
        delay: &Rational,
    ) -> Result<Option<&Transition>, DtaError> {
        let delayed = valuation.delay(delay).map_err(WordError::from)?;
        for transition in self.transitions_for(location, action) {
            if transition.guard().is_satisfied(&delayed)? {
                return Ok(Some(transition));
            }
        }
        Ok(None)
    }

    /// The largest integer constant appearing in any guard, cached until
    /// the next mutation.
    pub fn max_constant(&self) -> i64 {
        if let Some(cached) = self.max_constant.get() {
            return cached;
        }
        let mut max = 0;
        for transition in &self.transitions {
            for atom in transition.guard().atoms() {
                if atom.bound().is_integer() {
                    if let Ok(value) = atom.bound().floor_int() {
                        max = max.max(value.abs());
                    }
                }
            }
        }
        self.max_constant.set(Some(max));
        max
    }

    pub fn runtime(&self) -> Result<DtaRuntime<'_>, DtaError> {
        DtaRuntime::new(self)
    }
}

impl std::fmt::Display for Dta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use itertools::Itertools;

        writeln!(f, "Alphabet: {}", self.alphabet)?;
        writeln!(f, "Clocks: [{}]", self.clocks.iter().join(", "))?;
        match &self.initial {
            Some(initial) => writeln!(f, "Initial: {initial}")?,
            None => writeln!(f, "Initial: (none)")?,
        }
        writeln!(f, "Accepting: [{}]", self.accepting.iter().join(", "))?;
        writeln!(f, "Locations: [{}]", self.locations.iter().join(", "))?;
        writeln!(f, "Transitions:")?;
        for transition in &self.transitions {
            writeln!(f, "  {transition}")?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testutil::one_clock_geq_one;
    use super::*;
    use crate::constraint::Constraint;
    use crate::location::Transition;
    use timed_core::ResetSet;

    #[test]
    fn indices_track_transitions() {
        let (dta, _, a) = one_clock_geq_one();
        let initial = dta.initial().unwrap().clone();
        assert_eq!(dta.outgoing(&initial).len(), 1);
        assert_eq!(dta.transitions_for(&initial, &a).len(), 1);
        let target = dta.outgoing(&initial)[0].target().clone();
        assert_eq!(dta.incoming(&target).len(), 1);
    }

    #[test]
    fn foreign_locations_are_rejected() {
        let (mut dta, _, a) = one_clock_geq_one();
        let foreign = Location::fresh();
        let guard = Constraint::top(dta.clocks().clone());
        let result = dta.add_transition(Transition::new(
            foreign,
            a,
            guard,
            ResetSet::new(),
            dta.initial().unwrap().clone(),
        ));
        assert!(matches!(result, Err(DtaError::UnknownLocation(_))));
    }

    #[test]
    fn max_constant_reflects_guards() {
        let (dta, _, _) = one_clock_geq_one();
        assert_eq!(dta.max_constant(), 1);
    }

    #[test]
    fn ensure_sink_is_idempotent() {
        let (mut dta, _, _) = one_clock_geq_one();
        let s1 = dta.ensure_sink();
        let s2 = dta.ensure_sink();
        assert_eq!(s1, s2);
        assert!(s1.is_sink());
    }
}
