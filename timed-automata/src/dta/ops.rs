//! Language-level operations on automata: completeness analysis,
//! completion via a sink, determinism analysis, complement and the
//! synchronised product.

use std::collections::VecDeque;

use tracing::{debug, warn};

use timed_core::{math, Action, Alphabet, Clock};

use crate::constraint::{Constraint, ConstraintOracle, DisjunctiveConstraint, Sat};
use crate::location::{Location, Transition};

use super::{Dta, DtaError};

impl Dta {
    /// True iff for every (non-sink location, action) pair the outgoing
    /// guards cover the whole non-negative orthant. An inconclusive
    /// oracle answer counts as incomplete.
    pub fn is_complete<O: ConstraintOracle>(&self, oracle: &O) -> bool {
        for location in self.locations() {
            if location.is_sink() {
                continue;
            }
            for action in self.alphabet().actions() {
                let uncovered = self.uncovered_region(location, action);
                match oracle.satisfiable_dnf(&uncovered) {
                    Sat::Unsat => {}
                    Sat::Sat => {
                        debug!(%location, %action, "uncovered region found");
                        return false;
                    }
                    Sat::Unknown => {
                        warn!(%location, %action, "oracle undecided; treating as incomplete");
                        return false;
                    }
                }
            }
        }
        true
    }

    /// The disjoint DNF of valuations not covered by any non-sink-bound
    /// guard of `(location, action)`.
    fn uncovered_region(&self, location: &Location, action: &Action) -> DisjunctiveConstraint {
        let mut covered = DisjunctiveConstraint::bottom(self.clocks().clone());
        for transition in self.transitions_for(location, action) {
            if transition.target().is_sink() {
                continue;
            }
            covered = covered
                .or_constraint(transition.guard())
                .expect("guards of one automaton share its clock set");
        }
        covered.negate_disjoint()
    }

    /// Completion to a complete automaton: adds a sink and, for every
    /// uncovered (location, action) region, a full-reset transition into
    /// it. Returns a copy when the automaton is already complete.
    pub fn to_cta<O: ConstraintOracle>(&self, oracle: &O) -> Result<Dta, DtaError> {
        if self.is_complete(oracle) {
            debug!("automaton is already complete");
            return Ok(self.clone());
        }

        let mut cta = self.clone();
        let sink = cta.ensure_sink();
        let all_clocks: timed_core::ResetSet = cta.clocks().iter().cloned().collect();

        let locations: Vec<Location> = cta.locations().cloned().collect();
        for location in locations {
            for action in self.alphabet().actions() {
                let transitions = cta.transitions_for(&location, action);

                if transitions.is_empty() {
                    let guard = Constraint::top(cta.clocks().clone());
                    let transition = Transition::new(
                        location.clone(),
                        action.clone(),
                        guard,
                        all_clocks.clone(),
                        sink.clone(),
                    );
                    debug!(%transition, "adding missing transition");
                    cta.add_transition(transition)?;
                    continue;
                }

                let uncovered = cta.uncovered_region(&location, action);
                if uncovered.is_false() {
                    continue;
                }

                let terms: Vec<Constraint> = uncovered.disjuncts().cloned().collect();
                for term in terms {
                    if !matches!(oracle.satisfiable(&term), Sat::Sat) {
                        continue;
                    }
                    let duplicate = cta
                        .transitions_for(&location, action)
                        .iter()
                        .any(|t| t.target().is_sink() && t.guard() == &term);
                    if duplicate {
                        continue;
                    }
                    let transition = Transition::new(
                        location.clone(),
                        action.clone(),
                        term,
                        all_clocks.clone(),
                        sink.clone(),
                    );
                    debug!(%transition, "covering residual region");
                    cta.add_transition(transition)?;
                }
            }
        }
        Ok(cta)
    }

    /// True iff no two distinct transitions of any (location, action)
    /// pair have jointly satisfiable guards. An inconclusive oracle
    /// answer counts as nondeterministic.
    pub fn is_deterministic<O: ConstraintOracle>(&self, oracle: &O) -> bool {
        for location in self.locations() {
            for action in self.alphabet().actions() {
                let transitions = self.transitions_for(location, action);
                for (i, first) in transitions.iter().enumerate() {
                    for second in transitions.iter().skip(i + 1) {
                        let overlap = first
                            .guard()
                            .and(second.guard())
                            .expect("guards of one automaton share its clock set");
                        if !matches!(oracle.satisfiable(&overlap), Sat::Unsat) {
                            debug!(%first, %second, "overlapping guards");
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// The complement automaton: completion, then flipped acceptance.
    pub fn complement<O: ConstraintOracle>(&self, oracle: &O) -> Result<Dta, DtaError> {
        let mut cta = self.to_cta(oracle)?;
        let flipped: Vec<Location> = cta
            .locations()
            .filter(|l| !cta.is_accepting(l))
            .cloned()
            .collect();
        cta.accepting.clear();
        for location in flipped {
            cta.accepting.insert(location);
        }
        Ok(cta)
    }

    /// The synchronised product recognising `L(self) ∩ L(other)`.
    ///
    /// Product states are explored on demand from the initial pair; joint
    /// guards are unions of atoms over the union clock set and pairs with
    /// unsatisfiable joints are dropped. The product configuration is the
    /// pointwise maximum of the two ceilings.
    pub fn intersect<O: ConstraintOracle>(
        &self,
        other: &Dta,
        oracle: &O,
    ) -> Result<Dta, DtaError> {
        let mut union_clocks: math::OrderedSet<Clock> = self.clocks().clone();
        union_clocks.extend(other.clocks().iter().cloned());
        let merged_config = self.config().merge(other.config());

        let shared_actions: Vec<Action> = self
            .alphabet()
            .actions()
            .filter(|a| other.alphabet().contains(a))
            .cloned()
            .collect();
        let product_alphabet =
            Alphabet::from_names(shared_actions.iter().map(|a| a.name().to_string()));

        let mut product = Dta::new(product_alphabet, union_clocks.clone(), None, merged_config);

        let self_initial = self.initial().ok_or(DtaError::NoInitialLocation)?;
        let other_initial = other.initial().ok_or(DtaError::NoInitialLocation)?;

        let mut pair_locations: math::Map<(Location, Location), Location> = math::Map::default();
        let mut worklist: VecDeque<(Location, Location)> = VecDeque::new();

        let initial_pair = (self_initial.clone(), other_initial.clone());
        let initial = Location::new(format!(
            "loc_{}_{}",
            self_initial.id(),
            other_initial.id()
        ));
        product.add_location(initial.clone());
        product.set_initial(initial.clone());
        if self.is_accepting(self_initial) && other.is_accepting(other_initial) {
            product.add_accepting_location(initial.clone());
        }
        pair_locations.insert(initial_pair.clone(), initial);
        worklist.push_back(initial_pair);

        while let Some((left, right)) = worklist.pop_front() {
            let source = pair_locations[&(left.clone(), right.clone())].clone();

            for action in &shared_actions {
                let product_action = product
                    .alphabet()
                    .lookup(action.name())
                    .expect("shared actions are part of the product alphabet")
                    .clone();

                for t1 in self.transitions_for(&left, action) {
                    for t2 in other.transitions_for(&right, action) {
                        let joint = if t1.guard().is_false() || t2.guard().is_false() {
                            Constraint::bottom(union_clocks.clone())
                        } else if t1.guard().is_true() && t2.guard().is_true() {
                            Constraint::top(union_clocks.clone())
                        } else {
                            Constraint::of(
                                union_clocks.clone(),
                                t1.guard()
                                    .atoms()
                                    .chain(t2.guard().atoms())
                                    .cloned(),
                            )?
                        };

                        if !matches!(oracle.satisfiable(&joint), Sat::Sat) {
                            continue;
                        }

                        let mut joint_resets = t1.resets().clone();
                        joint_resets.extend(t2.resets().iter().cloned());

                        let next_pair = (t1.target().clone(), t2.target().clone());
                        let target = match pair_locations.get(&next_pair).cloned() {
                            Some(existing) => existing,
                            None => {
                                let fresh = Location::new(format!(
                                    "loc_{}_{}",
                                    next_pair.0.id(),
                                    next_pair.1.id()
                                ));
                                product.add_location(fresh.clone());
                                if self.is_accepting(&next_pair.0)
                                    && other.is_accepting(&next_pair.1)
                                {
                                    product.add_accepting_location(fresh.clone());
                                }
                                pair_locations.insert(next_pair.clone(), fresh.clone());
                                worklist.push_back(next_pair);
                                fresh
                            }
                        };

                        product.add_transition(Transition::new(
                            source.clone(),
                            product_action.clone(),
                            joint,
                            joint_resets,
                            target,
                        ))?;
                    }
                }
            }
        }

        Ok(product)
    }
}
