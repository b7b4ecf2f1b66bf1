//! From a prepared table to a hypothesis automaton.
//!
//! Construction is two-staged: an intermediate automaton over abstract
//! one-step symbols (the observed reset-clocked steps), then guard
//! recovery through the partition function, which carves the observed
//! post-transition valuations into pairwise disjoint constraints.

use tracing::{debug, trace, warn};

use timed_automata::constraint::{AtomConstraint, Constraint, DisjunctiveConstraint};
use timed_automata::dta::Dta;
use timed_automata::location::{Location, Transition};
use timed_automata::region::Region;
use timed_core::{math, Action, ClockValuation, Rational, ResetSet};

use crate::learner::LearnError;

use super::{ObservationTable, Row};

/// An abstract input symbol: one observed reset-clocked step.
type OneStep = (Action, ClockValuation, ResetSet);

/// The intermediate automaton over abstract one-step symbols. States are
/// the distinct access-word rows.
#[derive(Debug)]
pub(crate) struct IntermediateDfa {
    pub classes: Vec<Row>,
    pub initial: usize,
    pub accepting: Vec<bool>,
    pub transitions: math::Map<(usize, OneStep), usize>,
}

impl ObservationTable {
    /// Groups the access words by row and connects the classes along the
    /// observed one-step extensions. Requires a closed table.
    pub(crate) fn intermediate_dfa(&self) -> Result<IntermediateDfa, LearnError> {
        let mut classes: Vec<Row> = Vec::new();
        let mut class_of: math::Map<Row, usize> = math::Map::default();
        let mut accepting: Vec<bool> = Vec::new();
        let mut initial = None;

        for word in &self.prefixes {
            let row = self
                .get_row(word)
                .ok_or_else(|| LearnError::MissingRow(word.to_string()))?;
            let class = match class_of.get(&row).copied() {
                Some(class) => class,
                None => {
                    let class = classes.len();
                    // The first suffix is ε, so the first entry answers
                    // the membership of the access word itself.
                    accepting.push(row.entries()[0].accepted);
                    classes.push(row.clone());
                    class_of.insert(row, class);
                    class
                }
            };
            if word.is_empty() {
                initial = Some(class);
            }
        }
        let initial = initial.ok_or_else(|| LearnError::MissingRow("ε".to_string()))?;

        let mut transitions: math::Map<(usize, OneStep), usize> = math::Map::default();
        for word in &self.prefixes {
            let source_row = self
                .get_row(word)
                .ok_or_else(|| LearnError::MissingRow(word.to_string()))?;
            let source = class_of[&source_row];

            for extension in self.prefixes.iter().chain(self.boundary.iter()) {
                if extension.len() != word.len() + 1 || !extension.has_prefix(word) {
                    continue;
                }
                let row = self
                    .get_row(extension)
                    .ok_or_else(|| LearnError::MissingRow(extension.to_string()))?;
                let Some(&target) = class_of.get(&row) else {
                    return Err(LearnError::NotClosed(extension.to_string()));
                };
                let symbol = extension
                    .last()
                    .cloned()
                    .expect("one-step extensions are non-empty");
                transitions.insert((source, symbol), target);
            }
        }

        debug!(
            states = classes.len(),
            transitions = transitions.len(),
            "intermediate automaton built"
        );
        Ok(IntermediateDfa {
            classes,
            initial,
            accepting,
            transitions,
        })
    }

    /// Builds the hypothesis automaton of a prepared table.
    pub fn build_hypothesis(&self) -> Result<Dta, LearnError> {
        let dfa = self.intermediate_dfa()?;
        self.realise(&dfa)
    }

    /// Copies the intermediate states and recovers concrete guards per
    /// (state, action) through the partition function.
    fn realise(&self, dfa: &IntermediateDfa) -> Result<Dta, LearnError> {
        let mut dta = Dta::new(
            self.alphabet.clone(),
            self.clocks.clone(),
            None,
            self.config.clone(),
        );
        let locations: Vec<Location> = (0..dfa.classes.len()).map(|_| Location::fresh()).collect();
        for (index, location) in locations.iter().enumerate() {
            dta.add_location(location.clone());
            if dfa.accepting[index] {
                dta.add_accepting_location(location.clone());
            }
        }
        dta.set_initial(locations[dfa.initial].clone());

        for source in 0..dfa.classes.len() {
            for action in self.alphabet.actions() {
                // Ψ: the observed post-delay valuations for this
                // (state, action), with their resets and targets.
                let mut psi: Vec<ClockValuation> = Vec::new();
                let mut info: math::OrderedMap<ClockValuation, (ResetSet, usize)> =
                    math::OrderedMap::new();
                for ((from, (symbol_action, valuation, resets)), target) in &dfa.transitions {
                    if *from != source || symbol_action != action {
                        continue;
                    }
                    if let Some((known_resets, known_target)) = info.get(valuation) {
                        if known_target != target || known_resets != resets {
                            warn!(%valuation, "conflicting abstract transitions for one valuation");
                        }
                        continue;
                    }
                    psi.push(valuation.clone());
                    info.insert(valuation.clone(), (resets.clone(), *target));
                }
                if psi.is_empty() {
                    continue;
                }

                let partition = self.partition_function(&psi)?;
                for valuation in &psi {
                    let Some((resets, target)) = info.get(valuation) else {
                        continue;
                    };
                    let Some(guards) = partition.get(valuation) else {
                        continue;
                    };
                    if guards.is_false() {
                        continue;
                    }
                    for guard in guards.disjuncts() {
                        if guard.is_false() {
                            continue;
                        }
                        dta.add_transition(Transition::new(
                            locations[source].clone(),
                            action.clone(),
                            guard.clone(),
                            resets.clone(),
                            locations[*target].clone(),
                        ))?;
                    }
                }
            }
        }
        Ok(dta)
    }

    /// The partition function: maps every observed valuation `vᵢ` to a
    /// constraint `Iᵢ`, pairwise disjoint over the non-negative orthant.
    ///
    /// `Aᵢ` is the region constraint of valuations beyond some ceiling
    /// (FALSE otherwise), `Uᵢ` the unit cube around `vᵢ`, and the `Wᵢ`
    /// carve the cubes out of each other back-to-front. A refinement loop
    /// separates valuations that share a cube but not a region by
    /// conjoining their fractional region constraints.
    pub fn partition_function(
        &self,
        valuations: &[ClockValuation],
    ) -> Result<math::OrderedMap<ClockValuation, DisjunctiveConstraint>, LearnError> {
        let mut result = math::OrderedMap::new();
        if valuations.is_empty() {
            return Ok(result);
        }

        let mut sorted: Vec<ClockValuation> = valuations.to_vec();
        sorted.sort();
        let n = sorted.len();
        let clocks = self.clocks.clone();
        let nonnegative = Constraint::top(clocks.clone());

        // A_i and their union U_0.
        let mut a_constraints: Vec<Constraint> = Vec::with_capacity(n);
        let mut u0 = DisjunctiveConstraint::bottom(clocks.clone());
        for valuation in &sorted {
            let mut exceeds = false;
            for clock in &clocks {
                let kappa = self.config.kappa(clock)?;
                if valuation.value(clock)? > &Rational::integer(kappa) {
                    exceeds = true;
                    break;
                }
            }
            let ai = if exceeds {
                Region::from_valuation(valuation, &self.config)?.to_constraint(false)
            } else {
                Constraint::bottom(clocks.clone())
            };
            u0 = u0.or_constraint(&ai)?;
            a_constraints.push(ai);
        }
        trace!(%u0, "saturated-region union");

        // U_i: the open or closed unit cube around v_i.
        let mut u_constraints: Vec<Constraint> = Vec::with_capacity(n);
        for valuation in &sorted {
            let mut cube = Constraint::top(clocks.clone());
            for clock in &clocks {
                let value = valuation.value(clock)?.clone();
                let atom = if value.is_integer() {
                    AtomConstraint::greater_equal(clock, value)?
                } else {
                    let floor = value
                        .floor_int()
                        .expect("clock valuations only hold finite values");
                    AtomConstraint::greater_than(clock, Rational::integer(floor))?
                };
                cube = cube.and_atom(atom)?;
            }
            u_constraints.push(cube);
        }

        // W_i = ¬(U_0 ∨ W_{i+1} ∨ … ∨ W_n) ∧ U_i, back to front.
        let mut w_constraints: Vec<Option<DisjunctiveConstraint>> = vec![None; n];
        let mut accumulated = u0;
        for i in (0..n).rev() {
            let negated = accumulated.negate();
            let wi = negated.and_constraint(&u_constraints[i])?;
            accumulated = accumulated.or(&wi)?;
            w_constraints[i] = Some(wi);
        }

        // I_i = (W_i ∨ A_i) ∧ non-negative.
        let mut i_constraints: Vec<DisjunctiveConstraint> = Vec::with_capacity(n);
        for i in 0..n {
            let wi = w_constraints[i]
                .clone()
                .expect("every W constraint was filled above");
            let joined = wi.or_constraint(&a_constraints[i])?;
            i_constraints.push(joined.and_constraint(&nonnegative)?);
        }

        // Refinement: separate valuations sharing a cube but not a region.
        let regions: Vec<Region> = sorted
            .iter()
            .map(|v| Region::from_valuation(v, &self.config))
            .collect::<Result<_, _>>()?;
        let mut changed = true;
        while changed {
            changed = false;
            for i in 0..n {
                for j in (i + 1)..n {
                    if a_constraints[i].is_false() || a_constraints[j].is_false() {
                        continue;
                    }
                    if u_constraints[i] != u_constraints[j] {
                        continue;
                    }
                    if regions[i] == regions[j] {
                        continue;
                    }
                    if i_constraints[i] != i_constraints[j] {
                        continue;
                    }
                    trace!(i, j, "refining coinciding partitions");
                    let refined_i =
                        i_constraints[i].and_constraint(&regions[i].to_constraint(true))?;
                    i_constraints[i] = refined_i;
                    let refined_j =
                        i_constraints[j].and_constraint(&regions[j].to_constraint(true))?;
                    i_constraints[j] = refined_j;
                    changed = true;
                }
            }
        }

        for (i, valuation) in sorted.iter().enumerate() {
            result.insert(valuation.clone(), i_constraints[i].simplify());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timed_core::{Alphabet, Clock, ClockConfiguration, ClockValuation, Rational};

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn table_with_one_clock(kappa: i64) -> (ObservationTable, Clock) {
        let alphabet = Alphabet::from_names(["a"]);
        let x = Clock::new("x");
        let config = ClockConfiguration::new([(x.clone(), kappa)].into_iter().collect());
        (ObservationTable::new(alphabet, config), x)
    }

    #[test]
    fn partition_of_a_single_valuation_covers_its_cube() {
        let (table, x) = table_with_one_clock(1);
        let v = ClockValuation::zero([&x]).delay(&Rational::zero()).unwrap();
        let partition = table.partition_function(std::slice::from_ref(&v)).unwrap();
        let guard = partition.get(&v).unwrap();
        assert!(guard.is_satisfied(&v).unwrap());
        // The whole cube x ≥ 0 belongs to the only valuation.
        let later = ClockValuation::zero([&x]).delay(&q(1, 2)).unwrap();
        assert!(guard.is_satisfied(&later).unwrap());
    }

    #[test]
    fn partitions_are_pairwise_disjoint() {
        let (table, x) = table_with_one_clock(1);
        let v0 = ClockValuation::zero([&x]);
        let v1 = v0.delay(&q(1, 2)).unwrap();
        let v2 = v0.delay(&q(2, 1)).unwrap();
        let valuations = vec![v0.clone(), v1.clone(), v2.clone()];
        let partition = table.partition_function(&valuations).unwrap();

        // Every observed valuation is covered by its own block.
        for v in &valuations {
            assert!(partition.get(v).unwrap().is_satisfied(v).unwrap(), "{v}");
        }
        // Blocks are pairwise disjoint on a sample grid.
        for num in 0..12 {
            let sample = ClockValuation::zero([&x]).delay(&q(num, 4)).unwrap();
            let hits = valuations
                .iter()
                .filter(|v| partition.get(v).unwrap().is_satisfied(&sample).unwrap())
                .count();
            assert!(hits <= 1, "sample {sample} hit {hits} blocks");
        }
    }

    #[test]
    fn saturated_valuations_claim_the_region_beyond_kappa() {
        let (table, x) = table_with_one_clock(1);
        let beyond = ClockValuation::zero([&x]).delay(&q(5, 2)).unwrap();
        let partition = table
            .partition_function(std::slice::from_ref(&beyond))
            .unwrap();
        let guard = partition.get(&beyond).unwrap();
        let far = ClockValuation::zero([&x]).delay(&q(100, 1)).unwrap();
        assert!(guard.is_satisfied(&far).unwrap());
    }
}
