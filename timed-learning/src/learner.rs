//! The priority-queue-driven learner loop.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info, trace};

use timed_automata::constraint::GuardError;
use timed_automata::dta::{Dta, DtaError};
use timed_automata::word::{ResetClockTimedWord, WordError};
use timed_core::{math, Action, Alphabet, Clock, ClockConfiguration, ClockValuation, ValuationError};
use timed_core::ClockError;

use crate::table::ObservationTable;
use crate::teacher::{Teacher, TeacherError};

/// Errors surfaced by the learner and the table machinery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LearnError {
    #[error("table row for `{0}` is missing entries")]
    MissingRow(String),
    #[error("table is not closed: no access row matches `{0}`")]
    NotClosed(String),
    #[error("counter-examples must be non-empty")]
    EmptyCounterexample,
    #[error("exhausted the table budget after {explored} candidates (most frequent dead end: {dominant:?})")]
    Exhausted {
        explored: usize,
        dominant: Option<String>,
    },
    #[error(transparent)]
    Teacher(#[from] TeacherError),
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Word(#[from] WordError),
    #[error(transparent)]
    Dta(#[from] DtaError),
    #[error(transparent)]
    Valuation(#[from] ValuationError),
    #[error(transparent)]
    Clock(#[from] ClockError),
}

const DEFAULT_TABLE_BUDGET: usize = if cfg!(debug_assertions) { 20_000 } else { 200_000 };

/// A queued candidate table, ordered by cumulative guess count with a
/// monotonic sequence number as the tie-breaker.
struct Candidate {
    guesses: u64,
    seq: u64,
    table: ObservationTable,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.guesses == other.guesses && self.seq == other.seq
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.guesses
            .cmp(&other.guesses)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Creates a configuration over fresh clocks mirroring `config`, one per
/// original clock with the same name and ceiling. The learner works on
/// its own clock universe, separate from the target's.
pub fn mirrored_configuration(config: &ClockConfiguration) -> ClockConfiguration {
    let kappas: math::OrderedMap<Clock, i64> = config
        .clocks()
        .map(|clock| {
            (
                Clock::new(clock.name()),
                config
                    .kappa(clock)
                    .expect("configurations cover their own clocks"),
            )
        })
        .collect();
    ClockConfiguration::new(kappas)
}

/// The best-first learner: repairs candidate tables by guess-branching,
/// builds hypotheses from prepared ones, and refines with the teacher's
/// counter-examples until a hypothesis passes the equivalence query.
pub struct Learner<'a, T: Teacher> {
    alphabet: Alphabet,
    config: ClockConfiguration,
    teacher: &'a T,
    table_budget: usize,
}

impl<'a, T: Teacher> Learner<'a, T> {
    pub fn new(alphabet: Alphabet, config: ClockConfiguration, teacher: &'a T) -> Self {
        Self {
            alphabet,
            config,
            teacher,
            table_budget: DEFAULT_TABLE_BUDGET,
        }
    }

    /// Caps the number of candidate tables the learner may pop before it
    /// gives up with [`LearnError::Exhausted`].
    pub fn with_table_budget(mut self, budget: usize) -> Self {
        self.table_budget = budget;
        self
    }

    /// Seeds the queue with every cartesian product of initial reset
    /// guesses: one boundary word `(a, 0⃗, B)` per action.
    fn initial_tables(&self) -> Result<Vec<ObservationTable>, LearnError> {
        let base = ObservationTable::new(self.alphabet.clone(), self.config.clone());
        let actions: Vec<Action> = self.alphabet.actions().cloned().collect();
        let options = base.all_reset_subsets();
        let combinations: Vec<Vec<_>> = if actions.is_empty() {
            vec![Vec::new()]
        } else {
            (0..actions.len())
                .map(|_| options.clone().into_iter())
                .multi_cartesian_product()
                .collect()
        };

        let mut tables = Vec::new();
        for combination in combinations {
            let mut table = base.clone();
            let zero = ClockValuation::zero(table.clocks().iter());
            for (action, resets) in actions.iter().zip(combination) {
                table.boundary.insert(ResetClockTimedWord::new(vec![(
                    action.clone(),
                    zero.clone(),
                    resets,
                )]));
            }
            tables.extend(table.fill_table(self.teacher)?);
        }
        Ok(tables)
    }

    /// Runs the loop to convergence or exhaustion.
    pub fn learn(&self) -> Result<Dta, LearnError> {
        let start = std::time::Instant::now();
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut seq = 0u64;
        let mut dead_ends: math::Map<&'static str, usize> = math::Map::default();

        let mut push = |heap: &mut BinaryHeap<Reverse<Candidate>>, table: ObservationTable| {
            seq += 1;
            heap.push(Reverse(Candidate {
                guesses: table.guess_count(),
                seq,
                table,
            }));
        };

        for table in self.initial_tables()? {
            push(&mut heap, table);
        }
        info!(candidates = heap.len(), "learner initialised");

        let mut popped = 0usize;
        let exhausted = |popped: usize, dead_ends: &math::Map<&'static str, usize>| {
            let dominant = dead_ends
                .iter()
                .max_by_key(|(_, count)| **count)
                .map(|(kind, _)| kind.to_string());
            LearnError::Exhausted {
                explored: popped,
                dominant,
            }
        };

        'explore: while let Some(Reverse(candidate)) = heap.pop() {
            popped += 1;
            if popped > self.table_budget {
                return Err(exhausted(popped, &dead_ends));
            }
            let mut table = candidate.table;
            trace!(
                guesses = table.guess_count(),
                remaining = heap.len(),
                "examining candidate table"
            );

            if !table.is_closed() {
                let successors = table.guess_closing(self.teacher)?;
                if successors.is_empty() {
                    *dead_ends.entry("closing").or_insert(0) += 1;
                }
                for successor in successors {
                    push(&mut heap, successor);
                }
                continue 'explore;
            }

            if !table.is_consistent() {
                let successors = table.guess_consistency(self.teacher)?;
                if successors.is_empty() {
                    *dead_ends.entry("consistency").or_insert(0) += 1;
                }
                for successor in successors {
                    push(&mut heap, successor);
                }
                continue 'explore;
            }

            debug_assert!(table.is_evidence_closed());

            let hypothesis = table.build_hypothesis()?;
            debug!(states = hypothesis.location_count(), "hypothesis built");

            match self.teacher.equivalence(&hypothesis)? {
                None => {
                    info!(
                        explored = popped,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "hypothesis confirmed"
                    );
                    return Ok(hypothesis);
                }
                Some(counterexample) => {
                    debug!(%counterexample, "refining with counter-example");
                    let successors = table.process_counterexample(&counterexample, self.teacher)?;
                    if successors.is_empty() {
                        *dead_ends.entry("counterexample").or_insert(0) += 1;
                    }
                    for successor in successors {
                        push(&mut heap, successor);
                    }
                }
            }
        }

        Err(exhausted(popped, &dead_ends))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teacher::DtaTeacher;
    use timed_automata::constraint::{AtomConstraint, Constraint, DbmOracle};
    use timed_automata::location::{Location, Transition};
    use timed_automata::word::DelayTimedWord;
    use timed_core::{Rational, ResetSet};

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    /// The one-clock target `{(a, t) : t ≥ 1}`.
    fn one_clock_target() -> Dta {
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
        dta.add_transition(Transition::new(l0, a, guard, ResetSet::new(), l1))
            .unwrap();
        dta
    }

    /// Accepts exactly `(a, t₁)(a, t₂)` with `t₂ ≥ 1`, with the clock
    /// reset on the first step.
    fn reset_target() -> Dta {
        let mut alphabet = Alphabet::new();
        let a = alphabet.create_action("a");
        let x = Clock::new("x");
        let clocks: math::OrderedSet<Clock> = [x.clone()].into_iter().collect();
        let config = ClockConfiguration::new([(x.clone(), 1)].into_iter().collect());
        let l0 = Location::fresh();
        let l1 = Location::fresh();
        let l2 = Location::fresh();
        let mut dta = Dta::new(alphabet, clocks.clone(), Some(l0.clone()), config);
        dta.add_location(l1.clone());
        dta.add_accepting_location(l2.clone());
        let reset_all: ResetSet = [x.clone()].into_iter().collect();
        dta.add_transition(Transition::new(
            l0,
            a.clone(),
            Constraint::top(clocks.clone()),
            reset_all,
            l1.clone(),
        ))
        .unwrap();
        let second = Constraint::of(
            clocks,
            [AtomConstraint::greater_equal(&x, Rational::one()).unwrap()],
        )
        .unwrap();
        dta.add_transition(Transition::new(l1, a, second, ResetSet::new(), l2))
            .unwrap();
        dta
    }

    #[test]
    fn learns_the_one_clock_lower_bound() {
        let target = one_clock_target();
        let teacher = DtaTeacher::new(target);
        let config = mirrored_configuration(teacher.target().config());
        let learner = Learner::new(teacher.target().alphabet().clone(), config, &teacher);

        let hypothesis = learner.learn().expect("the target is learnable");
        let oracle = DbmOracle::new();
        assert_eq!(
            teacher
                .target()
                .equivalence_witness(&hypothesis, &oracle)
                .unwrap(),
            None
        );
        assert!(teacher.membership_queries() > 0);
        assert!(teacher.equivalence_queries() > 0);
    }

    #[test]
    fn learned_hypothesis_answers_like_the_target() {
        let target = one_clock_target();
        let teacher = DtaTeacher::new(target);
        let config = mirrored_configuration(teacher.target().config());
        let learner = Learner::new(teacher.target().alphabet().clone(), config, &teacher);
        let hypothesis = learner.learn().unwrap();

        let a = hypothesis.alphabet().lookup("a").unwrap().clone();
        let mut runtime = hypothesis.runtime().unwrap();
        for (delay, expected) in [
            (q(2, 1), true),
            (Rational::one(), true),
            (q(1, 2), false),
            (Rational::zero(), false),
        ] {
            let word = DelayTimedWord::new(vec![(a.clone(), delay)]);
            assert_eq!(
                runtime.execute_delay_timed(&word).unwrap().accepted,
                expected
            );
        }
    }

    #[test]
    fn learns_reset_semantics() {
        let target = reset_target();
        let teacher = DtaTeacher::new(target);
        let config = mirrored_configuration(teacher.target().config());
        let learner = Learner::new(teacher.target().alphabet().clone(), config, &teacher);

        let hypothesis = learner.learn().expect("the target is learnable");
        let oracle = DbmOracle::new();
        assert_eq!(
            teacher
                .target()
                .equivalence_witness(&hypothesis, &oracle)
                .unwrap(),
            None
        );

        // The recovered guard on the second step must demand t₂ ≥ 1
        // regardless of t₁.
        let a = hypothesis.alphabet().lookup("a").unwrap().clone();
        let mut runtime = hypothesis.runtime().unwrap();
        let accepted = DelayTimedWord::new(vec![(a.clone(), q(5, 2)), (a.clone(), Rational::one())]);
        assert!(runtime.execute_delay_timed(&accepted).unwrap().accepted);
        let rejected = DelayTimedWord::new(vec![(a.clone(), q(5, 2)), (a, q(1, 2))]);
        assert!(!runtime.execute_delay_timed(&rejected).unwrap().accepted);
    }

    /// Two clocks with a difference guard: accepts `(a, t₁)(b, t₂)` iff
    /// `t₁ ≥ 1`, expressed as `y − x ≥ 1` after `a` resets `x`. The
    /// reset-guess space is 4^steps here, so the run takes a while.
    #[test]
    #[ignore = "exponential reset guessing over two clocks"]
    fn learns_a_two_clock_difference_guard() {
        let mut alphabet = Alphabet::new();
        let a = alphabet.create_action("a");
        let b = alphabet.create_action("b");
        let x = Clock::new("x");
        let y = Clock::new("y");
        let clocks: math::OrderedSet<Clock> = [x.clone(), y.clone()].into_iter().collect();
        let config =
            ClockConfiguration::new([(x.clone(), 1), (y.clone(), 1)].into_iter().collect());
        let l0 = Location::fresh();
        let l1 = Location::fresh();
        let l2 = Location::fresh();
        let mut target = Dta::new(alphabet, clocks.clone(), Some(l0.clone()), config);
        target.add_location(l1.clone());
        target.add_accepting_location(l2.clone());
        let reset_x: ResetSet = [x.clone()].into_iter().collect();
        target
            .add_transition(Transition::new(
                l0,
                a,
                Constraint::top(clocks.clone()),
                reset_x,
                l1.clone(),
            ))
            .unwrap();
        let difference = Constraint::of(
            clocks,
            [AtomConstraint::diff_less_equal(&x, &y, -Rational::one()).unwrap()],
        )
        .unwrap();
        target
            .add_transition(Transition::new(l1, b, difference, ResetSet::new(), l2))
            .unwrap();

        let teacher = DtaTeacher::new(target);
        let config = mirrored_configuration(teacher.target().config());
        let learner = Learner::new(teacher.target().alphabet().clone(), config, &teacher);
        let hypothesis = learner.learn().expect("the target is learnable");
        let oracle = DbmOracle::new();
        assert_eq!(
            teacher
                .target()
                .equivalence_witness(&hypothesis, &oracle)
                .unwrap(),
            None
        );
    }

    #[test]
    fn a_zero_budget_reports_exhaustion() {
        let target = one_clock_target();
        let teacher = DtaTeacher::new(target);
        let config = mirrored_configuration(teacher.target().config());
        let learner = Learner::new(teacher.target().alphabet().clone(), config, &teacher)
            .with_table_budget(0);
        assert!(matches!(
            learner.learn(),
            Err(LearnError::Exhausted { .. })
        ));
    }
}
