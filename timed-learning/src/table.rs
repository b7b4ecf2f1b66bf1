//! The reset-guessing observation table.
//!
//! A table holds reset-clock-timed access words `S`, their one-step
//! extensions `R`, region-timed suffixes `E`, and the two observation
//! functions `f` (membership) and `g` (reset guesses along a suffix).
//! Every speculative operation (filling, closing, consistency repair,
//! counter-example integration) branches into value-copied successor
//! tables; `guess_count` accumulates the speculative choices taken to
//! reach a table and drives the learner's best-first exploration.

use std::collections::VecDeque;

use itertools::Itertools;
use tracing::{debug, trace, warn};

use timed_automata::region::Region;
use timed_automata::word::{DelayTimedWord, RegionTimedWord, ResetClockTimedWord};
use timed_core::{math, Action, Alphabet, Clock, ClockConfiguration, ClockValuation, ResetSet};

use crate::learner::LearnError;
use crate::teacher::Teacher;

mod row;
pub use row::{Row, RowEntry};

mod hypothesis;

type TableKey = (ResetClockTimedWord, RegionTimedWord);

/// Why two table entries violate consistency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InconsistencyKind {
    /// The rows of the two extensions differ; the suffix distinguishes
    /// them.
    RowMismatch(RegionTimedWord),
    /// The last-step reset sets of the two extensions differ.
    ResetMismatch,
}

/// A recorded consistency violation between two extensions whose parent
/// rows and last-step regions agree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inconsistency {
    pub word1: ResetClockTimedWord,
    pub word2: ResetClockTimedWord,
    pub kind: InconsistencyKind,
}

/// The observation table. Copy-on-branch: all guessing operations return
/// fresh tables and leave `self` untouched.
#[derive(Debug, Clone)]
pub struct ObservationTable {
    pub(crate) alphabet: Alphabet,
    pub(crate) config: ClockConfiguration,
    pub(crate) clocks: math::OrderedSet<Clock>,
    pub(crate) prefixes: math::Set<ResetClockTimedWord>,
    pub(crate) boundary: math::Set<ResetClockTimedWord>,
    pub(crate) suffixes: Vec<RegionTimedWord>,
    pub(crate) f: math::Map<TableKey, bool>,
    pub(crate) g: math::Map<TableKey, Vec<ResetSet>>,
    pub(crate) guess_count: u64,
    row_cache: math::Map<ResetClockTimedWord, Row>,
    last_region_cache: math::Map<ResetClockTimedWord, Region>,
    inconsistencies: Vec<Inconsistency>,
}

impl ObservationTable {
    /// The empty table: `S = {ε}`, `R = ∅`, `E = {ε}`. The boundary is
    /// seeded by the learner.
    pub fn new(alphabet: Alphabet, config: ClockConfiguration) -> Self {
        let clocks = config.clock_set();
        let mut prefixes = math::Set::default();
        prefixes.insert(ResetClockTimedWord::empty());
        Self {
            alphabet,
            config,
            clocks,
            prefixes,
            boundary: math::Set::default(),
            suffixes: vec![RegionTimedWord::empty()],
            f: math::Map::default(),
            g: math::Map::default(),
            guess_count: 0,
            row_cache: math::Map::default(),
            last_region_cache: math::Map::default(),
            inconsistencies: Vec::new(),
        }
    }

    pub fn guess_count(&self) -> u64 {
        self.guess_count
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn config(&self) -> &ClockConfiguration {
        &self.config
    }

    pub fn clocks(&self) -> &math::OrderedSet<Clock> {
        &self.clocks
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &ResetClockTimedWord> + '_ {
        self.prefixes.iter()
    }

    pub fn boundary(&self) -> impl Iterator<Item = &ResetClockTimedWord> + '_ {
        self.boundary.iter()
    }

    pub fn suffixes(&self) -> &[RegionTimedWord] {
        &self.suffixes
    }

    pub fn inconsistencies(&self) -> &[Inconsistency] {
        &self.inconsistencies
    }

    fn all_words(&self) -> Vec<ResetClockTimedWord> {
        self.prefixes
            .iter()
            .chain(self.boundary.iter())
            .cloned()
            .collect()
    }

    /// All `2^|C|` subsets of the clock set.
    pub fn all_reset_subsets(&self) -> Vec<ResetSet> {
        self.clocks
            .iter()
            .cloned()
            .powerset()
            .map(|subset| subset.into_iter().collect())
            .collect()
    }

    /// All `(2^|C|)^len` reset sequences of the given length.
    pub fn reset_sequences(&self, len: usize) -> Vec<Vec<ResetSet>> {
        if len == 0 {
            return vec![Vec::new()];
        }
        let options = self.all_reset_subsets();
        (0..len)
            .map(|_| options.clone().into_iter())
            .multi_cartesian_product()
            .collect()
    }

    /// The row of `word`, or `None` while entries are still missing.
    pub fn get_row(&self, word: &ResetClockTimedWord) -> Option<Row> {
        if let Some(cached) = self.row_cache.get(word) {
            return Some(cached.clone());
        }
        self.compute_row(word)
    }

    fn compute_row(&self, word: &ResetClockTimedWord) -> Option<Row> {
        let mut entries = Vec::with_capacity(self.suffixes.len());
        for suffix in &self.suffixes {
            let key = (word.clone(), suffix.clone());
            let accepted = *self.f.get(&key)?;
            let resets = self.g.get(&key)?.clone();
            entries.push(RowEntry { accepted, resets });
        }
        Some(Row::new(entries))
    }

    /// Rebuilds the row and last-region caches from the observation
    /// functions. Called after a table reaches a filled state.
    pub fn build_caches(&mut self) {
        self.row_cache.clear();
        self.last_region_cache.clear();
        for word in self.all_words() {
            if let Some(row) = self.compute_row(&word) {
                self.row_cache.insert(word.clone(), row);
            }
            if let Some(valuation) = word.last_valuation() {
                if let Ok(region) = Region::from_valuation(valuation, &self.config) {
                    self.last_region_cache.insert(word, region);
                }
            }
        }
    }

    fn last_region(&self, word: &ResetClockTimedWord) -> Option<Region> {
        if let Some(cached) = self.last_region_cache.get(word) {
            return Some(cached.clone());
        }
        let valuation = word.last_valuation()?;
        Region::from_valuation(valuation, &self.config).ok()
    }

    /// A boundary word whose row matches no access-word row, if any.
    pub fn unclosed_boundary(&self) -> Option<&ResetClockTimedWord> {
        for word in &self.boundary {
            let Some(row) = self.get_row(word) else {
                warn!(%word, "boundary word has missing entries");
                return Some(word);
            };
            let matched = self
                .prefixes
                .iter()
                .any(|s| self.get_row(s).is_some_and(|other| other == row));
            if !matched {
                return Some(word);
            }
        }
        None
    }

    pub fn is_closed(&self) -> bool {
        self.unclosed_boundary().is_none()
    }

    /// Consistency: whenever two extensions have table-equal parents and
    /// the same last-step region, their own rows and last-step resets
    /// must agree. The first violation is recorded for repair.
    pub fn is_consistent(&mut self) -> bool {
        self.inconsistencies.clear();

        let words = self.all_words();
        let rows: math::Map<&ResetClockTimedWord, Row> = words
            .iter()
            .filter_map(|w| self.get_row(w).map(|row| (w, row)))
            .collect();
        let regions: math::Map<&ResetClockTimedWord, Region> = words
            .iter()
            .filter_map(|w| self.last_region(w).map(|region| (w, region)))
            .collect();

        for (i, w1) in words.iter().enumerate() {
            if w1.is_empty() {
                continue;
            }
            let parent1 = w1.prefix(w1.len() - 1);
            let (Some(parent1_row), Some(region1)) = (rows.get(&parent1), regions.get(w1)) else {
                continue;
            };

            for w2 in words.iter().skip(i + 1) {
                if w2.is_empty() {
                    continue;
                }
                let parent2 = w2.prefix(w2.len() - 1);
                let (Some(parent2_row), Some(region2)) = (rows.get(&parent2), regions.get(w2))
                else {
                    continue;
                };

                if parent1_row != parent2_row || region1 != region2 {
                    continue;
                }

                let (Some(row1), Some(row2)) = (rows.get(w1), rows.get(w2)) else {
                    continue;
                };

                if row1 != row2 {
                    let suffix = self.find_distinguishing_suffix(row1, row2);
                    let Some(suffix) = suffix else {
                        warn!(%w1, %w2, "rows differ but no suffix distinguishes them");
                        continue;
                    };
                    debug!(%w1, %w2, %suffix, "row mismatch");
                    self.inconsistencies.push(Inconsistency {
                        word1: w1.clone(),
                        word2: w2.clone(),
                        kind: InconsistencyKind::RowMismatch(suffix),
                    });
                    return false;
                }

                let resets1 = w1.last_resets().expect("w1 is non-empty");
                let resets2 = w2.last_resets().expect("w2 is non-empty");
                if resets1 != resets2 {
                    debug!(%w1, %w2, "reset mismatch");
                    self.inconsistencies.push(Inconsistency {
                        word1: w1.clone(),
                        word2: w2.clone(),
                        kind: InconsistencyKind::ResetMismatch,
                    });
                    return false;
                }
            }
        }
        true
    }

    fn find_distinguishing_suffix(&self, row1: &Row, row2: &Row) -> Option<RegionTimedWord> {
        row1.first_disagreement(row2)
            .and_then(|index| self.suffixes.get(index).cloned())
    }

    /// Evidence closure. The upstream semantics are unspecified; this is
    /// deliberately the constant `true` until they are.
    pub fn is_evidence_closed(&self) -> bool {
        true
    }

    /// Populates all missing `f`/`g` entries, branching over every
    /// timing-feasible reset-sequence guess for each non-empty suffix.
    /// Returns one filled table per surviving branch; an empty result
    /// means the table itself was timing-infeasible.
    pub fn fill_table<T: Teacher>(&self, teacher: &T) -> Result<Vec<ObservationTable>, LearnError> {
        let mut base = self.clone();
        let words = base.all_words();
        let epsilon = RegionTimedWord::empty();

        // Empty-suffix entries are deterministic: one membership query on
        // the access word itself.
        for word in &words {
            let key = (word.clone(), epsilon.clone());
            if !base.f.contains_key(&key) {
                let delay_word = match word.to_reset_delay_timed(&base.clocks) {
                    Ok(annotated) => annotated.to_delay_timed(),
                    Err(err) => {
                        debug!(%word, %err, "access word is timing-infeasible; pruning");
                        return Ok(Vec::new());
                    }
                };
                let accepted = teacher.membership(&delay_word)?;
                base.f.insert(key.clone(), accepted);
            }
            base.g.entry(key).or_default();
        }

        let mut pending: Vec<TableKey> = Vec::new();
        for word in &words {
            for suffix in &base.suffixes {
                if suffix.is_empty() {
                    continue;
                }
                let key = (word.clone(), suffix.clone());
                if !base.f.contains_key(&key) || !base.g.contains_key(&key) {
                    pending.push(key);
                }
            }
        }

        if pending.is_empty() {
            base.build_caches();
            return Ok(vec![base]);
        }
        trace!(entries = pending.len(), "filling table entries");

        let mut queue: VecDeque<(usize, ObservationTable)> = VecDeque::new();
        queue.push_back((0, base));
        let mut completed = Vec::new();

        while let Some((index, table)) = queue.pop_front() {
            let Some((prefix, suffix)) = pending.get(index) else {
                let mut done = table;
                done.build_caches();
                completed.push(done);
                continue;
            };

            let start = prefix.continuation_valuation(table.clocks.iter())?;
            let mut feasible_guesses = 0usize;
            for guess in table.reset_sequences(suffix.len()) {
                let Ok(suffix_word) = suffix.to_reset_clock_timed(&guess, &start) else {
                    // Timing-infeasible guess: silent prune.
                    continue;
                };
                let full = prefix.concat(&suffix_word);
                let delay_word = match full.to_reset_delay_timed(&table.clocks) {
                    Ok(annotated) => annotated.to_delay_timed(),
                    Err(err) => {
                        trace!(%full, %err, "guessed word is timing-infeasible");
                        continue;
                    }
                };
                let accepted = teacher.membership(&delay_word)?;
                feasible_guesses += 1;

                let mut branch = table.clone();
                branch.guess_count += 1;
                let key = (prefix.clone(), suffix.clone());
                branch.f.insert(key.clone(), accepted);
                branch.g.insert(key, guess);
                queue.push_back((index + 1, branch));
            }
            if feasible_guesses == 0 {
                trace!(%prefix, %suffix, "no feasible reset guess; branch dies");
            }
        }

        debug!(tables = completed.len(), "table filling finished");
        Ok(completed)
    }

    /// Repairs closedness: moves the offending boundary word into `S` and
    /// extends it by every action under every reset guess, producing one
    /// filled successor table per guess combination.
    pub fn guess_closing<T: Teacher>(
        &self,
        teacher: &T,
    ) -> Result<Vec<ObservationTable>, LearnError> {
        let Some(problematic) = self.unclosed_boundary().cloned() else {
            debug!("table is structurally closed");
            return Ok(vec![self.clone()]);
        };
        debug!(%problematic, "promoting unclosed boundary word");

        let mut base = self.clone();
        base.boundary.shift_remove(&problematic);
        base.prefixes.insert(problematic.clone());
        base.row_cache.clear();
        base.last_region_cache.clear();

        // The extension is taken without letting time elapse, so the new
        // step's valuation is the promoted word's continuation state.
        let start = problematic.continuation_valuation(self.clocks.iter())?;

        let actions: Vec<Action> = self.alphabet.actions().cloned().collect();
        let options = self.all_reset_subsets();
        let combinations: Vec<Vec<ResetSet>> = if actions.is_empty() {
            vec![Vec::new()]
        } else {
            (0..actions.len())
                .map(|_| options.clone().into_iter())
                .multi_cartesian_product()
                .collect()
        };

        let mut result = Vec::new();
        for combination in combinations {
            let mut instance = base.clone();
            instance.guess_count += 1;
            for (action, reset) in actions.iter().zip(&combination) {
                let extension =
                    problematic.append((action.clone(), start.clone(), reset.clone()));
                if !instance.prefixes.contains(&extension) {
                    instance.boundary.insert(extension);
                }
            }
            result.extend(instance.fill_table(teacher)?);
        }
        debug!(tables = result.len(), "closing guesses generated");
        Ok(result)
    }

    /// Repairs the first recorded inconsistency by extending `E` with the
    /// distinguishing suffix prefixed by the offending step's region.
    pub fn guess_consistency<T: Teacher>(
        &self,
        teacher: &T,
    ) -> Result<Vec<ObservationTable>, LearnError> {
        let Some(record) = self.inconsistencies.first().cloned() else {
            warn!("guess_consistency called without a recorded inconsistency");
            return Ok(vec![self.clone()]);
        };

        let (action, valuation, _) = record
            .word1
            .last()
            .cloned()
            .expect("recorded inconsistencies concern non-empty words");
        let region = Region::from_valuation(&valuation, &self.config)?;
        let region_prefix = RegionTimedWord::new(vec![(action, region)]);

        let new_suffix = match &record.kind {
            InconsistencyKind::RowMismatch(distinguishing) => {
                region_prefix.concat(distinguishing)
            }
            InconsistencyKind::ResetMismatch => region_prefix,
        };

        if self.suffixes.contains(&new_suffix) {
            debug!(%new_suffix, "suffix already present; nothing to repair");
            return Ok(Vec::new());
        }

        debug!(%new_suffix, "extending suffix set");
        let mut base = self.clone();
        base.suffixes.push(new_suffix);
        base.inconsistencies.clear();
        base.fill_table(teacher)
    }

    /// Integrates a counter-example: guesses every reset sequence along
    /// it, adds the resulting prefixes to the boundary and refills.
    pub fn process_counterexample<T: Teacher>(
        &self,
        counterexample: &DelayTimedWord,
        teacher: &T,
    ) -> Result<Vec<ObservationTable>, LearnError> {
        if counterexample.is_empty() {
            return Err(LearnError::EmptyCounterexample);
        }
        debug!(%counterexample, "integrating counter-example");

        let mut result = Vec::new();
        for guess in self.reset_sequences(counterexample.len()) {
            let mut current = ClockValuation::zero(self.clocks.iter());
            let mut steps = Vec::with_capacity(counterexample.len());
            let mut feasible = true;
            for ((action, delay), reset) in counterexample.steps().iter().zip(&guess) {
                let Ok(delayed) = current.delay(delay) else {
                    feasible = false;
                    break;
                };
                steps.push((action.clone(), delayed.clone(), reset.clone()));
                match delayed.reset(reset) {
                    Ok(next) => current = next,
                    Err(_) => {
                        feasible = false;
                        break;
                    }
                }
            }
            if !feasible {
                continue;
            }

            let mut table = self.clone();
            table.guess_count += 1;
            let full = ResetClockTimedWord::new(steps);
            for len in 1..=full.len() {
                let prefix = full.prefix(len);
                if !table.prefixes.contains(&prefix) && !table.boundary.contains(&prefix) {
                    trace!(%prefix, "adding counter-example prefix to the boundary");
                    table.boundary.insert(prefix);
                }
            }
            result.extend(table.fill_table(teacher)?);
        }
        debug!(tables = result.len(), "counter-example guesses generated");
        Ok(result)
    }
}

impl std::fmt::Display for ObservationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = tabled::builder::Builder::default();
        let mut header = vec!["prefix".to_string()];
        for suffix in &self.suffixes {
            header.push(suffix.to_string());
        }
        builder.push_record(header);

        for (marker, words) in [("(S)", &self.prefixes), ("(R)", &self.boundary)] {
            for word in words {
                let mut record = vec![format!("{marker} {word}")];
                for suffix in &self.suffixes {
                    let key = (word.clone(), suffix.clone());
                    let accepted = match self.f.get(&key) {
                        Some(true) => "T",
                        Some(false) => "F",
                        None => "?",
                    };
                    let resets = match self.g.get(&key) {
                        Some(sequence) => sequence
                            .iter()
                            .map(|set| {
                                format!(
                                    "{{{}}}",
                                    set.iter().map(Clock::name).collect::<Vec<_>>().join(",")
                                )
                            })
                            .collect::<Vec<_>>()
                            .join(";"),
                        None => "?".to_string(),
                    };
                    record.push(format!("f={accepted}, g=[{resets}]"));
                }
                builder.push_record(record);
            }
        }

        write!(f, "{}", builder.build())
    }
}
