//! Region-timed words: actions paired with clock regions.

use std::fmt;

use timed_core::{Action, ClockValuation, ResetSet};

use super::{ResetClockTimedWord, WordError};
use crate::region::{solver, Region};

/// `(action, region)*` — the suffix format of the observation table.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionTimedWord {
    steps: Vec<(Action, Region)>,
}

impl RegionTimedWord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<(Action, Region)>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[(Action, Region)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> + '_ {
        self.steps.iter().map(|(action, _)| action)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.steps.iter().map(|(_, region)| region)
    }

    pub fn concat(&self, other: &RegionTimedWord) -> RegionTimedWord {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        RegionTimedWord::new(steps)
    }

    pub fn with_resets(&self, resets: Vec<ResetSet>) -> Result<ResetRegionTimedWord, WordError> {
        if resets.len() != self.steps.len() {
            return Err(WordError::LengthMismatch {
                expected: self.steps.len(),
                found: resets.len(),
            });
        }
        Ok(ResetRegionTimedWord::new(
            self.steps
                .iter()
                .cloned()
                .zip(resets)
                .map(|((action, region), reset)| (action, region, reset))
                .collect(),
        ))
    }

    /// Concretises the word: starting from `start`, each step delays into
    /// its region (via the region delay solver) and applies the guessed
    /// reset. Fails with [`WordError::InfeasibleRegion`] when a step's
    /// region cannot be reached by any non-negative delay.
    pub fn to_reset_clock_timed(
        &self,
        resets: &[ResetSet],
        start: &ClockValuation,
    ) -> Result<ResetClockTimedWord, WordError> {
        if resets.len() != self.steps.len() {
            return Err(WordError::LengthMismatch {
                expected: self.steps.len(),
                found: resets.len(),
            });
        }

        let mut current = start.clone();
        let mut steps = Vec::with_capacity(self.steps.len());
        for (step, ((action, region), reset)) in self.steps.iter().zip(resets).enumerate() {
            let delay = solver::solve_delay_to_region(&current, region)
                .ok_or(WordError::InfeasibleRegion { step })?;
            let before_reset = current.delay(&delay)?;
            steps.push((action.clone(), before_reset.clone(), reset.clone()));
            current = before_reset.reset(reset)?;
        }
        Ok(ResetClockTimedWord::new(steps))
    }
}

impl fmt::Display for RegionTimedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "ε");
        }
        for (i, (action, region)) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "({action}, {region})")?;
        }
        Ok(())
    }
}

/// `(action, region, resets)*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResetRegionTimedWord {
    steps: Vec<(Action, Region, ResetSet)>,
}

impl ResetRegionTimedWord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<(Action, Region, ResetSet)>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[(Action, Region, ResetSet)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> + '_ {
        self.steps.iter().map(|(action, _, _)| action)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.steps.iter().map(|(_, region, _)| region)
    }

    pub fn resets(&self) -> impl Iterator<Item = &ResetSet> + '_ {
        self.steps.iter().map(|(_, _, resets)| resets)
    }

    pub fn is_prefix_of(&self, other: &ResetRegionTimedWord) -> bool {
        self.steps.len() <= other.steps.len()
            && other.steps[..self.steps.len()] == self.steps[..]
    }

    /// Forgets the reset annotations.
    pub fn to_region_timed(&self) -> RegionTimedWord {
        RegionTimedWord::new(
            self.steps
                .iter()
                .map(|(action, region, _)| (action.clone(), region.clone()))
                .collect(),
        )
    }
}

impl fmt::Display for ResetRegionTimedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "ε");
        }
        for (i, (action, region, resets)) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "({action}, {region}, {{")?;
            for (j, clock) in resets.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{clock}")?;
            }
            write!(f, "}})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timed_core::{Clock, ClockConfiguration, Rational};

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn region_word_concretises_through_the_solver() {
        let mut alphabet = timed_core::Alphabet::new();
        let a = alphabet.create_action("a");
        let x = Clock::new("x");
        let config = ClockConfiguration::new([(x.clone(), 2)].into_iter().collect());

        let at_one = ClockValuation::zero([&x]).delay(&Rational::one()).unwrap();
        let region = Region::from_valuation(&at_one, &config).unwrap();
        let word = RegionTimedWord::new(vec![(a.clone(), region)]);

        let start = ClockValuation::zero([&x]);
        let concrete = word
            .to_reset_clock_timed(&[ResetSet::new()], &start)
            .unwrap();
        assert_eq!(
            concrete.steps()[0].1.value(&x).unwrap(),
            &Rational::one()
        );
    }

    #[test]
    fn unreachable_region_is_infeasible() {
        let mut alphabet = timed_core::Alphabet::new();
        let a = alphabet.create_action("a");
        let x = Clock::new("x");
        let config = ClockConfiguration::new([(x.clone(), 2)].into_iter().collect());

        let early = ClockValuation::zero([&x]).delay(&q(1, 2)).unwrap();
        let region = Region::from_valuation(&early, &config).unwrap();
        let word = RegionTimedWord::new(vec![(a, region)]);

        let late = ClockValuation::zero([&x]).delay(&q(3, 1)).unwrap();
        assert!(matches!(
            word.to_reset_clock_timed(&[ResetSet::new()], &late),
            Err(WordError::InfeasibleRegion { step: 0 })
        ));
    }
}
