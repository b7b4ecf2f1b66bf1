//! Delay-timed words: actions paired with the delay elapsing before them.

use std::fmt;

use timed_core::{Action, Clock, ClockConfiguration, ClockValuation, Rational, ResetSet};

use super::{ResetClockTimedWord, ResetRegionTimedWord, WordError};

/// `(action, delay)*` — the external word format of teachers and
/// counter-examples.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DelayTimedWord {
    steps: Vec<(Action, Rational)>,
}

impl DelayTimedWord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<(Action, Rational)>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[(Action, Rational)] {
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

    pub fn delays(&self) -> impl Iterator<Item = &Rational> + '_ {
        self.steps.iter().map(|(_, delay)| delay)
    }

    pub fn total_delay(&self) -> Rational {
        self.delays()
            .fold(Rational::zero(), |acc, delay| &acc + delay)
    }

    /// All prefixes, from ε to the word itself.
    pub fn prefixes(&self) -> Vec<DelayTimedWord> {
        (0..=self.steps.len())
            .map(|len| DelayTimedWord::new(self.steps[..len].to_vec()))
            .collect()
    }

    pub fn concat(&self, other: &DelayTimedWord) -> DelayTimedWord {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        DelayTimedWord::new(steps)
    }

    /// Annotates each step with a reset set.
    pub fn with_resets(&self, resets: Vec<ResetSet>) -> Result<ResetDelayTimedWord, WordError> {
        if resets.len() != self.steps.len() {
            return Err(WordError::LengthMismatch {
                expected: self.steps.len(),
                found: resets.len(),
            });
        }
        Ok(ResetDelayTimedWord::new(
            self.steps
                .iter()
                .cloned()
                .zip(resets)
                .map(|((action, delay), reset)| (action, delay, reset))
                .collect(),
        ))
    }
}

impl fmt::Display for DelayTimedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "ε");
        }
        for (i, (action, delay)) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "({action}, {delay})")?;
        }
        Ok(())
    }
}

/// `(action, delay, resets)*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResetDelayTimedWord {
    steps: Vec<(Action, Rational, ResetSet)>,
}

impl ResetDelayTimedWord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<(Action, Rational, ResetSet)>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[(Action, Rational, ResetSet)] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Forgets the reset annotations.
    pub fn to_delay_timed(&self) -> DelayTimedWord {
        DelayTimedWord::new(
            self.steps
                .iter()
                .map(|(action, delay, _)| (action.clone(), delay.clone()))
                .collect(),
        )
    }

    /// Plays the word from the all-zero valuation, annotating each step
    /// with the valuation reached *before* its reset is applied.
    pub fn to_reset_clock_timed<'a, I>(&self, clocks: I) -> Result<ResetClockTimedWord, WordError>
    where
        I: IntoIterator<Item = &'a Clock>,
    {
        let mut current = ClockValuation::zero(clocks);
        let mut steps = Vec::with_capacity(self.steps.len());
        for (action, delay, resets) in &self.steps {
            current = current.delay(delay)?;
            steps.push((action.clone(), current.clone(), resets.clone()));
            if !resets.is_empty() {
                current = current.reset(resets)?;
            }
        }
        Ok(ResetClockTimedWord::new(steps))
    }

    /// The reset-region view under `config`.
    pub fn to_reset_region_timed(
        &self,
        config: &ClockConfiguration,
    ) -> Result<ResetRegionTimedWord, WordError> {
        self.to_reset_clock_timed(config.clocks())?
            .to_reset_region_timed(config)
    }
}

impl fmt::Display for ResetDelayTimedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "ε");
        }
        for (i, (action, delay, resets)) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "({action}, {delay}, {{")?;
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
    use timed_core::math;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn ab() -> (Action, Action) {
        let mut alphabet = timed_core::Alphabet::new();
        (alphabet.create_action("a"), alphabet.create_action("b"))
    }

    #[test]
    fn total_delay_sums_steps() {
        let (a, b) = ab();
        let word = DelayTimedWord::new(vec![(a, q(1, 2)), (b, q(3, 2))]);
        assert_eq!(word.total_delay(), q(2, 1));
    }

    #[test]
    fn prefixes_include_epsilon_and_self() {
        let (a, b) = ab();
        let word = DelayTimedWord::new(vec![(a, q(1, 2)), (b, q(3, 2))]);
        let prefixes = word.prefixes();
        assert_eq!(prefixes.len(), 3);
        assert!(prefixes[0].is_empty());
        assert_eq!(prefixes[2], word);
    }

    #[test]
    fn reset_annotation_requires_matching_length() {
        let (a, _) = ab();
        let word = DelayTimedWord::new(vec![(a, q(1, 2))]);
        assert!(matches!(
            word.with_resets(vec![]),
            Err(WordError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn delay_round_trips_through_clock_annotation() {
        let (a, b) = ab();
        let x = Clock::new("x");
        let y = Clock::new("y");
        let rx: ResetSet = [x.clone()].into_iter().collect();
        let word = ResetDelayTimedWord::new(vec![
            (a, q(1, 2), rx),
            (b, q(3, 2), ResetSet::new()),
        ]);
        let clocked = word.to_reset_clock_timed([&x, &y]).unwrap();
        // First step: both clocks at 1/2 before the reset of x.
        let (_, v0, _) = &clocked.steps()[0];
        assert_eq!(v0.value(&x).unwrap(), &q(1, 2));
        // Second step: x was reset, so x = 3/2 while y = 2.
        let (_, v1, _) = &clocked.steps()[1];
        assert_eq!(v1.value(&x).unwrap(), &q(3, 2));
        assert_eq!(v1.value(&y).unwrap(), &q(2, 1));

        let back = clocked
            .to_reset_delay_timed(&[x, y].into_iter().collect::<math::OrderedSet<_>>())
            .unwrap();
        assert_eq!(back, word);
    }
}
