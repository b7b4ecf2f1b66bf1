//! Clock-timed words: actions paired with the valuation observed at the
//! step, optionally annotated with reset sets.

use std::fmt;

use timed_core::{math, Action, Clock, ClockConfiguration, ClockValuation, Rational, ResetSet};

use super::{RegionTimedWord, ResetDelayTimedWord, ResetRegionTimedWord, WordError};
use crate::region::Region;

/// `(action, valuation)*`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTimedWord {
    steps: Vec<(Action, ClockValuation)>,
}

impl ClockTimedWord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<(Action, ClockValuation)>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[(Action, ClockValuation)] {
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

    pub fn valuations(&self) -> impl Iterator<Item = &ClockValuation> + '_ {
        self.steps.iter().map(|(_, v)| v)
    }

    /// Abstracts every valuation to its region under `config`.
    pub fn to_region_timed(
        &self,
        config: &ClockConfiguration,
    ) -> Result<RegionTimedWord, WordError> {
        let steps = self
            .steps
            .iter()
            .map(|(action, v)| Ok((action.clone(), Region::from_valuation(v, config)?)))
            .collect::<Result<Vec<_>, WordError>>()?;
        Ok(RegionTimedWord::new(steps))
    }

    pub fn with_resets(&self, resets: Vec<ResetSet>) -> Result<ResetClockTimedWord, WordError> {
        if resets.len() != self.steps.len() {
            return Err(WordError::LengthMismatch {
                expected: self.steps.len(),
                found: resets.len(),
            });
        }
        Ok(ResetClockTimedWord::new(
            self.steps
                .iter()
                .cloned()
                .zip(resets)
                .map(|((action, v), reset)| (action, v, reset))
                .collect(),
        ))
    }
}

impl fmt::Display for ClockTimedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "ε");
        }
        for (i, (action, v)) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "({action}, {v})")?;
        }
        Ok(())
    }
}

/// `(action, valuation-before-reset, resets)*` — the access-word format
/// of the observation table.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResetClockTimedWord {
    steps: Vec<(Action, ClockValuation, ResetSet)>,
}

impl ResetClockTimedWord {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(steps: Vec<(Action, ClockValuation, ResetSet)>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[(Action, ClockValuation, ResetSet)] {
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

    pub fn valuations(&self) -> impl Iterator<Item = &ClockValuation> + '_ {
        self.steps.iter().map(|(_, v, _)| v)
    }

    pub fn resets(&self) -> impl Iterator<Item = &ResetSet> + '_ {
        self.steps.iter().map(|(_, _, r)| r)
    }

    pub fn last(&self) -> Option<&(Action, ClockValuation, ResetSet)> {
        self.steps.last()
    }

    pub fn last_valuation(&self) -> Option<&ClockValuation> {
        self.steps.last().map(|(_, v, _)| v)
    }

    pub fn last_resets(&self) -> Option<&ResetSet> {
        self.steps.last().map(|(_, _, r)| r)
    }

    /// The valuation after the final step's reset has been applied, i.e.
    /// the state a continuation starts from. `ε` starts from zero.
    pub fn continuation_valuation<'a, I>(&self, clocks: I) -> Result<ClockValuation, WordError>
    where
        I: IntoIterator<Item = &'a Clock>,
    {
        match self.steps.last() {
            None => Ok(ClockValuation::zero(clocks)),
            Some((_, v, resets)) => Ok(v.reset(resets)?),
        }
    }

    pub fn append(&self, step: (Action, ClockValuation, ResetSet)) -> ResetClockTimedWord {
        let mut steps = self.steps.clone();
        steps.push(step);
        ResetClockTimedWord::new(steps)
    }

    pub fn concat(&self, other: &ResetClockTimedWord) -> ResetClockTimedWord {
        let mut steps = self.steps.clone();
        steps.extend(other.steps.iter().cloned());
        ResetClockTimedWord::new(steps)
    }

    /// True iff `prefix` is a step-wise prefix of `self`.
    pub fn has_prefix(&self, prefix: &ResetClockTimedWord) -> bool {
        prefix.steps.len() <= self.steps.len()
            && self.steps[..prefix.steps.len()] == prefix.steps[..]
    }

    pub fn prefix(&self, len: usize) -> ResetClockTimedWord {
        ResetClockTimedWord::new(self.steps[..len].to_vec())
    }

    pub fn suffix(&self, len: usize) -> ResetClockTimedWord {
        ResetClockTimedWord::new(self.steps[self.steps.len() - len..].to_vec())
    }

    /// Recovers the delays: `tᵢ` is inferred from any non-reset clock and
    /// validated against all clocks; disagreement or a negative delay is
    /// an [`WordError::InconsistentTiming`].
    pub fn to_reset_delay_timed(
        &self,
        clocks: &math::OrderedSet<Clock>,
    ) -> Result<ResetDelayTimedWord, WordError> {
        let mut steps = Vec::with_capacity(self.steps.len());
        let mut previous = ClockValuation::zero(clocks.iter());

        for (step, (action, before_reset, resets)) in self.steps.iter().enumerate() {
            if clocks.is_empty() {
                if !before_reset.is_empty() {
                    return Err(WordError::InconsistentTiming {
                        step,
                        reason: "non-empty valuation without clocks".into(),
                    });
                }
                steps.push((action.clone(), Rational::zero(), resets.clone()));
                continue;
            }

            let reference = clocks
                .iter()
                .next()
                .expect("the clock set was just checked to be non-empty");
            let delay = before_reset.value(reference)? - previous.value(reference)?;
            if delay.is_negative() {
                return Err(WordError::InconsistentTiming {
                    step,
                    reason: format!("inferred negative delay {delay}"),
                });
            }
            let expected = previous.delay(&delay)?;
            if &expected != before_reset {
                return Err(WordError::InconsistentTiming {
                    step,
                    reason: format!(
                        "clocks disagree on the inferred delay {delay}: expected {expected}, found {before_reset}"
                    ),
                });
            }

            steps.push((action.clone(), delay, resets.clone()));
            previous = before_reset.reset(resets)?;
        }

        Ok(ResetDelayTimedWord::new(steps))
    }

    /// Abstracts every valuation to its region, keeping the resets.
    pub fn to_reset_region_timed(
        &self,
        config: &ClockConfiguration,
    ) -> Result<ResetRegionTimedWord, WordError> {
        let steps = self
            .steps
            .iter()
            .map(|(action, v, resets)| {
                Ok((
                    action.clone(),
                    Region::from_valuation(v, config)?,
                    resets.clone(),
                ))
            })
            .collect::<Result<Vec<_>, WordError>>()?;
        Ok(ResetRegionTimedWord::new(steps))
    }
}

impl fmt::Display for ResetClockTimedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "ε");
        }
        for (i, (action, v, resets)) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "({action}, {v}, {{")?;
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

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn setup() -> (Action, Clock, math::OrderedSet<Clock>) {
        let mut alphabet = timed_core::Alphabet::new();
        let a = alphabet.create_action("a");
        let x = Clock::new("x");
        let clocks: math::OrderedSet<Clock> = [x.clone()].into_iter().collect();
        (a, x, clocks)
    }

    #[test]
    fn negative_inferred_delay_is_inconsistent() {
        let (a, x, clocks) = setup();
        let v1 = ClockValuation::zero([&x]).delay(&q(2, 1)).unwrap();
        let v2 = ClockValuation::zero([&x]).delay(&q(1, 1)).unwrap();
        let word = ResetClockTimedWord::new(vec![
            (a.clone(), v1, ResetSet::new()),
            (a, v2, ResetSet::new()),
        ]);
        assert!(matches!(
            word.to_reset_delay_timed(&clocks),
            Err(WordError::InconsistentTiming { step: 1, .. })
        ));
    }

    #[test]
    fn disagreeing_clocks_are_inconsistent() {
        let (a, x, _) = setup();
        let y = Clock::new("y");
        let clocks: math::OrderedSet<Clock> = [x.clone(), y.clone()].into_iter().collect();
        let mut values = math::OrderedMap::new();
        // x advanced by 1, y by 2: impossible without a reset.
        values.insert(x, q(1, 1));
        values.insert(y, q(2, 1));
        let word = ResetClockTimedWord::new(vec![(a, ClockValuation::new(values), ResetSet::new())]);
        assert!(matches!(
            word.to_reset_delay_timed(&clocks),
            Err(WordError::InconsistentTiming { step: 0, .. })
        ));
    }

    #[test]
    fn prefix_relation() {
        let (a, x, _) = setup();
        let v = ClockValuation::zero([&x]).delay(&q(1, 2)).unwrap();
        let one = ResetClockTimedWord::new(vec![(a.clone(), v.clone(), ResetSet::new())]);
        let two = one.append((a, v.delay(&q(1, 2)).unwrap(), ResetSet::new()));
        assert!(two.has_prefix(&one));
        assert!(two.has_prefix(&ResetClockTimedWord::empty()));
        assert!(!one.has_prefix(&two));
        assert_eq!(two.prefix(1), one);
    }

    #[test]
    fn continuation_starts_after_the_last_reset() {
        let (a, x, _) = setup();
        let v = ClockValuation::zero([&x]).delay(&q(3, 2)).unwrap();
        let rx: ResetSet = [x.clone()].into_iter().collect();
        let word = ResetClockTimedWord::new(vec![(a, v, rx)]);
        let continuation = word.continuation_valuation([&x]).unwrap();
        assert!(continuation.value(&x).unwrap().is_zero());
    }
}
