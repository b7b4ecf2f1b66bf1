//! Clock variables and the per-clock ceiling configuration.

use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use crate::math;
use crate::IdGenerator;

static CLOCK_IDS: IdGenerator = IdGenerator::new(1);
static ZERO_CLOCK: OnceLock<Clock> = OnceLock::new();

/// Errors concerning clock lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    #[error("clock `{0}` is not part of this configuration")]
    UnknownClock(String),
}

/// A clock variable with a stable process-wide id.
///
/// Equality, ordering and hashing go by id only; the display name is
/// carried for diagnostics and persistence. The distinguished zero clock
/// `x0` (id 0) is a process-wide singleton obtained via [`zero_clock`].
#[derive(Debug, Clone)]
pub struct Clock {
    id: u32,
    name: Arc<str>,
}

/// The zero-clock singleton `x0`. Always reads 0 in every valuation and
/// serves as the reference point of difference constraints and DBMs.
pub fn zero_clock() -> &'static Clock {
    ZERO_CLOCK.get_or_init(|| Clock {
        id: 0,
        name: Arc::from("x0"),
    })
}

impl Clock {
    /// A fresh clock with the given display name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            id: CLOCK_IDS.fresh(),
            name: Arc::from(name.as_ref()),
        }
    }

    /// A fresh clock named after its id, `x<id>`.
    pub fn fresh() -> Self {
        let id = CLOCK_IDS.fresh();
        Self {
            id,
            name: Arc::from(format!("x{id}").as_str()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_zero(&self) -> bool {
        self.id == 0
    }
}

impl PartialEq for Clock {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Clock {}

impl PartialOrd for Clock {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Clock {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for Clock {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Maps every clock of a system to its ceiling κ, the largest integer
/// constant the region abstraction distinguishes for that clock.
///
/// Configurations are cheap to clone (the map is shared) and compare by
/// content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockConfiguration {
    kappas: Arc<math::OrderedMap<Clock, i64>>,
}

impl ClockConfiguration {
    pub fn new(kappas: math::OrderedMap<Clock, i64>) -> Self {
        Self {
            kappas: Arc::new(kappas),
        }
    }

    /// The ceiling of `clock`. The zero clock always has ceiling 0.
    pub fn kappa(&self, clock: &Clock) -> Result<i64, ClockError> {
        if clock.is_zero() {
            return Ok(0);
        }
        self.kappas
            .get(clock)
            .copied()
            .ok_or_else(|| ClockError::UnknownClock(clock.name().to_string()))
    }

    pub fn contains(&self, clock: &Clock) -> bool {
        clock.is_zero() || self.kappas.contains_key(clock)
    }

    pub fn clocks(&self) -> impl Iterator<Item = &Clock> + '_ {
        self.kappas.keys()
    }

    pub fn clock_set(&self) -> math::OrderedSet<Clock> {
        self.kappas.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.kappas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kappas.is_empty()
    }

    /// Pointwise maximum of two configurations over the union of their
    /// clocks. Clocks known to only one side keep their ceiling; clocks
    /// known to neither default to 0.
    pub fn merge(&self, other: &ClockConfiguration) -> ClockConfiguration {
        let mut merged = (*self.kappas).clone();
        for (clock, kappa) in other.kappas.iter() {
            merged
                .entry(clock.clone())
                .and_modify(|k| *k = (*k).max(*kappa))
                .or_insert(*kappa);
        }
        ClockConfiguration::new(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_clock_is_a_singleton() {
        let a = zero_clock();
        let b = zero_clock();
        assert_eq!(a, b);
        assert!(a.is_zero());
        assert_eq!(a.id(), 0);
    }

    #[test]
    fn clocks_compare_by_id() {
        let x = Clock::new("x");
        let y = Clock::new("x");
        assert_ne!(x, y);
        assert!(x < y);
    }

    #[test]
    fn configuration_merge_takes_pointwise_max() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let a = ClockConfiguration::new([(x.clone(), 2), (y.clone(), 1)].into_iter().collect());
        let b = ClockConfiguration::new([(x.clone(), 1), (y.clone(), 5)].into_iter().collect());
        let merged = a.merge(&b);
        assert_eq!(merged.kappa(&x).unwrap(), 2);
        assert_eq!(merged.kappa(&y).unwrap(), 5);
        assert_eq!(merged.kappa(zero_clock()).unwrap(), 0);
    }
}
