//! The region abstraction: finite equivalence classes of clock valuations
//! induced by integer parts up to the ceilings κ and the ordering of the
//! non-zero fractional parts.

use std::fmt;
use std::hash::{Hash, Hasher};

use timed_core::{math, Clock, ClockConfiguration, ClockError, ClockValuation, Rational};

use crate::constraint::{AtomConstraint, Constraint};

pub mod solver;

/// A clock region for a fixed configuration κ.
///
/// Invariants: every clock has an integer part, saturated clocks (integer
/// part κ+1) appear in neither fraction structure, and every non-saturated
/// clock is in exactly one of `zero_fraction` or `fraction_order`. The
/// order records only the clock sequence, sorted by actual fractional
/// value at construction time, so regions built from different
/// representatives of the same class compare equal.
///
/// Equality and hashing ignore the configuration, which is carried for
/// ceiling lookups only.
#[derive(Debug, Clone)]
pub struct Region {
    integer_parts: math::OrderedMap<Clock, i64>,
    zero_fraction: math::OrderedSet<Clock>,
    fraction_order: Vec<Clock>,
    config: ClockConfiguration,
}

impl Region {
    /// The canonical region of `valuation` under `config`.
    pub fn from_valuation(
        valuation: &ClockValuation,
        config: &ClockConfiguration,
    ) -> Result<Region, ClockError> {
        let mut integer_parts = math::OrderedMap::new();
        let mut zero_fraction = math::OrderedSet::new();
        let mut fractional: Vec<(Clock, Rational)> = Vec::new();

        for clock in valuation.clocks() {
            let value = valuation
                .value(clock)
                .expect("iterated clocks are present in the valuation");
            let kappa = config.kappa(clock)?;
            let floor = value
                .floor_int()
                .expect("clock valuations only hold finite values");
            let saturated = floor > kappa;
            let integer_part = if saturated { kappa + 1 } else { floor };
            integer_parts.insert(clock.clone(), integer_part);

            if saturated {
                continue;
            }
            let fraction = value
                .fract()
                .expect("clock valuations only hold finite values");
            if fraction.is_zero() {
                zero_fraction.insert(clock.clone());
            } else {
                fractional.push((clock.clone(), fraction));
            }
        }

        fractional.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let fraction_order = fractional.into_iter().map(|(clock, _)| clock).collect();

        Ok(Region {
            integer_parts,
            zero_fraction,
            fraction_order,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ClockConfiguration {
        &self.config
    }

    pub fn integer_part(&self, clock: &Clock) -> Option<i64> {
        self.integer_parts.get(clock).copied()
    }

    pub fn integer_parts(&self) -> impl Iterator<Item = (&Clock, i64)> + '_ {
        self.integer_parts.iter().map(|(c, i)| (c, *i))
    }

    pub fn zero_fraction(&self) -> impl Iterator<Item = &Clock> + '_ {
        self.zero_fraction.iter()
    }

    pub fn has_zero_fraction(&self, clock: &Clock) -> bool {
        self.zero_fraction.contains(clock)
    }

    pub fn fraction_order(&self) -> &[Clock] {
        &self.fraction_order
    }

    pub fn clocks(&self) -> impl Iterator<Item = &Clock> + '_ {
        self.integer_parts.keys()
    }

    fn kappa(&self, clock: &Clock) -> i64 {
        self.config
            .kappa(clock)
            .expect("region clocks are covered by the configuration")
    }

    fn is_saturated(&self, clock: &Clock) -> bool {
        match self.integer_parts.get(clock) {
            Some(part) => *part > self.kappa(clock),
            None => false,
        }
    }

    /// Membership test for a concrete valuation.
    pub fn contains(&self, valuation: &ClockValuation) -> bool {
        let domain: math::OrderedSet<Clock> = self.integer_parts.keys().cloned().collect();
        if valuation.clock_set() != domain {
            return false;
        }

        // Integer parts, with saturation equivalence above κ.
        for (clock, expected) in &self.integer_parts {
            let value = valuation
                .value(clock)
                .expect("clock sets were just checked");
            let floor = value
                .floor_int()
                .expect("clock valuations only hold finite values");
            if floor != *expected {
                let kappa = self.kappa(clock);
                if floor <= kappa || *expected <= kappa {
                    return false;
                }
            }
        }

        for clock in &self.zero_fraction {
            if !valuation
                .is_fraction_zero(clock)
                .expect("clock sets were just checked")
            {
                return false;
            }
        }

        // Recompute the fractional ordering of the remaining clocks and
        // compare the clock sequence.
        let mut actual: Vec<(Clock, Rational)> = Vec::new();
        for clock in self.integer_parts.keys() {
            if self.zero_fraction.contains(clock) || self.is_saturated(clock) {
                continue;
            }
            let fraction = valuation
                .fraction(clock)
                .expect("clock sets were just checked");
            if fraction.is_zero() {
                return false;
            }
            actual.push((clock.clone(), fraction));
        }
        if actual.len() != self.fraction_order.len() {
            return false;
        }
        actual.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        actual
            .iter()
            .zip(&self.fraction_order)
            .all(|((clock, _), expected)| clock == expected)
    }

    /// A canonical representative: integer parts as-is, zero fractions at
    /// 0, and the k-th non-zero fraction at `k/(n+1)`.
    pub fn build_valuation(&self) -> ClockValuation {
        let mut values: math::OrderedMap<Clock, Rational> = self
            .integer_parts
            .iter()
            .map(|(clock, part)| (clock.clone(), Rational::integer(*part)))
            .collect();

        let n = self.fraction_order.len() as i64;
        for (k, clock) in self.fraction_order.iter().enumerate() {
            let increment = Rational::new(k as i64 + 1, n + 1)
                .expect("fraction denominators are positive");
            if let Some(value) = values.get_mut(clock) {
                *value = &*value + &increment;
            }
        }
        ClockValuation::new(values)
    }

    /// The conjunctive guard describing this region.
    ///
    /// With `need_fraction` the constraint additionally pins equal
    /// fractions among the zero-fraction clocks, which the partition
    /// refinement uses to tell otherwise identical unit cubes apart.
    pub fn to_constraint(&self, need_fraction: bool) -> Constraint {
        let mut atoms: Vec<AtomConstraint> = Vec::new();

        for (clock, part) in &self.integer_parts {
            if clock.is_zero() {
                continue;
            }
            let kappa = self.kappa(clock);
            let atom = if *part > kappa {
                AtomConstraint::greater_than(clock, Rational::integer(kappa))
            } else {
                AtomConstraint::greater_equal(clock, Rational::integer(*part))
            };
            atoms.push(atom.expect("region atoms are well-formed"));
        }

        for clock in &self.zero_fraction {
            if clock.is_zero() {
                continue;
            }
            if let Some(part) = self.integer_parts.get(clock) {
                if *part <= self.kappa(clock) {
                    atoms.push(
                        AtomConstraint::less_equal(clock, Rational::integer(*part))
                            .expect("region atoms are well-formed"),
                    );
                }
            }
        }

        let mut previous: Option<&Clock> = None;
        for clock in &self.fraction_order {
            let part = self.integer_parts[clock];
            atoms.push(
                AtomConstraint::greater_than(clock, Rational::integer(part))
                    .expect("region atoms are well-formed"),
            );

            // frac(current) > frac(previous), expressed on the original
            // clocks: previous − current < int(previous) − int(current).
            if let Some(prev) = previous {
                let diff = Rational::integer(self.integer_parts[prev] - part);
                atoms.push(
                    AtomConstraint::diff_less_than(prev, clock, diff)
                        .expect("region atoms are well-formed"),
                );
            }

            for zero_frac in &self.zero_fraction {
                if zero_frac.is_zero() {
                    continue;
                }
                let diff = Rational::integer(self.integer_parts[zero_frac] - part);
                atoms.push(
                    AtomConstraint::diff_less_than(zero_frac, clock, diff)
                        .expect("region atoms are well-formed"),
                );
            }

            previous = Some(clock);
        }

        if need_fraction {
            let zero_clocks: Vec<&Clock> = self.zero_fraction.iter().collect();
            for (i, ci) in zero_clocks.iter().enumerate() {
                for cj in zero_clocks.iter().skip(i + 1) {
                    let diff = Rational::integer(
                        self.integer_parts[*ci] - self.integer_parts[*cj],
                    );
                    atoms.push(
                        AtomConstraint::diff_less_equal(ci, cj, diff.clone())
                            .expect("region atoms are well-formed"),
                    );
                    atoms.push(
                        AtomConstraint::diff_less_equal(cj, ci, -&diff)
                            .expect("region atoms are well-formed"),
                    );
                }
            }
        }

        Constraint::of(self.config.clock_set(), atoms)
            .expect("region clocks are covered by the configuration")
    }
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.integer_parts == other.integer_parts
            && self.zero_fraction == other.zero_fraction
            && self.fraction_order == other.fraction_order
    }
}

impl Eq for Region {}

impl Hash for Region {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.integer_parts.hash(state);
        self.zero_fraction.hash(state);
        self.fraction_order.hash(state);
    }
}

impl PartialOrd for Region {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Region {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.integer_parts
            .cmp(&other.integer_parts)
            .then_with(|| self.zero_fraction.cmp(&other.zero_fraction))
            .then_with(|| self.fraction_order.cmp(&other.fraction_order))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region[int={{")?;
        for (i, (clock, part)) in self.integer_parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{clock}={part}")?;
        }
        write!(f, "}}, zero={{")?;
        for (i, clock) in self.zero_fraction.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{clock}")?;
        }
        write!(f, "}}, frac=")?;
        for (i, clock) in self.fraction_order.iter().enumerate() {
            if i > 0 {
                write!(f, "<")?;
            }
            write!(f, "{clock}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    fn config(clocks: &[(&Clock, i64)]) -> ClockConfiguration {
        ClockConfiguration::new(
            clocks
                .iter()
                .map(|(c, k)| ((*c).clone(), *k))
                .collect(),
        )
    }

    #[test]
    fn a_valuation_lies_in_its_own_region() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let config = config(&[(&x, 2), (&y, 2)]);
        for (vx, vy) in [(q(0, 1), q(0, 1)), (q(3, 2), q(1, 2)), (q(3, 1), q(3, 1))] {
            let mut values = timed_core::math::OrderedMap::new();
            values.insert(x.clone(), vx);
            values.insert(y.clone(), vy);
            let v = ClockValuation::new(values);
            let region = Region::from_valuation(&v, &config).unwrap();
            assert!(region.contains(&v), "{region} should contain {v}");
        }
    }

    #[test]
    fn representative_round_trips() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let config = config(&[(&x, 2), (&y, 2)]);
        for (vx, vy) in [
            (q(0, 1), q(0, 1)),
            (q(3, 2), q(1, 2)),
            (q(3, 1), q(3, 1)),
            (q(1, 3), q(2, 3)),
        ] {
            let mut values = timed_core::math::OrderedMap::new();
            values.insert(x.clone(), vx);
            values.insert(y.clone(), vy);
            let v = ClockValuation::new(values);
            let region = Region::from_valuation(&v, &config).unwrap();
            let rebuilt = Region::from_valuation(&region.build_valuation(), &config).unwrap();
            assert_eq!(region, rebuilt);
        }
    }

    #[test]
    fn saturation_merges_everything_above_kappa() {
        let x = Clock::new("x");
        let config = config(&[(&x, 1)]);
        let v3 = ClockValuation::zero([&x]).delay(&q(5, 2)).unwrap();
        let v9 = ClockValuation::zero([&x]).delay(&q(9, 1)).unwrap();
        let r3 = Region::from_valuation(&v3, &config).unwrap();
        let r9 = Region::from_valuation(&v9, &config).unwrap();
        assert_eq!(r3, r9);
        assert!(r3.contains(&v9));
    }

    #[test]
    fn region_constraint_describes_the_region() {
        let x = Clock::new("x");
        let y = Clock::new("y");
        let config = config(&[(&x, 2), (&y, 2)]);
        let mut values = timed_core::math::OrderedMap::new();
        values.insert(x.clone(), q(3, 2));
        values.insert(y.clone(), q(1, 4));
        let v = ClockValuation::new(values);
        let region = Region::from_valuation(&v, &config).unwrap();
        let guard = region.to_constraint(false);
        assert!(guard.is_satisfied(&v).unwrap());
        // Same integer parts but flipped fraction order falls outside.
        let mut flipped = timed_core::math::OrderedMap::new();
        flipped.insert(x.clone(), q(5, 4));
        flipped.insert(y.clone(), q(3, 4));
        let w = ClockValuation::new(flipped);
        assert!(!region.contains(&w));
    }
}
