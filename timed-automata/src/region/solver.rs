//! Delay solvers: find a concrete non-negative delay that drives a
//! valuation into a target region, or through a conjunctive guard.

use timed_core::{ClockValuation, Rational};

use crate::constraint::Constraint;

use super::Region;

/// The smallest non-negative delay `d` such that `v + d` lies in
/// `target`, or `None` when no delay reaches the region.
///
/// Per clock the minimum delay hits either the exact target integer (for
/// zero-fraction clocks) or the required floor; the pointwise maximum is
/// then verified against the region, which also enforces the fractional
/// ordering and the strict bounds.
pub fn solve_delay_to_region(v: &ClockValuation, target: &Region) -> Option<Rational> {
    let mut d_min = Rational::zero();

    for clock in target.clocks() {
        if clock.is_zero() {
            continue;
        }
        let value = v
            .value(clock)
            .expect("solver valuations cover the region clocks");
        let kappa = Rational::integer(
            target
                .config()
                .kappa(clock)
                .expect("region clocks are covered by the configuration"),
        );
        let target_int = Rational::integer(target.integer_part(clock)?);

        let mut required = Rational::zero();
        if target_int > kappa {
            // Saturated clocks only need to pass the ceiling; strictness
            // is checked by the final containment test.
            required = required.max(&kappa - value).max(Rational::zero());
        } else {
            required = required.max(&target_int - value).max(Rational::zero());
        }

        if target.has_zero_fraction(clock) {
            let to_target = (&target_int - value).max(Rational::zero());
            let landing = value + &to_target;
            if landing == target_int && landing.is_integer() {
                required = required.max(to_target);
            } else {
                // The exact integer is unreachable; aim for the first
                // reachable integer at or above the target.
                let ceil = if value.is_integer() {
                    value.clone()
                } else {
                    Rational::integer(
                        value
                            .floor_int()
                            .expect("clock valuations only hold finite values")
                            + 1,
                    )
                };
                let first_reachable = target_int.clone().max(ceil);
                required = required.max((first_reachable - value.clone()).max(Rational::zero()));
            }
        }

        d_min = d_min.max(required);
    }

    let landed = v
        .delay(&d_min)
        .expect("solved delays are non-negative");
    if target.contains(&landed) {
        Some(d_min)
    } else {
        None
    }
}

/// A concrete non-negative delay after which `v + d` satisfies `guard`,
/// or `None` when the feasible interval for `d` is empty.
///
/// Atoms bound the delay as follows: `c − x0 op V` caps `v(c) + d` from
/// above, `x0 − c op V` demands `d` at least `−V − v(c)`, and atoms not
/// involving the zero clock are delay-invariant and only checked. Within
/// a non-empty interval the solver prefers the closed lower endpoint,
/// then the midpoint of a bounded open interval, and only falls back to
/// `lower + ε` when the interval is unbounded above.
pub fn solve_delay(v: &ClockValuation, guard: &Constraint) -> Option<Rational> {
    if guard.is_false() {
        return None;
    }

    // (value, closed) endpoints for the feasible delay interval.
    let mut lower = (Rational::zero(), true);
    let mut upper = (Rational::infinity(), false);

    for atom in guard.atoms() {
        if atom.bound() == &Rational::infinity() {
            continue;
        }
        let bound = atom.bound();
        let strict = !atom.is_closed();
        match (atom.left().is_zero(), atom.right().is_zero()) {
            (true, true) => {
                let zero = Rational::zero();
                let holds = if strict { &zero < bound } else { &zero <= bound };
                if !holds {
                    return None;
                }
            }
            (false, false) => {
                let left = v
                    .value(atom.left())
                    .expect("solver valuations cover the guard clocks");
                let right = v
                    .value(atom.right())
                    .expect("solver valuations cover the guard clocks");
                let diff = left - right;
                let holds = if strict { &diff < bound } else { &diff <= bound };
                if !holds {
                    return None;
                }
            }
            (false, true) => {
                // v(c) + d op V  ⇒  d op V − v(c).
                let value = v
                    .value(atom.left())
                    .expect("solver valuations cover the guard clocks");
                let candidate = (bound - value, atom.is_closed());
                if candidate.0 < upper.0 || (candidate.0 == upper.0 && !candidate.1 && upper.1) {
                    upper = candidate;
                }
            }
            (true, false) => {
                // −(v(c) + d) op V  ⇒  d op' −V − v(c) from below.
                let value = v
                    .value(atom.right())
                    .expect("solver valuations cover the guard clocks");
                let candidate = (&(-bound) - value, atom.is_closed());
                if candidate.0 > lower.0 || (candidate.0 == lower.0 && !candidate.1 && lower.1) {
                    lower = candidate;
                }
            }
        }
    }

    let (lo, lo_closed) = &lower;
    let (hi, hi_closed) = &upper;
    if lo > hi || (lo == hi && !(*lo_closed && *hi_closed)) {
        return None;
    }

    if *lo_closed {
        Some(lo.clone())
    } else if hi < &Rational::infinity() {
        Some(&(lo + hi) / &Rational::integer(2))
    } else {
        Some(lo + &Rational::epsilon())
    }
}
