//! The JSON document format for automata.
//!
//! Guards are rendered as per-clock intervals `"[lo, hi)"` with `"-"` for
//! the clamped-to-0 lower bound and `"+"` for an unbounded upper end.
//! Intervals encode single-clock bounds only; difference atoms are
//! dropped on export with a warning. On import, every integer bound
//! raises the affected clock's ceiling.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use timed_core::{math, Alphabet, Clock, ClockConfiguration, Rational};

use crate::constraint::{AtomConstraint, Constraint, DbmOracle, GuardError};
use crate::dta::{Dta, DtaError};
use crate::location::{Location, Transition};

/// Errors raised while reading or writing automaton documents.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid interval `{text}` for clock `{clock}`: {reason}")]
    BadInterval {
        clock: String,
        text: String,
        reason: String,
    },
    #[error("document references unknown clock `{0}`")]
    UnknownClock(String),
    #[error("document references unknown location `{0}`")]
    UnknownLocation(String),
    #[error("document references unknown action `{0}`")]
    UnknownAction(String),
    #[error("a FALSE guard cannot be rendered as intervals")]
    UnsatisfiableGuard,
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Dta(#[from] DtaError),
}

/// The on-disk shape of an automaton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DtaDocument {
    pub name: String,
    pub clocks: Vec<String>,
    pub actions: Vec<String>,
    pub locations: Vec<LocationEntry>,
    pub init_location: String,
    pub transitions: Vec<TransitionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEntry {
    pub name: String,
    pub accepting: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invariant: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub source: String,
    pub action: String,
    pub guard: BTreeMap<String, String>,
    pub reset: Vec<String>,
    pub target: String,
}

/// Loads an automaton, completing it when the document describes a
/// partial one.
pub fn load(path: impl AsRef<Path>) -> Result<Dta, SerializeError> {
    let text = std::fs::read_to_string(path)?;
    let document: DtaDocument = serde_json::from_str(&text)?;
    let dta = from_document(&document)?;
    let oracle = DbmOracle::new();
    if dta.is_complete(&oracle) {
        Ok(dta)
    } else {
        Ok(dta.to_cta(&oracle)?)
    }
}

/// Writes an automaton to disk.
pub fn save(dta: &Dta, path: impl AsRef<Path>) -> Result<(), SerializeError> {
    let document = to_document(dta)?;
    let text = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Materialises a document into an automaton with fresh clocks, actions
/// and locations. Ceilings are inferred from the integer bounds of all
/// guards and invariants.
pub fn from_document(document: &DtaDocument) -> Result<Dta, SerializeError> {
    let mut clock_map: math::Map<String, Clock> = math::Map::default();
    for name in &document.clocks {
        clock_map
            .entry(name.clone())
            .or_insert_with(|| Clock::new(name));
    }
    let clocks: math::OrderedSet<Clock> = clock_map.values().cloned().collect();

    let mut alphabet = Alphabet::new();
    for name in &document.actions {
        alphabet.create_action(name);
    }

    let mut location_map: math::Map<String, Location> = math::Map::default();
    let mut accepting = Vec::new();
    for entry in &document.locations {
        let location = Location::new(&entry.name);
        if entry.accepting {
            accepting.push(location.clone());
        }
        location_map.insert(entry.name.clone(), location);
    }
    let initial = location_map
        .get(&document.init_location)
        .cloned()
        .ok_or_else(|| SerializeError::UnknownLocation(document.init_location.clone()))?;

    let mut kappas: math::OrderedMap<Clock, i64> =
        clocks.iter().map(|c| (c.clone(), 0)).collect();

    // Invariants participate in ceiling inference only.
    for entry in &document.locations {
        if let Some(invariant) = &entry.invariant {
            parse_guard(invariant, &clock_map, &clocks, &mut kappas)?;
        }
    }

    let mut parsed_transitions = Vec::new();
    for entry in &document.transitions {
        let source = location_map
            .get(&entry.source)
            .cloned()
            .ok_or_else(|| SerializeError::UnknownLocation(entry.source.clone()))?;
        let target = location_map
            .get(&entry.target)
            .cloned()
            .ok_or_else(|| SerializeError::UnknownLocation(entry.target.clone()))?;
        let action = alphabet
            .lookup(&entry.action)
            .cloned()
            .ok_or_else(|| SerializeError::UnknownAction(entry.action.clone()))?;
        let guard = parse_guard(&entry.guard, &clock_map, &clocks, &mut kappas)?;
        let resets = entry
            .reset
            .iter()
            .map(|name| {
                clock_map
                    .get(name)
                    .cloned()
                    .ok_or_else(|| SerializeError::UnknownClock(name.clone()))
            })
            .collect::<Result<_, _>>()?;
        parsed_transitions.push(Transition::new(source, action, guard, resets, target));
    }

    let config = ClockConfiguration::new(kappas);
    let mut dta = Dta::new(alphabet, clocks, Some(initial), config);
    for (_, location) in location_map {
        dta.add_location(location);
    }
    for location in accepting {
        dta.add_accepting_location(location);
    }
    for transition in parsed_transitions {
        dta.add_transition(transition)?;
    }
    Ok(dta)
}

/// Renders an automaton as a document. Difference atoms are dropped from
/// guards (with a warning); a FALSE guard is an error.
pub fn to_document(dta: &Dta) -> Result<DtaDocument, SerializeError> {
    let mut clocks: Vec<String> = dta.clocks().iter().map(|c| c.name().to_string()).collect();
    clocks.sort();
    let mut actions: Vec<String> = dta
        .alphabet()
        .actions()
        .map(|a| a.name().to_string())
        .collect();
    actions.sort();

    let mut locations: Vec<LocationEntry> = dta
        .locations()
        .map(|location| LocationEntry {
            name: location.label().to_string(),
            accepting: dta.is_accepting(location),
            invariant: None,
        })
        .collect();
    locations.sort_by(|a, b| a.name.cmp(&b.name));

    let init_location = dta
        .initial()
        .ok_or(DtaError::NoInitialLocation)?
        .label()
        .to_string();

    let mut transitions = Vec::new();
    for transition in dta.transitions() {
        transitions.push(TransitionEntry {
            source: transition.source().label().to_string(),
            action: transition.action().name().to_string(),
            guard: format_guard(transition.guard())?,
            reset: {
                let mut names: Vec<String> = transition
                    .resets()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect();
                names.sort();
                names
            },
            target: transition.target().label().to_string(),
        });
    }
    transitions.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.action.cmp(&b.action))
            .then_with(|| a.target.cmp(&b.target))
    });

    Ok(DtaDocument {
        name: format!(
            "{}_{}_{}_{}_export",
            dta.location_count(),
            dta.alphabet().len(),
            dta.transitions().len(),
            dta.clocks().len()
        ),
        clocks,
        actions,
        locations,
        init_location,
        transitions,
    })
}

fn parse_guard(
    guard: &BTreeMap<String, String>,
    clock_map: &math::Map<String, Clock>,
    clocks: &math::OrderedSet<Clock>,
    kappas: &mut math::OrderedMap<Clock, i64>,
) -> Result<Constraint, SerializeError> {
    let mut atoms = Vec::new();
    for (clock_name, interval) in guard {
        let clock = clock_map
            .get(clock_name)
            .ok_or_else(|| SerializeError::UnknownClock(clock_name.clone()))?;
        atoms.extend(parse_interval(clock, interval, kappas)?);
    }
    Ok(Constraint::of(clocks.clone(), atoms)?)
}

fn parse_interval(
    clock: &Clock,
    text: &str,
    kappas: &mut math::OrderedMap<Clock, i64>,
) -> Result<Vec<AtomConstraint>, SerializeError> {
    let bad = |reason: &str| SerializeError::BadInterval {
        clock: clock.name().to_string(),
        text: text.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let lower_closed = match trimmed.chars().next() {
        Some('[') => true,
        Some('(') => false,
        _ => return Err(bad("missing opening bracket")),
    };
    let upper_closed = match trimmed.chars().last() {
        Some(']') => true,
        Some(')') => false,
        _ => return Err(bad("missing closing bracket")),
    };
    let inner = &trimmed[1..trimmed.len() - 1];
    let Some((lower_text, upper_text)) = inner.split_once(',') else {
        return Err(bad("missing comma"));
    };
    let lower_text = lower_text.trim();
    let upper_text = upper_text.trim();

    let mut atoms = Vec::new();

    if !lower_text.is_empty() && lower_text != "-" {
        if lower_text == "+" {
            return Err(bad("lower bound cannot be +"));
        }
        let bound: Rational = lower_text
            .parse()
            .map_err(|_| bad("unparsable lower bound"))?;
        raise_kappa(kappas, clock, &bound);
        let atom = if lower_closed {
            AtomConstraint::greater_equal(clock, bound)
        } else {
            AtomConstraint::greater_than(clock, bound)
        };
        atoms.push(atom?);
    }

    if !upper_text.is_empty() && upper_text != "+" {
        if upper_text == "-" {
            return Err(bad("upper bound cannot be -"));
        }
        let bound: Rational = upper_text
            .parse()
            .map_err(|_| bad("unparsable upper bound"))?;
        raise_kappa(kappas, clock, &bound);
        let atom = if upper_closed {
            AtomConstraint::less_equal(clock, bound)
        } else {
            AtomConstraint::less_than(clock, bound)
        };
        atoms.push(atom?);
    }

    Ok(atoms)
}

/// Integer bounds raise the clock ceiling; fractional bounds do not.
fn raise_kappa(kappas: &mut math::OrderedMap<Clock, i64>, clock: &Clock, bound: &Rational) {
    if bound.is_integer() {
        if let Ok(value) = bound.floor_int() {
            kappas
                .entry(clock.clone())
                .and_modify(|k| *k = (*k).max(value))
                .or_insert(value);
        }
    }
}

fn format_guard(guard: &Constraint) -> Result<BTreeMap<String, String>, SerializeError> {
    if guard.is_true() {
        return Ok(BTreeMap::new());
    }
    if guard.is_false() {
        return Err(SerializeError::UnsatisfiableGuard);
    }

    // (lower, lower_closed, upper, upper_closed) per clock.
    let mut bounds: BTreeMap<String, (Rational, bool, Rational, bool)> = BTreeMap::new();
    let default = || (Rational::zero(), true, Rational::infinity(), false);

    for atom in guard.atoms() {
        let (left, right) = (atom.left(), atom.right());
        if !left.is_zero() && right.is_zero() {
            let entry = bounds.entry(left.name().to_string()).or_insert_with(default);
            let candidate = (atom.bound().clone(), atom.is_closed());
            if candidate.0 < entry.2 || (candidate.0 == entry.2 && !candidate.1 && entry.3) {
                entry.2 = candidate.0;
                entry.3 = candidate.1;
            }
        } else if left.is_zero() && !right.is_zero() {
            let entry = bounds
                .entry(right.name().to_string())
                .or_insert_with(default);
            let candidate = (-atom.bound(), atom.is_closed());
            if candidate.0 > entry.0 || (candidate.0 == entry.0 && !candidate.1 && entry.1) {
                entry.0 = candidate.0;
                entry.1 = candidate.1;
            }
        } else if !left.is_zero() && !right.is_zero() {
            warn!(%atom, "dropping difference atom in interval export");
        }
    }

    let mut rendered = BTreeMap::new();
    for (clock, (lower, lower_closed, upper, upper_closed)) in bounds {
        // Skip the default non-negative unbounded interval.
        if lower.is_zero() && lower_closed && upper == Rational::infinity() {
            continue;
        }
        let open = if lower_closed { '[' } else { '(' };
        let close = if upper_closed { ']' } else { ')' };
        let lower_text = if lower.is_zero() && lower_closed {
            "-".to_string()
        } else {
            lower.to_string()
        };
        let upper_text = if upper == Rational::infinity() {
            "+".to_string()
        } else {
            upper.to_string()
        };
        rendered.insert(clock, format!("{open}{lower_text}, {upper_text}{close}"));
    }
    Ok(rendered)
}
