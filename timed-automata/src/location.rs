//! Locations and transitions of a timed automaton.

use std::fmt;
use std::sync::Arc;

use timed_core::{Action, Clock, IdGenerator, ResetSet};

use crate::constraint::Constraint;

static LOCATION_IDS: IdGenerator = IdGenerator::new(1);
static TRANSITION_IDS: IdGenerator = IdGenerator::new(1);

/// A control location. Identity (equality, ordering, hashing) goes by the
/// stable id; the label is for display and persistence. Sink locations
/// are created only through [`Location::sink`].
#[derive(Debug, Clone)]
pub struct Location {
    id: u32,
    label: Arc<str>,
    sink: bool,
}

impl Location {
    /// A fresh location labelled `L<id>`.
    pub fn fresh() -> Self {
        let id = LOCATION_IDS.fresh();
        Self {
            id,
            label: Arc::from(format!("L{id}").as_str()),
            sink: false,
        }
    }

    /// A fresh location with an explicit label.
    pub fn new(label: impl AsRef<str>) -> Self {
        Self {
            id: LOCATION_IDS.fresh(),
            label: Arc::from(label.as_ref()),
            sink: false,
        }
    }

    /// The factory for sink locations; the only way to set the sink flag.
    pub fn sink() -> Self {
        Self {
            id: LOCATION_IDS.fresh(),
            label: Arc::from("sink"),
            sink: true,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_sink(&self) -> bool {
        self.sink
    }
}

impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Location {}

impl std::hash::Hash for Location {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// A transition `source —action, guard, resets→ target`. Equality goes by
/// the allocation id, so two structurally identical transitions remain
/// distinct edges.
#[derive(Debug, Clone)]
pub struct Transition {
    id: u32,
    source: Location,
    action: Action,
    guard: Constraint,
    resets: ResetSet,
    target: Location,
}

impl Transition {
    pub fn new(
        source: Location,
        action: Action,
        guard: Constraint,
        resets: ResetSet,
        target: Location,
    ) -> Self {
        Self {
            id: TRANSITION_IDS.fresh(),
            source,
            action,
            guard,
            resets,
            target,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn source(&self) -> &Location {
        &self.source
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn guard(&self) -> &Constraint {
        &self.guard
    }

    pub fn resets(&self) -> &ResetSet {
        &self.resets
    }

    pub fn target(&self) -> &Location {
        &self.target
    }

    /// True iff another transition has the same endpoints, action, guard
    /// and resets (ignoring the edge id).
    pub fn same_shape(&self, other: &Transition) -> bool {
        self.source == other.source
            && self.target == other.target
            && self.action == other.action
            && self.resets == other.resets
            && self.guard == other.guard
    }

    /// Clock occurring in guard or resets, used for max-constant caches.
    pub fn mentions(&self, clock: &Clock) -> bool {
        self.resets.contains(clock)
            || self
                .guard
                .atoms()
                .any(|a| a.left() == clock || a.right() == clock)
    }
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Transition {}

impl std::hash::Hash for Transition {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Transition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Transition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use itertools::Itertools;

        write!(
            f,
            "{} --{}, {} / {{{}}}--> {}",
            self.source,
            self.action,
            self.guard,
            self.resets.iter().join(", "),
            self.target
        )
    }
}
