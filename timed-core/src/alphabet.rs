//! Actions and the insertion-ordered alphabet over them.

use std::fmt;
use std::sync::Arc;

use crate::math;
use crate::IdGenerator;

static ACTION_IDS: IdGenerator = IdGenerator::new(1);

/// An input action. Carries a stable id for ordering, but equality and
/// hashing go by name: two actions with the same name denote the same
/// input symbol.
#[derive(Debug, Clone)]
pub struct Action {
    id: u32,
    name: Arc<str>,
}

impl Action {
    fn new(name: &str) -> Self {
        Self {
            id: ACTION_IDS.fresh(),
            name: Arc::from(name),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Action {}

impl std::hash::Hash for Action {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Action {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// An ordered set of actions. Iteration follows insertion order;
/// [`Alphabet::create_action`] is idempotent on name collisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alphabet {
    actions: math::Map<String, Action>,
}

impl Alphabet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut alphabet = Self::new();
        for name in names {
            alphabet.create_action(name.as_ref());
        }
        alphabet
    }

    /// Returns the action with the given name, registering it first if it
    /// is not yet part of the alphabet.
    pub fn create_action(&mut self, name: &str) -> Action {
        if let Some(existing) = self.actions.get(name) {
            return existing.clone();
        }
        let action = Action::new(name);
        self.actions.insert(name.to_string(), action.clone());
        action
    }

    pub fn lookup(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn contains(&self, action: &Action) -> bool {
        self.actions.contains_key(action.name())
    }

    pub fn actions(&self) -> impl Iterator<Item = &Action> + '_ {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, action) in self.actions().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{action}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_action_is_idempotent_per_name() {
        let mut alphabet = Alphabet::new();
        let a1 = alphabet.create_action("a");
        let a2 = alphabet.create_action("a");
        assert_eq!(a1, a2);
        assert_eq!(alphabet.len(), 1);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let alphabet = Alphabet::from_names(["c", "a", "b"]);
        let names: Vec<_> = alphabet.actions().map(Action::name).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }
}
