//! Collection aliases which hide the concrete map/set implementations from
//! the rest of the workspace.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

pub use indexmap::map;
pub use indexmap::set;
pub use indexmap::Equivalent;

/// Type alias for sets that iterate in insertion order.
pub type Set<S> = indexmap::IndexSet<S>;
/// Type alias for sets that iterate in key order.
pub type OrderedSet<S> = BTreeSet<S>;

/// Type alias for maps that iterate in insertion order.
pub type Map<K, V> = indexmap::IndexMap<K, V>;
/// Type alias for maps that iterate in key order.
pub type OrderedMap<K, V> = BTreeMap<K, V>;
