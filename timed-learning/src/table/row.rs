//! Table rows: the observable behaviour of a prefix across all suffixes.

use std::fmt;

use timed_core::ResetSet;

/// One cell of a row: the membership answer and the guessed reset
/// sequence for a (prefix, suffix) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowEntry {
    pub accepted: bool,
    pub resets: Vec<ResetSet>,
}

/// The row of a prefix: one [`RowEntry`] per suffix, in suffix order.
/// Two prefixes are table-equivalent iff their rows are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Row {
    entries: Vec<RowEntry>,
}

impl Row {
    pub fn new(entries: Vec<RowEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The index of the first suffix on which two rows disagree.
    pub fn first_disagreement(&self, other: &Row) -> Option<usize> {
        self.entries
            .iter()
            .zip(other.entries.iter())
            .position(|(a, b)| a != b)
            .or_else(|| {
                if self.entries.len() != other.entries.len() {
                    Some(self.entries.len().min(other.entries.len()))
                } else {
                    None
                }
            })
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            write!(f, "{}", if entry.accepted { "T" } else { "F" })?;
            write!(f, ",[")?;
            for (j, resets) in entry.resets.iter().enumerate() {
                if j > 0 {
                    write!(f, ";")?;
                }
                write!(f, "{{")?;
                for (k, clock) in resets.iter().enumerate() {
                    if k > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{clock}")?;
                }
                write!(f, "}}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
