//! Active learning of deterministic timed automata.
//!
//! The learner poses membership and equivalence queries to a
//! [`Teacher`], maintains reset-guessing observation tables, and turns
//! prepared tables into hypothesis automata whose guards are recovered by
//! the partition function.

pub mod teacher;
pub use teacher::{DtaTeacher, Teacher, TeacherError};

pub mod table;
pub use table::{Inconsistency, InconsistencyKind, ObservationTable, Row};

pub mod learner;
pub use learner::{mirrored_configuration, LearnError, Learner};

pub mod prelude {
    pub use timed_automata::prelude::*;

    pub use crate::learner::{mirrored_configuration, LearnError, Learner};
    pub use crate::table::{Inconsistency, InconsistencyKind, ObservationTable, Row};
    pub use crate::teacher::{DtaTeacher, Teacher, TeacherError};
}
