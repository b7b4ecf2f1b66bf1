//! Timed words in their six flavours: delay-, clock- and region-timed,
//! each with a reset-annotated counterpart, together with the conversions
//! between them.

use thiserror::Error;
use timed_core::{ClockError, ValuationError};

mod delay;
pub use delay::{DelayTimedWord, ResetDelayTimedWord};

mod clocked;
pub use clocked::{ClockTimedWord, ResetClockTimedWord};

mod regioned;
pub use regioned::{RegionTimedWord, ResetRegionTimedWord};

/// Errors raised by word constructions and conversions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WordError {
    #[error("annotation length {found} does not match word length {expected}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("inconsistent timing at step {step}: {reason}")]
    InconsistentTiming { step: usize, reason: String },
    #[error("no feasible delay into region at step {step}")]
    InfeasibleRegion { step: usize },
    #[error(transparent)]
    Valuation(#[from] ValuationError),
    #[error(transparent)]
    Clock(#[from] ClockError),
}
