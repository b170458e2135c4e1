//! Unified error type for the relay workflow orchestration engine.
//!
//! Every component (expression evaluator, connector registry, planner,
//! scheduler) raises [`RelayError`]. The type closes over the error
//! taxonomy the engine commits to at its external boundary — see
//! [`RelayError::to_public`] for the shape a subscriber actually sees.

mod context;
mod error;
mod kinds;
mod result_ext;

pub use context::ErrorContext;
pub use error::{PublicError, RelayError};
pub use kinds::CancelReason;
pub use result_ext::{Result, ResultExt};

pub mod prelude {
    pub use crate::{CancelReason, ErrorContext, PublicError, RelayError, Result, ResultExt};
}
