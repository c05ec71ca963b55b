//! Shared error taxonomy, failure reporting and the backend trait used by
//! every transport.

pub mod backend;
pub mod errors;
pub mod reporter;

pub use backend::{AppStateProvider, ProcessOutcome};
pub use errors::{Result, StageFailure, TryOnError};
pub use reporter::{ErrorReporter, GENERIC_MESSAGE, RECENT_ERRORS};
