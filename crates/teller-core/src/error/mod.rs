//! Error types for Teller
//!
//! Every fallible operation in the pipeline returns [`TellerResult`]. Errors
//! carry a stable code (see [`UnifiedError::error_code`]) so the HTTP layer and
//! the CLI can report them without matching on message text.

mod constructors;
mod conversions;
mod types;
mod unified_error;

pub use types::{OptionExt, ResultExt, TellerError, TellerResult, UnifiedError};
