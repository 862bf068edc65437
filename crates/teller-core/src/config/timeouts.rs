//! Default timeout values
//!
//! All values can be overridden through [`super::Settings`].

use std::time::Duration;

/// Timeouts for calls to the inference endpoint
pub mod inference {
    use super::*;

    /// Connection establishment timeout (10 seconds)
    pub const CONNECT_SECS: u64 = 10;

    /// Budget for a single streamed completion (120 seconds)
    pub const CALL_SECS: u64 = 120;

    pub fn connect_timeout() -> Duration {
        Duration::from_secs(CONNECT_SECS)
    }

    pub fn call_timeout() -> Duration {
        Duration::from_secs(CALL_SECS)
    }
}

/// Timeouts for the agent fan-out
pub mod fanout {
    use super::*;

    /// Overall deadline for one fan-out (180 seconds)
    pub const DEADLINE_SECS: u64 = 180;

    /// Pause between attempts of the same agent (250 ms)
    pub const RETRY_BACKOFF_MILLIS: u64 = 250;

    pub fn overall_deadline() -> Duration {
        Duration::from_secs(DEADLINE_SECS)
    }

    pub fn retry_backoff() -> Duration {
        Duration::from_millis(RETRY_BACKOFF_MILLIS)
    }
}
