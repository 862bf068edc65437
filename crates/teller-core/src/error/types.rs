//! Core error types and traits for Teller

use thiserror::Error;

/// Result type alias for Teller operations
pub type TellerResult<T> = Result<T, TellerError>;

/// Unified error trait implemented by [`TellerError`].
///
/// - error_code(): stable code for programmatic identification
/// - message(): human-readable message
/// - context(): optional additional context
/// - is_retryable(): whether the fan-out may retry the failed call
pub trait UnifiedError: std::error::Error + Send + Sync {
    /// Get the error code for programmatic handling
    fn error_code(&self) -> &str;

    /// Get the human-readable error message
    fn message(&self) -> &str;

    /// Get optional context about the error
    fn context(&self) -> Option<&str> {
        None
    }

    /// Check if this error is retryable
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C: std::fmt::Display>(self, context: C) -> TellerResult<T>;

    /// Add context lazily (only evaluated on error)
    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> TellerResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context<C: std::fmt::Display>(self, context: C) -> TellerResult<T> {
        self.map_err(|e| TellerError::other(format!("{}: {}", context, e)))
    }

    fn with_context<C: std::fmt::Display, F: FnOnce() -> C>(self, f: F) -> TellerResult<T> {
        self.map_err(|e| TellerError::other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with context message
    fn context<C: std::fmt::Display>(self, context: C) -> TellerResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context<C: std::fmt::Display>(self, context: C) -> TellerResult<T> {
        self.ok_or_else(|| TellerError::other(context.to_string()))
    }
}

/// Main error type for Teller
#[derive(Error, Debug, Clone)]
pub enum TellerError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// The requested prompt template is not registered
    #[error("Template not found: {name}")]
    TemplateNotFound { name: String },

    /// A template could not be rendered or parsed
    #[error("Render error in '{template}': {message}")]
    Render {
        template: String,
        message: String,
        field: Option<String>,
    },

    /// A template's static zone differs from the rest of its family
    #[error("Prefix drift in '{template}': static zone differs from family '{family}'")]
    PrefixDrift {
        template: String,
        family: String,
        expected_hash: String,
        actual_hash: String,
    },

    /// An inference call exceeded its time budget
    #[error("Inference timeout for '{agent}' after {seconds:.1}s")]
    InferenceTimeout { agent: String, seconds: f64 },

    /// An inference call failed (transport error, bad status, empty stream)
    #[error("Inference call failed: {message}")]
    InferenceCallFailed {
        message: String,
        status_code: Option<u16>,
        context: Option<String>,
    },

    /// Every selected agent failed
    #[error("All agents failed: {}", summarize_failures(.failures))]
    AllAgentsFailed { failures: Vec<(String, String)> },

    /// Invalid input errors
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        field: Option<String>,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// Generic errors
    #[error("{message}")]
    Other {
        message: String,
        context: Option<String>,
    },
}

fn summarize_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(agent, error)| format!("{}: {}", agent, error))
        .collect::<Vec<_>>()
        .join("; ")
}
