//! UnifiedError trait implementation for TellerError

use super::types::{TellerError, UnifiedError};

impl UnifiedError for TellerError {
    fn error_code(&self) -> &str {
        match self {
            Self::Config { .. } => "TELLER_CONFIG",
            Self::TemplateNotFound { .. } => "TELLER_TEMPLATE_NOT_FOUND",
            Self::Render { .. } => "TELLER_RENDER",
            Self::PrefixDrift { .. } => "TELLER_PREFIX_DRIFT",
            Self::InferenceTimeout { .. } => "TELLER_INFERENCE_TIMEOUT",
            Self::InferenceCallFailed { .. } => "TELLER_INFERENCE_FAILED",
            Self::AllAgentsFailed { .. } => "TELLER_ALL_AGENTS_FAILED",
            Self::InvalidInput { .. } => "TELLER_INVALID_INPUT",
            Self::Io { .. } => "TELLER_IO",
            Self::Json { .. } => "TELLER_JSON",
            Self::Other { .. } => "TELLER_OTHER",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Config { message, .. } => message,
            Self::TemplateNotFound { name } => name,
            Self::Render { message, .. } => message,
            Self::PrefixDrift { .. } => "static zone differs from template family",
            Self::InferenceTimeout { .. } => "inference call timed out",
            Self::InferenceCallFailed { message, .. } => message,
            Self::AllAgentsFailed { .. } => "all selected agents failed",
            Self::InvalidInput { message, .. } => message,
            Self::Io { message, .. } => message,
            Self::Json { message } => message,
            Self::Other { message, .. } => message,
        }
    }

    fn context(&self) -> Option<&str> {
        match self {
            Self::Config { context, .. } => context.as_deref(),
            Self::InferenceCallFailed { context, .. } => context.as_deref(),
            Self::Render { field, .. } => field.as_deref(),
            Self::InvalidInput { field, .. } => field.as_deref(),
            Self::Io { path, .. } => path.as_deref(),
            Self::Other { context, .. } => context.as_deref(),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InferenceTimeout { .. } | Self::InferenceCallFailed { .. }
        )
    }
}
