//! Constructor methods for TellerError

use super::types::TellerError;

impl TellerError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    pub fn template_not_found(name: impl Into<String>) -> Self {
        Self::TemplateNotFound { name: name.into() }
    }

    /// Create a render error
    pub fn render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Render {
            template: template.into(),
            message: message.into(),
            field: None,
        }
    }

    /// Create a render error naming the offending field
    pub fn missing_field(template: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::Render {
            template: template.into(),
            message: format!("required field '{}' has no value", field),
            field: Some(field),
        }
    }

    pub fn inference_timeout(agent: impl Into<String>, seconds: f64) -> Self {
        Self::InferenceTimeout {
            agent: agent.into(),
            seconds,
        }
    }

    /// Create an inference failure
    pub fn inference(message: impl Into<String>) -> Self {
        Self::InferenceCallFailed {
            message: message.into(),
            status_code: None,
            context: None,
        }
    }

    /// Create an inference failure carrying the HTTP status
    pub fn inference_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::InferenceCallFailed {
            message: message.into(),
            status_code: Some(status_code),
            context: None,
        }
    }

    /// Create a new invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: None,
        }
    }

    /// Create an IO error with path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            context: None,
        }
    }

    /// Attach context to errors that carry a context slot
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        match &mut self {
            Self::Config { context, .. }
            | Self::InferenceCallFailed { context, .. }
            | Self::Other { context, .. } => *context = Some(ctx.into()),
            _ => {}
        }
        self
    }
}
