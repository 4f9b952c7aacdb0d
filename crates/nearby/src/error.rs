use crate::provider::ProviderStatusCode;
use crate::types::PublishId;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NearbyError {
    #[error("Nearby provider is not available on this device")]
    UnsupportedEnvironment,

    #[error("Nearby Messages API not initialized")]
    NotInitialized,

    #[error("Nearby Messages API already initialized")]
    AlreadyInitialized,

    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Must provide {0}")]
    MissingArgument(&'static str),

    #[error("Must provide message with {field}")]
    InvalidMessage { field: &'static str },

    #[error("Message id not found: {0}")]
    MessageNotFound(PublishId),

    #[error("Provider error: {message}")]
    Provider {
        code: Option<ProviderStatusCode>,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NearbyError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        NearbyError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Log error with structured context
    pub fn log_with_context(&self, context: &ErrorContext) {
        error!(
            error = %self,
            category = %self.category(),
            command = ?context.command,
            publish_id = ?context.publish_id,
            additional_info = ?context.additional_info,
            timestamp = %chrono::Utc::now(),
            "Nearby command failed"
        );
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            NearbyError::UnsupportedEnvironment => {
                "Nearby messaging is not available on this device.".to_string()
            }
            NearbyError::NotInitialized => {
                "Nearby messaging has not been started yet. Please initialize it first.".to_string()
            }
            NearbyError::AlreadyInitialized => {
                "Nearby messaging is already running.".to_string()
            }
            NearbyError::Validation { field, reason } => {
                format!("The option '{}' is invalid: {}.", field, reason)
            }
            NearbyError::MissingArgument(name) => {
                format!("The call is missing its {}.", name)
            }
            NearbyError::InvalidMessage { field } => {
                format!("The message cannot be published without a {}.", field)
            }
            NearbyError::MessageNotFound(id) => {
                format!("Message '{}' is not published. It may have expired.", id)
            }
            NearbyError::Provider { code: Some(code), message } => {
                format!("{}: {}", code.description(), message)
            }
            NearbyError::Provider { code: None, message } => {
                format!("Nearby reported an error: {}. Please try again.", message)
            }
            NearbyError::Serialization(details) => {
                format!("Data processing error: {}. Please check the call arguments.", details)
            }
            NearbyError::Internal(details) => {
                format!("An internal error occurred: {}.", details)
            }
        }
    }

    /// Get error category for the command boundary and monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            NearbyError::UnsupportedEnvironment => ErrorCategory::Unsupported,
            NearbyError::NotInitialized => ErrorCategory::Session,
            NearbyError::AlreadyInitialized => ErrorCategory::Session,
            NearbyError::Validation { .. } => ErrorCategory::Validation,
            NearbyError::MissingArgument(_) => ErrorCategory::Validation,
            NearbyError::InvalidMessage { .. } => ErrorCategory::Validation,
            NearbyError::MessageNotFound(_) => ErrorCategory::NotFound,
            NearbyError::Provider { code, .. } => match code {
                Some(code) if code.is_permission_related() => ErrorCategory::Permission,
                _ => ErrorCategory::Provider,
            },
            NearbyError::Serialization(_) => ErrorCategory::Validation,
            NearbyError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for NearbyError {
    fn from(err: serde_json::Error) -> Self {
        NearbyError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NearbyError>;

/// Context for error logging
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub command: Option<String>,
    pub publish_id: Option<PublishId>,
    pub additional_info: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_publish_id(mut self, publish_id: PublishId) -> Self {
        self.publish_id = Some(publish_id);
        self
    }

    pub fn with_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }
}

/// Error categories reported across the command boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Unsupported,
    Session,
    Validation,
    NotFound,
    Permission,
    Provider,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Unsupported => write!(f, "unsupported"),
            ErrorCategory::Session => write!(f, "session"),
            ErrorCategory::Validation => write!(f, "validation"),
            ErrorCategory::NotFound => write!(f, "not_found"),
            ErrorCategory::Permission => write!(f, "permission"),
            ErrorCategory::Provider => write!(f, "provider"),
            ErrorCategory::Internal => write!(f, "internal"),
        }
    }
}
