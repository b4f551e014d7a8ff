//! Error types for the mailer.
//!
//! Only configuration and input errors are ever returned to the caller.
//! Transport failures are absorbed into [`crate::Status`] by the handlers.

use thiserror::Error;

/// Result type for mailer operations.
pub type MailerResult<T> = Result<T, MailerError>;

/// Errors raised by the builder API and configuration loading.
#[derive(Debug, Error)]
pub enum MailerError {
    /// Unknown mode name.
    #[error("Mode is not allowed : {value}, must be {allowed}")]
    InvalidMode { value: String, allowed: String },

    /// Unknown backend name.
    #[error("Handler mode is not allowed : {value}, must be {allowed}")]
    InvalidBackend { value: String, allowed: String },

    /// A required configuration value is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An address given as a map has no `email` entry.
    #[error("Email key not found in address.")]
    MissingEmailKey,

    /// An address was neither a string nor an `{email, name}` map.
    #[error("The address type is not supported: {0}")]
    UnsupportedAddress(String),

    /// Attachment or embed file is missing or empty.
    #[error("Can't load attachment file : {name}[{path}]")]
    AttachmentUnreadable { name: String, path: String },

    /// Cumulative attachment size went over the budget.
    #[error("The maximum size of attachments has been exceeded : {total}/{max}")]
    AttachmentTooLarge { total: u64, max: u64 },
}

impl From<core_config::ConfigError> for MailerError {
    fn from(err: core_config::ConfigError) -> Self {
        MailerError::Config(err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for MailerError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        MailerError::Config(format!("Yaml config empty or malformed: {}", err))
    }
}
