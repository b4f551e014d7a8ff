//! Delivery seams used by the handlers.
//!
//! Each backend shape has its own trait so handlers can be exercised with a
//! spy or a mock while production uses lettre and reqwest.

pub mod http;
pub mod recording;
pub mod smtp;

pub use http::HttpApiTransport;
pub use recording::RecordingTransport;
pub use smtp::LettreTransport;

use crate::models::{Address, Attachment};
use serde_json::Value;
use thiserror::Error;

/// What a transport reports back for one delivery attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    pub success: bool,
    /// Decoded response body; SMTP transports put the server reply lines here.
    pub body: Value,
    /// HTTP reason phrase or SMTP reply code.
    pub reason: String,
}

impl TransportResponse {
    pub fn accepted(body: Value, reason: impl Into<String>) -> Self {
        Self {
            success: true,
            body,
            reason: reason.into(),
        }
    }

    pub fn rejected(body: Value, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            body,
            reason: reason.into(),
        }
    }

    /// Body entries as text lines (array items, or the body itself).
    pub fn lines(&self) -> Vec<String> {
        match &self.body {
            Value::Null => Vec::new(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Value::String(s) => vec![s.clone()],
            other => vec![other.to_string()],
        }
    }
}

/// Transport-level failure. Handlers turn it into a failed status.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport configuration error: {0}")]
    Config(String),

    #[error("Could not build message: {0}")]
    Message(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Connection failed: {0}")]
    Connection(String),
}

impl From<lettre::error::Error> for TransportError {
    fn from(err: lettre::error::Error) -> Self {
        TransportError::Message(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for TransportError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        TransportError::Smtp(err.to_string())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err.to_string())
    }
}

/// Simple mail description; the transport reads files and resolves MIME
/// types itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlainMail {
    pub charset: String,
    pub from: Option<Address>,
    pub to: Vec<Address>,
    pub reply: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub subject: String,
    pub html: String,
    /// Alternative part when `html` is set, the body otherwise.
    pub text: String,
    pub attachments: Vec<Attachment>,
    /// Inline images, referenced from the HTML as `cid:<id>`.
    pub embeds: Vec<Attachment>,
}

impl PlainMail {
    pub fn recipient_count(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }
}

/// Delivers a complete MIME message.
#[cfg_attr(test, mockall::automock)]
pub trait MimeTransport: Send + Sync {
    fn deliver(&self, message: &lettre::Message) -> Result<TransportResponse, TransportError>;
}

/// Delivers a [`PlainMail`].
#[cfg_attr(test, mockall::automock)]
pub trait PlainTransport: Send + Sync {
    fn deliver(&self, mail: &PlainMail) -> Result<TransportResponse, TransportError>;
}

/// Posts a JSON body to the transactional API.
#[cfg_attr(test, mockall::automock)]
pub trait ApiTransport: Send + Sync {
    fn post(&self, body: &Value) -> Result<TransportResponse, TransportError>;
}
