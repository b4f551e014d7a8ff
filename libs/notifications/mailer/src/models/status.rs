//! Outcome of a prepare/send attempt.

use serde::{Deserialize, Serialize};

/// Result record filled by handlers.
///
/// A fresh value is a failure with an empty message; handlers flip it on
/// success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub success: bool,
    pub code: String,
    pub message: String,
    pub trace: String,
    pub debug: Vec<String>,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn set_failure(&mut self, message: impl Into<String>) {
        self.success = false;
        self.message = message.into();
    }

    pub fn push_debug(&mut self, line: impl Into<String>) {
        self.debug.push(line.into());
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_failure(&self) -> bool {
        !self.success
    }

    /// Debug lines as a JSON array string.
    pub fn debug_json(&self) -> String {
        serde_json::to_string(&self.debug).unwrap_or_else(|_| "[]".to_string())
    }
}
