//! Spy transport that records payloads instead of delivering them.

use super::{
    ApiTransport, MimeTransport, PlainMail, PlainTransport, TransportError, TransportResponse,
};
use lettre::Message;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// Payload captured by a [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    /// Formatted MIME message.
    Mime(Vec<u8>),
    Plain(PlainMail),
    Api(Value),
}

#[derive(Debug, Clone)]
enum Outcome {
    Accept(Value),
    Reject { body: Value, reason: String },
    Fail(String),
}

#[derive(Debug)]
struct State {
    outcome: Outcome,
    calls: usize,
    recorded: Vec<Recorded>,
}

/// Implements every transport trait; clones share the same record.
#[derive(Debug, Clone)]
pub struct RecordingTransport {
    state: Arc<Mutex<State>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    /// Accepts everything.
    pub fn new() -> Self {
        Self::with_outcome(Outcome::Accept(json!({"Messages": [{"Status": "success"}]})))
    }

    /// Answers with a rejection carrying `body` and `reason`.
    pub fn rejecting(body: Value, reason: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Reject {
            body,
            reason: reason.into(),
        })
    }

    /// Fails at transport level.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_outcome(Outcome::Fail(message.into()))
    }

    fn with_outcome(outcome: Outcome) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                outcome,
                calls: 0,
                recorded: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.lock().recorded.clone()
    }

    /// JSON bodies posted so far.
    pub fn api_bodies(&self) -> Vec<Value> {
        self.lock()
            .recorded
            .iter()
            .filter_map(|r| match r {
                Recorded::Api(body) => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn plain_mails(&self) -> Vec<PlainMail> {
        self.lock()
            .recorded
            .iter()
            .filter_map(|r| match r {
                Recorded::Plain(mail) => Some(mail.clone()),
                _ => None,
            })
            .collect()
    }

    /// Formatted MIME messages as text.
    pub fn mime_messages(&self) -> Vec<String> {
        self.lock()
            .recorded
            .iter()
            .filter_map(|r| match r {
                Recorded::Mime(raw) => Some(String::from_utf8_lossy(raw).into_owned()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.calls = 0;
        state.recorded.clear();
    }

    fn record(&self, payload: Recorded) -> Result<TransportResponse, TransportError> {
        let mut state = self.lock();
        state.calls += 1;
        match state.outcome.clone() {
            Outcome::Fail(message) => Err(TransportError::Connection(message)),
            Outcome::Accept(body) => {
                state.recorded.push(payload);
                Ok(TransportResponse::accepted(body, "OK"))
            }
            Outcome::Reject { body, reason } => {
                state.recorded.push(payload);
                Ok(TransportResponse::rejected(body, reason))
            }
        }
    }
}

impl MimeTransport for RecordingTransport {
    fn deliver(&self, message: &Message) -> Result<TransportResponse, TransportError> {
        self.record(Recorded::Mime(message.formatted()))
    }
}

impl PlainTransport for RecordingTransport {
    fn deliver(&self, mail: &PlainMail) -> Result<TransportResponse, TransportError> {
        self.record(Recorded::Plain(mail.clone()))
    }
}

impl ApiTransport for RecordingTransport {
    fn post(&self, body: &Value) -> Result<TransportResponse, TransportError> {
        self.record(Recorded::Api(body.clone()))
    }
}
