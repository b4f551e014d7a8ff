//! Backend handlers.
//!
//! A handler is built for one message, prepared once and sent. Neither
//! step returns an error: failures are recorded in the handler's
//! [`Status`] and a failed handler never reaches its transport.

mod api;
mod format;
mod smtp_plain;
mod smtp_rich;

pub use api::{ApiBulkHandler, ApiHandler};
pub use format::{ApiBody, ApiMessage, TemplateId};
pub use smtp_plain::SmtpPlainHandler;
pub use smtp_rich::SmtpRichHandler;

use crate::mailer::Backend;
use crate::models::{Bulk, Param, Status};
use crate::transport::TransportError;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Message handed to [`Handler::prepare`].
#[derive(Debug)]
pub enum Outgoing<'a> {
    Single(&'a mut Param),
    Bulk(&'a mut Bulk),
}

/// Where a handler is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerState {
    #[default]
    Constructed,
    Prepared,
    Sent,
    /// Construction or preparation failed; send is a no-op.
    Failed,
}

/// Common contract of the four backends.
pub trait Handler {
    fn backend(&self) -> Backend;

    /// Format the message into the backend payload.
    fn prepare(&mut self, message: Outgoing<'_>);

    /// Deliver the prepared payload.
    fn send(&mut self);

    fn status(&self) -> &Status;

    fn state(&self) -> HandlerState;
}

/// State and status shared by every handler implementation.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    pub state: HandlerState,
    pub status: Status,
}

impl Progress {
    /// Start from a transport build result; an error marks the handler failed.
    pub fn start<T>(transport: Result<T, TransportError>) -> (Option<T>, Self) {
        let mut progress = Self::default();
        match transport {
            Ok(transport) => (Some(transport), progress),
            Err(e) => {
                tracing::warn!(error = %e, "Mail transport could not be built");
                progress.fail(e.to_string());
                (None, progress)
            }
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = HandlerState::Failed;
        self.status.set_failure(message);
    }

    pub fn is_failed(&self) -> bool {
        self.state == HandlerState::Failed
    }

    pub fn prepared(&mut self) {
        if !self.is_failed() {
            self.state = HandlerState::Prepared;
        }
    }

    /// Reset the status for a new attempt.
    pub fn begin_send(&mut self) {
        self.status = Status::new();
    }
}

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{var:([^{}]+)\}\}").expect("variable pattern"));

/// Replace `{{var:KEY}}` tokens of the HTML body with the variable values.
/// Unknown keys are left untouched.
pub(crate) fn substitute_variables(param: &mut Param) {
    if param.variables().is_empty() || param.html().is_empty() {
        return;
    }
    let html = VARIABLE
        .replace_all(param.html(), |caps: &Captures| {
            param
                .variables()
                .get(&caps[1])
                .map(|value| value.as_text())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned();
    param.set_html(html);
}
