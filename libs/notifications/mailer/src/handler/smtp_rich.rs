//! SMTP handler that assembles the full MIME message itself.

use super::{substitute_variables, Handler, HandlerState, Outgoing, Progress};
use crate::compose::{self, FilePart};
use crate::config::SmtpConfig;
use crate::mailer::Backend;
use crate::models::{Attachment, Param, Status};
use crate::transport::{MimeTransport, TransportError};
use lettre::Message;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const NOT_SENT: &str = "Error : no email has been sent.";
pub const NOT_PREPARED: &str = "Message not prepared.";

pub struct SmtpRichHandler {
    config: SmtpConfig,
    transport: Option<Arc<dyn MimeTransport>>,
    message: Option<Message>,
    progress: Progress,
}

fn file_part(file: &Attachment, content_id: Option<String>) -> Option<FilePart> {
    match file.read() {
        Some(bytes) => Some(FilePart {
            name: file.name().to_string(),
            content_id,
            bytes,
            mime_type: file.mime_type(),
        }),
        None => {
            warn!(name = %file.name(), path = %file.path().display(), "Skipping unreadable file");
            None
        }
    }
}

/// Point every embed id found in `html` at its content id, in one pass so
/// that an id contained in another id never rewrites a finished reference.
fn link_embeds(
    html: &str,
    content_ids: &HashMap<String, String>,
) -> Result<String, TransportError> {
    if html.is_empty() || content_ids.is_empty() {
        return Ok(html.to_string());
    }
    let mut ids: Vec<&str> = content_ids.keys().map(String::as_str).collect();
    ids.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    let pattern = ids.into_iter().map(regex::escape).collect::<Vec<_>>().join("|");
    let matcher = Regex::new(&pattern).map_err(|e| TransportError::Message(e.to_string()))?;
    Ok(matcher
        .replace_all(html, |caps: &Captures| match content_ids.get(&caps[0]) {
            Some(cid) => format!("cid:{}", cid),
            None => caps[0].to_string(),
        })
        .into_owned())
}

/// Build the MIME message. Variables of `param` are substituted; embed ids
/// are linked to content ids in the message body only.
fn build_message(param: &mut Param) -> Result<Message, TransportError> {
    substitute_variables(param);

    let mut content_ids = HashMap::new();
    let mut inline = Vec::new();
    for embed in param.embeds() {
        let cid = format!("{}@mailer", Uuid::new_v4().simple());
        let id = embed.id();
        if !id.is_empty() {
            content_ids.entry(id).or_insert_with(|| cid.clone());
        }
        if let Some(part) = file_part(embed, Some(cid)) {
            inline.push(part);
        }
    }
    let html = link_embeds(param.html(), &content_ids)?;

    let files = param
        .attachments()
        .iter()
        .filter_map(|file| file_part(file, None))
        .collect();

    let builder = compose::headers(
        param.from(),
        &param.recipients().to_vec(),
        &param.copies().to_vec(),
        &param.blinds().to_vec(),
        &param.replies().to_vec(),
        param.subject(),
    );
    Ok(compose::assemble(
        builder,
        param.charset(),
        &html,
        param.text(),
        inline,
        files,
    )?)
}

impl SmtpRichHandler {
    pub fn new(
        config: &SmtpConfig,
        transport: Result<Arc<dyn MimeTransport>, TransportError>,
    ) -> Self {
        let (transport, progress) = Progress::start(transport);
        Self {
            config: config.clone(),
            transport,
            message: None,
            progress,
        }
    }

    /// Prepared message.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }
}

impl Handler for SmtpRichHandler {
    fn backend(&self) -> Backend {
        Backend::SmtpRich
    }

    fn prepare(&mut self, message: Outgoing<'_>) {
        let Outgoing::Single(param) = message else {
            self.progress.fail("The SMTP handler sends a single message.");
            return;
        };
        if self.progress.is_failed() {
            return;
        }
        param.append_via(&self.config.via_suffix());

        match build_message(param) {
            Ok(message) => {
                self.message = Some(message);
                self.progress.prepared();
                debug!(to = %param.recipient_str(), "MIME message prepared");
            }
            Err(e) => self.progress.fail(e.to_string()),
        }
    }

    fn send(&mut self) {
        if self.progress.is_failed() {
            return;
        }
        let Some(transport) = self.transport.as_deref() else {
            return;
        };
        self.progress.begin_send();
        let status = &mut self.progress.status;
        match &self.message {
            None => status.set_failure(NOT_PREPARED),
            Some(message) => match transport.deliver(message) {
                Ok(response) => {
                    if self.config.debug {
                        status.debug.extend(response.lines());
                    }
                    if response.success {
                        status.success = true;
                        info!("Message delivered over SMTP");
                    } else {
                        status.set_failure(NOT_SENT);
                        status.code = response.reason.clone();
                        status.trace = response.lines().join("\n");
                        warn!(code = %response.reason, "No recipient accepted the message");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SMTP delivery failed");
                    status.set_failure(e.to_string());
                }
            },
        }
        self.progress.state = HandlerState::Sent;
    }

    fn status(&self) -> &Status {
        &self.progress.status
    }

    fn state(&self) -> HandlerState {
        self.progress.state
    }
}
