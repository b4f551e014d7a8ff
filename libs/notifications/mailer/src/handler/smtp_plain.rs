//! SMTP handler that hands a simple mail description to its transport.

use super::smtp_rich::NOT_PREPARED;
use super::{substitute_variables, Handler, HandlerState, Outgoing, Progress};
use crate::config::SmtpConfig;
use crate::mailer::Backend;
use crate::models::{Param, Status};
use crate::transport::{PlainMail, PlainTransport, TransportError};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SmtpPlainHandler {
    config: SmtpConfig,
    transport: Option<Arc<dyn PlainTransport>>,
    mail: Option<PlainMail>,
    progress: Progress,
}

fn describe(param: &mut Param) -> PlainMail {
    substitute_variables(param);
    PlainMail {
        charset: param.charset().to_string(),
        from: param.from().cloned(),
        to: param.recipients().to_vec(),
        reply: param.replies().to_vec(),
        cc: param.copies().to_vec(),
        bcc: param.blinds().to_vec(),
        subject: param.subject().to_string(),
        html: param.html().to_string(),
        text: param.text().to_string(),
        attachments: param.attachments().to_vec(),
        embeds: param.embeds().to_vec(),
    }
}

impl SmtpPlainHandler {
    pub fn new(
        config: &SmtpConfig,
        transport: Result<Arc<dyn PlainTransport>, TransportError>,
    ) -> Self {
        let (transport, progress) = Progress::start(transport);
        Self {
            config: config.clone(),
            transport,
            mail: None,
            progress,
        }
    }

    /// Prepared mail description.
    pub fn mail(&self) -> Option<&PlainMail> {
        self.mail.as_ref()
    }
}

impl Handler for SmtpPlainHandler {
    fn backend(&self) -> Backend {
        Backend::SmtpPlain
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

        let mail = describe(param);
        debug!(recipients = mail.recipient_count(), "Plain mail prepared");
        self.mail = Some(mail);
        self.progress.prepared();
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
        match &self.mail {
            None => status.set_failure(NOT_PREPARED),
            Some(mail) => match transport.deliver(mail) {
                Ok(response) => {
                    let lines = response.lines();
                    if self.config.debug {
                        status.debug.extend(lines.iter().cloned());
                    }
                    if response.success {
                        status.success = true;
                        info!("Message delivered over SMTP");
                    } else {
                        let detail = if lines.is_empty() {
                            response.reason.clone()
                        } else {
                            lines.join(" ")
                        };
                        status.set_failure(detail);
                        status.code = response.reason;
                        warn!(code = %status.code, "SMTP server refused the message");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockPlainTransport, TransportResponse};
    use serde_json::json;

    #[test]
    fn test_prepare_fills_mail_description() {
        let mut transport = MockPlainTransport::new();
        transport
            .expect_deliver()
            .withf(|mail| {
                mail.html == "<p>Hi Ann</p>"
                    && mail.text == "Hi"
                    && mail.to.len() == 1
                    && mail.embeds.len() == 1
                    && mail.attachments.len() == 1
            })
            .times(1)
            .returning(|_| Ok(TransportResponse::accepted(json!(["250 OK"]), "250")));

        let config = SmtpConfig {
            host: "localhost".to_string(),
            port: 1025,
            ..SmtpConfig::default()
        };
        let mut handler = SmtpPlainHandler::new(&config, Ok(Arc::new(transport)));
        let mut param = Param::new()
            .with_from("from@x.com", "")
            .with_recipient("to@x.com", "")
            .with_html("<p>Hi {{var:name}}</p>")
            .with_text("Hi")
            .with_variable("name", "Ann")
            .with_attachment("/tmp/report.pdf", "report.pdf")
            .with_embed("/tmp/logo.png", "logo.png", Some("logo"));
        param.set_via("SMTP_PLAIN");

        handler.prepare(Outgoing::Single(&mut param));
        assert_eq!(param.via(), "SMTP_PLAIN - [1025] localhost");
        assert_eq!(handler.mail().map(|m| m.subject.as_str()), Some(""));
        handler.send();
        assert!(handler.status().success);
        assert!(handler.status().debug.is_empty());
    }

    #[test]
    fn test_refusal_and_transport_error() {
        let mut transport = MockPlainTransport::new();
        transport
            .expect_deliver()
            .times(1)
            .returning(|_| Ok(TransportResponse::rejected(json!(["554 rejected"]), "554")));
        let mut handler = SmtpPlainHandler::new(
            &SmtpConfig {
                debug: true,
                ..SmtpConfig::default()
            },
            Ok(Arc::new(transport)),
        );
        handler.prepare(Outgoing::Single(&mut Param::new()));
        handler.send();
        assert_eq!(handler.status().message, "554 rejected");
        assert_eq!(handler.status().code, "554");
        assert_eq!(handler.status().debug, vec!["554 rejected".to_string()]);

        let mut transport = MockPlainTransport::new();
        transport
            .expect_deliver()
            .returning(|_| Err(TransportError::Connection("refused".to_string())));
        let mut handler = SmtpPlainHandler::new(&SmtpConfig::default(), Ok(Arc::new(transport)));
        handler.prepare(Outgoing::Single(&mut Param::new()));
        handler.send();
        assert!(handler.status().message.contains("refused"));
    }

    #[test]
    fn test_send_before_prepare() {
        let transport = MockPlainTransport::new();
        let mut handler = SmtpPlainHandler::new(&SmtpConfig::default(), Ok(Arc::new(transport)));
        handler.send();
        assert!(!handler.status().success);
        assert_eq!(handler.status().message, NOT_PREPARED);
    }
}
