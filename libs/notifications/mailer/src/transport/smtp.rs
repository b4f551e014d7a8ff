//! SMTP delivery through lettre's blocking transports.

use super::{MimeTransport, PlainMail, PlainTransport, TransportError, TransportResponse};
use crate::compose::{self, FilePart};
use crate::config::SmtpConfig;
use crate::models::Attachment;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SendmailTransport, SmtpTransport, Transport};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

enum Inner {
    Smtp(SmtpTransport),
    Sendmail(SendmailTransport),
}

/// SMTP relay or local sendmail.
pub struct LettreTransport {
    inner: Inner,
}

impl LettreTransport {
    /// Transport for the rich backend: local sendmail when the config names
    /// no host, port or security mode, a relay otherwise.
    pub fn rich(config: &SmtpConfig) -> Result<Self, TransportError> {
        if config.is_local() {
            debug!("Using local sendmail transport");
            return Ok(Self::sendmail());
        }
        Self::relay(config)
    }

    pub fn sendmail() -> Self {
        Self {
            inner: Inner::Sendmail(SendmailTransport::new()),
        }
    }

    /// SMTP relay; `localhost` when no host is set. The port defaults to
    /// lettre's default for the security mode.
    pub fn relay(config: &SmtpConfig) -> Result<Self, TransportError> {
        let host = config.host_or_default();
        let mut builder = match config.secure.as_str() {
            "ssl" => SmtpTransport::relay(host)?,
            "tls" => SmtpTransport::starttls_relay(host)?,
            "" => SmtpTransport::builder_dangerous(host),
            other => {
                return Err(TransportError::Config(format!(
                    "unknown secure mode '{}', expected ssl or tls",
                    other
                )))
            }
        };

        if config.port != 0 {
            builder = builder.port(config.port);
        }
        if config.has_credentials() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Some(Duration::from_secs(secs)));
        }

        debug!(host = %host, port = config.port, secure = %config.secure, "SMTP relay configured");
        Ok(Self {
            inner: Inner::Smtp(builder.build()),
        })
    }

    fn send(&self, message: &Message) -> Result<TransportResponse, TransportError> {
        match &self.inner {
            Inner::Smtp(transport) => match transport.send(message) {
                Ok(response) => {
                    let lines: Vec<String> = response.message().map(str::to_string).collect();
                    let reason = response.code().to_string();
                    if response.is_positive() {
                        Ok(TransportResponse::accepted(json!(lines), reason))
                    } else {
                        Ok(TransportResponse::rejected(json!(lines), reason))
                    }
                }
                Err(e) if e.is_permanent() => {
                    let reason = e.status().map(|code| code.to_string()).unwrap_or_default();
                    warn!(error = %e, "SMTP server rejected the message");
                    Ok(TransportResponse::rejected(json!([e.to_string()]), reason))
                }
                Err(e) => Err(e.into()),
            },
            Inner::Sendmail(transport) => transport
                .send(message)
                .map(|()| TransportResponse::accepted(json!([]), "sendmail"))
                .map_err(|e| TransportError::Smtp(e.to_string())),
        }
    }
}

impl MimeTransport for LettreTransport {
    fn deliver(&self, message: &Message) -> Result<TransportResponse, TransportError> {
        self.send(message)
    }
}

fn file_part(file: &Attachment, inline: bool) -> Option<FilePart> {
    let Some(bytes) = file.read() else {
        warn!(name = %file.name(), path = %file.path().display(), "Skipping unreadable file");
        return None;
    };
    Some(FilePart {
        name: file.name().to_string(),
        content_id: inline.then(|| file.id()),
        bytes,
        mime_type: file.mime_type(),
    })
}

/// Build the MIME message for a [`PlainMail`], reading its files.
pub fn plain_message(mail: &PlainMail) -> Result<Message, TransportError> {
    let builder = compose::headers(
        mail.from.as_ref(),
        &mail.to,
        &mail.cc,
        &mail.bcc,
        &mail.reply,
        &mail.subject,
    );
    let inline = mail.embeds.iter().filter_map(|f| file_part(f, true)).collect();
    let files = mail
        .attachments
        .iter()
        .filter_map(|f| file_part(f, false))
        .collect();
    Ok(compose::assemble(
        builder,
        &mail.charset,
        &mail.html,
        &mail.text,
        inline,
        files,
    )?)
}

impl PlainTransport for LettreTransport {
    fn deliver(&self, mail: &PlainMail) -> Result<TransportResponse, TransportError> {
        let message = plain_message(mail)?;
        self.send(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use crate::test_support::temp_file;

    #[test]
    fn test_unknown_secure_mode_is_config_error() {
        let config = SmtpConfig {
            host: "mx.local".to_string(),
            secure: "starttls-please".to_string(),
            ..SmtpConfig::default()
        };
        assert!(matches!(
            LettreTransport::relay(&config),
            Err(TransportError::Config(_))
        ));
    }

    #[test]
    fn test_relay_builds_for_each_mode() {
        for secure in ["", "ssl", "tls"] {
            let config = SmtpConfig {
                host: "mx.local".to_string(),
                port: 2525,
                secure: secure.to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
                timeout_secs: Some(5),
                ..SmtpConfig::default()
            };
            assert!(LettreTransport::relay(&config).is_ok(), "{secure}");
        }
    }

    #[test]
    fn test_rich_without_settings_uses_sendmail() {
        let transport = LettreTransport::rich(&SmtpConfig::default()).unwrap();
        assert!(matches!(transport.inner, Inner::Sendmail(_)));
    }

    #[test]
    fn test_plain_message_reads_files() {
        let logo = temp_file("logo.png", b"png-bytes");
        let doc = temp_file("doc.txt", b"document");
        let mail = PlainMail {
            charset: "UTF-8".to_string(),
            from: Some(Address::new("from@x.com", "From")),
            to: vec![Address::new("to@x.com", "")],
            subject: "Files".to_string(),
            html: "<img src=\"cid:logo\">".to_string(),
            text: "alt".to_string(),
            attachments: vec![
                Attachment::new(&doc, "doc.txt"),
                Attachment::new("/definitely/missing.txt", "missing.txt"),
            ],
            embeds: vec![Attachment::embed(&logo, "logo.png", Some("logo"))],
            ..PlainMail::default()
        };
        let raw = String::from_utf8_lossy(&plain_message(&mail).unwrap().formatted()).into_owned();
        assert!(raw.contains("Content-ID: <logo>"));
        assert!(raw.contains("filename=\"doc.txt\""));
        assert!(!raw.contains("missing.txt"));
    }
}
