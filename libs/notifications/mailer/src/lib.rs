//! Unified email dispatch.
//!
//! One builder API ([`Mailer`]) in front of four delivery backends:
//!
//! - `SMTP_RICH` - MIME message assembled in-process, sent over an SMTP relay
//!   or the local sendmail binary
//! - `SMTP_PLAIN` - mail description handed to an SMTP transport
//! - `API` / `API_BULK` - JSON body posted to a transactional email API
//!
//! In `TEST` mode every address is redirected to the configured webmasters
//! and subjects are prefixed with `[TEST] `. A disabled mailer never touches
//! a transport.
//!
//! ## Usage
//!
//! ```ignore
//! use mailer::{Mailer, MailerConfig};
//!
//! let config = MailerConfig::load("mailer.yaml")?;
//! let mut mailer = Mailer::new(config);
//! mailer.set_mode_live().use_api().enable();
//! mailer
//!     .init(true)
//!     .add_recipient("client@example.com", "Client")
//!     .set_subject("Your invoice")
//!     .set_html("<p>Hello</p>");
//! mailer.add_attachment("/tmp/invoice.pdf", "invoice.pdf")?;
//! let status = mailer.prepare().send().last_sent_status();
//! ```

pub mod config;
pub mod error;
pub mod handler;
pub mod mailer;
pub mod models;
pub mod monitoring;
pub mod transport;

mod compose;
mod mime;

pub use config::{ApiConfig, MailerConfig, SmtpConfig};
pub use error::{MailerError, MailerResult};
pub use handler::{Handler, HandlerState, Outgoing};
pub use mailer::{Backend, Mailer, Mode, DEFAULT_MAX_ATTACHMENT_BYTES};
pub use models::{Address, AddressInput, Attachment, Bulk, Param, Status, Variable};
pub use monitoring::{CallbackMonitor, Monitor, Monitoring};
pub use transport::{
    ApiTransport, HttpApiTransport, LettreTransport, MimeTransport, PlainTransport,
    RecordingTransport, TransportError, TransportResponse,
};

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use uuid::Uuid;

    /// Write `bytes` to a fresh file called `name` under the temp dir.
    pub fn temp_file(name: &str, bytes: &[u8]) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mailer-{}", Uuid::new_v4().simple()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }
}
