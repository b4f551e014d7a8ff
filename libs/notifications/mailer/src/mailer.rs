//! Orchestrator: configuration, mode, backend selection and the
//! prepare/send lifecycle.

use crate::config::MailerConfig;
use crate::error::{MailerError, MailerResult};
use crate::handler::{
    ApiBulkHandler, ApiHandler, Handler, Outgoing, SmtpPlainHandler, SmtpRichHandler,
};
use crate::models::{Address, AddressInput, Bulk, Param, Status, Variable};
use crate::monitoring::{Monitor, Monitoring};
use crate::transport::{
    ApiTransport, HttpApiTransport, LettreTransport, MimeTransport, PlainTransport, TransportError,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use strum::{Display, EnumString, VariantNames};
use tracing::{debug, info, instrument, warn};

/// Default attachment budget: 10 MiB.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

pub const NOT_PREPARED_CORRECTLY: &str = "Mail handler is not prepared correctly.";
pub const DISABLED_NOT_SENT: &str = "[DISABLE] The email is not sent.";
const TEST_SUBJECT_PREFIX: &str = "[TEST] ";

/// TEST redirects every address to the webmasters; LIVE uses the caller's.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Mode {
    #[default]
    Test,
    Live,
}

/// Delivery backend.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    VariantNames,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Backend {
    /// MIME message built in-process, SMTP relay or sendmail.
    SmtpRich,
    /// Mail description handed to the SMTP transport.
    #[default]
    SmtpPlain,
    /// Transactional API, one message.
    Api,
    /// Transactional API, global part plus many messages.
    ApiBulk,
}

impl Mode {
    pub fn parse(value: &str) -> MailerResult<Self> {
        Self::from_str(value.trim()).map_err(|_| MailerError::InvalidMode {
            value: value.to_string(),
            allowed: Self::VARIANTS.join(" | "),
        })
    }
}

impl Backend {
    pub fn parse(value: &str) -> MailerResult<Self> {
        Self::from_str(value.trim()).map_err(|_| MailerError::InvalidBackend {
            value: value.to_string(),
            allowed: Self::VARIANTS.join(" | "),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    To,
    Copy,
    Blind,
    Reply,
}

#[derive(Debug, Clone, Copy)]
enum FileKind {
    Attachment,
    Embed,
}

/// Builds one message (or bulk) at a time and sends it through the
/// selected backend.
///
/// Nothing reaches a transport unless the mailer is enabled; a disabled
/// mailer reports a successful `[DISABLE]` status.
pub struct Mailer {
    config: MailerConfig,
    mode: Mode,
    backend: Backend,
    enabled: bool,
    default_language: String,
    default_language_path: String,
    param: Param,
    bulk: Bulk,
    handler: Option<Box<dyn Handler>>,
    last_status: Option<Status>,
    monitoring: Monitoring,
    max_attachment_bytes: u64,
    attachment_bytes: u64,
    embed_bytes: u64,
    mime_transport: Option<Arc<dyn MimeTransport>>,
    plain_transport: Option<Arc<dyn PlainTransport>>,
    api_transport: Option<Arc<dyn ApiTransport>>,
}

impl Mailer {
    pub fn new(config: MailerConfig) -> Self {
        Self {
            config,
            mode: Mode::default(),
            backend: Backend::default(),
            enabled: false,
            default_language: String::new(),
            default_language_path: String::new(),
            param: Param::new(),
            bulk: Bulk::new(),
            handler: None,
            last_status: None,
            monitoring: Monitoring::default(),
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            attachment_bytes: 0,
            embed_bytes: 0,
            mime_transport: None,
            plain_transport: None,
            api_transport: None,
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &MailerConfig {
        &self.config
    }

    pub fn param(&self) -> &Param {
        &self.param
    }

    pub fn param_mut(&mut self) -> &mut Param {
        &mut self.param
    }

    pub fn bulk_ref(&self) -> &Bulk {
        &self.bulk
    }

    pub fn handler(&self) -> Option<&dyn Handler> {
        self.handler.as_deref()
    }

    pub fn monitoring_mut(&mut self) -> &mut Monitoring {
        &mut self.monitoring
    }

    pub fn set_monitor(&mut self, monitor: impl Monitor + 'static) -> &mut Self {
        self.monitoring.set_monitor(monitor);
        self
    }

    /// Status of the last `send`, or a fresh failure status before any.
    pub fn last_sent_status(&self) -> Status {
        self.last_status.clone().unwrap_or_default()
    }

    // ---- transports ----

    pub fn set_mime_transport(&mut self, transport: Arc<dyn MimeTransport>) -> &mut Self {
        self.mime_transport = Some(transport);
        self
    }

    pub fn set_plain_transport(&mut self, transport: Arc<dyn PlainTransport>) -> &mut Self {
        self.plain_transport = Some(transport);
        self
    }

    pub fn set_api_transport(&mut self, transport: Arc<dyn ApiTransport>) -> &mut Self {
        self.api_transport = Some(transport);
        self
    }

    /// Use one transport for every backend.
    pub fn set_transports<T>(&mut self, transport: T) -> &mut Self
    where
        T: MimeTransport + PlainTransport + ApiTransport + 'static,
    {
        let shared = Arc::new(transport);
        self.mime_transport = Some(shared.clone());
        self.plain_transport = Some(shared.clone());
        self.api_transport = Some(shared);
        self
    }

    fn mime_transport(&self) -> Result<Arc<dyn MimeTransport>, TransportError> {
        match &self.mime_transport {
            Some(transport) => Ok(Arc::clone(transport)),
            None => Ok(Arc::new(LettreTransport::rich(&self.config.smtp_rich)?)),
        }
    }

    fn plain_transport(&self) -> Result<Arc<dyn PlainTransport>, TransportError> {
        match &self.plain_transport {
            Some(transport) => Ok(Arc::clone(transport)),
            None => Ok(Arc::new(LettreTransport::relay(&self.config.smtp_plain)?)),
        }
    }

    fn api_transport(&self) -> Result<Arc<dyn ApiTransport>, TransportError> {
        match &self.api_transport {
            Some(transport) => Ok(Arc::clone(transport)),
            None => Ok(Arc::new(HttpApiTransport::new(&self.config.api)?)),
        }
    }

    // ---- mode, backend, switch ----

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = mode;
        self
    }

    pub fn set_mode_str(&mut self, mode: &str) -> MailerResult<&mut Self> {
        self.mode = Mode::parse(mode)?;
        Ok(self)
    }

    pub fn set_mode_test(&mut self) -> &mut Self {
        self.set_mode(Mode::Test)
    }

    pub fn set_mode_live(&mut self) -> &mut Self {
        self.set_mode(Mode::Live)
    }

    fn is_test(&self) -> bool {
        self.mode == Mode::Test
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn set_backend(&mut self, backend: Backend) -> &mut Self {
        self.backend = backend;
        self
    }

    pub fn set_backend_str(&mut self, backend: &str) -> MailerResult<&mut Self> {
        self.backend = Backend::parse(backend)?;
        Ok(self)
    }

    pub fn use_smtp_rich(&mut self) -> &mut Self {
        self.set_backend(Backend::SmtpRich)
    }

    pub fn use_smtp_plain(&mut self) -> &mut Self {
        self.set_backend(Backend::SmtpPlain)
    }

    pub fn use_api(&mut self) -> &mut Self {
        self.set_backend(Backend::Api)
    }

    pub fn use_api_bulk(&mut self) -> &mut Self {
        self.set_backend(Backend::ApiBulk)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    pub fn enable(&mut self) -> &mut Self {
        self.set_enabled(true)
    }

    pub fn disable(&mut self) -> &mut Self {
        self.set_enabled(false)
    }

    // ---- defaults and limits ----

    /// Language applied to every message created by [`Mailer::init`].
    pub fn set_default_language(&mut self, lang: impl Into<String>) -> &mut Self {
        self.default_language = lang.into();
        self
    }

    pub fn set_default_language_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.default_language_path = path.into();
        self
    }

    pub fn set_file_max_size(&mut self, megabytes: u64) -> &mut Self {
        self.max_attachment_bytes = megabytes.saturating_mul(1024 * 1024);
        self
    }

    pub fn set_max_attachment_bytes(&mut self, bytes: u64) -> &mut Self {
        self.max_attachment_bytes = bytes;
        self
    }

    pub fn max_attachment_bytes(&self) -> u64 {
        self.max_attachment_bytes
    }

    /// Bytes admitted so far for the current message.
    pub fn attachment_bytes(&self) -> u64 {
        self.attachment_bytes + self.embed_bytes
    }

    // ---- lifecycle ----

    /// Start a new message, discarding the current one.
    pub fn init(&mut self, with_from: bool) -> &mut Self {
        self.param = self.fresh_param();
        if with_from {
            if let Some(from) = &self.config.from {
                self.param.set_from(from.email(), from.name());
            }
        }
        self.reset_file_budget();
        self
    }

    /// Move the current message into the bulk, as the global part or as
    /// one more item, and start a new one.
    pub fn bulk(&mut self, global: bool) -> &mut Self {
        let fresh = self.fresh_param();
        let param = std::mem::replace(&mut self.param, fresh);
        if global {
            self.bulk.set_global(param);
        } else {
            self.bulk.add_item(param);
        }
        self.reset_file_budget();
        self
    }

    pub fn clear_bulk(&mut self, keep_global: bool) -> &mut Self {
        self.bulk.clear(keep_global);
        self
    }

    fn fresh_param(&self) -> Param {
        let mut param = Param::new();
        if !self.default_language.is_empty() {
            param.set_lang(self.default_language.as_str());
        }
        if !self.default_language_path.is_empty() {
            param.set_lang_path(self.default_language_path.as_str());
        }
        param
    }

    fn reset_file_budget(&mut self) {
        self.attachment_bytes = 0;
        self.embed_bytes = 0;
    }

    fn build_handler(&self) -> Box<dyn Handler> {
        match self.backend {
            Backend::SmtpRich => Box::new(SmtpRichHandler::new(
                &self.config.smtp_rich,
                self.mime_transport(),
            )),
            Backend::SmtpPlain => Box::new(SmtpPlainHandler::new(
                &self.config.smtp_plain,
                self.plain_transport(),
            )),
            Backend::Api => Box::new(ApiHandler::new(&self.config.api, self.api_transport())),
            Backend::ApiBulk => {
                Box::new(ApiBulkHandler::new(&self.config.api, self.api_transport()))
            }
        }
    }

    /// Label the message, create its monitoring record and, when enabled,
    /// build and prepare the backend handler.
    #[instrument(
        skip(self),
        fields(backend = %self.backend, mode = %self.mode, enabled = self.enabled)
    )]
    pub fn prepare(&mut self) -> &mut Self {
        self.handler = None;

        let label = self.backend.to_string();
        match self.backend {
            Backend::ApiBulk => {
                if let Some(global) = self.bulk.global_mut() {
                    global.set_via(label);
                    self.monitoring.create(global);
                }
            }
            _ => {
                self.param.set_via(label);
                self.monitoring.create(&self.param);
            }
        }

        if self.enabled {
            let mut handler = self.build_handler();
            match self.backend {
                Backend::ApiBulk => handler.prepare(Outgoing::Bulk(&mut self.bulk)),
                _ => handler.prepare(Outgoing::Single(&mut self.param)),
            }
            debug!(
                state = ?handler.state(),
                lang = %self.param.lang(),
                lang_path = %self.param.lang_path(),
                "Mail handler prepared"
            );
            self.handler = Some(handler);
        }
        self
    }

    /// Send the prepared message and record the outcome.
    #[instrument(skip(self), fields(backend = %self.backend, enabled = self.enabled))]
    pub fn send(&mut self) -> &mut Self {
        self.last_status = None;

        let status = match (self.enabled, self.handler.as_mut()) {
            (true, Some(handler)) => {
                handler.send();
                let status = handler.status().clone();
                match handler.backend() {
                    Backend::ApiBulk => {
                        if let Some(global) = self.bulk.global() {
                            self.monitoring.update(&status, global);
                        }
                    }
                    _ => self.monitoring.update(&status, &self.param),
                }
                status
            }
            (true, None) => Status::failed(NOT_PREPARED_CORRECTLY),
            (false, _) => Status::succeeded(DISABLED_NOT_SENT),
        };

        if status.success {
            info!(via = %self.param.via(), to = %self.param.recipient_str(), "Mail sent");
        } else {
            warn!(code = %status.code, message = %status.message, "Mail not sent");
        }
        self.last_status = Some(status);
        self
    }

    // ---- message content ----

    pub fn set_lang(&mut self, lang: &str) -> &mut Self {
        self.param.set_lang(lang);
        self
    }

    pub fn set_lang_path(&mut self, path: &str) -> &mut Self {
        self.param.set_lang_path(path);
        self
    }

    pub fn set_charset(&mut self, charset: &str) -> &mut Self {
        self.param.set_charset(charset);
        self
    }

    /// In TEST mode the configured From is used instead of the arguments.
    pub fn set_from(&mut self, email: &str, name: &str) -> &mut Self {
        if self.is_test() {
            let (email, name) = match &self.config.from {
                Some(from) => (from.email().to_string(), from.name().to_string()),
                None => (String::new(), String::new()),
            };
            self.param.set_from(&email, &name);
        } else {
            self.param.set_from(email, name);
        }
        self
    }

    fn addresses_for(&self, role: Role, email: &str, name: &str) -> Vec<Address> {
        if self.is_test() {
            return self.config.webmaster.clone();
        }
        if email.trim().is_empty() {
            return match role {
                Role::To => self.config.to.clone(),
                Role::Copy => self.config.copy.clone(),
                Role::Blind => self.config.blind.clone(),
                Role::Reply => self.config.reply.clone(),
            };
        }
        vec![Address::new(email, name)]
    }

    fn add_address(&mut self, role: Role, email: &str, name: &str) {
        for address in self.addresses_for(role, email, name) {
            match role {
                Role::To => self.param.add_recipient(address.email(), address.name()),
                Role::Copy => self.param.add_copy(address.email(), address.name()),
                Role::Blind => self.param.add_blind(address.email(), address.name()),
                Role::Reply => self.param.add_reply(address.email(), address.name()),
            }
        }
    }

    fn add_addresses<I>(&mut self, role: Role, addresses: I) -> MailerResult<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<AddressInput>,
    {
        for input in addresses {
            let (email, name) = input.into().into_parts()?;
            self.add_address(role, &email, &name);
        }
        Ok(self)
    }

    /// Add a To address. TEST mode adds the webmasters instead; an empty
    /// email adds the configured To list.
    pub fn add_recipient(&mut self, email: &str, name: &str) -> &mut Self {
        self.add_address(Role::To, email, name);
        self
    }

    pub fn add_recipients<I>(&mut self, addresses: I) -> MailerResult<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<AddressInput>,
    {
        self.add_addresses(Role::To, addresses)
    }

    pub fn clear_recipients(&mut self) -> &mut Self {
        self.param.clear_recipients();
        self
    }

    pub fn add_copy(&mut self, email: &str, name: &str) -> &mut Self {
        self.add_address(Role::Copy, email, name);
        self
    }

    pub fn add_copies<I>(&mut self, addresses: I) -> MailerResult<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<AddressInput>,
    {
        self.add_addresses(Role::Copy, addresses)
    }

    pub fn clear_copies(&mut self) -> &mut Self {
        self.param.clear_copies();
        self
    }

    pub fn add_blind(&mut self, email: &str, name: &str) -> &mut Self {
        self.add_address(Role::Blind, email, name);
        self
    }

    pub fn add_blinds<I>(&mut self, addresses: I) -> MailerResult<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<AddressInput>,
    {
        self.add_addresses(Role::Blind, addresses)
    }

    pub fn clear_blinds(&mut self) -> &mut Self {
        self.param.clear_blinds();
        self
    }

    pub fn add_reply(&mut self, email: &str, name: &str) -> &mut Self {
        self.add_address(Role::Reply, email, name);
        self
    }

    pub fn add_replies<I>(&mut self, addresses: I) -> MailerResult<&mut Self>
    where
        I: IntoIterator,
        I::Item: Into<AddressInput>,
    {
        self.add_addresses(Role::Reply, addresses)
    }

    pub fn clear_replies(&mut self) -> &mut Self {
        self.param.clear_replies();
        self
    }

    /// TEST mode prefixes the subject with `[TEST] `.
    pub fn set_subject(&mut self, subject: &str) -> &mut Self {
        if self.is_test() {
            self.param.set_subject(&format!("{}{}", TEST_SUBJECT_PREFIX, subject));
        } else {
            self.param.set_subject(subject);
        }
        self
    }

    pub fn set_html(&mut self, html: &str) -> &mut Self {
        self.param.set_html(html);
        self
    }

    pub fn set_text(&mut self, text: &str) -> &mut Self {
        self.param.set_text(text);
        self
    }

    /// Check the file and charge its size to the message budget.
    fn admit(&mut self, path: &Path, name: &str, kind: FileKind) -> MailerResult<()> {
        let size = std::fs::metadata(path)
            .ok()
            .filter(|meta| meta.is_file())
            .map(|meta| meta.len())
            .filter(|&len| len > 0)
            .ok_or_else(|| MailerError::AttachmentUnreadable {
                name: name.to_string(),
                path: path.display().to_string(),
            })?;

        let total = self.attachment_bytes() + size;
        if total > self.max_attachment_bytes {
            return Err(MailerError::AttachmentTooLarge {
                total,
                max: self.max_attachment_bytes,
            });
        }
        match kind {
            FileKind::Attachment => self.attachment_bytes += size,
            FileKind::Embed => self.embed_bytes += size,
        }
        Ok(())
    }

    pub fn add_attachment(
        &mut self,
        path: impl Into<PathBuf>,
        name: &str,
    ) -> MailerResult<&mut Self> {
        let path = path.into();
        self.admit(&path, name, FileKind::Attachment)?;
        self.param.add_attachment(path, name);
        Ok(self)
    }

    pub fn clear_attachments(&mut self) -> &mut Self {
        self.param.clear_attachments();
        self.attachment_bytes = 0;
        self
    }

    /// Inline image; `id` is how the HTML body refers to it (derived from
    /// name and path when `None`).
    pub fn add_embed(
        &mut self,
        path: impl Into<PathBuf>,
        name: &str,
        id: Option<&str>,
    ) -> MailerResult<&mut Self> {
        let path = path.into();
        self.admit(&path, name, FileKind::Embed)?;
        self.param.add_embed(path, name, id);
        Ok(self)
    }

    pub fn clear_embeds(&mut self) -> &mut Self {
        self.param.clear_embeds();
        self.embed_bytes = 0;
        self
    }

    pub fn set_template_id(&mut self, id: &str) -> &mut Self {
        self.param.set_template_id(id);
        self
    }

    pub fn add_variables<K, V>(&mut self, variables: impl IntoIterator<Item = (K, V)>) -> &mut Self
    where
        K: Into<String>,
        V: Into<Variable>,
    {
        self.param.add_variables(variables);
        self
    }

    pub fn add_variable(&mut self, key: &str, value: impl Into<Variable>) -> &mut Self {
        self.param.add_variable(key, value);
        self
    }

    pub fn clear_variables(&mut self) -> &mut Self {
        self.param.clear_variables();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::MockMonitor;
    use crate::test_support::temp_file;
    use crate::transport::RecordingTransport;

    fn config() -> MailerConfig {
        MailerConfig::default()
            .with_from("noreply@co.example", "Co")
            .with_webmaster("ops@co.example", "Ops")
            .with_to("sales@co.example", "Sales")
            .with_copy("audit@co.example", "")
    }

    fn emails(param: &Param) -> Vec<&str> {
        param.recipients().iter().map(Address::email).collect()
    }

    #[test]
    fn test_defaults() {
        let mailer = Mailer::new(MailerConfig::default());
        assert_eq!(mailer.mode(), Mode::Test);
        assert_eq!(mailer.backend(), Backend::SmtpPlain);
        assert!(!mailer.is_enabled());
        assert_eq!(mailer.max_attachment_bytes(), 10_485_760);
        assert!(mailer.last_sent_status().is_failure());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Backend::SmtpRich.to_string(), "SMTP_RICH");
        assert_eq!(Backend::ApiBulk.to_string(), "API_BULK");
        assert_eq!(Backend::parse("api").unwrap(), Backend::Api);
        assert_eq!(Mode::parse("LIVE").unwrap(), Mode::Live);
    }

    #[test]
    fn test_invalid_mode_and_backend() {
        let mut mailer = Mailer::new(MailerConfig::default());
        let err = mailer.set_mode_str("STAGING").err().unwrap();
        assert_eq!(
            err.to_string(),
            "Mode is not allowed : STAGING, must be TEST | LIVE"
        );
        let err = mailer.set_backend_str("PIGEON").err().unwrap();
        assert_eq!(
            err.to_string(),
            "Handler mode is not allowed : PIGEON, must be SMTP_RICH | SMTP_PLAIN | API | API_BULK"
        );
        assert_eq!(mailer.mode(), Mode::Test);
        assert_eq!(mailer.backend(), Backend::SmtpPlain);
    }

    #[test]
    fn test_test_mode_redirects_addresses() {
        let mut mailer = Mailer::new(config());
        mailer
            .set_from("someone@else.example", "Else")
            .add_recipient("client@x.com", "Client")
            .add_blind("hidden@x.com", "")
            .set_subject("Invoice");

        let param = mailer.param();
        assert_eq!(param.from().map(Address::email), Some("noreply@co.example"));
        assert_eq!(emails(param), vec!["ops@co.example"]);
        assert!(param.blinds().is_empty());
        assert_eq!(param.subject(), "[TEST] Invoice");
    }

    #[test]
    fn test_test_mode_without_configured_from() {
        let mut mailer = Mailer::new(MailerConfig::default());
        mailer.set_from("someone@else.example", "Else");
        assert!(mailer.param().from().map(Address::is_empty).unwrap_or(false));
    }

    #[test]
    fn test_live_mode_uses_arguments_or_defaults() {
        let mut mailer = Mailer::new(config());
        mailer
            .set_mode_live()
            .set_from("me@x.com", "Me")
            .add_recipient("client@x.com", "Client")
            .add_recipient("", "")
            .add_copy("", "")
            .set_subject("Invoice");

        let param = mailer.param();
        assert_eq!(param.from().map(Address::email), Some("me@x.com"));
        assert_eq!(emails(param), vec!["client@x.com", "sales@co.example"]);
        assert_eq!(param.copy_str(), "<audit@co.example>");
        assert_eq!(param.subject(), "Invoice");
    }

    #[test]
    fn test_add_recipients_inputs() {
        let mut mailer = Mailer::new(config());
        mailer.set_mode_live();
        mailer
            .add_recipients(vec![
                AddressInput::from("a@x.com"),
                AddressInput::named("b@x.com", "B"),
            ])
            .unwrap();
        assert_eq!(emails(mailer.param()), vec!["a@x.com", "b@x.com"]);

        let err = mailer
            .add_copies([AddressInput::named("", "Nameless")])
            .err()
            .unwrap();
        assert!(matches!(err, MailerError::MissingEmailKey));
    }

    #[test]
    fn test_attachment_budget() {
        let a = temp_file("a.bin", &[1u8; 6]);
        let b = temp_file("b.bin", &[1u8; 6]);
        let mut mailer = Mailer::new(MailerConfig::default());
        mailer.set_max_attachment_bytes(10);

        mailer.add_attachment(&a, "a.bin").unwrap();
        let err = mailer.add_embed(&b, "b.bin", None).err().unwrap();
        assert!(matches!(err, MailerError::AttachmentTooLarge { total: 12, max: 10 }));
        assert_eq!(err.to_string(), "The maximum size of attachments has been exceeded : 12/10");
        assert_eq!(mailer.param().attachments().len(), 1);
        assert!(mailer.param().embeds().is_empty());
        assert_eq!(mailer.attachment_bytes(), 6);

        mailer.clear_attachments();
        assert_eq!(mailer.attachment_bytes(), 0);
        mailer.add_embed(&b, "b.bin", Some("b")).unwrap();
        assert_eq!(mailer.attachment_bytes(), 6);

        mailer.init(false);
        assert_eq!(mailer.attachment_bytes(), 0);
    }

    #[test]
    fn test_missing_or_empty_attachment() {
        let empty = temp_file("empty.txt", b"");
        let mut mailer = Mailer::new(MailerConfig::default());
        let err = mailer.add_attachment(&empty, "empty.txt").err().unwrap();
        assert!(matches!(err, MailerError::AttachmentUnreadable { .. }));
        let err = mailer.add_attachment("/definitely/not/here.pdf", "here.pdf").err().unwrap();
        assert!(err.to_string().starts_with("Can't load attachment file : here.pdf["));
    }

    #[test]
    fn test_set_file_max_size() {
        let mut mailer = Mailer::new(MailerConfig::default());
        mailer.set_file_max_size(2);
        assert_eq!(mailer.max_attachment_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn test_disabled_send_never_builds_handler() {
        let spy = RecordingTransport::new();
        let mut mailer = Mailer::new(config());
        mailer.set_transports(spy.clone());
        mailer.add_recipient("", "").prepare().send();

        assert!(mailer.handler().is_none());
        let status = mailer.last_sent_status();
        assert!(status.success);
        assert_eq!(status.message, DISABLED_NOT_SENT);
        assert_eq!(spy.call_count(), 0);
        assert_eq!(mailer.param().via(), "SMTP_PLAIN");
    }

    #[test]
    fn test_enabled_send_without_prepare() {
        let spy = RecordingTransport::new();
        let mut mailer = Mailer::new(config());
        mailer.set_transports(spy.clone()).enable().send();
        let status = mailer.last_sent_status();
        assert!(!status.success);
        assert_eq!(status.message, NOT_PREPARED_CORRECTLY);
        assert_eq!(spy.call_count(), 0);
    }

    #[test]
    fn test_default_language_applies_to_new_messages() {
        let mut mailer = Mailer::new(config());
        mailer.set_default_language("fr").set_default_language_path("/lang");
        mailer.init(true);
        assert_eq!(mailer.param().lang(), "fr");
        assert_eq!(mailer.param().lang_path(), "/lang");
        assert_eq!(mailer.param().from().map(Address::email), Some("noreply@co.example"));

        mailer.init(false);
        assert!(mailer.param().from().is_none());
    }

    #[test]
    fn test_bulk_moves_current_message() {
        let mut mailer = Mailer::new(config());
        mailer.set_mode_live();
        mailer.set_subject("Shared").bulk(true);
        mailer.add_recipient("a@x.com", "").bulk(false);
        mailer.add_recipient("b@x.com", "").bulk(false);

        assert_eq!(mailer.bulk_ref().global().map(Param::subject), Some("Shared"));
        assert_eq!(mailer.bulk_ref().items().len(), 2);
        assert!(mailer.param().recipients().is_empty());

        mailer.clear_bulk(true);
        assert!(mailer.bulk_ref().items().is_empty());
        assert!(mailer.bulk_ref().global().is_some());
        mailer.clear_bulk(false);
        assert!(mailer.bulk_ref().is_empty());
    }

    #[test]
    fn test_monitoring_round_trip() {
        let mut monitor = MockMonitor::new();
        monitor
            .expect_on_prepare()
            .withf(|param| param.via() == "API")
            .times(1)
            .returning(|_| Some("row-7".to_string()));
        monitor
            .expect_on_update()
            .withf(|id, status, _| id == "row-7" && status.success)
            .times(1)
            .return_const(());

        let spy = RecordingTransport::new();
        let mut mailer = Mailer::new(config());
        mailer
            .set_monitor(monitor)
            .set_transports(spy.clone())
            .use_api()
            .enable()
            .add_recipient("", "")
            .prepare()
            .send();
        assert!(mailer.last_sent_status().success);
        assert_eq!(spy.call_count(), 1);
    }

    #[test]
    fn test_missing_api_keys_fail_the_send() {
        let mut mailer = Mailer::new(config());
        mailer.use_api().enable().add_recipient("", "").prepare().send();
        let status = mailer.last_sent_status();
        assert!(!status.success);
        assert!(status.message.contains("keys are required"));
    }
}
