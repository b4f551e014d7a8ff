//! Mailer configuration: default addresses and per-backend settings.
//!
//! Loaded from a YAML file with [`MailerConfig::load`] or from the
//! environment through [`FromEnv`].
//!
//! ```yaml
//! from: { email: noreply@co.example, name: Co }
//! webmaster:
//!   - { email: ops@co.example, name: Ops }
//! api:
//!   public: key
//!   private: secret
//!   sandbox: true
//! smtp_plain:
//!   host: localhost
//!   port: 1025
//! ```

use crate::error::{MailerError, MailerResult};
use crate::models::Address;
use core_config::{env_flag, env_list, env_or_default, env_parse, ConfigError, FromEnv};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_API_VERSION: &str = "v3.1";
pub const DEFAULT_API_BASE_URL: &str = "https://api.mailjet.com";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;

/// Transactional HTTP API settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    #[serde(alias = "public")]
    pub public_key: String,
    #[serde(alias = "private")]
    pub private_key: String,
    pub version: String,
    pub sandbox: bool,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_key: String::new(),
            private_key: String::new(),
            version: DEFAULT_API_VERSION.to_string(),
            sandbox: false,
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn has_credentials(&self) -> bool {
        !self.public_key.is_empty() && !self.private_key.is_empty()
    }

    /// `{base_url}/{version}/send`
    pub fn send_url(&self) -> String {
        format!(
            "{}/{}/send",
            self.base_url.trim_end_matches('/'),
            self.version.trim_matches('/')
        )
    }
}

impl FromEnv for ApiConfig {
    /// Reads `MAILER_API_PUBLIC_KEY`, `MAILER_API_PRIVATE_KEY`,
    /// `MAILER_API_VERSION`, `MAILER_API_SANDBOX`, `MAILER_API_BASE_URL`
    /// and `MAILER_API_TIMEOUT_SECS`.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            public_key: env_or_default("MAILER_API_PUBLIC_KEY", ""),
            private_key: env_or_default("MAILER_API_PRIVATE_KEY", ""),
            version: env_or_default("MAILER_API_VERSION", DEFAULT_API_VERSION),
            sandbox: env_flag("MAILER_API_SANDBOX"),
            base_url: env_or_default("MAILER_API_BASE_URL", DEFAULT_API_BASE_URL),
            timeout_secs: env_parse("MAILER_API_TIMEOUT_SECS", DEFAULT_API_TIMEOUT_SECS)?,
        })
    }
}

/// SMTP relay settings.
///
/// `secure` is `""` (plain connection), `"ssl"` (implicit TLS) or `"tls"`
/// (STARTTLS). A config with no host, port and secure value means local
/// sendmail for the rich backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub secure: String,
    pub timeout_secs: Option<u64>,
}

impl SmtpConfig {
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    pub fn is_local(&self) -> bool {
        self.host.is_empty() && self.port == 0 && self.secure.is_empty()
    }

    /// Host to connect to, `localhost` when unset.
    pub fn host_or_default(&self) -> &str {
        if self.host.is_empty() {
            "localhost"
        } else {
            &self.host
        }
    }

    /// Suffix appended to a message `via` label.
    pub fn via_suffix(&self) -> String {
        match (self.port, self.host.as_str()) {
            (0, "") => " - localhost".to_string(),
            (0, host) => format!(" - {}", host),
            (port, host) => format!(" - [{}] {}", port, host),
        }
    }

    fn from_env_prefixed(prefix: &str) -> Result<Self, ConfigError> {
        let key = |name: &str| format!("{prefix}_{name}");
        let timeout_secs: u64 = env_parse(&key("TIMEOUT_SECS"), 0)?;
        Ok(Self {
            debug: env_flag(&key("DEBUG")),
            host: env_or_default(&key("HOST"), ""),
            port: env_parse(&key("PORT"), 0)?,
            username: env_or_default(&key("USERNAME"), ""),
            password: env_or_default(&key("PASSWORD"), ""),
            secure: env_or_default(&key("SECURE"), "").to_lowercase(),
            timeout_secs: (timeout_secs > 0).then_some(timeout_secs),
        })
    }
}

/// Address in the YAML file: `Name <email>` string or `{email, name}` map.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressEntry {
    Plain(String),
    Named {
        #[serde(default)]
        email: String,
        #[serde(default)]
        name: String,
    },
}

impl From<AddressEntry> for Address {
    fn from(entry: AddressEntry) -> Self {
        match entry {
            AddressEntry::Plain(entry) => Address::parse(&entry),
            AddressEntry::Named { email, name } => Address::new(&email, &name),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    from: Option<AddressEntry>,
    webmaster: Vec<AddressEntry>,
    to: Vec<AddressEntry>,
    reply: Vec<AddressEntry>,
    copy: Vec<AddressEntry>,
    blind: Vec<AddressEntry>,
    #[serde(alias = "mailjet")]
    api: ApiConfig,
    smtp_plain: SmtpConfig,
    smtp_rich: SmtpConfig,
}

/// Everything the mailer reads from configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MailerConfig {
    pub from: Option<Address>,
    pub webmaster: Vec<Address>,
    pub to: Vec<Address>,
    pub reply: Vec<Address>,
    pub copy: Vec<Address>,
    pub blind: Vec<Address>,
    pub api: ApiConfig,
    pub smtp_plain: SmtpConfig,
    pub smtp_rich: SmtpConfig,
}

impl From<ConfigFile> for MailerConfig {
    fn from(file: ConfigFile) -> Self {
        let list = |entries: Vec<AddressEntry>| entries.into_iter().map(Address::from).collect();
        Self {
            from: file.from.map(Address::from),
            webmaster: list(file.webmaster),
            to: list(file.to),
            reply: list(file.reply),
            copy: list(file.copy),
            blind: list(file.blind),
            api: file.api,
            smtp_plain: file.smtp_plain,
            smtp_rich: file.smtp_rich,
        }
    }
}

impl MailerConfig {
    /// Load a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> MailerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MailerError::Config(format!(
                "Yaml file not found or not readable : {} ({})",
                path.display(),
                e
            ))
        })?;
        let config = Self::from_yaml(&raw)?;
        tracing::debug!(path = %path.display(), "Mailer configuration loaded");
        Ok(config)
    }

    /// Parse YAML content.
    pub fn from_yaml(raw: &str) -> MailerResult<Self> {
        if raw.trim().is_empty() {
            return Err(MailerError::Config("Yaml config empty or malformed.".to_string()));
        }
        let file: ConfigFile = serde_yaml_ng::from_str(raw)?;
        Ok(file.into())
    }

    pub fn with_from(mut self, email: &str, name: &str) -> Self {
        self.from = Some(Address::new(email, name));
        self
    }

    pub fn with_webmaster(mut self, email: &str, name: &str) -> Self {
        self.webmaster.push(Address::new(email, name));
        self
    }

    pub fn with_to(mut self, email: &str, name: &str) -> Self {
        self.to.push(Address::new(email, name));
        self
    }

    pub fn with_reply(mut self, email: &str, name: &str) -> Self {
        self.reply.push(Address::new(email, name));
        self
    }

    pub fn with_copy(mut self, email: &str, name: &str) -> Self {
        self.copy.push(Address::new(email, name));
        self
    }

    pub fn with_blind(mut self, email: &str, name: &str) -> Self {
        self.blind.push(Address::new(email, name));
        self
    }
}

fn address_list(key: &str) -> Vec<Address> {
    env_list(key).iter().map(|entry| Address::parse(entry)).collect()
}

impl FromEnv for MailerConfig {
    /// Address lists are comma separated `Name <email>` entries:
    /// `MAILER_FROM`, `MAILER_WEBMASTERS`, `MAILER_TO`, `MAILER_REPLY`,
    /// `MAILER_COPY`, `MAILER_BLIND`. Backend sections use the
    /// `MAILER_API_*`, `MAILER_SMTP_*` and `MAILER_SMTP_RICH_*` variables.
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            from: address_list("MAILER_FROM").into_iter().next(),
            webmaster: address_list("MAILER_WEBMASTERS"),
            to: address_list("MAILER_TO"),
            reply: address_list("MAILER_REPLY"),
            copy: address_list("MAILER_COPY"),
            blind: address_list("MAILER_BLIND"),
            api: ApiConfig::from_env()?,
            smtp_plain: SmtpConfig::from_env_prefixed("MAILER_SMTP")?,
            smtp_rich: SmtpConfig::from_env_prefixed("MAILER_SMTP_RICH")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
from:
  email: NoReply@Co.Example
  name: Co
webmaster:
  - { email: ops@co.example, name: Ops }
  - Dev <dev@co.example>
to:
  - { email: sales@co.example, name: Sales }
api:
  public: pub
  private: priv
  sandbox: true
smtp_plain:
  host: localhost
  port: 1025
  debug: true
smtp_rich:
  host: smtp.co.example
  port: 465
  secure: ssl
  username: user
  password: pass
"#;

    #[test]
    fn test_from_yaml() {
        let config = MailerConfig::from_yaml(YAML).unwrap();
        let from = config.from.as_ref().unwrap();
        assert_eq!(from.email(), "noreply@co.example");
        assert_eq!(from.name(), "Co");
        assert_eq!(config.webmaster.len(), 2);
        assert_eq!(config.webmaster[1].email(), "dev@co.example");
        assert_eq!(config.webmaster[1].name(), "Dev");
        assert_eq!(config.to[0].email(), "sales@co.example");
        assert!(config.reply.is_empty());

        assert!(config.api.has_credentials());
        assert!(config.api.sandbox);
        assert_eq!(config.api.version, "v3.1");
        assert_eq!(config.api.send_url(), "https://api.mailjet.com/v3.1/send");

        assert!(config.smtp_plain.debug);
        assert_eq!(config.smtp_plain.port, 1025);
        assert!(!config.smtp_plain.has_credentials());
        assert_eq!(config.smtp_rich.secure, "ssl");
        assert!(config.smtp_rich.has_credentials());
    }

    #[test]
    fn test_mailjet_section_name() {
        let config = MailerConfig::from_yaml(
            "mailjet:\n  public: a\n  private: b\n  version: v3\nsmtp_rich:\n  host: mx.local\n",
        )
        .unwrap();
        assert_eq!(config.api.version, "v3");
        assert!(config.api.has_credentials());
        assert_eq!(config.smtp_rich.host, "mx.local");
    }

    #[test]
    fn test_empty_or_malformed_yaml_is_error() {
        for raw in ["", "   \n", "- just\n- a list\n", "from: [unclosed"] {
            assert!(
                matches!(MailerConfig::from_yaml(raw), Err(MailerError::Config(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = MailerConfig::load("/definitely/not/mailer.yaml").unwrap_err();
        assert!(err.to_string().contains("not found or not readable"));
    }

    #[test]
    fn test_via_suffix() {
        let mut smtp = SmtpConfig::default();
        assert_eq!(smtp.via_suffix(), " - localhost");
        smtp.host = "mx.local".to_string();
        assert_eq!(smtp.via_suffix(), " - mx.local");
        smtp.port = 25;
        assert_eq!(smtp.via_suffix(), " - [25] mx.local");
        smtp.host.clear();
        assert_eq!(smtp.via_suffix(), " - [25] ");
        smtp.port = 0;
        smtp.secure = "tls".to_string();
        assert_eq!(smtp.via_suffix(), " - localhost");
        assert!(!smtp.is_local());
        assert_eq!(smtp.host_or_default(), "localhost");
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("MAILER_FROM", Some("Co <noreply@co.example>")),
                ("MAILER_WEBMASTERS", Some("Ops <ops@co.example>, dev@co.example")),
                ("MAILER_TO", None),
                ("MAILER_REPLY", None),
                ("MAILER_COPY", None),
                ("MAILER_BLIND", None),
                ("MAILER_API_PUBLIC_KEY", Some("pub")),
                ("MAILER_API_PRIVATE_KEY", Some("priv")),
                ("MAILER_API_SANDBOX", Some("true")),
                ("MAILER_API_VERSION", None),
                ("MAILER_API_BASE_URL", None),
                ("MAILER_API_TIMEOUT_SECS", None),
                ("MAILER_SMTP_HOST", Some("localhost")),
                ("MAILER_SMTP_PORT", Some("1025")),
                ("MAILER_SMTP_TIMEOUT_SECS", None),
                ("MAILER_SMTP_RICH_HOST", None),
                ("MAILER_SMTP_RICH_PORT", None),
                ("MAILER_SMTP_RICH_SECURE", None),
                ("MAILER_SMTP_RICH_TIMEOUT_SECS", Some("10")),
            ],
            || {
                let config = MailerConfig::from_env().unwrap();
                assert_eq!(config.from.as_ref().map(Address::email), Some("noreply@co.example"));
                assert_eq!(config.webmaster.len(), 2);
                assert_eq!(config.webmaster[0].name(), "Ops");
                assert!(config.to.is_empty());
                assert!(config.api.sandbox);
                assert_eq!(config.api.version, DEFAULT_API_VERSION);
                assert_eq!(config.smtp_plain.port, 1025);
                assert_eq!(config.smtp_plain.timeout_secs, None);
                assert!(config.smtp_rich.is_local());
                assert_eq!(config.smtp_rich.timeout_secs, Some(10));
            },
        );
    }

    #[test]
    fn test_from_env_invalid_port() {
        temp_env::with_var("MAILER_SMTP_PORT", Some("not-a-port"), || {
            let err = MailerConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("MAILER_SMTP_PORT"));
        });
    }
}
