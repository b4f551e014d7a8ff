//! Email address value used for From, To, Cc, Bcc and Reply-To.

use super::sanitize;
use crate::error::{MailerError, MailerResult};
use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use validator::ValidateEmail;

/// Validated address plus display name.
///
/// An invalid address is kept with an empty `email`; formatters skip it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    email: String,
    name: String,
}

/// `{Email, Name?}` object used by the transactional API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPayload {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Name", default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

impl Address {
    pub fn new(email: &str, name: &str) -> Self {
        Self {
            email: canonical_email(email),
            name: sanitize::header_value(name),
        }
    }

    /// Parse `Name <email>` or a bare `email`.
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        match (entry.rfind('<'), entry.ends_with('>')) {
            (Some(open), true) => {
                let name = entry[..open].trim().trim_matches('"');
                let email = &entry[open + 1..entry.len() - 1];
                Self::new(email, name)
            }
            _ => Self::new(entry, ""),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the address failed validation.
    pub fn is_empty(&self) -> bool {
        self.email.is_empty()
    }

    /// Stable identity used to keep an address in a single recipient bucket.
    pub fn dedup_key(&self) -> String {
        dedup_key(&self.email)
    }

    /// API payload, or `None` when the address is empty.
    pub fn get(&self) -> Option<AddressPayload> {
        if self.is_empty() {
            return None;
        }
        Some(AddressPayload {
            email: self.email.clone(),
            name: self.name.clone(),
        })
    }

    /// lettre mailbox, or `None` when the address is empty or not accepted by lettre.
    pub fn to_mailbox(&self) -> Option<Mailbox> {
        if self.is_empty() {
            return None;
        }
        let address = self.email.parse().ok()?;
        let name = (!self.name.is_empty()).then(|| self.name.clone());
        Some(Mailbox::new(name, address))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format!("{} <{}>", self.name, self.email).trim())
    }
}

/// Hash of the canonical address.
pub fn dedup_key(canonical_email: &str) -> String {
    format!("{:x}", Sha256::digest(canonical_email.as_bytes()))
}

/// Trimmed and lowercased address, or an empty string when invalid.
pub fn canonical_email(input: &str) -> String {
    let candidate = input.trim().to_string();
    if candidate.validate_email() {
        candidate.to_lowercase()
    } else {
        String::new()
    }
}

/// Address as given by a caller of the builder API.
///
/// An empty [`AddressInput::Plain`] asks for the configured defaults of the
/// role; an [`AddressInput::Named`] entry must carry an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressInput {
    Plain(String),
    Named { email: String, name: String },
}

impl AddressInput {
    pub fn named(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Named {
            email: email.into(),
            name: name.into(),
        }
    }

    /// Split into `(email, name)`, rejecting a named entry without email.
    pub fn into_parts(self) -> MailerResult<(String, String)> {
        match self {
            Self::Plain(email) => Ok((email, String::new())),
            Self::Named { email, .. } if email.trim().is_empty() => {
                Err(MailerError::MissingEmailKey)
            }
            Self::Named { email, name } => Ok((email, name)),
        }
    }
}

impl From<&str> for AddressInput {
    fn from(email: &str) -> Self {
        Self::Plain(email.to_string())
    }
}

impl From<String> for AddressInput {
    fn from(email: String) -> Self {
        Self::Plain(email)
    }
}

impl From<(&str, &str)> for AddressInput {
    fn from((email, name): (&str, &str)) -> Self {
        Self::named(email, name)
    }
}

impl TryFrom<&Value> for AddressInput {
    type Error = MailerError;

    fn try_from(value: &Value) -> MailerResult<Self> {
        match value {
            Value::String(email) => Ok(Self::Plain(email.clone())),
            Value::Object(map) => {
                let email = map.get("email").map(scalar_string).unwrap_or_default();
                let name = map.get("name").map(scalar_string).unwrap_or_default();
                if email.is_empty() {
                    return Err(MailerError::MissingEmailKey);
                }
                Ok(Self::Named { email, name })
            }
            other => Err(MailerError::UnsupportedAddress(json_kind(other).to_string())),
        }
    }
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        _ => String::new(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_email_is_lowercased() {
        let address = Address::new("  John.Doe@Example.COM ", "John");
        assert_eq!(address.email(), "john.doe@example.com");
        assert_eq!(address.name(), "John");
        assert!(!address.is_empty());
    }

    #[test]
    fn test_invalid_email_is_empty() {
        for input in ["", "not-an-email", "a@", "@b.com", "a b@c.com"] {
            let address = Address::new(input, "Name");
            assert!(address.is_empty(), "{input} should be rejected");
            assert!(address.get().is_none());
            assert!(address.to_mailbox().is_none());
        }
    }

    #[test]
    fn test_dedup_key_ignores_case() {
        let a = Address::new("Ops@Co.Example", "");
        let b = Address::new("ops@co.example", "Other name");
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_eq!(a.dedup_key().len(), 64);
    }

    #[test]
    fn test_get_omits_empty_name() {
        let payload = Address::new("a@x.com", "").get().unwrap();
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({"Email": "a@x.com"}));

        let payload = Address::new("a@x.com", "A").get().unwrap();
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"Email": "a@x.com", "Name": "A"})
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::new("a@x.com", "A").to_string(), "A <a@x.com>");
        assert_eq!(Address::new("a@x.com", "").to_string(), "<a@x.com>");
    }

    #[test]
    fn test_parse_entry() {
        let address = Address::parse("Ops Team <OPS@co.example>");
        assert_eq!(address.email(), "ops@co.example");
        assert_eq!(address.name(), "Ops Team");

        let address = Address::parse("ops@co.example");
        assert_eq!(address.email(), "ops@co.example");
        assert_eq!(address.name(), "");
    }

    #[test]
    fn test_to_mailbox() {
        let mailbox = Address::new("a@x.com", "A").to_mailbox().unwrap();
        assert_eq!(mailbox.to_string(), "A <a@x.com>");
    }

    #[test]
    fn test_address_input_from_json() {
        assert_eq!(
            AddressInput::try_from(&json!("a@x.com")).unwrap(),
            AddressInput::Plain("a@x.com".to_string())
        );
        assert_eq!(
            AddressInput::try_from(&json!({"email": "a@x.com", "name": "A"})).unwrap(),
            AddressInput::named("a@x.com", "A")
        );
        assert!(matches!(
            AddressInput::try_from(&json!({"name": "A"})),
            Err(MailerError::MissingEmailKey)
        ));
        assert!(matches!(
            AddressInput::try_from(&json!(42)),
            Err(MailerError::UnsupportedAddress(kind)) if kind == "number"
        ));
    }

    #[test]
    fn test_named_input_without_email_is_rejected() {
        assert!(matches!(
            AddressInput::named(" ", "A").into_parts(),
            Err(MailerError::MissingEmailKey)
        ));
        assert_eq!(
            AddressInput::from("").into_parts().unwrap(),
            (String::new(), String::new())
        );
    }
}
