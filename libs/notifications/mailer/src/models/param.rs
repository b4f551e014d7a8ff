//! The message under construction.

use super::address::{canonical_email, Address};
use super::attachment::Attachment;
use super::sanitize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Template variable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Variable {
    Text(String),
    List(Vec<String>),
}

impl Variable {
    /// String form used for `{{var:KEY}}` substitution.
    pub fn as_text(&self) -> String {
        match self {
            Variable::Text(s) => s.clone(),
            Variable::List(items) => items.join(", "),
        }
    }
}

impl From<&str> for Variable {
    fn from(value: &str) -> Self {
        Variable::Text(value.to_string())
    }
}

impl From<String> for Variable {
    fn from(value: String) -> Self {
        Variable::Text(value)
    }
}

impl From<Vec<String>> for Variable {
    fn from(value: Vec<String>) -> Self {
        Variable::List(value)
    }
}

impl From<Vec<&str>> for Variable {
    fn from(value: Vec<&str>) -> Self {
        Variable::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Ordered addresses keyed by dedup key.
///
/// Re-adding a known key replaces the entry where it stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressList {
    entries: Vec<(String, Address)>,
}

impl AddressList {
    fn upsert(&mut self, key: String, address: Address) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = address,
            None => self.entries.push((key, address)),
        }
    }

    fn remove_key(&mut self, key: &str) {
        self.entries.retain(|(k, _)| k != key);
    }

    /// Remove every entry with this canonical email, returning their keys.
    fn remove_email(&mut self, email: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|(k, address)| {
            if address.email() == email {
                removed.push(k.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    fn drain_keys(&mut self) -> Vec<String> {
        self.entries.drain(..).map(|(k, _)| k).collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.entries.iter().map(|(_, address)| address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.iter().cloned().collect()
    }

    /// `Name <email> ; Name <email>` for logs.
    pub fn render(&self) -> String {
        self.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ; ")
    }
}

/// Everything needed to send one message, independent of the backend.
///
/// To, Cc and Bcc share one recipient set: an address lives in exactly one
/// of them. Adding as To moves it out of Cc/Bcc; adding as Cc or Bcc is
/// ignored when it is already a recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    recipient_keys: HashSet<String>,
    charset: String,
    lang: String,
    lang_path: String,
    via: String,
    id: String,
    payload: String,
    campaign: String,
    deduplicate: bool,
    url_tags: String,
    from: Option<Address>,
    reply: AddressList,
    to: AddressList,
    copy: AddressList,
    blind: AddressList,
    subject: String,
    text: String,
    html: String,
    template_id: String,
    variables: BTreeMap<String, Variable>,
    attachments: Vec<Attachment>,
    embeds: Vec<Attachment>,
}

impl Default for Param {
    fn default() -> Self {
        Self {
            recipient_keys: HashSet::new(),
            charset: "UTF-8".to_string(),
            lang: String::new(),
            lang_path: String::new(),
            via: String::new(),
            id: String::new(),
            payload: String::new(),
            campaign: String::new(),
            deduplicate: false,
            url_tags: String::new(),
            from: None,
            reply: AddressList::default(),
            to: AddressList::default(),
            copy: AddressList::default(),
            blind: AddressList::default(),
            subject: String::new(),
            text: String::new(),
            html: String::new(),
            template_id: String::new(),
            variables: BTreeMap::new(),
            attachments: Vec::new(),
            embeds: Vec::new(),
        }
    }
}

impl Param {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- scalar settings ----

    pub fn set_charset(&mut self, charset: impl Into<String>) {
        self.charset = charset.into();
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    pub fn set_lang(&mut self, lang: impl Into<String>) {
        self.lang = lang.into();
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn set_lang_path(&mut self, path: impl Into<String>) {
        self.lang_path = path.into();
    }

    pub fn lang_path(&self) -> &str {
        &self.lang_path
    }

    /// Diagnostic label of the backend/host that handled the message.
    pub fn set_via(&mut self, via: impl Into<String>) {
        self.via = via.into();
    }

    pub fn append_via(&mut self, suffix: &str) {
        self.via.push_str(suffix);
    }

    pub fn via(&self) -> &str {
        &self.via
    }

    /// Caller tracking id (`CustomID` on the API).
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_payload(&mut self, payload: impl Into<String>) {
        self.payload = payload.into();
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn set_campaign(&mut self, campaign: impl Into<String>) {
        self.campaign = campaign.into();
    }

    pub fn campaign(&self) -> &str {
        &self.campaign
    }

    pub fn set_deduplicate(&mut self, enable: bool) {
        self.deduplicate = enable;
    }

    pub fn deduplicate(&self) -> bool {
        self.deduplicate
    }

    pub fn set_url_tags(&mut self, tags: impl Into<String>) {
        self.url_tags = tags.into();
    }

    pub fn url_tags(&self) -> &str {
        &self.url_tags
    }

    // ---- addresses ----

    pub fn set_from(&mut self, email: &str, name: &str) {
        self.from = Some(Address::new(email, name));
    }

    pub fn from(&self) -> Option<&Address> {
        self.from.as_ref()
    }

    pub fn add_reply(&mut self, email: &str, name: &str) {
        let address = Address::new(email, name);
        self.reply.upsert(address.dedup_key(), address);
    }

    pub fn remove_reply(&mut self, email: &str) {
        self.reply.remove_email(&canonical_email(email));
    }

    pub fn clear_replies(&mut self) {
        self.reply.drain_keys();
    }

    pub fn replies(&self) -> &AddressList {
        &self.reply
    }

    pub fn reply_str(&self) -> String {
        self.reply.render()
    }

    /// Add a To recipient, taking it out of Cc/Bcc if it was there.
    pub fn add_recipient(&mut self, email: &str, name: &str) {
        let address = Address::new(email, name);
        let key = address.dedup_key();
        if self.recipient_keys.contains(&key) {
            self.copy.remove_key(&key);
            self.blind.remove_key(&key);
        }
        self.to.upsert(key.clone(), address);
        self.recipient_keys.insert(key);
    }

    pub fn remove_recipient(&mut self, email: &str) {
        let removed = self.to.remove_email(&canonical_email(email));
        self.forget(removed);
    }

    pub fn clear_recipients(&mut self) {
        let removed = self.to.drain_keys();
        self.forget(removed);
    }

    pub fn recipients(&self) -> &AddressList {
        &self.to
    }

    pub fn recipient_str(&self) -> String {
        self.to.render()
    }

    /// Add a Cc recipient unless the address is already a recipient.
    pub fn add_copy(&mut self, email: &str, name: &str) {
        let address = Address::new(email, name);
        let key = address.dedup_key();
        if self.recipient_keys.insert(key.clone()) {
            self.copy.upsert(key, address);
        }
    }

    pub fn remove_copy(&mut self, email: &str) {
        let removed = self.copy.remove_email(&canonical_email(email));
        self.forget(removed);
    }

    pub fn clear_copies(&mut self) {
        let removed = self.copy.drain_keys();
        self.forget(removed);
    }

    pub fn copies(&self) -> &AddressList {
        &self.copy
    }

    pub fn copy_str(&self) -> String {
        self.copy.render()
    }

    /// Add a Bcc recipient unless the address is already a recipient.
    pub fn add_blind(&mut self, email: &str, name: &str) {
        let address = Address::new(email, name);
        let key = address.dedup_key();
        if self.recipient_keys.insert(key.clone()) {
            self.blind.upsert(key, address);
        }
    }

    pub fn remove_blind(&mut self, email: &str) {
        let removed = self.blind.remove_email(&canonical_email(email));
        self.forget(removed);
    }

    pub fn clear_blinds(&mut self) {
        let removed = self.blind.drain_keys();
        self.forget(removed);
    }

    pub fn blinds(&self) -> &AddressList {
        &self.blind
    }

    pub fn blind_str(&self) -> String {
        self.blind.render()
    }

    fn forget(&mut self, keys: Vec<String>) {
        for key in keys {
            self.recipient_keys.remove(&key);
        }
    }

    // ---- content ----

    pub fn set_subject(&mut self, subject: &str) {
        self.subject = sanitize::header_value(subject);
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn set_html(&mut self, html: impl Into<String>) {
        self.html = html.into();
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Plain text body; markup is stripped.
    pub fn set_text(&mut self, text: &str) {
        self.text = sanitize::strip_tags(text);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_template_id(&mut self, id: impl Into<String>) {
        self.template_id = id.into();
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn add_variable(&mut self, key: impl Into<String>, value: impl Into<Variable>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn add_variables<K, V>(&mut self, variables: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Variable>,
    {
        for (key, value) in variables {
            self.add_variable(key, value);
        }
    }

    pub fn remove_variable(&mut self, key: &str) {
        self.variables.remove(key);
    }

    pub fn clear_variables(&mut self) {
        self.variables.clear();
    }

    pub fn variables(&self) -> &BTreeMap<String, Variable> {
        &self.variables
    }

    // ---- files ----

    pub fn add_attachment(&mut self, path: impl Into<PathBuf>, name: &str) {
        self.attachments.push(Attachment::new(path, name));
    }

    pub fn remove_attachment(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.attachments.retain(|a| a.path() != path);
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn add_embed(&mut self, path: impl Into<PathBuf>, name: &str, id: Option<&str>) {
        self.embeds.push(Attachment::embed(path, name, id));
    }

    pub fn remove_embed(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.embeds.retain(|e| e.path() != path);
    }

    pub fn clear_embeds(&mut self) {
        self.embeds.clear();
    }

    pub fn embeds(&self) -> &[Attachment] {
        &self.embeds
    }

    pub fn embed(&self, id: &str) -> Option<&Attachment> {
        self.embeds.iter().find(|e| e.id() == id)
    }

    // ---- chaining ----

    pub fn with_from(mut self, email: &str, name: &str) -> Self {
        self.set_from(email, name);
        self
    }

    pub fn with_recipient(mut self, email: &str, name: &str) -> Self {
        self.add_recipient(email, name);
        self
    }

    pub fn with_copy(mut self, email: &str, name: &str) -> Self {
        self.add_copy(email, name);
        self
    }

    pub fn with_blind(mut self, email: &str, name: &str) -> Self {
        self.add_blind(email, name);
        self
    }

    pub fn with_reply(mut self, email: &str, name: &str) -> Self {
        self.add_reply(email, name);
        self
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.set_subject(subject);
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.set_html(html);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.set_text(text);
        self
    }

    pub fn with_template_id(mut self, id: impl Into<String>) -> Self {
        self.set_template_id(id);
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Variable>) -> Self {
        self.add_variable(key, value);
        self
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>, name: &str) -> Self {
        self.add_attachment(path, name);
        self
    }

    pub fn with_embed(mut self, path: impl Into<PathBuf>, name: &str, id: Option<&str>) -> Self {
        self.add_embed(path, name, id);
        self
    }
}
