//! Wire format of the transactional API.

use crate::models::{Address, AddressPayload, Attachment, AttachmentPayload, Param, Variable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Template id: numeric ids go out as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateId {
    Number(u64),
    Text(String),
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        id.parse()
            .map(TemplateId::Number)
            .unwrap_or_else(|_| TemplateId::Text(id.to_string()))
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::Number(n) => write!(f, "{}", n),
            TemplateId::Text(s) => f.write_str(s),
        }
    }
}

/// One entry of `Messages` (or the `Globals` object).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiMessage {
    #[serde(rename = "CustomID", default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_payload: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deduplicate_campaign: Option<bool>,
    #[serde(rename = "URLTags", default, skip_serializing_if = "Option::is_none")]
    pub url_tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<AddressPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<AddressPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<AddressPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<AddressPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<AddressPayload>,
    #[serde(rename = "TemplateID", default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<TemplateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_language: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inlined_attachments: Vec<AttachmentPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "HTMLPart", default, skip_serializing_if = "Option::is_none")]
    pub html_part: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_part: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn payloads<'a>(addresses: impl Iterator<Item = &'a Address>) -> Vec<AddressPayload> {
    addresses.filter_map(Address::get).collect()
}

fn files(attachments: &[Attachment]) -> Vec<AttachmentPayload> {
    attachments.iter().filter_map(Attachment::get).collect()
}

impl ApiMessage {
    /// Format a [`Param`]; empty fields are left out.
    pub fn from_param(param: &Param) -> Self {
        let campaign = non_empty(param.campaign());
        let deduplicate_campaign = (campaign.is_some() && param.deduplicate()).then_some(true);
        let template_id = non_empty(param.template_id()).map(|id| TemplateId::from(id.as_str()));
        let template_language =
            (template_id.is_some() || !param.variables().is_empty()).then_some(true);

        Self {
            custom_id: non_empty(param.id()),
            event_payload: non_empty(param.payload()),
            custom_campaign: campaign,
            deduplicate_campaign,
            url_tags: non_empty(param.url_tags()),
            from: param.from().and_then(Address::get),
            to: payloads(param.recipients().iter()),
            reply_to: payloads(param.replies().iter()),
            cc: payloads(param.copies().iter()),
            bcc: payloads(param.blinds().iter()),
            template_id,
            template_language,
            variables: param.variables().clone(),
            attachments: files(param.attachments()),
            inlined_attachments: files(param.embeds()),
            subject: non_empty(param.subject()),
            html_part: non_empty(param.html()),
            text_part: non_empty(param.text()),
        }
    }

    /// Rebuild a [`Param`] from a formatted message. File contents are not
    /// recovered.
    pub fn to_param(&self) -> Param {
        let mut param = Param::new();
        if let Some(id) = &self.custom_id {
            param.set_id(id.as_str());
        }
        if let Some(payload) = &self.event_payload {
            param.set_payload(payload.as_str());
        }
        if let Some(campaign) = &self.custom_campaign {
            param.set_campaign(campaign.as_str());
            param.set_deduplicate(self.deduplicate_campaign.unwrap_or(false));
        }
        if let Some(tags) = &self.url_tags {
            param.set_url_tags(tags.as_str());
        }
        if let Some(from) = &self.from {
            param.set_from(&from.email, &from.name);
        }
        for address in &self.to {
            param.add_recipient(&address.email, &address.name);
        }
        for address in &self.reply_to {
            param.add_reply(&address.email, &address.name);
        }
        for address in &self.cc {
            param.add_copy(&address.email, &address.name);
        }
        for address in &self.bcc {
            param.add_blind(&address.email, &address.name);
        }
        if let Some(id) = &self.template_id {
            param.set_template_id(id.to_string());
        }
        param.add_variables(self.variables.clone());
        if let Some(subject) = &self.subject {
            param.set_subject(subject);
        }
        if let Some(html) = &self.html_part {
            param.set_html(html.as_str());
        }
        if let Some(text) = &self.text_part {
            param.set_text(text);
        }
        param
    }
}

/// Request body posted to the send endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiBody {
    #[serde(rename = "Globals", default, skip_serializing_if = "Option::is_none")]
    pub globals: Option<ApiMessage>,
    #[serde(rename = "Messages", default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ApiMessage>,
    #[serde(rename = "SandboxMode")]
    pub sandbox_mode: bool,
}
