//! MIME assembly shared by the SMTP backends.

use crate::models::Address;
use lettre::message::{
    header::ContentType, Attachment as MimeAttachment, MessageBuilder, MultiPart,
    MultiPartBuilder, SinglePart,
};
use lettre::Message;

/// Body file ready to be placed in the message.
pub(crate) struct FilePart {
    pub name: String,
    pub content_id: Option<String>,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl FilePart {
    fn into_part(self) -> SinglePart {
        let content_type = ContentType::parse(&self.mime_type)
            .or_else(|_| ContentType::parse("application/octet-stream"))
            .unwrap_or(ContentType::TEXT_PLAIN);
        match self.content_id {
            Some(cid) => MimeAttachment::new_inline(cid).body(self.bytes, content_type),
            None => MimeAttachment::new(self.name).body(self.bytes, content_type),
        }
    }
}

enum Body {
    Single(SinglePart),
    Multi(MultiPart),
}

impl Body {
    fn wrap(self, builder: MultiPartBuilder) -> MultiPart {
        match self {
            Body::Single(part) => builder.singlepart(part),
            Body::Multi(multi) => builder.multipart(multi),
        }
    }
}

/// Headers for From, To, Cc, Bcc, Reply-To and Subject.
///
/// Empty or unparsable addresses are skipped.
pub(crate) fn headers(
    from: Option<&Address>,
    to: &[Address],
    cc: &[Address],
    bcc: &[Address],
    reply: &[Address],
    subject: &str,
) -> MessageBuilder {
    let mut builder = Message::builder().subject(subject);
    if let Some(mailbox) = from.and_then(Address::to_mailbox) {
        builder = builder.from(mailbox);
    }
    for mailbox in to.iter().filter_map(Address::to_mailbox) {
        builder = builder.to(mailbox);
    }
    for mailbox in cc.iter().filter_map(Address::to_mailbox) {
        builder = builder.cc(mailbox);
    }
    for mailbox in bcc.iter().filter_map(Address::to_mailbox) {
        builder = builder.bcc(mailbox);
    }
    for mailbox in reply.iter().filter_map(Address::to_mailbox) {
        builder = builder.reply_to(mailbox);
    }
    builder
}

fn text_part(kind: &str, charset: &str, content: &str) -> SinglePart {
    let content_type = ContentType::parse(&format!("text/{kind}; charset={charset}"))
        .unwrap_or(if kind == "html" {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        });
    SinglePart::builder()
        .header(content_type)
        .body(content.to_string())
}

fn text_body(charset: &str, html: &str, text: &str) -> Body {
    match (html.is_empty(), text.is_empty()) {
        (false, false) => Body::Multi(
            MultiPart::alternative()
                .singlepart(text_part("plain", charset, text))
                .singlepart(text_part("html", charset, html)),
        ),
        (false, true) => Body::Single(text_part("html", charset, html)),
        (true, _) => Body::Single(text_part("plain", charset, text)),
    }
}

/// Finish the message: text/html alternative, inline images in a related
/// part, attachments in a mixed part.
pub(crate) fn assemble(
    builder: MessageBuilder,
    charset: &str,
    html: &str,
    text: &str,
    inline: Vec<FilePart>,
    files: Vec<FilePart>,
) -> Result<Message, lettre::error::Error> {
    let mut body = text_body(charset, html, text);

    if !inline.is_empty() {
        let related = inline
            .into_iter()
            .fold(body.wrap(MultiPart::related()), |multi, part| {
                multi.singlepart(part.into_part())
            });
        body = Body::Multi(related);
    }

    if !files.is_empty() {
        let mixed = files
            .into_iter()
            .fold(body.wrap(MultiPart::mixed()), |multi, part| {
                multi.singlepart(part.into_part())
            });
        body = Body::Multi(mixed);
    }

    match body {
        Body::Single(part) => builder.singlepart(part),
        Body::Multi(multi) => builder.multipart(multi),
    }
}
