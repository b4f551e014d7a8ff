//! File attachment or inline image (embed).

use super::sanitize;
use crate::mime;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Reference to a file on disk.
///
/// Nothing is read at construction time; bytes are loaded every time they
/// are requested so that a large file is never held by the message model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    id: Option<String>,
    name: String,
    path: PathBuf,
    inline: bool,
}

/// Attachment object of the transactional API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentPayload {
    #[serde(rename = "ContentType")]
    pub content_type: String,
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "Base64Content")]
    pub base64_content: String,
    #[serde(rename = "ContentID", default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

impl Attachment {
    /// Regular attachment.
    pub fn new(path: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            id: None,
            name: sanitize::escape_special(name),
            path: path.into(),
            inline: false,
        }
    }

    /// Inline attachment referenced from the HTML body by `id`.
    pub fn embed(path: impl Into<PathBuf>, name: &str, id: Option<&str>) -> Self {
        Self {
            id: id.map(str::to_string),
            inline: true,
            ..Self::new(path, name)
        }
    }

    /// Explicit id, or a hash of name and path.
    pub fn id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => {
                let mut hasher = Sha256::new();
                hasher.update(self.name.as_bytes());
                hasher.update(self.path.to_string_lossy().as_bytes());
                format!("{:x}", hasher.finalize())
            }
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    /// MIME type from the file extension.
    pub fn mime_type(&self) -> String {
        mime::mime_type_for_path(&self.path)
    }

    /// File bytes, or `None` when the file is missing, unreadable or empty.
    pub fn read(&self) -> Option<Vec<u8>> {
        if !self.path.is_file() {
            return None;
        }
        match std::fs::read(&self.path) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Attachment file unreadable"
                );
                None
            }
        }
    }

    /// Base64 of the file, empty when no data is available.
    pub fn base64_content(&self) -> String {
        self.read()
            .map(|bytes| BASE64.encode(bytes))
            .unwrap_or_default()
    }

    /// API payload, or `None` when the name or the file data is missing.
    pub fn get(&self) -> Option<AttachmentPayload> {
        if self.name.is_empty() {
            return None;
        }
        let content = self.base64_content();
        if content.is_empty() {
            return None;
        }
        Some(AttachmentPayload {
            content_type: self.mime_type(),
            filename: self.name.clone(),
            base64_content: content,
            content_id: self.inline.then(|| self.id()),
        })
    }
}
