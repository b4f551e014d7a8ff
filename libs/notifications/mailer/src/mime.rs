//! Extension to MIME type lookup.

use std::path::Path;

/// MIME type registered for `extension`, if any.
pub fn lookup(extension: &str) -> Option<String> {
    mime_guess::from_ext(extension).first_raw().map(str::to_string)
}

/// MIME type of a file path: `unknown/unknown` without extension,
/// `unknown/<ext>` when the extension is not registered.
pub fn mime_type_for_path(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| !ext.is_empty());

    match extension {
        None => "unknown/unknown".to_string(),
        Some(ext) => lookup(&ext).unwrap_or_else(|| format!("unknown/{}", ext)),
    }
}
