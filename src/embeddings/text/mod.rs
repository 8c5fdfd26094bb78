
use sha2::{Digest, Sha256};

use crate::content::Document;

/// Maximum prepared-text length, in characters, sent to the provider.
pub const MAX_TEXT_LENGTH: usize = 8000;

/// Normalize raw text for embedding: strip markup, collapse whitespace,
/// trim, and truncate at a word boundary.
#[inline]
pub fn prepare_text(text: &str) -> String {
    let stripped = strip_markup(text);
    let collapsed = collapse_whitespace(&stripped);
    truncate_at_word_boundary(&collapsed, MAX_TEXT_LENGTH)
}

/// Assemble the text that represents a document for embedding purposes:
/// title first, then excerpt when present, then the stripped body.
#[inline]
pub fn document_text(document: &Document) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(3);

    if !document.title.trim().is_empty() {
        parts.push(document.title.trim().to_string());
    }
    if !document.excerpt.trim().is_empty() {
        parts.push(document.excerpt.trim().to_string());
    }

    let body = collapse_whitespace(&strip_markup(&document.body));
    if !body.is_empty() {
        parts.push(body);
    }

    prepare_text(&parts.join(" "))
}

/// SHA-256 hex digest of the exact text that was embedded. A changed digest
/// means the stored embedding is stale.
#[inline]
pub fn content_fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Remove markup tags, replacing each with a space so adjacent words do not
/// fuse together. An unterminated tag discards the trailing fragment.
#[inline]
pub fn strip_markup(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut in_tag = false;

    for ch in text.chars() {
        match ch {
            '<' => {
                in_tag = true;
                output.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => output.push(ch),
            _ => {}
        }
    }

    output
}

/// Collapse runs of whitespace into single spaces and trim the ends.
#[inline]
pub fn collapse_whitespace(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut pending_space = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = !output.is_empty();
        } else {
            if pending_space {
                output.push(' ');
                pending_space = false;
            }
            output.push(ch);
        }
    }

    output
}

/// Truncate to at most `max_chars` characters without cutting a word in half
/// when a boundary exists inside the window.
#[inline]
pub fn truncate_at_word_boundary(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let window: String = text.chars().take(max_chars).collect();

    match window.rfind(char::is_whitespace) {
        Some(pos) => window
            .get(..pos)
            .unwrap_or(&window)
            .trim_end()
            .to_string(),
        None => window,
    }
}
