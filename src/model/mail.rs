//! The fully decoded message.

use super::attachment::{AttachedFile, InlineFile};
use super::headers::Headers;

/// A decoded email.
///
/// Built once per parse call and handed to the caller; nothing in the
/// library keeps a reference to it.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Email {
    /// Top-level header block.
    pub headers: Headers,

    /// First `text/plain` body part, charset-decoded (empty if none).
    pub text: String,

    /// First `text/enriched` body part, charset-decoded (empty if none).
    pub enriched_text: String,

    /// First `text/html` body part, charset-decoded (empty if none).
    pub html: String,

    /// Attachments, in MIME tree pre-order.
    pub attached_files: Vec<AttachedFile>,

    /// Inline files, in MIME tree pre-order.
    pub inline_files: Vec<InlineFile>,
}
