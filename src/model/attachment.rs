//! Files carried by a message: regular attachments and inline (embedded) files.
//!
//! `data` holds the transfer-decoded payload exactly as sent; text files are
//! not charset-converted.

use super::headers::{ContentDispositionHeader, ContentTypeHeader};

/// A non-body part that is not referenced inline.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AttachedFile {
    pub content_type: ContentTypeHeader,
    pub content_disposition: ContentDispositionHeader,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

/// A part meant to be displayed inline, usually referenced from HTML via `cid:`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct InlineFile {
    pub content_type: ContentTypeHeader,
    pub content_disposition: ContentDispositionHeader,
    /// `Content-ID` without angle brackets.
    pub content_id: Option<String>,
    /// Decoded bytes.
    pub data: Vec<u8>,
}

impl AttachedFile {
    /// Suggested file name: disposition `filename`, else content-type `name`.
    pub fn filename(&self) -> Option<&str> {
        file_name(&self.content_type, &self.content_disposition)
    }
}

impl InlineFile {
    /// Suggested file name: disposition `filename`, else content-type `name`.
    pub fn filename(&self) -> Option<&str> {
        file_name(&self.content_type, &self.content_disposition)
    }
}

fn file_name<'a>(
    content_type: &'a ContentTypeHeader,
    disposition: &'a ContentDispositionHeader,
) -> Option<&'a str> {
    disposition
        .filename()
        .or_else(|| content_type.params.get("name"))
        .filter(|name| !name.trim().is_empty())
}
