//! Routing of MIME leaves into the message aggregate.
//!
//! Leaves are visited in pre-order and each one lands in exactly one place:
//! the plain, HTML or enriched body slot, the inline files, or the attached
//! files. The first eligible leaf of each text kind fills its slot.

use tracing::trace;

use super::charset;
use super::mime::{Leaf, LeafRole};
use crate::model::attachment::{AttachedFile, InlineFile};
use crate::model::headers::Headers;
use crate::model::mail::Email;

/// Text body kinds that can fill a body slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextKind {
    Plain,
    Html,
    Enriched,
}

impl TextKind {
    fn of(media_type: &str) -> Option<Self> {
        match media_type {
            "text/plain" => Some(TextKind::Plain),
            "text/html" => Some(TextKind::Html),
            "text/enriched" => Some(TextKind::Enriched),
            _ => None,
        }
    }
}

/// Where a leaf ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    Body(TextKind),
    Inline,
    Attached,
}

/// Builds an [`Email`] from top-level headers and the leaves of its tree.
pub struct Assembler<'a> {
    default_charset: &'a str,
    email: Email,
    filled: [bool; 3],
}

impl<'a> Assembler<'a> {
    /// `default_charset` decodes text leaves that declare no charset.
    pub fn new(headers: Headers, default_charset: &'a str) -> Self {
        Self {
            default_charset,
            email: Email {
                headers,
                ..Email::default()
            },
            filled: [false; 3],
        }
    }

    /// Route one leaf. Call in traversal order.
    pub fn push(&mut self, leaf: Leaf) {
        let destination = self.destination(&leaf);
        trace!(
            media_type = %leaf.headers.content_type.media_type,
            disposition = %leaf.headers.content_disposition.disposition,
            size = leaf.data.len(),
            ?destination,
            "Classified MIME part"
        );

        match destination {
            Destination::Body(kind) => {
                let label = leaf
                    .headers
                    .content_type
                    .charset()
                    .unwrap_or(self.default_charset);
                let text = charset::decode(label, &leaf.data);
                self.filled[kind as usize] = true;
                match kind {
                    TextKind::Plain => self.email.text = text,
                    TextKind::Html => self.email.html = text,
                    TextKind::Enriched => self.email.enriched_text = text,
                }
            }
            Destination::Inline => {
                let Leaf { headers, data, .. } = leaf;
                self.email.inline_files.push(InlineFile {
                    content_type: headers.content_type,
                    content_disposition: headers.content_disposition,
                    content_id: headers.content_id,
                    data,
                });
            }
            Destination::Attached => {
                let Leaf { headers, data, .. } = leaf;
                self.email.attached_files.push(AttachedFile {
                    content_type: headers.content_type,
                    content_disposition: headers.content_disposition,
                    data,
                });
            }
        }
    }

    pub fn finish(self) -> Email {
        self.email
    }

    fn destination(&self, leaf: &Leaf) -> Destination {
        if leaf.role == LeafRole::Signature {
            return Destination::Attached;
        }

        let headers = &leaf.headers;
        let disposition = &headers.content_disposition;
        if headers.content_id.is_some() || disposition.is_inline() {
            return Destination::Inline;
        }

        let open_slot = TextKind::of(&headers.content_type.media_type)
            .filter(|kind| !self.filled[*kind as usize]);
        match open_slot {
            Some(kind) if !disposition.is_attachment() => Destination::Body(kind),
            _ => Destination::Attached,
        }
    }
}

/// Classify `leaves` (in traversal order) under `headers`.
pub fn assemble(headers: Headers, leaves: Vec<Leaf>, default_charset: &str) -> Email {
    let mut assembler = Assembler::new(headers, default_charset);
    for leaf in leaves {
        assembler.push(leaf);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::params::{parse_content_disposition, parse_content_type};

    fn leaf(content_type: &str, disposition: Option<&str>, cid: Option<&str>, data: &[u8]) -> Leaf {
        let mut headers = Headers {
            content_type: parse_content_type(content_type).value,
            content_id: cid.map(str::to_string),
            ..Headers::default()
        };
        if let Some(d) = disposition {
            headers.content_disposition = parse_content_disposition(d).value;
        }
        Leaf {
            headers,
            data: data.to_vec(),
            role: LeafRole::Content,
        }
    }

    #[test]
    fn test_first_text_leaf_wins() {
        let email = assemble(
            Headers::default(),
            vec![
                leaf("text/plain", None, None, b"first"),
                leaf("text/plain", None, None, b"second"),
                leaf("text/html", None, None, b"<p>x</p>"),
            ],
            "utf-8",
        );
        assert_eq!(email.text, "first");
        assert_eq!(email.html, "<p>x</p>");
        assert_eq!(email.attached_files.len(), 1);
        assert_eq!(email.attached_files[0].data, b"second");
    }

    #[test]
    fn test_content_id_beats_attachment_disposition() {
        let email = assemble(
            Headers::default(),
            vec![leaf("image/png", Some("attachment; filename=a.png"), Some("a@x"), b"png")],
            "utf-8",
        );
        assert_eq!(email.inline_files.len(), 1);
        assert_eq!(email.inline_files[0].content_id.as_deref(), Some("a@x"));
        assert!(email.attached_files.is_empty());
    }

    #[test]
    fn test_signature_always_attached() {
        let mut sig = leaf("application/pgp-signature", Some("inline"), Some("sig@x"), b"sig");
        sig.role = LeafRole::Signature;
        let email = assemble(Headers::default(), vec![sig], "utf-8");
        assert_eq!(email.attached_files.len(), 1);
        assert!(email.inline_files.is_empty());
    }

    #[test]
    fn test_inline_disposition_beats_text_body() {
        let email = assemble(
            Headers::default(),
            vec![
                leaf("text/plain", Some("inline"), None, b"inline text"),
                leaf("text/plain", None, None, b"body"),
                leaf("text/html", Some("inline; filename=page.html"), None, b"<p/>"),
                leaf("image/jpeg", Some("inline"), None, b"jpg"),
            ],
            "utf-8",
        );
        assert_eq!(email.text, "body");
        assert!(email.html.is_empty());
        assert_eq!(email.inline_files.len(), 3);
        assert_eq!(email.inline_files[0].data, b"inline text");
        assert_eq!(email.inline_files[1].filename(), Some("page.html"));
        assert!(email.attached_files.is_empty());
    }

    #[test]
    fn test_lone_inline_text_part_is_inline_file() {
        let email = assemble(
            Headers::default(),
            vec![leaf("text/plain", Some("inline"), None, b"body")],
            "utf-8",
        );
        assert!(email.text.is_empty());
        assert_eq!(email.inline_files.len(), 1);
        assert!(email.attached_files.is_empty());
    }

    #[test]
    fn test_attachment_disposition_keeps_text_out_of_body() {
        let email = assemble(
            Headers::default(),
            vec![
                leaf("text/html", Some("attachment; filename=page.html"), None, b"<html/>"),
                leaf("text/enriched", None, None, b"<bold>hi</bold>"),
            ],
            "utf-8",
        );
        assert!(email.html.is_empty());
        assert_eq!(email.enriched_text, "<bold>hi</bold>");
        assert_eq!(email.attached_files.len(), 1);
    }

    #[test]
    fn test_body_charset_decoding() {
        let email = assemble(
            Headers::default(),
            vec![
                leaf("text/plain; charset=iso-8859-1", None, None, b"caf\xe9"),
                leaf("text/html", None, None, b"<p>\xe9</p>"),
            ],
            "windows-1252",
        );
        assert_eq!(email.text, "café");
        assert_eq!(email.html, "<p>é</p>");
    }
}
