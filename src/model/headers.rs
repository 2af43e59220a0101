//! Decoded header records for a message or a single MIME part.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};

use super::address::Address;

/// Media type assumed when a part carries no usable `Content-Type`.
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// Header parameters (`charset`, `boundary`, `filename`, …).
///
/// Names are stored lowercase, so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the parameter `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Insert a parameter, replacing any previous value with the same name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.0.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContentTypeHeader {
    /// Lowercase `type/subtype`, never empty.
    pub media_type: String,
    /// Always present; empty when the header is missing.
    pub params: Params,
}

impl Default for ContentTypeHeader {
    fn default() -> Self {
        Self {
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            params: Params::new(),
        }
    }
}

impl ContentTypeHeader {
    /// `true` for any `multipart/*` type.
    pub fn is_multipart(&self) -> bool {
        self.media_type.starts_with("multipart/")
    }

    /// The `charset` parameter, if declared.
    pub fn charset(&self) -> Option<&str> {
        self.params.get("charset")
    }
}

/// `text/plain; charset=utf-8; name="a b.txt"`
impl fmt::Display for ContentTypeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.media_type)?;
        for (name, value) in self.params.iter() {
            let token = !value.is_empty()
                && value
                    .bytes()
                    .all(|b| b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b));
            if token {
                write!(f, "; {name}={value}")?;
            } else {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {name}=\"{escaped}\"")?;
            }
        }
        Ok(())
    }
}

/// A parsed `Content-Disposition` header.
///
/// Unlike [`ContentTypeHeader`], `params` is `None` when the header itself
/// is absent and `Some` (possibly empty) when it is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ContentDispositionHeader {
    /// Lowercase disposition type (`inline`, `attachment`), or empty.
    pub disposition: String,
    pub params: Option<Params>,
}

impl ContentDispositionHeader {
    pub fn is_inline(&self) -> bool {
        self.disposition == "inline"
    }

    pub fn is_attachment(&self) -> bool {
        self.disposition == "attachment"
    }

    /// The `filename` parameter, if any.
    pub fn filename(&self) -> Option<&str> {
        self.params.as_ref().and_then(|p| p.get("filename"))
    }
}

/// Headers that have no typed field, in order of first appearance.
///
/// Each name maps to every raw (unfolded) value it appeared with.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ExtraHeaders(Vec<(String, Vec<String>)>);

impl ExtraHeaders {
    /// Record one occurrence of a header.
    pub fn push(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, values)) => values.push(value),
            None => self.0.push((name.to_string(), vec![value])),
        }
    }

    /// All values recorded for `name` (case-insensitive), in original order.
    pub fn get(&self, name: &str) -> &[String] {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// First value recorded for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).first().map(String::as_str)
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// The decoded header block of a message or a MIME part.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct Headers {
    /// `Date:`; `None` when missing or unparseable.
    pub date: Option<DateTime<FixedOffset>>,
    /// Decoded `Subject:` (RFC 2047 encoded-words resolved).
    pub subject: String,

    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,

    pub resent_date: Option<DateTime<FixedOffset>>,
    pub resent_from: Vec<Address>,
    pub resent_sender: Vec<Address>,
    pub resent_to: Vec<Address>,
    pub resent_cc: Vec<Address>,
    pub resent_bcc: Vec<Address>,
    pub resent_message_id: String,

    /// `Message-ID:` without angle brackets.
    pub message_id: String,
    pub in_reply_to: Vec<String>,
    pub references: Vec<String>,

    /// Decoded `Comments:` values, one per occurrence.
    pub comments: Vec<String>,
    /// Decoded `Keywords:` phrases across all occurrences.
    pub keywords: Vec<String>,

    pub mime_version: Option<String>,
    pub content_type: ContentTypeHeader,
    pub content_disposition: ContentDispositionHeader,
    /// `Content-ID:` without angle brackets.
    pub content_id: Option<String>,
    /// Lowercase `Content-Transfer-Encoding:` token.
    pub content_transfer_encoding: Option<String>,

    pub extra_headers: ExtraHeaders,
}
