//! Email parsing: header decoding, MIME tree walking, and part classification.

pub mod address;
pub mod charset;
pub mod classify;
pub mod date;
pub mod encoded_word;
pub mod eml;
pub mod header;
pub mod mime;
pub mod params;
pub mod transfer;

/// A decoded header value plus whether it had to fall back to a default.
///
/// Malformed fields never abort a parse; the caller gets the default and
/// the flag, and decides whether to log or surface it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded<T> {
    pub value: T,
    pub defaulted: bool,
}

impl<T> Decoded<T> {
    /// A value that parsed cleanly.
    pub fn parsed(value: T) -> Self {
        Self {
            value,
            defaulted: false,
        }
    }

    /// A default substituted for an unparseable value.
    pub fn fallback(value: T) -> Self {
        Self {
            value,
            defaulted: true,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
