//! Entry points: decode a complete RFC 5322 message from a reader, a byte
//! slice, or a `.eml` file.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::{classify, mime};
use crate::config::ParserConfig;
use crate::error::{MailError, Result};
use crate::model::mail::Email;

/// A message decoder with its settings.
#[derive(Debug, Clone, Default)]
pub struct MessageParser {
    config: ParserConfig,
}

impl MessageParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Read `reader` to the end and decode it. Only the read can fail.
    pub fn parse_reader(&self, mut reader: impl Read) -> Result<Email> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(self.parse_bytes(&data))
    }

    /// Decode a message held in memory. Never fails.
    pub fn parse_bytes(&self, raw_message: &[u8]) -> Email {
        let message_bytes = if self.config.strip_mbox_from_line {
            skip_from_line(raw_message)
        } else {
            strip_bom(raw_message)
        };

        let root = mime::parse_part(message_bytes, self.config.max_depth);
        let headers = root.headers().clone();
        let leaves = root.into_leaves();
        debug!(
            size = message_bytes.len(),
            leaves = leaves.len(),
            "Decoded MIME tree"
        );

        classify::assemble(headers, leaves, &self.config.default_charset)
    }

    /// Read and decode a `.eml` file.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<Email> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MailError::FileNotFound(path.to_path_buf())
            } else {
                MailError::io(path, e)
            }
        })?;
        Ok(self.parse_bytes(&data))
    }
}

/// Decode a message from `reader` with default settings.
pub fn parse(reader: impl Read) -> Result<Email> {
    MessageParser::default().parse_reader(reader)
}

/// Decode an in-memory message with default settings.
pub fn parse_bytes(raw_message: &[u8]) -> Email {
    MessageParser::default().parse_bytes(raw_message)
}

/// Decode a `.eml` file with default settings.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Email> {
    MessageParser::default().parse_file(path)
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = strip_bom(data);

    if data.starts_with(b"From ") {
        // Find end of line
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert!(result.starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert_eq!(result, data);
    }

    #[test]
    fn test_bom_is_stripped() {
        let email = parse_bytes(b"\xEF\xBB\xBFSubject: bom\n\nhello");
        assert_eq!(email.headers.subject, "bom");
        assert_eq!(email.text, "hello");
    }

    #[test]
    fn test_from_line_kept_when_disabled() {
        let parser = MessageParser::new(ParserConfig {
            strip_mbox_from_line: false,
            ..ParserConfig::default()
        });
        let email = parser.parse_bytes(b"From someone\nSubject: x\n\nbody");
        // "From someone" is not a header field, so it is dropped while unfolding.
        assert_eq!(email.headers.subject, "x");
        assert!(email.headers.from.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let email = parse_bytes(b"");
        assert_eq!(email.headers.content_type.media_type, "text/plain");
        assert!(email.text.is_empty());
        assert!(email.attached_files.is_empty());
        assert!(email.inline_files.is_empty());
    }

    #[test]
    fn test_parse_reader() {
        let raw: &[u8] = b"Subject: via reader\r\n\r\nline\r\n";
        let email = parse(raw).expect("reading a slice cannot fail");
        assert_eq!(email.headers.subject, "via reader");
        assert_eq!(email.text, "line\r\n");
    }

    #[test]
    fn test_parse_file_and_missing_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"Subject: on disk\n\nbody\n").expect("write");
        let email = parse_file(file.path()).expect("parse");
        assert_eq!(email.headers.subject, "on disk");

        let missing = parse_file("/definitely/not/here.eml");
        assert!(matches!(missing, Err(MailError::FileNotFound(_))));
    }

    #[test]
    fn test_default_charset_applies_to_undeclared_text() {
        let parser = MessageParser::new(ParserConfig {
            default_charset: "iso-8859-1".to_string(),
            ..ParserConfig::default()
        });
        let email = parser.parse_bytes(b"Subject: x\n\ncaf\xe9");
        assert_eq!(email.text, "café");
    }
}
