//! Content-Transfer-Encoding decoding (RFC 2045 §6).
//!
//! Both decoders are tolerant: corrupt input yields best-effort bytes,
//! never an error.

use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::{alphabet, Engine};
use tracing::warn;

/// Base64 engine that ignores padding and non-zero trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// A transfer encoding, parsed from its header token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
}

impl TransferEncoding {
    /// Parse a `Content-Transfer-Encoding` token (case-insensitive).
    ///
    /// A missing header means `7bit`. Unknown tokens (`x-uuencode`, typos)
    /// are treated as identity with a warning.
    pub fn from_token(token: Option<&str>) -> Self {
        let Some(token) = token else {
            return TransferEncoding::SevenBit;
        };
        match token.trim().to_ascii_lowercase().as_str() {
            "" | "7bit" => TransferEncoding::SevenBit,
            "8bit" => TransferEncoding::EightBit,
            "binary" => TransferEncoding::Binary,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            "base64" => TransferEncoding::Base64,
            other => {
                warn!(
                    encoding = other,
                    "Unknown Content-Transfer-Encoding, passing bytes through"
                );
                TransferEncoding::Binary
            }
        }
    }

    /// Decode a payload.
    pub fn decode(&self, payload: &[u8]) -> Vec<u8> {
        match self {
            TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
                payload.to_vec()
            }
            TransferEncoding::QuotedPrintable => decode_quoted_printable(payload),
            TransferEncoding::Base64 => decode_base64(payload),
        }
    }
}

/// Decode a payload given its (optional) `Content-Transfer-Encoding` token.
pub fn decode(token: Option<&str>, payload: &[u8]) -> Vec<u8> {
    TransferEncoding::from_token(token).decode(payload)
}

/// Decode base64, skipping line breaks and any byte outside the alphabet.
///
/// Padding may be missing, present, or appear between concatenated chunks;
/// each padded chunk is decoded on its own. A dangling single character
/// (6 bits, less than one byte) is dropped.
pub fn decode_base64(input: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(input.len() / 4 * 3);
    let mut chunk: Vec<u8> = Vec::with_capacity(input.len());

    let mut bytes = input.iter().copied().peekable();
    while let Some(b) = bytes.next() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' => chunk.push(b),
            b'=' => {
                // Swallow the rest of a padding run, then flush the chunk.
                while bytes.peek().is_some_and(|&n| n == b'=' || n.is_ascii_whitespace()) {
                    bytes.next();
                }
                flush_base64_chunk(&mut chunk, &mut output);
            }
            _ => {}
        }
    }
    flush_base64_chunk(&mut chunk, &mut output);
    output
}

fn flush_base64_chunk(chunk: &mut Vec<u8>, output: &mut Vec<u8>) {
    if chunk.len() % 4 == 1 {
        chunk.pop();
    }
    if !chunk.is_empty() {
        match LENIENT_BASE64.decode(&chunk[..]) {
            Ok(bytes) => output.extend_from_slice(&bytes),
            Err(e) => warn!(error = %e, "Corrupt base64 chunk skipped"),
        }
    }
    chunk.clear();
}

/// Decode quoted-printable body text (RFC 2045 §6.7).
///
/// - `=XX` (either hex case) → byte
/// - `=` followed by optional whitespace and a line break → soft break, removed
/// - any other `=` is kept literally
/// - trailing whitespace before a hard line break is removed
/// - hard line breaks keep their original CRLF or LF form
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());

    let mut lines = input.split(|&b| b == b'\n').peekable();
    while let Some(raw_line) = lines.next() {
        let is_last = lines.peek().is_none();
        let crlf = raw_line.last() == Some(&b'\r');
        let line = raw_line.strip_suffix(b"\r").unwrap_or(raw_line);
        let line = trim_trailing_whitespace(line);

        let soft_break = line.last() == Some(&b'=');
        let content = if soft_break {
            &line[..line.len() - 1]
        } else {
            line
        };

        unescape_qp_line(content, &mut result);

        if !soft_break && !is_last {
            result.extend_from_slice(if crlf { b"\r\n".as_slice() } else { b"\n".as_slice() });
        }
    }
    result
}

fn unescape_qp_line(line: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < line.len() {
        if line[i] == b'=' {
            if let (Some(hi), Some(lo)) = (
                line.get(i + 1).and_then(|&c| hex_value(c)),
                line.get(i + 2).and_then(|&c| hex_value(c)),
            ) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(line[i]);
        i += 1;
    }
}

pub(crate) fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

fn trim_trailing_whitespace(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(0, |p| p + 1);
    &line[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parsing() {
        assert_eq!(TransferEncoding::from_token(None), TransferEncoding::SevenBit);
        assert_eq!(
            TransferEncoding::from_token(Some(" Base64 ")),
            TransferEncoding::Base64
        );
        assert_eq!(
            TransferEncoding::from_token(Some("QUOTED-PRINTABLE")),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            TransferEncoding::from_token(Some("x-uuencode")),
            TransferEncoding::Binary
        );
    }

    #[test]
    fn test_identity_encodings() {
        let raw = b"caf\xe9\r\nline two";
        assert_eq!(decode(Some("8bit"), raw), raw.to_vec());
        assert_eq!(decode(Some("binary"), raw), raw.to_vec());
        assert_eq!(decode(None, raw), raw.to_vec());
    }

    #[test]
    fn test_base64_with_line_breaks() {
        let input = b"SGVsbG8s\r\nIHdvcmxk\r\nIQ==\r\n";
        assert_eq!(decode_base64(input), b"Hello, world!");
    }

    #[test]
    fn test_base64_missing_padding() {
        assert_eq!(decode_base64(b"SGk"), b"Hi");
        assert_eq!(decode_base64(b"SGVsbG8"), b"Hello");
    }

    #[test]
    fn test_base64_extra_padding_and_garbage() {
        assert_eq!(decode_base64(b"SGk===\r\n"), b"Hi");
        assert_eq!(decode_base64(b"SG*k!"), b"Hi");
    }

    #[test]
    fn test_base64_concatenated_chunks() {
        // "Hi" + "there", each padded separately.
        assert_eq!(decode_base64(b"SGk=\r\ndGhlcmU="), b"Hithere");
    }

    #[test]
    fn test_base64_dangling_sextet_dropped() {
        assert_eq!(decode_base64(b"SGVsbG8hQ"), b"Hello!");
    }

    #[test]
    fn test_base64_binary_roundtrip() {
        let original: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&original);
        let wrapped: Vec<u8> = encoded
            .as_bytes()
            .chunks(76)
            .flat_map(|line| line.iter().copied().chain(*b"\r\n"))
            .collect();
        assert_eq!(decode_base64(&wrapped), original);
    }

    #[test]
    fn test_qp_hex_escapes() {
        assert_eq!(decode_quoted_printable(b"caf=E9 cr=c3=a8me"), b"caf\xe9 cr\xc3\xa8me");
    }

    #[test]
    fn test_qp_soft_line_breaks() {
        let input = b"This is a long line that was wr=\r\napped by the sender.\r\nSecond line";
        assert_eq!(
            decode_quoted_printable(input),
            b"This is a long line that was wrapped by the sender.\r\nSecond line"
        );
    }

    #[test]
    fn test_qp_soft_break_with_trailing_space_and_lf() {
        let input = b"joined=  \nhere\n";
        assert_eq!(decode_quoted_printable(input), b"joinedhere\n");
    }

    #[test]
    fn test_qp_stray_equals_kept() {
        assert_eq!(decode_quoted_printable(b"a=zz b= c"), b"a=zz b= c");
        assert_eq!(decode_quoted_printable(b"x=4"), b"x=4");
    }

    #[test]
    fn test_qp_strips_trailing_whitespace() {
        assert_eq!(decode_quoted_printable(b"end   \r\nnext"), b"end\r\nnext");
    }
}
