//! RFC 5322 header block decoding: unfolding and per-field dispatch.
//!
//! Every field decoder is lenient: a value that cannot be parsed is replaced
//! by its default and logged, and the rest of the block is still decoded.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::address::decode_address_list;
use super::date::decode_date;
use super::encoded_word::decode_encoded_words;
use super::params::{parse_content_disposition, parse_content_type};
use super::Decoded;
use crate::model::address::Address;
use crate::model::headers::Headers;

/// Decode a raw header block (everything before the first blank line).
pub fn parse_headers(raw_headers: &[u8]) -> Headers {
    let text = decode_header_bytes(raw_headers);
    let fields = unfold_headers(&text);

    let mut headers = Headers::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (name, value) in fields {
        let lower = name.to_ascii_lowercase();
        if is_singleton(&lower) && !seen.insert(lower.clone()) {
            debug!(header = %name, "Repeated header ignored, keeping first occurrence");
            continue;
        }
        apply_field(&mut headers, &name, &lower, &value);
    }

    headers
}

/// Fields that can only hold one value; later occurrences are ignored.
fn is_singleton(lower: &str) -> bool {
    matches!(
        lower,
        "date"
            | "resent-date"
            | "subject"
            | "message-id"
            | "resent-message-id"
            | "mime-version"
            | "content-type"
            | "content-disposition"
            | "content-id"
            | "content-transfer-encoding"
    )
}

fn apply_field(headers: &mut Headers, name: &str, lower: &str, value: &str) {
    match lower {
        "date" => headers.date = logged(name, value, decode_date(value)),
        "resent-date" => headers.resent_date = logged(name, value, decode_date(value)),

        "from" => append_addresses(&mut headers.from, name, value),
        "sender" => append_addresses(&mut headers.sender, name, value),
        "reply-to" => append_addresses(&mut headers.reply_to, name, value),
        "to" => append_addresses(&mut headers.to, name, value),
        "cc" => append_addresses(&mut headers.cc, name, value),
        "bcc" => append_addresses(&mut headers.bcc, name, value),
        "resent-from" => append_addresses(&mut headers.resent_from, name, value),
        "resent-sender" => append_addresses(&mut headers.resent_sender, name, value),
        "resent-to" => append_addresses(&mut headers.resent_to, name, value),
        "resent-cc" => append_addresses(&mut headers.resent_cc, name, value),
        "resent-bcc" => append_addresses(&mut headers.resent_bcc, name, value),

        "message-id" => headers.message_id = logged(name, value, decode_message_id(value)),
        "resent-message-id" => {
            headers.resent_message_id = logged(name, value, decode_message_id(value));
        }
        "in-reply-to" => headers.in_reply_to.extend(parse_message_id_list(value)),
        "references" => headers.references.extend(parse_message_id_list(value)),

        "subject" => headers.subject = decode_encoded_words(value).trim().to_string(),
        "comments" => headers
            .comments
            .push(decode_encoded_words(value).trim().to_string()),
        "keywords" => headers.keywords.extend(parse_keywords(value)),

        "content-type" => headers.content_type = logged(name, value, parse_content_type(value)),
        "content-disposition" => {
            headers.content_disposition = logged(name, value, parse_content_disposition(value));
        }
        "content-id" => {
            let id = logged(name, value, decode_message_id(value));
            headers.content_id = (!id.is_empty()).then_some(id);
        }
        "content-transfer-encoding" => {
            let token = value.trim().to_ascii_lowercase();
            headers.content_transfer_encoding = (!token.is_empty()).then_some(token);
        }
        "mime-version" => headers.mime_version = Some(value.trim().to_string()),

        _ => headers.extra_headers.push(name, value),
    }
}

/// Unwrap a decoded field, logging when it fell back to its default.
fn logged<T>(name: &str, raw: &str, decoded: Decoded<T>) -> T {
    if decoded.defaulted {
        warn!(header = %name, value = raw.trim(), "Malformed header value, using default");
    }
    decoded.into_value()
}

fn append_addresses(list: &mut Vec<Address>, name: &str, value: &str) {
    let addresses = logged(name, value, decode_address_list(value));
    list.extend(addresses);
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) to
/// the previous field, removing only the line break.
///
/// Returns `(name, value)` pairs with the name in its original case and the
/// value trimmed at both ends.
pub fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.starts_with(' ') || line.starts_with('\t') {
            // Continuation line
            if let Some(last) = result.last_mut() {
                last.1.push_str(line);
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                continue;
            }
            let value = line[colon_pos + 1..].trim_start().to_string();
            result.push((name.to_string(), value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    for (_, value) in &mut result {
        let trimmed = value.trim_end().len();
        value.truncate(trimmed);
    }
    result
}

/// Decode a single message identifier (`Message-ID`, `Content-ID`).
///
/// The first `<…>` wins; without brackets the first bare word is taken.
pub fn decode_message_id(value: &str) -> Decoded<String> {
    match parse_message_id_list(value).into_iter().next() {
        Some(id) => Decoded::parsed(id),
        None => Decoded::fallback(String::new()),
    }
}

/// Extract every message identifier from `In-Reply-To`/`References`,
/// angle brackets stripped.
///
/// Identifiers may be separated by whitespace, commas or comments. Values
/// without any `<…>` are split into bare words.
pub fn parse_message_id_list(value: &str) -> Vec<String> {
    let cleaned = strip_comments(value);
    let bracketed = extract_all_angle_brackets(&cleaned);
    if !bracketed.is_empty() {
        return bracketed;
    }
    cleaned
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|s| s.trim_matches(|c| c == '<' || c == '>'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract the contents of all `<…>` tokens from a string.
fn extract_all_angle_brackets(s: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut remaining = s;
    while let Some(start) = remaining.find('<') {
        if let Some(end) = remaining[start..].find('>') {
            let id: String = remaining[start + 1..start + end]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if !id.is_empty() {
                result.push(id);
            }
            remaining = &remaining[start + end + 1..];
        } else {
            break;
        }
    }
    result
}

/// Remove parenthesized comments (nesting and `\` escapes honored) that are
/// not inside a quoted string.
fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' if depth > 0 || in_quotes => {
                let escaped = chars.next();
                if depth == 0 {
                    out.push(c);
                    out.extend(escaped);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            '(' if !in_quotes => depth += 1,
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    out.push(' ');
                }
            }
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Split a `Keywords` value into decoded, trimmed phrases.
fn parse_keywords(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|k| decode_encoded_words(k.trim()).trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}
