//! `Content-Type` and `Content-Disposition` values: a leading token followed
//! by `; name=value` parameters (RFC 2045 §5.1, RFC 2183, RFC 2231).

use std::collections::BTreeMap;

use super::{charset, encoded_word::decode_encoded_words, Decoded};
use crate::model::headers::{
    ContentDispositionHeader, ContentTypeHeader, Params, DEFAULT_MEDIA_TYPE,
};

/// Parse a `Content-Type` value.
///
/// A missing or malformed `type/subtype` falls back to `text/plain`; the
/// parameters are kept either way.
pub fn parse_content_type(value: &str) -> Decoded<ContentTypeHeader> {
    let (token, rest) = split_leading_token(value);
    let params = parse_params(rest);
    let media_type = token.to_ascii_lowercase();

    if is_valid_media_type(&media_type) {
        Decoded::parsed(ContentTypeHeader { media_type, params })
    } else {
        Decoded::fallback(ContentTypeHeader {
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            params,
        })
    }
}

/// Parse a `Content-Disposition` value. An empty disposition token is
/// reported as defaulted.
pub fn parse_content_disposition(value: &str) -> Decoded<ContentDispositionHeader> {
    let (token, rest) = split_leading_token(value);
    let header = ContentDispositionHeader {
        disposition: token.to_ascii_lowercase(),
        params: Some(parse_params(rest)),
    };
    if header.disposition.is_empty() {
        Decoded::fallback(header)
    } else {
        Decoded::parsed(header)
    }
}

fn is_valid_media_type(media_type: &str) -> bool {
    match media_type.split_once('/') {
        Some((main, sub)) => {
            !main.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && !media_type.contains(|c: char| c.is_whitespace() || c.is_control())
        }
        None => false,
    }
}

/// Split `value` at the first `;`, stripping comments from the token.
fn split_leading_token(value: &str) -> (String, &str) {
    let (head, rest) = value.split_once(';').unwrap_or((value, ""));
    let mut token = String::with_capacity(head.len());
    let mut depth = 0usize;
    for ch in head.chars() {
        match ch {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            c if depth == 0 && !c.is_whitespace() => token.push(c),
            _ => {}
        }
    }
    (token, rest)
}

/// One `name*N[*]=value` section of an RFC 2231 parameter.
struct Section {
    index: u32,
    extended: bool,
    value: String,
}

/// Parse a `; name=value` parameter list.
///
/// Quoted values have their quoted-pairs resolved. RFC 2231 sections are
/// reassembled in index order and the `charset'language'` prefix of an
/// extended value selects the charset for its `%XX` bytes. An extended
/// parameter wins over a plain one of the same name. Encoded-words inside
/// values are decoded, except in `boundary`.
pub fn parse_params(input: &str) -> Params {
    let mut plain: Vec<(String, String)> = Vec::new();
    let mut sectioned: BTreeMap<String, Vec<Section>> = BTreeMap::new();

    for (name, value) in split_params(input) {
        let lower = name.to_ascii_lowercase();
        match lower.split_once('*') {
            Some((base, suffix)) => {
                let extended = suffix.ends_with('*') || suffix.is_empty();
                let index_part = suffix.trim_end_matches('*');
                let index = if index_part.is_empty() {
                    0
                } else {
                    match index_part.parse() {
                        Ok(n) => n,
                        Err(_) => continue,
                    }
                };
                sectioned.entry(base.to_string()).or_default().push(Section {
                    index,
                    extended,
                    value,
                });
            }
            None => plain.push((lower, value)),
        }
    }

    let mut params = Params::new();
    for (name, value) in plain {
        if params.contains(&name) {
            continue;
        }
        if name == "boundary" {
            params.insert(&name, value);
        } else {
            params.insert(&name, decode_encoded_words(&value));
        }
    }
    for (name, mut sections) in sectioned {
        sections.sort_by_key(|s| s.index);
        params.insert(&name, join_sections(&sections));
    }
    params
}

fn join_sections(sections: &[Section]) -> String {
    if !sections.iter().any(|s| s.extended) {
        return sections.iter().map(|s| s.value.as_str()).collect();
    }

    let mut label = String::new();
    let mut bytes = Vec::new();
    for (i, section) in sections.iter().enumerate() {
        if !section.extended {
            bytes.extend_from_slice(section.value.as_bytes());
            continue;
        }
        let mut value = section.value.as_str();
        if i == 0 {
            // charset'language'value; both prefixes may be empty.
            let mut parts = value.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(rest)) = (parts.next(), parts.next(), parts.next())
            {
                label = cs.to_string();
                value = rest;
            }
        }
        percent_decode(value, &mut bytes);
    }
    charset::decode(&label, &bytes)
}

fn percent_decode(value: &str, out: &mut Vec<u8>) {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|&c| super::transfer::hex_value(c)),
                bytes.get(i + 2).and_then(|&c| super::transfer::hex_value(c)),
            ) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
}

/// Split a parameter list into raw `(name, value)` pairs.
///
/// Tolerates missing separators before a quoted value's end, stray
/// semicolons, and parameters without a value (skipped).
fn split_params(input: &str) -> Vec<(String, String)> {
    let mut result = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.peek().is_some_and(|&c| c == ';' || c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' || c == ';' {
                break;
            }
            chars.next();
            name.push(c);
        }
        let name = name.trim().to_string();

        if chars.peek() != Some(&'=') {
            continue;
        }
        chars.next();
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    // Folding whitespace inside a quoted value.
                    '\r' | '\n' => {}
                    c => value.push(c),
                }
            }
            // Drop anything between the closing quote and the next `;`.
            while chars.peek().is_some_and(|&c| c != ';') {
                chars.next();
            }
            value
        } else {
            let mut value = String::new();
            while let Some(&c) = chars.peek() {
                if c == ';' {
                    break;
                }
                chars.next();
                value.push(c);
            }
            value.trim().to_string()
        };

        if !name.is_empty() {
            result.push((name, value));
        }
    }

    result
}
