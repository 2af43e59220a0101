//! MIME tree walking: header/body splitting and recursive descent over
//! multipart boundaries (RFC 2046 §5.1).

use tracing::debug;

use super::header::parse_headers;
use super::transfer;
use crate::model::headers::Headers;

/// Default limit for nested multiparts (adversarial input guard).
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// How a leaf entered the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafRole {
    /// A regular body part.
    Content,
    /// The detached signature of a `multipart/signed` body, kept opaque.
    Signature,
}

/// A single non-multipart part with its own headers and decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub headers: Headers,
    /// Payload after transfer decoding; not charset-converted.
    pub data: Vec<u8>,
    pub role: LeafRole,
}

/// A `multipart/*` part and its children, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct Multipart {
    pub headers: Headers,
    pub parts: Vec<Part>,
}

/// A node of the MIME tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Leaf(Leaf),
    Multipart(Multipart),
}

impl Part {
    pub fn headers(&self) -> &Headers {
        match self {
            Part::Leaf(leaf) => &leaf.headers,
            Part::Multipart(multipart) => &multipart.headers,
        }
    }

    /// All leaves in depth-first pre-order.
    pub fn into_leaves(self) -> Vec<Leaf> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }
}

fn collect_leaves(part: Part, out: &mut Vec<Leaf>) {
    match part {
        Part::Leaf(leaf) => out.push(leaf),
        Part::Multipart(multipart) => {
            for child in multipart.parts {
                collect_leaves(child, out);
            }
        }
    }
}

/// Parse a complete entity (header block, blank line, body) into a tree.
///
/// Multiparts nested deeper than `max_depth` are kept as one opaque leaf.
pub fn parse_part(data: &[u8], max_depth: usize) -> Part {
    build_part(data, 0, max_depth, LeafRole::Content)
}

fn build_part(data: &[u8], depth: usize, max_depth: usize, role: LeafRole) -> Part {
    let (raw_headers, body) = split_header_body(data);
    let headers = parse_headers(raw_headers);

    if role == LeafRole::Signature || !headers.content_type.is_multipart() {
        return leaf(headers, body, role);
    }

    if depth >= max_depth {
        debug!(depth, max_depth, "Multipart nesting limit reached, keeping part opaque");
        return leaf(headers, body, role);
    }

    let boundary = match headers.content_type.params.get("boundary") {
        Some(b) if !b.is_empty() => b.to_string(),
        _ => {
            debug!(media_type = %headers.content_type.media_type, "Multipart without boundary, keeping part opaque");
            return leaf(headers, body, role);
        }
    };

    let blocks = split_multipart(body, &boundary);
    if blocks.is_empty() {
        debug!(boundary = %boundary, "No boundary delimiter found, keeping part opaque");
        return leaf(headers, body, role);
    }

    let signed = headers.content_type.media_type == "multipart/signed";
    let parts = blocks
        .into_iter()
        .enumerate()
        .map(|(i, block)| {
            let child_role = if signed && i == 1 {
                LeafRole::Signature
            } else {
                LeafRole::Content
            };
            build_part(block, depth + 1, max_depth, child_role)
        })
        .collect();

    Part::Multipart(Multipart { headers, parts })
}

fn leaf(headers: Headers, body: &[u8], role: LeafRole) -> Part {
    let data = transfer::decode(headers.content_transfer_encoding.as_deref(), body);
    Part::Leaf(Leaf {
        headers,
        data,
        role,
    })
}

/// Split an entity at the first empty line into `(headers, body)`.
///
/// An entity that starts with an empty line has no headers. Without any
/// empty line the whole input is headers, unless its first line is not a
/// header field, in which case it is all body.
pub fn split_header_body(data: &[u8]) -> (&[u8], &[u8]) {
    let mut line_start = 0;
    while line_start < data.len() {
        let line_end = data[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p);
        let line = &data[line_start..line_end.unwrap_or(data.len())];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if line.is_empty() {
            let body_start = line_end.map_or(data.len(), |p| p + 1);
            return (&data[..line_start], &data[body_start..]);
        }
        match line_end {
            Some(p) => line_start = p + 1,
            None => break,
        }
    }

    if looks_like_header(data) {
        (data, &[])
    } else {
        (&[], data)
    }
}

/// `true` when the first line has a `name:` prefix with no whitespace in the name.
fn looks_like_header(data: &[u8]) -> bool {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or(data);
    match first_line.iter().position(|&b| b == b':') {
        Some(colon) => colon > 0 && !first_line[..colon].iter().any(u8::is_ascii_whitespace),
        None => false,
    }
}

/// Split a multipart body into the raw blocks between boundary delimiters.
///
/// The preamble and epilogue are discarded. The line break before each
/// delimiter belongs to the delimiter. A missing closing delimiter ends the
/// last block at the end of the input.
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut blocks = Vec::new();
    let mut current_start: Option<usize> = None;
    let mut line_start = 0;

    while line_start <= body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| line_start + p);
        let next_start = line_end.map_or(body.len() + 1, |p| p + 1);
        let line = &body[line_start..line_end.unwrap_or(body.len())];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if let Some(kind) = delimiter_kind(line, delimiter) {
            if let Some(start) = current_start.take() {
                let end = strip_preceding_line_break(body, start, line_start);
                blocks.push(&body[start..end]);
            }
            match kind {
                Delimiter::Close => return blocks,
                Delimiter::Open => current_start = Some(next_start.min(body.len())),
            }
        }

        line_start = next_start;
    }

    if let Some(start) = current_start {
        blocks.push(&body[start..]);
    }
    blocks
}

enum Delimiter {
    Open,
    Close,
}

fn delimiter_kind(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(delimiter)?;
    let (close, rest) = match rest.strip_prefix(b"--") {
        Some(after) => (true, after),
        None => (false, rest),
    };
    if !rest.iter().all(|&b| b == b' ' || b == b'\t') {
        return None;
    }
    Some(if close {
        Delimiter::Close
    } else {
        Delimiter::Open
    })
}

/// End of a block whose next delimiter line starts at `delimiter_start`.
fn strip_preceding_line_break(body: &[u8], block_start: usize, delimiter_start: usize) -> usize {
    let mut end = delimiter_start;
    if end > block_start && body[end - 1] == b'\n' {
        end -= 1;
        if end > block_start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}
