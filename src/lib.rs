//! `mailsift` — a lenient email and MIME decoder.
//!
//! This crate turns a raw RFC 5322 message into an [`Email`]: decoded
//! headers, the primary text/HTML/enriched bodies, and the inline and
//! attached files, in document order. Malformed input degrades to
//! documented defaults; only reading the input can fail.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;

pub use error::{MailError, Result};
pub use model::Email;
pub use parser::eml::{parse, parse_bytes, parse_file, MessageParser};
