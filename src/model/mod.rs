//! Core data model types for decoded messages, headers, addresses, and files.

pub mod address;
pub mod attachment;
pub mod headers;
pub mod mail;

pub use address::Address;
pub use attachment::{AttachedFile, InlineFile};
pub use headers::{ContentDispositionHeader, ContentTypeHeader, ExtraHeaders, Headers, Params};
pub use mail::Email;
