//! Typed errors at the library boundaries.
//!
//! Command-level code (the `run_*` functions and `main`) works with
//! `anyhow::Result`; these enums are what the individual components
//! return so callers can react to a specific failure.

use thiserror::Error;

/// Errors raised while constructing an identification agent.
///
/// Turn-level failures are never surfaced through this type: they are
/// folded into an [`AgentResponse`](crate::models::AgentResponse) with
/// `status = error`.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("No reasoning backend API key available: {0}")]
    Credential(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A backend reply that does not match the agent response schema, even
/// after any code fence was stripped.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("status \"{status}\" requires a \"{field}\" object")]
    MissingPayload {
        status: &'static str,
        field: &'static str,
    },

    #[error("invalid question: {0}")]
    InvalidQuestion(String),
}

/// Errors returned by the Discogs catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Discogs token is empty")]
    MissingToken,

    #[error("Discogs authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("Discogs API {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Discogs request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected Discogs response: {0}")]
    Decode(String),

    #[error("Invalid Discogs request: {0}")]
    InvalidRequest(String),
}

impl CatalogError {
    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Auth { status, .. } | CatalogError::Api { status, .. } => Some(*status),
            CatalogError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Archive limits of the 32-bit ZIP format (no ZIP64 records are written).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArchiveError {
    #[error("entry {name} is {size} bytes, larger than the 4 GiB limit")]
    EntryTooLarge { name: String, size: u64 },

    #[error("entry name is {len} bytes, longer than 65535")]
    NameTooLong { len: usize },

    #[error("archive holds {count} entries, more than 65535")]
    TooManyEntries { count: usize },

    #[error("archive would exceed the 4 GiB offset limit")]
    ArchiveTooLarge,
}

/// Errors returned when uploading a photo to an image host.
#[derive(Debug, Error)]
pub enum HostingError {
    #[error("Image host API key not set: {0}")]
    MissingKey(String),

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Image upload request failed: {0}")]
    Network(#[from] reqwest::Error),
}
