//! Core traits and the error type of the import pipeline

use crate::types::{Cursor, Document, ItemRef};
use async_trait::async_trait;
use thiserror::Error;

/// One enumerated item together with the cursor that resumes after it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerated {
    pub item: ItemRef,
    pub cursor: Cursor,
}

impl Enumerated {
    pub fn new(item: ItemRef, cursor: Cursor) -> Self {
        Self { item, cursor }
    }
}

/// Ordered, resumable sequence of source items.
///
/// An error returned here ends the run: a source that cannot list its items
/// must stop rather than silently truncate the dataset.
#[async_trait]
pub trait Enumerator: Send {
    /// Next item, or `None` when the source is exhausted
    async fn next_item(&mut self) -> Result<Option<Enumerated>, ImportError>;

    /// Source name for display
    fn source_name(&self) -> &str;
}

/// Turns one source item into a canonical document.
///
/// Every error is per item: the driver logs it and moves on.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, item: &ItemRef) -> Result<Document, ImportError>;
}

/// Errors that can occur during import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned status {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Malformed redirect: {0}")]
    Redirect(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Sink error: {0}")]
    Sink(String),

    /// The relay answered and refused the event
    #[error("Rejected by relay: {0}")]
    Rejected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cancelled")]
    Cancelled,
}

impl ImportError {
    /// Whether the failure is a network or relay hiccup worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            ImportError::Transport(_) | ImportError::Sink(_) => true,
            ImportError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ImportError::UpstreamStatus {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None if e.is_decode() => ImportError::Parse(e.to_string()),
            None => ImportError::Transport(e.to_string()),
        }
    }
}
