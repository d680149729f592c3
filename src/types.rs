//! Core types shared by every importer

use crate::identifier::normalize;
use crate::import::ImportError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a document is a page of its own or an alias for another one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Article,
    Redirect,
}

/// Canonical unit produced by a transformer and consumed by the publisher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Human readable title, trimmed
    pub title: String,
    /// `normalize(title)`, the addressing key at the sink
    pub identifier: String,
    /// Document body in the target markup
    pub body: String,
    pub kind: DocumentKind,
    /// Normalized identifier of the page this one redirects to
    pub redirect_target: Option<String>,
}

impl Document {
    /// Create an article, deriving the identifier from the title.
    ///
    /// Fails with a parse error when the title or the body is blank; an
    /// article without either carries nothing worth publishing.
    pub fn article(title: impl AsRef<str>, body: impl Into<String>) -> Result<Self, ImportError> {
        let title = title.as_ref().trim().to_string();
        if title.is_empty() {
            return Err(ImportError::Parse("document has no title".into()));
        }

        let body = body.into();
        if body.trim().is_empty() {
            return Err(ImportError::Parse(format!("document '{}' has an empty body", title)));
        }

        Ok(Self {
            identifier: normalize(&title),
            title,
            body,
            kind: DocumentKind::Article,
            redirect_target: None,
        })
    }

    /// Turn this document into a redirect to `target` (already normalized).
    ///
    /// Callers must have ruled out self-redirects.
    pub(crate) fn into_redirect(mut self, target: String, body: String) -> Self {
        debug_assert_ne!(target, self.identifier);
        self.kind = DocumentKind::Redirect;
        self.redirect_target = Some(target);
        self.body = body;
        self
    }

    pub fn is_redirect(&self) -> bool {
        self.kind == DocumentKind::Redirect
    }
}

/// Reference to one source item, enough for a transformer to fetch it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    /// A page title (listing APIs)
    Title(String),
    /// A numeric id (sequential ranges)
    Id(u64),
    /// One line of a dump, with the byte offset it starts at
    Line { offset: u64, line: String },
    /// A named link found on a listing page
    Link { name: String, href: String },
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRef::Title(title) => write!(f, "{}", title),
            ItemRef::Id(id) => write!(f, "#{}", id),
            ItemRef::Line { offset, .. } => write!(f, "line@{}", offset),
            ItemRef::Link { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Resumption marker for an enumerated item.
///
/// Resuming from a cursor restarts the enumeration immediately after the
/// item that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cursor {
    /// Listing position expressed as the title of the entry
    Title(String),
    /// Position in a numeric range
    Index(u64),
    /// Byte offset of a line in a decompressed dump
    Offset(u64),
    /// Entry `index` of listing page `page`
    Page { page: u64, index: usize },
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Title(title) => write!(f, "{}", title),
            Cursor::Index(index) => write!(f, "{}", index),
            Cursor::Offset(offset) => write!(f, "{}", offset),
            Cursor::Page { page, index } => write!(f, "{}/{}", page, index),
        }
    }
}

/// Shape of the cursor a given source understands, used to parse operator input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Title,
    Index,
    Offset,
    Page,
}

impl CursorKind {
    /// Parse an operator supplied `--continue` value
    pub fn parse(&self, raw: &str) -> Result<Cursor, ImportError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ImportError::Config("empty resume position".into()));
        }

        let number = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| ImportError::Config(format!("invalid resume position '{}'", raw)))
        };

        match self {
            CursorKind::Title => Ok(Cursor::Title(raw.to_string())),
            CursorKind::Index => Ok(Cursor::Index(number(raw)?)),
            CursorKind::Offset => Ok(Cursor::Offset(number(raw)?)),
            CursorKind::Page => match raw.split_once('/') {
                Some((page, index)) => Ok(Cursor::Page {
                    page: number(page)?,
                    index: usize::try_from(number(index)?).map_err(|_| {
                        ImportError::Config(format!("resume index out of range in '{}'", raw))
                    })?,
                }),
                // A bare page number resumes at the start of that page
                None => Ok(Cursor::Page {
                    page: number(raw)?.saturating_sub(1),
                    index: usize::MAX,
                }),
            },
        }
    }
}

/// What happened to one document at the publish step. Logged, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Skipped(String),
    Retried { attempt: u32, reason: String },
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Published => f.write_str("published"),
            PublishOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            PublishOutcome::Retried { attempt, reason } => {
                write!(f, "retry #{}: {}", attempt, reason)
            }
        }
    }
}
