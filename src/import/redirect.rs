//! Redirect detection
//!
//! A page whose body opens with a redirect marker (`#REDIRECT [[Target]]` in
//! wiki markup, `. REDIRECT [[Target]]` or `1.  REDIRECT [[Target]]` once a
//! converter has turned the `#` into a list item) is an alias for another
//! page. The marker is matched case-insensitively and tolerates any list
//! prefix and spacing.
//!
//! A bare leading "Redirect" word is only a marker when a `[[` link follows,
//! so articles about things called Redirect pass through. With a list prefix
//! the marker is unambiguous and a missing link is an error.

use crate::identifier::normalize;
use crate::import::source::ImportError;
use crate::types::Document;
use regex::Regex;
use std::sync::OnceLock;

static RE_MARKER: OnceLock<Regex> = OnceLock::new();

fn marker() -> &'static Regex {
    RE_MARKER.get_or_init(|| {
        // Literal pattern, always valid
        Regex::new(r"(?i)^\s*(?P<prefix>#|\*|\.|\d+\.)?\s*REDIRECT\b\s*:?\s*").unwrap()
    })
}

/// Outcome of redirect resolution for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Not a redirect; publish as is
    Article(Document),
    /// Redirect to a different page; publish as a redirect document
    Redirect(Document),
    /// Redirect to itself; must not be published
    SelfRedirect(Document),
}

impl Resolution {
    /// The document to publish, if any
    pub fn into_publishable(self) -> Option<Document> {
        match self {
            Resolution::Article(doc) | Resolution::Redirect(doc) => Some(doc),
            Resolution::SelfRedirect(_) => None,
        }
    }
}

/// Detects redirect markers and rewrites documents accordingly
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectResolver;

impl RedirectResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a document.
    ///
    /// Fails with `ImportError::Redirect` when the body opens with a marker
    /// but no target can be extracted from it.
    pub fn resolve(&self, doc: Document) -> Result<Resolution, ImportError> {
        let Some(found) = marker().captures(&doc.body) else {
            return Ok(Resolution::Article(doc));
        };
        let prefixed = found.name("prefix").is_some();
        let end = found.get(0).map_or(0, |m| m.end());

        let Some(after) = doc.body[end..].strip_prefix("[[") else {
            if prefixed {
                return Err(ImportError::Redirect(format!(
                    "redirect in '{}' has no [[target]] link",
                    doc.title
                )));
            }
            return Ok(Resolution::Article(doc));
        };

        let close = after.find("]]").ok_or_else(|| {
            ImportError::Redirect(format!("unterminated redirect link in '{}'", doc.title))
        })?;

        let link = &after[..close];
        // [[Target#Section|label]] points at Target
        let target = link.split(['#', '|']).next().unwrap_or_default().trim();
        if target.is_empty() {
            return Err(ImportError::Redirect(format!(
                "redirect in '{}' has no target",
                doc.title
            )));
        }

        let target = normalize(target);
        if target == doc.identifier {
            return Ok(Resolution::SelfRedirect(doc));
        }

        let rest = after[close + 2..].trim().to_string();
        Ok(Resolution::Redirect(doc.into_redirect(target, rest)))
    }
}
