//! wiki-importer: crawl, transform and publish pipeline for NIP-54 wikis
//!
//! Imports pages from external knowledge sources and publishes them as signed
//! wiki events to a nostr relay, featuring:
//! - Resumable enumeration over id ranges, paginated listings and line dumps
//! - MediaWiki (via pandoc), ProgArchives, TMDB/OMDB and behindthename importers
//! - Redirect detection with self-redirect suppression
//! - Strictly sequential, paced and cancellable publishing with retry policies

pub mod config;
pub mod identifier;
pub mod import;
pub mod publish;
pub mod sources;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;
