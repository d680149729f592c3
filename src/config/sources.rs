//! Per-importer configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// MediaWiki importer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaWikiConfig {
    /// Wiki host, e.g. `en.wikipedia.org`
    pub host: String,
    /// Converter program
    pub converter: String,
    /// Directory holding the Lua filters
    pub filters_dir: PathBuf,
    /// Converter output format
    pub target_format: String,
    /// Require the key's profile website to match the host before importing
    pub verify_profile: bool,
    pub profile_relays: Vec<String>,
    pub profile_timeout_secs: u64,
}

impl Default for MediaWikiConfig {
    fn default() -> Self {
        Self {
            host: "en.wikipedia.org".to_string(),
            converter: "pandoc".to_string(),
            filters_dir: PathBuf::from("filters"),
            target_format: "asciidoc".to_string(),
            verify_profile: true,
            profile_relays: vec![
                "wss://purplepag.es".to_string(),
                "wss://relay.nos.social".to_string(),
                "wss://user.kindpag.es".to_string(),
            ],
            profile_timeout_secs: 10,
        }
    }
}

impl MediaWikiConfig {
    pub fn profile_timeout(&self) -> Duration {
        Duration::from_secs(self.profile_timeout_secs)
    }
}

/// ProgArchives importer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgArchivesConfig {
    pub base_url: String,
    /// First id of both ranges
    pub start: u64,
    /// Last album id (inclusive)
    pub albums_end: u64,
    /// Last artist id (inclusive)
    pub artists_end: u64,
}

impl Default for ProgArchivesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.progarchives.com".to_string(),
            start: 1,
            albums_end: 75959,
            artists_end: 12736,
        }
    }
}

/// Movies and persons importers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MoviesConfig {
    pub tmdb_api_key: Option<String>,
    /// Enables OMDB enrichment of movies when set
    pub omdb_api_key: Option<String>,
    pub export_base_url: String,
    /// Local export to read instead of downloading today's
    pub dump_path: Option<PathBuf>,
    /// Cast members kept per movie
    pub max_cast: usize,
}

impl Default for MoviesConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            omdb_api_key: None,
            export_base_url: "http://files.tmdb.org/p/exports".to_string(),
            dump_path: None,
            max_cast: 4,
        }
    }
}

/// Names importer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    pub base_url: String,
    /// Last list page (inclusive)
    pub last_page: u64,
}

impl Default for NamesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.behindthename.com".to_string(),
            last_page: 100,
        }
    }
}
