//! Configuration for the importers
//!
//! Values come from an optional TOML file, then from well-known environment
//! variables, then from command line flags. Only [`Config::with_env_overlay`]
//! reads the environment; components receive plain values.

mod fetching;
mod logging;
mod publish;
mod sources;

pub use fetching::{HttpConfig, PacingConfig};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use publish::{NostrConfig, PublishConfig};
pub use sources::{MediaWikiConfig, MoviesConfig, NamesConfig, ProgArchivesConfig};

use crate::import::{FetchConfig, PipelineConfig, RetryPolicy};
use crate::sources::Importer;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default configuration file, read when present
pub const DEFAULT_CONFIG_FILE: &str = "wiki-importer.toml";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub nostr: NostrConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mediawiki: MediaWikiConfig,
    #[serde(default)]
    pub progarchives: ProgArchivesConfig,
    #[serde(default)]
    pub movies: MoviesConfig,
    #[serde(default)]
    pub names: NamesConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Overlay the process environment (`NOSTR_KEY`, `RELAY`, `HOST`,
    /// `TMDB_API_KEY`, `OMDB_API_KEY`)
    pub fn with_env_overlay(mut self) -> Self {
        self.apply_env(|name| std::env::var(name).ok());
        self
    }

    /// Overlay values from `lookup`; empty values are ignored
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = var("NOSTR_KEY") {
            self.nostr.secret_key = Some(key);
        }
        if let Some(relay) = var("RELAY") {
            self.nostr.relay_url = Some(relay);
        }
        if let Some(host) = var("HOST") {
            self.mediawiki.host = host;
        }
        if let Some(key) = var("TMDB_API_KEY") {
            self.movies.tmdb_api_key = Some(key);
        }
        if let Some(key) = var("OMDB_API_KEY") {
            self.movies.omdb_api_key = Some(key);
        }
    }

    /// Validate everything `importer` needs.
    ///
    /// Collects all validation errors and reports them together so the user
    /// can fix everything in one pass.
    pub fn validate_for(&self, importer: Importer) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        match self.nostr.secret_key.as_deref() {
            None => errors.push("nostr.secret_key (NOSTR_KEY) is required".to_string()),
            Some(key) => {
                if !matches!(hex::decode(key), Ok(bytes) if bytes.len() == 32) {
                    errors.push("nostr.secret_key must be 64 hex characters".to_string());
                }
            }
        }
        match self.nostr.relay_url.as_deref() {
            None => errors.push("nostr.relay_url (RELAY) is required".to_string()),
            Some(relay) => {
                if !(relay.starts_with("ws://") || relay.starts_with("wss://")) {
                    errors.push(format!("nostr.relay_url must be a ws:// or wss:// URL, got {}", relay));
                }
            }
        }
        if self.nostr.ack_timeout_secs == 0 {
            errors.push("nostr.ack_timeout_secs must be positive".to_string());
        }
        if self.http.timeout_secs == 0 {
            errors.push("http.timeout_secs must be positive".to_string());
        }

        match importer {
            Importer::MediaWiki => {
                if self.mediawiki.host.trim().is_empty() {
                    errors.push("mediawiki.host (HOST) is required".to_string());
                }
                if self.mediawiki.verify_profile && self.mediawiki.profile_relays.is_empty() {
                    errors.push("mediawiki.profile_relays must not be empty when verify_profile is set".to_string());
                }
            }
            Importer::ProgArchivesAlbums | Importer::ProgArchivesArtists => {
                let pa = &self.progarchives;
                let end = if importer == Importer::ProgArchivesAlbums {
                    pa.albums_end
                } else {
                    pa.artists_end
                };
                if pa.start > end {
                    errors.push(format!("progarchives.start ({}) is past the last id ({})", pa.start, end));
                }
            }
            Importer::Movies | Importer::Persons => {
                if self.movies.tmdb_api_key.is_none() {
                    errors.push("movies.tmdb_api_key (TMDB_API_KEY) is required".to_string());
                }
            }
            Importer::Names => {
                if self.names.last_page == 0 {
                    errors.push("names.last_page must be positive".to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }
    }

    /// HTTP client settings
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::from(&self.http)
    }

    /// Driver settings; `total_hint` sizes the progress bar.
    ///
    /// Unbounded retries wait the transient backoff between attempts, a
    /// single retry waits `publish.retry_delay_ms`.
    pub fn pipeline_config(&self, total_hint: Option<u64>) -> PipelineConfig {
        let retry_delay = match self.publish.retry {
            RetryPolicy::RetryForever => self.pacing.transient_backoff(),
            RetryPolicy::Skip | RetryPolicy::RetryOnce => {
                Duration::from_millis(self.publish.retry_delay_ms)
            }
        };

        PipelineConfig {
            item_delay: self.pacing.item_delay(),
            failure_delay: self.pacing.failure_delay(),
            retry: self.publish.retry,
            retry_delay,
            total_hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY: &str = "0000000000000000000000000000000000000000000000000000000000000003";

    fn valid_config() -> Config {
        let mut cfg = Config::default();
        cfg.nostr.secret_key = Some(KEY.to_string());
        cfg.nostr.relay_url = Some("wss://relay.example".to_string());
        cfg.movies.tmdb_api_key = Some("tmdb".to_string());
        cfg
    }

    #[test]
    fn valid_config_passes_for_every_importer() {
        let cfg = valid_config();
        for importer in [
            Importer::MediaWiki,
            Importer::ProgArchivesAlbums,
            Importer::ProgArchivesArtists,
            Importer::Movies,
            Importer::Persons,
            Importer::Names,
        ] {
            assert!(cfg.validate_for(importer).is_ok(), "{} should validate", importer);
        }
    }

    #[test]
    fn validate_collects_missing_key_and_relay() {
        let cfg = Config::default();
        let msg = cfg.validate_for(Importer::Names).unwrap_err().to_string();
        assert!(msg.contains("nostr.secret_key (NOSTR_KEY) is required"));
        assert!(msg.contains("nostr.relay_url (RELAY) is required"));
    }

    #[test]
    fn validate_rejects_malformed_key_and_relay() {
        let mut cfg = valid_config();
        cfg.nostr.secret_key = Some("nsec1xyz".to_string());
        cfg.nostr.relay_url = Some("https://relay.example".to_string());
        let msg = cfg.validate_for(Importer::Names).unwrap_err().to_string();
        assert!(msg.contains("must be 64 hex characters"));
        assert!(msg.contains("must be a ws:// or wss:// URL"));
    }

    #[test]
    fn validate_requires_tmdb_key_only_for_movies() {
        let mut cfg = valid_config();
        cfg.movies.tmdb_api_key = None;
        assert!(cfg.validate_for(Importer::ProgArchivesAlbums).is_ok());
        let err = cfg.validate_for(Importer::Persons).unwrap_err();
        assert!(err.to_string().contains("TMDB_API_KEY"));
    }

    #[test]
    fn validate_requires_host_for_mediawiki() {
        let mut cfg = valid_config();
        cfg.mediawiki.host = " ".to_string();
        let err = cfg.validate_for(Importer::MediaWiki).unwrap_err();
        assert!(err.to_string().contains("mediawiki.host (HOST) is required"));
    }

    #[test]
    fn env_overlay_replaces_file_values() {
        let mut cfg = valid_config();
        let env: HashMap<&str, &str> = [
            ("NOSTR_KEY", "00000000000000000000000000000000000000000000000000000000000000aa"),
            ("RELAY", "wss://other.example"),
            ("HOST", "starwars.fandom.com"),
            ("OMDB_API_KEY", "  "),
        ]
        .into_iter()
        .collect();

        cfg.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert!(cfg.nostr.secret_key.as_deref().unwrap().ends_with("aa"));
        assert_eq!(cfg.nostr.relay_url.as_deref(), Some("wss://other.example"));
        assert_eq!(cfg.mediawiki.host, "starwars.fandom.com");
        assert_eq!(cfg.movies.tmdb_api_key.as_deref(), Some("tmdb"));
        assert!(cfg.movies.omdb_api_key.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [nostr]
            relay_url = "wss://relay.example"

            [pacing]
            item_delay_ms = 500

            [publish]
            retry = "retry_forever"

            [mediawiki]
            host = "orthodoxwiki.org"
            verify_profile = false
            "#,
        )
        .unwrap();

        assert_eq!(cfg.nostr.ack_timeout_secs, 15);
        assert_eq!(cfg.pacing.item_delay_ms, 500);
        assert_eq!(cfg.pacing.failure_delay_ms, 2000);
        assert_eq!(cfg.publish.retry, RetryPolicy::RetryForever);
        assert_eq!(cfg.mediawiki.host, "orthodoxwiki.org");
        assert_eq!(cfg.mediawiki.target_format, "asciidoc");
        assert_eq!(cfg.mediawiki.profile_relays.len(), 3);
        assert_eq!(cfg.progarchives.albums_end, 75959);
        assert_eq!(cfg.names.last_page, 100);
        assert_eq!(cfg.logging.dir, std::path::PathBuf::from("logs"));
    }

    #[test]
    fn load_reads_file_and_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wiki-importer.toml");
        std::fs::write(&path, "[names]\nlast_page = 3\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().names.last_page, 3);

        let missing = dir.path().join("missing.toml");
        assert!(Config::load(&missing).is_err());
        assert_eq!(Config::load_or_default(&missing).unwrap().names.last_page, 100);

        std::fs::write(&path, "[names\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn pipeline_config_uses_pacing_and_publish() {
        let mut cfg = valid_config();
        cfg.pacing.item_delay_ms = 10;
        cfg.pacing.failure_delay_ms = 20;
        cfg.publish.retry = RetryPolicy::Skip;
        cfg.publish.retry_delay_ms = 30;

        let pipeline = cfg.pipeline_config(Some(5));
        assert_eq!(pipeline.item_delay, Duration::from_millis(10));
        assert_eq!(pipeline.failure_delay, Duration::from_millis(20));
        assert_eq!(pipeline.retry, RetryPolicy::Skip);
        assert_eq!(pipeline.retry_delay, Duration::from_millis(30));
        assert_eq!(pipeline.total_hint, Some(5));

        let fetch = cfg.fetch_config();
        assert_eq!(fetch.user_agent, "Chrome");
        assert_eq!(fetch.timeout, Duration::from_secs(30));
    }

    #[test]
    fn retry_forever_waits_transient_backoff() {
        let mut cfg = valid_config();
        cfg.publish.retry = RetryPolicy::RetryForever;
        cfg.publish.retry_delay_ms = 30;
        cfg.pacing.transient_backoff_secs = 300;

        let pipeline = cfg.pipeline_config(None);
        assert_eq!(pipeline.retry, RetryPolicy::RetryForever);
        assert_eq!(pipeline.retry_delay, Duration::from_secs(300));
        assert_eq!(pipeline.retry_delay, cfg.pacing.transient_backoff());

        cfg.publish.retry = RetryPolicy::RetryOnce;
        assert_eq!(cfg.pipeline_config(None).retry_delay, Duration::from_millis(30));
    }
}
