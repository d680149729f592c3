//! Concrete importers
//!
//! Each importer pairs one of the generic enumerators with a source specific
//! transformer. [`Importer::build`] wires them from the configuration.

pub mod html;
pub mod mediawiki;
pub mod movies;
pub mod names;
pub mod progarchives;

use crate::config::Config;
use crate::import::{
    DumpLines, Enumerator, HttpFetcher, ImportError, PaginatedListing, PandocConverter,
    SequentialRange, Transformer,
};
use crate::types::{Cursor, CursorKind};
use chrono::{Days, NaiveDate, Utc};
use mediawiki::{MediaWikiListing, MediaWikiTransformer};
use movies::{export_url, TmdbKind, TmdbTransformer};
use names::{NamesListing, NamesTransformer};
use progarchives::{PageKind, ProgArchivesTransformer};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The available importers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Importer {
    MediaWiki,
    ProgArchivesAlbums,
    ProgArchivesArtists,
    Movies,
    Persons,
    Names,
}

/// A ready to run enumerator and transformer
pub struct Source {
    pub enumerator: Box<dyn Enumerator>,
    pub transformer: Box<dyn Transformer>,
    /// Expected number of items, when known up front
    pub total_hint: Option<u64>,
}

impl Importer {
    /// Stable name, used for log files and display
    pub fn name(self) -> &'static str {
        match self {
            Importer::MediaWiki => "mediawiki",
            Importer::ProgArchivesAlbums => "progarchives-albums",
            Importer::ProgArchivesArtists => "progarchives-artists",
            Importer::Movies => "movies",
            Importer::Persons => "persons",
            Importer::Names => "names",
        }
    }

    /// Shape of the `--continue` value this importer accepts
    pub fn cursor_kind(self) -> CursorKind {
        match self {
            Importer::MediaWiki => CursorKind::Title,
            Importer::ProgArchivesAlbums | Importer::ProgArchivesArtists => CursorKind::Index,
            Importer::Movies | Importer::Persons => CursorKind::Offset,
            Importer::Names => CursorKind::Page,
        }
    }

    /// Build the enumerator and transformer, resuming after `resume`
    pub async fn build(
        self,
        config: &Config,
        fetcher: HttpFetcher,
        resume: Option<&Cursor>,
        cancel: &CancellationToken,
    ) -> Result<Source, ImportError> {
        match self {
            Importer::MediaWiki => {
                let wiki = &config.mediawiki;
                let listing = MediaWikiListing::new(fetcher.clone(), &wiki.host);
                let enumerator = PaginatedListing::spawn(self.name(), Arc::new(listing), resume, cancel)?;
                let transformer = MediaWikiTransformer::new(
                    fetcher,
                    &wiki.host,
                    Arc::new(PandocConverter::new(wiki.converter.as_str())),
                    &wiki.filters_dir,
                    &wiki.target_format,
                );
                Ok(Source {
                    enumerator: Box::new(enumerator),
                    transformer: Box::new(transformer),
                    total_hint: None,
                })
            }

            Importer::ProgArchivesAlbums | Importer::ProgArchivesArtists => {
                let pa = &config.progarchives;
                let (kind, end) = match self {
                    Importer::ProgArchivesAlbums => (PageKind::Album, pa.albums_end),
                    _ => (PageKind::Artist, pa.artists_end),
                };
                let range = SequentialRange::new(self.name(), pa.start, end, resume)?;
                let total_hint = Some(range.remaining());
                Ok(Source {
                    enumerator: Box::new(range),
                    transformer: Box::new(ProgArchivesTransformer::new(fetcher, &pa.base_url, kind)),
                    total_hint,
                })
            }

            Importer::Movies | Importer::Persons => {
                let movies = &config.movies;
                let kind = if self == Importer::Movies {
                    TmdbKind::Movie
                } else {
                    TmdbKind::Person
                };

                let api_key = movies
                    .tmdb_api_key
                    .clone()
                    .ok_or_else(|| ImportError::Config("TMDB API key is not set".into()))?;

                let enumerator = match &movies.dump_path {
                    Some(path) => DumpLines::open(self.name(), path, resume, cancel)?,
                    None => {
                        let download = download_export(&fetcher, &movies.export_base_url, kind).await?;
                        DumpLines::open_download(self.name(), download, resume, cancel)?
                    }
                };

                let transformer = TmdbTransformer::new(fetcher, kind, api_key)
                    .with_omdb(movies.omdb_api_key.clone())
                    .with_max_cast(movies.max_cast);

                Ok(Source {
                    enumerator: Box::new(enumerator),
                    transformer: Box::new(transformer),
                    total_hint: None,
                })
            }

            Importer::Names => {
                let names = &config.names;
                let backoff = config.pacing.transient_backoff();
                let listing = NamesListing::new(
                    fetcher.clone(),
                    &names.base_url,
                    names.last_page,
                    backoff,
                    cancel.clone(),
                );
                let enumerator = PaginatedListing::spawn(self.name(), Arc::new(listing), resume, cancel)?;
                let transformer = NamesTransformer::new(fetcher, &names.base_url, backoff, cancel.clone());
                Ok(Source {
                    enumerator: Box::new(enumerator),
                    transformer: Box::new(transformer),
                    total_hint: None,
                })
            }
        }
    }
}

impl fmt::Display for Importer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Download today's export, falling back to yesterday's when today's has not
/// been published yet
async fn download_export(
    fetcher: &HttpFetcher,
    base_url: &str,
    kind: TmdbKind,
) -> Result<tempfile::TempPath, ImportError> {
    let today = Utc::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);

    match download_export_for(fetcher, base_url, kind, today).await {
        Err(ImportError::UpstreamStatus { status: 403 | 404, url }) => {
            warn!("Export {} is not available yet, using the previous day's", url);
            download_export_for(fetcher, base_url, kind, yesterday).await
        }
        other => other,
    }
}

async fn download_export_for(
    fetcher: &HttpFetcher,
    base_url: &str,
    kind: TmdbKind,
    date: NaiveDate,
) -> Result<tempfile::TempPath, ImportError> {
    let url = export_url(base_url, kind, date);
    let path = tempfile::Builder::new()
        .prefix("tmdb-export-")
        .suffix(".json.gz")
        .tempfile()?
        .into_temp_path();

    let bytes = fetcher.download_to(&url, &path).await?;
    info!("Downloaded {} ({} bytes)", url, bytes);
    Ok(path)
}
