//! TMDB movies and persons, optionally enriched with OMDB data
//!
//! Items come from TMDB's daily id exports, one JSON object per line. Each
//! line's id is looked up through the TMDB API and rendered from a fixed
//! template.

use crate::import::{HttpFetcher, ImportError, Transformer};
use crate::types::{Document, ItemRef};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

pub const TMDB_API_BASE: &str = "https://api.themoviedb.org";
pub const OMDB_API_BASE: &str = "https://www.omdbapi.com";

/// Which TMDB export and endpoint to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmdbKind {
    Movie,
    Person,
}

impl TmdbKind {
    fn export_prefix(self) -> &'static str {
        match self {
            TmdbKind::Movie => "movie_ids",
            TmdbKind::Person => "person_ids",
        }
    }
}

/// URL of the daily id export published for `date`
pub fn export_url(base_url: &str, kind: TmdbKind, date: NaiveDate) -> String {
    format!(
        "{}/{}_{}.json.gz",
        base_url.trim_end_matches('/'),
        kind.export_prefix(),
        date.format("%m_%d_%Y")
    )
}

#[derive(Debug, Deserialize)]
struct ExportLine {
    id: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TmdbMovie {
    pub title: String,
    pub tagline: Option<String>,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub runtime: Option<u32>,
    pub genres: Vec<Named>,
    pub imdb_id: Option<String>,
    pub homepage: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TmdbCredits {
    pub cast: Vec<CastMember>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CastMember {
    pub name: String,
    pub character: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TmdbPerson {
    pub name: String,
    pub biography: Option<String>,
    pub birthday: Option<String>,
    pub deathday: Option<String>,
    pub place_of_birth: Option<String>,
    pub known_for_department: Option<String>,
    pub imdb_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct OmdbMovie {
    pub director: String,
    pub writer: String,
    pub actors: String,
    pub genre: String,
    pub plot: String,
    pub response: String,
    pub error: Option<String>,
}

/// Turn `"A, B"` into `"[[A]], [[B]]"`; OMDB's `N/A` means absent
pub fn split_and_wikilink(list: &str) -> String {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "N/A")
        .map(|s| format!("[[{}]]", s))
        .collect::<Vec<_>>()
        .join(", ")
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Year part of a `YYYY-MM-DD` date
fn year(date: &Option<String>) -> Option<&str> {
    present(date).and_then(|d| d.split('-').next())
}

/// Render a movie page
pub fn render_movie(
    movie: &TmdbMovie,
    credits: &TmdbCredits,
    omdb: Option<&OmdbMovie>,
    max_cast: usize,
) -> String {
    let year = year(&movie.release_date);

    let mut out = match year {
        Some(year) => format!("# {} ({})\n", movie.title.trim(), year),
        None => format!("# {}\n", movie.title.trim()),
    };
    if let Some(tagline) = present(&movie.tagline) {
        out.push_str(&format!("\n_{}_\n", tagline));
    }
    if let Some(overview) = present(&movie.overview) {
        out.push_str(&format!("\n{}\n", overview));
    }

    out.push('\n');
    if let Some(year) = year {
        out.push_str(&format!("- Released: [[{}]]\n", year));
    }
    if let Some(runtime) = movie.runtime.filter(|r| *r > 0) {
        out.push_str(&format!("- Runtime: {} minutes\n", runtime));
    }
    let genres = movie
        .genres
        .iter()
        .map(|g| format!("[[{}]]", g.name))
        .collect::<Vec<_>>()
        .join(", ");
    if !genres.is_empty() {
        out.push_str(&format!("- Genres: {}\n", genres));
    }
    if let Some(imdb) = present(&movie.imdb_id) {
        out.push_str(&format!("- IMDB: https://www.imdb.com/title/{}/\n", imdb));
    }
    if let Some(homepage) = present(&movie.homepage) {
        out.push_str(&format!("- Website: {}\n", homepage));
    }

    let cast: Vec<&CastMember> = credits
        .cast
        .iter()
        .filter(|c| !c.name.trim().is_empty())
        .take(max_cast)
        .collect();
    if !cast.is_empty() {
        out.push_str("\n## Cast\n\n");
        for member in cast {
            let line = match present(&member.character) {
                Some(character) => format!("- [[{}]] as {}\n", member.name.trim(), character),
                None => format!("- [[{}]]\n", member.name.trim()),
            };
            out.push_str(&line);
        }
    }

    if let Some(omdb) = omdb {
        let credits = [
            ("Director", split_and_wikilink(&omdb.director)),
            ("Writer", split_and_wikilink(&omdb.writer)),
            ("Actors", split_and_wikilink(&omdb.actors)),
            ("Genre", split_and_wikilink(&omdb.genre)),
        ];
        if credits.iter().any(|(_, v)| !v.is_empty()) {
            out.push_str("\n## Credits\n\n");
            for (label, value) in credits.iter().filter(|(_, v)| !v.is_empty()) {
                out.push_str(&format!("- {}: {}\n", label, value));
            }
        }
        let plot = omdb.plot.trim();
        if !plot.is_empty() && plot != "N/A" {
            out.push_str(&format!("\n## Plot\n\n{}\n", plot));
        }
    }

    out
}

/// Render a person page
pub fn render_person(person: &TmdbPerson) -> String {
    let mut out = format!("# {}\n", person.name.trim());

    if let Some(biography) = present(&person.biography) {
        out.push_str(&format!("\n{}\n", biography));
    }

    out.push('\n');
    match (present(&person.birthday), present(&person.place_of_birth)) {
        (Some(date), Some(place)) => {
            out.push_str(&format!("- Born: {} in {}\n", date, place));
        }
        (Some(date), None) => {
            out.push_str(&format!("- Born: {}\n", date));
        }
        (None, Some(place)) => {
            out.push_str(&format!("- Born in {}\n", place));
        }
        (None, None) => {}
    }
    if let Some(date) = present(&person.deathday) {
        out.push_str(&format!("- Died: {}\n", date));
    }
    if let Some(department) = present(&person.known_for_department) {
        out.push_str(&format!("- Known for: [[{}]]\n", department));
    }
    if let Some(imdb) = present(&person.imdb_id) {
        out.push_str(&format!("- IMDB: https://www.imdb.com/name/{}/\n", imdb));
    }

    out
}

/// Looks up export lines through the TMDB (and OMDB) APIs
pub struct TmdbTransformer {
    fetcher: HttpFetcher,
    kind: TmdbKind,
    api_base: String,
    api_key: String,
    omdb_base: String,
    omdb_key: Option<String>,
    max_cast: usize,
}

impl TmdbTransformer {
    pub fn new(fetcher: HttpFetcher, kind: TmdbKind, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            kind,
            api_base: TMDB_API_BASE.to_string(),
            api_key: api_key.into(),
            omdb_base: OMDB_API_BASE.to_string(),
            omdb_key: None,
            max_cast: 4,
        }
    }

    /// Enrich movies with OMDB credits and plot
    pub fn with_omdb(mut self, api_key: Option<String>) -> Self {
        self.omdb_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_max_cast(mut self, max_cast: usize) -> Self {
        self.max_cast = max_cast;
        self
    }

    pub fn with_api_bases(mut self, tmdb: impl Into<String>, omdb: impl Into<String>) -> Self {
        self.api_base = tmdb.into().trim_end_matches('/').to_string();
        self.omdb_base = omdb.into().trim_end_matches('/').to_string();
        self
    }

    fn tmdb_url(&self, path: &str) -> String {
        format!("{}/3/{}?api_key={}", self.api_base, path, self.api_key)
    }

    async fn omdb(&self, imdb_id: &str, key: &str) -> Result<OmdbMovie, ImportError> {
        let url = format!("{}/?i={}&plot=full&apikey={}", self.omdb_base, imdb_id, key);
        let movie: OmdbMovie = self.fetcher.get_json(&url).await?;
        if movie.response.eq_ignore_ascii_case("false") {
            return Err(ImportError::Parse(
                movie.error.unwrap_or_else(|| "OMDB lookup failed".to_string()),
            ));
        }
        Ok(movie)
    }

    async fn movie(&self, id: u64) -> Result<Document, ImportError> {
        let movie: TmdbMovie = self.fetcher.get_json(&self.tmdb_url(&format!("movie/{}", id))).await?;
        let credits: TmdbCredits = self
            .fetcher
            .get_json(&self.tmdb_url(&format!("movie/{}/credits", id)))
            .await?;

        let omdb = match (&self.omdb_key, present(&movie.imdb_id)) {
            (Some(key), Some(imdb_id)) => match self.omdb(imdb_id, key).await {
                Ok(omdb) => Some(omdb),
                Err(e) => {
                    warn!("OMDB enrichment for {} failed: {}", imdb_id, e);
                    None
                }
            },
            _ => None,
        };

        let body = render_movie(&movie, &credits, omdb.as_ref(), self.max_cast);
        Document::article(&movie.title, body)
    }

    async fn person(&self, id: u64) -> Result<Document, ImportError> {
        let person: TmdbPerson = self.fetcher.get_json(&self.tmdb_url(&format!("person/{}", id))).await?;
        let body = render_person(&person);
        Document::article(&person.name, body)
    }
}

#[async_trait]
impl Transformer for TmdbTransformer {
    async fn transform(&self, item: &ItemRef) -> Result<Document, ImportError> {
        let ItemRef::Line { line, .. } = item else {
            return Err(ImportError::Parse(format!("expected an export line, got {}", item)));
        };
        let entry: ExportLine = serde_json::from_str(line)
            .map_err(|e| ImportError::Parse(format!("bad export line {:?}: {}", line, e)))?;

        match self.kind {
            TmdbKind::Movie => self.movie(entry.id).await,
            TmdbKind::Person => self.person(entry.id).await,
        }
    }
}
