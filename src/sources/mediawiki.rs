//! MediaWiki sites through the action API
//!
//! Pages are listed with `list=allpages` and fetched as raw wikitext with
//! `action=parse`, then pre-cleaned and converted by pandoc with the Lua
//! filters shipped in `filters/`.

use crate::import::{
    ConversionRequest, Enumerated, HttpFetcher, ImportError, ListingClient, ListingPage,
    ResumePoint, TextConverter, Transformer, WikiTextCleaner,
};
use crate::publish::{query_latest, SignedEvent, KIND_METADATA};
use crate::types::{Cursor, Document, ItemRef};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Lua filters, applied in this order
pub const FILTERS: [&str; 3] = ["remove-header-ids.lua", "description-list.lua", "wikilink.lua"];

/// Action API endpoint of a wiki host
pub fn api_base(host: &str) -> String {
    if host.ends_with(".fandom.com") || host == "orthodoxwiki.org" {
        format!("https://{}/api.php", host)
    } else {
        format!("https://{}/w/api.php", host)
    }
}

fn api_url(api: &str, params: &[(&str, &str)]) -> Result<String, ImportError> {
    Url::parse_with_params(api, params)
        .map(String::from)
        .map_err(|e| ImportError::Config(format!("invalid API URL {}: {}", api, e)))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListResult {
    #[serde(rename = "continue")]
    pub continuation: Option<Continuation>,
    pub query: ListQuery,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Continuation {
    pub apcontinue: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub allpages: Vec<ListedPage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListedPage {
    pub title: String,
}

impl From<ListResult> for ListingPage {
    fn from(result: ListResult) -> Self {
        let entries = result
            .query
            .allpages
            .into_iter()
            .map(|p| p.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| Enumerated::new(ItemRef::Title(t.clone()), Cursor::Title(t)))
            .collect();
        let next = result
            .continuation
            .map(|c| c.apcontinue)
            .filter(|t| !t.is_empty());

        ListingPage { entries, next }
    }
}

/// `list=allpages`, continued by `apcontinue`
pub struct MediaWikiListing {
    fetcher: HttpFetcher,
    api: String,
}

impl MediaWikiListing {
    pub fn new(fetcher: HttpFetcher, host: &str) -> Self {
        Self {
            fetcher,
            api: api_base(host),
        }
    }
}

#[async_trait]
impl ListingClient for MediaWikiListing {
    async fn fetch_page(&self, token: Option<&str>) -> Result<ListingPage, ImportError> {
        let mut params = vec![("action", "query"), ("format", "json"), ("list", "allpages")];
        if let Some(token) = token {
            params.push(("apcontinue", token));
        }

        let result: ListResult = self.fetcher.get_json(&api_url(&self.api, &params)?).await?;
        Ok(result.into())
    }

    /// `apcontinue` starts at the given title, so that entry is skipped
    fn resume_point(&self, cursor: &Cursor) -> Result<ResumePoint, ImportError> {
        match cursor {
            Cursor::Title(title) => Ok(ResumePoint {
                token: Some(title.clone()),
                skip_through: Some(cursor.clone()),
            }),
            other => Err(ImportError::Config(format!("cursor '{}' is not a page title", other))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PageResult {
    pub parse: Option<ParsedPage>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ParsedPage {
    pub title: String,
    pub wikitext: Wikitext,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Wikitext {
    #[serde(rename = "*")]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiError {
    pub code: String,
    pub info: String,
}

/// Fetches wikitext and converts it to the target markup
pub struct MediaWikiTransformer {
    fetcher: HttpFetcher,
    api: String,
    cleaner: WikiTextCleaner,
    converter: Arc<dyn TextConverter>,
    request: ConversionRequest,
}

impl MediaWikiTransformer {
    pub fn new(
        fetcher: HttpFetcher,
        host: &str,
        converter: Arc<dyn TextConverter>,
        filters_dir: &Path,
        target_format: &str,
    ) -> Self {
        let request = FILTERS
            .iter()
            .fold(ConversionRequest::new("mediawiki", target_format), |req, f| {
                req.with_filter(filters_dir.join(f))
            })
            .with_arg("--wrap=none");

        Self {
            fetcher,
            api: api_base(host),
            cleaner: WikiTextCleaner::new(),
            converter,
            request,
        }
    }

    /// Clean and convert one parse API response
    pub async fn render(&self, result: PageResult, requested: &str) -> Result<Document, ImportError> {
        let Some(page) = result.parse else {
            let reason = result
                .error
                .map(|e| format!("{}: {}", e.code, e.info))
                .unwrap_or_else(|| "no parse result".to_string());
            return Err(ImportError::Parse(format!("{}: {}", requested, reason)));
        };

        let title = if page.title.trim().is_empty() {
            requested
        } else {
            page.title.as_str()
        };

        let cleaned = self.cleaner.clean(&page.wikitext.text);
        let body = self.converter.convert(&cleaned, &self.request).await?;
        debug!("Converted {} ({} -> {} bytes)", title, cleaned.len(), body.len());

        Document::article(title, body)
    }
}

#[async_trait]
impl Transformer for MediaWikiTransformer {
    async fn transform(&self, item: &ItemRef) -> Result<Document, ImportError> {
        let ItemRef::Title(title) = item else {
            return Err(ImportError::Parse(format!("expected a page title, got {}", item)));
        };

        let url = api_url(
            &self.api,
            &[("action", "parse"), ("format", "json"), ("prop", "wikitext"), ("page", title.as_str())],
        )?;
        let result: PageResult = self.fetcher.get_json(&url).await?;
        self.render(result, title).await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Metadata {
    name: String,
    website: String,
}

/// Check that a kind-0 profile points its website at `https://<host>/`
pub fn verify_profile_website(profile: &SignedEvent, host: &str) -> Result<(), ImportError> {
    let metadata: Metadata = serde_json::from_str(&profile.content)
        .map_err(|e| ImportError::Config(format!("[{}] unreadable profile metadata: {}", host, e)))?;

    let expected = format!("https://{}/", host);
    if metadata.website != expected {
        return Err(ImportError::Config(format!(
            "[{}] wrong key: name={} website={}, expected website to be {}",
            host, metadata.name, metadata.website, expected
        )));
    }
    Ok(())
}

/// Look up the signing key's profile on `relays` and verify its website.
///
/// Keeps a wiki's pages from being published under a key meant for another
/// wiki.
pub async fn check_profile(
    pubkey: &str,
    host: &str,
    relays: &[String],
    timeout: Duration,
) -> Result<(), ImportError> {
    let filter = json!({ "authors": [pubkey], "kinds": [KIND_METADATA], "limit": 1 });

    let profile = query_latest(relays, filter, timeout)
        .await
        .ok_or_else(|| ImportError::Config(format!("[{}] no metadata event found for given key", host)))?;

    verify_profile_website(&profile, host)?;
    info!("[{}] profile of {} matches", host, pubkey);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::FetchConfig;
    use crate::publish::{EventTemplate, Keys};
    use std::sync::Mutex;

    const KEY: &str = "0000000000000000000000000000000000000000000000000000000000000003";

    /// Records what it was asked to convert and echoes it back
    #[derive(Default)]
    struct EchoConverter {
        seen: Mutex<Vec<(String, Vec<String>)>>,
    }

    #[async_trait]
    impl TextConverter for EchoConverter {
        async fn convert(&self, raw: &str, request: &ConversionRequest) -> Result<String, ImportError> {
            self.seen.lock().unwrap().push((raw.to_string(), request.args()));
            Ok(raw.to_string())
        }
    }

    fn transformer(converter: Arc<EchoConverter>) -> MediaWikiTransformer {
        MediaWikiTransformer::new(
            HttpFetcher::new(FetchConfig::default()).unwrap(),
            "en.wikipedia.org",
            converter,
            Path::new("filters"),
            "asciidoc",
        )
    }

    #[test]
    fn test_api_base() {
        assert_eq!(api_base("en.wikipedia.org"), "https://en.wikipedia.org/w/api.php");
        assert_eq!(api_base("starwars.fandom.com"), "https://starwars.fandom.com/api.php");
        assert_eq!(api_base("orthodoxwiki.org"), "https://orthodoxwiki.org/api.php");
    }

    #[test]
    fn test_api_url_encodes_titles() {
        let url = api_url(
            "https://en.wikipedia.org/w/api.php",
            &[("action", "parse"), ("page", "AC/DC & Friends")],
        )
        .unwrap();
        assert_eq!(url, "https://en.wikipedia.org/w/api.php?action=parse&page=AC%2FDC+%26+Friends");
    }

    #[test]
    fn test_list_result_into_page() {
        let result: ListResult = serde_json::from_str(
            r#"{"batchcomplete":"","continue":{"apcontinue":"Abba","continue":"-||"},
                "query":{"allpages":[{"pageid":1,"ns":0,"title":"!!!"},{"pageid":2,"ns":0,"title":"ABBA "}]}}"#,
        )
        .unwrap();
        let page = ListingPage::from(result);
        let titles: Vec<_> = page.entries.iter().map(|e| e.cursor.to_string()).collect();
        assert_eq!(titles, vec!["!!!", "ABBA"]);
        assert_eq!(page.next.as_deref(), Some("Abba"));

        let last: ListResult = serde_json::from_str(r#"{"query":{"allpages":[]}}"#).unwrap();
        assert!(ListingPage::from(last).next.is_none());
    }

    #[test]
    fn test_resume_after_title() {
        let listing = MediaWikiListing::new(HttpFetcher::new(FetchConfig::default()).unwrap(), "en.wikipedia.org");
        let cursor = Cursor::Title("Abba".into());
        assert_eq!(
            listing.resume_point(&cursor).unwrap(),
            ResumePoint {
                token: Some("Abba".into()),
                skip_through: Some(cursor.clone()),
            }
        );
        assert!(listing.resume_point(&Cursor::Index(3)).is_err());
    }

    #[tokio::test]
    async fn test_render_cleans_and_converts() {
        let converter = Arc::new(EchoConverter::default());
        let transformer = transformer(converter.clone());
        let result: PageResult = serde_json::from_str(
            r#"{"parse":{"title":"Blavatsky","pageid":7,"wikitext":{"*":"Intro\n{| class=\"wikitable\"\n| cell\n|}\n[[Adyar (campus)|Adyar]]"}}}"#,
        )
        .unwrap();

        let doc = transformer.render(result, "blavatsky").await.unwrap();
        assert_eq!(doc.title, "Blavatsky");
        assert_eq!(doc.identifier, "blavatsky");
        assert!(doc.body.contains("Intro"));
        assert!(doc.body.contains("[[Adyar (campus)|Adyar]]"));
        assert!(!doc.body.contains("cell"));

        let seen = converter.seen.lock().unwrap();
        let args = &seen[0].1;
        assert_eq!(
            args.as_slice(),
            [
                "--lua-filter",
                "filters/remove-header-ids.lua",
                "--lua-filter",
                "filters/description-list.lua",
                "--lua-filter",
                "filters/wikilink.lua",
                "-f",
                "mediawiki",
                "-t",
                "asciidoc",
                "--wrap=none",
                "-",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_parse_is_parse_error() {
        let transformer = transformer(Arc::new(EchoConverter::default()));
        let result: PageResult = serde_json::from_str(
            r#"{"error":{"code":"missingtitle","info":"The page you specified doesn't exist."}}"#,
        )
        .unwrap();

        match transformer.render(result, "Nope").await {
            Err(ImportError::Parse(msg)) => assert!(msg.contains("missingtitle")),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    fn profile(content: &str) -> SignedEvent {
        let keys = Keys::from_hex(KEY).unwrap();
        EventTemplate {
            created_at: 1_700_000_000,
            kind: KIND_METADATA,
            tags: vec![],
            content: content.to_string(),
        }
        .sign(&keys)
        .unwrap()
    }

    #[test]
    fn test_verify_profile_website() {
        let good = profile(r#"{"name":"Wikipedia","website":"https://en.wikipedia.org/"}"#);
        assert!(verify_profile_website(&good, "en.wikipedia.org").is_ok());

        let other = profile(r#"{"name":"Fandom","website":"https://starwars.fandom.com/"}"#);
        match verify_profile_website(&other, "en.wikipedia.org") {
            Err(ImportError::Config(msg)) => assert!(msg.contains("expected website to be https://en.wikipedia.org/")),
            other => panic!("expected config error, got {:?}", other),
        }

        let missing = profile(r#"{"name":"Wikipedia"}"#);
        assert!(verify_profile_website(&missing, "en.wikipedia.org").is_err());
        assert!(verify_profile_website(&profile("not json"), "en.wikipedia.org").is_err());
    }

    #[tokio::test]
    async fn test_profile_check_fails_without_relays() {
        let result = check_profile("ab", "en.wikipedia.org", &[], Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ImportError::Config(_))));
    }
}
