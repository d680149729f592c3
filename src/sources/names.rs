//! behindthename.com name definitions
//!
//! The site is expected to be flaky for minutes at a time, and restarting a
//! run is expensive, so every fetch here retries until it succeeds or the run
//! is cancelled.

use super::html::{element_text, selector, MarkupWriter};
use crate::import::{
    Enumerated, HttpFetcher, ImportError, ListingClient, ListingPage, ResumePoint, Transformer,
};
use crate::types::{Cursor, Document, ItemRef};
use async_trait::async_trait;
use scraper::Html;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn is_name_link(href: &str) -> bool {
    href.starts_with("/name/")
}

/// Name list pages `/names/{n}` for n in `first..=last`
pub struct NamesListing {
    fetcher: HttpFetcher,
    base_url: String,
    first_page: u64,
    last_page: u64,
    backoff: Duration,
    cancel: CancellationToken,
}

impl NamesListing {
    pub fn new(
        fetcher: HttpFetcher,
        base_url: impl Into<String>,
        last_page: u64,
        backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            first_page: 1,
            last_page,
            backoff,
            cancel,
        }
    }
}

#[async_trait]
impl ListingClient for NamesListing {
    async fn fetch_page(&self, token: Option<&str>) -> Result<ListingPage, ImportError> {
        let page = match token {
            Some(token) => token
                .parse::<u64>()
                .map_err(|_| ImportError::Parse(format!("bad page token {:?}", token)))?,
            None => self.first_page,
        };
        if page > self.last_page {
            return Ok(ListingPage::default());
        }

        let url = format!("{}/names/{}", self.base_url, page);
        let html = self
            .fetcher
            .get_text_retrying(&url, self.backoff, &self.cancel)
            .await?;

        let entries: Vec<Enumerated> = parse_listing(&html)?
            .into_iter()
            .enumerate()
            .map(|(index, (name, href))| {
                Enumerated::new(ItemRef::Link { name, href }, Cursor::Page { page, index })
            })
            .collect();

        // An empty page means we ran past the last one
        let next = if entries.is_empty() || page >= self.last_page {
            None
        } else {
            Some((page + 1).to_string())
        };

        Ok(ListingPage { entries, next })
    }

    fn resume_point(&self, cursor: &Cursor) -> Result<ResumePoint, ImportError> {
        match cursor {
            // Whole page done
            Cursor::Page { page, index } if *index == usize::MAX => {
                let next = page.checked_add(1).ok_or_else(|| {
                    ImportError::Config(format!("resume page {} is out of range", page))
                })?;
                Ok(ResumePoint {
                    token: Some(next.max(self.first_page).to_string()),
                    skip_through: None,
                })
            }
            Cursor::Page { page, .. } => Ok(ResumePoint {
                token: Some(page.to_string()),
                skip_through: Some(cursor.clone()),
            }),
            other => Err(ImportError::Config(format!(
                "cursor '{}' is not a page position",
                other
            ))),
        }
    }
}

/// (name, href) pairs of a list page
pub fn parse_listing(html: &str) -> Result<Vec<(String, String)>, ImportError> {
    let document = Html::parse_document(html);
    let links = selector(r#".listname a[href^="/name/"]"#)?;

    Ok(document
        .select(&links)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim().to_string();
            let name = element_text(a).trim().to_string();
            (!name.is_empty()).then_some((name, href))
        })
        .collect())
}

/// Fetches a name page and renders its definition
pub struct NamesTransformer {
    fetcher: HttpFetcher,
    base_url: String,
    backoff: Duration,
    cancel: CancellationToken,
}

impl NamesTransformer {
    pub fn new(
        fetcher: HttpFetcher,
        base_url: impl Into<String>,
        backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            backoff,
            cancel,
        }
    }
}

#[async_trait]
impl Transformer for NamesTransformer {
    async fn transform(&self, item: &ItemRef) -> Result<Document, ImportError> {
        let ItemRef::Link { name, href } = item else {
            return Err(ImportError::Parse(format!("expected a name link, got {}", item)));
        };

        let url = format!("{}{}", self.base_url, href);
        let html = self
            .fetcher
            .get_text_retrying(&url, self.backoff, &self.cancel)
            .await?;

        parse_name(&html, name, &url)
    }
}

/// Render the definition of a name page, ending with the source URL
pub fn parse_name(html: &str, name: &str, url: &str) -> Result<Document, ImportError> {
    let document = Html::parse_document(html);
    let definition = document
        .select(&selector(".namedef")?)
        .next()
        .ok_or_else(|| ImportError::Parse(format!("no definition for {:?}", name)))?;

    let text = MarkupWriter::new(is_name_link).children(definition);
    let body = format!("{}\n\n{}", text.trim(), url);
    Document::article(name, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::FetchConfig;

    const LIST: &str = r#"<html><body>
        <div class="browsename"><span class="listname"><a href="/name/aaron">AARON</a></span></div>
        <div class="browsename"><span class="listname"><a href="/name/abigail">ABIGAIL</a></span></div>
        <div class="browsename"><span class="listname"><a href="/names/usage/english">English</a></span></div>
    </body></html>"#;

    const NAME: &str = r#"<html><body>
        <div class="namedef">From the Hebrew name <i>אַהֲרֹן</i>, related to <a href="/name/aharon">AHARON</a>.
        It is borne by <b>Aaron</b> in the <a href="https://en.wikipedia.org/wiki/Old_Testament">Old Testament</a>.</div>
    </body></html>"#;

    fn listing(last_page: u64) -> NamesListing {
        NamesListing::new(
            HttpFetcher::new(FetchConfig::default()).unwrap(),
            "https://www.behindthename.com/",
            last_page,
            Duration::from_secs(300),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_parse_listing() {
        assert_eq!(
            parse_listing(LIST).unwrap(),
            vec![
                ("AARON".to_string(), "/name/aaron".to_string()),
                ("ABIGAIL".to_string(), "/name/abigail".to_string()),
            ]
        );
        assert!(parse_listing("<html></html>").unwrap().is_empty());
    }

    #[test]
    fn test_parse_name() {
        let doc = parse_name(NAME, "AARON", "https://www.behindthename.com/name/aaron").unwrap();
        assert_eq!(doc.title, "AARON");
        assert_eq!(doc.identifier, "aaron");
        assert!(doc.body.starts_with("From the Hebrew name _אַהֲרֹן_, related to [[AHARON]]."));
        assert!(doc.body.contains("borne by **Aaron**"));
        assert!(doc.body.ends_with("\n\nhttps://www.behindthename.com/name/aaron"));
    }

    #[test]
    fn test_missing_definition_is_parse_error() {
        let result = parse_name("<html></html>", "AARON", "https://x/name/aaron");
        assert!(matches!(result, Err(ImportError::Parse(_))));
    }

    #[test]
    fn test_resume_points() {
        let listing = listing(100);

        // Bare page number: start of that page
        let cursor = crate::types::CursorKind::Page.parse("5").unwrap();
        assert_eq!(
            listing.resume_point(&cursor).unwrap(),
            ResumePoint {
                token: Some("5".into()),
                skip_through: None
            }
        );

        let cursor = Cursor::Page { page: 5, index: 12 };
        assert_eq!(
            listing.resume_point(&cursor).unwrap(),
            ResumePoint {
                token: Some("5".into()),
                skip_through: Some(cursor.clone())
            }
        );

        assert!(listing.resume_point(&Cursor::Index(5)).is_err());

        let past_end = Cursor::Page { page: u64::MAX, index: usize::MAX };
        assert!(matches!(listing.resume_point(&past_end), Err(ImportError::Config(_))));
    }

    #[tokio::test]
    async fn test_past_last_page_ends_listing() {
        let listing = listing(100);
        let page = listing.fetch_page(Some("101")).await.unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next.is_none());
    }
}
