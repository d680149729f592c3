//! ProgArchives album and artist pages

use super::html::{element_text, selector, MarkupWriter};
use crate::import::{HttpFetcher, ImportError, Transformer};
use crate::types::{Document, ItemRef};
use async_trait::async_trait;
use scraper::{ElementRef, Html};
use tracing::debug;

/// Which ProgArchives page type to import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Album,
    Artist,
}

impl PageKind {
    fn page(self) -> &'static str {
        match self {
            PageKind::Album => "album.asp",
            PageKind::Artist => "artist.asp",
        }
    }
}

/// Links to other ProgArchives pages become wikilinks
fn is_internal(href: &str) -> bool {
    !href.starts_with("http") && href.contains(".asp")
}

/// Fetches and renders one album or artist page by id
pub struct ProgArchivesTransformer {
    fetcher: HttpFetcher,
    base_url: String,
    kind: PageKind,
}

impl ProgArchivesTransformer {
    pub fn new(fetcher: HttpFetcher, base_url: impl Into<String>, kind: PageKind) -> Self {
        Self {
            fetcher,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            kind,
        }
    }
}

#[async_trait]
impl Transformer for ProgArchivesTransformer {
    async fn transform(&self, item: &ItemRef) -> Result<Document, ImportError> {
        let ItemRef::Id(id) = item else {
            return Err(ImportError::Parse(format!("expected a numeric id, got {}", item)));
        };

        let url = format!("{}/{}?id={}", self.base_url, self.kind.page(), id);
        let html = self.fetcher.get_text(&url).await?;
        debug!("Fetched {} ({} bytes)", url, html.len());

        match self.kind {
            PageKind::Album => parse_album(&html),
            PageKind::Artist => parse_artist(&html, *id, &self.base_url),
        }
    }
}

fn page_title(document: &Html) -> Result<String, ImportError> {
    let title = document
        .select(&selector("h1")?)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let title = title.trim();
    if title.is_empty() {
        return Err(ImportError::Parse("page has no title".into()));
    }
    Ok(title.to_string())
}

/// Render an album page
pub fn parse_album(html: &str) -> Result<Document, ImportError> {
    let document = Html::parse_document(html);
    let writer = MarkupWriter::new(is_internal);

    let title = page_title(&document)?;
    let artist = document
        .select(&selector("h2")?)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let cover = document
        .select(&selector("#imgCover")?)
        .next()
        .and_then(|img| img.value().attr("src"))
        .unwrap_or_default();
    let text = document
        .select(&selector("td")?)
        .nth(1)
        .map(|td| writer.children(td))
        .unwrap_or_default();

    let body = format!(
        "# {}\n\nalbum from [[{}]]\n\n![]({})\n\n{}",
        title,
        artist.trim(),
        cover,
        text.trim()
    );
    Document::article(title, body)
}

/// Render an artist page; `id` locates the band picture
pub fn parse_artist(html: &str, id: u64, base_url: &str) -> Result<Document, ImportError> {
    let document = Html::parse_document(html);
    let writer = MarkupWriter::new(is_internal);

    let title = page_title(&document)?;

    let heading = document
        .select(&selector("h2")?)
        .next()
        .map(element_text)
        .unwrap_or_default();
    let Some((category, country)) = heading.split_once('•') else {
        return Err(ImportError::Parse(format!("no category in {:?}", heading.trim())));
    };

    let image = format!("{}/progressive_rock_discography_band/{}.png", base_url, id);
    let bio = biography(&document, &writer)?;
    let discography = discography(&document)?;

    let body = format!(
        "# {}\n\n[[{}]], [[{}]]\n\n![]({})\n\n{}\n\n## Discography\n{}",
        title,
        category.trim(),
        country.trim(),
        image,
        bio.trim(),
        discography
    );
    Document::article(title, body)
}

/// The biography sits next to the second `strong` of the page, with the
/// full text in `#moreBio` when the page collapses it
fn biography(document: &Html, writer: &MarkupWriter) -> Result<String, ImportError> {
    let more_bio = selector("#moreBio")?;

    let Some(start) = document.select(&selector("strong")?).nth(1) else {
        return Ok(document
            .select(&more_bio)
            .next()
            .map(|e| writer.children(e))
            .unwrap_or_default());
    };
    let Some(container) = start.parent().and_then(ElementRef::wrap) else {
        return Ok(String::new());
    };

    Ok(match container.select(&more_bio).next() {
        Some(full) => writer.children(full),
        None => writer.children_except(container, start.id()),
    })
}

/// Albums listed in the first table after `#discography`
fn discography(document: &Html) -> Result<String, ImportError> {
    let title_sel = selector("a > strong")?;
    let year_sel = selector("a + br + span")?;
    let td_sel = selector("td")?;

    let Some(anchor) = document.select(&selector("#discography")?).next() else {
        return Ok(String::new());
    };
    let Some(table) = anchor
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
    else {
        return Ok(String::new());
    };

    let mut out = String::new();
    for td in table.select(&td_sel) {
        let title = td.select(&title_sel).next().map(element_text).unwrap_or_default();
        if title.trim().is_empty() {
            continue;
        }
        let year = td.select(&year_sel).next().map(element_text).unwrap_or_default();
        out.push_str(&format!("\n  - [[{}]] ([[{}]])", title.trim(), year.trim()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALBUM: &str = r#"<html><body>
        <h1>Close to the Edge</h1>
        <h2>Yes</h2>
        <img id="imgCover" src="https://www.progarchives.com/progressive_rock_discography_covers/9/cover_1.jpg">
        <table><tr>
          <td>sidebar</td>
          <td><span>A <b>landmark</b> album by <a href="artist.asp?id=105">Yes</a>.</span><br>See <a href="https://en.wikipedia.org/wiki/Close_to_the_Edge">Wikipedia</a></td>
        </tr></table>
    </body></html>"#;

    const ARTIST: &str = r#"<html><body>
        <h1>Yes</h1>
        <h2>Symphonic Prog • United Kingdom</h2>
        <div><strong>Biography</strong></div>
        <div id="bio"><strong>Yes biography</strong> Founded in <i>1968</i>, London.</div>
        <h3 id="discography">Discography</h3>
        <p>Studio albums</p>
        <table><tr>
          <td><a href="album.asp?id=1"><strong>Fragile</strong></a><br><span>1971</span></td>
          <td><a href="album.asp?id=2"><strong>Close to the Edge</strong></a><br><span>1972</span></td>
          <td>empty cell</td>
        </tr></table>
    </body></html>"#;

    #[test]
    fn test_parse_album() {
        let doc = parse_album(ALBUM).unwrap();
        assert_eq!(doc.title, "Close to the Edge");
        assert_eq!(doc.identifier, "close-to-the-edge");
        assert!(doc.body.starts_with("# Close to the Edge\n\nalbum from [[Yes]]\n\n![](https://www.progarchives.com/"));
        assert!(doc.body.contains("A **landmark** album by [[Yes]].\nSee [Wikipedia](https://en.wikipedia.org/wiki/Close_to_the_Edge)"));
    }

    #[test]
    fn test_album_without_title_fails() {
        let result = parse_album("<html><body><h1>  </h1></body></html>");
        assert!(matches!(result, Err(ImportError::Parse(_))));
    }

    #[test]
    fn test_parse_artist() {
        let doc = parse_artist(ARTIST, 105, "https://www.progarchives.com").unwrap();
        assert_eq!(doc.title, "Yes");
        assert!(doc.body.starts_with(
            "# Yes\n\n[[Symphonic Prog]], [[United Kingdom]]\n\n![](https://www.progarchives.com/progressive_rock_discography_band/105.png)\n\n"
        ));
        assert!(doc.body.contains("Founded in _1968_, London."));
        assert!(!doc.body.contains("Yes biography"));
        assert!(doc.body.ends_with(
            "## Discography\n\n  - [[Fragile]] ([[1971]])\n  - [[Close to the Edge]] ([[1972]])"
        ));
    }

    #[test]
    fn test_artist_prefers_full_biography() {
        let html = r#"<h1>Camel</h1><h2>Symphonic Prog • UK</h2><strong>a</strong>
            <div><strong>b</strong> short <span id="moreBio">The <b>full</b> story</span></div>"#;
        let doc = parse_artist(html, 7, "https://www.progarchives.com").unwrap();
        assert!(doc.body.contains("The **full** story"));
        assert!(!doc.body.contains("short"));
    }

    #[test]
    fn test_artist_without_category_fails() {
        let html = "<h1>Yes</h1><h2>Symphonic Prog</h2>";
        assert!(matches!(
            parse_artist(html, 1, "https://www.progarchives.com"),
            Err(ImportError::Parse(_))
        ));
    }
}
