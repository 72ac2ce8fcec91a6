//! Page fetching and HTML-to-text reduction.
//!
//! Each URL is fetched once (no link following) with bounded concurrency.
//! Results stream back to a single collector that owns the output map, so
//! no lock guards it. A URL that fails for any reason is logged and left out.
use crate::readability::{self, collect_text};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use heft_common::ExtractedText;
use heft_http::{HttpClient, HttpError, RequestOpts};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use thiserror::Error;

static TAG_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Stripped from `<body>` when the page is not article-like.
const FALLBACK_STRIP: &[&str] = &["style", "script", "meta", "link", "img"];

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("page client: {0}")]
    Client(#[from] HttpError),
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Fetch every URL and return cleaned text keyed by URL. Per-URL
    /// failures only shrink the map.
    async fn extract(&self, urls: &[String]) -> Result<ExtractedText, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct PageExtractorConfig {
    pub concurrency: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

/// [`ContentExtractor`] over plain HTTP.
pub struct PageExtractor {
    http: HttpClient,
    headers: HeaderMap,
    concurrency: usize,
}

/// Why one URL produced no text.
#[derive(Debug, Error)]
enum PageSkip {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("not an HTML document ({0})")]
    NotHtml(String),
    #[error("no usable content")]
    Empty,
}

impl PageExtractor {
    pub fn new(config: PageExtractorConfig) -> Result<Self, ExtractError> {
        let http = HttpClient::detached()?.with_timeout(config.timeout);
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| HttpError::Build(format!("user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);
        Ok(Self {
            http,
            headers,
            concurrency: config.concurrency.max(1),
        })
    }

    async fn fetch_page(&self, url: &str) -> Result<String, PageSkip> {
        let parsed = url::Url::parse(url).map_err(|e| PageSkip::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PageSkip::InvalidUrl(format!("scheme {}", parsed.scheme())));
        }

        let opts = RequestOpts {
            headers: Some(self.headers.clone()),
            ..Default::default()
        };
        let page = self.http.get_text(parsed.as_str(), opts).await?;

        if let Some(ct) = page.content_type.as_deref() {
            let ct = ct.to_ascii_lowercase();
            if !ct.contains("html") && !ct.contains("xml") {
                return Err(PageSkip::NotHtml(ct));
            }
        }

        let text = html_to_text(&page.body);
        if text.is_empty() {
            return Err(PageSkip::Empty);
        }
        Ok(text)
    }
}

#[async_trait]
impl ContentExtractor for PageExtractor {
    async fn extract(&self, urls: &[String]) -> Result<ExtractedText, ExtractError> {
        let mut seen = HashSet::new();
        let unique: Vec<String> = urls
            .iter()
            .filter(|u| seen.insert(u.as_str()))
            .cloned()
            .collect();
        let started = Instant::now();
        tracing::info!(urls = unique.len(), concurrency = self.concurrency, "extract.start");

        let mut pages = stream::iter(unique)
            .map(|url| async move {
                let result = self.fetch_page(&url).await;
                (url, result)
            })
            .buffer_unordered(self.concurrency);

        let mut out = ExtractedText::with_capacity(urls.len());
        while let Some((url, result)) = pages.next().await {
            match result {
                Ok(text) => {
                    tracing::debug!(url = %url, chars = text.len(), "extract.page.ok");
                    out.insert(url, text);
                }
                Err(e) => tracing::warn!(url = %url, error = %e, "extract.page.failed"),
            }
        }

        tracing::info!(
            pages = out.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extract.done"
        );
        Ok(out)
    }
}

/// Reduce an HTML document to one line of readable text.
///
/// Article-like pages go through reader mode; anything else falls back to
/// the body minus styles, scripts, metadata and images.
///
/// ```
/// let text = heft_web::extract::html_to_text(
///     "<html><body><style>p{}</style><h1>Air\tForce</h1>\n<p>Weight:  400 g</p></body></html>",
/// );
/// assert_eq!(text, "AirForce Weight: 400 g");
/// ```
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);

    let content = if readability::is_probably_readerable(&doc) {
        readability::grab_article(&doc)
    } else {
        None
    };
    let content = content.unwrap_or_else(|| fallback_text(&doc));
    clean_text(&content)
}

fn fallback_text(doc: &Html) -> String {
    let root = doc.root_element();
    let body = root
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
        .unwrap_or(root);
    let mut out = String::new();
    collect_text(body, FALLBACK_STRIP, &mut out);
    out
}

/// Tabs are dropped, leftover tag fragments removed, and every whitespace
/// run (newlines included) collapsed to a single space.
pub fn clean_text(content: &str) -> String {
    let without_tabs = content.replace('\t', "");
    let without_tags = TAG_FRAGMENT.replace_all(&without_tabs, "");
    without_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_and_strips() {
        assert_eq!(
            clean_text("  Weight:\t 1.5\r\n kg <b>bold</b>  \n\n end "),
            "Weight: 1.5 kg bold end"
        );
    }

    #[test]
    fn clean_text_is_idempotent() {
        let once = clean_text("a <i> b\t\tc\n\n<br/>d");
        assert_eq!(clean_text(&once), once);
    }

    #[test]
    fn fallback_drops_non_content_elements() {
        let html = r#"<html><head><title>Title</title></head><body>
            <script>var w = 1;</script><style>.x{}</style>
            <link rel="stylesheet" href="a.css"><meta name="x" content="y">
            <img src="a.png" alt="picture">
            <div>Weight</div><div>320 g</div>
        </body></html>"#;
        assert_eq!(html_to_text(html), "Weight 320 g");
    }

    #[test]
    fn escaped_markup_in_text_is_stripped() {
        let html = "<html><body><p>&lt;span&gt;Weight&lt;/span&gt; 12 kg</p></body></html>";
        assert_eq!(html_to_text(html), "Weight 12 kg");
    }

    #[test]
    fn equally_scored_articles_always_pick_the_same_one() {
        let alpha = "alpha ".repeat(66);
        let bravo = "bravo ".repeat(66);
        let html = format!(
            r#"<html><body><div id="x1"><p>{alpha}</p></div>
               <section><div id="x2"><p>{bravo}</p></div></section></body></html>"#
        );
        let outputs: HashSet<String> = (0..64).map(|_| html_to_text(&html)).collect();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.into_iter().next().as_deref(), Some(alpha.trim()));
    }

    #[test]
    fn same_page_twice_yields_identical_text() {
        let html = "<html><body><p>One\n\ntwo</p><ul><li>three</li></ul></body></html>";
        assert_eq!(html_to_text(html), html_to_text(html));
        assert_eq!(html_to_text(html), "One two three");
    }
}
