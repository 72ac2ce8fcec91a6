use super::types::WebSearchApiResponse;
use crate::search::{SearchError, SearchProvider};
use async_trait::async_trait;
use heft_http::{Auth, HttpClient, HttpError, RequestOpts};
use heft_runtime::Throttle;
use reqwest::header::{HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Largest `count` the pipeline asks Brave for.
pub const BRAVE_MAX_COUNT: usize = 20;

const WEB_SEARCH_PATH: &str = "res/v1/web/search";
const QUERY_LOG_CHARS: usize = 160;

/// Brave web search behind a shared [`Throttle`].
///
/// Every call holds the throttle permit until the response is decoded, so
/// clones of the same `Arc<Throttle>` never have two requests in flight.
#[derive(Clone)]
pub struct BraveSearch {
    http: HttpClient,
    token: HeaderValue,
    throttle: Arc<Throttle>,
}

impl BraveSearch {
    pub fn new(endpoint: &str, token: &str, throttle: Arc<Throttle>) -> Result<Self, HttpError> {
        let http = HttpClient::new(endpoint)?;
        let mut token =
            HeaderValue::from_str(token).map_err(|e| HttpError::Build(format!("token: {e}")))?;
        token.set_sensitive(true);
        Ok(Self {
            http,
            token,
            throttle,
        })
    }

    async fn web_search(&self, query: &str, count: usize) -> Result<WebSearchApiResponse, SearchError> {
        let opts = RequestOpts {
            auth: Some(Auth::Header {
                name: HeaderName::from_static("x-subscription-token"),
                value: self.token.clone(),
            }),
            query: Some(vec![("q", query.into()), ("count", count.to_string().into())]),
            ..Default::default()
        };

        // `null` decodes to `None`: a reply with no document at all.
        let resp: Option<WebSearchApiResponse> = self.http.get_json(WEB_SEARCH_PATH, opts).await?;
        resp.ok_or(SearchError::NoResults)
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    async fn search(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SearchError> {
        let _permit = self.throttle.admit(cancel).await?;

        let count = limit.clamp(1, BRAVE_MAX_COUNT);
        let query_snippet: String = query.chars().take(QUERY_LOG_CHARS).collect();
        let started = Instant::now();
        tracing::info!(target: "web.brave", query = %query_snippet, count, "search.brave.start");

        match self.web_search(query, count).await {
            Ok(resp) => {
                if let Some(altered) = resp.altered_query() {
                    tracing::info!(target: "web.brave", query = %query_snippet, altered, "search.brave.altered");
                }
                let urls = resp.urls();
                tracing::info!(
                    target: "web.brave",
                    query = %query_snippet,
                    hits = urls.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "search.brave.success"
                );
                Ok(urls)
            }
            Err(e) => {
                tracing::warn!(
                    target: "web.brave",
                    query = %query_snippet,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "search.brave.error"
                );
                Err(e)
            }
        }
    }
}
