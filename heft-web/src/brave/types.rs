use serde::Deserialize;

/// The subset of the web search response heft reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchApiResponse {
    #[serde(default)]
    pub query: Option<Query>,

    /// Absent when Brave found nothing for the web vertical.
    #[serde(default)]
    pub web: Option<Search>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Query {
    /// Brave's spelling correction, when it searched for something else.
    #[serde(default)]
    pub altered: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub url: String,
}

impl WebSearchApiResponse {
    pub fn altered_query(&self) -> Option<&str> {
        self.query.as_ref()?.altered.as_deref()
    }

    /// Result URLs in Brave's ranking order.
    pub fn urls(self) -> Vec<String> {
        self.web
            .map(|w| w.results.into_iter().map(|r| r.url).collect())
            .unwrap_or_default()
    }
}
