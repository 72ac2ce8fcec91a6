use async_trait::async_trait;
use heft_http::HttpError;
use heft_runtime::RateError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The wait for a rate-limit slot ended without one.
    #[error("rate limit wait failed: {0}")]
    RateLimit(#[from] RateError),
    #[error("search request failed: {0}")]
    Http(#[from] HttpError),
    /// The provider answered with an empty (null) document.
    #[error("no results found")]
    NoResults,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Up to `limit` result URLs in provider rank order. Implementations cap
    /// `limit` at their own maximum instead of rejecting it.
    async fn search(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SearchError>;
}
