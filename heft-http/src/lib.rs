//! Small HTTP client shared by the search, page-fetch, and model adapters.
//!
//! - Request options: headers, [`Auth`], query params, timeout
//! - Redacts sensitive query params and never logs secret values
//! - JSON helpers for API calls, [`HttpClient::get_text`] for HTML pages
//! - Optional *raw* request/response logging via `HEFT_HTTP_RAW=1`
//!
//! No request is ever retried; callers decide what a failure means.
//!
//! ```no_run
//! # async fn demo() -> Result<(), heft_http::HttpError> {
//! let client = heft_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", heft_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

const RAW_ENV: &str = "HEFT_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

const SECRET_PARAMS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

/// Authentication strategies supported by the client.
///
/// ```
/// use heft_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// assert_eq!(bearer.kind(), "bearer");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    /// Custom header (e.g. Brave's `X-Subscription-Token`)
    Header {
        name: HeaderName,
        value: HeaderValue,
    },
    None,
}

impl Auth<'_> {
    /// Label safe to log in place of the credential.
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::None => "none",
        }
    }
}

/// Per-request knobs.
///
/// ```
/// use heft_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     auth: Some(Auth::Bearer("demo")),
///     query: Some(vec![("q", "term".into())]),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

/// A fetched non-JSON document.
#[derive(Debug, Clone)]
pub struct TextResponse {
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Option<Url>,
    inner: Client,
    pub default_timeout: Duration,
}

struct RawResponse {
    body: Vec<u8>,
    req_id: String,
}

/// A response whose headers have arrived but whose body is still unread.
struct Sent {
    resp: reqwest::Response,
    req_id: String,
    request_id: String,
}

impl HttpClient {
    /// Construct a client anchored to a base URL. A trailing slash is added
    /// so relative paths extend the base instead of replacing its last segment.
    ///
    /// ```no_run
    /// use heft_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        let mut client = Self::detached()?;
        client.base = Some(base);
        Ok(client)
    }

    /// A client without a base URL; every path must be absolute.
    pub fn detached() -> Result<Self, HttpError> {
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base: None,
            inner,
            default_timeout: Duration::from_secs(15),
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// POST JSON with optional bearer auth.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &B,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let opts = RequestOpts {
            auth: bearer.map(Auth::Bearer),
            ..Default::default()
        };
        self.post_json_opts(path, body, opts).await
    }

    pub async fn post_json_opts<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let raw = self.execute(Method::POST, path, Some(bytes), opts).await?;
        decode_json(raw)
    }

    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let raw = self.execute(Method::GET, path, None, opts).await?;
        decode_json(raw)
    }

    /// GET a document as text, decoded with the charset declared in its
    /// `Content-Type` (UTF-8 when none is given). Non-2xx statuses are errors.
    pub async fn get_text(
        &self,
        path: &str,
        opts: RequestOpts<'_>,
    ) -> Result<TextResponse, HttpError> {
        let sent = self.send(Method::GET, path, None, opts).await?;
        let status = sent.resp.status();
        if !status.is_success() {
            let bytes = read_body(sent.resp, &sent.req_id).await?;
            return Err(api_error(status, &bytes, &sent.req_id, sent.request_id));
        }

        let content_type = header_str(sent.resp.headers(), CONTENT_TYPE.as_str()).map(str::to_string);
        let body = sent.resp.text().await.map_err(|err| {
            tracing::warn!(req_id = %sent.req_id, error = %err, "http.network_error.body");
            HttpError::Network(err.to_string())
        })?;
        if raw_enabled() {
            let mut end = body.len().min(RAW_MAX_BODY);
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            tracing::info!(
                target: "http.raw",
                req_id = %sent.req_id,
                %status,
                body = %&body[..end],
                truncated = body.len() > RAW_MAX_BODY
            );
        }
        Ok(TextResponse { content_type, body })
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        if let Ok(abs) = Url::parse(path) {
            return Ok(abs);
        }
        match &self.base {
            Some(base) => base.join(path).map_err(|e| HttpError::Url(e.to_string())),
            None => Err(HttpError::Url(format!(
                "relative path without base URL: {path}"
            ))),
        }
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        opts: RequestOpts<'_>,
    ) -> Result<RawResponse, HttpError> {
        let sent = self.send(method, path, body, opts).await?;
        let status = sent.resp.status();
        let headers = sent.resp.headers().clone();
        let bytes = read_body(sent.resp, &sent.req_id).await?;

        if raw_enabled() {
            let end = bytes.len().min(RAW_MAX_BODY);
            tracing::info!(
                target: "http.raw",
                req_id = %sent.req_id,
                %status,
                headers = ?redact_headers(&headers),
                body = %String::from_utf8_lossy(&bytes[..end]),
                truncated = bytes.len() > RAW_MAX_BODY
            );
        }

        if !status.is_success() {
            return Err(api_error(status, &bytes, &sent.req_id, sent.request_id));
        }
        Ok(RawResponse {
            body: bytes,
            req_id: sent.req_id,
        })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        opts: RequestOpts<'_>,
    ) -> Result<Sent, HttpError> {
        let url = self.resolve(path)?;
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let req_id = format!("r{}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));

        let mut rb = self
            .inner
            .request(method.clone(), url.clone())
            .timeout(timeout);
        if let Some(q) = &opts.query {
            let pairs: Vec<(&str, &str)> = q.iter().map(|(k, v)| (*k, v.as_ref())).collect();
            rb = rb.query(&pairs);
        }
        if let Some(hdrs) = &opts.headers {
            rb = rb.headers(hdrs.clone());
        }
        match &opts.auth {
            Some(Auth::Bearer(tok)) => rb = rb.bearer_auth(sanitize_api_key(tok)?),
            Some(Auth::Header { name, value }) => rb = rb.header(name, value),
            Some(Auth::None) | None => {}
        }
        if let Some(bytes) = &body {
            rb = rb
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.clone());
        }

        tracing::debug!(
            req_id = %req_id,
            method = %method,
            host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
            query = ?redact_query(opts.query.as_deref()),
            timeout_ms = timeout.as_millis() as u64,
            auth_kind = opts.auth.as_ref().map_or("none", Auth::kind),
            has_body = body.is_some(),
            "http.request.start"
        );
        if raw_enabled() {
            let curl = make_curl(&method, &url, opts.headers.as_ref(), body.as_deref());
            tracing::debug!(target: "http.raw", %req_id, %curl, "request");
        }

        let started = std::time::Instant::now();
        let resp = rb.send().await.map_err(|err| {
            tracing::warn!(req_id = %req_id, error = %err, "http.network_error.send");
            HttpError::Network(err.to_string())
        })?;

        let headers = resp.headers();
        let request_id = header_str(headers, "x-request-id")
            .or_else(|| header_str(headers, "x-correlation-id"))
            .unwrap_or("-")
            .to_string();
        tracing::debug!(
            req_id = %req_id,
            status = %resp.status(),
            duration_ms = started.elapsed().as_millis() as u64,
            content_length = ?resp.content_length(),
            x_request_id = %request_id,
            rate_limit.limit = ?header_str(headers, "x-ratelimit-limit"),
            rate_limit.remaining = ?header_str(headers, "x-ratelimit-remaining"),
            rate_limit.reset = ?header_str(headers, "x-ratelimit-reset"),
            "http.response.headers"
        );

        Ok(Sent {
            resp,
            req_id,
            request_id,
        })
    }
}

async fn read_body(resp: reqwest::Response, req_id: &str) -> Result<Vec<u8>, HttpError> {
    let bytes = resp.bytes().await.map_err(|err| {
        tracing::warn!(req_id = %req_id, error = %err, "http.network_error.body");
        HttpError::Network(err.to_string())
    })?;
    Ok(bytes.to_vec())
}

fn api_error(status: StatusCode, body: &[u8], req_id: &str, request_id: String) -> HttpError {
    let message = extract_error_message(body);
    tracing::warn!(
        req_id = %req_id,
        %status,
        message = %message,
        x_request_id = %request_id,
        "http.error"
    );
    HttpError::Api {
        status,
        message,
        request_id,
    }
}

fn decode_json<T: DeserializeOwned>(raw: RawResponse) -> Result<T, HttpError> {
    serde_json::from_slice::<T>(&raw.body).map_err(|e| {
        let snippet = snip_body(&raw.body);
        tracing::warn!(
            req_id = %raw.req_id,
            serde_line = e.line(),
            serde_col = e.column(),
            serde_err = %e,
            body_snippet = %snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_secret_param(name: &str) -> bool {
    SECRET_PARAMS.contains(&name.to_ascii_lowercase().as_str())
}

fn redact_query(query: Option<&[(&str, Cow<'_, str>)]>) -> Vec<(String, String)> {
    query
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| {
            let shown = if is_secret_param(k) {
                "<redacted>".to_string()
            } else {
                v.to_string()
            };
            (k.to_string(), shown)
        })
        .collect()
}

fn is_secret_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("authorization") || name.eq_ignore_ascii_case("x-subscription-token")
}

fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let val = if is_secret_header(k.as_str()) {
                "<redacted>".to_string()
            } else {
                v.to_str().unwrap_or("").to_string()
            };
            (k.as_str().to_string(), val)
        })
        .collect()
}

/// Best-effort curl command for reproducing a request. Secrets are redacted.
fn make_curl(method: &Method, url: &Url, headers: Option<&HeaderMap>, body: Option<&[u8]>) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{method}")];
    if let Some(headers) = headers {
        for (name, val) in redact_headers(headers) {
            parts.push(format!("-H '{}: {}'", name, val.replace('\'', r"'\''")));
        }
    }
    if let Some(bytes) = body {
        let end = bytes.len().min(RAW_MAX_BODY);
        let text = String::from_utf8_lossy(&bytes[..end]);
        parts.push(format!("-d '{}'", text.replace('\'', r"'\''")));
    }
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if is_secret_param(&k) {
                "<redacted>".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    if !pairs.is_empty() {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parts.push(format!("'{}'", shown.as_str()));
    parts.join(" ")
}

/// Pull a human-readable message out of a provider error body.
fn extract_error_message(body: &[u8]) -> String {
    // OpenAI: {"error":{"message":"..."}}  Brave: {"error":{"detail":"..."}}
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
    }
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Envelope>(body) {
        if !env.error.message.is_empty() {
            return env.error.message;
        }
        if !env.error.detail.is_empty() {
            return env.error.detail;
        }
    }
    if let Ok(m) = serde_json::from_slice::<Flat>(body) {
        for s in [m.message, m.detail, m.error] {
            if !s.is_empty() {
                return s;
            }
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > SNIPPET_MAX {
        let mut end = SNIPPET_MAX;
        while !snip.is_char_boundary(end) {
            end -= 1;
        }
        snip.truncate(end);
        snip.push_str("...");
    }
    snip
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    HeaderValue::from_str(&format!("Bearer {s}"))
        .map_err(|e| HttpError::Build(format!("invalid Authorization header: {e}")))?;
    Ok(s)
}
