use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::data_source::SourceError;
use crate::ProviderId;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) marketlens/0.1";

/// HTTP request envelope used by adapter transport calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// HTTP response envelope returned by an adapter transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpErrorKind {
    Timeout,
    Connect,
    Other,
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
}

impl HttpError {
    pub fn new(kind: HttpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(HttpErrorKind::Timeout, message)
    }

    pub const fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Converts into a source error. Every transport failure is transient.
    pub fn into_source_error(self, provider: ProviderId) -> SourceError {
        match self.kind {
            HttpErrorKind::Timeout => {
                SourceError::timeout(format!("{provider} request timed out: {}", self.message))
            }
            HttpErrorKind::Connect | HttpErrorKind::Other => SourceError::unavailable(format!(
                "{provider} transport error: {}",
                self.message
            )),
        }
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Maps a non-2xx status to a classified source error. Returns `None` for
/// success statuses.
pub fn classify_status(provider: ProviderId, status: u16) -> Option<SourceError> {
    let message = format!("{provider} upstream returned status {status}");
    match status {
        200..=299 => None,
        401 | 403 => Some(SourceError::unauthorized(message)),
        404 => Some(SourceError::not_found(message)),
        408 => Some(SourceError::timeout(message)),
        429 => Some(SourceError::rate_limited(message)),
        500..=599 => Some(SourceError::unavailable(message)),
        _ => Some(SourceError::invalid_request(message)),
    }
}

/// Adapter transport contract.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production HTTP client backed by reqwest, with a cookie jar for
/// session-based upstreams.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self {
            client: Arc::new(
                reqwest::Client::builder()
                    .user_agent(USER_AGENT)
                    .cookie_store(true)
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new()),
            ),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .get(&request.url)
                .timeout(Duration::from_millis(request.timeout_ms));

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(map_reqwest_error)?;
            let status = response.status().as_u16();
            let body = response.text().await.map_err(map_reqwest_error)?;

            Ok(HttpResponse { status, body })
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        HttpError::timeout(format!("request timeout: {error}"))
    } else if error.is_connect() {
        HttpError::new(HttpErrorKind::Connect, format!("connection failed: {error}"))
    } else {
        HttpError::new(HttpErrorKind::Other, format!("request failed: {error}"))
    }
}
