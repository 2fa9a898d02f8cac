//! Data source trait and request types.
//!
//! This module defines the adapter contract (`DataSource`) every provider
//! implements, along with the validated request type for each capability.
//!
//! # Capabilities
//!
//! | Capability | Request | Response |
//! |------------|---------|----------|
//! | Quote | [`QuoteRequest`] | [`Quote`] |
//! | Fundamentals | [`FundamentalsRequest`] | [`FundamentalsReport`] |
//! | News | [`NewsRequest`] | `Vec<`[`NewsItem`]`>` |
//!
//! # Example
//!
//! ```rust,ignore
//! use marketlens_core::{DataSource, QuoteRequest, SourceError, Symbol, YahooAdapter};
//!
//! async fn fetch_quote(adapter: &YahooAdapter) -> Result<(), SourceError> {
//!     let request = QuoteRequest::new(Symbol::parse("RELIANCE.NS")?);
//!     let quote = adapter.quote(request).await?;
//!     println!("{}: {:.2}", quote.symbol, quote.price);
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{
    Capability, FundamentalsReport, NewsItem, ProviderId, Quote, Symbol, ValidationError,
};

/// Inclusive bounds for the number of news items a request may ask for.
pub const MAX_ITEMS_RANGE: (usize, usize) = (1, 50);

/// Boxed future returned by every [`DataSource`] method.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Supported capability matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub quote: bool,
    pub fundamentals: bool,
    pub news: bool,
}

impl CapabilitySet {
    pub const fn new(quote: bool, fundamentals: bool, news: bool) -> Self {
        Self {
            quote,
            fundamentals,
            news,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true)
    }

    pub const fn news_only() -> Self {
        Self::new(false, false, true)
    }

    pub const fn supports(self, capability: Capability) -> bool {
        match capability {
            Capability::Quote => self.quote,
            Capability::Fundamentals => self.fundamentals,
            Capability::News => self.news,
        }
    }

    pub fn supported(self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|capability| self.supports(*capability))
            .collect()
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    Timeout,
    Unavailable,
    RateLimited,
    /// A local call budget has no slot left; nothing was sent upstream.
    QuotaExhausted,
    InvalidRequest,
    NotFound,
    Unauthorized,
    MalformedResponse,
    UnsupportedCapability,
    AdapterNotRegistered,
    Internal,
}

impl SourceErrorKind {
    /// Transient failures that a retry may cure.
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Timeout | Self::Unavailable | Self::RateLimited)
    }
}

/// Structured source error used by retry and fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unavailable, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn quota_exhausted(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::QuotaExhausted, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unauthorized, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::MalformedResponse, message)
    }

    pub fn unsupported_capability(capability: Capability) -> Self {
        Self::new(
            SourceErrorKind::UnsupportedCapability,
            format!("capability '{capability}' is not supported by this source"),
        )
    }

    pub fn adapter_not_registered(provider: ProviderId) -> Self {
        Self::new(
            SourceErrorKind::AdapterNotRegistered,
            format!("source adapter '{provider}' is not registered"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Internal, message)
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::QuotaExhausted => "source.quota_exhausted",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Unauthorized => "source.unauthorized",
            SourceErrorKind::MalformedResponse => "source.malformed_response",
            SourceErrorKind::UnsupportedCapability => "source.unsupported_capability",
            SourceErrorKind::AdapterNotRegistered => "source.adapter_not_registered",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(value: ValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// Request payload for quote lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub symbol: Symbol,
}

impl QuoteRequest {
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }
}

/// Request payload for fundamentals lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundamentalsRequest {
    pub symbol: Symbol,
}

impl FundamentalsRequest {
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }
}

/// Request payload for news lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsRequest {
    pub symbol: Symbol,
    pub stock_name: String,
    pub query: Option<String>,
    pub max_items: usize,
}

impl NewsRequest {
    pub fn new(
        symbol: Symbol,
        stock_name: impl Into<String>,
        query: Option<String>,
        max_items: usize,
    ) -> Result<Self, ValidationError> {
        let stock_name = stock_name.into().trim().to_owned();
        let query = query
            .map(|query| query.trim().to_owned())
            .filter(|query| !query.is_empty());

        if stock_name.is_empty() && query.is_none() {
            return Err(ValidationError::EmptyStockName);
        }
        validate_max_items(max_items)?;

        Ok(Self {
            symbol,
            stock_name,
            query,
            max_items,
        })
    }

    /// Free-text search query; defaults to `"{stock_name} stock India"`.
    pub fn search_query(&self) -> String {
        match &self.query {
            Some(query) => query.clone(),
            None => format!("{} stock India", self.stock_name),
        }
    }

    /// Parameter fingerprint used in cache keys.
    pub fn fingerprint(&self) -> String {
        format!(
            "name={};query={};max={}",
            self.stock_name.to_ascii_lowercase(),
            self.query.as_deref().unwrap_or_default().to_ascii_lowercase(),
            self.max_items
        )
    }
}

pub fn validate_max_items(value: usize) -> Result<(), ValidationError> {
    let (min, max) = MAX_ITEMS_RANGE;
    if !(min..=max).contains(&value) {
        return Err(ValidationError::MaxItemsOutOfRange { value, min, max });
    }
    Ok(())
}

/// Source adapter contract.
///
/// All providers implement this trait to be used with the router. Methods
/// for capabilities a source does not advertise default to
/// [`SourceError::unsupported_capability`].
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](DataSource::id) | Unique provider identifier |
/// | [`capabilities`](DataSource::capabilities) | Supported capabilities |
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` as they are shared across the
/// concurrent report branches.
pub trait DataSource: Send + Sync {
    /// Returns the unique provider identifier.
    fn id(&self) -> ProviderId;

    /// Returns the set of supported capabilities.
    fn capabilities(&self) -> CapabilitySet;

    /// Fetches the latest quote for one symbol.
    ///
    /// # Errors
    ///
    /// Returns a retryable [`SourceError`] for timeouts, unavailability and
    /// rate limits; a terminal one for unknown symbols, bad credentials and
    /// unparseable payloads.
    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        let _ = req;
        Box::pin(async { Err(SourceError::unsupported_capability(Capability::Quote)) })
    }

    /// Fetches company fundamentals for one symbol.
    fn fundamentals<'a>(&'a self, req: FundamentalsRequest) -> SourceFuture<'a, FundamentalsReport> {
        let _ = req;
        Box::pin(async { Err(SourceError::unsupported_capability(Capability::Fundamentals)) })
    }

    /// Fetches recent news. Items need not be sorted or truncated; the
    /// router arranges them.
    fn news<'a>(&'a self, req: NewsRequest) -> SourceFuture<'a, Vec<NewsItem>> {
        let _ = req;
        Box::pin(async { Err(SourceError::unsupported_capability(Capability::News)) })
    }
}
