//! # Marketlens Core
//!
//! Orchestration layer for Indian equity data: quotes, fundamentals and news
//! gathered from several upstream providers into one coherent answer, even
//! when individual providers fail, throttle or return partial data.
//!
//! ## Overview
//!
//! - **Provider adapters** normalizing Yahoo Finance, Alpha Vantage and
//!   Google News responses into shared domain models
//! - **Retry policy** with exponential backoff and retryable/terminal
//!   classification
//! - **Source router** resolving a capability across a priority chain, or
//!   gathering news from every provider
//! - **Request cache** with per-capability TTLs and per-key single flight
//! - **Report orchestrator** fanning out the capabilities concurrently under
//!   a deadline
//! - **Tools** wrapping every operation in a response envelope
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Yahoo, Alpha Vantage, Google News) |
//! | [`cache`] | TTL cache of fetch outcomes |
//! | [`config`] | Settings loading and validation |
//! | [`data_source`] | Data source trait and request types |
//! | [`domain`] | Domain models (Quote, FundamentalsReport, NewsItem) |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP client abstraction |
//! | [`orchestrator`] | Composite reports |
//! | [`outcome`] | Fetch outcomes and failure taxonomy |
//! | [`retry`] | Retry policy and backoff |
//! | [`routing`] | Fallback resolution across providers |
//! | [`service`] | Cached capability entry points |
//! | [`source`] | Provider and capability identifiers |
//! | [`throttling`] | Local request budgets |
//! | [`tools`] | Stock tools and tool-call dispatch |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use marketlens_core::{MarketDataService, Settings, Toolbox};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load(None)?;
//!     let toolbox = Toolbox::new(MarketDataService::from_settings(settings)?);
//!
//!     let envelope = toolbox.get_stock_quote("RELIANCE").await;
//!     if let Some(quote) = envelope.data {
//!         println!("{} {:.2} ({:+.2}%)", quote.symbol, quote.price, quote.change_percent);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Tools / CLI    │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Orchestrator   │────▶│  Request Cache   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Source Router  │────▶│  Retry Policy    │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider calls never raise past their boundary. Adapters return a
//! classified [`SourceError`]; everything above works with
//! [`FetchOutcome`]:
//!
//! ```rust
//! use marketlens_core::{FailureKind, FetchOutcome};
//!
//! fn describe(outcome: &FetchOutcome<f64>) -> String {
//!     match outcome {
//!         FetchOutcome::Success { value, source, .. } => format!("{value} from {source}"),
//!         FetchOutcome::Failure(failure) if failure.kind == FailureKind::AllSourcesExhausted => {
//!             format!("every provider failed: {}", failure.message)
//!         }
//!         FetchOutcome::Failure(failure) => failure.to_string(),
//!     }
//! }
//! ```
//!
//! Only [`ConfigError`] aborts work, and only at startup.
//!
//! ## Security
//!
//! - API keys come from the environment or the config file and are never
//!   logged or printed
//! - Tool arguments are validated before any provider is contacted

pub mod adapters;
pub mod cache;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod orchestrator;
pub mod outcome;
pub mod retry;
pub mod routing;
pub mod service;
pub mod source;
pub mod throttling;
pub mod tools;

// Adapter implementations
pub use adapters::{AlphaVantageAdapter, GoogleNewsAdapter, YahooAdapter};

// Caching
pub use cache::{CacheKey, RequestCache};

// Configuration
pub use config::{NewsMode, Settings};

// Data source trait and types
pub use data_source::{
    CapabilitySet, DataSource, FundamentalsRequest, NewsRequest, QuoteRequest, SourceError,
    SourceErrorKind, SourceFuture,
};

// Domain models
pub use domain::{arrange_news, FundamentalsReport, NewsItem, Quote, StatementTable, Symbol, UtcDateTime};

// Envelope types
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};

// Error types
pub use error::{ConfigError, CoreError, ValidationError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient};

// Reports
pub use orchestrator::{CompositeReport, ReportOrchestrator, ReportRequest, ReportSection};

// Outcomes
pub use outcome::{FailureKind, FetchFailure, FetchOutcome};

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Routing types
pub use routing::{SourceRouter, SourceSnapshot};

// Capability entry points
pub use service::MarketDataService;

// Source identifiers
pub use source::{Capability, ProviderId};

// Throttling
pub use throttling::RequestBudget;

// Tools
pub use tools::{ToolCall, ToolResponse, Toolbox};
