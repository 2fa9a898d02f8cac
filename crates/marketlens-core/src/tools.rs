//! Tool surface: the four stock tools, each answering with an [`Envelope`].
//!
//! | Tool | Arguments | Data |
//! |------|-----------|------|
//! | `get_stock_quote` | `symbol` | [`Quote`] |
//! | `get_stock_fundamentals` | `ticker` | [`FundamentalsReport`] |
//! | `get_stock_news` | `ticker`, `stock_name`, `query?`, `max_items = 10` | `Vec<NewsItem>` |
//! | `get_stock_analysis` | `ticker`, `stock_name`, `include_news = true`, `max_news = 5` | [`CompositeReport`] |

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::data_source::{FundamentalsRequest, NewsRequest, QuoteRequest};
use crate::envelope::{Envelope, EnvelopeError, EnvelopeMeta};
use crate::orchestrator::{join_sections, CompositeReport, ReportOrchestrator, ReportRequest};
use crate::retry::elapsed_ms;
use crate::service::MarketDataService;
use crate::{
    Capability, FetchOutcome, FundamentalsReport, NewsItem, ProviderId, Quote, Symbol,
    ValidationError,
};

pub const GET_STOCK_QUOTE: &str = "get_stock_quote";
pub const GET_STOCK_FUNDAMENTALS: &str = "get_stock_fundamentals";
pub const GET_STOCK_NEWS: &str = "get_stock_news";
pub const GET_STOCK_ANALYSIS: &str = "get_stock_analysis";

pub const DEFAULT_NEWS_ITEMS: usize = 10;
pub const DEFAULT_ANALYSIS_NEWS_ITEMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteArgs {
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundamentalsArgs {
    pub ticker: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArgs {
    pub ticker: String,
    pub stock_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default = "default_news_items")]
    pub max_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisArgs {
    pub ticker: String,
    pub stock_name: String,
    #[serde(default = "default_include_news")]
    pub include_news: bool,
    #[serde(default = "default_analysis_news_items")]
    pub max_news: usize,
}

fn default_news_items() -> usize {
    DEFAULT_NEWS_ITEMS
}

fn default_analysis_news_items() -> usize {
    DEFAULT_ANALYSIS_NEWS_ITEMS
}

fn default_include_news() -> bool {
    true
}

/// One tool invocation, e.g.
/// `{"tool": "get_stock_quote", "arguments": {"symbol": "RELIANCE"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    GetStockQuote(QuoteArgs),
    GetStockFundamentals(FundamentalsArgs),
    GetStockNews(NewsArgs),
    GetStockAnalysis(AnalysisArgs),
}

impl ToolCall {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetStockQuote(_) => GET_STOCK_QUOTE,
            Self::GetStockFundamentals(_) => GET_STOCK_FUNDAMENTALS,
            Self::GetStockNews(_) => GET_STOCK_NEWS,
            Self::GetStockAnalysis(_) => GET_STOCK_ANALYSIS,
        }
    }
}

/// Envelope produced by [`Toolbox::call`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolResponse {
    Quote(Envelope<Quote>),
    Fundamentals(Envelope<FundamentalsReport>),
    News(Envelope<Vec<NewsItem>>),
    Analysis(Envelope<CompositeReport>),
}

impl ToolResponse {
    pub fn meta(&self) -> &EnvelopeMeta {
        match self {
            Self::Quote(envelope) => &envelope.meta,
            Self::Fundamentals(envelope) => &envelope.meta,
            Self::News(envelope) => &envelope.meta,
            Self::Analysis(envelope) => &envelope.meta,
        }
    }

    pub fn errors(&self) -> &[EnvelopeError] {
        match self {
            Self::Quote(envelope) => &envelope.errors,
            Self::Fundamentals(envelope) => &envelope.errors,
            Self::News(envelope) => &envelope.errors,
            Self::Analysis(envelope) => &envelope.errors,
        }
    }

    pub fn is_success(&self) -> bool {
        self.errors().is_empty()
    }

    /// True when the call was rejected before any provider was contacted.
    pub fn is_invalid_request(&self) -> bool {
        self.errors()
            .iter()
            .any(|error| error.code == INVALID_REQUEST_CODE)
    }
}

const INVALID_REQUEST_CODE: &str = "request.invalid";

/// The four stock tools over one service.
#[derive(Clone)]
pub struct Toolbox {
    service: MarketDataService,
    orchestrator: ReportOrchestrator,
}

impl Toolbox {
    pub fn new(service: MarketDataService) -> Self {
        let orchestrator = ReportOrchestrator::new(service.clone());
        Self {
            service,
            orchestrator,
        }
    }

    pub fn with_orchestrator(orchestrator: ReportOrchestrator) -> Self {
        Self {
            service: orchestrator.service().clone(),
            orchestrator,
        }
    }

    pub fn service(&self) -> &MarketDataService {
        &self.service
    }

    pub async fn call(&self, call: ToolCall) -> ToolResponse {
        match call {
            ToolCall::GetStockQuote(args) => ToolResponse::Quote(self.get_stock_quote(&args.symbol).await),
            ToolCall::GetStockFundamentals(args) => {
                ToolResponse::Fundamentals(self.get_stock_fundamentals(&args.ticker).await)
            }
            ToolCall::GetStockNews(args) => ToolResponse::News(
                self.get_stock_news(
                    &args.ticker,
                    &args.stock_name,
                    args.query.as_deref(),
                    args.max_items,
                )
                .await,
            ),
            ToolCall::GetStockAnalysis(args) => ToolResponse::Analysis(
                self.get_stock_analysis(
                    &args.ticker,
                    &args.stock_name,
                    args.include_news,
                    args.max_news,
                )
                .await,
            ),
        }
    }

    /// Latest price snapshot for `symbol`.
    pub async fn get_stock_quote(&self, symbol: &str) -> Envelope<Quote> {
        let started = Instant::now();
        let symbol = match Symbol::parse(symbol) {
            Ok(symbol) => symbol,
            Err(error) => return rejected(GET_STOCK_QUOTE, started, &error),
        };

        let outcome = self.service.quote(QuoteRequest::new(symbol)).await;
        self.finish(GET_STOCK_QUOTE, Capability::Quote, started, outcome)
    }

    /// Company profile, statements and ratios for `ticker`.
    pub async fn get_stock_fundamentals(&self, ticker: &str) -> Envelope<FundamentalsReport> {
        let started = Instant::now();
        let symbol = match Symbol::parse(ticker) {
            Ok(symbol) => symbol,
            Err(error) => return rejected(GET_STOCK_FUNDAMENTALS, started, &error),
        };

        let outcome = self
            .service
            .fundamentals(FundamentalsRequest::new(symbol))
            .await;
        self.finish(GET_STOCK_FUNDAMENTALS, Capability::Fundamentals, started, outcome)
    }

    /// Recent articles about a listing, newest first.
    pub async fn get_stock_news(
        &self,
        ticker: &str,
        stock_name: &str,
        query: Option<&str>,
        max_items: usize,
    ) -> Envelope<Vec<NewsItem>> {
        let started = Instant::now();
        let request = Symbol::parse(ticker).and_then(|symbol| {
            NewsRequest::new(symbol, stock_name, query.map(str::to_owned), max_items)
        });
        let request = match request {
            Ok(request) => request,
            Err(error) => return rejected(GET_STOCK_NEWS, started, &error),
        };

        let outcome = self.service.news(request).await;
        self.finish(GET_STOCK_NEWS, Capability::News, started, outcome)
    }

    /// Quote, fundamentals and optionally news in one report. Failed
    /// sections become envelope errors while the report is still returned.
    pub async fn get_stock_analysis(
        &self,
        ticker: &str,
        stock_name: &str,
        include_news: bool,
        max_news: usize,
    ) -> Envelope<CompositeReport> {
        let started = Instant::now();
        let request = match ReportRequest::new(ticker, stock_name, include_news, max_news) {
            Ok(request) => request,
            Err(error) => return rejected(GET_STOCK_ANALYSIS, started, &error),
        };

        let capabilities: &[Capability] = if include_news {
            &Capability::ALL
        } else {
            &[Capability::Quote, Capability::Fundamentals]
        };
        let chain = self.service.settings().providers.chain_union(capabilities);

        let report = self.orchestrator.build(request).await;
        let errors = report
            .failures()
            .into_iter()
            .map(|(section, failure)| EnvelopeError::from_failure(section.as_str(), failure))
            .collect::<Vec<_>>();

        let mut meta = EnvelopeMeta::new(GET_STOCK_ANALYSIS, chain, elapsed_ms(started));
        let failed = report.failed_sections();
        if !failed.is_empty() {
            meta.push_warning(format!(
                "analysis completed with failures in: {}",
                join_sections(&failed)
            ));
        }

        Envelope {
            meta,
            success: errors.is_empty(),
            data: Some(report),
            errors,
        }
    }

    fn finish<T>(
        &self,
        tool: &str,
        capability: Capability,
        started: Instant,
        outcome: FetchOutcome<T>,
    ) -> Envelope<T> {
        let chain = ProviderId::unique(self.service.chain(capability).iter().copied());
        let meta = EnvelopeMeta::new(tool, chain, elapsed_ms(started));
        match outcome {
            FetchOutcome::Success { value, .. } => Envelope::success(meta, value),
            FetchOutcome::Failure(failure) => {
                Envelope::failure(meta, EnvelopeError::from_failure(capability.as_str(), &failure))
            }
        }
    }
}

fn rejected<T>(tool: &str, started: Instant, error: &ValidationError) -> Envelope<T> {
    let meta = EnvelopeMeta::new(tool, Vec::new(), elapsed_ms(started));
    Envelope::failure(meta, EnvelopeError::invalid_request(error))
}
