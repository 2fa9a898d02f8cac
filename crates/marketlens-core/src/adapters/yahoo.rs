use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use urlencoding::encode;

use super::{fetch_body, parse_json};
use crate::data_source::{
    CapabilitySet, DataSource, FundamentalsRequest, NewsRequest, QuoteRequest, SourceError,
    SourceErrorKind, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::{
    FundamentalsReport, NewsItem, ProviderId, Quote, StatementTable, Symbol, UtcDateTime,
};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const REFERER: &str = "https://finance.yahoo.com/";

const SUMMARY_MODULES: &str = "assetProfile,summaryDetail,defaultKeyStatistics,financialData,\
incomeStatementHistory,balanceSheetHistory,cashflowStatementHistory,esgScores";

/// Crumbs are reused for an hour before a refresh.
const SESSION_TTL: Duration = Duration::from_secs(3600);

/// Company attributes copied into `company_info` besides the asset profile.
const INFO_FIELDS: [(&str, &str); 7] = [
    ("summaryDetail", "marketCap"),
    ("summaryDetail", "currency"),
    ("summaryDetail", "fiftyTwoWeekHigh"),
    ("summaryDetail", "fiftyTwoWeekLow"),
    ("defaultKeyStatistics", "sharesOutstanding"),
    ("financialData", "totalRevenue"),
    ("financialData", "recommendationKey"),
];

const RATIO_FIELDS: [(&str, &str); 15] = [
    ("summaryDetail", "trailingPE"),
    ("summaryDetail", "forwardPE"),
    ("summaryDetail", "dividendYield"),
    ("summaryDetail", "beta"),
    ("summaryDetail", "priceToSalesTrailing12Months"),
    ("defaultKeyStatistics", "priceToBook"),
    ("defaultKeyStatistics", "pegRatio"),
    ("defaultKeyStatistics", "enterpriseToEbitda"),
    ("defaultKeyStatistics", "enterpriseToRevenue"),
    ("financialData", "returnOnEquity"),
    ("financialData", "returnOnAssets"),
    ("financialData", "debtToEquity"),
    ("financialData", "profitMargins"),
    ("financialData", "currentRatio"),
    ("financialData", "quickRatio"),
];

/// (report name, module, array field)
const STATEMENTS: [(&str, &str, &str); 3] = [
    ("income_statement", "incomeStatementHistory", "incomeStatementHistory"),
    ("balance_sheet", "balanceSheetHistory", "balanceSheetStatements"),
    ("cash_flow", "cashflowStatementHistory", "cashflowStatements"),
];

// ============================================================================
// Session - cookie + crumb required by quoteSummary
// ============================================================================

#[derive(Debug, Clone)]
struct CachedCrumb {
    value: String,
    fetched_at: Instant,
}

/// Cached Yahoo crumb. Cookies live in the HTTP client's jar; the lock is
/// held across a refresh so concurrent callers share one.
#[derive(Debug, Default)]
struct YahooSession {
    crumb: Mutex<Option<CachedCrumb>>,
}

impl YahooSession {
    async fn crumb(&self, http_client: &dyn HttpClient, timeout_ms: u64) -> Result<String, SourceError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            if crumb.fetched_at.elapsed() < SESSION_TTL {
                return Ok(crumb.value.clone());
            }
        }

        let value = fetch_crumb(http_client, timeout_ms).await?;
        *cached = Some(CachedCrumb {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    async fn invalidate(&self) {
        *self.crumb.lock().await = None;
    }
}

async fn fetch_crumb(http_client: &dyn HttpClient, timeout_ms: u64) -> Result<String, SourceError> {
    // Primes the cookie jar; the response itself is irrelevant.
    let cookie_request = HttpRequest::get(COOKIE_URL)
        .with_header("referer", REFERER)
        .with_timeout_ms(timeout_ms);
    if let Err(error) = http_client.execute(cookie_request).await {
        debug!(source = "yahoo", reason = %error, "cookie priming failed");
    }

    let mut last_error = SourceError::unavailable("yahoo returned no usable crumb");
    for url in CRUMB_URLS {
        let request = HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_timeout_ms(timeout_ms);

        match fetch_body(http_client, ProviderId::Yahoo, request).await {
            Ok(body) => {
                let body = body.trim();
                if body.to_ascii_lowercase().contains("too many requests") {
                    return Err(SourceError::rate_limited(
                        "yahoo rate limited the crumb request",
                    ));
                }
                if is_plausible_crumb(body) {
                    return Ok(body.to_owned());
                }
            }
            Err(error) => last_error = error,
        }
    }

    Err(last_error)
}

fn is_plausible_crumb(body: &str) -> bool {
    !body.is_empty() && body.len() < 100 && !body.contains(char::is_whitespace) && !body.contains('<')
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Yahoo Finance adapter (quote, fundamentals, news). No API key required.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    session: Arc<YahooSession>,
    exchange_suffix: String,
    timeout_ms: u64,
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            session: Arc::new(YahooSession::default()),
            exchange_suffix: String::from("NS"),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Suffix appended to symbols that carry neither `.NS` nor `.BO`.
    pub fn with_exchange_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exchange_suffix = suffix.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn listing(&self, symbol: &Symbol) -> Symbol {
        symbol.with_exchange(&self.exchange_suffix)
    }

    fn request(&self, url: String) -> HttpRequest {
        HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_header("referer", REFERER)
            .with_timeout_ms(self.timeout_ms)
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let symbol = self.listing(&req.symbol);
        let url = format!("{CHART_URL}/{}?interval=1d&range=1d", encode(symbol.as_str()));
        let body = fetch_body(self.http_client.as_ref(), ProviderId::Yahoo, self.request(url)).await?;
        parse_chart(symbol, &body)
    }

    async fn fetch_fundamentals(&self, req: FundamentalsRequest) -> Result<FundamentalsReport, SourceError> {
        let symbol = self.listing(&req.symbol);
        let crumb = self
            .session
            .crumb(self.http_client.as_ref(), self.timeout_ms)
            .await?;
        let url = format!(
            "{SUMMARY_URL}/{}?modules={SUMMARY_MODULES}&crumb={}",
            encode(symbol.as_str()),
            encode(&crumb)
        );

        match fetch_body(self.http_client.as_ref(), ProviderId::Yahoo, self.request(url)).await {
            Ok(body) => parse_summary(symbol, &body),
            Err(error) if error.kind() == SourceErrorKind::Unauthorized => {
                // A stale crumb surfaces as 401; the next attempt starts a new session.
                self.session.invalidate().await;
                Err(SourceError::unavailable(format!(
                    "yahoo rejected the session crumb: {}",
                    error.message()
                )))
            }
            Err(error) => Err(error),
        }
    }

    async fn fetch_news(&self, req: NewsRequest) -> Result<Vec<NewsItem>, SourceError> {
        let symbol = self.listing(&req.symbol);
        let url = format!(
            "{SEARCH_URL}?q={}&quotesCount=0&newsCount={}",
            encode(symbol.as_str()),
            req.max_items
        );
        let body = fetch_body(self.http_client.as_ref(), ProviderId::Yahoo, self.request(url)).await?;
        parse_search_news(&body)
    }
}

impl DataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::full()
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn fundamentals<'a>(&'a self, req: FundamentalsRequest) -> SourceFuture<'a, FundamentalsReport> {
        Box::pin(self.fetch_fundamentals(req))
    }

    fn news<'a>(&'a self, req: NewsRequest) -> SourceFuture<'a, Vec<NewsItem>> {
        Box::pin(self.fetch_news(req))
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
    regular_market_volume: Option<f64>,
    regular_market_time: Option<i64>,
}

fn parse_chart(symbol: Symbol, body: &str) -> Result<Quote, SourceError> {
    let envelope: ChartEnvelope = parse_json(ProviderId::Yahoo, body)?;
    if let Some(error) = envelope.chart.error.filter(|error| !error.is_null()) {
        return Err(SourceError::not_found(format!(
            "yahoo chart error for {symbol}: {}",
            describe_error(&error)
        )));
    }

    let meta = envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|result| result.meta)
        .ok_or_else(|| SourceError::not_found(format!("yahoo returned no chart data for {symbol}")))?;

    let price = meta.regular_market_price.ok_or_else(|| {
        SourceError::malformed(format!("yahoo chart for {symbol} has no regularMarketPrice"))
    })?;
    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .unwrap_or(0.0);
    let volume = meta
        .regular_market_volume
        .filter(|volume| volume.is_finite() && *volume >= 0.0)
        .map(|volume| volume as u64);
    let timestamp = meta.regular_market_time.and_then(UtcDateTime::from_unix_seconds);

    Quote::new(
        symbol,
        price,
        previous_close,
        meta.regular_market_day_high,
        meta.regular_market_day_low,
        volume,
        timestamp,
        ProviderId::Yahoo,
    )
    .map_err(|error| SourceError::malformed(error.to_string()))
}

fn parse_summary(symbol: Symbol, body: &str) -> Result<FundamentalsReport, SourceError> {
    let envelope: Value = parse_json(ProviderId::Yahoo, body)?;
    let summary = &envelope["quoteSummary"];

    if let Some(error) = summary.get("error").filter(|error| !error.is_null()) {
        return Err(SourceError::not_found(format!(
            "yahoo quoteSummary error for {symbol}: {}",
            describe_error(error)
        )));
    }
    let Some(result) = summary["result"].get(0) else {
        return Err(SourceError::not_found(format!(
            "yahoo returned no fundamentals for {symbol}"
        )));
    };

    let mut report = FundamentalsReport::new(symbol.clone(), ProviderId::Yahoo);

    if let Some(profile) = result["assetProfile"].as_object() {
        for (key, value) in profile.iter().filter(|(key, _)| key.as_str() != "maxAge") {
            report.insert_info(key.clone(), value.clone());
        }
    }
    for (module, field) in INFO_FIELDS {
        if let Some(value) = result[module].get(field) {
            report.insert_info(field, raw_value(value));
        }
    }
    for (module, field) in RATIO_FIELDS {
        report.insert_ratio(field, result[module].get(field).and_then(raw_number));
    }
    for (name, module, rows) in STATEMENTS {
        report.insert_statement(name, parse_statement(&result[module][rows]));
    }

    let esg = result["esgScores"]
        .as_object()
        .map(|scores| {
            scores
                .iter()
                .filter(|(key, _)| key.as_str() != "maxAge")
                .map(|(key, value)| (key.clone(), raw_value(value)))
                .filter(|(_, value)| matches!(value, Value::Number(_) | Value::String(_) | Value::Bool(_)))
                .collect::<std::collections::BTreeMap<_, _>>()
        })
        .filter(|scores| !scores.is_empty());
    report.esg = esg;

    if report.is_empty() {
        return Err(SourceError::not_found(format!(
            "yahoo fundamentals for {symbol} are empty"
        )));
    }
    Ok(report)
}

fn parse_statement(rows: &Value) -> StatementTable {
    let mut table = StatementTable::new();
    for row in rows.as_array().into_iter().flatten() {
        let Some(period) = period_label(&row["endDate"]) else {
            continue;
        };
        let items = row
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(key, _)| !matches!(key.as_str(), "endDate" | "maxAge"))
            .filter_map(|(key, value)| raw_number(value).map(|number| (key.clone(), number)))
            .collect::<std::collections::BTreeMap<_, _>>();
        if !items.is_empty() {
            table.insert(period, items);
        }
    }
    table
}

fn period_label(end_date: &Value) -> Option<String> {
    if let Some(label) = end_date.get("fmt").and_then(Value::as_str) {
        return Some(label.to_owned());
    }
    end_date
        .get("raw")
        .and_then(Value::as_i64)
        .and_then(UtcDateTime::from_unix_seconds)
        .map(|ts| ts.format_rfc3339().chars().take(10).collect())
}

/// Yahoo wraps numbers as `{"raw": .., "fmt": ..}`.
fn raw_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.get("raw").and_then(Value::as_f64))
}

fn raw_value(value: &Value) -> Value {
    value.get("raw").cloned().unwrap_or_else(|| value.clone())
}

fn describe_error(error: &Value) -> String {
    error
        .get("description")
        .and_then(Value::as_str)
        .or_else(|| error.get("code").and_then(Value::as_str))
        .map(str::to_owned)
        .unwrap_or_else(|| error.to_string())
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    news: Vec<SearchNews>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNews {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    publisher: Option<String>,
    #[serde(default)]
    provider_publish_time: Option<i64>,
}

fn parse_search_news(body: &str) -> Result<Vec<NewsItem>, SourceError> {
    let envelope: SearchEnvelope = parse_json(ProviderId::Yahoo, body)?;
    let items = envelope
        .news
        .into_iter()
        .filter_map(|item| {
            let title = item.title.filter(|title| !title.trim().is_empty())?;
            let link = item.link.filter(|link| !link.trim().is_empty())?;
            Some(NewsItem {
                title,
                link,
                publisher: item.publisher.unwrap_or_else(|| String::from("Unknown")),
                published_at: item.provider_publish_time.and_then(UtcDateTime::from_unix_seconds),
                source: ProviderId::Yahoo,
            })
        })
        .collect();
    Ok(items)
}
