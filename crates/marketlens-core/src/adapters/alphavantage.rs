use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use urlencoding::encode;

use super::{fetch_body, parse_json};
use crate::data_source::{
    CapabilitySet, DataSource, FundamentalsRequest, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest, DEFAULT_TIMEOUT_MS};
use crate::throttling::RequestBudget;
use crate::{FundamentalsReport, ProviderId, Quote, Symbol, UtcDateTime};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Free-tier allowance.
pub const DEFAULT_CALLS_PER_MINUTE: u32 = 5;

/// Overview fields copied verbatim into `company_info`.
const INFO_FIELDS: [&str; 9] = [
    "Name",
    "Description",
    "Exchange",
    "Currency",
    "Country",
    "Sector",
    "Industry",
    "FiscalYearEnd",
    "LatestQuarter",
];

/// Overview fields parsed as numbers into `company_info`.
const NUMERIC_INFO_FIELDS: [&str; 5] = [
    "MarketCapitalization",
    "SharesOutstanding",
    "RevenueTTM",
    "52WeekHigh",
    "52WeekLow",
];

/// Overview field -> ratio name shared with the Yahoo adapter.
const RATIO_FIELDS: [(&str, &str); 13] = [
    ("PERatio", "trailingPE"),
    ("ForwardPE", "forwardPE"),
    ("PriceToBookRatio", "priceToBook"),
    ("PEGRatio", "pegRatio"),
    ("PriceToSalesRatioTTM", "priceToSalesTrailing12Months"),
    ("EVToEBITDA", "enterpriseToEbitda"),
    ("EVToRevenue", "enterpriseToRevenue"),
    ("DividendYield", "dividendYield"),
    ("Beta", "beta"),
    ("ReturnOnEquityTTM", "returnOnEquity"),
    ("ReturnOnAssetsTTM", "returnOnAssets"),
    ("ProfitMargin", "profitMargins"),
    ("OperatingMarginTTM", "operatingMargins"),
];

/// Alpha Vantage adapter (quote, fundamentals). Requires an API key and
/// enforces the per-minute call budget locally.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    budget: RequestBudget,
    timeout_ms: u64,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            budget: RequestBudget::per_minute(DEFAULT_CALLS_PER_MINUTE),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_calls_per_minute(mut self, calls_per_minute: u32) -> Self {
        self.budget = RequestBudget::per_minute(calls_per_minute);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Alpha Vantage lists Indian equities under the BSE suffix.
    fn listing(symbol: &Symbol) -> String {
        format!("{}.BSE", symbol.base())
    }

    async fn call(&self, function: &str, listing: &str) -> Result<Value, SourceError> {
        if let Err(wait) = self.budget.try_acquire() {
            warn!(
                source = "alphavantage",
                wait_ms = wait.as_millis() as u64,
                "local call budget exhausted"
            );
            return Err(SourceError::quota_exhausted(format!(
                "alphavantage call budget exhausted; next slot in {} ms",
                wait.as_millis()
            )));
        }

        let url = format!(
            "{BASE_URL}?function={function}&symbol={}&apikey={}",
            encode(listing),
            encode(&self.api_key)
        );
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);
        let body = fetch_body(self.http_client.as_ref(), ProviderId::Alphavantage, request).await?;
        let payload: Value = parse_json(ProviderId::Alphavantage, &body)?;
        check_service_message(&payload)?;
        Ok(payload)
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let listing = Self::listing(&req.symbol);
        let payload = self.call("GLOBAL_QUOTE", &listing).await?;
        parse_global_quote(&listing, &payload)
    }

    async fn fetch_fundamentals(&self, req: FundamentalsRequest) -> Result<FundamentalsReport, SourceError> {
        let listing = Self::listing(&req.symbol);
        let payload = self.call("OVERVIEW", &listing).await?;
        parse_overview(req.symbol, &listing, &payload)
    }
}

impl DataSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Alphavantage
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(true, true, false)
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn fundamentals<'a>(&'a self, req: FundamentalsRequest) -> SourceFuture<'a, FundamentalsReport> {
        Box::pin(self.fetch_fundamentals(req))
    }
}

/// Alpha Vantage answers throttling and bad calls with HTTP 200 and a
/// message field instead of data.
fn check_service_message(payload: &Value) -> Result<(), SourceError> {
    if let Some(note) = payload
        .get("Note")
        .or_else(|| payload.get("Information"))
        .and_then(Value::as_str)
    {
        return Err(SourceError::rate_limited(format!(
            "alphavantage limit reached: {note}"
        )));
    }
    if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
        return Err(SourceError::invalid_request(format!(
            "alphavantage rejected the request: {message}"
        )));
    }
    Ok(())
}

fn parse_global_quote(listing: &str, payload: &Value) -> Result<Quote, SourceError> {
    let fields = payload
        .get("Global Quote")
        .and_then(Value::as_object)
        .filter(|fields| !fields.is_empty())
        .ok_or_else(|| SourceError::not_found(format!("alphavantage has no quote for {listing}")))?;

    let field = |name: &str| fields.get(name).and_then(Value::as_str);
    let number = |name: &str| field(name).and_then(parse_number);

    let price = number("05. price").ok_or_else(|| {
        SourceError::malformed(format!("alphavantage quote for {listing} has no usable price"))
    })?;
    let volume = field("06. volume").and_then(|raw| raw.trim().parse::<u64>().ok());
    let timestamp = field("07. latest trading day").and_then(UtcDateTime::from_trading_day);
    let symbol = Symbol::parse(listing)?;

    Quote::new(
        symbol,
        price,
        number("08. previous close").unwrap_or(0.0),
        number("03. high"),
        number("04. low"),
        volume,
        timestamp,
        ProviderId::Alphavantage,
    )
    .map_err(|error| SourceError::malformed(error.to_string()))
}

fn parse_overview(symbol: Symbol, listing: &str, payload: &Value) -> Result<FundamentalsReport, SourceError> {
    let fields = payload
        .as_object()
        .filter(|fields| fields.contains_key("Symbol"))
        .ok_or_else(|| {
            SourceError::not_found(format!("alphavantage has no overview for {listing}"))
        })?;
    let text = |name: &str| {
        fields
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !matches!(*value, "" | "None" | "-"))
    };

    let mut report = FundamentalsReport::new(symbol, ProviderId::Alphavantage);
    for name in INFO_FIELDS {
        if let Some(value) = text(name) {
            report.insert_info(name, Value::from(value));
        }
    }
    for name in NUMERIC_INFO_FIELDS {
        if let Some(value) = text(name).and_then(parse_number) {
            report.insert_info(name, Value::from(value));
        }
    }
    for (field, ratio) in RATIO_FIELDS {
        report.insert_ratio(ratio, text(field).and_then(parse_number));
    }

    if report.is_empty() {
        return Err(SourceError::not_found(format!(
            "alphavantage overview for {listing} is empty"
        )));
    }
    Ok(report)
}

/// Parses numeric strings, tolerating a trailing `%`.
fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::testing::ScriptedHttpClient;
    use crate::http_client::HttpResponse;

    const GLOBAL_QUOTE: &str = r#"{"Global Quote":{
        "01. symbol":"RELIANCE.BSE","02. open":"2455.00","03. high":"2510.50","04. low":"2440.00",
        "05. price":"2500.0000","06. volume":"123456","07. latest trading day":"2024-05-31",
        "08. previous close":"2450.0000","09. change":"50.0000","10. change percent":"2.0408%"}}"#;

    fn request(symbol: &str) -> QuoteRequest {
        QuoteRequest::new(Symbol::parse(symbol).expect("valid symbol"))
    }

    #[tokio::test]
    async fn quote_maps_global_quote_fields() {
        // Given: a GLOBAL_QUOTE payload
        let client = ScriptedHttpClient::new();
        client.respond("GLOBAL_QUOTE", Ok(HttpResponse::ok(GLOBAL_QUOTE)));
        let adapter = AlphaVantageAdapter::new(client.clone(), "secret");

        // When: quoting an NSE-qualified symbol
        let quote = adapter.quote(request("RELIANCE.NS")).await.expect("quote");

        // Then: the BSE listing is requested and fields are converted
        let url = &client.requests()[0];
        assert!(url.contains("symbol=RELIANCE.BSE"));
        assert!(url.contains("apikey=secret"));
        assert_eq!(quote.symbol.as_str(), "RELIANCE.BSE");
        assert_eq!(quote.price, 2500.0);
        assert_eq!(quote.previous_close, 2450.0);
        assert_eq!(quote.change, 50.0);
        assert_eq!(quote.change_percent, 2.04);
        assert_eq!(quote.day_high, Some(2510.5));
        assert_eq!(quote.volume, Some(123_456));
        assert_eq!(
            quote.timestamp.map(UtcDateTime::format_rfc3339).as_deref(),
            Some("2024-05-31T00:00:00Z")
        );
    }

    #[tokio::test]
    async fn throttle_note_is_rate_limited() {
        let client = ScriptedHttpClient::new();
        client.respond(
            "GLOBAL_QUOTE",
            Ok(HttpResponse::ok(
                r#"{"Note":"Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
            )),
        );

        let error = AlphaVantageAdapter::new(client, "secret")
            .quote(request("TCS"))
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
        assert!(error.retryable());
    }

    #[tokio::test]
    async fn missing_global_quote_is_not_found() {
        let client = ScriptedHttpClient::new();
        client.respond("GLOBAL_QUOTE", Ok(HttpResponse::ok(r#"{"Global Quote":{}}"#)));

        let error = AlphaVantageAdapter::new(client, "secret")
            .quote(request("NOPE"))
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), SourceErrorKind::NotFound);
    }

    #[tokio::test]
    async fn error_message_is_terminal() {
        let client = ScriptedHttpClient::new();
        client.respond(
            "GLOBAL_QUOTE",
            Ok(HttpResponse::ok(r#"{"Error Message":"Invalid API call."}"#)),
        );

        let error = AlphaVantageAdapter::new(client, "secret")
            .quote(request("TCS"))
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), SourceErrorKind::InvalidRequest);
        assert!(!error.retryable());
    }

    #[tokio::test]
    async fn exhausted_budget_skips_the_network() {
        // Given: a budget of one call per minute
        let client = ScriptedHttpClient::new();
        client.respond("GLOBAL_QUOTE", Ok(HttpResponse::ok(GLOBAL_QUOTE)));
        let adapter = AlphaVantageAdapter::new(client.clone(), "secret").with_calls_per_minute(1);

        // When: calling twice
        adapter.quote(request("RELIANCE")).await.expect("first call");
        let error = adapter.quote(request("RELIANCE")).await.expect_err("over budget");

        // Then: the second call never reaches the transport and is not retried
        assert_eq!(error.kind(), SourceErrorKind::QuotaExhausted);
        assert!(!error.retryable());
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn overview_maps_ratios_and_skips_placeholders() {
        let client = ScriptedHttpClient::new();
        client.respond(
            "OVERVIEW",
            Ok(HttpResponse::ok(
                r#"{"Symbol":"INFY.BSE","Name":"Infosys Ltd","Sector":"TECHNOLOGY","Industry":"None",
                    "MarketCapitalization":"6500000000000","PERatio":"24.3","PEGRatio":"None",
                    "DividendYield":"0.027","Beta":"-"}"#,
            )),
        );

        let report = AlphaVantageAdapter::new(client, "secret")
            .fundamentals(FundamentalsRequest::new(Symbol::parse("INFY").expect("valid")))
            .await
            .expect("overview");

        assert_eq!(report.ticker.as_str(), "INFY");
        assert_eq!(report.company_info.get("Name"), Some(&Value::from("Infosys Ltd")));
        assert!(!report.company_info.contains_key("Industry"));
        assert_eq!(
            report.company_info.get("MarketCapitalization"),
            Some(&Value::from(6.5e12))
        );
        assert_eq!(report.valuation_ratios.get("trailingPE"), Some(&24.3));
        assert_eq!(report.valuation_ratios.get("dividendYield"), Some(&0.027));
        assert!(!report.valuation_ratios.contains_key("pegRatio"));
        assert!(!report.valuation_ratios.contains_key("beta"));
        assert!(report.financial_statements.is_empty());
    }

    #[tokio::test]
    async fn empty_overview_is_not_found() {
        let client = ScriptedHttpClient::new();
        client.respond("OVERVIEW", Ok(HttpResponse::ok("{}")));

        let error = AlphaVantageAdapter::new(client, "secret")
            .fundamentals(FundamentalsRequest::new(Symbol::parse("NOPE").expect("valid")))
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), SourceErrorKind::NotFound);
    }
}
