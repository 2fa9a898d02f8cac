//! Contract checks run against every production adapter over canned HTTP.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use marketlens_core::{
    AlphaVantageAdapter, Capability, DataSource, FundamentalsRequest, GoogleNewsAdapter,
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, NewsRequest, ProviderId,
    QuoteRequest, SourceErrorKind, Symbol, YahooAdapter,
};

const YAHOO_CHART: &str = r#"{"chart":{"result":[{"meta":{
    "symbol":"RELIANCE.NS","regularMarketPrice":2500.0,"previousClose":2450.0,
    "regularMarketDayHigh":2510.5,"regularMarketDayLow":2440.0,
    "regularMarketVolume":5234123,"regularMarketTime":1717142400}}],"error":null}}"#;

const YAHOO_SUMMARY: &str = r#"{"quoteSummary":{"result":[{
    "assetProfile":{"sector":"Energy","industry":"Oil & Gas Refining & Marketing"},
    "summaryDetail":{"trailingPE":{"raw":28.1,"fmt":"28.10"},"beta":{"raw":0.6}}
}],"error":null}}"#;

const YAHOO_SEARCH: &str = r#"{"news":[
    {"title":"Reliance Jio tariff hike","link":"https://news.example.test/jio","publisher":"Mint","providerPublishTime":1717142400},
    {"title":"Reliance retail expansion","link":"https://news.example.test/retail","publisher":"ET","providerPublishTime":1717056000}
]}"#;

const ALPHA_GLOBAL_QUOTE: &str = r#"{"Global Quote":{
    "01. symbol":"RELIANCE.BSE","02. open":"2455.00","03. high":"2510.50","04. low":"2440.00",
    "05. price":"2500.0000","06. volume":"123456","07. latest trading day":"2024-05-31",
    "08. previous close":"2450.0000","09. change":"50.0000","10. change percent":"2.0408%"}}"#;

const ALPHA_OVERVIEW: &str = r#"{"Symbol":"RELIANCE.BSE","Name":"Reliance Industries Ltd",
    "Sector":"ENERGY","Industry":"None","PERatio":"28.1","Beta":"0.6","DividendYield":"0.0035"}"#;

const GOOGLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <item>
    <title>Reliance shares climb after AGM</title>
    <link>https://news.example.test/agm</link>
    <pubDate>Fri, 31 May 2024 06:00:00 GMT</pubDate>
    <source url="https://mint.example.test">Mint</source>
  </item>
</channel></rss>"#;

/// Answers by URL substring; unmatched URLs get `fallback`.
struct CannedHttpClient {
    routes: Vec<(&'static str, HttpResponse)>,
    fallback: Result<HttpResponse, HttpError>,
    requests: Mutex<Vec<String>>,
}

impl CannedHttpClient {
    fn new(routes: Vec<(&'static str, HttpResponse)>) -> Arc<Self> {
        Arc::new(Self {
            routes,
            fallback: Ok(HttpResponse::new(404, "not scripted")),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(fallback: Result<HttpResponse, HttpError>) -> Arc<Self> {
        Arc::new(Self {
            routes: Vec::new(),
            fallback,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.url.clone());
        let response = self
            .routes
            .iter()
            .find(|(pattern, _)| request.url.contains(pattern))
            .map(|(_, response)| Ok(response.clone()))
            .unwrap_or_else(|| self.fallback.clone());
        Box::pin(async move { response })
    }
}

struct ProviderCase {
    id: ProviderId,
    source: Arc<dyn DataSource>,
    supports_quote: bool,
    supports_fundamentals: bool,
    supports_news: bool,
}

fn adapter(id: ProviderId, http_client: Arc<CannedHttpClient>) -> Arc<dyn DataSource> {
    match id {
        ProviderId::Yahoo => Arc::new(YahooAdapter::new(http_client)),
        ProviderId::Alphavantage => Arc::new(AlphaVantageAdapter::new(http_client, "contract-key")),
        ProviderId::Googlenews => Arc::new(GoogleNewsAdapter::new(http_client)),
    }
}

fn provider_cases() -> Vec<ProviderCase> {
    let yahoo = CannedHttpClient::new(vec![
        ("v8/finance/chart", HttpResponse::ok(YAHOO_CHART)),
        ("getcrumb", HttpResponse::ok("contract-crumb")),
        ("quoteSummary", HttpResponse::ok(YAHOO_SUMMARY)),
        ("v1/finance/search", HttpResponse::ok(YAHOO_SEARCH)),
    ]);
    let alpha = CannedHttpClient::new(vec![
        ("GLOBAL_QUOTE", HttpResponse::ok(ALPHA_GLOBAL_QUOTE)),
        ("OVERVIEW", HttpResponse::ok(ALPHA_OVERVIEW)),
    ]);
    let google = CannedHttpClient::new(vec![("rss/search", HttpResponse::ok(GOOGLE_FEED))]);

    vec![
        ProviderCase {
            id: ProviderId::Yahoo,
            source: adapter(ProviderId::Yahoo, yahoo),
            supports_quote: true,
            supports_fundamentals: true,
            supports_news: true,
        },
        ProviderCase {
            id: ProviderId::Alphavantage,
            source: adapter(ProviderId::Alphavantage, alpha),
            supports_quote: true,
            supports_fundamentals: true,
            supports_news: false,
        },
        ProviderCase {
            id: ProviderId::Googlenews,
            source: adapter(ProviderId::Googlenews, google),
            supports_quote: false,
            supports_fundamentals: false,
            supports_news: true,
        },
    ]
}

fn symbol() -> Symbol {
    Symbol::parse("RELIANCE").expect("valid symbol")
}

fn news_request() -> NewsRequest {
    NewsRequest::new(symbol(), "Reliance Industries", None, 10).expect("valid news request")
}

#[tokio::test]
async fn advertised_capabilities_match_each_provider() {
    for case in provider_cases() {
        let capabilities = case.source.capabilities();
        assert_eq!(case.source.id(), case.id);
        assert_eq!(
            capabilities.supports(Capability::Quote),
            case.supports_quote,
            "provider '{}': quote",
            case.id
        );
        assert_eq!(
            capabilities.supports(Capability::Fundamentals),
            case.supports_fundamentals,
            "provider '{}': fundamentals",
            case.id
        );
        assert_eq!(
            capabilities.supports(Capability::News),
            case.supports_news,
            "provider '{}': news",
            case.id
        );
    }
}

#[tokio::test]
async fn quote_returns_valid_structure_for_quoting_providers() {
    for case in provider_cases().into_iter().filter(|case| case.supports_quote) {
        let quote = case
            .source
            .quote(QuoteRequest::new(symbol()))
            .await
            .unwrap_or_else(|error| panic!("provider '{}' quote failed: {error}", case.id));

        assert_eq!(quote.source, case.id, "provider '{}': source", case.id);
        assert_eq!(quote.price, 2500.0, "provider '{}': price", case.id);
        assert_eq!(quote.previous_close, 2450.0, "provider '{}': previous close", case.id);
        assert_eq!(quote.change, 50.0, "provider '{}': change", case.id);
        assert_eq!(quote.change_percent, 2.04, "provider '{}': change percent", case.id);
        assert!(quote.timestamp.is_some(), "provider '{}': timestamp", case.id);
        assert!(
            quote.symbol.as_str().starts_with("RELIANCE."),
            "provider '{}': listing symbol",
            case.id
        );
    }
}

#[tokio::test]
async fn fundamentals_carry_ratios_for_supporting_providers() {
    for case in provider_cases()
        .into_iter()
        .filter(|case| case.supports_fundamentals)
    {
        let report = case
            .source
            .fundamentals(FundamentalsRequest::new(symbol()))
            .await
            .unwrap_or_else(|error| panic!("provider '{}' fundamentals failed: {error}", case.id));

        assert_eq!(report.source, case.id, "provider '{}': source", case.id);
        assert!(!report.is_empty(), "provider '{}': empty report", case.id);
        assert_eq!(
            report.valuation_ratios.get("trailingPE"),
            Some(&28.1),
            "provider '{}': trailing P/E",
            case.id
        );
        assert_eq!(
            report.valuation_ratios.get("beta"),
            Some(&0.6),
            "provider '{}': beta",
            case.id
        );
    }
}

#[tokio::test]
async fn news_items_have_title_link_and_source() {
    for case in provider_cases().into_iter().filter(|case| case.supports_news) {
        let items = case
            .source
            .news(news_request())
            .await
            .unwrap_or_else(|error| panic!("provider '{}' news failed: {error}", case.id));

        assert!(!items.is_empty(), "provider '{}': no items", case.id);
        for item in &items {
            assert!(!item.title.is_empty(), "provider '{}': title", case.id);
            assert!(item.link.starts_with("https://"), "provider '{}': link", case.id);
            assert!(!item.publisher.is_empty(), "provider '{}': publisher", case.id);
            assert_eq!(item.source, case.id, "provider '{}': source", case.id);
        }
    }
}

#[tokio::test]
async fn unsupported_capabilities_return_expected_error() {
    for case in provider_cases() {
        if !case.supports_quote {
            let error = case
                .source
                .quote(QuoteRequest::new(symbol()))
                .await
                .expect_err("quote is unsupported");
            assert_eq!(
                error.kind(),
                SourceErrorKind::UnsupportedCapability,
                "provider '{}': quote",
                case.id
            );
        }
        if !case.supports_fundamentals {
            let error = case
                .source
                .fundamentals(FundamentalsRequest::new(symbol()))
                .await
                .expect_err("fundamentals are unsupported");
            assert_eq!(
                error.kind(),
                SourceErrorKind::UnsupportedCapability,
                "provider '{}': fundamentals",
                case.id
            );
        }
        if !case.supports_news {
            let error = case
                .source
                .news(news_request())
                .await
                .expect_err("news is unsupported");
            assert_eq!(
                error.kind(),
                SourceErrorKind::UnsupportedCapability,
                "provider '{}': news",
                case.id
            );
        }
    }
}

#[tokio::test]
async fn upstream_outages_are_retryable_for_every_provider() {
    let failures = [
        Ok(HttpResponse::new(503, "service unavailable")),
        Ok(HttpResponse::new(429, "too many requests")),
        Err(HttpError::timeout("deadline elapsed")),
        Err(HttpError::new(HttpErrorKind::Connect, "connection refused")),
    ];

    for failure in failures {
        for id in ProviderId::ALL {
            let source = adapter(id, CannedHttpClient::failing(failure.clone()));
            let capabilities = source.capabilities();

            let mut errors = Vec::new();
            if capabilities.supports(Capability::Quote) {
                errors.push(
                    source
                        .quote(QuoteRequest::new(symbol()))
                        .await
                        .expect_err("outage must fail"),
                );
            }
            if capabilities.supports(Capability::News) {
                errors.push(source.news(news_request()).await.expect_err("outage must fail"));
            }

            assert!(!errors.is_empty(), "provider '{id}' exercised nothing");
            for error in errors {
                assert!(
                    error.retryable(),
                    "provider '{id}': {:?} should be retryable",
                    error.kind()
                );
            }
        }
    }
}

#[tokio::test]
async fn rejected_credentials_are_terminal() {
    for id in [ProviderId::Yahoo, ProviderId::Alphavantage] {
        let source = adapter(
            id,
            CannedHttpClient::failing(Ok(HttpResponse::new(401, "unauthorized"))),
        );

        let error = source
            .quote(QuoteRequest::new(symbol()))
            .await
            .expect_err("401 must fail");

        assert_eq!(error.kind(), SourceErrorKind::Unauthorized, "provider '{id}'");
        assert!(!error.retryable(), "provider '{id}'");
    }
}

#[tokio::test]
async fn listing_symbols_follow_each_provider_convention() {
    let yahoo_http = CannedHttpClient::new(vec![("v8/finance/chart", HttpResponse::ok(YAHOO_CHART))]);
    let alpha_http =
        CannedHttpClient::new(vec![("GLOBAL_QUOTE", HttpResponse::ok(ALPHA_GLOBAL_QUOTE))]);

    adapter(ProviderId::Yahoo, yahoo_http.clone())
        .quote(QuoteRequest::new(symbol()))
        .await
        .expect("yahoo quote");
    adapter(ProviderId::Alphavantage, alpha_http.clone())
        .quote(QuoteRequest::new(symbol()))
        .await
        .expect("alphavantage quote");

    assert!(yahoo_http.requests()[0].contains("/chart/RELIANCE.NS?"));
    assert!(alpha_http.requests()[0].contains("symbol=RELIANCE.BSE"));
}
