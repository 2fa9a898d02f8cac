//! Scripted providers shared by the workspace behavior tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use marketlens_core::{
    Capability, CapabilitySet, DataSource, FundamentalsReport, FundamentalsRequest,
    MarketDataService, NewsItem, NewsRequest, ProviderId, Quote, QuoteRequest, RetryPolicy,
    Settings, SourceError, SourceFuture, SourceRouter, Symbol, UtcDateTime,
};
use serde_json::Value;

/// What a scripted provider does on one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Succeed,
    Fail(SourceError),
    /// Succeeds after sleeping on the tokio clock.
    Delay(Duration),
    Panic,
}

/// Provider fake driven by per-capability reply queues. The last reply of a
/// queue repeats once it drains; an unscripted capability succeeds.
pub struct ScriptedSource {
    id: ProviderId,
    capabilities: CapabilitySet,
    price: f64,
    headlines: Vec<(String, i64)>,
    replies: Mutex<HashMap<Capability, VecDeque<Reply>>>,
    calls: Mutex<HashMap<Capability, u32>>,
}

impl ScriptedSource {
    pub fn new(id: ProviderId, capabilities: CapabilitySet) -> Self {
        Self {
            id,
            capabilities,
            price: 100.0,
            headlines: Vec::new(),
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn yahoo() -> Self {
        Self::new(ProviderId::Yahoo, CapabilitySet::full())
    }

    pub fn alphavantage() -> Self {
        Self::new(ProviderId::Alphavantage, CapabilitySet::new(true, true, false))
    }

    pub fn googlenews() -> Self {
        Self::new(ProviderId::Googlenews, CapabilitySet::news_only())
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = price;
        self
    }

    /// Headlines as `(link, unix seconds)` pairs.
    pub fn with_headlines(mut self, headlines: &[(&str, i64)]) -> Self {
        self.headlines = headlines
            .iter()
            .map(|(link, published)| ((*link).to_owned(), *published))
            .collect();
        self
    }

    pub fn script(self, capability: Capability, replies: Vec<Reply>) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(capability, VecDeque::from(replies));
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self, capability: Capability) -> u32 {
        self.calls
            .lock()
            .expect("calls lock")
            .get(&capability)
            .copied()
            .unwrap_or_default()
    }

    fn next_reply(&self, capability: Capability) -> Reply {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(capability)
            .or_default() += 1;

        let mut replies = self.replies.lock().expect("replies lock");
        match replies.get_mut(&capability) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Reply::Succeed),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Succeed),
            None => Reply::Succeed,
        }
    }

    fn play<'a, T: Send + 'a>(&self, reply: Reply, value: T) -> SourceFuture<'a, T> {
        Box::pin(async move {
            match reply {
                Reply::Succeed => Ok(value),
                Reply::Fail(error) => Err(error),
                Reply::Delay(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(value)
                }
                Reply::Panic => panic!("scripted provider crashed"),
            }
        })
    }
}

impl DataSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        let reply = self.next_reply(Capability::Quote);
        let previous_close = self.price * 0.98;
        let quote = Quote::new(
            req.symbol,
            self.price,
            previous_close,
            None,
            None,
            Some(1_000),
            None,
            self.id,
        )
        .expect("scripted quote is valid");
        self.play(reply, quote)
    }

    fn fundamentals<'a>(&'a self, req: FundamentalsRequest) -> SourceFuture<'a, FundamentalsReport> {
        let reply = self.next_reply(Capability::Fundamentals);
        let mut report = FundamentalsReport::new(req.symbol, self.id);
        report.insert_info("sector", Value::from("Energy"));
        report.insert_ratio("trailingPE", Some(24.5));
        self.play(reply, report)
    }

    fn news<'a>(&'a self, _req: NewsRequest) -> SourceFuture<'a, Vec<NewsItem>> {
        let reply = self.next_reply(Capability::News);
        let items = self
            .headlines
            .iter()
            .map(|(link, published)| NewsItem {
                title: format!("Headline {link}"),
                link: link.clone(),
                publisher: String::from("Wire"),
                published_at: UtcDateTime::from_unix_seconds(*published),
                source: self.id,
            })
            .collect::<Vec<_>>();
        self.play(reply, items)
    }
}

pub fn symbol(value: &str) -> Symbol {
    Symbol::parse(value).expect("valid symbol")
}

/// Default chains with a credential present, so AlphaVantage may be listed.
pub fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.credentials.alphavantage_api_key = Some(String::from("test-key"));
    settings
}

pub fn service_with(
    settings: Settings,
    retry: RetryPolicy,
    sources: &[Arc<ScriptedSource>],
) -> MarketDataService {
    let adapters = sources
        .iter()
        .map(|source| Arc::clone(source) as Arc<dyn DataSource>)
        .collect();
    MarketDataService::new(settings, SourceRouter::new(adapters, retry))
        .expect("every configured provider is registered")
}

pub fn service(sources: &[Arc<ScriptedSource>]) -> MarketDataService {
    service_with(settings(), RetryPolicy::no_retry(), sources)
}
