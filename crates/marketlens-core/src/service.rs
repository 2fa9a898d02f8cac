//! Capability-level entry points: cache in front of the source router.

use std::sync::Arc;

use crate::adapters::{AlphaVantageAdapter, GoogleNewsAdapter, YahooAdapter};
use crate::cache::{CacheKey, RequestCache};
use crate::config::{NewsMode, Settings, ALPHAVANTAGE_KEY_ENV};
use crate::data_source::{DataSource, FundamentalsRequest, NewsRequest, QuoteRequest};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::routing::SourceRouter;
use crate::{
    arrange_news, Capability, ConfigError, FetchOutcome, FundamentalsReport, NewsItem, ProviderId,
    Quote, Symbol,
};

struct ServiceInner {
    settings: Settings,
    router: SourceRouter,
    quotes: RequestCache<Quote>,
    fundamentals: RequestCache<FundamentalsReport>,
    news: RequestCache<Vec<NewsItem>>,
}

/// Cached, fallback-aware access to every capability.
///
/// Cloning is cheap; clones share the router and caches.
#[derive(Clone)]
pub struct MarketDataService {
    inner: Arc<ServiceInner>,
}

impl MarketDataService {
    /// Wraps an existing router. Every provider named by the settings must
    /// be registered with it.
    pub fn new(settings: Settings, router: SourceRouter) -> Result<Self, ConfigError> {
        if let Some(provider) = settings
            .providers
            .referenced()
            .into_iter()
            .find(|provider| !router.is_registered(*provider))
        {
            return Err(ConfigError::AdapterNotRegistered { provider });
        }

        Ok(Self {
            inner: Arc::new(ServiceInner {
                settings,
                router,
                quotes: RequestCache::new(),
                fundamentals: RequestCache::new(),
                news: RequestCache::new(),
            }),
        })
    }

    /// Validates `settings` and builds the production adapters over reqwest.
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        Self::with_http_client(settings, Arc::new(ReqwestHttpClient::new()))
    }

    /// Validates `settings` and builds the adapters it references over
    /// `http_client`.
    pub fn with_http_client(settings: Settings, http_client: Arc<dyn HttpClient>) -> Result<Self, ConfigError> {
        settings.validate()?;

        let timeout_ms = settings.http.timeout_ms;
        let mut adapters: Vec<Arc<dyn DataSource>> = Vec::new();
        for provider in settings.providers.referenced() {
            let adapter: Arc<dyn DataSource> = match provider {
                ProviderId::Yahoo => Arc::new(
                    YahooAdapter::new(Arc::clone(&http_client))
                        .with_exchange_suffix(settings.exchange_suffix())
                        .with_timeout_ms(timeout_ms),
                ),
                ProviderId::Alphavantage => {
                    let api_key = settings.credentials.alphavantage_api_key().ok_or(
                        ConfigError::MissingCredential {
                            provider,
                            env_var: ALPHAVANTAGE_KEY_ENV,
                        },
                    )?;
                    Arc::new(
                        AlphaVantageAdapter::new(Arc::clone(&http_client), api_key)
                            .with_timeout_ms(timeout_ms),
                    )
                }
                ProviderId::Googlenews => Arc::new(
                    GoogleNewsAdapter::new(Arc::clone(&http_client)).with_timeout_ms(timeout_ms),
                ),
            };
            adapters.push(adapter);
        }

        let router = SourceRouter::new(adapters, settings.retry.policy());
        Self::new(settings, router)
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn router(&self) -> &SourceRouter {
        &self.inner.router
    }

    pub fn chain(&self, capability: Capability) -> &[ProviderId] {
        self.inner.settings.providers.chain(capability)
    }

    /// Latest quote, served from cache while fresh.
    pub async fn quote(&self, req: QuoteRequest) -> FetchOutcome<Quote> {
        let inner = &self.inner;
        let key = CacheKey::new(Capability::Quote, self.listing(&req.symbol), "");
        let ttl = inner.settings.cache.ttl(Capability::Quote);

        inner
            .quotes
            .get_or_fetch(key, ttl, || async {
                inner
                    .router
                    .resolve(Capability::Quote, self.chain(Capability::Quote), |source| {
                        source.quote(req.clone())
                    })
                    .await
            })
            .await
    }

    /// Company fundamentals, served from cache while fresh.
    pub async fn fundamentals(&self, req: FundamentalsRequest) -> FetchOutcome<FundamentalsReport> {
        let inner = &self.inner;
        let key = CacheKey::new(Capability::Fundamentals, self.listing(&req.symbol), "");
        let ttl = inner.settings.cache.ttl(Capability::Fundamentals);

        inner
            .fundamentals
            .get_or_fetch(key, ttl, || async {
                inner
                    .router
                    .resolve(
                        Capability::Fundamentals,
                        self.chain(Capability::Fundamentals),
                        |source| source.fundamentals(req.clone()),
                    )
                    .await
            })
            .await
    }

    /// News items, newest first, deduplicated by link and capped at
    /// `max_items`. In merge mode every news provider contributes.
    pub async fn news(&self, req: NewsRequest) -> FetchOutcome<Vec<NewsItem>> {
        let inner = &self.inner;
        let key = CacheKey::new(Capability::News, self.listing(&req.symbol), req.fingerprint());
        let ttl = inner.settings.cache.ttl(Capability::News);
        let max_items = req.max_items;

        inner
            .news
            .get_or_fetch(key, ttl, || async {
                let chain = self.chain(Capability::News);
                let outcome = match inner.settings.news_mode {
                    NewsMode::Merge => {
                        inner
                            .router
                            .gather(Capability::News, chain, |source| source.news(req.clone()))
                            .await
                    }
                    NewsMode::Fallback => {
                        inner
                            .router
                            .resolve(Capability::News, chain, |source| source.news(req.clone()))
                            .await
                    }
                };
                outcome.map(|items| arrange_news(items, max_items))
            })
            .await
    }

    /// Drops expired cache entries across all capabilities.
    pub fn purge_expired(&self) -> usize {
        self.inner.quotes.purge_expired()
            + self.inner.fundamentals.purge_expired()
            + self.inner.news.purge_expired()
    }

    pub fn clear_caches(&self) {
        self.inner.quotes.clear();
        self.inner.fundamentals.clear();
        self.inner.news.clear();
    }

    fn listing(&self, symbol: &Symbol) -> Symbol {
        symbol.with_exchange(&self.inner.settings.exchange_suffix())
    }
}
