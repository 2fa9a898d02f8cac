//! Process configuration.
//!
//! Settings are resolved once at startup: `.env` (via `dotenvy`), then an
//! optional TOML file, then `MARKETLENS_*` environment overrides. The result
//! is validated and treated as immutable afterwards.

use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data_source::CapabilitySet;
use crate::retry::RetryPolicy;
use crate::{Capability, ConfigError, ProviderId, ValidationError};

/// Environment variable naming the TOML config file.
pub const CONFIG_PATH_ENV: &str = "MARKETLENS_CONFIG";
/// Primary variable for the Alpha Vantage key.
pub const ALPHAVANTAGE_KEY_ENV: &str = "MARKETLENS_ALPHAVANTAGE_API_KEY";
const ALPHAVANTAGE_KEY_FALLBACK_ENV: &str = "ALPHAVANTAGE_API_KEY";

const SUPPORTED_SUFFIXES: [&str; 2] = ["NS", "BO"];

/// How news providers are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsMode {
    /// Query every provider and merge the results.
    #[default]
    Merge,
    /// Stop at the first provider that succeeds.
    Fallback,
}

impl NewsMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Fallback => "fallback",
        }
    }
}

impl FromStr for NewsMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "merge" => Ok(Self::Merge),
            "fallback" => Ok(Self::Fallback),
            other => Err(format!("expected merge or fallback, got '{other}'")),
        }
    }
}

/// Provider priority chains per capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub quote: Vec<ProviderId>,
    pub fundamentals: Vec<ProviderId>,
    pub news: Vec<ProviderId>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            quote: vec![ProviderId::Yahoo, ProviderId::Alphavantage],
            fundamentals: vec![ProviderId::Yahoo, ProviderId::Alphavantage],
            news: vec![ProviderId::Yahoo, ProviderId::Googlenews],
        }
    }
}

impl ProviderSettings {
    pub fn chain(&self, capability: Capability) -> &[ProviderId] {
        match capability {
            Capability::Quote => &self.quote,
            Capability::Fundamentals => &self.fundamentals,
            Capability::News => &self.news,
        }
    }

    fn chain_mut(&mut self, capability: Capability) -> &mut Vec<ProviderId> {
        match capability {
            Capability::Quote => &mut self.quote,
            Capability::Fundamentals => &mut self.fundamentals,
            Capability::News => &mut self.news,
        }
    }

    /// Every provider named by any chain, in first-seen order.
    pub fn referenced(&self) -> Vec<ProviderId> {
        self.chain_union(&Capability::ALL)
    }

    /// Providers named by the chains of `capabilities`, in first-seen order.
    pub fn chain_union(&self, capabilities: &[Capability]) -> Vec<ProviderId> {
        ProviderId::unique(
            capabilities
                .iter()
                .flat_map(|capability| self.chain(*capability).iter().copied()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4_000,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.jitter,
        )
    }
}

/// Cache TTLs in seconds; zero disables caching for that capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub quote_ttl_secs: u64,
    pub fundamentals_ttl_secs: u64,
    pub news_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            quote_ttl_secs: 15,
            fundamentals_ttl_secs: 3_600,
            news_ttl_secs: 600,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self, capability: Capability) -> Duration {
        let secs = match capability {
            Capability::Quote => self.quote_ttl_secs,
            Capability::Fundamentals => self.fundamentals_ttl_secs,
            Capability::News => self.news_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    /// All caching off.
    pub fn disabled() -> Self {
        Self {
            quote_ttl_secs: 0,
            fundamentals_ttl_secs: 0,
            news_ttl_secs: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_ms: crate::http_client::DEFAULT_TIMEOUT_MS,
        }
    }
}

/// Provider credentials. Never printed.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alphavantage_api_key: Option<String>,
}

impl Credentials {
    pub fn alphavantage_api_key(&self) -> Option<&str> {
        self.alphavantage_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn has_credential(&self, provider: ProviderId) -> bool {
        match provider {
            ProviderId::Alphavantage => self.alphavantage_api_key().is_some(),
            ProviderId::Yahoo | ProviderId::Googlenews => true,
        }
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let redacted = self.alphavantage_api_key.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("alphavantage_api_key", &redacted)
            .finish()
    }
}

/// Validated runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub providers: ProviderSettings,
    pub news_mode: NewsMode,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub report_deadline_ms: u64,
    pub http: HttpSettings,
    pub default_exchange_suffix: String,
    pub credentials: Credentials,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            providers: ProviderSettings::default(),
            news_mode: NewsMode::default(),
            retry: RetrySettings::default(),
            cache: CacheSettings::default(),
            report_deadline_ms: 30_000,
            http: HttpSettings::default(),
            default_exchange_suffix: String::from("NS"),
            credentials: Credentials::default(),
        }
    }
}

impl Settings {
    /// Loads settings from `.env`, the optional TOML file (`path` or
    /// `MARKETLENS_CONFIG`) and the process environment, then validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        Self::load_with(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Same as [`Settings::load`] with an explicit environment lookup and no
    /// `.env` processing.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(lookup)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let label = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: label.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: label,
            source,
        })
    }

    /// Applies `MARKETLENS_*` overrides on top of the current values.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup(ALPHAVANTAGE_KEY_ENV).or_else(|| lookup(ALPHAVANTAGE_KEY_FALLBACK_ENV)) {
            self.credentials.alphavantage_api_key = Some(key.trim().to_owned());
        }

        for (capability, key) in [
            (Capability::Quote, "MARKETLENS_QUOTE_PROVIDERS"),
            (Capability::Fundamentals, "MARKETLENS_FUNDAMENTALS_PROVIDERS"),
            (Capability::News, "MARKETLENS_NEWS_PROVIDERS"),
        ] {
            if let Some(raw) = lookup(key) {
                *self.providers.chain_mut(capability) = parse_provider_list(&raw)?;
            }
        }

        if let Some(raw) = lookup("MARKETLENS_NEWS_MODE") {
            self.news_mode = raw.parse().map_err(|reason| ConfigError::InvalidSetting {
                field: "news_mode",
                reason,
            })?;
        }
        if let Some(raw) = lookup("MARKETLENS_RETRY_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_number("retry.max_attempts", &raw)?;
        }
        if let Some(raw) = lookup("MARKETLENS_REPORT_DEADLINE_MS") {
            self.report_deadline_ms = parse_number("report_deadline_ms", &raw)?;
        }
        if let Some(raw) = lookup("MARKETLENS_HTTP_TIMEOUT_MS") {
            self.http.timeout_ms = parse_number("http.timeout_ms", &raw)?;
        }
        if let Some(raw) = lookup("MARKETLENS_EXCHANGE_SUFFIX") {
            self.default_exchange_suffix = raw.trim().to_owned();
        }

        Ok(())
    }

    /// Rejects settings that could not serve any request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for capability in Capability::ALL {
            let chain = self.providers.chain(capability);
            if chain.is_empty() {
                return Err(ConfigError::EmptyProviderList { capability });
            }
            if let Some(provider) = chain
                .iter()
                .copied()
                .find(|provider| !advertised_capabilities(*provider).supports(capability))
            {
                return Err(ConfigError::UnsupportedProvider {
                    provider,
                    capability,
                });
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.base_delay_ms",
                format!(
                    "{} exceeds retry.max_delay_ms {}",
                    self.retry.base_delay_ms, self.retry.max_delay_ms
                ),
            ));
        }
        if self.report_deadline_ms == 0 {
            return Err(invalid("report_deadline_ms", "must be positive"));
        }
        if self.http.timeout_ms == 0 {
            return Err(invalid("http.timeout_ms", "must be positive"));
        }

        let suffix = self.exchange_suffix();
        if !SUPPORTED_SUFFIXES.contains(&suffix.as_str()) {
            return Err(invalid(
                "default_exchange_suffix",
                format!("expected NS or BO, got '{}'", self.default_exchange_suffix),
            ));
        }

        if self.providers.referenced().contains(&ProviderId::Alphavantage)
            && !self.credentials.has_credential(ProviderId::Alphavantage)
        {
            return Err(ConfigError::MissingCredential {
                provider: ProviderId::Alphavantage,
                env_var: ALPHAVANTAGE_KEY_ENV,
            });
        }

        Ok(())
    }

    /// Normalized exchange suffix without the leading dot.
    pub fn exchange_suffix(&self) -> String {
        self.default_exchange_suffix
            .trim()
            .trim_start_matches('.')
            .to_ascii_uppercase()
    }

    pub fn report_deadline(&self) -> Duration {
        Duration::from_millis(self.report_deadline_ms)
    }
}

/// Capabilities each provider can serve, independent of registration.
pub fn advertised_capabilities(provider: ProviderId) -> CapabilitySet {
    match provider {
        ProviderId::Yahoo => CapabilitySet::full(),
        ProviderId::Alphavantage => CapabilitySet::new(true, true, false),
        ProviderId::Googlenews => CapabilitySet::news_only(),
    }
}

fn parse_provider_list(raw: &str) -> Result<Vec<ProviderId>, ValidationError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ProviderId::from_str)
        .collect()
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|error: T::Err| invalid(field, format!("'{}': {error}", raw.trim())))
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidSetting {
        field,
        reason: reason.into(),
    }
}
