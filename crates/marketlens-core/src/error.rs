use thiserror::Error;

use crate::{Capability, ProviderId};

/// Validation and contract errors exposed by `marketlens-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("stock name cannot be empty")]
    EmptyStockName,
    #[error("max_items must be between {min} and {max}, got {value}")]
    MaxItemsOutOfRange { value: usize, min: usize, max: usize },

    #[error("invalid provider '{value}', expected one of yahoo, alphavantage, googlenews")]
    InvalidProvider { value: String },
    #[error("invalid capability '{value}', expected one of quote, fundamentals, news")]
    InvalidCapability { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// Startup configuration errors. These are the only errors allowed to abort
/// a request before any provider is contacted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("provider list for '{capability}' is empty")]
    EmptyProviderList { capability: Capability },

    #[error("provider '{provider}' does not support '{capability}'")]
    UnsupportedProvider {
        provider: ProviderId,
        capability: Capability,
    },

    #[error("provider '{provider}' requires a credential: set {env_var}")]
    MissingCredential {
        provider: ProviderId,
        env_var: &'static str,
    },

    #[error("no adapter registered for provider '{provider}'")]
    AdapterNotRegistered { provider: ProviderId },

    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
