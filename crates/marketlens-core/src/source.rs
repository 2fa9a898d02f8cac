use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical provider identifiers. The set is closed: adapters are selected
/// by configuration, never discovered at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Yahoo,
    Alphavantage,
    Googlenews,
}

impl ProviderId {
    pub const ALL: [Self; 3] = [Self::Yahoo, Self::Alphavantage, Self::Googlenews];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yahoo => "yahoo",
            Self::Alphavantage => "alphavantage",
            Self::Googlenews => "googlenews",
        }
    }

    /// Human-facing name used in news items and report output.
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Yahoo => "Yahoo Finance",
            Self::Alphavantage => "Alpha Vantage",
            Self::Googlenews => "Google News",
        }
    }

    /// Drops repeats, keeping each provider at its first position.
    pub fn unique(providers: impl IntoIterator<Item = Self>) -> Vec<Self> {
        let mut unique = Vec::with_capacity(Self::ALL.len());
        for provider in providers {
            if !unique.contains(&provider) {
                unique.push(provider);
            }
        }
        unique
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "alphavantage" | "alpha_vantage" => Ok(Self::Alphavantage),
            "googlenews" | "google_news" => Ok(Self::Googlenews),
            other => Err(ValidationError::InvalidProvider {
                value: other.to_owned(),
            }),
        }
    }
}

/// Kind of data being fetched. Used for routing, cache keys and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Quote,
    Fundamentals,
    News,
}

impl Capability {
    pub const ALL: [Self; 3] = [Self::Quote, Self::Fundamentals, Self::News];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Fundamentals => "fundamentals",
            Self::News => "news",
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "quote" => Ok(Self::Quote),
            "fundamentals" => Ok(Self::Fundamentals),
            "news" => Ok(Self::News),
            other => Err(ValidationError::InvalidCapability {
                value: other.to_owned(),
            }),
        }
    }
}
