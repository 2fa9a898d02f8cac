use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProviderId, Symbol, UtcDateTime, ValidationError};

/// Canonical quote snapshot for a single listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
    pub volume: Option<u64>,
    pub previous_close: f64,
    /// Upstream market time. Daily sources report the trading day at midnight UTC.
    pub timestamp: Option<UtcDateTime>,
    pub source: ProviderId,
}

impl Quote {
    /// Builds a quote, deriving `change` and `change_percent` from the previous
    /// close (both rounded to two decimals).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        price: f64,
        previous_close: f64,
        day_high: Option<f64>,
        day_low: Option<f64>,
        volume: Option<u64>,
        timestamp: Option<UtcDateTime>,
        source: ProviderId,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("price", price)?;
        validate_non_negative("previous_close", previous_close)?;
        validate_optional_non_negative("day_high", day_high)?;
        validate_optional_non_negative("day_low", day_low)?;

        let change = price - previous_close;
        let change_percent = if previous_close > 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };

        Ok(Self {
            symbol,
            price,
            change: round2(change),
            change_percent: round2(change_percent),
            day_high,
            day_low,
            volume,
            previous_close,
            timestamp,
            source,
        })
    }
}

/// Period-indexed statement rows: period label -> line item -> value.
pub type StatementTable = BTreeMap<String, BTreeMap<String, f64>>;

/// Company fundamentals as reported by one provider.
///
/// The upstream schemas are loose, so sections are kept as maps rather than
/// fixed structs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsReport {
    pub ticker: Symbol,
    pub company_info: BTreeMap<String, Value>,
    pub financial_statements: BTreeMap<String, StatementTable>,
    pub valuation_ratios: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esg: Option<BTreeMap<String, Value>>,
    pub source: ProviderId,
}

impl FundamentalsReport {
    pub fn new(ticker: Symbol, source: ProviderId) -> Self {
        Self {
            ticker,
            company_info: BTreeMap::new(),
            financial_statements: BTreeMap::new(),
            valuation_ratios: BTreeMap::new(),
            esg: None,
            source,
        }
    }

    /// Records a company attribute. Only scalars are kept; nested values and
    /// nulls are dropped.
    pub fn insert_info(&mut self, key: impl Into<String>, value: Value) {
        if is_scalar(&value) {
            self.company_info.insert(key.into(), value);
        }
    }

    /// Records a ratio when it is present and finite.
    pub fn insert_ratio(&mut self, key: impl Into<String>, value: Option<f64>) {
        if let Some(value) = value.filter(|value| value.is_finite()) {
            self.valuation_ratios.insert(key.into(), value);
        }
    }

    pub fn insert_statement(&mut self, name: impl Into<String>, table: StatementTable) {
        if !table.is_empty() {
            self.financial_statements.insert(name.into(), table);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.company_info.is_empty()
            && self.financial_statements.is_empty()
            && self.valuation_ratios.is_empty()
            && self.esg.is_none()
    }
}

/// One news article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub link: String,
    pub publisher: String,
    /// `None` when the upstream date could not be parsed; such items sort last.
    pub published_at: Option<UtcDateTime>,
    pub source: ProviderId,
}

/// Deduplicates by link (first occurrence wins), orders by publication time
/// descending and keeps at most `max_items`.
pub fn arrange_news(items: Vec<NewsItem>, max_items: usize) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    let mut unique = items
        .into_iter()
        .filter(|item| seen.insert(item.link.clone()))
        .collect::<Vec<_>>();

    unique.sort_by_key(|item| Reverse(item.published_at));
    unique.truncate(max_items);
    unique
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
