use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_SYMBOL_LEN: usize = 20;

/// Exchange suffixes understood for Indian listings.
const EXCHANGE_SUFFIXES: [&str; 2] = [".NS", ".BO"];

/// Normalized market symbol/ticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Parse and normalize a symbol to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_SYMBOL_LEN {
            return Err(ValidationError::SymbolTooLong {
                len,
                max: MAX_SYMBOL_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            let valid = ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '&' | '^');
            if !valid {
                return Err(ValidationError::SymbolInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol without a trailing `.NS`/`.BO` exchange suffix.
    pub fn base(&self) -> &str {
        EXCHANGE_SUFFIXES
            .iter()
            .find_map(|suffix| self.0.strip_suffix(suffix))
            .unwrap_or(&self.0)
    }

    pub fn has_exchange_suffix(&self) -> bool {
        EXCHANGE_SUFFIXES
            .iter()
            .any(|suffix| self.0.ends_with(suffix))
    }

    /// Exchange-qualified form, appending `.{default_suffix}` when the symbol
    /// carries no known suffix.
    pub fn with_exchange(&self, default_suffix: &str) -> Symbol {
        if self.has_exchange_suffix() {
            return self.clone();
        }

        let suffix = default_suffix.trim_start_matches('.').to_ascii_uppercase();
        Self(format!("{}.{suffix}", self.0))
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Symbol {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}
