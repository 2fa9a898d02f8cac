//! Uniform success/failure result carried through retry, fallback, cache
//! and report assembly.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ProviderId;

/// Failure taxonomy for one capability fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Transient failure. Absorbed by the retry policy; only surfaces when a
    /// caller bypasses it.
    Retryable,
    /// Permanent failure for one provider. Retry stops, fallback continues.
    Terminal,
    /// Retries used up on transient failures.
    Exhausted,
    /// Every provider in the chain failed; `causes` holds each one.
    AllSourcesExhausted,
    /// Report deadline elapsed before the branch finished.
    Timeout,
    /// Chain was empty or otherwise unusable before any network activity.
    Configuration,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::Terminal => "terminal",
            Self::Exhausted => "exhausted",
            Self::AllSourcesExhausted => "all_sources_exhausted",
            Self::Timeout => "timeout",
            Self::Configuration => "configuration",
        }
    }

    /// Error code used in tool envelopes.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Retryable => "fetch.retryable",
            Self::Terminal => "fetch.terminal",
            Self::Exhausted => "fetch.exhausted",
            Self::AllSourcesExhausted => "fetch.all_sources_exhausted",
            Self::Timeout => "fetch.timeout",
            Self::Configuration => "fetch.configuration",
        }
    }

    /// Whether trying again later could plausibly succeed.
    pub const fn retryable(self) -> bool {
        matches!(self, Self::Retryable | Self::Exhausted | Self::Timeout)
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ProviderId>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<FetchFailure>,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            attempts: 0,
            causes: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: ProviderId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Aggregates per-provider failures; the message joins their reasons.
    pub fn all_sources_exhausted(causes: Vec<FetchFailure>) -> Self {
        let reasons = causes
            .iter()
            .map(|cause| match cause.source {
                Some(source) => format!("{source}: {}", cause.message),
                None => cause.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ");
        let attempts = causes.iter().map(|cause| cause.attempts).sum();

        Self {
            kind: FailureKind::AllSourcesExhausted,
            message: format!("all sources failed: {reasons}"),
            source: None,
            attempts,
            causes,
        }
    }

    /// Providers that contributed to this failure, in the order tried.
    pub fn sources(&self) -> Vec<ProviderId> {
        if self.causes.is_empty() {
            return self.source.into_iter().collect();
        }
        self.causes.iter().flat_map(FetchFailure::sources).collect()
    }
}

impl Display for FetchFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Tagged result of one capability fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome<T> {
    Success {
        value: T,
        source: ProviderId,
        latency_ms: u64,
        attempts: u32,
    },
    Failure(FetchFailure),
}

impl<T> FetchOutcome<T> {
    pub fn failure(failure: FetchFailure) -> Self {
        Self::Failure(failure)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&FetchFailure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn source(&self) -> Option<ProviderId> {
        match self {
            Self::Success { source, .. } => Some(*source),
            Self::Failure(failure) => failure.source,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } => *attempts,
            Self::Failure(failure) => failure.attempts,
        }
    }

    pub fn map<U, F>(self, f: F) -> FetchOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Success {
                value,
                source,
                latency_ms,
                attempts,
            } => FetchOutcome::Success {
                value: f(value),
                source,
                latency_ms,
                attempts,
            },
            Self::Failure(failure) => FetchOutcome::Failure(failure),
        }
    }
}
