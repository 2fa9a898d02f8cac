use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::data_source::{CapabilitySet, DataSource, SourceError};
use crate::retry::{elapsed_ms, RetryPolicy};
use crate::{Capability, FailureKind, FetchFailure, FetchOutcome, ProviderId};

type InvokeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Source snapshot used by the `sources` CLI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSnapshot {
    pub id: ProviderId,
    pub capabilities: CapabilitySet,
}

/// Adapter registry and fallback engine.
///
/// Every provider call goes through the router's [`RetryPolicy`]; the router
/// decides which provider is tried next.
pub struct SourceRouter {
    adapters: BTreeMap<ProviderId, Arc<dyn DataSource>>,
    retry: RetryPolicy,
}

impl SourceRouter {
    pub fn new(adapters: Vec<Arc<dyn DataSource>>, retry: RetryPolicy) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.id(), adapter))
            .collect();
        Self { adapters, retry }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn is_registered(&self, provider: ProviderId) -> bool {
        self.adapters.contains_key(&provider)
    }

    pub fn snapshot(&self, provider: ProviderId) -> Option<SourceSnapshot> {
        let adapter = self.adapters.get(&provider)?;
        Some(SourceSnapshot {
            id: provider,
            capabilities: adapter.capabilities(),
        })
    }

    pub fn snapshots(&self) -> Vec<SourceSnapshot> {
        self.adapters
            .keys()
            .filter_map(|provider| self.snapshot(*provider))
            .collect()
    }

    /// Tries `chain` in order and returns the first success. Later providers
    /// are never invoked once one succeeds.
    pub async fn resolve<T, F>(
        &self,
        capability: Capability,
        chain: &[ProviderId],
        mut invoke: F,
    ) -> FetchOutcome<T>
    where
        F: for<'a> FnMut(&'a dyn DataSource) -> InvokeFuture<'a, T>,
    {
        let chain = ProviderId::unique(chain.iter().copied());
        if chain.is_empty() {
            return empty_chain_failure(capability);
        }

        let mut failures = Vec::with_capacity(chain.len());
        for provider in chain {
            let outcome = self.attempt(capability, provider, &mut invoke).await;
            match outcome {
                FetchOutcome::Success { .. } => {
                    if !failures.is_empty() {
                        info!(
                            capability = %capability,
                            source = %provider,
                            failed = failures.len(),
                            "source fallback succeeded"
                        );
                    }
                    return outcome;
                }
                FetchOutcome::Failure(failure) => {
                    warn!(
                        capability = %capability,
                        source = %provider,
                        kind = %failure.kind,
                        reason = %failure.message,
                        "source failed, advancing to next provider"
                    );
                    failures.push(failure);
                }
            }
        }

        warn!(capability = %capability, "all sources failed");
        FetchOutcome::Failure(FetchFailure::all_sources_exhausted(failures))
    }

    /// Invokes every provider in `chain` and concatenates the successful
    /// item lists in chain order. Succeeds when at least one provider did;
    /// the reported source is the first contributing provider.
    pub async fn gather<T, F>(
        &self,
        capability: Capability,
        chain: &[ProviderId],
        mut invoke: F,
    ) -> FetchOutcome<Vec<T>>
    where
        F: for<'a> FnMut(&'a dyn DataSource) -> InvokeFuture<'a, Vec<T>>,
    {
        let chain = ProviderId::unique(chain.iter().copied());
        if chain.is_empty() {
            return empty_chain_failure(capability);
        }

        let started = Instant::now();
        let mut items = Vec::new();
        let mut first_source = None;
        let mut attempts = 0;
        let mut failures = Vec::new();

        for provider in chain {
            match self.attempt(capability, provider, &mut invoke).await {
                FetchOutcome::Success {
                    value,
                    source,
                    attempts: used,
                    ..
                } => {
                    first_source.get_or_insert(source);
                    attempts += used;
                    items.extend(value);
                }
                FetchOutcome::Failure(failure) => {
                    warn!(
                        capability = %capability,
                        source = %provider,
                        kind = %failure.kind,
                        reason = %failure.message,
                        "source failed while gathering"
                    );
                    attempts += failure.attempts;
                    failures.push(failure);
                }
            }
        }

        match first_source {
            Some(source) => FetchOutcome::Success {
                value: items,
                source,
                latency_ms: elapsed_ms(started),
                attempts,
            },
            None => {
                warn!(capability = %capability, "all sources failed");
                FetchOutcome::Failure(FetchFailure::all_sources_exhausted(failures))
            }
        }
    }

    async fn attempt<T, F>(
        &self,
        capability: Capability,
        provider: ProviderId,
        invoke: &mut F,
    ) -> FetchOutcome<T>
    where
        F: for<'a> FnMut(&'a dyn DataSource) -> InvokeFuture<'a, T>,
    {
        let Some(adapter) = self.adapters.get(&provider) else {
            return terminal(provider, SourceError::adapter_not_registered(provider));
        };
        if !adapter.capabilities().supports(capability) {
            return terminal(provider, SourceError::unsupported_capability(capability));
        }

        let adapter = adapter.as_ref();
        let mut attempt = 0_u32;
        let outcome = self
            .retry
            .execute(provider, || {
                attempt += 1;
                let number = attempt;
                let call = invoke(adapter);
                async move {
                    let started = Instant::now();
                    let result = call.await;
                    let latency_ms = elapsed_ms(started);
                    match &result {
                        Ok(_) => debug!(
                            capability = %capability,
                            source = %provider,
                            attempt = number,
                            latency_ms,
                            outcome = "success",
                            "provider attempt"
                        ),
                        Err(error) => debug!(
                            capability = %capability,
                            source = %provider,
                            attempt = number,
                            latency_ms,
                            outcome = error.code(),
                            retryable = error.retryable(),
                            reason = %error.message(),
                            "provider attempt"
                        ),
                    }
                    result
                }
            })
            .await;

        if let FetchOutcome::Success {
            latency_ms,
            attempts,
            ..
        } = &outcome
        {
            info!(
                capability = %capability,
                source = %provider,
                attempts = *attempts,
                latency_ms = *latency_ms,
                outcome = "success",
                "source resolved"
            );
        }
        outcome
    }
}

fn terminal<T>(provider: ProviderId, error: SourceError) -> FetchOutcome<T> {
    FetchOutcome::Failure(
        FetchFailure::new(FailureKind::Terminal, error.message())
            .with_source(provider)
            .with_attempts(0),
    )
}

fn empty_chain_failure<T>(capability: Capability) -> FetchOutcome<T> {
    FetchOutcome::Failure(FetchFailure::new(
        FailureKind::Configuration,
        format!("no providers configured for capability '{capability}'"),
    ))
}
