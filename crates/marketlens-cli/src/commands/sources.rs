use std::collections::BTreeMap;

use marketlens_core::config::{advertised_capabilities, NewsMode};
use marketlens_core::{Capability, MarketDataService, ProviderId};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    id: ProviderId,
    name: &'static str,
    registered: bool,
    capabilities: Vec<Capability>,
    credential: bool,
}

#[derive(Debug, Serialize)]
pub struct SourcesReport {
    news_mode: NewsMode,
    chains: BTreeMap<Capability, Vec<ProviderId>>,
    sources: Vec<SourceStatus>,
}

/// Provider chains and per-provider status. Credentials are reported as
/// present or absent only.
pub fn report(service: &MarketDataService) -> SourcesReport {
    let settings = service.settings();
    let chains = Capability::ALL
        .into_iter()
        .map(|capability| (capability, service.chain(capability).to_vec()))
        .collect();

    let sources = ProviderId::ALL
        .into_iter()
        .map(|id| {
            let snapshot = service.router().snapshot(id);
            let capabilities = snapshot
                .map(|snapshot| snapshot.capabilities)
                .unwrap_or_else(|| advertised_capabilities(id));
            SourceStatus {
                id,
                name: id.display_name(),
                registered: snapshot.is_some(),
                capabilities: capabilities.supported(),
                credential: settings.credentials.has_credential(id),
            }
        })
        .collect();

    SourcesReport {
        news_mode: settings.news_mode,
        chains,
        sources,
    }
}
