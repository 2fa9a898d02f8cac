//! Provider adapters.
//!
//! | Adapter | Quote | Fundamentals | News | Credential |
//! |---------|-------|--------------|------|------------|
//! | [`YahooAdapter`] | chart meta | quoteSummary | search | cookie + crumb session |
//! | [`AlphaVantageAdapter`] | `GLOBAL_QUOTE` | `OVERVIEW` | - | API key |
//! | [`GoogleNewsAdapter`] | - | - | RSS search | - |

mod alphavantage;
mod googlenews;
mod yahoo;

pub use alphavantage::AlphaVantageAdapter;
pub use googlenews::GoogleNewsAdapter;
pub use yahoo::YahooAdapter;

use serde::de::DeserializeOwned;

use crate::data_source::SourceError;
use crate::http_client::{classify_status, HttpClient, HttpRequest};
use crate::ProviderId;

/// Executes `request` and returns the body of a 2xx response. Transport
/// failures and error statuses come back classified.
async fn fetch_body(
    http_client: &dyn HttpClient,
    provider: ProviderId,
    request: HttpRequest,
) -> Result<String, SourceError> {
    let response = http_client
        .execute(request)
        .await
        .map_err(|error| error.into_source_error(provider))?;

    if let Some(error) = classify_status(provider, response.status) {
        return Err(error);
    }
    Ok(response.body)
}

fn parse_json<T: DeserializeOwned>(provider: ProviderId, body: &str) -> Result<T, SourceError> {
    serde_json::from_str(body)
        .map_err(|error| SourceError::malformed(format!("failed to parse {provider} response: {error}")))
}
