//! Ordered endpoint failover for read queries.
//!
//! Endpoints are tried strictly in list order, one at a time, on every call.
//! Nothing is remembered between calls, and results are never merged across
//! endpoints: a successful answer always comes from exactly one endpoint.

use crate::error::ClaimError;
use std::future::Future;
use tracing::{info, warn};
use url::Url;

/// Every endpoint failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("All {attempted} RPC endpoints failed; last error: {last}")]
pub struct FetchError {
    pub attempted: usize,
    /// Classified failure of the last endpoint tried
    pub last: ClaimError,
}

impl FetchError {
    /// Collapse to access-denied, rate-limited, network/timeout, or generic.
    pub fn classification(&self) -> ClaimError {
        match &self.last {
            e @ (ClaimError::AccessDenied(_)
            | ClaimError::RateLimited(_)
            | ClaimError::NetworkTimeout(_)) => e.clone(),
            ClaimError::EndpointUnavailable(msg) | ClaimError::Unknown(msg) => {
                ClaimError::classify(msg.clone())
            }
            other => ClaimError::Unknown(other.to_string()),
        }
    }

    pub fn user_message(&self) -> String {
        self.classification().fetch_message()
    }
}

/// Ordered list of candidate RPC endpoints.
#[derive(Debug, Clone)]
pub struct EndpointFailover {
    endpoints: Vec<Url>,
}

impl EndpointFailover {
    pub fn new(endpoints: Vec<Url>) -> Self {
        Self { endpoints }
    }

    pub fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    /// Run `op` against each endpoint in order until one succeeds.
    /// Returns the value and the index of the endpoint that produced it.
    pub async fn fetch<T, F, Fut>(&self, mut op: F) -> Result<(T, usize), FetchError>
    where
        F: FnMut(&Url) -> Fut,
        Fut: Future<Output = Result<T, ClaimError>>,
    {
        let mut last_error = None;

        for (index, endpoint) in self.endpoints.iter().enumerate() {
            info!("Trying RPC endpoint: {}", endpoint);
            match op(endpoint).await {
                Ok(value) => {
                    info!("Endpoint {} answered", endpoint);
                    return Ok((value, index));
                }
                Err(e) => {
                    warn!("Failed with endpoint {}: {}", endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        Err(FetchError {
            attempted: self.endpoints.len(),
            last: last_error
                .unwrap_or_else(|| ClaimError::EndpointUnavailable("No RPC endpoints".into())),
        })
    }
}
