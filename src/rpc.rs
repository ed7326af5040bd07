use crate::chain::{ChainClient, Connector};
use crate::error::ClaimError;
use crate::types::{Checkpoint, Commitment, Signature, SignatureStatus};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// JSON-RPC over HTTP client for a single node endpoint.
pub struct RpcClient {
    url: String,
    http: Client,
    request_id: AtomicU64,
    poll_interval: Duration,
    /// Consecutive failed polls after which confirmation gives up
    max_poll_failures: u32,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// `{ context, value }` wrapper used by most read methods.
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    last_valid_block_height: u64,
}

impl RpcClient {
    pub fn new(
        url: &Url,
        timeout: Duration,
        poll_interval: Duration,
        max_poll_failures: u32,
    ) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            url: url.to_string(),
            http,
            request_id: AtomicU64::new(1),
            poll_interval,
            max_poll_failures: max_poll_failures.max(1),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ClaimError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.request_id.fetch_add(1, Ordering::SeqCst),
            method,
            params,
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClaimError::from_http_status(status, &body));
        }

        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| ClaimError::Unknown(format!("Failed to parse {method} response: {e}")))?;

        if let Some(err) = body.error {
            return Err(rpc_error(err));
        }

        let result = body
            .result
            .ok_or_else(|| ClaimError::Unknown(format!("{method} returned no result")))?;
        serde_json::from_value(result)
            .map_err(|e| ClaimError::Unknown(format!("Unexpected {method} result: {e}")))
    }

    pub async fn block_height(&self, commitment: Commitment) -> Result<u64, ClaimError> {
        self.call(
            "getBlockHeight",
            json!([{ "commitment": commitment.as_str() }]),
        )
        .await
    }
}

fn transport_error(e: reqwest::Error) -> ClaimError {
    if e.is_timeout() || e.is_connect() {
        return ClaimError::NetworkTimeout(e.to_string());
    }
    if let Some(status) = e.status() {
        return ClaimError::from_http_status(status.as_u16(), &e.to_string());
    }
    ClaimError::classify(e.to_string())
}

fn rpc_error(err: JsonRpcError) -> ClaimError {
    let message = format!("RPC error {}: {}", err.code, err.message);
    match err.code {
        429 | -32429 => ClaimError::RateLimited(message),
        403 | -32403 => ClaimError::AccessDenied(message),
        _ => ClaimError::classify(message),
    }
}

/// Errors worth riding out while polling for confirmation.
fn is_transient(e: &ClaimError) -> bool {
    matches!(
        e,
        ClaimError::AccessDenied(_)
            | ClaimError::RateLimited(_)
            | ClaimError::NetworkTimeout(_)
            | ClaimError::EndpointUnavailable(_)
    )
}

#[async_trait]
impl ChainClient for RpcClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn latest_checkpoint(&self, commitment: Commitment) -> Result<Checkpoint, ClaimError> {
        let resp: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": commitment.as_str() }]),
            )
            .await?;
        Ok(Checkpoint {
            blockhash: resp.value.blockhash,
            last_valid_block_height: resp.value.last_valid_block_height,
        })
    }

    async fn confirm(
        &self,
        signature: &Signature,
        checkpoint: &Checkpoint,
        commitment: Commitment,
    ) -> Result<(), ClaimError> {
        let mut failures = 0u32;
        loop {
            let mut last_failure = None;

            match self.signature_status(signature).await {
                Ok(Some(status)) => {
                    if let Some(err) = status.err {
                        return Err(ClaimError::OnChainFailure(err.to_string()));
                    }
                    if status.reached(commitment) {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) if is_transient(&e) => {
                    tracing::debug!("Status poll for {} failed: {e}", signature.prefix());
                    last_failure = Some(e);
                }
                Err(e) => return Err(e),
            }

            match self.block_height(commitment).await {
                Ok(height) if height > checkpoint.last_valid_block_height => {
                    return Err(ClaimError::Unknown(format!(
                        "Transaction {signature} expired: block height {height} exceeded {}",
                        checkpoint.last_valid_block_height
                    )));
                }
                Ok(_) => {}
                Err(e) if is_transient(&e) => {
                    tracing::debug!("Block height poll failed: {e}");
                    last_failure = Some(e);
                }
                Err(e) => return Err(e),
            }

            match last_failure {
                Some(e) => {
                    failures += 1;
                    if failures >= self.max_poll_failures {
                        tracing::warn!(
                            "Giving up on confirming {} after {} failed polls",
                            signature,
                            failures
                        );
                        return Err(ClaimError::Unknown(format!(
                            "Could not confirm {signature} after {failures} failed polls: {e}"
                        )));
                    }
                }
                None => failures = 0,
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ClaimError> {
        let resp: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.0], { "searchTransactionHistory": false }]),
            )
            .await?;
        Ok(resp.value.into_iter().next().flatten())
    }
}

/// Builds an `RpcClient` per endpoint.
#[derive(Debug, Clone)]
pub struct RpcConnector {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub max_poll_failures: u32,
}

impl Connector for RpcConnector {
    fn connect(&self, endpoint: &Url) -> Result<Arc<dyn ChainClient>, ClaimError> {
        Ok(Arc::new(RpcClient::new(
            endpoint,
            self.timeout,
            self.poll_interval,
            self.max_poll_failures,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RpcClient {
        let url = Url::parse(&server.uri()).unwrap();
        RpcClient::new(&url, Duration::from_secs(5), Duration::from_millis(10), 5)
    }

    fn checkpoint() -> Checkpoint {
        Checkpoint {
            blockhash: "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N".into(),
            last_valid_block_height: 1_000,
        }
    }

    async fn mock_rpc(server: &MockServer, rpc_method: &str, result: Value) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result })),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_latest_checkpoint() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "getLatestBlockhash",
            json!({
                "context": { "slot": 2792 },
                "value": {
                    "blockhash": "EkSnNWid2cvwEVnVx9aBqawnmiCNiDgp3gUdkDPTKN1N",
                    "lastValidBlockHeight": 3090
                }
            }),
        )
        .await;

        let cp = client(&server)
            .latest_checkpoint(Commitment::Finalized)
            .await
            .unwrap();
        assert_eq!(cp.last_valid_block_height, 3090);
    }

    #[tokio::test]
    async fn test_http_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
            .mount(&server)
            .await;

        let err = client(&server)
            .latest_checkpoint(Commitment::Finalized)
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_http_403_is_access_denied() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Access forbidden"))
            .mount(&server)
            .await;

        let err = client(&server).block_height(Commitment::Confirmed).await.unwrap_err();
        assert!(matches!(err, ClaimError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_rpc_error_object_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": { "code": -32005, "message": "Node is behind" }
            })))
            .mount(&server)
            .await;

        let err = client(&server).block_height(Commitment::Confirmed).await.unwrap_err();
        assert!(matches!(err, ClaimError::Unknown(_)));
    }

    #[tokio::test]
    async fn test_missing_status_is_none() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "getSignatureStatuses",
            json!({ "context": { "slot": 82 }, "value": [null] }),
        )
        .await;

        let status = client(&server)
            .signature_status(&Signature("sig".into()))
            .await
            .unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn test_confirm_succeeds_at_commitment() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "getSignatureStatuses",
            json!({
                "context": { "slot": 82 },
                "value": [{
                    "slot": 72,
                    "confirmations": 10,
                    "err": null,
                    "confirmationStatus": "confirmed"
                }]
            }),
        )
        .await;

        client(&server)
            .confirm(&Signature("sig".into()), &checkpoint(), Commitment::Confirmed)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_confirm_reports_on_chain_failure() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "getSignatureStatuses",
            json!({
                "context": { "slot": 82 },
                "value": [{
                    "slot": 72,
                    "confirmations": null,
                    "err": { "InstructionError": [0, { "Custom": 6000 }] },
                    "confirmationStatus": "finalized"
                }]
            }),
        )
        .await;

        let err = client(&server)
            .confirm(&Signature("sig".into()), &checkpoint(), Commitment::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::OnChainFailure(_)));
    }

    #[tokio::test]
    async fn test_confirm_stops_when_checkpoint_expires() {
        let server = MockServer::start().await;
        mock_rpc(
            &server,
            "getSignatureStatuses",
            json!({ "context": { "slot": 82 }, "value": [null] }),
        )
        .await;
        mock_rpc(&server, "getBlockHeight", json!(1_001)).await;

        let err = client(&server)
            .confirm(&Signature("sig".into()), &checkpoint(), Commitment::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::Unknown(msg) if msg.contains("expired")));
    }

    #[tokio::test]
    async fn test_confirm_gives_up_when_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
            .mount(&server)
            .await;

        let err = tokio::time::timeout(
            Duration::from_secs(5),
            client(&server).confirm(&Signature("sig".into()), &checkpoint(), Commitment::Confirmed),
        )
        .await
        .expect("confirm kept polling")
        .unwrap_err();

        assert!(!err.is_retryable());
        assert!(matches!(err, ClaimError::Unknown(msg) if msg.contains("5 failed polls")));
        // status and block height per poll
        assert_eq!(server.received_requests().await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_successful_poll_resets_failure_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getSignatureStatuses" })))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(4)
            .mount(&server)
            .await;
        mock_rpc(
            &server,
            "getSignatureStatuses",
            json!({ "context": { "slot": 82 }, "value": [null] }),
        )
        .await;
        mock_rpc(&server, "getBlockHeight", json!(900)).await;

        let client = client(&server);
        let sig = Signature("sig".into());
        let cp = checkpoint();
        let outcome = tokio::time::timeout(
            Duration::from_millis(500),
            client.confirm(&sig, &cp, Commitment::Confirmed),
        )
        .await;

        // four failures stay under the cap of five, then polling carries on
        assert!(outcome.is_err());
    }
}
