//! In-memory collaborators for unit tests.

use crate::chain::{ChainClient, ClaimTxBuilder, Connector, FeeSource, Wallet};
use crate::claim::{ClaimExecutor, ClaimSettings};
use crate::config::ClaimerConfig;
use crate::error::ClaimError;
use crate::gate::ThresholdGate;
use crate::notifications::NotificationBus;
use crate::retry::RetryPolicy;
use crate::state::{AppState, Collaborators};
use crate::types::{
    Address, Checkpoint, ClaimParams, Commitment, FeeSnapshot, SendOptions, Signature,
    SignatureStatus, UnsignedTransaction,
};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub(crate) fn fee(seed: u8, partner_base: u64, partner_quote: u64) -> FeeSnapshot {
    FeeSnapshot {
        pool_address: Address::from_bytes([seed; 32]),
        partner_base_fee: partner_base,
        partner_quote_fee: partner_quote,
        creator_base_fee: 0,
        creator_quote_fee: 0,
        total_trading_base_fee: partner_base,
        total_trading_quote_fee: partner_quote,
    }
}

/// $1 minimum at $150 per 9-decimal token, 3 attempts 100ms apart.
pub(crate) fn executor(builder: &FakeBuilder) -> ClaimExecutor {
    ClaimExecutor::new(
        Arc::new(builder.clone()),
        ThresholdGate::new(1.0, 150.0, 9),
        RetryPolicy::new(3, Duration::from_millis(100)),
        ClaimSettings::default(),
        NotificationBus::new(Duration::from_secs(5)),
    )
}

pub(crate) fn test_config(endpoints: usize) -> ClaimerConfig {
    ClaimerConfig {
        rpc_endpoints: (0..endpoints).map(|i| format!("http://rpc{i}.test")).collect(),
        retry_base_delay_ms: 100,
        inter_claim_delay_ms: 0,
        ..ClaimerConfig::default()
    }
}

pub(crate) fn app_state_with(endpoints: usize, source: FakeSource) -> AppState {
    let collaborators = Collaborators {
        connector: Arc::new(FakeConnector),
        fee_source: Arc::new(source),
        tx_builder: Arc::new(FakeBuilder::new()),
    };
    AppState::new(test_config(endpoints), collaborators).unwrap()
}

pub(crate) fn app_state(fees: Vec<FeeSnapshot>) -> AppState {
    app_state_with(1, FakeSource::new(vec![SourceBehavior::Answer(fees)]))
}

#[derive(Clone, Default)]
pub(crate) struct FakeBuilder {
    calls: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<ClaimParams>>>,
}

impl FakeBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_params(&self) -> Option<ClaimParams> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClaimTxBuilder for FakeBuilder {
    async fn build_claim(&self, params: &ClaimParams) -> Result<UnsignedTransaction, ClaimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap() = Some(params.clone());
        Ok(UnsignedTransaction::new(json!({
            "instruction": "claim_partner_trading_fee",
            "pool": params.pool.as_str(),
        })))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfirmMode {
    Confirming,
    NeverConfirming,
    ConfirmingWithError,
    StatusRateLimited,
    ConfirmRateLimited,
}

#[derive(Clone)]
pub(crate) struct FakeChain {
    endpoint: String,
    mode: ConfirmMode,
    calls: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
}

impl FakeChain {
    fn new(endpoint: &str, mode: ConfirmMode) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            mode,
            calls: Arc::new(AtomicUsize::new(0)),
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn confirming() -> Self {
        Self::new("http://fake.test/", ConfirmMode::Confirming)
    }

    /// Confirmation polls once a second and never succeeds.
    pub(crate) fn never_confirming() -> Self {
        Self::new("http://fake.test/", ConfirmMode::NeverConfirming)
    }

    /// Confirms, but the final status carries an execution error.
    pub(crate) fn confirming_with_error() -> Self {
        Self::new("http://fake.test/", ConfirmMode::ConfirmingWithError)
    }

    /// Confirms, but the final status read is rate limited.
    pub(crate) fn status_rate_limited() -> Self {
        Self::new("http://fake.test/", ConfirmMode::StatusRateLimited)
    }

    /// Confirmation polling itself reports a rate limit.
    pub(crate) fn confirm_rate_limited() -> Self {
        Self::new("http://fake.test/", ConfirmMode::ConfirmRateLimited)
    }

    pub(crate) fn client(&self) -> Arc<dyn ChainClient> {
        Arc::new(self.clone())
    }

    /// Total calls to any node method.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn confirm_polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            blockhash: "GHtXQBsoZHVnNFa9YevAzFr17DJjgHXk3ycTKD5xD3Zi".to_string(),
            last_valid_block_height: 1_000,
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn latest_checkpoint(&self, _commitment: Commitment) -> Result<Checkpoint, ClaimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.checkpoint())
    }

    async fn confirm(
        &self,
        _signature: &Signature,
        _checkpoint: &Checkpoint,
        _commitment: Commitment,
    ) -> Result<(), ClaimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ConfirmMode::NeverConfirming => {}
            ConfirmMode::ConfirmRateLimited => {
                self.polls.fetch_add(1, Ordering::SeqCst);
                return Err(ClaimError::RateLimited("429 Too Many Requests".into()));
            }
            _ => {
                self.polls.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
        }
        loop {
            self.polls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, ClaimError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.mode == ConfirmMode::StatusRateLimited {
            return Err(ClaimError::RateLimited("429 Too Many Requests".into()));
        }
        let err = match self.mode {
            ConfirmMode::ConfirmingWithError => Some(json!({ "InstructionError": [0, { "Custom": 6001 }] })),
            _ => None,
        };
        Ok(Some(SignatureStatus {
            slot: 42,
            confirmations: None,
            err,
            confirmation_status: Some(Commitment::Confirmed),
        }))
    }
}

/// Hands out a confirming fake bound to the requested endpoint.
pub(crate) struct FakeConnector;

impl Connector for FakeConnector {
    fn connect(&self, endpoint: &Url) -> Result<Arc<dyn ChainClient>, ClaimError> {
        Ok(FakeChain::new(endpoint.as_str(), ConfirmMode::Confirming).client())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum SourceBehavior {
    Answer(Vec<FeeSnapshot>),
    Fail(ClaimError),
}

/// Answers the n-th call with the n-th behavior, repeating the last one.
#[derive(Clone)]
pub(crate) struct FakeSource {
    behaviors: Arc<Vec<SourceBehavior>>,
    calls: Arc<AtomicUsize>,
}

impl FakeSource {
    pub(crate) fn new(behaviors: Vec<SourceBehavior>) -> Self {
        Self {
            behaviors: Arc::new(behaviors),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeeSource for FakeSource {
    async fn pool_fees(
        &self,
        _connection: &dyn ChainClient,
        _pool_group: &Address,
    ) -> Result<Vec<FeeSnapshot>, ClaimError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviors.get(n).or(self.behaviors.last()) {
            Some(SourceBehavior::Answer(fees)) => Ok(fees.clone()),
            Some(SourceBehavior::Fail(e)) => Err(e.clone()),
            None => Err(ClaimError::EndpointUnavailable("nothing scripted".into())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendBehavior {
    Approve,
    Reject,
    RateLimited,
    /// The signing prompt is never answered.
    Pending,
}

pub(crate) struct FakeWallet {
    identity: Address,
    connected: bool,
    fallback: SendBehavior,
    script: Mutex<VecDeque<SendBehavior>>,
    sends: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_blockhash: Mutex<Option<String>>,
}

impl FakeWallet {
    fn build(connected: bool, fallback: SendBehavior, script: Vec<SendBehavior>) -> Self {
        Self {
            identity: Address::from_bytes([200; 32]),
            connected,
            fallback,
            script: Mutex::new(script.into()),
            sends: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_blockhash: Mutex::new(None),
        }
    }

    pub(crate) fn disconnected() -> Self {
        Self::build(false, SendBehavior::Approve, vec![])
    }

    pub(crate) fn approving() -> Self {
        Self::with(SendBehavior::Approve)
    }

    pub(crate) fn pending() -> Self {
        Self::with(SendBehavior::Pending)
    }

    pub(crate) fn with(behavior: SendBehavior) -> Self {
        Self::build(true, behavior, vec![])
    }

    /// One behavior per send in order, approving once the script runs out.
    pub(crate) fn scripted(script: Vec<SendBehavior>) -> Self {
        Self::build(true, SendBehavior::Approve, script)
    }

    pub(crate) fn identity(&self) -> Address {
        self.identity.clone()
    }

    pub(crate) fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent_sends(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn last_blockhash(&self) -> Option<String> {
        self.last_blockhash.lock().unwrap().clone()
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    fn public_key(&self) -> Option<Address> {
        self.connected.then(|| self.identity.clone())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn can_sign(&self) -> bool {
        self.connected
    }

    async fn sign_and_send(
        &self,
        tx: UnsignedTransaction,
        _connection: &dyn ChainClient,
        _options: &SendOptions,
    ) -> Result<Signature, ClaimError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_blockhash.lock().unwrap() = tx.recent_blockhash.clone();
        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let result = match behavior {
            SendBehavior::Approve => {
                tokio::task::yield_now().await;
                Ok(Signature(format!("5ig{n:0>85}")))
            }
            SendBehavior::Reject => Err(ClaimError::UserRejected(
                "User rejected the request.".into(),
            )),
            SendBehavior::RateLimited => Err(ClaimError::RateLimited(
                "429 Too Many Requests".into(),
            )),
            SendBehavior::Pending => std::future::pending().await,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
