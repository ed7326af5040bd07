use crate::batch::BatchOrchestrator;
use crate::chain::{ChainClient, ClaimTxBuilder, Connector, FeeSource};
use crate::claim::{ClaimExecutor, ClaimSettings};
use crate::config::ClaimerConfig;
use crate::error::AppError;
use crate::failover::EndpointFailover;
use crate::gate::ThresholdGate;
use crate::notifications::{Notification, NotificationBus};
use crate::retry::RetryPolicy;
use crate::rpc::RpcConnector;
use crate::types::{format_units, Address, BatchResult, ClaimAttempt, FeeSnapshot, FeeView};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

/// External program-client and read-query collaborators.
#[derive(Clone)]
pub struct Collaborators {
    pub connector: Arc<dyn Connector>,
    pub fee_source: Arc<dyn FeeSource>,
    pub tx_builder: Arc<dyn ClaimTxBuilder>,
}

impl Collaborators {
    /// JSON-RPC connections built from the config timeouts.
    pub fn with_rpc(
        config: &ClaimerConfig,
        fee_source: Arc<dyn FeeSource>,
        tx_builder: Arc<dyn ClaimTxBuilder>,
    ) -> Self {
        Self {
            connector: Arc::new(RpcConnector {
                timeout: config.request_timeout(),
                poll_interval: config.confirm_poll_interval(),
                max_poll_failures: config.confirm_max_poll_failures,
            }),
            fee_source,
            tx_builder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FetchStatus {
    Idle,
    Loading,
    Ready,
    Failed { message: String },
}

/// Outcome events; the only way the store changes.
pub enum StateEvent {
    FetchStarted,
    FetchCompleted {
        fees: Vec<FeeSnapshot>,
        connection: Arc<dyn ChainClient>,
    },
    FetchFailed {
        message: String,
    },
    ClaimStarted {
        pool: Address,
    },
    ClaimFinished(ClaimAttempt),
    BatchStarted,
    BatchFinished(BatchResult),
}

struct Store {
    fees: Vec<FeeSnapshot>,
    connection: Option<Arc<dyn ChainClient>>,
    fetch_status: FetchStatus,
    claiming_pool: Option<Address>,
    claiming_all: bool,
    last_claim: Option<ClaimAttempt>,
    last_batch: Option<BatchResult>,
}

/// Shared application state owned by the display layer.
pub struct AppState {
    config: ClaimerConfig,
    collaborators: Collaborators,
    failover: EndpointFailover,
    batch: BatchOrchestrator,
    bus: NotificationBus,
    store: Mutex<Store>,
}

impl AppState {
    pub fn new(config: ClaimerConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        config.validate()?;

        let bus = NotificationBus::new(config.notification_ttl());
        let executor = ClaimExecutor::new(
            Arc::clone(&collaborators.tx_builder),
            ThresholdGate::from_config(&config),
            RetryPolicy::new(config.max_attempts, config.retry_base_delay()),
            ClaimSettings::from_config(&config),
            bus.clone(),
        );

        Ok(Self {
            failover: EndpointFailover::new(config.endpoint_urls()?),
            batch: BatchOrchestrator::new(executor, config.inter_claim_delay()),
            bus,
            collaborators,
            config,
            store: Mutex::new(Store {
                fees: Vec::new(),
                connection: None,
                fetch_status: FetchStatus::Idle,
                claiming_pool: None,
                claiming_all: false,
                last_claim: None,
                last_batch: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply an outcome event. Start events are refused while a conflicting
    /// claim is running.
    pub fn apply(&self, event: StateEvent) -> Result<(), AppError> {
        let mut store = self.lock();
        match event {
            StateEvent::FetchStarted => {
                store.fetch_status = FetchStatus::Loading;
            }
            StateEvent::FetchCompleted { fees, connection } => {
                store.fees = fees;
                store.connection = Some(connection);
                store.fetch_status = FetchStatus::Ready;
            }
            StateEvent::FetchFailed { message } => {
                store.fetch_status = FetchStatus::Failed { message };
            }
            StateEvent::ClaimStarted { pool } => {
                if store.claiming_all {
                    return Err(AppError::ClaimInProgress("batch claim running".into()));
                }
                if let Some(current) = &store.claiming_pool {
                    return Err(AppError::ClaimInProgress(format!("pool {current}")));
                }
                store.claiming_pool = Some(pool);
            }
            StateEvent::ClaimFinished(attempt) => {
                store.claiming_pool = None;
                store.last_claim = Some(attempt);
            }
            StateEvent::BatchStarted => {
                if store.claiming_all {
                    return Err(AppError::ClaimInProgress("batch claim running".into()));
                }
                if let Some(current) = &store.claiming_pool {
                    return Err(AppError::ClaimInProgress(format!("pool {current}")));
                }
                store.claiming_all = true;
            }
            StateEvent::BatchFinished(result) => {
                store.claiming_all = false;
                store.last_batch = Some(result);
            }
        }
        Ok(())
    }

    /// Clear in-progress flags when a claim future is dropped early.
    pub(crate) fn release_claim_flags(&self, batch: bool) {
        let mut store = self.lock();
        if batch {
            store.claiming_all = false;
        } else {
            store.claiming_pool = None;
        }
    }

    pub fn config(&self) -> &ClaimerConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn failover(&self) -> &EndpointFailover {
        &self.failover
    }

    pub fn batch(&self) -> &BatchOrchestrator {
        &self.batch
    }

    pub fn executor(&self) -> &ClaimExecutor {
        self.batch.executor()
    }

    pub fn fees(&self) -> Vec<FeeSnapshot> {
        self.lock().fees.clone()
    }

    pub fn fee_for(&self, pool: &Address) -> Option<FeeSnapshot> {
        self.lock()
            .fees
            .iter()
            .find(|f| &f.pool_address == pool)
            .cloned()
    }

    pub fn connection(&self) -> Option<Arc<dyn ChainClient>> {
        self.lock().connection.clone()
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.lock().fetch_status.clone()
    }

    pub fn claiming_pool(&self) -> Option<Address> {
        self.lock().claiming_pool.clone()
    }

    pub fn is_claiming_all(&self) -> bool {
        self.lock().claiming_all
    }

    pub fn last_claim(&self) -> Option<ClaimAttempt> {
        self.lock().last_claim.clone()
    }

    pub fn last_batch(&self) -> Option<BatchResult> {
        self.lock().last_batch
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.bus.live()
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Card data for every pool in the current snapshot.
    pub fn fee_views(&self) -> Vec<FeeView> {
        let gate = self.executor().gate();
        let decimals = self.config.token_decimals;
        self.lock()
            .fees
            .iter()
            .map(|fee| FeeView {
                pool_address: fee.pool_address.clone(),
                partner_fees_usd: gate.value_usd(fee),
                claimable: gate.is_claimable(fee),
                partner_base: format_units(fee.partner_base_fee, decimals),
                partner_quote: format_units(fee.partner_quote_fee, decimals),
                creator_base: format_units(fee.creator_base_fee, decimals),
                creator_quote: format_units(fee.creator_quote_fee, decimals),
                total_trading_base: format_units(fee.total_trading_base_fee, decimals),
                total_trading_quote: format_units(fee.total_trading_quote_fee, decimals),
            })
            .collect()
    }
}
