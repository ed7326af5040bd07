use crate::chain::{signing_identity, ChainClient, ClaimTxBuilder, Wallet};
use crate::config::ClaimerConfig;
use crate::error::ClaimError;
use crate::gate::ThresholdGate;
use crate::notifications::NotificationBus;
use crate::retry::RetryPolicy;
use crate::types::{
    Address, Checkpoint, ClaimAttempt, ClaimOutcome, ClaimParams, Commitment, FeeSnapshot,
    SendOptions, Signature, Severity, UnsignedTransaction,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Knobs for a single claim.
#[derive(Debug, Clone)]
pub struct ClaimSettings {
    /// Upper bound per leg; the program clamps to the real balance
    pub max_claim_amount: u64,
    pub checkpoint_commitment: Commitment,
    pub confirm_commitment: Commitment,
    pub confirm_timeout: Duration,
    pub send_options: SendOptions,
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            max_claim_amount: 1_000_000_000_000,
            checkpoint_commitment: Commitment::Finalized,
            confirm_commitment: Commitment::Confirmed,
            confirm_timeout: Duration::from_secs(60),
            send_options: SendOptions::default(),
        }
    }
}

impl ClaimSettings {
    pub fn from_config(config: &ClaimerConfig) -> Self {
        Self {
            max_claim_amount: config.max_claim_amount,
            checkpoint_commitment: config.checkpoint_commitment,
            confirm_commitment: config.confirm_commitment,
            confirm_timeout: config.confirm_timeout(),
            send_options: config.send_options(),
        }
    }
}

/// Drives the claim of one pool's partner fees.
#[derive(Clone)]
pub struct ClaimExecutor {
    builder: Arc<dyn ClaimTxBuilder>,
    gate: ThresholdGate,
    retry: RetryPolicy,
    settings: ClaimSettings,
    bus: NotificationBus,
}

impl ClaimExecutor {
    pub fn new(
        builder: Arc<dyn ClaimTxBuilder>,
        gate: ThresholdGate,
        retry: RetryPolicy,
        settings: ClaimSettings,
        bus: NotificationBus,
    ) -> Self {
        Self {
            builder,
            gate,
            retry,
            settings,
            bus,
        }
    }

    pub fn gate(&self) -> &ThresholdGate {
        &self.gate
    }

    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Claim partner fees for `fee.pool_address`.
    ///
    /// Exactly one terminal notification is pushed per call, whatever the
    /// number of internal retries. The wallet and threshold checks run first
    /// and never touch the network.
    pub async fn claim(
        &self,
        fee: &FeeSnapshot,
        wallet: &dyn Wallet,
        connection: &Arc<dyn ChainClient>,
    ) -> ClaimAttempt {
        let pool = fee.pool_address.clone();

        let Some(identity) = signing_identity(wallet) else {
            self.bus
                .push("Please connect your wallet first", Severity::Error);
            return ClaimAttempt {
                pool,
                attempts: 0,
                last_error: Some(ClaimError::WalletNotConnected),
                outcome: ClaimOutcome::SkippedNoWallet,
            };
        };

        if !self.gate.is_claimable(fee) {
            let value_usd = self.gate.value_usd(fee);
            let minimum_usd = self.gate.minimum_usd();
            self.bus.push(
                format!(
                    "Cannot claim fees below ${}. Current fees: ${value_usd:.2}",
                    minimum_usd
                ),
                Severity::Error,
            );
            return ClaimAttempt {
                pool,
                attempts: 0,
                last_error: Some(ClaimError::BelowThreshold {
                    value_usd,
                    minimum_usd,
                }),
                outcome: ClaimOutcome::SkippedBelowThreshold { value_usd },
            };
        }

        let mut attempts = 0;
        let result = match self.build(&pool, &identity).await {
            Ok(tx) => {
                // Only the steps before the wallet returns a signature are
                // retried; a sent transaction is never signed again
                let sent = self
                    .retry
                    .execute(|attempt| {
                        attempts = attempt + 1;
                        self.submit(&pool, tx.clone(), wallet, connection)
                    })
                    .await;
                match sent {
                    Ok((signature, checkpoint)) => {
                        self.await_confirmation(signature, checkpoint, connection)
                            .await
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(signature) => {
                info!("Claimed fees for pool {} in tx {}", pool, signature);
                self.bus.push(
                    format!(
                        "Fees claimed for pool {}...! Tx: {}...",
                        pool.prefix(),
                        signature.prefix()
                    ),
                    Severity::Success,
                );
                ClaimAttempt {
                    pool,
                    attempts,
                    last_error: None,
                    outcome: ClaimOutcome::Success { signature },
                }
            }
            Err(e) => {
                error!("Claim for pool {} failed: {e}", pool);
                let message = match &e {
                    ClaimError::ConfirmationTimeout { signature, .. } => format!(
                        "Transaction may still be processing. Check explorer: {signature}"
                    ),
                    other => format!(
                        "Failed to claim fees for pool {}...: {other}",
                        pool.prefix()
                    ),
                };
                self.bus.push(message, Severity::Error);
                ClaimAttempt {
                    pool,
                    attempts,
                    last_error: Some(e.clone()),
                    outcome: ClaimOutcome::Failed { error: e },
                }
            }
        }
    }

    async fn build(
        &self,
        pool: &Address,
        identity: &Address,
    ) -> Result<UnsignedTransaction, ClaimError> {
        let params = ClaimParams {
            pool: pool.clone(),
            fee_claimer: identity.clone(),
            payer: identity.clone(),
            receiver: identity.clone(),
            max_base_amount: self.settings.max_claim_amount,
            max_quote_amount: self.settings.max_claim_amount,
        };
        self.builder.build_claim(&params).await
    }

    async fn submit(
        &self,
        pool: &Address,
        tx: UnsignedTransaction,
        wallet: &dyn Wallet,
        connection: &Arc<dyn ChainClient>,
    ) -> Result<(Signature, Checkpoint), ClaimError> {
        let checkpoint = connection
            .latest_checkpoint(self.settings.checkpoint_commitment)
            .await?;
        let tx = tx.with_checkpoint(&checkpoint);

        let signature = wallet
            .sign_and_send(tx, connection.as_ref(), &self.settings.send_options)
            .await?;
        info!("Transaction sent for pool {}: {}", pool.prefix(), signature);
        Ok((signature, checkpoint))
    }

    /// Race confirmation against the timeout, then re-check the final status.
    /// Errors from here on are never retried.
    async fn await_confirmation(
        &self,
        signature: Signature,
        checkpoint: Checkpoint,
        connection: &Arc<dyn ChainClient>,
    ) -> Result<Signature, ClaimError> {
        // The poller runs detached so that giving up on it leaves it running
        let poller = {
            let connection = Arc::clone(connection);
            let signature = signature.clone();
            let commitment = self.settings.confirm_commitment;
            tokio::spawn(async move {
                connection
                    .confirm(&signature, &checkpoint, commitment)
                    .await
            })
        };

        match tokio::time::timeout(self.settings.confirm_timeout, poller).await {
            Ok(Ok(confirmed)) => confirmed?,
            Ok(Err(join)) => {
                return Err(ClaimError::Unknown(format!(
                    "Confirmation task failed: {join}"
                )))
            }
            Err(_) => {
                warn!(
                    "No confirmation for {} within {:?}; it may still land",
                    signature, self.settings.confirm_timeout
                );
                return Err(ClaimError::ConfirmationTimeout {
                    signature: signature.0.clone(),
                    waited_secs: self.settings.confirm_timeout.as_secs(),
                });
            }
        }

        match connection.signature_status(&signature).await {
            Ok(Some(status)) => {
                if let Some(err) = status.err {
                    return Err(ClaimError::OnChainFailure(err.to_string()));
                }
            }
            Ok(None) => {}
            // Already confirmed at the requested commitment; only the
            // second look failed
            Err(e) => warn!("Confirmed {} but final status unverified: {e}", signature),
        }

        Ok(signature)
    }
}
