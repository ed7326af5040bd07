use crate::chain::{signing_identity, ChainClient, Wallet};
use crate::claim::ClaimExecutor;
use crate::gate::ThresholdGate;
use crate::types::{BatchResult, ClaimAttempt, FeeSnapshot, Severity};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// One unit of work in a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStep<'a> {
    Skip(&'a FeeSnapshot),
    Claim(&'a FeeSnapshot),
}

/// Steps for `fees` in input order.
pub fn plan<'a>(
    fees: &'a [FeeSnapshot],
    gate: &'a ThresholdGate,
) -> impl Iterator<Item = BatchStep<'a>> + 'a {
    fees.iter().map(move |fee| {
        if gate.is_claimable(fee) {
            BatchStep::Claim(fee)
        } else {
            BatchStep::Skip(fee)
        }
    })
}

/// Claims a list of pools one after another.
#[derive(Clone)]
pub struct BatchOrchestrator {
    executor: ClaimExecutor,
    inter_claim_delay: Duration,
}

impl BatchOrchestrator {
    pub fn new(executor: ClaimExecutor, inter_claim_delay: Duration) -> Self {
        Self {
            executor,
            inter_claim_delay,
        }
    }

    pub fn executor(&self) -> &ClaimExecutor {
        &self.executor
    }

    /// Never issues two claims at once: each claim finishes (or is abandoned
    /// on timeout) before the next begins. Per-pool failures never abort the
    /// batch.
    pub async fn run_batch(
        &self,
        fees: &[FeeSnapshot],
        wallet: &dyn Wallet,
        connection: &Arc<dyn ChainClient>,
    ) -> BatchResult {
        self.run_batch_with(fees, wallet, connection, |_| {}).await
    }

    /// Like `run_batch`, calling `on_claim` after every executed claim.
    pub async fn run_batch_with<F>(
        &self,
        fees: &[FeeSnapshot],
        wallet: &dyn Wallet,
        connection: &Arc<dyn ChainClient>,
        mut on_claim: F,
    ) -> BatchResult
    where
        F: FnMut(&ClaimAttempt),
    {
        let bus = self.executor.bus();
        let gate = self.executor.gate();
        let minimum = gate.minimum_usd();
        let mut result = BatchResult::default();

        if signing_identity(wallet).is_none() {
            bus.push("Please connect your wallet first", Severity::Error);
            result.skipped = fees.len();
            return result;
        }

        info!("Starting batch claim over {} pools", fees.len());
        let total = fees.len();

        for (index, step) in plan(fees, gate).enumerate() {
            match step {
                BatchStep::Skip(fee) => {
                    result.skipped += 1;
                    info!(
                        "Skipped pool {}... - fees below ${}",
                        fee.pool_address.prefix(),
                        minimum
                    );
                    bus.push(
                        format!(
                            "Skipped pool {}... - fees below ${}",
                            fee.pool_address.prefix(),
                            minimum
                        ),
                        Severity::Error,
                    );
                }
                BatchStep::Claim(fee) => {
                    let attempt = self.executor.claim(fee, wallet, connection).await;
                    if attempt.is_success() {
                        result.success += 1;
                    } else {
                        result.failed += 1;
                    }
                    on_claim(&attempt);

                    if index + 1 < total && !self.inter_claim_delay.is_zero() {
                        tokio::time::sleep(self.inter_claim_delay).await;
                    }
                }
            }
        }

        info!(
            "Batch done: {} successful, {} failed, {} skipped",
            result.success, result.failed, result.skipped
        );
        bus.push(
            format!(
                "Batch claim complete: {} successful, {} failed, {} skipped (below ${})",
                result.success, result.failed, result.skipped, minimum
            ),
            result.severity(),
        );
        result
    }
}
