use crate::chain::{signing_identity, Wallet};
use crate::error::AppError;
use crate::state::{AppState, StateEvent};
use crate::types::{Address, BatchResult, ClaimAttempt};

/// Clears the claim flags if the command future is dropped midway.
struct FlagGuard<'a> {
    state: &'a AppState,
    batch: bool,
    armed: bool,
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.release_claim_flags(self.batch);
        }
    }
}

/// Claim partner fees for a single pool from the current snapshot.
pub async fn claim_one(
    state: &AppState,
    pool: &str,
    wallet: &dyn Wallet,
) -> Result<ClaimAttempt, AppError> {
    let pool = Address::parse(pool)?;
    let connection = state.connection().ok_or(AppError::NotReady)?;
    let fee = state
        .fee_for(&pool)
        .ok_or_else(|| AppError::NotFound(format!("pool {pool}")))?;

    state.apply(StateEvent::ClaimStarted { pool: pool.clone() })?;
    let mut guard = FlagGuard {
        state,
        batch: false,
        armed: true,
    };

    let attempt = state.executor().claim(&fee, wallet, &connection).await;

    guard.armed = false;
    state.apply(StateEvent::ClaimFinished(attempt.clone()))?;
    Ok(attempt)
}

/// Claim every eligible pool in the current snapshot, one at a time.
pub async fn claim_all(state: &AppState, wallet: &dyn Wallet) -> Result<BatchResult, AppError> {
    let connection = state.connection().ok_or(AppError::NotReady)?;
    let fees = state.fees();

    state.apply(StateEvent::BatchStarted)?;
    let mut guard = FlagGuard {
        state,
        batch: true,
        armed: true,
    };

    let result = state.batch().run_batch(&fees, wallet, &connection).await;

    guard.armed = false;
    state.apply(StateEvent::BatchFinished(result))?;
    Ok(result)
}

/// `ABCD...WXYZ` label of the connected wallet, if any.
pub fn wallet_label(wallet: &dyn Wallet) -> Option<String> {
    if !wallet.is_connected() {
        return None;
    }
    wallet.public_key().map(|key| key.short())
}

/// Whether claim buttons should be enabled for this wallet.
pub fn can_claim(state: &AppState, wallet: &dyn Wallet) -> bool {
    signing_identity(wallet).is_some()
        && state.connection().is_some()
        && !state.is_claiming_all()
        && state.claiming_pool().is_none()
}
