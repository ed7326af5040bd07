use crate::chain::ChainClient;
use crate::error::{AppError, ClaimError};
use crate::notifications::Notification;
use crate::state::{AppState, FetchStatus, StateEvent};
use crate::types::{FeeSnapshot, FeeView};
use std::sync::Arc;

/// Fetch the fee snapshot for the configured pool group, trying each RPC
/// endpoint in order. Replaces the whole snapshot on success.
pub async fn fetch_fees(state: &AppState) -> Result<Vec<FeeView>, AppError> {
    state.apply(StateEvent::FetchStarted)?;

    let pool_group = state.config().pool_config_address()?;
    let connector = Arc::clone(&state.collaborators().connector);
    let source = Arc::clone(&state.collaborators().fee_source);

    let fetched = state
        .failover()
        .fetch(|endpoint| {
            let connector = Arc::clone(&connector);
            let source = Arc::clone(&source);
            let endpoint = endpoint.clone();
            let pool_group = pool_group.clone();
            async move {
                let connection = connector.connect(&endpoint)?;
                let fees = source.pool_fees(connection.as_ref(), &pool_group).await?;
                Ok::<(Vec<FeeSnapshot>, Arc<dyn ChainClient>), ClaimError>((fees, connection))
            }
        })
        .await;

    match fetched {
        Ok(((fees, connection), _)) => {
            tracing::info!(
                "Successfully fetched {} pool fees from {}",
                fees.len(),
                connection.endpoint()
            );
            state.apply(StateEvent::FetchCompleted { fees, connection })?;
            let views = state.fee_views();
            for (i, view) in views.iter().enumerate() {
                tracing::debug!(
                    "Pool {} ({}...): partner base {} quote {} = ${:.2}, claimable: {}",
                    i + 1,
                    view.pool_address.prefix(),
                    view.partner_base,
                    view.partner_quote,
                    view.partner_fees_usd,
                    view.claimable
                );
            }
            Ok(views)
        }
        Err(e) => {
            tracing::error!("Failed to fetch pool fees from all endpoints: {e}");
            state.apply(StateEvent::FetchFailed {
                message: e.user_message(),
            })?;
            Err(AppError::Claim(e.classification()))
        }
    }
}

/// Card data for the current snapshot.
pub fn list_fees(state: &AppState) -> Vec<FeeView> {
    state.fee_views()
}

pub fn fetch_status(state: &AppState) -> FetchStatus {
    state.fetch_status()
}

/// Live notifications, oldest first.
pub fn list_notifications(state: &AppState) -> Vec<Notification> {
    state.notifications()
}
