use crate::error::AppError;
use crate::types::{Address, Commitment, SendOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Runtime settings for fetching and claiming, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimerConfig {
    /// Tried in order on every fetch
    pub rpc_endpoints: Vec<String>,
    /// Pool-group (config account) whose pools are listed
    pub pool_config: String,
    pub min_claim_usd: f64,
    pub token_price_usd: f64,
    pub token_decimals: u32,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub confirm_timeout_secs: u64,
    pub confirm_poll_interval_ms: u64,
    /// Consecutive failed status polls before confirmation gives up
    pub confirm_max_poll_failures: u32,
    pub inter_claim_delay_ms: u64,
    pub notification_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub max_claim_amount: u64,
    pub checkpoint_commitment: Commitment,
    pub confirm_commitment: Commitment,
    pub preflight_commitment: Commitment,
    pub skip_preflight: bool,
    pub send_max_retries: u32,
}

impl Default for ClaimerConfig {
    fn default() -> Self {
        Self {
            rpc_endpoints: vec![
                "https://solana-mainnet.g.alchemy.com/v2/demo".to_string(),
                "https://api.mainnet-beta.solana.com".to_string(),
                "https://rpc.ankr.com/solana".to_string(),
                "https://solana-api.projectserum.com".to_string(),
            ],
            pool_config: "28eYKBRnoVjVCHaJUeLKYzZyBJR3c5TG1UMGQccpSZgE".to_string(),
            min_claim_usd: 1.0,
            token_price_usd: 150.0,
            token_decimals: 9,
            max_attempts: 3,
            retry_base_delay_ms: 1_000,
            confirm_timeout_secs: 60,
            confirm_poll_interval_ms: 500,
            confirm_max_poll_failures: 20,
            inter_claim_delay_ms: 1_000,
            notification_ttl_secs: 5,
            request_timeout_secs: 30,
            max_claim_amount: 1_000_000_000_000,
            checkpoint_commitment: Commitment::Finalized,
            confirm_commitment: Commitment::Confirmed,
            preflight_commitment: Commitment::Confirmed,
            skip_preflight: false,
            send_max_retries: 3,
        }
    }
}

impl ClaimerConfig {
    /// `<config dir>/fee-claimer/config.json`
    pub fn default_path() -> Result<PathBuf, AppError> {
        let dir = dirs::config_dir().ok_or_else(|| AppError::Config("No config dir".into()))?;
        Ok(dir.join("fee-claimer").join("config.json"))
    }

    /// Load from the default location, falling back to defaults when absent.
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            "Loaded config from {} ({} endpoints)",
            path.display(),
            config.rpc_endpoints.len()
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.rpc_endpoints.is_empty() {
            return Err(AppError::Config("rpc_endpoints must not be empty".into()));
        }
        self.endpoint_urls()?;
        self.pool_config_address()?;
        if !(self.token_price_usd > 0.0) {
            return Err(AppError::Config("token_price_usd must be positive".into()));
        }
        if !(self.min_claim_usd >= 0.0) {
            return Err(AppError::Config("min_claim_usd must not be negative".into()));
        }
        if self.token_decimals > 18 {
            return Err(AppError::Config("token_decimals must be at most 18".into()));
        }
        if self.max_attempts == 0 {
            return Err(AppError::Config("max_attempts must be at least 1".into()));
        }
        if self.confirm_max_poll_failures == 0 {
            return Err(AppError::Config(
                "confirm_max_poll_failures must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn endpoint_urls(&self) -> Result<Vec<Url>, AppError> {
        self.rpc_endpoints
            .iter()
            .map(|raw| {
                Url::parse(raw).map_err(|e| AppError::Config(format!("Bad endpoint {raw}: {e}")))
            })
            .collect()
    }

    pub fn pool_config_address(&self) -> Result<Address, AppError> {
        Address::parse(&self.pool_config)
            .map_err(|e| AppError::Config(format!("pool_config: {e}")))
    }

    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            skip_preflight: self.skip_preflight,
            preflight_commitment: self.preflight_commitment,
            max_retries: self.send_max_retries,
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn confirm_poll_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_poll_interval_ms)
    }

    pub fn inter_claim_delay(&self) -> Duration {
        Duration::from_millis(self.inter_claim_delay_ms)
    }

    pub fn notification_ttl(&self) -> Duration {
        Duration::from_secs(self.notification_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
