use crate::error::ClaimError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base58-encoded 32-byte account address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(s: &str) -> Result<Self, ClaimError> {
        let s = s.trim();
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| ClaimError::Unknown(format!("Invalid address {s}: {e}")))?;
        if bytes.len() != 32 {
            return Err(ClaimError::Unknown(format!(
                "Invalid address {s}: expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, as used in notification texts.
    pub fn prefix(&self) -> &str {
        prefix8(&self.0)
    }

    /// `ABCD...WXYZ` label for a connected wallet.
    pub fn short(&self) -> String {
        let n = self.0.len();
        if n <= 8 {
            return self.0.clone();
        }
        format!("{}...{}", &self.0[..4], &self.0[n - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = ClaimError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Transaction signature returned by the wallet after submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub String);

impl Signature {
    pub fn prefix(&self) -> &str {
        prefix8(&self.0)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn prefix8(s: &str) -> &str {
    // base58 is ASCII so byte slicing is safe
    &s[..s.len().min(8)]
}

/// Accrued fees of one pool, amounts in the smallest unit of each asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeSnapshot {
    pub pool_address: Address,
    pub partner_base_fee: u64,
    pub partner_quote_fee: u64,
    pub creator_base_fee: u64,
    pub creator_quote_fee: u64,
    pub total_trading_base_fee: u64,
    pub total_trading_quote_fee: u64,
}

impl FeeSnapshot {
    pub fn partner_total(&self) -> u128 {
        self.partner_base_fee as u128 + self.partner_quote_fee as u128
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
}

/// Durability level requested when reading or confirming state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

/// Recent blockhash plus the last block height at which it stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

/// Status of a submitted transaction as reported by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<serde_json::Value>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    pub fn reached(&self, commitment: Commitment) -> bool {
        self.confirmation_status
            .map(|c| c >= commitment)
            .unwrap_or(false)
    }
}

/// Inputs handed to the transaction builder for one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimParams {
    pub pool: Address,
    pub fee_claimer: Address,
    pub payer: Address,
    pub receiver: Address,
    pub max_base_amount: u64,
    pub max_quote_amount: u64,
}

/// Transaction produced by the program client. Opaque to this crate apart
/// from the recent blockhash slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    pub payload: serde_json::Value,
    pub recent_blockhash: Option<String>,
}

impl UnsignedTransaction {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            payload,
            recent_blockhash: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: &Checkpoint) -> Self {
        self.recent_blockhash = Some(checkpoint.blockhash.clone());
        self
    }
}

/// Submission options forwarded to the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: Commitment,
    pub max_retries: u32,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
            max_retries: 3,
        }
    }
}

/// Terminal result of one claim invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ClaimOutcome {
    Success { signature: Signature },
    Failed { error: ClaimError },
    SkippedBelowThreshold { value_usd: f64 },
    SkippedNoWallet,
}

/// Record of one claim invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimAttempt {
    pub pool: Address,
    /// Submit-and-confirm attempts performed, zero when skipped locally.
    pub attempts: u32,
    pub last_error: Option<ClaimError>,
    pub outcome: ClaimOutcome,
}

impl ClaimAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ClaimOutcome::Success { .. })
    }

    pub fn signature(&self) -> Option<&Signature> {
        match &self.outcome {
            ClaimOutcome::Success { signature } => Some(signature),
            _ => None,
        }
    }

    /// Error equivalent of the outcome, `None` on success.
    pub fn error(&self) -> Option<ClaimError> {
        match &self.outcome {
            ClaimOutcome::Success { .. } => None,
            ClaimOutcome::Failed { error } => Some(error.clone()),
            ClaimOutcome::SkippedNoWallet => Some(ClaimError::WalletNotConnected),
            ClaimOutcome::SkippedBelowThreshold { .. } => self.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.success + self.failed + self.skipped
    }

    pub fn severity(&self) -> Severity {
        if self.success > 0 {
            Severity::Success
        } else {
            Severity::Error
        }
    }
}

/// Per-pool card data for the display layer.
#[derive(Debug, Clone, Serialize)]
pub struct FeeView {
    pub pool_address: Address,
    pub partner_fees_usd: f64,
    pub claimable: bool,
    pub partner_base: String,
    pub partner_quote: String,
    pub creator_base: String,
    pub creator_quote: String,
    pub total_trading_base: String,
    pub total_trading_quote: String,
}

/// Render a smallest-unit amount as a whole-token decimal string.
pub fn format_units(amount: u64, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let scale = 10u64.pow(decimals);
    format!(
        "{}.{:0width$}",
        amount / scale,
        amount % scale,
        width = decimals as usize
    )
}
