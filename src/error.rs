use serde::Serialize;

/// Failure taxonomy shared by fetching and claiming.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClaimError {
    #[error("RPC endpoint unavailable: {0}")]
    EndpointUnavailable(String),
    #[error("RPC access denied: {0}")]
    AccessDenied(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("Network error: {0}")]
    NetworkTimeout(String),
    #[error("Wallet not connected")]
    WalletNotConnected,
    #[error("User rejected the request: {0}")]
    UserRejected(String),
    #[error("Fees below ${minimum_usd:.2} minimum (current ${value_usd:.2})")]
    BelowThreshold { value_usd: f64, minimum_usd: f64 },
    #[error("Confirmation timeout after {waited_secs}s for {signature}")]
    ConfirmationTimeout { signature: String, waited_secs: u64 },
    #[error("Transaction failed: {0}")]
    OnChainFailure(String),
    #[error("{0}")]
    Unknown(String),
}

/// Coarse failure classes reported for a single claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    RejectedByUser,
    Timeout,
    OnChainFailure,
    TransientRpcError,
    SkippedNoWallet,
    SkippedBelowThreshold,
    Unknown,
}

impl ClaimError {
    /// Best-effort classification of a free-form error message.
    ///
    /// Wallets and RPC providers do not agree on error shapes, so this only
    /// looks for well-known fragments. A rejection worded in an unexpected way
    /// ends up as `Unknown`.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if lower.contains("403") || lower.contains("forbidden") {
            Self::AccessDenied(message)
        } else if lower.contains("429")
            || lower.contains("rate limit")
            || lower.contains("too many requests")
        {
            Self::RateLimited(message)
        } else if lower.contains("user rejected")
            || lower.contains("rejected the request")
            || lower.contains("declined")
        {
            Self::UserRejected(message)
        } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("network")
        {
            Self::NetworkTimeout(message)
        } else {
            Self::Unknown(message)
        }
    }

    /// Map a non-success HTTP status from an RPC endpoint.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        let detail = format!("HTTP {status}: {snippet}");
        match status {
            403 => Self::AccessDenied(detail),
            429 => Self::RateLimited(detail),
            408 | 504 => Self::NetworkTimeout(detail),
            _ => Self::EndpointUnavailable(detail),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AccessDenied(_) | Self::RateLimited(_))
    }

    /// The transaction may still land; the outcome is not known.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::ConfirmationTimeout { .. })
    }

    pub fn category(&self) -> FailureCategory {
        match self {
            Self::UserRejected(_) => FailureCategory::RejectedByUser,
            Self::ConfirmationTimeout { .. } => FailureCategory::Timeout,
            Self::OnChainFailure(_) => FailureCategory::OnChainFailure,
            Self::EndpointUnavailable(_)
            | Self::AccessDenied(_)
            | Self::RateLimited(_)
            | Self::NetworkTimeout(_) => FailureCategory::TransientRpcError,
            Self::WalletNotConnected => FailureCategory::SkippedNoWallet,
            Self::BelowThreshold { .. } => FailureCategory::SkippedBelowThreshold,
            Self::Unknown(_) => FailureCategory::Unknown,
        }
    }

    /// Text shown when fetching pool fees failed on every endpoint.
    pub fn fetch_message(&self) -> String {
        match self {
            Self::AccessDenied(_) => {
                "RPC access denied. Please try again later or use a different RPC endpoint."
                    .to_string()
            }
            Self::RateLimited(_) => {
                "Rate limit exceeded. Please wait a moment and try again.".to_string()
            }
            Self::NetworkTimeout(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            other => format!("Error: {other}"),
        }
    }
}

impl Serialize for ClaimError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Claim(#[from] ClaimError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Config(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Claim already in progress: {0}")]
    ClaimInProgress(String),
    #[error("Pool fees not loaded yet")]
    NotReady,
}

// The display layer receives command errors as plain strings
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
