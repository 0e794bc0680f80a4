use thiserror::Error;

/// Unified error type for the entire fund-tracker-core library.
/// Every public function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Ledger file ─────────────────────────────────────────────────
    #[error("Invalid ledger file format: {0}")]
    InvalidFileFormat(String),

    #[error("Unsupported ledger version: {0}")]
    UnsupportedVersion(u16),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("File I/O error: {0}")]
    FileIO(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // ── Quote source / Network ──────────────────────────────────────
    #[error("API error ({provider}): {message}")]
    Api {
        provider: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Quote unavailable for fund {fund_code}: {reason}")]
    QuoteUnavailable {
        fund_code: String,
        reason: String,
    },

    // ── Business Logic ──────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Fund not found: {0}")]
    FundNotFound(String),

    #[error("Holding not found: user {user_id} has no fund {fund_code}")]
    HoldingNotFound {
        user_id: i64,
        fund_code: String,
    },

    #[error("Fund {fund_code} is already held by user {user_id}")]
    DuplicateHolding {
        user_id: i64,
        fund_code: String,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl CoreError {
    /// True for the not-found family (user, fund or holding absent).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::UserNotFound(_)
                | CoreError::FundNotFound(_)
                | CoreError::HoldingNotFound { .. }
        )
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::FileIO(e.to_string())
    }
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Deserialization(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        // The quote URL carries a cache-busting timestamp; keep it out of messages.
        let msg = e.to_string();
        let sanitized = if let Some(idx) = msg.find('?') {
            format!("{}?<query redacted>", &msg[..idx])
        } else {
            msg
        };
        CoreError::Network(sanitized)
    }
}
