// ⚠️ Error Taxonomy - what can go wrong while screening a wallet
// Validation, provider, ledger and admission failures stay distinguishable
// all the way up to the request boundary.

use thiserror::Error;

// ============================================================================
// PROVIDER ERRORS
// ============================================================================

/// Failures talking to the remote risk-scoring API.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("riskprovider: {0:?} is not a valid API key")]
    InvalidApiKey(String),

    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("sending request to {uri}: {source}")]
    Transport {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request resulted in {0} response code")]
    Status(u16),

    #[error("decoding provider response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("authenticating against provider: {0}")]
    Auth(#[source] Box<ProviderError>),
}

// ============================================================================
// LEDGER ERRORS
// ============================================================================

/// Failures reading from or writing to the category ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("ledger query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("ledger task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("ledger returned {values} values but {revisions} revisions")]
    LengthMismatch { values: usize, revisions: usize },

    #[error("ledger connection lock poisoned")]
    Poisoned,

    #[error("failed to store categories for address {address}: {reason}")]
    Write { address: String, reason: String },
}

// ============================================================================
// SCREENER ERRORS (request boundary)
// ============================================================================

#[derive(Debug, Error)]
pub enum ScreenerError {
    #[error("given address is not valid wallet address")]
    InvalidAddress,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// History reads hide the ledger cause from callers.
    #[error("failed to fetch historical categories")]
    HistoryUnavailable,

    #[error("too many requests")]
    RateLimited,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScreenerError {
    /// Whether the caller sent something wrong (as opposed to a server failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScreenerError::InvalidAddress | ScreenerError::RateLimited)
    }
}

pub type Result<T, E = ScreenerError> = std::result::Result<T, E>;
