// Wallet Screener - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod address;
pub mod categories;
pub mod config;
pub mod credential;
pub mod error;
pub mod http_client;
pub mod ledger;
pub mod provider;
pub mod rate_limit;
pub mod screening;
pub mod telemetry;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use address::{Address, ETH_WALLET_ADDRESS_LENGTH};
pub use categories::{unique_sorted, HistoricalRiskCategory, RiskCategory};
pub use config::Config;
pub use credential::{Credential, CredentialManager, TokenSource};
pub use error::{ProviderError, ScreenerError, StoreError};
pub use http_client::{HttpClient, RequestOption};
pub use ledger::{CategoryLedger, ChainVerification, SqliteLedger, StoredCategoryRecord};
pub use provider::{Blockmate, BlockmateConfig, RiskProvider};
pub use rate_limit::RequestRateLimiter;
pub use screening::{screen_wallet, wallet_history};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
