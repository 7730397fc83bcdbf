// Risk Providers - remote services that score wallet addresses
//
// The screening pipeline only depends on the `RiskProvider` capability,
// never on a concrete provider.

pub mod blockmate;

pub use blockmate::{Blockmate, BlockmateConfig};

use crate::address::Address;
use crate::categories::RiskCategory;
use crate::error::ProviderError;
use async_trait::async_trait;

/// Wallet risk screening provider.
#[async_trait]
pub trait RiskProvider: Send + Sync {
    /// Returns the sorted, de-duplicated risk categories for `address`.
    async fn risk_categories(&self, address: &Address) -> Result<Vec<RiskCategory>, ProviderError>;
}

#[async_trait]
impl<P: RiskProvider + ?Sized> RiskProvider for std::sync::Arc<P> {
    async fn risk_categories(&self, address: &Address) -> Result<Vec<RiskCategory>, ProviderError> {
        (**self).risk_categories(address).await
    }
}
