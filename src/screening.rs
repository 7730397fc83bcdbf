// 🔎 Wallet Screening - ask the provider, persist, or fail as a whole
// History - replay what the ledger recorded for an address

use crate::address::Address;
use crate::categories::{HistoricalRiskCategory, RiskCategory};
use crate::error::{Result, ScreenerError, StoreError};
use crate::ledger::CategoryLedger;
use crate::provider::RiskProvider;
use tracing::{info, warn};

/// Screen `address` and durably record the categories found.
///
/// A ledger failure discards the provider result; the caller has to retry
/// the whole screening.
pub async fn screen_wallet<P, L>(provider: &P, ledger: &L, address: &Address) -> Result<Vec<RiskCategory>>
where
    P: RiskProvider + ?Sized,
    L: CategoryLedger + ?Sized,
{
    let categories = provider.risk_categories(address).await?;

    ledger.write_batch(address, &categories).await?;

    info!(address = %address, categories = ?categories, "wallet screened");
    Ok(categories)
}

/// Every category ever stored for `address`, paired with its revision.
///
/// The ledger cause of a failed read is logged, never returned.
pub async fn wallet_history<L>(ledger: &L, address: &Address) -> Result<Vec<HistoricalRiskCategory>>
where
    L: CategoryLedger + ?Sized,
{
    let (categories, revisions) = ledger.read_history(address).await.map_err(|e| {
        warn!(address = %address, error = %e, "history read failed");
        ScreenerError::HistoryUnavailable
    })?;

    if categories.len() != revisions.len() {
        let e = StoreError::LengthMismatch {
            values: categories.len(),
            revisions: revisions.len(),
        };
        warn!(address = %address, error = %e, "history read failed");
        return Err(ScreenerError::HistoryUnavailable);
    }

    Ok(categories
        .into_iter()
        .zip(revisions)
        .map(|(category, revision)| HistoricalRiskCategory { category, revision })
        .collect())
}
