// 🏷️ Risk Categories - labels returned by the provider
// Deduplication: sort, then collapse adjacent equal values (exact match)

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RISK CATEGORY
// ============================================================================

/// A risk classification label such as "Banned" or "Scam".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskCategory(String);

impl RiskCategory {
    pub fn new(name: impl Into<String>) -> Self {
        RiskCategory(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RiskCategory {
    fn from(s: &str) -> Self {
        RiskCategory(s.to_string())
    }
}

impl From<String> for RiskCategory {
    fn from(s: String) -> Self {
        RiskCategory(s)
    }
}

// ============================================================================
// HISTORY ENTRY
// ============================================================================

/// One stored category together with the revision the ledger assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRiskCategory {
    pub category: String,
    pub revision: u64,
}

// ============================================================================
// DEDUPLICATION
// ============================================================================

/// Sorts the input and drops repeated entries. Ordering of the input is lost.
pub fn unique_sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items.dedup();
    items
}
