// 🛡️ Blockmate Risk Provider
// Exchanges the project API key for a JWT, then queries risk score details
// and flattens them into a unique list of category names.

use super::RiskProvider;
use crate::address::Address;
use crate::categories::{unique_sorted, RiskCategory};
use crate::credential::{CredentialManager, TokenSource};
use crate::error::ProviderError;
use crate::http_client::{HttpClient, RequestOption};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.blockmate.io/v1";
pub const DEFAULT_CHAIN: &str = "eth";

const AUTH_PATH: &str = "auth";
const RISK_DETAILS_PATH: &str = "risk/score/details";
const API_KEY_HEADER: &str = "X-API-KEY";

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockmateConfig {
    /// Project API key, exchanged for short-lived JWTs.
    pub api_key: String,
    pub base_url: String,
    /// Chain identifier sent with every lookup.
    pub chain: String,
    pub request_timeout_secs: u64,
}

impl Default for BlockmateConfig {
    fn default() -> Self {
        BlockmateConfig {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            chain: DEFAULT_CHAIN.to_string(),
            request_timeout_secs: 30,
        }
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

/// One category entry inside the score details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DetailsCategory {
    pub address: String,
    pub name: String,
    pub category_name: String,
    pub risk: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Details {
    pub own_categories: Vec<DetailsCategory>,
    pub source_of_funds_categories: Vec<DetailsCategory>,
}

/// Response of the risk score details endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RiskScoreDetails {
    pub case_id: String,
    pub request_datetime: Option<DateTime<Utc>>,
    pub response_datetime: Option<DateTime<Utc>>,
    pub chain: String,
    pub address: String,
    pub name: String,
    pub category_name: String,
    pub risk: i64,
    pub details: Details,
}

impl RiskScoreDetails {
    /// Category names from both lists, sorted and unique.
    pub fn unique_categories(&self) -> Vec<RiskCategory> {
        let names = self
            .details
            .own_categories
            .iter()
            .chain(&self.details.source_of_funds_categories)
            .map(|c| RiskCategory::new(c.category_name.clone()))
            .collect();
        unique_sorted(names)
    }
}

// ============================================================================
// AUTHENTICATION
// ============================================================================

/// Exchanges the API key for a JWT at the `auth` endpoint.
pub struct BlockmateAuth {
    client: HttpClient,
    api_key: String,
}

#[async_trait]
impl TokenSource for BlockmateAuth {
    async fn authenticate(&self) -> Result<String, ProviderError> {
        let response: TokenResponse = self
            .client
            .get_json(AUTH_PATH, &[RequestOption::header(API_KEY_HEADER, self.api_key.as_str())])
            .await?;
        info!("obtained new provider token");
        Ok(response.token)
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

pub struct Blockmate {
    client: HttpClient,
    chain: String,
    credentials: CredentialManager<BlockmateAuth>,
}

impl Blockmate {
    pub fn new(config: &BlockmateConfig) -> Result<Self, ProviderError> {
        let client = HttpClient::with_timeout(
            &config.base_url,
            vec![RequestOption::header("Accept", "application/json")],
            Some(Duration::from_secs(config.request_timeout_secs)),
        )?;
        Self::with_client(&config.api_key, client, &config.chain)
    }

    /// Build on top of an existing client (the API key is mandatory).
    pub fn with_client(api_key: &str, client: HttpClient, chain: &str) -> Result<Self, ProviderError> {
        if api_key.is_empty() {
            return Err(ProviderError::InvalidApiKey(api_key.to_string()));
        }

        let auth = BlockmateAuth {
            client: client.clone(),
            api_key: api_key.to_string(),
        };

        Ok(Blockmate {
            client,
            chain: chain.to_string(),
            credentials: CredentialManager::new(auth),
        })
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Full score details for `address`, authorised with a valid token.
    pub async fn risk_score_details(&self, address: &Address) -> Result<RiskScoreDetails, ProviderError> {
        let credential = self.credentials.valid_credential().await?;

        self.client
            .get_json(
                RISK_DETAILS_PATH,
                &[
                    RequestOption::query("address", address.as_str()),
                    RequestOption::query("chain", self.chain.as_str()),
                    RequestOption::bearer(credential.token()),
                ],
            )
            .await
    }
}

#[async_trait]
impl RiskProvider for Blockmate {
    async fn risk_categories(&self, address: &Address) -> Result<Vec<RiskCategory>, ProviderError> {
        let details = self.risk_score_details(address).await?;
        let categories = details.unique_categories();
        debug!(address = %address, count = categories.len(), "collected risk categories");
        Ok(categories)
    }
}
