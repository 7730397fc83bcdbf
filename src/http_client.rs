// 🌐 HTTP Client - request/response cycle against a remote JSON API
//
// Wraps reqwest with a fixed base URL and a set of request options that are
// applied to every request (default headers) plus per-request options
// (query params, bearer token). Any non-2xx answer is an error.

use crate::error::ProviderError;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default user agent sent with every request.
pub const USER_AGENT: &str = concat!("wallet-screener/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// REQUEST OPTIONS
// ============================================================================

/// Modifier applied to an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOption {
    /// Adds a query parameter.
    Query(String, String),
    /// Adds an arbitrary header.
    Header(String, String),
    /// Adds `Authorization: Bearer <token>`.
    BearerToken(String),
}

impl RequestOption {
    pub fn query(key: impl Into<String>, value: impl Into<String>) -> Self {
        RequestOption::Query(key.into(), value.into())
    }

    pub fn header(key: impl Into<String>, value: impl Into<String>) -> Self {
        RequestOption::Header(key.into(), value.into())
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        RequestOption::BearerToken(token.into())
    }

    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            RequestOption::Query(key, value) => builder.query(&[(key, value)]),
            RequestOption::Header(key, value) => builder.header(key.as_str(), value.as_str()),
            RequestOption::BearerToken(token) => builder.bearer_auth(token),
        }
    }
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpClient {
    base: Url,
    http: reqwest::Client,
    options: Vec<RequestOption>,
}

impl HttpClient {
    /// Build a client for `base`, applying `options` to every request.
    pub fn new(base: &str, options: Vec<RequestOption>) -> Result<Self, ProviderError> {
        Self::with_timeout(base, options, None)
    }

    pub fn with_timeout(
        base: &str,
        options: Vec<RequestOption>,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        let base = Url::parse(base)?;

        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|source| ProviderError::Transport {
            uri: base.to_string(),
            source,
        })?;

        Ok(HttpClient { base, http, options })
    }

    /// Client-wide options.
    pub fn options(&self) -> &[RequestOption] {
        &self.options
    }

    pub fn add_option(&mut self, option: RequestOption) {
        self.options.push(option);
    }

    /// Absolute URL of `path` below the base URL (the base path is kept).
    pub fn uri(&self, path: &str) -> String {
        let mut url = self.base.clone();
        let joined = format!(
            "{}/{}",
            self.base.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.to_string()
    }

    /// Issue a GET request and return the response if it was a 2xx.
    pub async fn get(&self, path: &str, options: &[RequestOption]) -> Result<Response, ProviderError> {
        let uri = self.uri(path);

        let mut builder = self.http.get(&uri);
        for option in self.options.iter().chain(options) {
            builder = option.apply(builder);
        }

        let response = builder.send().await.map_err(|source| ProviderError::Transport {
            uri: uri.clone(),
            source,
        })?;

        let status = response.status();
        debug!(uri = %uri, status = status.as_u16(), "provider responded");

        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        Ok(response)
    }

    /// GET and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &[RequestOption],
    ) -> Result<T, ProviderError> {
        let response = self.get(path, options).await?;
        response.json::<T>().await.map_err(ProviderError::Decode)
    }
}
