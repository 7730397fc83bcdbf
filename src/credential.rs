// 🔐 Credential Cache - bearer token for the risk provider
//
// The provider hands out short-lived JWTs in exchange for a long-lived API key.
// The signature is never verified; only the embedded expiry is read to decide
// when to re-authenticate.

use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

// ============================================================================
// TOKEN SOURCE
// ============================================================================

/// Something that can exchange long-lived credentials for a fresh bearer token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn authenticate(&self) -> Result<String, ProviderError>;
}

// ============================================================================
// CREDENTIAL
// ============================================================================

/// Registered claims we care about. Everything else in the token is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// A bearer token plus whatever we could read out of it.
#[derive(Debug, Clone)]
pub struct Credential {
    token: String,
    claims: Option<Claims>,
}

impl Credential {
    /// Parse a token without checking its signature.
    ///
    /// Fails if the token is malformed or its `exp` claim has passed. A token
    /// without `exp` is accepted.
    pub fn parse(token: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &unverified_validation())?;
        Ok(Credential {
            token: token.to_string(),
            claims: Some(data.claims),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn subject(&self) -> Option<&str> {
        self.claims.as_ref().and_then(|c| c.sub.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims
            .as_ref()
            .and_then(|c| c.exp)
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }
}

fn unverified_validation() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_aud = false;
    validation.leeway = 0;
    validation
}

// ============================================================================
// CREDENTIAL MANAGER
// ============================================================================

/// Holds the current token and renews it when it is missing or expired.
///
/// The lock is held across the refresh, so concurrent callers wait for a
/// single authentication exchange instead of each starting their own.
pub struct CredentialManager<S> {
    source: S,
    held: Mutex<Option<String>>,
}

impl<S: TokenSource> CredentialManager<S> {
    pub fn new(source: S) -> Self {
        CredentialManager {
            source,
            held: Mutex::new(None),
        }
    }

    /// Start from an already known token (it is still checked before use).
    pub fn with_token(source: S, token: impl Into<String>) -> Self {
        CredentialManager {
            source,
            held: Mutex::new(Some(token.into())),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Returns a credential usable for the next request.
    pub async fn valid_credential(&self) -> Result<Credential, ProviderError> {
        let mut held = self.held.lock().await;

        if let Some(token) = held.as_deref() {
            match Credential::parse(token) {
                Ok(credential) => return Ok(credential),
                Err(e) => debug!(error = %e, "held credential unusable, re-authenticating"),
            }
        }

        let token = self
            .source
            .authenticate()
            .await
            .map_err(|e| ProviderError::Auth(Box::new(e)))?;

        let credential = match Credential::parse(&token) {
            Ok(credential) => credential,
            Err(e) => {
                // Still usable as an opaque bearer token; it is renewed on every call.
                warn!(error = %e, "provider issued a token we cannot read");
                Credential {
                    token: token.clone(),
                    claims: None,
                }
            }
        };

        *held = Some(token);
        Ok(credential)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    pub(crate) fn mint_token(sub: &str, expires_in_secs: i64) -> String {
        let exp = Utc::now().timestamp() + expires_in_secs;
        encode(
            &Header::default(),
            &serde_json::json!({ "sub": sub, "exp": exp }),
            &EncodingKey::from_secret(b"provider-secret"),
        )
        .unwrap()
    }

    #[derive(Clone, Default)]
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl TokenSource for CountingSource {
        async fn authenticate(&self) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Status(401));
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(mint_token("project", 3600))
        }
    }

    #[test]
    fn test_parse_valid_token() {
        let token = mint_token("hi@example.com", 3600);
        let credential = Credential::parse(&token).unwrap();

        assert_eq!(credential.subject(), Some("hi@example.com"));
        assert_eq!(credential.token(), token);
        assert!(credential.expires_at().unwrap() > Utc::now());
    }

    #[test]
    fn test_parse_expired_token() {
        let token = mint_token("hi@example.com", -3600);
        let err = Credential::parse(&token).unwrap_err();

        assert!(matches!(
            err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        ));
    }

    #[test]
    fn test_parse_ignores_signature_and_missing_exp() {
        // signed with a key we never see
        let token = encode(
            &Header::default(),
            &serde_json::json!({ "sub": "someone", "expires": 4094686927i64 }),
            &EncodingKey::from_secret(b"not-our-secret"),
        )
        .unwrap();

        let credential = Credential::parse(&token).unwrap();
        assert_eq!(credential.subject(), Some("someone"));
        assert!(credential.expires_at().is_none());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Credential::parse("").is_err());
        assert!(Credential::parse("not.a.jwt").is_err());
    }

    #[tokio::test]
    async fn test_lazy_authentication() {
        let source = CountingSource::default();
        let manager = CredentialManager::new(source.clone());

        let first = manager.valid_credential().await.unwrap();
        let second = manager.valid_credential().await.unwrap();

        assert_eq!(first.token(), second.token());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_token_triggers_one_reauthentication() {
        let source = CountingSource::default();
        let manager = CredentialManager::with_token(source.clone(), mint_token("project", -60));

        let credential = manager.valid_credential().await.unwrap();
        assert!(credential.expires_at().unwrap() > Utc::now());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // renewed token is reused
        manager.valid_credential().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_valid_token_skips_authentication() {
        let source = CountingSource::default();
        let manager = CredentialManager::with_token(source.clone(), mint_token("project", 600));

        manager.valid_credential().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let source = CountingSource::default();
        let manager = Arc::new(CredentialManager::new(source.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move { manager.valid_credential().await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_propagates() {
        let source = CountingSource {
            fail: true,
            ..Default::default()
        };
        let manager = CredentialManager::with_token(source.clone(), mint_token("project", -60));

        let err = manager.valid_credential().await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));

        // stale token is not handed out, the next call tries again
        assert!(manager.valid_credential().await.is_err());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
