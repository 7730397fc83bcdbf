// Wallet Screener - HTTP API
//
// POST /wallet/:address/categories  screen now, persist, return categories
// GET  /wallet/:address/categories  categories history with revisions
// GET  /health                      liveness (never rate limited)

use crate::address::Address;
use crate::categories::{HistoricalRiskCategory, RiskCategory};
use crate::error::ScreenerError;
use crate::ledger::CategoryLedger;
use crate::provider::RiskProvider;
use crate::rate_limit::RequestRateLimiter;
use crate::screening::{screen_wallet, wallet_history};
use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn RiskProvider>,
    pub ledger: Arc<dyn CategoryLedger>,
    pub limiter: Arc<RequestRateLimiter>,
}

// ============================================================================
// Responses
// ============================================================================

/// Body of a successful screening. `categories` is `[]`, never null.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScreenWalletResponse {
    pub categories: Vec<RiskCategory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletHistoryResponse {
    pub categories: Vec<HistoricalRiskCategory>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl ScreenerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScreenerError::InvalidAddress => StatusCode::BAD_REQUEST,
            ScreenerError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failures answer with a bare status code; details stay in the logs.
impl IntoResponse for ScreenerError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Terminates requests with 429 once the shared bucket is empty.
async fn request_rate(State(limiter): State<Arc<RequestRateLimiter>>, request: Request, next: Next) -> Response {
    if !limiter.allow() {
        warn!(path = %request.uri().path(), "request rate exceeded");
        return ScreenerError::RateLimited.into_response();
    }
    next.run(request).await
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
    })
}

/// POST /wallet/:address/categories
async fn screen_categories(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ScreenWalletResponse>, ScreenerError> {
    let address = Address::parse(&address).inspect_err(|e| {
        warn!(handler = "wallet", method = "screen_categories", error = %e, "unable to unmarshal request data");
    })?;

    let categories = screen_wallet(state.provider.as_ref(), state.ledger.as_ref(), &address)
        .await
        .inspect_err(|e| {
            error!(
                handler = "wallet",
                method = "screen_categories",
                address = %address,
                error = %e,
                "encountered an error retrieving risk categories"
            );
        })?;

    Ok(Json(ScreenWalletResponse { categories }))
}

/// GET /wallet/:address/categories
async fn categories_history(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<WalletHistoryResponse>, ScreenerError> {
    let address = Address::parse(&address).inspect_err(|e| {
        warn!(handler = "wallet", method = "categories_history", error = %e, "unable to unmarshal request data");
    })?;

    let categories = wallet_history(state.ledger.as_ref(), &address)
        .await
        .inspect_err(|e| {
            error!(
                handler = "wallet",
                method = "categories_history",
                address = %address,
                error = %e,
                "encountered an error retrieving risk categories history"
            );
        })?;

    Ok(Json(WalletHistoryResponse { categories }))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let wallet_routes = Router::new()
        .route(
            "/wallet/:address/categories",
            post(screen_categories).get(categories_history),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.limiter),
            request_rate,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(wallet_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::SqliteLedger;
    use crate::screening::tests::{BrokenLedger, StaticProvider};
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tower::ServiceExt;

    const ADDRESS: &str = "0x4E9ce36E442e55EcD9025B9a6E0D88485d628A67";

    fn state(provider: Arc<StaticProvider>, ledger: Arc<dyn CategoryLedger>, limit: u32) -> AppState {
        AppState {
            provider,
            ledger,
            limiter: Arc::new(RequestRateLimiter::new(limit, Duration::from_secs(60)).unwrap()),
        }
    }

    fn request(method: &str, address: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method(method)
            .uri(format!("/wallet/{address}/categories"))
            .body(Body::empty())
            .unwrap()
    }

    async fn call(app: &Router, req: HttpRequest<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap().trim().to_string())
    }

    #[tokio::test]
    async fn test_screen_invalid_address() {
        let provider = Arc::new(StaticProvider::returning(vec!["Banned"]));
        let app = router(state(provider.clone(), Arc::new(SqliteLedger::open_in_memory().unwrap()), 100));

        let (status, body) = call(&app, request("POST", "abc")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_screen_empty_categories() {
        let provider = Arc::new(StaticProvider::returning(vec![]));
        let app = router(state(provider, Arc::new(SqliteLedger::open_in_memory().unwrap()), 100));

        let (status, body) = call(&app, request("POST", ADDRESS)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"categories":[]}"#);
    }

    #[tokio::test]
    async fn test_screen_categories() {
        let provider = Arc::new(StaticProvider::returning(vec!["category1", "category2"]));
        let app = router(state(provider, Arc::new(SqliteLedger::open_in_memory().unwrap()), 100));

        let (status, body) = call(&app, request("POST", ADDRESS)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"categories":["category1","category2"]}"#);
    }

    #[tokio::test]
    async fn test_screen_provider_error() {
        let provider = Arc::new(StaticProvider::failing());
        let app = router(state(provider, Arc::new(SqliteLedger::open_in_memory().unwrap()), 100));

        let (status, body) = call(&app, request("POST", ADDRESS)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn test_screen_ledger_error_returns_no_categories() {
        let provider = Arc::new(StaticProvider::returning(vec!["Banned"]));
        let app = router(state(provider, Arc::new(BrokenLedger::default()), 100));

        let (status, body) = call(&app, request("POST", ADDRESS)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn test_history_after_screenings() {
        let provider = Arc::new(StaticProvider::returning(vec!["Banned"]));
        let app = router(state(provider, Arc::new(SqliteLedger::open_in_memory().unwrap()), 100));

        call(&app, request("POST", ADDRESS)).await;
        call(&app, request("POST", ADDRESS)).await;
        let (status, body) = call(&app, request("GET", ADDRESS)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            r#"{"categories":[{"category":"Banned","revision":1},{"category":"Banned","revision":2}]}"#
        );
    }

    #[tokio::test]
    async fn test_history_empty_and_invalid() {
        let provider = Arc::new(StaticProvider::returning(vec![]));
        let app = router(state(provider, Arc::new(SqliteLedger::open_in_memory().unwrap()), 100));

        let (status, body) = call(&app, request("GET", ADDRESS)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"categories":[]}"#);

        let (status, _) = call(&app, request("GET", "0x1234")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_history_ledger_error() {
        let provider = Arc::new(StaticProvider::returning(vec![]));
        let app = router(state(provider, Arc::new(BrokenLedger::default()), 100));

        let (status, body) = call(&app, request("GET", ADDRESS)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "");
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_before_handlers() {
        let provider = Arc::new(StaticProvider::returning(vec!["Banned"]));
        let app = router(state(provider.clone(), Arc::new(SqliteLedger::open_in_memory().unwrap()), 2));

        assert_eq!(call(&app, request("POST", ADDRESS)).await.0, StatusCode::OK);
        assert_eq!(call(&app, request("GET", ADDRESS)).await.0, StatusCode::OK);
        assert_eq!(
            call(&app, request("POST", ADDRESS)).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            call(&app, request("POST", "abc")).await.0,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_health_is_not_rate_limited() {
        let provider = Arc::new(StaticProvider::returning(vec![]));
        let app = router(state(provider, Arc::new(SqliteLedger::open_in_memory().unwrap()), 1));

        for _ in 0..3 {
            let req = HttpRequest::builder().uri("/health").body(Body::empty()).unwrap();
            let (status, body) = call(&app, req).await;
            assert_eq!(status, StatusCode::OK);
            assert!(body.contains(r#""status":"ok""#));
        }
    }
}
