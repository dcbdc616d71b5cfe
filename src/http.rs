use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use log::{error, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::address::Address;
use crate::api::{GeoResult, GeoRouter};
use crate::error::ApiError;

/// axum app state, grounded on the orchestrator's `GatewayState` pattern
/// (a cheaply-`Clone`able handle wrapping the shared owner).
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RwLock<GeoRouter>>,
}

#[derive(Deserialize)]
pub struct ChainQuery {
    #[serde(default, rename = "dontChain")]
    dont_chain: u8,
}

/// §6.2 response shape.
#[derive(Serialize)]
struct GeoResponse {
    #[serde(rename = "ReqId")]
    req_id: String,
    #[serde(rename = "Lat")]
    lat: f64,
    #[serde(rename = "Lng")]
    lng: f64,
    #[serde(rename = "Address")]
    address: Address,
    #[serde(rename = "MaxRequestsPerDay")]
    max_requests_per_day: u64,
    #[serde(rename = "MaxRequestsPerUser")]
    max_requests_per_user: u64,
    #[serde(rename = "CurDailyRequestsUsed")]
    cur_daily_requests_used: u64,
    #[serde(rename = "CurUserRequestsUsed")]
    cur_user_requests_used: u64,
    #[serde(rename = "Error")]
    error: String,
    #[serde(rename = "Provider")]
    provider: String,
}

fn render(req_id: String, lat: f64, lng: f64, result: GeoResult) -> GeoResponse {
    // §7: EmptyResult leaks to the caller as a successful response carrying
    // the Unbekannt sentinel address, never as a populated Error string.
    let (address, error) = match &result.error {
        Some(ApiError::EmptyResult) => (Address::unknown(), String::new()),
        Some(ApiError::NoRequestsLeft) => (result.address, ApiError::NoRequestsLeft.to_string()),
        Some(ApiError::Generic(msg)) => (result.address, msg.clone()),
        None => (result.address, String::new()),
    };

    GeoResponse {
        req_id,
        lat,
        lng,
        address,
        max_requests_per_day: result.quota.max_requests_per_day,
        max_requests_per_user: result.quota.max_requests_per_user,
        cur_daily_requests_used: result.quota.cur_daily_requests_used,
        cur_user_requests_used: result.quota.cur_requests_by_user_used,
        error,
        provider: result.provider_name.unwrap_or_default(),
    }
}

async fn reverse_handler(
    State(state): State<AppState>,
    // `key` is accepted, threaded through for logging only, and never
    // validated — spec.md §9 calls this out as a gap to preserve.
    Path((user_id, _key, req_id, lat, lng)): Path<(String, String, String, f64, f64)>,
    Query(q): Query<ChainQuery>,
) -> impl IntoResponse {
    let router = state.router.read().await;
    let result = router.reverse(lat, lng, &user_id, q.dont_chain == 1).await;
    Json(render(req_id, lat, lng, result))
}

async fn forward_handler(
    State(state): State<AppState>,
    Path((user_id, _key, req_id, addr)): Path<(String, String, String, String)>,
    Query(q): Query<ChainQuery>,
) -> impl IntoResponse {
    let router = state.router.read().await;
    let result = router.forward(addr, &user_id, q.dont_chain == 1).await;
    Json(render(req_id, 0.0, 0.0, result))
}

async fn reparse_chain_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut router = state.router.write().await;
    match router.reparse_chain().await {
        Ok(()) => (axum::http::StatusCode::OK, "ok"),
        Err(err) => {
            error!("reparseChain failed: {err}");
            (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "reparse failed")
        }
    }
}

async fn not_found() -> impl IntoResponse {
    warn!("unknown route requested");
    (axum::http::StatusCode::NOT_FOUND, "not found")
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/reverse/:user_id/:key/:req_id/:lat/:lng",
            get(reverse_handler).post(reverse_handler),
        )
        .route(
            "/forward/:user_id/:key/:req_id/:addr",
            get(forward_handler).post(forward_handler),
        )
        .route("/reparseChain", get(reparse_chain_handler))
        .fallback(not_found)
        .with_state(state)
}

/// Integration tests drive the router in-process via `tower::ServiceExt::oneshot`,
/// grounded on the orchestrator's `gateway_tests` tree, rather than binding a
/// real socket.
#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn spawn_mock_geocoder(body: &'static str) -> String {
        let app = axum::Router::new().fallback(move || async move { body });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        format!("http://{addr}")
    }

    fn write_providers(dir: &std::path::Path, uri: &str) {
        let body = format!(
            r#"[{{"name":"P1","type":1,"uri":"{uri}","interval_size_in_days":1,"time_between_requests":0,"priority":0}}]"#
        );
        std::fs::write(dir.join("Providers.json"), body).unwrap();
    }

    async fn test_state(uri: &str) -> AppState {
        // `into_path` hands ownership of the directory to the OS temp-cleanup
        // sweep instead of `TempDir`'s drop, since `GeoRouter` holds the path
        // for its own lifetime rather than borrowing from this helper's stack.
        let dir = tempfile::tempdir().unwrap().into_path();
        write_providers(&dir, uri);
        let router = GeoRouter::load(dir).unwrap();
        AppState {
            router: Arc::new(RwLock::new(router)),
        }
    }

    #[tokio::test]
    async fn forward_route_returns_address_json() {
        let uri = spawn_mock_geocoder(r#"{"results":[{"city":"Berlin","street":"Main","house_number":"1"}]}"#).await;
        let state = test_state(&uri).await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/forward/u1/key/r1/Berlin%20Main%201")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["Address"]["city"], "Berlin");
        assert_eq!(json["Provider"], "P1");
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let uri = spawn_mock_geocoder(r#"{"results":[]}"#).await;
        let state = test_state(&uri).await;
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonsense")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
