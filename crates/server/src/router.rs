//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);
    Router::new()
        .route("/health", get(api::health))
        .route("/api/health/sync", get(api::sync_health))
        .route("/api/health/sync/{sync_type}", get(api::sync_health_type))
        .route("/api/score", post(api::score))
        .route("/api/epoch", get(api::epoch))
        .route("/api/guard/run", post(api::guard_run))
        .route("/api/config", get(api::config_summary))
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!(origin, "invalid CORS_ORIGIN; allowing any origin");
            CorsLayer::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use drep_core::Config;
    use drep_ledger::{LedgerStore, MemoryLedgerStore, SyncLedger};
    use drep_notify::{Dispatcher, Telemetry};
    use drep_sync::{RefreshTrigger, SyncRegistry, UnconfiguredTrigger};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with_store(store: Arc<MemoryLedgerStore>) -> Router {
        let mut config = Config::for_profile("ROUTERTEST");
        config.server.guard_run_limit = 2;
        config.server.guard_run_window_secs = 60;
        config.refresh.secret = Some("s3cret".into());

        let store: Arc<dyn LedgerStore> = store;
        let trigger: Arc<dyn RefreshTrigger> = Arc::new(UnconfiguredTrigger);
        let state = AppState::with_parts(
            config,
            SyncLedger::new(store, Duration::from_secs(2)),
            Arc::new(SyncRegistry::standard()),
            trigger,
            Arc::new(Dispatcher::empty()),
            Arc::new(Telemetry::disabled()),
        );
        build_router(Arc::new(state))
    }

    fn app() -> Router {
        app_with_store(Arc::new(MemoryLedgerStore::new()))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let (status, body) = send(app(), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["ledger_backend"], "memory");
    }

    #[tokio::test]
    async fn empty_ledger_is_unknown() {
        let (status, body) = send(app(), get_req("/api/health/sync")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["overall"], "unknown");
        assert_eq!(body["perType"].as_array().unwrap().len(), 0);
        assert!(body.get("error").is_none());
    }

    #[tokio::test]
    async fn unreadable_ledger_is_error() {
        let store = Arc::new(MemoryLedgerStore::new());
        store.set_unavailable(true);
        let (status, body) = send(app_with_store(store), get_req("/api/health/sync")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["overall"], "error");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn fresh_run_is_healthy() {
        let store = Arc::new(MemoryLedgerStore::new());
        let ledger = SyncLedger::new(store.clone(), Duration::from_secs(2));
        let handle = ledger.start("votes").await;
        ledger
            .finalize(handle.as_ref(), true, None, serde_json::json!({ "rows": 12 }))
            .await;

        let (status, body) = send(app_with_store(store), get_req("/api/health/sync")).await;
        assert_eq!(status, StatusCode::OK);
        // The other registered types never ran.
        assert_eq!(body["overall"], "critical");
        let votes = body["perType"]
            .as_array()
            .unwrap()
            .iter()
            .find(|t| t["syncType"] == "votes")
            .unwrap();
        assert_eq!(votes["level"], "healthy");
        assert_eq!(votes["lastSuccess"], true);
    }

    #[tokio::test]
    async fn single_type_health() {
        let (status, body) = send(app(), get_req("/api/health/sync/dreps")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["syncType"], "dreps");
        assert_eq!(body["level"], "critical");
        assert!(body["staleMins"].is_null());

        let (status, body) = send(app(), get_req("/api/health/sync/treasury")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("treasury"));
    }

    #[tokio::test]
    async fn score_treats_nulls_as_zero() {
        let body = r#"{"participation": null, "rationaleRate": null, "reliability": null, "profileCompleteness": null}"#;
        let (status, resp) = send(app(), post_json("/api/score", body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["score"], 0);
    }

    #[tokio::test]
    async fn score_with_default_weights() {
        let body = r#"{"participation": 100, "rationaleRate": 100, "reliability": 100, "profileCompleteness": 100}"#;
        let (_, resp) = send(app(), post_json("/api/score", body)).await;
        assert_eq!(resp["score"], 100);
        assert_eq!(resp["breakdown"]["weights"]["rationale"], 0.35);
    }

    #[tokio::test]
    async fn score_with_custom_weights() {
        let body = r#"{"participation": 80, "weights": {"participation": 1.0, "rationale": 0.0, "reliability": 0.0, "profile": 0.0}}"#;
        let (_, resp) = send(app(), post_json("/api/score", body)).await;
        assert_eq!(resp["score"], 80);
    }

    #[tokio::test]
    async fn epoch_at_genesis() {
        let (status, body) = send(app(), get_req("/api/epoch?ts=1596059091")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["epoch"], 208);
        assert_eq!(body["epochStart"], 1596059091);
    }

    #[tokio::test]
    async fn epoch_defaults_to_now() {
        let (_, body) = send(app(), get_req("/api/epoch")).await;
        assert!(body["epoch"].as_i64().unwrap() > 500);
    }

    #[tokio::test]
    async fn config_summary_hides_secrets() {
        let (status, body) = send(app(), get_req("/api/config")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refresh"]["authenticated"], true);
        assert!(!body.to_string().contains("s3cret"));
    }

    #[tokio::test]
    async fn manual_guard_run_is_rate_limited() {
        let app = app();
        let run = || {
            Request::post("/api/guard/run")
                .header("x-forwarded-for", "198.51.100.4")
                .body(Body::empty())
                .unwrap()
        };

        let (status, report) = send(app.clone(), run()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["ghostsRepaired"], 0);
        // Nothing can be re-triggered without a refresh base URL.
        assert_eq!(report["failed"].as_array().unwrap().len(), 5);

        let (status, _) = send(app.clone(), run()).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(app.clone(), run()).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().contains("rate limited"));

        let other = Request::post("/api/guard/run")
            .header("x-forwarded-for", "198.51.100.5")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(app, other).await;
        assert_eq!(status, StatusCode::OK);
    }
}
