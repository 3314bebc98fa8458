//! Podium REST API
//!
//! HTTP API layer for Podium, built with Axum.
//!
//! # Endpoints
//!
//! ## Sellers
//! - `GET /api/v1/sellers` - Roster
//! - `POST /api/v1/sellers` - Add a seller
//!
//! ## Campaigns
//! - `GET /api/v1/campaigns` - List campaigns
//! - `POST /api/v1/campaigns` - Submit a campaign draft
//! - `GET /api/v1/campaigns/:id` - Campaign and participants
//! - `GET /api/v1/campaigns/:id/ranking` - Ranking
//! - `GET /api/v1/campaigns/:id/board` - Scoreboard view model
//! - `GET /api/v1/campaigns/:id/export` - Ranking as CSV or JSON
//!
//! ## Builder
//! - `POST /api/v1/builder/apply` - Apply one edit to a draft
//!
//! ## Sales
//! - `POST /api/v1/campaigns/:id/sales` - Record a sale
//! - `PUT /api/v1/sales/:id` - Replace a sale value
//! - `DELETE /api/v1/sales/:id` - Remove a sale
//!
//! ## Screens
//! - `GET /admin` - Admin screen data
//! - `GET /display/:id` - Display screen data, `/admin` redirect otherwise
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /ws` - Live display feed
//!
//! # Example
//!
//! ```rust,ignore
//! use podium::api::{serve, ApiConfig, AppState};
//! use podium::store::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("podium.db", 256)?);
//!     let config = ApiConfig::default();
//!
//!     let state = AppState::new(store, config.clone());
//!     serve(state, &config).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Seller routes
        .route(
            "/sellers",
            get(routes::sellers::list_sellers).post(routes::sellers::create_seller),
        )
        // Campaign routes
        .route(
            "/campaigns",
            get(routes::campaigns::list_campaigns).post(routes::campaigns::create_campaign),
        )
        .route("/campaigns/:id", get(routes::campaigns::get_campaign))
        .route("/campaigns/:id/ranking", get(routes::campaigns::get_ranking))
        .route("/campaigns/:id/board", get(routes::campaigns::get_board))
        .route("/campaigns/:id/export", get(routes::export::export_ranking))
        // Sale routes
        .route("/campaigns/:id/sales", post(routes::sales::record_sale))
        .route(
            "/sales/:id",
            put(routes::sales::update_sale).delete(routes::sales::delete_sale),
        )
        // Builder routes
        .route("/builder/apply", post(routes::builder::apply_edit));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.cors_origins);
    let timeout = TimeoutLayer::new(state.config.request_timeout);
    let body_limit = DefaultBodyLimit::max(state.config.max_body_size);

    let shared_state = Arc::new(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .route("/admin", get(routes::screens::admin))
        .route("/display", get(routes::screens::display_without_id))
        .route("/display/:id", get(routes::screens::display))
        .route("/ws", get(websocket_handler))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
        .layer(timeout)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let forwarder = Arc::clone(&state.ws_hub).forward_sales(state.store.subscribe_sales());
    let backend = state.store.backend();
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(backend, "Podium API listening on {}", addr);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)));

    forwarder.abort();
    result?;

    tracing::info!("Podium API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CampaignStore, SqliteStore};
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::Value;
    use tower::util::ServiceExt;
    use uuid::Uuid;

    fn create_test_app() -> (Router, Arc<dyn CampaignStore>) {
        let store: Arc<dyn CampaignStore> = Arc::new(SqliteStore::open_in_memory(64).unwrap());
        let state = AppState::new(Arc::clone(&store), ApiConfig::default());
        (build_router(state), store)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_campaign(app: &Router, store: &Arc<dyn CampaignStore>) -> (Uuid, Uuid, Uuid) {
        let carlos = store.add_seller("Carlos Silva", None).await.unwrap();
        let ana = store.add_seller("Ana Costa", None).await.unwrap();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/campaigns",
                serde_json::json!({
                    "name": "Campanha Q4",
                    "participants": [carlos.id, ana.id],
                    "metric_type": "monetary",
                    "goals_enabled": true,
                    "individual_goal": 150000.0,
                    "team_goal": 1000000.0
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        let id: Uuid = body["campaign"]["id"].as_str().unwrap().parse().unwrap();
        assert_eq!(body["display_url"], format!("/display/{}", id));

        (id, carlos.id, ana.id)
    }

    #[tokio::test]
    async fn test_health_live() {
        let (app, _store) = create_test_app();
        let response = app.oneshot(get("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let (app, _store) = create_test_app();
        let response = app.oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_full() {
        let (app, _store) = create_test_app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "sqlite");
    }

    #[tokio::test]
    async fn test_sellers_roundtrip() {
        let (app, _store) = create_test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/v1/sellers",
                serde_json::json!({"name": "Juliana Santos"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.oneshot(get("/api/v1/sellers")).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(body["sellers"][0]["name"], "Juliana Santos");
    }

    #[tokio::test]
    async fn test_create_seller_blank_name() {
        let (app, _store) = create_test_app();
        let response = app
            .oneshot(post_json("/api/v1/sellers", serde_json::json!({"name": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_campaign_invalid_draft() {
        let (app, store) = create_test_app();

        let response = app
            .oneshot(post_json("/api/v1/campaigns", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        let fields: Vec<&str> = body["error"]["details"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|d| d["field"].as_str())
            .collect();
        assert!(fields.contains(&"name"));
        assert!(fields.contains(&"participants"));

        assert!(store.list_campaigns().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ranking_and_board() {
        let (app, store) = create_test_app();
        let (campaign_id, carlos, ana) = create_campaign(&app, &store).await;

        for (seller_id, value) in [(carlos, 100000.0), (ana, 172000.0), (carlos, 85000.0)] {
            let response = app
                .clone()
                .oneshot(post_json(
                    &format!("/api/v1/campaigns/{}/sales", campaign_id),
                    serde_json::json!({"seller_id": seller_id, "value": value}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/campaigns/{}/ranking", campaign_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["entries"][0]["name"], "Carlos Silva");
        assert_eq!(body["entries"][0]["value"], 185000.0);
        assert_eq!(body["team_total"], 357000.0);

        let response = app
            .oneshot(get(&format!("/api/v1/campaigns/{}/board", campaign_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["campaign_id"], campaign_id.to_string());
    }

    #[tokio::test]
    async fn test_record_sale_negative_value() {
        let (app, store) = create_test_app();
        let (campaign_id, carlos, _) = create_campaign(&app, &store).await;

        let response = app
            .oneshot(post_json(
                &format!("/api/v1/campaigns/{}/sales", campaign_id),
                serde_json::json!({"seller_id": carlos, "value": -5.0}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ranking_unknown_campaign() {
        let (app, _store) = create_test_app();
        let response = app
            .oneshot(get(&format!("/api/v1/campaigns/{}/ranking", Uuid::new_v4())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_display_redirects_to_admin() {
        let (app, _store) = create_test_app();

        for uri in [
            "/display".to_string(),
            "/display/not-a-uuid".to_string(),
            format!("/display/{}", Uuid::new_v4()),
        ] {
            let response = app.clone().oneshot(get(&uri)).await.unwrap();
            assert!(response.status().is_redirection(), "{}", uri);
            assert_eq!(response.headers()[header::LOCATION], "/admin");
        }
    }

    #[tokio::test]
    async fn test_display_known_campaign() {
        let (app, store) = create_test_app();
        let (campaign_id, _, _) = create_campaign(&app, &store).await;

        let response = app
            .oneshot(get(&format!("/display/{}", campaign_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_screen() {
        let (app, store) = create_test_app();
        create_campaign(&app, &store).await;

        let response = app.oneshot(get("/admin")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["sellers"].as_array().unwrap().len(), 2);
        assert_eq!(body["campaigns"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_builder_apply() {
        let (app, _store) = create_test_app();

        let response = app
            .oneshot(post_json(
                "/api/v1/builder/apply",
                serde_json::json!({"edit": {"op": "set_name", "name": "Campanha Q4"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["draft"]["name"], "Campanha Q4");
        assert_eq!(body["valid"], false);
    }

    #[tokio::test]
    async fn test_export_csv() {
        let (app, store) = create_test_app();
        let (campaign_id, _, _) = create_campaign(&app, &store).await;

        let response = app
            .clone()
            .oneshot(get(&format!(
                "/api/v1/campaigns/{}/export?format=csv",
                campaign_id
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .contains(".csv"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("rank,seller_id,name"));

        let response = app
            .oneshot(get(&format!(
                "/api/v1/campaigns/{}/export?format=xml",
                campaign_id
            )))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_json_rejected() {
        let (app, _store) = create_test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sellers")
                    .header("Content-Type", "application/json")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
