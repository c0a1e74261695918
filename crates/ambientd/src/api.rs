use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
    entities: usize,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
            entities: state.engine.state_snapshot().entities.len(),
        }),
    )
}

/// Handler for GET /v1/apps: last status reported by each app
#[tracing::instrument(skip(state))]
async fn apps(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/apps request");
    let status = state.engine.app_status_snapshot();
    (StatusCode::OK, Json(status.as_ref().clone()))
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/apps", get(apps))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    engine: Arc<Engine>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::App;
    use crate::engine::AppContext;
    use crate::engine::Event;
    use crate::engine::Subscription;

    struct StatusApp;

    impl App for StatusApp {
        fn name(&self) -> &str {
            "status_app"
        }

        fn subscriptions(&self) -> Vec<Subscription> {
            Vec::new()
        }

        fn handle_event(&mut self, _event: &Event, _ctx: &mut AppContext) {}

        fn status_json(&self) -> Value {
            json!({"is_playing_video": false})
        }
    }

    fn router() -> Router {
        let mut engine = Engine::new();
        engine.register_app(Box::new(StatusApp));
        create_router(Arc::new(AppState {
            version: "test",
            engine: Arc::new(engine),
        }))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_ping() {
        let (status, body) = get_json("/v1/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_info() {
        let (status, body) = get_json("/v1/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], json!("test"));
        assert_eq!(body["entities"], json!(0));
        assert!(body["hostname"].is_string());
    }

    #[tokio::test]
    async fn test_apps_reports_registered_status() {
        let (status, body) = get_json("/v1/apps").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status_app": {"is_playing_video": false}}));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = router()
            .oneshot(Request::get("/v1/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
