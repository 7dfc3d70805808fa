/// Actix-web HTTP server for the realtime service
///
/// Endpoints:
/// - GET /health - Health check
/// - GET /ws?projectId=... - WebSocket upgrade for a collaboration scope
/// - POST /internal/v1/mutations - Inbound mutation notifications from
///   write-path services (always best-effort, always 202 once accepted)
/// - GET /api/v1/cache/providers - Operator view of the store provider
use crate::broadcaster::{Broadcaster, DeliveryHandler};
use crate::channel::BroadcastTransport;
use crate::registry::SessionRegistry;
use crate::websocket::CollabWebSocket;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, App, HttpRequest, HttpResponse, HttpServer, Responder, Result};
use actix_web_actors::ws;
use erd_studio_cache::{available_providers, IdempotencyGuard, KeyValueStore, StoreProvider, StoreStats};
use erd_studio_core::auth::{has_minimum_role, Role, SessionResolver};
use erd_studio_core::error::{ErdStudioError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared state for all handlers
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub transport: Arc<dyn BroadcastTransport>,
    pub broadcaster: Arc<Broadcaster>,
    pub delivery: Arc<DeliveryHandler>,
    pub store: Arc<dyn KeyValueStore>,
    pub sessions: Arc<dyn SessionResolver>,
    pub idempotency: IdempotencyGuard,
    pub provider: StoreProvider,
}

/// Map an error kind to a transport status code. This is the only place
/// kinds meet HTTP.
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Store | ErrorKind::Transport => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &ErdStudioError) -> HttpResponse {
    HttpResponse::build(status_for(err.kind()))
        .json(serde_json::json!({ "error": err.to_string() }))
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "erd-studio-realtime",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    #[serde(rename = "projectId")]
    project_id: String,
}

/// WebSocket connection endpoint
#[get("/ws")]
async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let Some(token) = bearer_token(&req) else {
        return Ok(error_response(&ErdStudioError::Unauthorized(
            "missing bearer token".to_string(),
        )));
    };

    let auth = match state.sessions.resolve(&token).await {
        Ok(auth) => auth,
        Err(e) => return Ok(error_response(&e)),
    };

    if !has_minimum_role(&auth, Role::Viewer) {
        return Ok(error_response(&ErdStudioError::Forbidden(
            "viewer role required to subscribe".to_string(),
        )));
    }

    let session_id = req
        .headers()
        .get("X-Session-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let ws_session = CollabWebSocket::new(
        query.into_inner().project_id,
        session_id,
        auth,
        state.registry.clone(),
        state.transport.clone(),
        state.delivery.clone(),
    );
    ws::start(ws_session, &req, stream)
}

/// Notification from a write-path service that a mutation committed
#[derive(Debug, Deserialize)]
pub struct MutationNotice {
    /// Tables the mutation directly touched
    #[serde(rename = "tableIds", default)]
    pub table_ids: BTreeSet<String>,

    /// Known schema for coarse-grained events
    #[serde(rename = "schemaId")]
    pub schema_id: Option<String>,

    /// New schema name, when the mutation was a rename
    #[serde(rename = "schemaName")]
    pub schema_name: Option<String>,

    /// Originating session, for echo suppression
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// Accept a mutation notification and broadcast it, fire-and-forget.
///
/// The mutation already committed before this call, so nothing past the
/// idempotency claim can fail the request: the broadcast itself proceeds on
/// its own task and any failure there is logged and dropped.
#[post("/internal/v1/mutations")]
async fn ingest_mutation(
    req: HttpRequest,
    body: web::Json<MutationNotice>,
    state: web::Data<AppState>,
) -> HttpResponse {
    if let Some(token) = req
        .headers()
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
    {
        match state.idempotency.claim(token).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(token = %token, "Duplicate mutation notification suppressed");
                return HttpResponse::Accepted()
                    .json(serde_json::json!({ "accepted": true, "duplicate": true }));
            }
            // losing the claim write changes correctness; surface it
            Err(e) => return error_response(&ErdStudioError::StoreError(e.to_string())),
        }
    }

    let notice = body.into_inner();

    if !notice.table_ids.is_empty() {
        state
            .broadcaster
            .notify_tables_changed(notice.session_id, notice.table_ids);
    } else if let Some(schema_id) = notice.schema_id {
        match notice.schema_name {
            Some(name) => {
                state
                    .broadcaster
                    .notify_schema_renamed(notice.session_id, schema_id, name)
            }
            None => state
                .broadcaster
                .notify_schema_changed(notice.session_id, schema_id),
        }
    } else {
        return HttpResponse::BadRequest()
            .json(serde_json::json!({ "error": "tableIds or schemaId required" }));
    }

    HttpResponse::Accepted().json(serde_json::json!({ "accepted": true }))
}

#[derive(Debug, Serialize)]
struct ProvidersResponse {
    current: StoreProvider,
    available: Vec<StoreProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<StoreStats>,
}

/// Operator view: current store provider, alternatives, provider stats
#[get("/api/v1/cache/providers")]
async fn cache_providers(state: web::Data<AppState>) -> impl Responder {
    // stats are observability only; a provider hiccup degrades the payload
    // instead of failing the request
    let stats = match state.store.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(error = %e, "Store stats unavailable");
            None
        }
    };

    HttpResponse::Ok().json(ProvidersResponse {
        current: state.provider,
        available: available_providers().to_vec(),
        stats,
    })
}

/// Start the realtime server
pub async fn start_server(state: AppState, host: &str, port: u16) -> std::io::Result<()> {
    tracing::info!("Starting ERD Studio realtime service on {}:{}", host, port);

    let data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(health_check)
            .service(websocket)
            .service(ingest_mutation)
            .service(cache_providers)
    })
    .bind((host, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LocalBroadcast;
    use crate::hierarchy::{HierarchyError, SchemaHierarchy};
    use crate::session::{store_session, StoreSessionResolver};
    use actix_web::{test, App};
    use async_trait::async_trait;
    use erd_studio_cache::MemoryStore;
    use erd_studio_core::auth::AuthContext;
    use std::time::Duration;

    struct StaticHierarchy;

    #[async_trait]
    impl SchemaHierarchy for StaticHierarchy {
        async fn schema_of_table(&self, _: &str) -> Result<Option<String>, HierarchyError> {
            Ok(Some("sch-1".to_string()))
        }

        async fn project_of_schema(&self, _: &str) -> Result<Option<String>, HierarchyError> {
            Ok(Some("proj-1".to_string()))
        }
    }

    async fn test_state() -> web::Data<AppState> {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new(256));
        let transport: Arc<dyn BroadcastTransport> = Arc::new(LocalBroadcast::new());
        let registry = Arc::new(SessionRegistry::new());
        let delivery = Arc::new(DeliveryHandler::new(registry.clone()));
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::new(StaticHierarchy),
            transport.clone(),
        ));
        let sessions: Arc<dyn SessionResolver> =
            Arc::new(StoreSessionResolver::new(store.clone()));

        web::Data::new(AppState {
            registry,
            transport,
            broadcaster,
            delivery,
            store: store.clone(),
            sessions,
            idempotency: IdempotencyGuard::new(store, Duration::from_secs(60)),
            provider: StoreProvider::Memory,
        })
    }

    #[actix_web::test]
    async fn test_health_check() {
        let app = test::init_service(App::new().service(health_check)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn test_ingest_mutation_accepted() {
        let state = test_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).service(ingest_mutation)).await;

        let req = test::TestRequest::post()
            .uri("/internal/v1/mutations")
            .set_json(serde_json::json!({
                "tableIds": ["t1", "t2"],
                "sessionId": "sess-A"
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[actix_web::test]
    async fn test_ingest_mutation_requires_some_scope() {
        let state = test_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).service(ingest_mutation)).await;

        let req = test::TestRequest::post()
            .uri("/internal/v1/mutations")
            .set_json(serde_json::json!({}))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_ingest_mutation_deduplicates_by_idempotency_key() {
        let state = test_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).service(ingest_mutation)).await;

        let request = || {
            test::TestRequest::post()
                .uri("/internal/v1/mutations")
                .insert_header(("Idempotency-Key", "req-1"))
                .set_json(serde_json::json!({ "tableIds": ["t1"] }))
                .to_request()
        };

        let first: serde_json::Value = test::call_and_read_body_json(&app, request()).await;
        assert_eq!(first["accepted"], true);
        assert!(first.get("duplicate").is_none());

        let second: serde_json::Value = test::call_and_read_body_json(&app, request()).await;
        assert_eq!(second["duplicate"], true);
    }

    #[actix_web::test]
    async fn test_cache_providers_listing() {
        let state = test_state().await;
        let app =
            test::init_service(App::new().app_data(state.clone()).service(cache_providers)).await;

        let req = test::TestRequest::get()
            .uri("/api/v1/cache/providers")
            .to_request();

        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["current"], "memory");
        assert_eq!(body["available"], serde_json::json!(["memory", "redis"]));
        assert!(body["stats"].is_object());
    }

    #[actix_web::test]
    async fn test_websocket_requires_token() {
        let state = test_state().await;
        let app = test::init_service(App::new().app_data(state.clone()).service(websocket)).await;

        let req = test::TestRequest::get()
            .uri("/ws?projectId=proj-1")
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_websocket_rejects_unknown_token() {
        let state = test_state().await;
        let app = test::init_service(App::new().app_data(state.clone()).service(websocket)).await;

        let req = test::TestRequest::get()
            .uri("/ws?projectId=proj-1")
            .insert_header(("Authorization", "Bearer tok-unknown"))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_websocket_accepts_known_token_up_to_handshake() {
        let state = test_state().await;

        let ctx = AuthContext {
            user_id: "u-1".to_string(),
            role: Role::Viewer,
        };
        store_session(&state.store, "tok-1", &ctx, Duration::from_secs(60))
            .await
            .unwrap();

        let app = test::init_service(App::new().app_data(state.clone()).service(websocket)).await;

        let req = test::TestRequest::get()
            .uri("/ws?projectId=proj-1")
            .insert_header(("Authorization", "Bearer tok-1"))
            .to_request();

        // auth passed; the request then fails the WebSocket handshake
        // because the test request carries no upgrade headers
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[::core::prelude::v1::test]
    fn test_status_mapping_is_boundary_only() {
        assert_eq!(status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorKind::Store), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_for(ErrorKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
