//! HTTP server — axum router exposing the assembler's modes.
//!
//! Handlers are thin: resolve the request, call the assembler, and map
//! [`ContextError`] kinds onto status codes. A missing preset is a 404 with
//! `{"error":"Not found"}`; nothing a request does can take the server down.

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::types::*;
use crate::assembler::{ContextAssembler, PresetDetail, PresetSummary};
use crate::error::{ContextError, ErrorKind};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Shared state accessible to all route handlers.
pub struct AppState {
    pub assembler: ContextAssembler,
}

/// Build the axum router with all routes.
pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .route("/presets", get(handle_list))
        .route("/presets/{name}", get(handle_detail))
        .route("/presets/{name}/tree", get(handle_tree))
        .route("/presets/{name}/context", post(handle_context))
        .with_state(state)
}

/// Bind `addr:port` and serve until `shutdown` resolves.
pub async fn serve<F>(
    addr: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind((addr, port)).await?;
    info!(
        addr = %listener.local_addr()?,
        workspace = %state.assembler.workspace().display(),
        "Preset server listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Preset server stopped");
    Ok(())
}

/// Errors a handler can return.
enum ApiError {
    Context(ContextError),
    BadRequest(String),
}

impl From<ContextError> for ApiError {
    fn from(err: ContextError) -> Self {
        Self::Context(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Context(err) => {
                let status = match err.kind() {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Tokenizer => StatusCode::BAD_REQUEST,
                    ErrorKind::Invalid => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::FileAccess | ErrorKind::Store | ErrorKind::Internal => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    warn!(error = %err, "Request failed");
                }
                let message = if err.is_not_found() {
                    "Not found".to_string()
                } else {
                    err.to_string()
                };
                (status, message)
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

fn plain_text(body: String) -> Response {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::build_info::VERSION.to_string(),
        git_hash: crate::build_info::GIT_HASH.to_string(),
        build_profile: crate::build_info::BUILD_PROFILE.to_string(),
    })
}

async fn handle_list(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PresetSummary>>, ApiError> {
    Ok(Json(state.assembler.list().await?))
}

async fn handle_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<PresetDetail>, ApiError> {
    Ok(Json(state.assembler.detail(&name).await?))
}

async fn handle_tree(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    Ok(plain_text(state.assembler.tree(&name).await?))
}

async fn handle_context(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ContextRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ContextRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?
    };

    let bundle = match request.model {
        Some(model) => state.assembler.with_tokenizer(model).bundle(&name).await?,
        None => state.assembler.bundle(&name).await?,
    };
    Ok(plain_text(bundle.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use promptcode_test_utils::workspace::TestWorkspace;
    use tower::ServiceExt;

    use crate::tokens::{APPROX_TOKENIZER, TokenCounter, TokenizerCache};

    fn state_for(ws: &TestWorkspace) -> Arc<AppState> {
        let counter = TokenCounter::new(Arc::new(TokenizerCache::new()), APPROX_TOKENIZER);
        Arc::new(AppState {
            assembler: ContextAssembler::new(ws.path(), counter, 4),
        })
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let ws = TestWorkspace::new();
        let app = router(state_for(&ws));
        let req = Request::get("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let health: HealthResponse = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version, crate::build_info::VERSION);
    }

    #[tokio::test]
    async fn test_list_endpoint() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::get("/presets").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let list: Vec<PresetSummary> = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(
            list,
            vec![PresetSummary {
                name: "demo".to_string(),
                file_count: 3,
                total_tokens: 15,
            }]
        );
    }

    #[tokio::test]
    async fn test_list_empty_workspace() {
        let ws = TestWorkspace::new();
        let app = router(state_for(&ws));
        let req = Request::get("/presets").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "[]");
    }

    #[tokio::test]
    async fn test_detail_endpoint() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::get("/presets/demo").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let detail: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(
            detail,
            serde_json::json!({
                "name": "demo",
                "description": "demo preset",
                "files": [
                    {"path": "a/x.ts", "tokens": 10},
                    {"path": "a/y.ts", "tokens": 5},
                    {"path": "b.ts", "tokens": 0},
                ],
                "totalTokens": 15,
            })
        );
    }

    #[tokio::test]
    async fn test_detail_not_found() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::get("/presets/ghost").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let err: ErrorResponse = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(err.error, "Not found");
    }

    #[tokio::test]
    async fn test_tree_endpoint() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::get("/presets/demo/tree").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], TEXT_PLAIN);
        assert_eq!(
            body_string(resp).await,
            "a\n   └─ x.ts  (10)\n   └─ y.ts  (5)\nb.ts"
        );
    }

    #[tokio::test]
    async fn test_context_endpoint_without_body() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::post("/presets/demo/context")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let text = body_string(resp).await;
        let x = text.find("// --- a/x.ts ---").unwrap();
        let y = text.find("// --- a/y.ts ---").unwrap();
        let b = text.find("// --- b.ts ---").unwrap();
        assert!(x < y && y < b);
        assert!(text.starts_with("# File Tree\n\na\n"));
    }

    #[tokio::test]
    async fn test_context_endpoint_with_model() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::post("/presets/demo/context")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"model":"cl100k_base"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_string(resp).await.contains("// --- b.ts ---"));
    }

    #[tokio::test]
    async fn test_context_endpoint_unknown_model() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::post("/presets/demo/context")
            .body(Body::from(r#"{"model":"no-such-model"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_context_endpoint_bad_json() {
        let ws = TestWorkspace::demo();
        let app = router(state_for(&ws));
        let req = Request::post("/presets/demo/context")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_context_missing_file_is_server_error() {
        let ws = TestWorkspace::new();
        ws.write_preset("broken", &["gone.rs"]);
        let app = router(state_for(&ws));
        let req = Request::post("/presets/broken/context")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: ErrorResponse = serde_json::from_str(&body_string(resp).await).unwrap();
        assert!(err.error.contains("gone.rs"));
    }
}
