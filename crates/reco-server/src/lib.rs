//! HTTP transport surface: the Start/Stream endpoints and `/healthz`.
//!
//! Grounded on the session HTTP surface's `events()`/`sse_stream()` pair —
//! a plain `Stream<Item = Result<Event, Infallible>>` wrapped in
//! `Sse::new(..).keep_alive(..)` — adapted to read from a per-session
//! `reco_core::event_bus::Subscription` instead of a single process-wide
//! broadcast channel.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use reco_core::config::OrchestratorConfig;
use reco_core::error::RecoError;
use reco_core::event_bus::EventBus;
use reco_core::orchestrator::Orchestrator;
use reco_types::UserProfile;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

const MIN_LIMIT: u32 = 1;
const MAX_LIMIT: u32 = 50;
const DEFAULT_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        self.orchestrator.event_bus()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/recommendations", post(start_recommendation))
        .route("/recommendations/{session_id}/stream", get(stream_recommendation))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "reco_server.listening");
    axum::serve(listener, app_router(state)).await?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    user_profile: UserProfile,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    success: bool,
    session_id: String,
    stream_path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    error: String,
    kind: reco_types::ErrorKind,
}

/// Local wrapper so this crate can give `RecoError` an HTTP representation
/// without violating the orphan rule (`RecoError` is a `reco-core` type,
/// `IntoResponse` is an `axum` trait — neither is local to this crate).
struct ApiError(RecoError);

impl From<RecoError> for ApiError {
    fn from(err: RecoError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            reco_types::ErrorKind::Validation => StatusCode::BAD_REQUEST,
            reco_types::ErrorKind::NoSuchSession => StatusCode::NOT_FOUND,
            reco_types::ErrorKind::Cancelled => StatusCode::BAD_REQUEST,
            reco_types::ErrorKind::Timeout
            | reco_types::ErrorKind::AnalyzerError
            | reco_types::ErrorKind::InternalError
            | reco_types::ErrorKind::Overflow => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            success: false,
            error: self.0.to_string(),
            kind: self.0.kind(),
        });
        (status, body).into_response()
    }
}

/// Opens the session and hands the recommendation run to a background task,
/// returning as soon as the orchestrator has a live session for the caller
/// to stream — it does not wait for fusion to complete.
async fn start_recommendation(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(RecoError::Validation(format!(
            "limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {limit}"
        ))
        .into());
    }

    let session_id = request.session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    state.event_bus().open(&session_id).await;

    let orchestrator = state.orchestrator.clone();
    let profile = request.user_profile;
    let session_id_for_task = session_id.clone();
    tokio::spawn(async move {
        let cancellation = tokio_util::sync::CancellationToken::new();
        if let Err(err) = orchestrator.recommend(profile, &session_id_for_task, cancellation).await {
            tracing::warn!(session_id = %session_id_for_task, error = %err, "reco_server.recommend_failed");
        }
    });

    Ok(Json(StartResponse {
        success: true,
        session_id: session_id.clone(),
        stream_path: format!("/recommendations/{session_id}/stream"),
    }))
}

async fn stream_recommendation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let keep_alive = state.event_bus().config().keep_alive_interval();
    let mut subscription = state.event_bus().subscribe(&session_id).await;
    let stream = async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            let event_type = event.event_type();
            let payload = serde_json::to_string(&event).unwrap_or_default();
            yield Ok(SseEvent::default().event(event_type).data(payload));
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use reco_core::analyzer::{Analyzer, AnalyzerContext, AnalyzerError, AnalyzerOutput};
    use reco_types::Candidate;
    use serde_json::Value;
    use tower::ServiceExt;

    struct Fixed {
        id: &'static str,
        score: f64,
    }

    #[async_trait::async_trait]
    impl Analyzer for Fixed {
        fn id(&self) -> &str {
            self.id
        }
        fn display_name(&self) -> &str {
            self.id
        }
        async fn analyze(&self, _profile: &UserProfile, _ctx: &AnalyzerContext) -> Result<AnalyzerOutput, AnalyzerError> {
            Ok(AnalyzerOutput {
                candidates: vec![Candidate::new("v1", self.score)],
                confidence: 0.8,
            })
        }
    }

    fn test_state() -> AppState {
        let config = OrchestratorConfig::default();
        let bus = EventBus::new(config.clone());
        let orchestrator = Orchestrator::new(bus, config, vec![std::sync::Arc::new(Fixed { id: "A", score: 0.9 })], None);
        AppState::new(orchestrator)
    }

    fn sample_profile() -> serde_json::Value {
        json!({
            "budget": {"min": 1000.0, "max": 20000.0},
            "preferences": {"brands": ["Toyota"]},
            "purpose": "general",
        })
    }

    #[tokio::test]
    async fn start_endpoint_returns_a_session_and_stream_path() {
        let app = app_router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/recommendations")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json!({ "userProfile": sample_profile() })).unwrap()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let payload: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.get("success").and_then(Value::as_bool), Some(true));
        assert!(payload.get("sessionId").and_then(Value::as_str).is_some());
    }

    #[tokio::test]
    async fn start_endpoint_rejects_out_of_range_limit() {
        let app = app_router(test_state());
        let req = Request::builder()
            .method("POST")
            .uri("/recommendations")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "userProfile": sample_profile(), "limit": 500 })).unwrap(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let app = app_router(test_state());
        let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn stream_endpoint_delivers_connection_established_then_terminal_event() {
        // Subscribes before starting the run so delivery does not race the
        // background task: the stream handler's `subscribe().await` runs to
        // completion as part of building the response, before its body
        // stream is ever polled, so the session's events can't be published
        // (and missed) ahead of this subscription existing.
        let state = test_state();
        let app = app_router(state);
        let session_id = "test-session-1".to_string();

        let stream_req = Request::builder()
            .uri(format!("/recommendations/{session_id}/stream"))
            .body(Body::empty())
            .unwrap();
        let stream_resp = app.clone().oneshot(stream_req).await.unwrap();
        assert_eq!(stream_resp.status(), StatusCode::OK);

        let start_req = Request::builder()
            .method("POST")
            .uri("/recommendations")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_vec(&json!({ "userProfile": sample_profile(), "sessionId": session_id })).unwrap(),
            ))
            .unwrap();
        let start_resp = app.oneshot(start_req).await.unwrap();
        assert_eq!(start_resp.status(), StatusCode::OK);

        let body = to_bytes(stream_resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("connection_established"));
        assert!(text.contains("recommendation_completed"));
    }

    #[tokio::test]
    async fn stream_endpoint_on_unknown_session_still_opens_and_streams() {
        // Does not drain the body: an unstarted session's stream never
        // reaches a terminal event, so consuming it fully would hang.
        let state = test_state();
        let app = app_router(state);
        let req = Request::builder()
            .uri("/recommendations/never-started/stream")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
