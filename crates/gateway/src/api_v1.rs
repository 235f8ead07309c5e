//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST /v1/chat/stream`   — Send a message, get an SSE stream of loop events
//! - `POST /v1/chat`          — Send a message, get the collected answer and traces
//! - `GET  /v1/capabilities`  — List the capabilities the agent can call

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    response::sse::{Event as SseEvent, Sse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use wayfarer_agent::{LoopOutcome, WIRE_SENTINEL};
use wayfarer_core::capability::{CapabilityDescriptor, CapabilityResult};
use wayfarer_core::message::ChatRequest;
use wayfarer_core::reasoning::ReasoningStep;

use crate::SharedState;

/// Longest accepted user message, in characters.
const MAX_MESSAGE_CHARS: usize = 4_000;

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/capabilities", get(list_capabilities_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ChatResponse {
    run_id: String,
    outcome: String,
    answer: String,
    steps: Vec<ReasoningStep>,
    traces: Vec<CapabilityResult>,
}

#[derive(Serialize, Deserialize)]
struct CapabilityListResponse {
    capabilities: Vec<CapabilityDescriptor>,
    count: usize,
}

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(error: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn validate(request: &ChatRequest) -> Result<(), ApiError> {
    if request.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    if request.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(bad_request(format!(
            "message is longer than {MAX_MESSAGE_CHARS} characters"
        )));
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────

/// `POST /v1/chat` — run the loop to completion and return everything at once.
async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    validate(&payload)?;
    info!(history_turns = payload.history.len(), "v1/chat request");

    let (report, _) = state.agent.run_collected(payload).await;

    match report.outcome {
        LoopOutcome::Done => Ok(Json(ChatResponse {
            run_id: report.run_id.to_string(),
            outcome: report.outcome.state().as_str().to_string(),
            answer: report.answer,
            steps: report
                .context
                .steps()
                .iter()
                .map(|r| r.step.clone())
                .collect(),
            traces: report.context.results(),
        })),
        LoopOutcome::Failed(message) => Err((
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse { error: message }),
        )),
        LoopOutcome::Cancelled => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "request was cancelled".into(),
            }),
        )),
    }
}

/// `POST /v1/chat/stream` — one SSE frame per loop event, then the sentinel.
///
/// Dropping the response (client disconnect) drops the event receiver,
/// which the loop treats as cancellation.
async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    validate(&payload)?;
    info!(history_turns = payload.history.len(), "v1/chat/stream SSE request");

    let handle = state.agent.clone().spawn(payload);

    let events = ReceiverStream::new(handle.events).map(|event| {
        Ok(SseEvent::default()
            .event(event.event_type())
            .data(event.to_wire()))
    });
    let sentinel = futures::stream::once(async { Ok(SseEvent::default().data(WIRE_SENTINEL)) });

    Ok(Sse::new(events.chain(sentinel)))
}

/// `GET /v1/capabilities`
async fn list_capabilities_handler(State(state): State<SharedState>) -> Json<CapabilityListResponse> {
    let capabilities = state.agent.invoker().descriptors();
    let count = capabilities.len();
    Json(CapabilityListResponse {
        capabilities,
        count,
    })
}
