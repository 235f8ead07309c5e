//! HTTP gateway for Wayfarer.
//!
//! Exposes the agent loop over HTTP: a health check, the streaming and
//! collected chat endpoints and the capability listing under `/v1`.
//!
//! Each chat request gets its own agent run; a client that disconnects
//! from the stream cancels that run.

pub mod api_v1;

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::{
    Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::Json,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use wayfarer_agent::{AgentLoop, LoopPolicy, ReasoningClient};
use wayfarer_config::{AppConfig, GatewayConfig};
use wayfarer_core::error::ProviderError;

/// Largest accepted request body.
const BODY_LIMIT_BYTES: usize = 256 * 1024;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<AgentLoop>,
    pub provider_kind: String,
    pub model: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(agent: Arc<AgentLoop>, config: &AppConfig) -> Self {
        Self {
            agent,
            provider_kind: config.provider.kind.clone(),
            model: config.provider.model.clone(),
            started_at: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the agent loop described by `config`: provider, capabilities, policy.
pub fn build_agent(config: &AppConfig) -> Result<Arc<AgentLoop>, ProviderError> {
    let provider = wayfarer_providers::build_from_config(&config.provider)?;
    let reasoning = ReasoningClient::from_config(provider, &config.provider);
    let invoker = Arc::new(wayfarer_tools::default_invoker(&config.capabilities));
    Ok(Arc::new(
        AgentLoop::new(reasoning, invoker).with_policy(LoopPolicy::from(&config.agent)),
    ))
}

/// Build the full router.
///
/// Layers applied:
/// - CORS restricted to the configured origins
/// - Request body size limit
/// - In-memory rate limiting per client (if enabled)
/// - Hardening response headers (if enabled)
/// - HTTP trace logging
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(health_handler))
        .with_state(state.clone())
        .nest("/v1", api_v1::v1_router(state))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    if config.rate_limit_per_minute > 0 {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_minute as usize,
            Duration::from_secs(60),
        ));
        app = app.layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }));
    }

    if config.security_headers {
        app = app.layer(middleware::from_fn(security_headers_middleware));
    }

    app.layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let agent = build_agent(&config)?;
    let state = Arc::new(GatewayState::new(agent, &config));
    let app = build_router(state, &config.gateway);

    info!(
        addr = %addr,
        provider = %config.provider.kind,
        model = %config.provider.model,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key (peer address).
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        self.check_at(client_key, Instant::now())
    }

    fn check_at(&self, client_key: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Periodic cleanup: if map grows too large, evict stale entries
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Client key: peer address, else the first `X-Forwarded-For` hop, else
/// "anonymous".
fn client_key(req: &axum::extract::Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Returns 429 Too Many Requests when a client exceeds its budget.
/// `/health` is exempt so monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let key = client_key(&req);
    if !limiter.check(&key) {
        warn!(client = %key, "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "geolocation=(), microphone=()"),
];

async fn security_headers_middleware(
    req: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    response
}

// --- Handlers ---

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
    provider: String,
    model: String,
    uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        provider: state.provider_kind.clone(),
        model: state.model.clone(),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use wayfarer_core::message::Message;
    use wayfarer_core::provider::{Provider, ProviderRequest, ProviderResponse};

    /// Decides to stop straight away, then answers with fixed text.
    pub struct MockProvider {
        pub answer: String,
        pub fail: bool,
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "gateway_mock"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            if self.fail {
                return Err(ProviderError::Network("connection refused".into()));
            }
            let text = if request.json_mode {
                r#"{"tool":"stop","reason":"Nothing to look up"}"#.to_string()
            } else {
                self.answer.clone()
            };
            Ok(ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: "mock-model".into(),
            })
        }
    }

    pub fn state_with(provider: MockProvider) -> SharedState {
        let config = AppConfig::default();
        let invoker = Arc::new(wayfarer_tools::default_invoker(&config.capabilities));
        let agent = AgentLoop::new(
            ReasoningClient::new(Arc::new(provider), "mock-model"),
            invoker,
        )
        .with_policy(LoopPolicy {
            retry_backoff: Duration::from_millis(1),
            ..LoopPolicy::default()
        });
        Arc::new(GatewayState::new(Arc::new(agent), &config))
    }

    pub fn test_state() -> SharedState {
        state_with(MockProvider {
            answer: "Hello from Wayfarer".into(),
            fail: false,
        })
    }
}
