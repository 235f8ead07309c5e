//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Gemini (OpenAI endpoint), Ollama, vLLM,
//! and any OpenAI-compatible endpoint.
//!
//! Supports:
//! - Chat completions (non-streaming, optionally constrained to JSON)
//! - Streaming completions over SSE
//! - Health checks

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};
use wayfarer_core::error::ProviderError;
use wayfarer_core::message::{Message, Role};
use wayfarer_core::provider::*;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of LLM providers since most expose
/// an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_timeout(name, base_url, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a provider with an explicit request timeout.
    pub fn with_timeout(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create a Gemini provider via Google's OpenAI-compatible endpoint.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            api_key,
        )
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Some(m.content.clone()),
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if request.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        stream: bool,
    ) -> std::result::Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }

        let response = builder.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(provider = %self.name, status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl wayfarer_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, json_mode = request.json_mode, "Sending completion request");

        let response = self.post(&body, false).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message: Message::assistant(choice.message.content.unwrap_or_default()),
            usage,
            model: api_response.model.unwrap_or(request.model),
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let mut body = Self::request_body(&request, true);
        body["stream_options"] = serde_json::json!({ "include_usage": true });

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self.post(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        // Spawn task to read the SSE byte stream and parse chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLineBuffer::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for data in lines.push(&bytes) {
                    match parse_sse_data(&data) {
                        SseData::Done => {
                            let _ = tx.send(Ok(final_chunk(None))).await;
                            return;
                        }
                        SseData::Chunk(chunk) => {
                            let done = chunk.done;
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                            if done {
                                return;
                            }
                        }
                        SseData::Skip => {}
                        SseData::Unparseable(error) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %error,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }

            // Stream ended without [DONE] — send final chunk
            let _ = tx.send(Ok(final_chunk(None))).await;
        });

        Ok(rx)
    }
}

fn final_chunk(usage: Option<Usage>) -> StreamChunk {
    StreamChunk {
        content: None,
        done: true,
        usage,
    }
}

/// Splits an SSE byte stream into the payloads of its `data:` lines.
#[derive(Default)]
struct SseLineBuffer {
    buffer: String,
}

impl SseLineBuffer {
    /// Append bytes and return every complete `data:` payload.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut out = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                out.push(data.trim().to_string());
            }
        }
        out
    }
}

#[derive(Debug)]
enum SseData {
    Done,
    Chunk(StreamChunk),
    Skip,
    Unparseable(String),
}

fn parse_sse_data(data: &str) -> SseData {
    // "[DONE]" signals end of stream
    if data == "[DONE]" {
        return SseData::Done;
    }

    let stream_resp = match serde_json::from_str::<StreamResponse>(data) {
        Ok(r) => r,
        Err(e) => return SseData::Unparseable(e.to_string()),
    };

    // Usage arrives in the final chunk when stream_options is honoured
    if let Some(usage) = stream_resp.usage {
        return SseData::Chunk(final_chunk(Some(Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })));
    }

    match stream_resp.choices.into_iter().next() {
        Some(choice) => match choice.delta.content {
            Some(content) if !content.is_empty() => SseData::Chunk(StreamChunk {
                content: Some(content),
                done: false,
                usage: None,
            }),
            _ => SseData::Skip,
        },
        None => SseData::Skip,
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use wayfarer_core::Provider;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn request(json_mode: bool) -> ProviderRequest {
        ProviderRequest {
            model: "test-model".into(),
            messages: vec![Message::system("decide"), Message::user("Weather in Paris?")],
            temperature: 0.2,
            max_tokens: Some(256),
            json_mode,
            stream: false,
        }
    }

    #[test]
    fn gemini_constructor() {
        let provider = OpenAiCompatProvider::gemini("key");
        assert_eq!(provider.name(), "gemini");
        assert!(provider.base_url.ends_with("/v1beta/openai"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            Message::system("You are a travel assistant"),
            Message::user("Hello"),
            Message::assistant("Hi"),
        ];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 3);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[2].role, "assistant");
    }

    #[test]
    fn json_mode_sets_response_format() {
        let body = OpenAiCompatProvider::request_body(&request(true), false);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 256);

        let body = OpenAiCompatProvider::request_body(&request(false), true);
        assert!(body.get("response_format").is_none());
        assert_eq!(body["stream"], true);
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        match parse_sse_data(data) {
            SseData::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hello"));
                assert!(!chunk.done);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_stream_finish_chunk_is_skipped() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert!(matches!(parse_sse_data(data), SseData::Skip));
    }

    #[test]
    fn parse_stream_usage_is_final() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match parse_sse_data(data) {
            SseData::Chunk(chunk) => {
                assert!(chunk.done);
                assert_eq!(chunk.usage.unwrap().total_tokens, 15);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_done_and_garbage() {
        assert!(matches!(parse_sse_data("[DONE]"), SseData::Done));
        assert!(matches!(parse_sse_data("{not json"), SseData::Unparseable(_)));
    }

    #[test]
    fn line_buffer_handles_split_lines() {
        let mut lines = SseLineBuffer::default();
        assert!(lines.push(b"data: {\"a\"").is_empty());
        let out = lines.push(b":1}\r\n\r\n: keep-alive\ndata: [DONE]\n");
        assert_eq!(out, vec!["{\"a\":1}".to_string(), "[DONE]".to_string()]);
    }

    #[tokio::test]
    async fn complete_against_local_server() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                assert_eq!(body["response_format"]["type"], "json_object");
                axum::Json(serde_json::json!({
                    "model": "test-model",
                    "choices": [{"message": {"role": "assistant", "content": "{\"tool\":\"stop\"}"}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
                }))
            }),
        );
        let base = serve(router).await;

        let provider = OpenAiCompatProvider::new("test", base, "key");
        let response = provider.complete(request(true)).await.unwrap();
        assert_eq!(response.message.content, "{\"tool\":\"stop\"}");
        assert_eq!(response.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn health_check_lists_models() {
        let router = Router::new().route(
            "/v1/models",
            get(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer good") => (StatusCode::OK, "{\"data\":[]}").into_response(),
                    _ => (StatusCode::UNAUTHORIZED, "nope").into_response(),
                }
            }),
        );
        let base = serve(router).await;

        let good = OpenAiCompatProvider::new("t", base.clone(), "good");
        assert!(good.health_check().await.unwrap());
        let bad = OpenAiCompatProvider::new("t", base, "bad");
        assert!(!bad.health_check().await.unwrap());

        let gone = OpenAiCompatProvider::new("t", "http://127.0.0.1:1/v1", "good");
        assert!(matches!(gone.health_check().await, Err(ProviderError::Network(_))));
    }

    #[tokio::test]
    async fn status_codes_map_to_errors() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap| async move {
                match headers.get("authorization").and_then(|v| v.to_str().ok()) {
                    Some("Bearer limited") => {
                        (StatusCode::TOO_MANY_REQUESTS, [("retry-after", "7")], "slow down")
                            .into_response()
                    }
                    Some("Bearer bad") => (StatusCode::UNAUTHORIZED, "nope").into_response(),
                    _ => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
                }
            }),
        );
        let base = serve(router).await;

        let limited = OpenAiCompatProvider::new("t", base.clone(), "limited");
        assert!(matches!(
            limited.complete(request(false)).await,
            Err(ProviderError::RateLimited { retry_after_secs: 7 })
        ));

        let bad = OpenAiCompatProvider::new("t", base.clone(), "bad");
        assert!(matches!(
            bad.complete(request(false)).await,
            Err(ProviderError::AuthenticationFailed(_))
        ));

        let other = OpenAiCompatProvider::new("t", base, "ok");
        match other.complete(request(false)).await {
            Err(ProviderError::ApiError { status_code, message }) => {
                assert_eq!(status_code, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_against_local_server() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                let body = concat!(
                    "data: {\"choices\":[{\"delta\":{\"content\":\"It is \"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{\"content\":\"sunny.\"}}]}\n\n",
                    "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
                    "data: [DONE]\n\n",
                );
                ([("content-type", "text/event-stream")], body)
            }),
        );
        let base = serve(router).await;

        let provider = OpenAiCompatProvider::new("test", base, "key");
        let mut rx = provider.stream(request(false)).await.unwrap();

        let mut text = String::new();
        let mut saw_done = false;
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk.unwrap();
            if let Some(content) = chunk.content {
                text.push_str(&content);
            }
            if chunk.done {
                saw_done = true;
            }
        }
        assert_eq!(text, "It is sunny.");
        assert!(saw_done);
    }
}
