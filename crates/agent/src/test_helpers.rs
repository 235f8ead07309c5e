//! Shared test helpers for loop and reasoning tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wayfarer_core::capability::{Arguments, Capability, CapabilityId};
use wayfarer_core::error::{CapabilityError, ProviderError};
use wayfarer_core::message::Message;
use wayfarer_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};

/// What the scripted provider does when asked to stream an answer.
pub enum Synthesis {
    /// Send these fragments (or errors) in order, then finish.
    Chunks(Vec<Result<String, ProviderError>>),
    /// Open the stream but never send anything.
    Hang,
}

/// What happens once the decision script runs out.
#[derive(Clone, Copy)]
pub enum Exhausted {
    Fail,
    Hang,
}

/// A mock provider that replays a script.
///
/// JSON-mode requests are decisions and pop the next scripted reply.
/// Streaming requests first fail with any queued open errors, then play
/// the synthesis script. Every request is recorded.
pub struct ScriptedProvider {
    decisions: Mutex<VecDeque<Result<String, ProviderError>>>,
    open_failures: Mutex<VecDeque<ProviderError>>,
    synthesis: Mutex<Option<Synthesis>>,
    exhausted: Exhausted,
    requests: Mutex<Vec<ProviderRequest>>,
    // Keeps hung streams open for the lifetime of the provider.
    held: Mutex<Vec<mpsc::Sender<Result<StreamChunk, ProviderError>>>>,
}

impl ScriptedProvider {
    pub fn new(decisions: Vec<Result<String, ProviderError>>, synthesis: Synthesis) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
            open_failures: Mutex::new(VecDeque::new()),
            synthesis: Mutex::new(Some(synthesis)),
            exhausted: Exhausted::Fail,
            requests: Mutex::new(Vec::new()),
            held: Mutex::new(Vec::new()),
        }
    }

    pub fn when_exhausted(mut self, exhausted: Exhausted) -> Self {
        self.exhausted = exhausted;
        self
    }

    pub fn with_open_failures(self, failures: Vec<ProviderError>) -> Self {
        *self.open_failures.lock().unwrap() = failures.into();
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn decision_requests(&self) -> Vec<ProviderRequest> {
        self.requests().into_iter().filter(|r| r.json_mode).collect()
    }

    pub fn synthesis_requests(&self) -> Vec<ProviderRequest> {
        self.requests().into_iter().filter(|r| r.stream).collect()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);

        let next = self.decisions.lock().unwrap().pop_front();
        let text = match next {
            Some(reply) => reply?,
            None => match self.exhausted {
                Exhausted::Fail => {
                    return Err(ProviderError::InvalidResponse("decision script exhausted".into()));
                }
                Exhausted::Hang => std::future::pending().await,
            },
        };

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.requests.lock().unwrap().push(request);

        if let Some(err) = self.open_failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        let synthesis = self
            .synthesis
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Synthesis::Chunks(vec![]));

        match synthesis {
            Synthesis::Hang => {
                let (tx, rx) = mpsc::channel(1);
                self.held.lock().unwrap().push(tx);
                Ok(rx)
            }
            Synthesis::Chunks(chunks) => {
                let (tx, rx) = mpsc::channel(chunks.len() + 1);
                for chunk in chunks {
                    let item = chunk.map(|content| StreamChunk {
                        content: Some(content),
                        done: false,
                        usage: None,
                    });
                    let _ = tx.send(item).await;
                }
                let _ = tx
                    .send(Ok(StreamChunk {
                        content: None,
                        done: true,
                        usage: None,
                    }))
                    .await;
                Ok(rx)
            }
        }
    }
}

/// Decision reply naming a capability with nested arguments.
pub fn decision(tool: &str, reason: &str, arguments: serde_json::Value) -> Result<String, ProviderError> {
    Ok(serde_json::json!({ "tool": tool, "reason": reason, "arguments": arguments }).to_string())
}

/// Decision reply choosing stop.
pub fn stop(reason: &str) -> Result<String, ProviderError> {
    Ok(serde_json::json!({ "tool": "stop", "reason": reason }).to_string())
}

/// A capability that counts its calls and echoes its arguments.
pub struct CountingCapability {
    id: CapabilityId,
    calls: Arc<AtomicUsize>,
    failure: Option<String>,
    hang: bool,
}

impl CountingCapability {
    pub fn new(id: CapabilityId) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                id,
                calls: calls.clone(),
                failure: None,
                hang: false,
            },
            calls,
        )
    }

    /// Every call fails upstream with `message`.
    pub fn failing(id: CapabilityId, message: &str) -> (Self, Arc<AtomicUsize>) {
        let (mut cap, calls) = Self::new(id);
        cap.failure = Some(message.to_string());
        (cap, calls)
    }

    /// Every call is counted and then never returns.
    pub fn hanging(id: CapabilityId) -> (Self, Arc<AtomicUsize>) {
        let (mut cap, calls) = Self::new(id);
        cap.hang = true;
        (cap, calls)
    }

    pub fn count(calls: &AtomicUsize) -> usize {
        calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Capability for CountingCapability {
    fn id(&self) -> CapabilityId {
        self.id
    }

    fn description(&self) -> &str {
        "counting test capability"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object"})
    }

    fn validate(&self, arguments: &Arguments) -> Result<(), CapabilityError> {
        if arguments.is_empty() {
            return Err(CapabilityError::InvalidArguments("no arguments given".into()));
        }
        Ok(())
    }

    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.failure {
            Some(message) => Err(CapabilityError::Upstream(message.clone())),
            None => Ok(serde_json::json!({ "echo": arguments })),
        }
    }
}
