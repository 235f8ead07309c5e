//! The agent loop controller.
//!
//! One run: ask for a decision, surface it, dispatch it (or suppress it as a
//! duplicate), fold the result into the context, and repeat until the
//! provider says stop or the step ceiling is hit. Then stream the answer.
//!
//! Every suspension point is raced against cancellation and consumer
//! disconnect; once either fires the run stops without emitting anything
//! further.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;
use wayfarer_config::{AgentConfig, DuplicateDetection};
use wayfarer_core::capability::{
    CapabilityDescriptor, CapabilityId, CapabilityInvoker, CapabilityResult, FailureKind,
};
use wayfarer_core::error::{ProviderError, ReasoningError};
use wayfarer_core::message::ChatRequest;
use wayfarer_core::reasoning::ReasoningStep;

use crate::cancel::{CancelHandle, CancelSignal};
use crate::context::{ContextAccumulator, ExecutionContext};
use crate::dedup::same_arguments;
use crate::emitter::{ChannelSink, CollectingSink, EventSink};
use crate::reasoning::{ReasoningClient, log_usage};
use crate::stream_event::StreamEvent;

/// Longest wait honoured from a provider's retry-after hint.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(10);

/// Termination and retry policy for a run.
#[derive(Debug, Clone)]
pub struct LoopPolicy {
    pub max_steps: usize,
    pub decision_retries: u32,
    pub retry_backoff: Duration,
    pub duplicate_detection: DuplicateDetection,
    pub event_buffer: usize,
}

impl Default for LoopPolicy {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for LoopPolicy {
    fn from(config: &AgentConfig) -> Self {
        Self {
            max_steps: config.max_steps,
            decision_retries: config.decision_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            duplicate_detection: config.duplicate_detection,
            event_buffer: config.event_buffer,
        }
    }
}

impl LoopPolicy {
    /// Wait before retry number `attempt + 1`: linear, stretched to a
    /// provider's retry-after hint.
    fn backoff(&self, attempt: u32, err: &ReasoningError) -> Duration {
        let linear = self.retry_backoff.saturating_mul(attempt.saturating_add(1));
        match err {
            ReasoningError::Provider(ProviderError::RateLimited { retry_after_secs }) => {
                linear.max(Duration::from_secs(*retry_after_secs).min(MAX_RATE_LIMIT_WAIT))
            }
            _ => linear,
        }
    }
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingDecision,
    Dispatching,
    Accumulating,
    Synthesizing,
    Done,
    Failed,
    Cancelled,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingDecision => "awaiting_decision",
            Self::Dispatching => "dispatching",
            Self::Accumulating => "accumulating",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    Done,
    Failed(String),
    Cancelled,
}

impl LoopOutcome {
    pub fn state(&self) -> LoopState {
        match self {
            Self::Done => LoopState::Done,
            Self::Failed(_) => LoopState::Failed,
            Self::Cancelled => LoopState::Cancelled,
        }
    }
}

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct LoopReport {
    pub run_id: Uuid,
    pub outcome: LoopOutcome,
    pub context: ExecutionContext,
    /// Concatenated `Text` fragments that were delivered.
    pub answer: String,
}

/// A run executing on its own task.
pub struct LoopHandle {
    pub events: mpsc::Receiver<StreamEvent>,
    pub cancel: CancelHandle,
    pub join: JoinHandle<LoopReport>,
}

/// Why a run stopped early.
enum Halt {
    Cancelled,
    Failed(String),
}

pub struct AgentLoop {
    reasoning: ReasoningClient,
    invoker: Arc<CapabilityInvoker>,
    policy: LoopPolicy,
}

impl AgentLoop {
    pub fn new(reasoning: ReasoningClient, invoker: Arc<CapabilityInvoker>) -> Self {
        Self {
            reasoning,
            invoker,
            policy: LoopPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LoopPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &LoopPolicy {
        &self.policy
    }

    pub fn invoker(&self) -> &CapabilityInvoker {
        &self.invoker
    }

    /// Execute one request, emitting every event into `sink`.
    pub async fn run(
        &self,
        request: ChatRequest,
        sink: &dyn EventSink,
        cancel: CancelSignal,
    ) -> LoopReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("agent_run", %run_id);
        self.run_inner(run_id, request, sink, cancel)
            .instrument(span)
            .await
    }

    /// Run on a new task; events arrive on the returned receiver.
    /// Dropping the receiver cancels the run.
    pub fn spawn(self: Arc<Self>, request: ChatRequest) -> LoopHandle {
        let (sink, events) = ChannelSink::new(self.policy.event_buffer);
        let (cancel, signal) = CancelSignal::pair();
        let join = tokio::spawn(async move { self.run(request, &sink, signal).await });
        LoopHandle {
            events,
            cancel,
            join,
        }
    }

    /// Run to completion and hand back every event alongside the report.
    pub async fn run_collected(&self, request: ChatRequest) -> (LoopReport, Vec<StreamEvent>) {
        let sink = CollectingSink::new();
        let report = self.run(request, &sink, CancelSignal::never()).await;
        (report, sink.into_events())
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        request: ChatRequest,
        sink: &dyn EventSink,
        cancel: CancelSignal,
    ) -> LoopReport {
        let mut acc = ContextAccumulator::from_request(request);
        info!(
            history_turns = acc.snapshot().prior_turns().len(),
            max_steps = self.policy.max_steps,
            provider = %self.reasoning.provider_name(),
            "Agent run accepted"
        );

        let mut run = Run {
            agent: self,
            sink,
            cancel: &cancel,
            state: LoopState::AwaitingDecision,
        };
        let mut answer = String::new();

        let outcome = match run.drive(&mut acc, &mut answer).await {
            Ok(()) => LoopOutcome::Done,
            Err(Halt::Cancelled) => {
                info!(state = %run.state, "Agent run cancelled by client");
                LoopOutcome::Cancelled
            }
            Err(Halt::Failed(message)) => {
                error!(state = %run.state, error = %message, "Agent run failed");
                // Best effort; a vanished consumer changes nothing here.
                let _ = run.emit(StreamEvent::error(&message)).await;
                LoopOutcome::Failed(message)
            }
        };
        run.transition(outcome.state());

        info!(steps = acc.len(), outcome = %outcome.state(), "Agent run finished");
        LoopReport {
            run_id,
            outcome,
            context: acc.into_context(),
            answer,
        }
    }
}

/// Per-run state; lives on the stack of one `run` call.
struct Run<'a> {
    agent: &'a AgentLoop,
    sink: &'a dyn EventSink,
    cancel: &'a CancelSignal,
    state: LoopState,
}

impl Run<'_> {
    fn transition(&mut self, next: LoopState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Loop state");
            self.state = next;
        }
    }

    /// Await `fut` unless the run is cancelled or the consumer leaves first.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            _ = self.sink.closed() => Err(Halt::Cancelled),
            out = fut => Ok(out),
        }
    }

    async fn emit(&self, event: StreamEvent) -> Result<(), Halt> {
        self.guard(self.sink.emit(event))
            .await?
            .map_err(|_| Halt::Cancelled)
    }

    async fn drive(&mut self, acc: &mut ContextAccumulator, answer: &mut String) -> Result<(), Halt> {
        let descriptors = self.agent.invoker.descriptors();
        let max_steps = self.agent.policy.max_steps;

        loop {
            if acc.len() >= max_steps {
                warn!(max_steps, "Step ceiling reached, forcing synthesis");
                self.emit(StreamEvent::thinking_complete(format!(
                    "Reached the limit of {max_steps} tool calls, answering with what was gathered"
                )))
                .await?;
                break;
            }

            self.transition(LoopState::AwaitingDecision);
            let sequence = acc.next_sequence();
            let step = self
                .decide(acc.snapshot(), &descriptors, sequence, max_steps - acc.len())
                .await?;
            self.emit(StreamEvent::thinking(&step)).await?;

            if step.is_stop() {
                debug!(sequence, "Reasoning chose stop");
                self.emit(StreamEvent::thinking_complete(step.rationale.clone()))
                    .await?;
                break;
            }

            let result = match step.chosen_capability.known() {
                None => {
                    warn!(
                        sequence,
                        capability = %step.chosen_capability,
                        "Reasoning chose an unknown capability"
                    );
                    CapabilityResult::failure(
                        step.chosen_capability.clone(),
                        step.arguments.clone(),
                        FailureKind::InvalidArguments,
                        format!(
                            "unknown capability '{}', available: {}",
                            step.chosen_capability,
                            available(&descriptors)
                        ),
                    )
                }
                Some(capability) => match self.find_duplicate(acc.snapshot(), &step) {
                    Some(previous) => {
                        info!(
                            sequence,
                            capability = %capability,
                            previous,
                            "Suppressing duplicate capability call"
                        );
                        CapabilityResult::failure(
                            capability,
                            step.arguments.clone(),
                            FailureKind::DuplicateCall,
                            format!(
                                "identical call already made at step {previous}, its result is in the gathered context"
                            ),
                        )
                    }
                    None => {
                        self.transition(LoopState::Dispatching);
                        self.emit(StreamEvent::tool_start(capability, &step.arguments))
                            .await?;
                        let result = self
                            .guard(self.agent.invoker.invoke(capability, step.arguments.clone()))
                            .await?;
                        self.emit(StreamEvent::tool_complete(&result)).await?;
                        result
                    }
                },
            };

            self.transition(LoopState::Accumulating);
            acc.append(step, result)
                .map_err(|e| Halt::Failed(e.to_string()))?;
        }

        self.synthesize(acc.snapshot(), answer).await
    }

    /// Earliest prior step with the same capability and arguments.
    fn find_duplicate(&self, context: &ExecutionContext, step: &ReasoningStep) -> Option<u32> {
        let mode = self.agent.policy.duplicate_detection;
        context
            .steps()
            .iter()
            .find(|record| {
                record.step.chosen_capability == step.chosen_capability
                    && same_arguments(mode, &record.step.arguments, &step.arguments)
            })
            .map(|record| record.step.sequence_number)
    }

    async fn decide(
        &self,
        context: &ExecutionContext,
        descriptors: &[CapabilityDescriptor],
        sequence: u32,
        remaining: usize,
    ) -> Result<ReasoningStep, Halt> {
        let reasoning = &self.agent.reasoning;
        self.with_retry("Reasoning", move || {
            reasoning.decide(context, descriptors, sequence, remaining)
        })
        .await
    }

    async fn synthesize(&mut self, context: &ExecutionContext, answer: &mut String) -> Result<(), Halt> {
        self.transition(LoopState::Synthesizing);

        let reasoning = &self.agent.reasoning;
        let mut stream = self
            .with_retry("Answer synthesis", move || reasoning.synthesize(context))
            .await?;

        while let Some(fragment) = self.guard(stream.next()).await? {
            match fragment {
                Ok(text) => {
                    answer.push_str(&text);
                    self.emit(StreamEvent::text(text)).await?;
                }
                Err(e) => {
                    return Err(Halt::Failed(format!("Answer stream interrupted: {e}")));
                }
            }
        }
        if let Some(usage) = stream.usage() {
            log_usage("synthesis", usage);
        }

        self.emit(StreamEvent::Traces {
            traces: context.results(),
        })
        .await?;
        self.emit(StreamEvent::Done).await
    }

    /// Bounded retry with linear backoff; the wait itself is cancellable.
    async fn with_retry<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T, Halt>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ReasoningError>>,
    {
        let attempts = self.agent.policy.decision_retries.saturating_add(1);
        let mut attempt: u32 = 0;
        loop {
            match self.guard(call()).await? {
                Ok(value) => return Ok(value),
                Err(err) if attempt.saturating_add(1) < attempts => {
                    let wait = self.agent.policy.backoff(attempt, &err);
                    warn!(
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "{label} call failed, retrying"
                    );
                    self.guard(tokio::time::sleep(wait)).await?;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(Halt::Failed(format!(
                        "{label} failed after {attempts} attempt(s): {err}"
                    )));
                }
            }
        }
    }
}

/// Capability names offered to the provider, plus `stop`.
fn available(descriptors: &[CapabilityDescriptor]) -> String {
    descriptors
        .iter()
        .map(|d| d.name.as_str())
        .chain(std::iter::once(CapabilityId::Stop.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}
