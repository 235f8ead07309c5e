//! Context accumulator — the append-only record of one run.
//!
//! Holds the conversation history (with the latest user message as its
//! final turn) and every executed step alongside its result. Entries can
//! only be appended; readers get a shared borrow of the whole record.

use serde::Serialize;
use std::fmt::Write as _;
use wayfarer_core::capability::{CapabilityResult, Outcome};
use wayfarer_core::message::{ChatRequest, ConversationTurn, TurnRole};
use wayfarer_core::reasoning::ReasoningStep;

/// One executed step and what it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: ReasoningStep,
    pub result: CapabilityResult,
}

/// Snapshot of everything the loop knows so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionContext {
    history: Vec<ConversationTurn>,
    steps: Vec<StepRecord>,
}

impl ExecutionContext {
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Steps in execution order; `steps()[n].step.sequence_number == n`.
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn step(&self, sequence_number: u32) -> Option<&StepRecord> {
        self.steps.get(sequence_number as usize)
    }

    /// Turns before the latest user message.
    pub fn prior_turns(&self) -> &[ConversationTurn] {
        let n = self.history.len().saturating_sub(1);
        &self.history[..n]
    }

    /// The message this run is answering.
    pub fn latest_message(&self) -> &str {
        self.history
            .last()
            .filter(|t| t.role == TurnRole::User)
            .map(|t| t.text.as_str())
            .unwrap_or_default()
    }

    pub fn results(&self) -> Vec<CapabilityResult> {
        self.steps.iter().map(|r| r.result.clone()).collect()
    }

    /// Deterministic text form used in reasoning prompts.
    pub fn prompt_representation(&self) -> String {
        let mut out = String::new();

        let prior = self.prior_turns();
        if !prior.is_empty() {
            out.push_str("Conversation so far:\n");
            for turn in prior {
                let who = match turn.role {
                    TurnRole::User => "User",
                    TurnRole::Assistant => "Assistant",
                };
                let _ = writeln!(out, "{who}: {}", turn.text);
            }
            out.push('\n');
        }

        let _ = writeln!(out, "User query: {}", self.latest_message());
        out.push('\n');

        if self.steps.is_empty() {
            out.push_str("Gathered context: none yet, this is the first step.\n");
            return out;
        }

        out.push_str("Gathered context:\n");
        for record in &self.steps {
            let args = serde_json::to_string(&record.step.arguments).unwrap_or_default();
            let _ = writeln!(
                out,
                "Step {} · {}({args})",
                record.step.sequence_number, record.step.chosen_capability
            );
            let _ = writeln!(out, "  reason: {}", record.step.rationale);
            let _ = writeln!(out, "  outcome: {}", describe_outcome(&record.result.outcome));
        }
        out
    }
}

fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success { payload } => {
            format!("success {}", serde_json::to_string(payload).unwrap_or_default())
        }
        Outcome::Failure { kind, message } => format!("failure ({kind:?}) {message}"),
    }
}

/// A step whose sequence number does not continue the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("step {got} appended out of order, expected {expected}")]
pub struct OutOfOrder {
    pub expected: u32,
    pub got: u32,
}

/// Owner of the [`ExecutionContext`] for one run.
#[derive(Debug)]
pub struct ContextAccumulator {
    context: ExecutionContext,
}

impl ContextAccumulator {
    /// Seed with prior history; `message` becomes the latest user turn.
    pub fn new(history: Vec<ConversationTurn>, message: impl Into<String>) -> Self {
        let mut history = history;
        history.push(ConversationTurn::user(message));
        Self {
            context: ExecutionContext {
                history,
                steps: Vec::new(),
            },
        }
    }

    pub fn from_request(request: ChatRequest) -> Self {
        Self::new(request.history, request.message)
    }

    /// Sequence number the next step must carry.
    pub fn next_sequence(&self) -> u32 {
        self.context.steps.len() as u32
    }

    pub fn len(&self) -> usize {
        self.context.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.context.steps.is_empty()
    }

    pub fn append(&mut self, step: ReasoningStep, result: CapabilityResult) -> Result<(), OutOfOrder> {
        let expected = self.next_sequence();
        if step.sequence_number != expected {
            return Err(OutOfOrder {
                expected,
                got: step.sequence_number,
            });
        }
        self.context.steps.push(StepRecord { step, result });
        Ok(())
    }

    pub fn snapshot(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn into_context(self) -> ExecutionContext {
        self.context
    }
}
