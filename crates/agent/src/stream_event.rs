//! Agent-level streaming events.
//!
//! `StreamEvent` is what the agent loop tells its caller while it runs.
//! Every event is self-describing: serialized, it is one JSON object with a
//! `type` tag, so a transport can write one event per line (or per SSE
//! `data:` frame) and a client can act on each one as it arrives.

use serde::{Deserialize, Serialize};
use wayfarer_core::capability::{Arguments, CapabilityId, CapabilityResult, Outcome, Selection};
use wayfarer_core::reasoning::ReasoningStep;

/// Marks the end of a wire stream after the terminal event.
pub const WIRE_SENTINEL: &str = "[DONE]";

/// Events emitted by the agent loop, in the order they happen.
///
/// Wire protocol:
/// - `thinking`          — a decision was made (before it is executed)
/// - `thinking_complete` — no further decisions; synthesis follows
/// - `tool_start`        — a capability call is about to be made
/// - `tool_complete`     — the capability call returned
/// - `text`              — a fragment of the final answer
/// - `traces`            — every capability result of the run
/// - `error`             — the run failed (terminal)
/// - `done`              — the run finished (terminal)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A reasoning decision, surfaced as soon as it is produced.
    Thinking {
        step: u32,
        tool: Selection,
        reason: String,
        params: Arguments,
    },

    /// Reasoning is over.
    ThinkingComplete { message: String },

    /// A capability call is starting.
    ToolStart { name: CapabilityId, args: Arguments },

    /// A capability call returned (successfully or not).
    ToolComplete { name: Selection, result: Outcome },

    /// Partial text of the final answer.
    Text { content: String },

    /// All capability results, in execution order.
    Traces { traces: Vec<CapabilityResult> },

    /// The run failed.
    Error { content: String },

    /// The run finished.
    Done,
}

impl StreamEvent {
    pub fn thinking(step: &ReasoningStep) -> Self {
        Self::Thinking {
            step: step.sequence_number,
            tool: step.chosen_capability.clone(),
            reason: step.rationale.clone(),
            params: step.arguments.clone(),
        }
    }

    pub fn thinking_complete(message: impl Into<String>) -> Self {
        Self::ThinkingComplete {
            message: message.into(),
        }
    }

    pub fn tool_start(name: CapabilityId, args: &Arguments) -> Self {
        Self::ToolStart {
            name,
            args: args.clone(),
        }
    }

    pub fn tool_complete(result: &CapabilityResult) -> Self {
        Self::ToolComplete {
            name: result.capability.clone(),
            result: result.outcome.clone(),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::Error {
            content: content.into(),
        }
    }

    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "thinking",
            Self::ThinkingComplete { .. } => "thinking_complete",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolComplete { .. } => "tool_complete",
            Self::Text { .. } => "text",
            Self::Traces { .. } => "traces",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// `Done` and `Error` end a well-formed stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Encode as a single JSON line (no trailing newline).
    pub fn to_wire(&self) -> String {
        // Every field is plain data; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","content":"event encoding failed: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::capability::FailureKind;

    fn paris() -> Arguments {
        let mut args = Arguments::new();
        args.insert("city".into(), serde_json::json!("Paris"));
        args
    }

    #[test]
    fn thinking_wire_fields() {
        let step = ReasoningStep::new(0, CapabilityId::Weather, "Need the forecast", paris());
        let json: serde_json::Value =
            serde_json::from_str(&StreamEvent::thinking(&step).to_wire()).unwrap();
        assert_eq!(json["type"], "thinking");
        assert_eq!(json["step"], 0);
        assert_eq!(json["tool"], "weather");
        assert_eq!(json["reason"], "Need the forecast");
        assert_eq!(json["params"]["city"], "Paris");
    }

    #[test]
    fn thinking_keeps_unrecognized_name() {
        let step = ReasoningStep::new(1, Selection::resolve("news"), "Headlines", Arguments::new());
        let json: serde_json::Value =
            serde_json::from_str(&StreamEvent::thinking(&step).to_wire()).unwrap();
        assert_eq!(json["tool"], "news");
    }

    #[test]
    fn tool_events_wire_fields() {
        let start = StreamEvent::tool_start(CapabilityId::Weather, &paris()).to_wire();
        assert!(start.contains(r#""type":"tool_start""#));
        assert!(start.contains(r#""name":"weather""#));
        assert!(start.contains(r#""args":{"city":"Paris"}"#));

        let result = CapabilityResult::failure(
            CapabilityId::CurrencyConvert,
            Arguments::new(),
            FailureKind::UpstreamError,
            "rate service unavailable",
        );
        let json: serde_json::Value =
            serde_json::from_str(&StreamEvent::tool_complete(&result).to_wire()).unwrap();
        assert_eq!(json["type"], "tool_complete");
        assert_eq!(json["name"], "currency_convert");
        assert_eq!(json["result"]["status"], "failure");
        assert_eq!(json["result"]["kind"], "UpstreamError");
    }

    #[test]
    fn text_error_done_wire() {
        assert_eq!(
            StreamEvent::text("Hi").to_wire(),
            r#"{"type":"text","content":"Hi"}"#
        );
        assert_eq!(
            StreamEvent::error("boom").to_wire(),
            r#"{"type":"error","content":"boom"}"#
        );
        assert_eq!(StreamEvent::Done.to_wire(), r#"{"type":"done"}"#);
    }

    #[test]
    fn traces_wire() {
        let result = CapabilityResult::success(
            CapabilityId::Weather,
            paris(),
            serde_json::json!({"temperature_c": 18.5}),
        );
        let json: serde_json::Value = serde_json::from_str(
            &StreamEvent::Traces {
                traces: vec![result],
            }
            .to_wire(),
        )
        .unwrap();
        assert_eq!(json["traces"][0]["capability"], "weather");
        assert_eq!(json["traces"][0]["outcome"]["payload"]["temperature_c"], 18.5);
    }

    #[test]
    fn event_type_matches_tag() {
        let events = [
            StreamEvent::thinking_complete("ready"),
            StreamEvent::text("x"),
            StreamEvent::error("x"),
            StreamEvent::Done,
        ];
        for event in events {
            let json: serde_json::Value = serde_json::from_str(&event.to_wire()).unwrap();
            assert_eq!(json["type"], event.event_type());
        }
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Done.is_terminal());
        assert!(StreamEvent::error("x").is_terminal());
        assert!(!StreamEvent::text("x").is_terminal());
    }

    #[test]
    fn wire_roundtrip() {
        let json = r#"{"type":"thinking","step":2,"tool":"stop","reason":"ready","params":{}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        match event {
            StreamEvent::Thinking { step, tool, .. } => {
                assert_eq!(step, 2);
                assert!(tool.is_stop());
            }
            other => panic!("Wrong variant {other:?}"),
        }
    }
}
