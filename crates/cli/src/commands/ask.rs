//! `wayfarer ask` — One question, or an interactive travel chat.
//!
//! Reasoning (decisions, tool calls) goes to stderr; the answer goes to
//! stdout as it streams. With `--json` every event is printed as its wire
//! line instead.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use wayfarer_agent::{AgentLoop, LoopOutcome, StreamEvent, WIRE_SENTINEL};
use wayfarer_core::{ChatRequest, ConversationTurn, Outcome, ProviderError};

const EXIT_WORDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

pub async fn run(
    explicit: Option<&Path>,
    message: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(explicit)?;

    let agent = match wayfarer_gateway::build_agent(&config) {
        Ok(agent) => agent,
        Err(ProviderError::NotConfigured(detail)) => {
            return Err(format!(
                "{detail}\n   Set GEMINI_API_KEY or add api_key under [provider] (see `wayfarer status`)"
            )
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(message) = message {
        ask_once(&agent, ChatRequest::new(message), json).await?;
        return Ok(());
    }

    interactive(&agent, json).await
}

async fn interactive(agent: &Arc<AgentLoop>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧭 Wayfarer — ask about weather, currencies, or places.");
    println!("   Type 'exit' to quit. Ctrl+C cancels the current answer.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ConversationTurn> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&message) {
            break;
        }

        let request = ChatRequest::new(message).with_history(history.clone());
        if let Some(answer) = ask_once(agent, request, json).await? {
            history.push(ConversationTurn::user(message));
            history.push(ConversationTurn::assistant(answer));
        }
        println!();
    }

    println!("👋 Safe travels!");
    Ok(())
}

/// Run one request to completion, rendering events as they arrive.
///
/// Returns the answer when the run finished normally.
async fn ask_once(
    agent: &Arc<AgentLoop>,
    request: ChatRequest,
    json: bool,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut handle = Arc::clone(agent).spawn(request);
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            event = handle.events.recv() => match event {
                Some(event) => {
                    render(&event, json, &mut stdout)?;
                    if event.is_terminal() {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.cancel.cancel();
                eprintln!("\n⏹  Cancelled");
                break;
            }
        }
    }

    let report = handle.join.await?;
    if json && report.outcome != LoopOutcome::Cancelled {
        writeln!(stdout, "{WIRE_SENTINEL}")?;
    }

    match report.outcome {
        LoopOutcome::Done => {
            if !json {
                writeln!(stdout)?;
            }
            Ok(Some(report.answer))
        }
        LoopOutcome::Failed(_) | LoopOutcome::Cancelled => Ok(None),
    }
}

fn render(event: &StreamEvent, json: bool, out: &mut impl Write) -> std::io::Result<()> {
    if json {
        return writeln!(out, "{}", event.to_wire());
    }
    match event {
        StreamEvent::Text { content } => {
            write!(out, "{content}")?;
            out.flush()
        }
        other => {
            if let Some(line) = describe(other) {
                eprintln!("{line}");
            }
            Ok(())
        }
    }
}

/// Human-readable line for a reasoning event; `None` for events that are
/// not shown (answer text, traces, done).
pub fn describe(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::Thinking {
            step, tool, reason, ..
        } => Some(format!("🤔 [{step}] {tool}: {reason}")),
        StreamEvent::ThinkingComplete { message } => Some(format!("💡 {message}")),
        StreamEvent::ToolStart { name, args } => Some(format!(
            "🔧 {name} {}",
            serde_json::Value::Object(args.clone())
        )),
        StreamEvent::ToolComplete { name, result } => Some(match result {
            Outcome::Success { .. } => format!("   ✅ {name} ok"),
            Outcome::Failure { kind, message } => {
                format!("   ⚠️  {name} failed ({kind:?}): {message}")
            }
        }),
        StreamEvent::Error { content } => Some(format!("❌ {content}")),
        StreamEvent::Text { .. } | StreamEvent::Traces { .. } | StreamEvent::Done => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wayfarer_core::{Arguments, CapabilityId, FailureKind};

    fn city(name: &str) -> Arguments {
        let mut args = Arguments::new();
        args.insert("city".into(), json!(name));
        args
    }

    #[test]
    fn describe_thinking_shows_step_and_reason() {
        let event = StreamEvent::Thinking {
            step: 1,
            tool: CapabilityId::Weather.into(),
            reason: "Need the forecast".into(),
            params: city("Paris"),
        };
        let line = describe(&event).unwrap();
        assert!(line.contains("[1]"));
        assert!(line.contains("weather"));
        assert!(line.contains("Need the forecast"));
    }

    #[test]
    fn describe_tool_failure_shows_kind() {
        let event = StreamEvent::ToolComplete {
            name: CapabilityId::Weather.into(),
            result: Outcome::Failure {
                kind: FailureKind::UpstreamError,
                message: "city not found".into(),
            },
        };
        let line = describe(&event).unwrap();
        assert!(line.contains("UpstreamError"));
        assert!(line.contains("city not found"));
    }

    #[test]
    fn describe_tool_start_includes_arguments() {
        let event = StreamEvent::ToolStart {
            name: CapabilityId::Weather,
            args: city("Lisbon"),
        };
        assert!(describe(&event).unwrap().contains("Lisbon"));
    }

    #[test]
    fn answer_events_are_not_described() {
        assert!(describe(&StreamEvent::Text { content: "hi".into() }).is_none());
        assert!(describe(&StreamEvent::Done).is_none());
        assert!(describe(&StreamEvent::Traces { traces: vec![] }).is_none());
    }

    #[test]
    fn render_text_goes_to_writer() {
        let mut out = Vec::new();
        render(&StreamEvent::Text { content: "Sunny".into() }, false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Sunny");
    }

    #[test]
    fn render_json_writes_wire_lines() {
        let mut out = Vec::new();
        render(&StreamEvent::Done, true, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"type\":\"done\"}\n");
    }

    #[test]
    fn exit_words_recognized() {
        for word in ["exit", "quit", "/exit", "/quit", ":q"] {
            assert!(EXIT_WORDS.contains(&word));
        }
        assert!(!EXIT_WORDS.contains(&"weather"));
    }
}
