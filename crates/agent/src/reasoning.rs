//! Reasoning client — turns the running context into provider requests.
//!
//! Two operations: [`ReasoningClient::decide`] asks for the next action and
//! parses it into a [`ReasoningStep`]; [`ReasoningClient::synthesize`] opens
//! a stream of answer text. Neither retries; retry policy lives in the loop.

use std::sync::Arc;
use tracing::{debug, trace};
use wayfarer_config::ProviderConfig;
use wayfarer_core::capability::{Arguments, CapabilityDescriptor, Selection};
use wayfarer_core::error::{ProviderError, ReasoningError};
use wayfarer_core::message::Message;
use wayfarer_core::provider::{ChunkReceiver, Provider, ProviderRequest, Usage};
use wayfarer_core::reasoning::ReasoningStep;

use crate::context::ExecutionContext;
use crate::prompts;

const DEFAULT_REASON: &str = "No reason given";

/// Keys of a decision object that are never capability arguments.
const DECISION_KEYS: &[&str] = &["tool", "capability", "action", "reason", "rationale", "stop"];

pub struct ReasoningClient {
    provider: Arc<dyn Provider>,
    model: String,
    decision_temperature: f32,
    synthesis_temperature: f32,
    max_tokens: Option<u32>,
}

impl ReasoningClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            decision_temperature: 0.2,
            synthesis_temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &ProviderConfig) -> Self {
        Self::new(provider, &config.model)
            .with_temperatures(config.decision_temperature, config.synthesis_temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperatures(mut self, decision: f32, synthesis: f32) -> Self {
        self.decision_temperature = decision;
        self.synthesis_temperature = synthesis;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask for the next action.
    pub async fn decide(
        &self,
        context: &ExecutionContext,
        capabilities: &[CapabilityDescriptor],
        sequence_number: u32,
        remaining_steps: usize,
    ) -> Result<ReasoningStep, ReasoningError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(prompts::decision_prompt(capabilities, remaining_steps)),
                Message::user(context.prompt_representation()),
            ],
            temperature: self.decision_temperature,
            max_tokens: self.max_tokens,
            json_mode: true,
            stream: false,
        };

        let response = self.provider.complete(request).await?;
        trace!(raw = %response.message.content, "Decision response");
        if let Some(usage) = &response.usage {
            log_usage("decision", usage);
        }

        let step = parse_decision(&response.message.content, sequence_number)?;
        debug!(
            sequence = step.sequence_number,
            capability = %step.chosen_capability,
            "Decision parsed"
        );
        Ok(step)
    }

    /// Open the answer stream.
    pub async fn synthesize(&self, context: &ExecutionContext) -> Result<TextStream, ReasoningError> {
        let mut messages = vec![Message::system(prompts::synthesis_prompt())];
        messages.extend(context.prior_turns().iter().map(Message::from));
        messages.push(Message::user(prompts::synthesis_request(
            context.latest_message(),
            &context.prompt_representation(),
        )));

        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.synthesis_temperature,
            max_tokens: self.max_tokens,
            json_mode: false,
            stream: true,
        };

        let rx = self.provider.stream(request).await?;
        Ok(TextStream {
            rx,
            finished: false,
            usage: None,
        })
    }
}

/// Finite, non-restartable sequence of answer fragments.
pub struct TextStream {
    rx: ChunkReceiver,
    finished: bool,
    usage: Option<Usage>,
}

impl TextStream {
    /// Next non-empty fragment; `None` once the provider is done.
    pub async fn next(&mut self) -> Option<Result<String, ProviderError>> {
        while !self.finished {
            match self.rx.recv().await {
                None => self.finished = true,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Some(Ok(chunk)) => {
                    self.finished = chunk.done;
                    if chunk.usage.is_some() {
                        self.usage = chunk.usage;
                    }
                    if let Some(content) = chunk.content
                        && !content.is_empty()
                    {
                        return Some(Ok(content));
                    }
                }
            }
        }
        None
    }

    /// Token usage reported by the provider, once the stream has sent it.
    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

pub(crate) fn log_usage(phase: &str, usage: &Usage) {
    debug!(
        phase,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "Provider token usage"
    );
}

/// Parse a provider reply into a decision.
///
/// Accepts the outermost `{...}` in the reply, so code fences or prose around
/// the object are tolerated. Arguments come from an `arguments` (or `params`)
/// object if present, otherwise from the remaining top-level fields. A tool
/// name outside the closed set parses to [`Selection::Unrecognized`].
pub fn parse_decision(text: &str, sequence_number: u32) -> Result<ReasoningStep, ReasoningError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ReasoningError::MalformedDecision(format!(
            "no JSON object in reply: {}",
            preview(text)
        )));
    };
    if end < start {
        return Err(ReasoningError::MalformedDecision(format!(
            "no JSON object in reply: {}",
            preview(text)
        )));
    }

    let mut object: Arguments = serde_json::from_str(&text[start..=end])
        .map_err(|e| ReasoningError::MalformedDecision(format!("invalid decision JSON: {e}")))?;

    let name = ["tool", "capability", "action"]
        .iter()
        .find_map(|key| object.get(*key).and_then(|v| v.as_str()))
        .ok_or_else(|| ReasoningError::MalformedDecision("decision names no tool".into()))?;

    // Names outside the closed set are kept; the loop records them as
    // invalid-argument failures instead of retrying.
    let capability = Selection::resolve(name);

    let rationale = ["reason", "rationale"]
        .iter()
        .find_map(|key| object.get(*key).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REASON)
        .to_string();

    let nested = ["arguments", "params"]
        .iter()
        .find_map(|key| match object.get(*key) {
            Some(serde_json::Value::Object(map)) => Some(map.clone()),
            _ => None,
        });

    let arguments = match nested {
        Some(map) => map,
        None => {
            object.retain(|key, _| !DECISION_KEYS.contains(&key.as_str()));
            object
        }
    };

    Ok(ReasoningStep::new(
        sequence_number,
        capability,
        rationale,
        arguments,
    ))
}

fn preview(text: &str) -> String {
    const MAX: usize = 80;
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}…", &trimmed[..i]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_core::capability::CapabilityId;
    use crate::context::ContextAccumulator;
    use crate::test_helpers::{ScriptedProvider, Synthesis};
    use wayfarer_core::provider::StreamChunk;

    #[test]
    fn parse_nested_arguments() {
        let step = parse_decision(
            r#"{"tool":"weather","reason":"Need forecast","arguments":{"city":"Paris"}}"#,
            0,
        )
        .unwrap();
        assert_eq!(step.chosen_capability, CapabilityId::Weather);
        assert_eq!(step.rationale, "Need forecast");
        assert_eq!(step.arguments["city"], "Paris");
        assert_eq!(step.arguments.len(), 1);
    }

    #[test]
    fn parse_flat_arguments_with_alias() {
        let step = parse_decision(
            "Sure! ```json\n{\"tool\": \"currency\", \"amount\": 100, \"from\": \"EUR\", \"to\": \"USD\", \"reason\": \"budget\"}\n```",
            3,
        )
        .unwrap();
        assert_eq!(step.sequence_number, 3);
        assert_eq!(step.chosen_capability, CapabilityId::CurrencyConvert);
        assert_eq!(step.arguments.len(), 3);
        assert_eq!(step.arguments["amount"], 100);
        assert!(!step.arguments.contains_key("tool"));
        assert!(!step.arguments.contains_key("reason"));
    }

    #[test]
    fn parse_stop() {
        let step = parse_decision(r#"{"tool":"stop","stop":true,"reason":"All gathered"}"#, 2).unwrap();
        assert!(step.is_stop());
        assert!(step.arguments.is_empty());
        assert_eq!(step.rationale, "All gathered");
    }

    #[test]
    fn missing_reason_gets_default() {
        let step = parse_decision(r#"{"tool":"wikipedia","query":"Louvre"}"#, 0).unwrap();
        assert_eq!(step.chosen_capability, CapabilityId::WikipediaSearch);
        assert_eq!(step.rationale, DEFAULT_REASON);
    }

    #[test]
    fn malformed_decisions() {
        for text in [
            "I think we should check the weather",
            "} backwards {",
            r#"{"tool": "weather", "city": }"#,
            r#"{"reason": "no tool"}"#,
            r#"{"tool": 7}"#,
        ] {
            assert!(
                matches!(parse_decision(text, 0), Err(ReasoningError::MalformedDecision(_))),
                "accepted: {text}"
            );
        }
    }

    #[test]
    fn unknown_tool_parses_as_unrecognized() {
        let step = parse_decision(r#"{"tool": "news", "reason": "Headlines", "query": "Paris"}"#, 1)
            .unwrap();
        assert_eq!(step.chosen_capability, Selection::Unrecognized("news".into()));
        assert!(!step.is_stop());
        assert_eq!(step.rationale, "Headlines");
        assert_eq!(step.arguments["query"], "Paris");
    }

    #[test]
    fn preview_truncates() {
        let long = "x".repeat(200);
        assert_eq!(preview(&long).chars().count(), 81);
        assert_eq!(preview("  short "), "short");
    }

    #[tokio::test]
    async fn text_stream_keeps_final_usage() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(StreamChunk {
            content: Some("Sunny.".into()),
            done: false,
            usage: None,
        }))
        .await
        .unwrap();
        tx.send(Ok(StreamChunk {
            content: None,
            done: true,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
        }))
        .await
        .unwrap();

        let mut stream = TextStream {
            rx,
            finished: false,
            usage: None,
        };
        assert_eq!(stream.next().await.unwrap().unwrap(), "Sunny.");
        assert!(stream.usage().is_none());
        assert!(stream.next().await.is_none());
        assert_eq!(stream.usage().map(|u| u.total_tokens), Some(15));
    }

    #[tokio::test]
    async fn decide_sends_json_mode_request() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![Ok(r#"{"tool":"stop","reason":"nothing to look up"}"#.into())],
            Synthesis::Chunks(vec![]),
        ));
        let client = ReasoningClient::new(provider.clone(), "mock-model");
        let acc = ContextAccumulator::new(vec![], "Hello");

        let step = client.decide(acc.snapshot(), &[], 0, 5).await.unwrap();
        assert!(step.is_stop());

        let requests = provider.decision_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].json_mode);
        assert!(requests[0].messages[1].content.contains("User query: Hello"));
    }

    #[tokio::test]
    async fn synthesize_streams_fragments() {
        let provider = Arc::new(ScriptedProvider::new(
            vec![],
            Synthesis::Chunks(vec![Ok("It is ".into()), Ok(String::new()), Ok("sunny.".into())]),
        ));
        let client = ReasoningClient::new(provider.clone(), "mock-model");
        let acc = ContextAccumulator::new(
            vec![wayfarer_core::message::ConversationTurn::user("Hi")],
            "Weather?",
        );

        let mut stream = client.synthesize(acc.snapshot()).await.unwrap();
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment.unwrap());
        }
        assert_eq!(text, "It is sunny.");
        assert!(stream.next().await.is_none());

        assert!(stream.usage().is_none());

        let request = &provider.synthesis_requests()[0];
        assert!(request.stream);
        // system + one prior turn + synthesis request
        assert_eq!(request.messages.len(), 3);
        assert!(request.messages[2].content.ends_with("Weather?"));
    }
}
