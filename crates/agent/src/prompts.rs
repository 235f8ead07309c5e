//! Prompt templates for the two kinds of reasoning request.

use std::fmt::Write as _;
use wayfarer_core::capability::CapabilityDescriptor;

const DECISION_PREAMBLE: &str = "\
You are a travel assistant deciding which tool to call next to answer the user's question.

Respond with exactly one JSON object and nothing else:
{\"tool\": \"<tool name>\", \"reason\": \"<why this call helps the user>\", \"arguments\": {<tool arguments>}}

The \"reason\" is shown to the user. Say concretely why you need this information for \
their question, e.g. \"Checking the current weather in Paris so they can pack for the trip\".";

const STOP_INSTRUCTIONS: &str = "\
- stop: you have gathered everything needed (or nothing more can be gathered) and are ready to answer.
  Arguments: none. Use {\"tool\": \"stop\", \"reason\": \"<what you gathered>\"}";

const DECISION_RULES: &str = "\
Rules:
- Never repeat a call with the same arguments; its result is already in the gathered context.
- If a tool failed, either try different arguments once or stop and explain the limitation.
- Call stop as soon as the gathered context answers the question.";

const SYNTHESIS_PREAMBLE: &str = "\
You are a friendly travel assistant. Answer the user's question using the context gathered \
from your tools. Present the details naturally and conversationally, be concise but informative, \
and if a tool failed or returned nothing useful, say plainly what you could not find out.";

/// System prompt for a next-action decision.
pub fn decision_prompt(capabilities: &[CapabilityDescriptor], remaining_steps: usize) -> String {
    let mut out = String::from(DECISION_PREAMBLE);
    out.push_str("\n\nAvailable tools:\n");
    for cap in capabilities {
        let schema = serde_json::to_string(&cap.parameters).unwrap_or_default();
        let _ = writeln!(out, "- {}: {}\n  Arguments schema: {schema}", cap.name, cap.description);
    }
    out.push_str(STOP_INSTRUCTIONS);
    out.push_str("\n\n");
    out.push_str(DECISION_RULES);
    let _ = write!(
        out,
        "\n- You may call at most {remaining_steps} more tool(s) before you must answer."
    );
    out
}

/// System prompt for the final answer.
pub fn synthesis_prompt() -> &'static str {
    SYNTHESIS_PREAMBLE
}

/// User message carrying the gathered context into synthesis.
pub fn synthesis_request(question: &str, gathered: &str) -> String {
    format!(
        "{gathered}\nUsing the gathered context above, answer this question: {question}"
    )
}
