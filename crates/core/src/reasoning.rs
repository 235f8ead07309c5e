//! Reasoning steps — one decision cycle of the agent loop.

use serde::{Deserialize, Serialize};

use crate::capability::{Arguments, Selection};

/// One decision produced by the Reasoning Client.
///
/// `rationale` is surfaced to the caller but never inspected for control
/// flow. Steps live for the duration of one request and are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 0-based, increases by exactly one per loop iteration.
    pub sequence_number: u32,

    /// Unrecognized names are kept so the failure can be reported back.
    pub chosen_capability: Selection,

    pub rationale: String,

    /// Empty for `Stop`.
    #[serde(default)]
    pub arguments: Arguments,
}

impl ReasoningStep {
    pub fn new(
        sequence_number: u32,
        chosen_capability: impl Into<Selection>,
        rationale: impl Into<String>,
        arguments: Arguments,
    ) -> Self {
        let chosen_capability = chosen_capability.into();
        let arguments = if chosen_capability.is_stop() {
            Arguments::new()
        } else {
            arguments
        };
        Self {
            sequence_number,
            chosen_capability,
            rationale: rationale.into(),
            arguments,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.chosen_capability.is_stop()
    }
}
