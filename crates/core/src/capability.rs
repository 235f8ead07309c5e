//! Capabilities — the external actions the agent loop can choose.
//!
//! The set is closed: weather lookup, currency conversion, encyclopedic
//! search, plus the reserved `Stop` pseudo-capability. Each real capability
//! implements [`Capability`] and is registered in the [`CapabilityInvoker`],
//! which validates arguments, performs exactly one call and folds any failure
//! into a [`CapabilityResult`] instead of raising it.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::CapabilityError;

/// Capability arguments as a JSON object.
///
/// Keys are kept sorted, so two argument maps with the same entries compare
/// and serialize identically regardless of the order they were produced in.
pub type Arguments = serde_json::Map<String, serde_json::Value>;

/// Identifier of a capability. `Stop` is the reserved termination action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityId {
    Weather,
    CurrencyConvert,
    WikipediaSearch,
    Stop,
}

impl CapabilityId {
    /// Every identifier, `Stop` last.
    pub const ALL: [CapabilityId; 4] = [
        CapabilityId::Weather,
        CapabilityId::CurrencyConvert,
        CapabilityId::WikipediaSearch,
        CapabilityId::Stop,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::CurrencyConvert => "currency_convert",
            Self::WikipediaSearch => "wikipedia_search",
            Self::Stop => "stop",
        }
    }

    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityId {
    type Err = CapabilityError;

    /// Accepts canonical ids and the short aliases reasoning providers tend
    /// to use (`weather_tool`, `currency`, `wikipedia`). Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weather" | "weather_tool" => Ok(Self::Weather),
            "currency_convert" | "currency" => Ok(Self::CurrencyConvert),
            "wikipedia_search" | "wikipedia" => Ok(Self::WikipediaSearch),
            "stop" => Ok(Self::Stop),
            other => Err(CapabilityError::InvalidArguments(format!(
                "unknown capability '{other}'"
            ))),
        }
    }
}

/// What a decision names: a capability from the closed set, or a name that
/// matches none of them. Unrecognized names are recorded, never dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    Known(CapabilityId),
    Unrecognized(String),
}

impl Selection {
    /// Resolve a provider-supplied name, aliases included.
    pub fn resolve(name: &str) -> Self {
        name.parse()
            .map(Self::Known)
            .unwrap_or_else(|_| Self::Unrecognized(name.trim().to_string()))
    }

    pub fn known(&self) -> Option<CapabilityId> {
        match self {
            Self::Known(id) => Some(*id),
            Self::Unrecognized(_) => None,
        }
    }

    pub fn is_stop(&self) -> bool {
        self.known().is_some_and(CapabilityId::is_stop)
    }
}

impl From<CapabilityId> for Selection {
    fn from(id: CapabilityId) -> Self {
        Self::Known(id)
    }
}

impl PartialEq<CapabilityId> for Selection {
    fn eq(&self, other: &CapabilityId) -> bool {
        self.known() == Some(*other)
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(id) => f.write_str(id.as_str()),
            Self::Unrecognized(name) => f.write_str(name),
        }
    }
}

/// Why a capability step did not produce a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Arguments did not match the capability's schema; no call was made.
    InvalidArguments,
    /// The external call failed (network, timeout, bad status, bad payload).
    UpstreamError,
    /// Identical call already recorded in this context; no call was made.
    DuplicateCall,
}

/// Result of one capability step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        payload: serde_json::Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// What one executed step produced. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub capability: Selection,
    pub arguments: Arguments,
    pub outcome: Outcome,
}

impl CapabilityResult {
    pub fn success(
        capability: impl Into<Selection>,
        arguments: Arguments,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            capability: capability.into(),
            arguments,
            outcome: Outcome::Success { payload },
        }
    }

    pub fn failure(
        capability: impl Into<Selection>,
        arguments: Arguments,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            capability: capability.into(),
            arguments,
            outcome: Outcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn from_error(
        capability: impl Into<Selection>,
        arguments: Arguments,
        err: &CapabilityError,
    ) -> Self {
        Self::failure(capability, arguments, err.kind(), err.to_string())
    }
}

/// Typed input of a capability, parsed from [`Arguments`].
pub trait CapabilityInput: DeserializeOwned {
    /// Semantic checks beyond what deserialization enforces.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Parse and validate arguments into a capability's typed input.
pub fn parse_arguments<T: CapabilityInput>(arguments: &Arguments) -> Result<T, CapabilityError> {
    let input: T = serde_json::from_value(serde_json::Value::Object(arguments.clone()))
        .map_err(|e| CapabilityError::InvalidArguments(e.to_string()))?;
    input.validate().map_err(CapabilityError::InvalidArguments)?;
    Ok(input)
}

/// Description of a capability sent to the reasoning provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The core Capability trait.
///
/// Each external action (weather, currency_convert, wikipedia_search)
/// implements this trait and is registered in the [`CapabilityInvoker`].
#[async_trait]
pub trait Capability: Send + Sync {
    /// Which identifier this handler serves.
    fn id(&self) -> CapabilityId;

    /// A description of what this capability does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this capability's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Check arguments against the schema without touching the network.
    fn validate(&self, arguments: &Arguments) -> Result<(), CapabilityError>;

    /// Perform the external call.
    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, CapabilityError>;

    fn to_descriptor(&self) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: self.id().as_str().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Lookup table from identifier to typed handler.
///
/// The agent loop uses this to:
/// 1. Describe the available capabilities to the reasoning provider
/// 2. Execute the capability a decision names
pub struct CapabilityInvoker {
    handlers: HashMap<CapabilityId, Box<dyn Capability>>,
}

impl CapabilityInvoker {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler. Replaces any existing handler for the same id.
    pub fn register(&mut self, capability: Box<dyn Capability>) {
        self.handlers.insert(capability.id(), capability);
    }

    pub fn get(&self, id: CapabilityId) -> Option<&dyn Capability> {
        self.handlers.get(&id).map(|c| c.as_ref())
    }

    /// Registered ids in canonical order.
    pub fn ids(&self) -> Vec<CapabilityId> {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Descriptors in canonical order, so prompts are stable across runs.
    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.get(id).map(|c| c.to_descriptor()))
            .collect()
    }

    /// Validate, then execute exactly one external call.
    ///
    /// Never fails: every error is folded into the returned result.
    pub async fn invoke(&self, capability: CapabilityId, arguments: Arguments) -> CapabilityResult {
        if capability.is_stop() {
            return CapabilityResult::failure(
                capability,
                arguments,
                FailureKind::InvalidArguments,
                "stop is not an invocable capability",
            );
        }

        let Some(handler) = self.handlers.get(&capability) else {
            let err = CapabilityError::NotRegistered(capability.to_string());
            warn!(capability = %capability, "Capability not registered");
            return CapabilityResult::from_error(capability, arguments, &err);
        };

        if let Err(err) = handler.validate(&arguments) {
            debug!(capability = %capability, error = %err, "Rejected capability arguments");
            return CapabilityResult::from_error(capability, arguments, &err);
        }

        let start = Instant::now();
        let result = handler.call(&arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(payload) => {
                debug!(capability = %capability, duration_ms, "Capability call succeeded");
                CapabilityResult::success(capability, arguments, payload)
            }
            Err(err) => {
                warn!(capability = %capability, duration_ms, error = %err, "Capability call failed");
                CapabilityResult::from_error(capability, arguments, &err)
            }
        }
    }
}

impl Default for CapabilityInvoker {
    fn default() -> Self {
        Self::new()
    }
}
