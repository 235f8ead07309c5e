//! # Wayfarer Core
//!
//! Domain types, traits, and error definitions for the Wayfarer travel agent.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here: the reasoning [`Provider`]
//! and each [`Capability`]. Implementations live in their respective crates,
//! so the agent loop can be exercised against scripted stand-ins.

pub mod capability;
pub mod error;
pub mod message;
pub mod provider;
pub mod reasoning;

// Re-export key types at crate root for ergonomics
pub use capability::{
    Arguments, Capability, CapabilityDescriptor, CapabilityId, CapabilityInput, CapabilityInvoker,
    CapabilityResult, FailureKind, Outcome, Selection, parse_arguments,
};
pub use error::{CapabilityError, ProviderError, ReasoningError};
pub use message::{ChatRequest, ConversationTurn, Message, Role, TurnRole};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use reasoning::ReasoningStep;
