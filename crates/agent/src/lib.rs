//! The Wayfarer agent loop.
//!
//! A run follows a **Decide → Dispatch → Accumulate** cycle:
//!
//! 1. **Decide**: the reasoning provider picks the next capability (or stop)
//! 2. **Dispatch**: the capability is invoked, unless it repeats an earlier call
//! 3. **Accumulate**: the step and its result join the execution context
//!
//! The cycle ends on stop or at the step ceiling; the answer is then streamed
//! as text. Every stage is reported to the caller as a [`StreamEvent`].

pub mod cancel;
pub mod context;
pub mod dedup;
pub mod emitter;
pub mod loop_runner;
pub mod prompts;
pub mod reasoning;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cancel::{CancelHandle, CancelSignal};
pub use context::{ContextAccumulator, ExecutionContext, OutOfOrder, StepRecord};
pub use emitter::{ChannelSink, CollectingSink, EventSink, SinkClosed};
pub use loop_runner::{AgentLoop, LoopHandle, LoopOutcome, LoopPolicy, LoopReport, LoopState};
pub use reasoning::{ReasoningClient, TextStream, parse_decision};
pub use stream_event::{StreamEvent, WIRE_SENTINEL};
