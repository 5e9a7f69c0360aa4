//! The single-turn decision engine: signal extraction, conversation context,
//! the ordered response policy, and response pacing. Everything here is pure
//! over its inputs; persistence and transport live in the surrounding crates.

pub mod context;
pub mod pacing;
pub mod policy;
pub mod signals;

pub use context::{BotTopic, ConversationContext};
pub use pacing::PacingPolicy;
pub use policy::{CapturedLead, Decision, PolicyEngine, TurnInput};
