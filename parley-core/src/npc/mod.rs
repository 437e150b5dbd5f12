//! NPC conversations
//!
//! - [`orchestrator`]: per-NPC conversation state machine
//! - [`reveal`]: sentence-by-sentence display of a reply
//! - [`arbiter`]: optional single-conversation lock

pub mod arbiter;
pub mod orchestrator;
pub mod reveal;

pub use arbiter::ConversationArbiter;
pub use orchestrator::{NpcOrchestrator, NpcSnapshot, PendingDialogueRequest, RequestKind};
pub use reveal::{RevealStep, SentenceReveal};
