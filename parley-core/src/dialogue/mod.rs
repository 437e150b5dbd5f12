//! Conversation text handling
//!
//! - [`segmenter`] turns a generated reply into sentences for reveal
//! - [`history`] keeps the per-NPC message log sent back to the backend

pub mod history;
pub mod segmenter;

pub use history::{ChatMessage, ChatRole, ConversationHistory};
