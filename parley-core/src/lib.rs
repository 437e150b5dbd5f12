//! # Parley - voice-driven NPC dialogue and fetch quests
//!
//! Parley is the conversation core behind talking NPCs:
//! - Per-NPC conversation history sent to a generative dialogue backend
//! - Replies revealed one sentence at a time, paced with a talking sound
//! - A three-stage fetch quest per NPC that steers the NPC's prompt
//! - A session-wide tracker that announces when every quest is done
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ParleyConfig::load()?;
//!     let (session, handle, mut events) = Session::builder(config).build()?;
//!     let task = session.spawn();
//!
//!     handle.player_entered("baker").await?;
//!     handle.transcribed("baker", "Good morning!", true).await?;
//!
//!     while let Some(event) = events.recv().await {
//!         if let DialogueEvent::SentenceDisplayed { text, .. } = &event {
//!             println!("{}", text);
//!             handle.advance("baker").await?;
//!         }
//!         if let DialogueEvent::DialogueCompleted { .. } = event {
//!             break;
//!         }
//!     }
//!
//!     handle.shutdown().await?;
//!     task.await.ok();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Session**: one task owns all NPC state and processes commands in order
//! - **Backend**: the Gemini `generateContent` API behind a trait, with timeouts
//! - **Collaborators**: UI, audio, speech capture and inventory are traits the
//!   embedding game implements

pub mod audio;
pub mod backend;
pub mod collaborators;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod events;
pub mod id;
pub mod inventory;
pub mod npc;
pub mod quest;
pub mod session;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::audio::{Ducker, SoundCategory, voice_duration};
    pub use crate::backend::{DialogueBackend, GeminiBackend, ModelInfo, StubBackend};
    pub use crate::collaborators::{
        CollaboratorCall, Collaborators, NullCollaborators, Presentation, Recorder, SpeechCapture,
    };
    pub use crate::config::{
        AudioConfig, BackendConfig, DialogueConfig, GenerationConfig, NpcConfig, NpcQuestConfig,
        ParleyConfig, QuestRegistration, SessionConfig,
    };
    pub use crate::dialogue::{ChatMessage, ChatRole, ConversationHistory};
    pub use crate::error::{ParleyError, Result};
    pub use crate::events::{DialogueEvent, EventReceiver, EventSender, event_channel};
    pub use crate::id::{NpcId, RequestId};
    pub use crate::inventory::{Inventory, ItemHandle, SocketInventory};
    pub use crate::npc::{
        ConversationArbiter, NpcOrchestrator, NpcSnapshot, PendingDialogueRequest, RequestKind,
    };
    pub use crate::quest::{
        NpcQuestState, QuestCompletion, QuestCompletionTracker, QuestEvent, QuestPrompts,
        QuestStage, RewardRef,
    };
    pub use crate::session::{Session, SessionBuilder, SessionCommand, SessionHandle, SessionSnapshot};
}
