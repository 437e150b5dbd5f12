//! Quest progression
//!
//! - [`state`]: the per-NPC fetch quest state machine
//! - [`tracker`]: session-wide registry of quests and their completion

pub mod state;
pub mod tracker;

pub use state::{NpcQuestState, QuestCompletion, QuestPrompts, QuestStage, RewardRef};
pub use tracker::{QuestCompletionTracker, QuestEvent};
