//! Dialogue events for game-side observers
//!
//! The session loop emits a [`DialogueEvent`] at every externally visible
//! step of a conversation: each revealed sentence, the end of a dialogue,
//! backend failures and quest progress. Consumers receive them through an
//! [`EventReceiver`] created with [`event_channel`].
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_core::events::{event_channel, DialogueEvent};
//!
//! let (tx, mut rx) = event_channel(100);
//!
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         if let DialogueEvent::SentenceDisplayed { text, .. } = &event {
//!             println!("{}", text);
//!         }
//!     }
//! });
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::id::NpcId;
use crate::quest::QuestEvent;

/// Observable steps of NPC conversations and quest progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DialogueEvent {
    /// A sentence of an NPC reply is now on screen
    SentenceDisplayed {
        npc: NpcId,
        /// 0-based position in the reply
        index: usize,
        /// Number of sentences in the reply
        total: usize,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// The player advanced past the last sentence (or the reply was empty)
    DialogueCompleted {
        npc: NpcId,
        timestamp: DateTime<Utc>,
    },

    /// The backend failed or timed out
    DialogueFailed {
        npc: NpcId,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// An NPC's quest moved from not started to active
    QuestActivated {
        npc: NpcId,
        item: String,
        timestamp: DateTime<Utc>,
    },

    /// An NPC's quest was completed and its reward cue released
    QuestCompleted {
        npc: NpcId,
        item: String,
        reward: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A registered quest was marked complete in the tracker
    TrackedQuestCompleted {
        quest_id: String,
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// Every registered quest is complete. Emitted at most once per session.
    AllQuestsCompleted {
        total: usize,
        timestamp: DateTime<Utc>,
    },
}

impl DialogueEvent {
    pub fn sentence_displayed(
        npc: &NpcId,
        index: usize,
        total: usize,
        text: impl Into<String>,
    ) -> Self {
        DialogueEvent::SentenceDisplayed {
            npc: npc.clone(),
            index,
            total,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn dialogue_completed(npc: &NpcId) -> Self {
        DialogueEvent::DialogueCompleted {
            npc: npc.clone(),
            timestamp: Utc::now(),
        }
    }

    pub fn dialogue_failed(npc: &NpcId, error: impl Into<String>) -> Self {
        DialogueEvent::DialogueFailed {
            npc: npc.clone(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn quest_activated(npc: &NpcId, item: impl Into<String>) -> Self {
        DialogueEvent::QuestActivated {
            npc: npc.clone(),
            item: item.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn quest_completed(npc: &NpcId, item: impl Into<String>, reward: Option<String>) -> Self {
        DialogueEvent::QuestCompleted {
            npc: npc.clone(),
            item: item.into(),
            reward,
            timestamp: Utc::now(),
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            DialogueEvent::SentenceDisplayed { .. } => "sentence_displayed",
            DialogueEvent::DialogueCompleted { .. } => "dialogue_completed",
            DialogueEvent::DialogueFailed { .. } => "dialogue_failed",
            DialogueEvent::QuestActivated { .. } => "quest_activated",
            DialogueEvent::QuestCompleted { .. } => "quest_completed",
            DialogueEvent::TrackedQuestCompleted { .. } => "tracked_quest_completed",
            DialogueEvent::AllQuestsCompleted { .. } => "all_quests_completed",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DialogueEvent::SentenceDisplayed { timestamp, .. }
            | DialogueEvent::DialogueCompleted { timestamp, .. }
            | DialogueEvent::DialogueFailed { timestamp, .. }
            | DialogueEvent::QuestActivated { timestamp, .. }
            | DialogueEvent::QuestCompleted { timestamp, .. }
            | DialogueEvent::TrackedQuestCompleted { timestamp, .. }
            | DialogueEvent::AllQuestsCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// The NPC this event concerns, if any
    pub fn npc(&self) -> Option<&NpcId> {
        match self {
            DialogueEvent::SentenceDisplayed { npc, .. }
            | DialogueEvent::DialogueCompleted { npc, .. }
            | DialogueEvent::DialogueFailed { npc, .. }
            | DialogueEvent::QuestActivated { npc, .. }
            | DialogueEvent::QuestCompleted { npc, .. } => Some(npc),
            DialogueEvent::TrackedQuestCompleted { .. }
            | DialogueEvent::AllQuestsCompleted { .. } => None,
        }
    }
}

impl From<QuestEvent> for DialogueEvent {
    fn from(event: QuestEvent) -> Self {
        match event {
            QuestEvent::QuestCompleted { quest_id, name } => DialogueEvent::TrackedQuestCompleted {
                quest_id,
                name,
                timestamp: Utc::now(),
            },
            QuestEvent::AllQuestsCompleted { total } => DialogueEvent::AllQuestsCompleted {
                total,
                timestamp: Utc::now(),
            },
        }
    }
}

/// Sender half of an event channel
pub type EventSender = mpsc::Sender<DialogueEvent>;

/// Receiver half of an event channel
pub type EventReceiver = mpsc::Receiver<DialogueEvent>;

/// Creates a new event channel with the specified buffer capacity.
///
/// The session publishes with `try_send`, so events that do not fit in the
/// buffer are dropped. Consumers should drain the receiver continuously.
pub fn event_channel(buffer_size: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(buffer_size)
}
