//! Per-NPC quest state machine
//!
//! `NotStarted -> Active -> Completed`, never backwards. The stage decides
//! which prompt the NPC speaks with.

use serde::{Deserialize, Serialize};

use crate::config::NpcConfig;
use crate::id::NpcId;
use crate::inventory::{Inventory, ItemHandle};

/// Stage of an NPC's quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStage {
    NotStarted,
    Active,
    Completed,
}

impl std::fmt::Display for QuestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QuestStage::NotStarted => "not started",
            QuestStage::Active => "active",
            QuestStage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Prompts per stage. Missing stage prompts fall back to `initial`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestPrompts {
    pub initial: String,
    pub in_progress: Option<String>,
    pub completed: Option<String>,
}

impl QuestPrompts {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            initial: initial.into(),
            ..Default::default()
        }
    }
}

/// Name of the world object revealed when a quest completes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardRef(String);

impl RewardRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Outcome of the single real `Active -> Completed` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestCompletion {
    pub npc_id: NpcId,
    pub quest_item: String,
    pub reward: Option<RewardRef>,
    /// The consumed item, if the inventory still held one
    pub removed_item: Option<ItemHandle>,
}

/// Quest progress for one NPC.
#[derive(Debug, Clone)]
pub struct NpcQuestState {
    npc_id: NpcId,
    has_quest: bool,
    stage: QuestStage,
    quest_item: String,
    prompts: QuestPrompts,
    reward: Option<RewardRef>,
}

impl NpcQuestState {
    /// NPC that asks the player to bring `quest_item`.
    pub fn with_quest(
        npc_id: NpcId,
        quest_item: impl Into<String>,
        prompts: QuestPrompts,
        reward: Option<RewardRef>,
    ) -> Self {
        Self {
            npc_id,
            has_quest: true,
            stage: QuestStage::NotStarted,
            quest_item: quest_item.into(),
            prompts,
            reward,
        }
    }

    /// NPC that only chats.
    pub fn without_quest(npc_id: NpcId, prompt: impl Into<String>) -> Self {
        Self {
            npc_id,
            has_quest: false,
            stage: QuestStage::NotStarted,
            quest_item: String::new(),
            prompts: QuestPrompts::new(prompt),
            reward: None,
        }
    }

    pub fn from_config(config: &NpcConfig) -> Self {
        match &config.quest {
            Some(quest) => Self::with_quest(
                config.id.clone(),
                quest.item.clone(),
                QuestPrompts {
                    initial: config.prompt.clone(),
                    in_progress: quest.in_progress_prompt.clone(),
                    completed: quest.completed_prompt.clone(),
                },
                quest.reward.clone().map(RewardRef::new),
            ),
            None => Self::without_quest(config.id.clone(), config.prompt.clone()),
        }
    }

    pub fn npc_id(&self) -> &NpcId {
        &self.npc_id
    }

    pub fn has_quest(&self) -> bool {
        self.has_quest
    }

    pub fn stage(&self) -> QuestStage {
        self.stage
    }

    pub fn quest_item(&self) -> &str {
        &self.quest_item
    }

    /// Start the quest. Returns true only on the `NotStarted -> Active` step.
    pub fn activate(&mut self) -> bool {
        if !self.has_quest || self.stage != QuestStage::NotStarted {
            return false;
        }
        self.stage = QuestStage::Active;
        tracing::info!(npc = %self.npc_id, item = %self.quest_item, "Quest activated");
        true
    }

    /// Prompt for the current stage.
    pub fn current_prompt(&self) -> &str {
        let staged = match (self.has_quest, self.stage) {
            (false, _) | (true, QuestStage::NotStarted) => None,
            (true, QuestStage::Active) => self.prompts.in_progress.as_deref(),
            (true, QuestStage::Completed) => self.prompts.completed.as_deref(),
        };
        staged
            .filter(|prompt| !prompt.trim().is_empty())
            .unwrap_or(&self.prompts.initial)
    }

    /// Complete an active quest if the player carries the item.
    pub fn check_completion(&mut self, inventory: &dyn Inventory) -> Option<QuestCompletion> {
        if !self.has_quest || self.stage != QuestStage::Active {
            return None;
        }
        if !inventory.has_item(&self.quest_item) {
            tracing::debug!(npc = %self.npc_id, item = %self.quest_item, "Quest item not carried");
            return None;
        }
        self.complete_quest(inventory)
    }

    /// Mark the quest completed and consume the item.
    ///
    /// Only the first call on an active quest does anything; later calls
    /// return `None` without touching the inventory.
    pub fn complete_quest(&mut self, inventory: &dyn Inventory) -> Option<QuestCompletion> {
        if !self.has_quest || self.stage != QuestStage::Active {
            tracing::debug!(npc = %self.npc_id, stage = %self.stage, "Quest not completable");
            return None;
        }
        self.stage = QuestStage::Completed;

        let removed_item = inventory.remove_item(&self.quest_item);
        if removed_item.is_none() {
            tracing::warn!(npc = %self.npc_id, item = %self.quest_item, "Quest item missing at completion");
        }
        tracing::info!(npc = %self.npc_id, item = %self.quest_item, "Quest completed");

        Some(QuestCompletion {
            npc_id: self.npc_id.clone(),
            quest_item: self.quest_item.clone(),
            reward: self.reward.clone(),
            removed_item,
        })
    }
}
