//! Session-wide quest registry

use serde::{Deserialize, Serialize};

/// Signals produced by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestEvent {
    QuestCompleted { quest_id: String, name: String },
    AllQuestsCompleted { total: usize },
}

#[derive(Debug, Clone)]
struct TrackedQuest {
    id: String,
    name: String,
    completed: bool,
}

/// Registry of every quest in the session and whether it is done.
///
/// Quests keep registration order. Completion is never undone and the
/// all-complete signal fires at most once.
#[derive(Debug, Clone, Default)]
pub struct QuestCompletionTracker {
    quests: Vec<TrackedQuest>,
    all_completed_announced: bool,
}

impl QuestCompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a quest. The first registration of an id wins.
    pub fn register(&mut self, id: impl Into<String>, name: impl Into<String>) -> bool {
        let id = id.into();
        let name = name.into();
        if id.trim().is_empty() || name.trim().is_empty() {
            tracing::warn!(%id, %name, "Ignoring quest registration with empty id or name");
            return false;
        }
        if self.find(&id).is_some() {
            tracing::warn!(quest_id = %id, "Quest already registered");
            return false;
        }
        tracing::debug!(quest_id = %id, %name, "Quest registered");
        self.quests.push(TrackedQuest {
            id,
            name,
            completed: false,
        });
        true
    }

    /// Mark a quest complete.
    ///
    /// Returns the signals to publish: empty when the quest is unknown or
    /// already complete.
    pub fn complete(&mut self, id: &str) -> Vec<QuestEvent> {
        let Some(index) = self.find(id) else {
            tracing::warn!(quest_id = %id, "Completing unregistered quest");
            return Vec::new();
        };
        self.complete_at(index)
    }

    /// Complete a quest whose name matches `item`, ignoring case.
    ///
    /// Several quests may share a name; the first one still pending is taken.
    pub fn complete_by_item(&mut self, item: &str) -> Vec<QuestEvent> {
        let matches = |q: &TrackedQuest| q.name.eq_ignore_ascii_case(item);
        let Some(index) = self
            .quests
            .iter()
            .position(|q| !q.completed && matches(q))
            .or_else(|| self.quests.iter().position(matches))
        else {
            tracing::warn!(%item, "No registered quest for item");
            return Vec::new();
        };
        self.complete_at(index)
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.find(id).is_some_and(|i| self.quests[i].completed)
    }

    /// True when at least one quest is registered and all are complete.
    pub fn is_all_completed(&self) -> bool {
        !self.quests.is_empty() && self.quests.iter().all(|q| q.completed)
    }

    pub fn completed_quests(&self) -> Vec<String> {
        self.quests
            .iter()
            .filter(|q| q.completed)
            .map(|q| q.id.clone())
            .collect()
    }

    pub fn pending_quests(&self) -> Vec<String> {
        self.quests
            .iter()
            .filter(|q| !q.completed)
            .map(|q| q.id.clone())
            .collect()
    }

    /// `(completed, registered)`
    pub fn progress(&self) -> (usize, usize) {
        let done = self.quests.iter().filter(|q| q.completed).count();
        (done, self.quests.len())
    }

    fn find(&self, id: &str) -> Option<usize> {
        self.quests.iter().position(|q| q.id == id)
    }

    fn complete_at(&mut self, index: usize) -> Vec<QuestEvent> {
        let quest = &mut self.quests[index];
        if quest.completed {
            tracing::debug!(quest_id = %quest.id, "Quest already completed");
            return Vec::new();
        }
        quest.completed = true;
        tracing::info!(quest_id = %quest.id, name = %quest.name, "Quest marked complete");

        let mut events = vec![QuestEvent::QuestCompleted {
            quest_id: quest.id.clone(),
            name: quest.name.clone(),
        }];

        if !self.all_completed_announced && self.is_all_completed() {
            self.all_completed_announced = true;
            let (_, total) = self.progress();
            tracing::info!(total, "All quests completed");
            events.push(QuestEvent::AllQuestsCompleted { total });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_with(ids: &[&str]) -> QuestCompletionTracker {
        let mut tracker = QuestCompletionTracker::new();
        for id in ids {
            tracker.register(*id, id.to_uppercase());
        }
        tracker
    }

    #[test]
    fn test_all_completed_fires_once() {
        let mut tracker = tracker_with(&["a", "b", "c"]);

        let mut all_completed = 0;
        for id in ["a", "b", "c", "c", "a"] {
            all_completed += tracker
                .complete(id)
                .iter()
                .filter(|e| matches!(e, QuestEvent::AllQuestsCompleted { .. }))
                .count();
        }
        assert_eq!(all_completed, 1);
        assert!(tracker.is_all_completed());
    }

    #[test]
    fn test_completion_signal_order() {
        let mut tracker = tracker_with(&["a"]);
        let events = tracker.complete("a");
        assert_eq!(
            events,
            vec![
                QuestEvent::QuestCompleted {
                    quest_id: "a".to_string(),
                    name: "A".to_string()
                },
                QuestEvent::AllQuestsCompleted { total: 1 },
            ]
        );
    }

    #[test]
    fn test_empty_tracker_is_not_all_completed() {
        let tracker = QuestCompletionTracker::new();
        assert!(!tracker.is_all_completed());
        assert_eq!(tracker.progress(), (0, 0));
    }

    #[test]
    fn test_registration_rules() {
        let mut tracker = QuestCompletionTracker::new();
        assert!(tracker.register("bread", "Bread"));
        assert!(!tracker.register("bread", "Other name"));
        assert!(!tracker.register("", "Nameless"));
        assert!(!tracker.register("hammer", " "));
        assert_eq!(tracker.progress(), (0, 1));
    }

    #[test]
    fn test_unregistered_completion_is_ignored() {
        let mut tracker = tracker_with(&["a"]);
        assert!(tracker.complete("zzz").is_empty());
        assert!(tracker.complete_by_item("zzz").is_empty());
        assert_eq!(tracker.progress(), (0, 1));
    }

    #[test]
    fn test_complete_by_item_ignores_case() {
        let mut tracker = QuestCompletionTracker::new();
        tracker.register("smith", "Hammer");
        tracker.register("baker", "Flour");

        let events = tracker.complete_by_item("hammer");
        assert_eq!(events.len(), 1);
        assert!(tracker.is_completed("smith"));
        assert_eq!(tracker.completed_quests(), vec!["smith"]);
        assert_eq!(tracker.pending_quests(), vec!["baker"]);
        assert_eq!(tracker.progress(), (1, 2));
    }

    #[test]
    fn test_complete_by_item_shared_name() {
        let mut tracker = QuestCompletionTracker::new();
        tracker.register("baker", "Flour");
        tracker.register("miller", "Flour");

        assert_eq!(tracker.complete_by_item("Flour").len(), 1);
        assert!(tracker.is_completed("baker"));

        let events = tracker.complete_by_item("flour");
        assert_eq!(
            events,
            vec![
                QuestEvent::QuestCompleted {
                    quest_id: "miller".to_string(),
                    name: "Flour".to_string(),
                },
                QuestEvent::AllQuestsCompleted { total: 2 },
            ]
        );
        assert!(tracker.is_all_completed());
        assert!(tracker.complete_by_item("Flour").is_empty());
    }

    #[test]
    fn test_late_registration_after_all_completed() {
        let mut tracker = tracker_with(&["a"]);
        tracker.complete("a");
        tracker.register("b", "B");
        assert!(!tracker.is_all_completed());

        // latched: no second announcement
        let events = tracker.complete("b");
        assert_eq!(events.len(), 1);
        assert!(tracker.is_all_completed());
    }
}
