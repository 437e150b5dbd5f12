//! Per-NPC conversation driver
//!
//! An [`NpcOrchestrator`] reacts to presence, the record button, finished
//! transcriptions, backend replies and advance presses for one NPC. It never
//! awaits anything itself: starting a conversation turn yields a
//! [`PendingDialogueRequest`] that the session sends to the backend, and the
//! reply comes back through [`NpcOrchestrator::response_received`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::reveal::{RevealStep, SentenceReveal};
use crate::audio::{SoundCategory, voice_duration};
use crate::collaborators::Collaborators;
use crate::config::{AudioConfig, DialogueConfig, NpcConfig};
use crate::dialogue::{ChatMessage, ConversationHistory, segmenter};
use crate::error::Result;
use crate::events::DialogueEvent;
use crate::id::{NpcId, RequestId};
use crate::quest::{NpcQuestState, QuestCompletion, QuestStage};

/// Why a dialogue request was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// NPC speaks first when the player walks up
    AutoGreeting,
    /// Player said something
    PlayerUtterance,
}

/// One backend round trip, ready to be dispatched.
#[derive(Debug, Clone)]
pub struct PendingDialogueRequest {
    pub request_id: RequestId,
    pub npc_id: NpcId,
    pub kind: RequestKind,
    /// Text as the player said it; empty for auto-greetings
    pub user_input: String,
    /// New user message as sent to the backend
    pub outgoing_input: String,
    pub instruction: String,
    /// Messages before this exchange
    pub history: Vec<ChatMessage>,
}

#[derive(Debug)]
struct InFlight {
    request_id: RequestId,
    kind: RequestKind,
    outgoing_input: String,
}

/// Point-in-time view of an NPC, for status displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcSnapshot {
    pub id: NpcId,
    pub has_quest: bool,
    pub stage: QuestStage,
    pub present: bool,
    pub recording: bool,
    pub awaiting_response: bool,
    pub revealing: bool,
}

/// Conversation state machine for one NPC.
pub struct NpcOrchestrator {
    id: NpcId,
    quest: NpcQuestState,
    dialogue: Arc<DialogueConfig>,
    audio: Arc<AudioConfig>,
    collaborators: Collaborators,
    present: bool,
    recording_since: Option<Instant>,
    in_flight: Option<InFlight>,
    reveal: SentenceReveal,
    deferred_cue: Option<QuestCompletion>,
    events: Vec<DialogueEvent>,
    completions: Vec<QuestCompletion>,
}

impl NpcOrchestrator {
    pub fn new(
        quest: NpcQuestState,
        dialogue: Arc<DialogueConfig>,
        audio: Arc<AudioConfig>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            id: quest.npc_id().clone(),
            quest,
            dialogue,
            audio,
            collaborators,
            present: false,
            recording_since: None,
            in_flight: None,
            reveal: SentenceReveal::new(),
            deferred_cue: None,
            events: Vec::new(),
            completions: Vec::new(),
        }
    }

    pub fn from_config(
        config: &NpcConfig,
        dialogue: Arc<DialogueConfig>,
        audio: Arc<AudioConfig>,
        collaborators: Collaborators,
    ) -> Self {
        Self::new(
            NpcQuestState::from_config(config),
            dialogue,
            audio,
            collaborators,
        )
    }

    pub fn id(&self) -> &NpcId {
        &self.id
    }

    pub fn quest(&self) -> &NpcQuestState {
        &self.quest
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn is_revealing(&self) -> bool {
        self.reveal.is_active()
    }

    /// Id of the request whose reply is awaited, if any
    pub fn pending_request(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|f| f.request_id)
    }

    pub fn snapshot(&self) -> NpcSnapshot {
        NpcSnapshot {
            id: self.id.clone(),
            has_quest: self.quest.has_quest(),
            stage: self.quest.stage(),
            present: self.present,
            recording: self.recording_since.is_some(),
            awaiting_response: self.in_flight.is_some(),
            revealing: self.reveal.is_active(),
        }
    }

    /// Player walked into range.
    ///
    /// Completes an active quest when the item is carried, then greets the
    /// player automatically once the quest has been started.
    pub fn player_entered(
        &mut self,
        history: &mut ConversationHistory,
    ) -> Option<PendingDialogueRequest> {
        self.present = true;
        self.collaborators.presentation.show_panel(&self.id);
        tracing::debug!(npc = %self.id, stage = %self.quest.stage(), "Player entered");

        if self.quest.stage() == QuestStage::Active
            && let Some(completion) = self
                .quest
                .check_completion(self.collaborators.inventory.as_ref())
        {
            self.completions.push(completion.clone());
            self.deferred_cue = Some(completion);
        }

        match self.quest.stage() {
            QuestStage::Active | QuestStage::Completed => {
                Some(self.begin_request(RequestKind::AutoGreeting, "", history))
            }
            QuestStage::NotStarted => None,
        }
    }

    /// Player walked out of range. Abandons whatever was going on.
    pub fn player_exited(&mut self, history: &mut ConversationHistory) {
        let presentation = &self.collaborators.presentation;
        self.present = false;

        if self.recording_since.take().is_some() {
            self.collaborators.speech.cancel_capture(&self.id);
        }
        presentation.hide_listening(&self.id);
        presentation.hide_panel(&self.id);
        presentation.stop_voice(&self.id);
        presentation.end_conversation();

        if self.reveal.cancel() {
            tracing::debug!(npc = %self.id, "Reveal cancelled on exit");
        }
        if let Some(abandoned) = self.in_flight.take() {
            tracing::debug!(npc = %self.id, request_id = %abandoned.request_id, "Pending request abandoned on exit");
        }
        if self.dialogue.clear_history_on_exit {
            history.clear(&self.id);
        }
        self.release_quest_cue();
        tracing::debug!(npc = %self.id, "Player exited");
    }

    pub fn record_pressed(&mut self, now: Instant) {
        if !self.present {
            tracing::debug!(npc = %self.id, "Record pressed while player absent");
            return;
        }
        if self.recording_since.is_some() {
            return;
        }
        let presentation = &self.collaborators.presentation;
        presentation.show_listening(&self.id);
        presentation.start_conversation();
        self.collaborators.speech.start_capture(&self.id);
        self.recording_since = Some(now);
    }

    /// Stop recording. Presses shorter than the minimum are discarded.
    pub fn record_released(&mut self, now: Instant) {
        let Some(started) = self.recording_since.take() else {
            return;
        };
        self.collaborators.presentation.hide_listening(&self.id);

        let held = now.saturating_duration_since(started);
        if held < self.dialogue.min_recording_duration {
            tracing::warn!(npc = %self.id, ?held, "Recording too short, discarded");
            self.collaborators.speech.cancel_capture(&self.id);
            self.collaborators.presentation.end_conversation();
            return;
        }
        self.collaborators.speech.stop_capture(&self.id);
    }

    /// Speech-to-text finished for this NPC's capture.
    pub fn transcription_finished(
        &mut self,
        text: &str,
        speech_detected: bool,
        history: &mut ConversationHistory,
    ) -> Option<PendingDialogueRequest> {
        if !self.present {
            tracing::debug!(npc = %self.id, "Transcription arrived after player left");
            return None;
        }
        let text = text.trim();
        if !speech_detected || text.is_empty() {
            tracing::warn!(npc = %self.id, "No speech detected");
            self.collaborators.presentation.end_conversation();
            return None;
        }
        tracing::info!(npc = %self.id, transcript = %text, "Player spoke");
        Some(self.begin_request(RequestKind::PlayerUtterance, text, history))
    }

    /// Backend answered (or failed). Replies to superseded requests are dropped.
    pub fn response_received(
        &mut self,
        request_id: RequestId,
        result: Result<String>,
        history: &mut ConversationHistory,
    ) {
        if self.pending_request() != Some(request_id) {
            tracing::debug!(npc = %self.id, %request_id, "Dropping superseded response");
            return;
        }
        let Some(in_flight) = self.in_flight.take() else {
            return;
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(npc = %self.id, %request_id, error = %e, "Dialogue request failed");
                let presentation = &self.collaborators.presentation;
                presentation.set_text(&self.id, &self.dialogue.error_text);
                presentation.end_conversation();
                self.events
                    .push(DialogueEvent::dialogue_failed(&self.id, e.to_string()));
                self.release_quest_cue();
                return;
            }
        };

        history.append(&self.id, ChatMessage::user(in_flight.outgoing_input));
        history.append(&self.id, ChatMessage::model(reply.clone()));

        if in_flight.kind == RequestKind::PlayerUtterance && self.quest.activate() {
            self.events.push(DialogueEvent::quest_activated(
                &self.id,
                self.quest.quest_item(),
            ));
        }

        let sentences = segmenter::prepare(&reply);
        let total = sentences.len();
        tracing::debug!(npc = %self.id, %request_id, sentences = total, "Reply received");

        self.collaborators.presentation.start_conversation();
        match self.reveal.start(sentences).map(str::to_string) {
            Some(first) => self.show_sentence(0, total, &first),
            None => {
                self.collaborators.presentation.set_text(&self.id, "");
                self.finish_dialogue();
            }
        }
    }

    /// Show the next sentence, or finish the dialogue after the last one.
    pub fn advance(&mut self) {
        if !self.reveal.is_active() {
            tracing::debug!(npc = %self.id, "Advance ignored, nothing to reveal");
            return;
        }
        self.collaborators.presentation.stop_voice(&self.id);
        match self.reveal.advance() {
            RevealStep::Next { index, text } => {
                let total = self.reveal.len();
                self.show_sentence(index, total, &text);
            }
            RevealStep::Finished => self.finish_dialogue(),
            RevealStep::Idle => {}
        }
    }

    /// Events produced since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<DialogueEvent> {
        std::mem::take(&mut self.events)
    }

    /// Quest completions produced since the last drain.
    pub fn drain_completions(&mut self) -> Vec<QuestCompletion> {
        std::mem::take(&mut self.completions)
    }

    fn begin_request(
        &mut self,
        kind: RequestKind,
        user_input: &str,
        history: &mut ConversationHistory,
    ) -> PendingDialogueRequest {
        let presentation = &self.collaborators.presentation;
        if self.reveal.cancel() {
            presentation.stop_voice(&self.id);
            tracing::debug!(npc = %self.id, "Reveal interrupted by new request");
        }
        if let Some(previous) = self.in_flight.take() {
            tracing::debug!(npc = %self.id, request_id = %previous.request_id, "Superseding in-flight request");
        }

        let instruction = self.dialogue.instruction_for(self.quest.current_prompt());
        let outgoing_input = if user_input.trim().is_empty() {
            self.dialogue.greeting_input.clone()
        } else {
            user_input.to_string()
        };
        if kind == RequestKind::AutoGreeting && self.dialogue.reset_history_on_greeting {
            history.clear(&self.id);
        }

        presentation.show_panel(&self.id);
        presentation.set_text(&self.id, &self.dialogue.thinking_text);

        let request_id = RequestId::new();
        tracing::info!(npc = %self.id, %request_id, ?kind, stage = %self.quest.stage(), "Dialogue request started");
        self.in_flight = Some(InFlight {
            request_id,
            kind,
            outgoing_input: outgoing_input.clone(),
        });

        PendingDialogueRequest {
            request_id,
            npc_id: self.id.clone(),
            kind,
            user_input: user_input.to_string(),
            outgoing_input,
            instruction,
            history: history.get(&self.id).to_vec(),
        }
    }

    fn show_sentence(&mut self, index: usize, total: usize, sentence: &str) {
        let text = sentence.trim();
        let presentation = &self.collaborators.presentation;
        presentation.set_text(&self.id, text);
        presentation.play_voice(&self.id, voice_duration(text, &self.audio));
        self.events
            .push(DialogueEvent::sentence_displayed(&self.id, index, total, text));
    }

    fn finish_dialogue(&mut self) {
        let presentation = &self.collaborators.presentation;
        presentation.end_conversation();
        presentation.hide_panel(&self.id);
        self.events.push(DialogueEvent::dialogue_completed(&self.id));
        tracing::debug!(npc = %self.id, "Dialogue completed");
        self.release_quest_cue();
    }

    fn release_quest_cue(&mut self) {
        let Some(completion) = self.deferred_cue.take() else {
            return;
        };
        let presentation = &self.collaborators.presentation;
        presentation.play_sound(SoundCategory::QuestComplete);
        if let Some(reward) = &completion.reward {
            presentation.reveal_reward(&self.id, reward.as_str());
        }
        self.events.push(DialogueEvent::quest_completed(
            &self.id,
            completion.quest_item,
            completion.reward.map(|r| r.as_str().to_string()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CollaboratorCall, Recorder};
    use crate::error::ParleyError;
    use crate::inventory::{Inventory, SocketInventory};
    use crate::quest::{QuestPrompts, RewardRef};
    use std::time::Duration;

    struct Fixture {
        npc: NpcOrchestrator,
        recorder: Arc<Recorder>,
        inventory: Arc<SocketInventory>,
        history: ConversationHistory,
    }

    fn fixture() -> Fixture {
        let recorder = Arc::new(Recorder::new());
        let inventory = Arc::new(SocketInventory::with_sockets(["hand"]));
        let quest = NpcQuestState::with_quest(
            NpcId::new("baker"),
            "Flour",
            QuestPrompts {
                initial: "Ask for flour.".to_string(),
                in_progress: Some("Remind about flour.".to_string()),
                completed: Some("Be grateful.".to_string()),
            },
            Some(RewardRef::new("fresh_bread")),
        );
        let npc = NpcOrchestrator::new(
            quest,
            Arc::new(DialogueConfig::default()),
            Arc::new(AudioConfig::default()),
            Collaborators::new(recorder.clone(), recorder.clone(), inventory.clone()),
        );
        Fixture {
            npc,
            recorder,
            inventory,
            history: ConversationHistory::new(),
        }
    }

    fn event_types(events: &[DialogueEvent]) -> Vec<&'static str> {
        events.iter().map(DialogueEvent::event_type).collect()
    }

    #[test]
    fn test_first_exchange_activates_quest() {
        let mut f = fixture();
        assert!(f.npc.player_entered(&mut f.history).is_none());

        let request = f
            .npc
            .transcription_finished("  Hello there  ", true, &mut f.history)
            .unwrap();
        assert_eq!(request.kind, RequestKind::PlayerUtterance);
        assert_eq!(request.outgoing_input, "Hello there");
        assert_eq!(request.instruction, "Ask for flour.");
        assert!(request.history.is_empty());
        assert_eq!(
            f.recorder.last_text(&request.npc_id).as_deref(),
            Some("Thinking...")
        );

        f.npc.response_received(
            request.request_id,
            Ok("I need flour. Can you help?".to_string()),
            &mut f.history,
        );
        assert_eq!(f.npc.quest().stage(), QuestStage::Active);
        assert_eq!(
            f.history.peek(f.npc.id()).unwrap(),
            &[
                ChatMessage::user("Hello there"),
                ChatMessage::model("I need flour. Can you help?")
            ]
        );
        assert_eq!(
            event_types(&f.npc.drain_events()),
            vec!["quest_activated", "sentence_displayed"]
        );
    }

    #[test]
    fn test_reveal_completes_once() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        let request = f
            .npc
            .transcription_finished("Hi", true, &mut f.history)
            .unwrap();
        f.npc.response_received(
            request.request_id,
            Ok("One. Two! Three?".to_string()),
            &mut f.history,
        );
        assert_eq!(f.recorder.last_text(f.npc.id()).as_deref(), Some("One."));

        f.npc.advance();
        f.npc.advance();
        assert_eq!(f.recorder.last_text(f.npc.id()).as_deref(), Some("Three?"));
        f.npc.advance();
        f.npc.advance();
        f.npc.advance();

        let events = f.npc.drain_events();
        let completed = events
            .iter()
            .filter(|e| e.event_type() == "dialogue_completed")
            .count();
        assert_eq!(completed, 1);
        assert_eq!(f.recorder.last_text(f.npc.id()).as_deref(), Some("Three?"));
        assert!(!f.npc.is_revealing());
    }

    #[test]
    fn test_empty_reply_completes_immediately() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        let request = f
            .npc
            .transcription_finished("Hi", true, &mut f.history)
            .unwrap();
        f.npc
            .response_received(request.request_id, Ok("  ".to_string()), &mut f.history);

        let events = f.npc.drain_events();
        assert_eq!(
            event_types(&events),
            vec!["quest_activated", "dialogue_completed"]
        );
        assert!(!f.npc.is_revealing());
    }

    #[test]
    fn test_superseded_response_is_dropped() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        let first = f
            .npc
            .transcription_finished("First", true, &mut f.history)
            .unwrap();
        let second = f
            .npc
            .transcription_finished("Second", true, &mut f.history)
            .unwrap();

        f.npc
            .response_received(first.request_id, Ok("Stale.".to_string()), &mut f.history);
        assert!(f.npc.drain_events().is_empty());
        assert_eq!(f.npc.pending_request(), Some(second.request_id));

        f.npc
            .response_received(second.request_id, Ok("Fresh.".to_string()), &mut f.history);
        assert_eq!(f.recorder.last_text(f.npc.id()).as_deref(), Some("Fresh."));
        assert_eq!(f.history.peek(f.npc.id()).unwrap().len(), 2);
    }

    #[test]
    fn test_backend_failure_shows_error_text() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        let request = f
            .npc
            .transcription_finished("Hi", true, &mut f.history)
            .unwrap();
        f.npc.response_received(
            request.request_id,
            Err(ParleyError::Timeout(Duration::from_secs(20))),
            &mut f.history,
        );

        assert_eq!(
            f.recorder.last_text(f.npc.id()).as_deref(),
            Some("Error getting response.")
        );
        assert_eq!(event_types(&f.npc.drain_events()), vec!["dialogue_failed"]);
        assert_eq!(f.npc.quest().stage(), QuestStage::NotStarted);
        assert!(f.history.peek(f.npc.id()).is_none_or(|h| h.is_empty()));
    }

    #[test]
    fn test_no_speech_does_not_start_request() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        assert!(
            f.npc
                .transcription_finished("   ", true, &mut f.history)
                .is_none()
        );
        assert!(
            f.npc
                .transcription_finished("words", false, &mut f.history)
                .is_none()
        );
        assert!(f.npc.pending_request().is_none());
        assert_eq!(
            f.recorder
                .count(|c| matches!(c, CollaboratorCall::EndConversation)),
            2
        );
    }

    #[test]
    fn test_short_recording_is_discarded() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        let start = Instant::now();

        f.npc.record_pressed(start);
        f.npc.record_released(start + Duration::from_millis(100));
        assert_eq!(
            f.recorder
                .count(|c| matches!(c, CollaboratorCall::CancelCapture(_))),
            1
        );

        f.npc.record_pressed(start);
        f.npc.record_released(start + Duration::from_millis(800));
        assert_eq!(
            f.recorder
                .count(|c| matches!(c, CollaboratorCall::StopCapture(_))),
            1
        );
    }

    #[test]
    fn test_record_ignored_when_absent() {
        let mut f = fixture();
        f.npc.record_pressed(Instant::now());
        assert!(f.recorder.calls().is_empty());
        assert!(!f.npc.snapshot().recording);
    }

    #[test]
    fn test_greeting_on_return_and_deferred_quest_cue() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        let request = f
            .npc
            .transcription_finished("Hi", true, &mut f.history)
            .unwrap();
        f.npc
            .response_received(request.request_id, Ok("Bring flour.".to_string()), &mut f.history);
        f.npc.advance();
        f.npc.player_exited(&mut f.history);
        f.npc.drain_events();

        f.inventory.attach("hand", "Flour");
        let greeting = f.npc.player_entered(&mut f.history).unwrap();
        assert_eq!(greeting.kind, RequestKind::AutoGreeting);
        assert_eq!(greeting.outgoing_input, "The player approaches.");
        assert_eq!(greeting.instruction, "Be grateful.");
        // history reset for the greeting
        assert!(greeting.history.is_empty());

        assert_eq!(f.npc.quest().stage(), QuestStage::Completed);
        assert!(!f.inventory.has_item("Flour"));
        assert_eq!(f.npc.drain_completions().len(), 1);
        // cue waits for the dialogue
        assert_eq!(
            f.recorder
                .count(|c| matches!(c, CollaboratorCall::PlaySound(SoundCategory::QuestComplete))),
            0
        );

        f.npc
            .response_received(greeting.request_id, Ok("Thank you!".to_string()), &mut f.history);
        f.npc.advance();

        assert_eq!(
            event_types(&f.npc.drain_events()),
            vec!["sentence_displayed", "dialogue_completed", "quest_completed"]
        );
        assert_eq!(
            f.recorder
                .count(|c| matches!(c, CollaboratorCall::PlaySound(SoundCategory::QuestComplete))),
            1
        );
        assert!(f.recorder.calls().contains(&CollaboratorCall::RevealReward(
            NpcId::new("baker"),
            "fresh_bread".to_string()
        )));
    }

    #[test]
    fn test_exit_cancels_reveal_and_pending() {
        let mut f = fixture();
        f.npc.player_entered(&mut f.history);
        let request = f
            .npc
            .transcription_finished("Hi", true, &mut f.history)
            .unwrap();
        f.npc
            .response_received(request.request_id, Ok("A. B. C.".to_string()), &mut f.history);
        assert!(f.npc.is_revealing());

        let next = f
            .npc
            .transcription_finished("Again", true, &mut f.history)
            .unwrap();
        assert!(!f.npc.is_revealing());

        f.npc.player_exited(&mut f.history);
        f.npc.drain_events();
        f.npc
            .response_received(next.request_id, Ok("Late.".to_string()), &mut f.history);

        assert!(f.npc.drain_events().is_empty());
        assert!(!f.npc.snapshot().present);
        assert_ne!(f.recorder.last_text(f.npc.id()).as_deref(), Some("Late."));
    }
}
