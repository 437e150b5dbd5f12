//! Engine-side collaborators driven by the dialogue core
//!
//! The core never touches rendering, audio or microphones directly. An
//! embedding game implements [`Presentation`] and [`SpeechCapture`] and
//! hands them to the session; all calls arrive from the session loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::SoundCategory;
use crate::id::NpcId;
use crate::inventory::Inventory;

/// Dialogue panel, indicators and audio for NPCs.
pub trait Presentation: Send + Sync {
    fn show_panel(&self, npc: &NpcId);
    fn hide_panel(&self, npc: &NpcId);
    fn show_listening(&self, npc: &NpcId);
    fn hide_listening(&self, npc: &NpcId);

    /// Replace the panel text
    fn set_text(&self, npc: &NpcId, text: &str);

    /// Play the NPC talking sound for a fixed duration
    fn play_voice(&self, npc: &NpcId, duration: Duration);
    fn stop_voice(&self, npc: &NpcId);

    fn play_sound(&self, sound: SoundCategory);

    /// Duck background music
    fn start_conversation(&self);
    /// Restore background music
    fn end_conversation(&self);

    /// Make a quest reward visible in the world
    fn reveal_reward(&self, npc: &NpcId, reward: &str);
}

/// Speech-to-text capture.
///
/// Transcripts come back asynchronously through the session's
/// `transcribed` command.
pub trait SpeechCapture: Send + Sync {
    fn start_capture(&self, npc: &NpcId);
    /// Stop and submit what was captured for transcription
    fn stop_capture(&self, npc: &NpcId);
    /// Stop and discard
    fn cancel_capture(&self, npc: &NpcId);
}

/// The collaborators an NPC conversation talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub presentation: Arc<dyn Presentation>,
    pub speech: Arc<dyn SpeechCapture>,
    pub inventory: Arc<dyn Inventory>,
}

impl Collaborators {
    pub fn new(
        presentation: Arc<dyn Presentation>,
        speech: Arc<dyn SpeechCapture>,
        inventory: Arc<dyn Inventory>,
    ) -> Self {
        Self {
            presentation,
            speech,
            inventory,
        }
    }
}

/// Collaborator that only logs. Useful for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollaborators;

impl Presentation for NullCollaborators {
    fn show_panel(&self, npc: &NpcId) {
        tracing::trace!(%npc, "show_panel");
    }
    fn hide_panel(&self, npc: &NpcId) {
        tracing::trace!(%npc, "hide_panel");
    }
    fn show_listening(&self, npc: &NpcId) {
        tracing::trace!(%npc, "show_listening");
    }
    fn hide_listening(&self, npc: &NpcId) {
        tracing::trace!(%npc, "hide_listening");
    }
    fn set_text(&self, npc: &NpcId, text: &str) {
        tracing::trace!(%npc, text, "set_text");
    }
    fn play_voice(&self, npc: &NpcId, duration: Duration) {
        tracing::trace!(%npc, ?duration, "play_voice");
    }
    fn stop_voice(&self, npc: &NpcId) {
        tracing::trace!(%npc, "stop_voice");
    }
    fn play_sound(&self, sound: SoundCategory) {
        tracing::trace!(?sound, "play_sound");
    }
    fn start_conversation(&self) {}
    fn end_conversation(&self) {}
    fn reveal_reward(&self, npc: &NpcId, reward: &str) {
        tracing::trace!(%npc, reward, "reveal_reward");
    }
}

impl SpeechCapture for NullCollaborators {
    fn start_capture(&self, npc: &NpcId) {
        tracing::trace!(%npc, "start_capture");
    }
    fn stop_capture(&self, npc: &NpcId) {
        tracing::trace!(%npc, "stop_capture");
    }
    fn cancel_capture(&self, npc: &NpcId) {
        tracing::trace!(%npc, "cancel_capture");
    }
}

/// A call made on a [`Recorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum CollaboratorCall {
    ShowPanel(NpcId),
    HidePanel(NpcId),
    ShowListening(NpcId),
    HideListening(NpcId),
    SetText(NpcId, String),
    PlayVoice(NpcId, Duration),
    StopVoice(NpcId),
    PlaySound(SoundCategory),
    StartConversation,
    EndConversation,
    RevealReward(NpcId, String),
    StartCapture(NpcId),
    StopCapture(NpcId),
    CancelCapture(NpcId),
}

/// Collaborator that records every call, for tests and replays.
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<CollaboratorCall>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far
    pub fn calls(&self) -> Vec<CollaboratorCall> {
        self.lock().clone()
    }

    /// Texts written to an NPC's panel, in order
    pub fn texts(&self, npc: &NpcId) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|call| match call {
                CollaboratorCall::SetText(id, text) if id == npc => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last text written to an NPC's panel
    pub fn last_text(&self, npc: &NpcId) -> Option<String> {
        self.texts(npc).pop()
    }

    pub fn count(&self, predicate: impl Fn(&CollaboratorCall) -> bool) -> usize {
        self.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn record(&self, call: CollaboratorCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<CollaboratorCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Presentation for Recorder {
    fn show_panel(&self, npc: &NpcId) {
        self.record(CollaboratorCall::ShowPanel(npc.clone()));
    }
    fn hide_panel(&self, npc: &NpcId) {
        self.record(CollaboratorCall::HidePanel(npc.clone()));
    }
    fn show_listening(&self, npc: &NpcId) {
        self.record(CollaboratorCall::ShowListening(npc.clone()));
    }
    fn hide_listening(&self, npc: &NpcId) {
        self.record(CollaboratorCall::HideListening(npc.clone()));
    }
    fn set_text(&self, npc: &NpcId, text: &str) {
        self.record(CollaboratorCall::SetText(npc.clone(), text.to_string()));
    }
    fn play_voice(&self, npc: &NpcId, duration: Duration) {
        self.record(CollaboratorCall::PlayVoice(npc.clone(), duration));
    }
    fn stop_voice(&self, npc: &NpcId) {
        self.record(CollaboratorCall::StopVoice(npc.clone()));
    }
    fn play_sound(&self, sound: SoundCategory) {
        self.record(CollaboratorCall::PlaySound(sound));
    }
    fn start_conversation(&self) {
        self.record(CollaboratorCall::StartConversation);
    }
    fn end_conversation(&self) {
        self.record(CollaboratorCall::EndConversation);
    }
    fn reveal_reward(&self, npc: &NpcId, reward: &str) {
        self.record(CollaboratorCall::RevealReward(npc.clone(), reward.to_string()));
    }
}

impl SpeechCapture for Recorder {
    fn start_capture(&self, npc: &NpcId) {
        self.record(CollaboratorCall::StartCapture(npc.clone()));
    }
    fn stop_capture(&self, npc: &NpcId) {
        self.record(CollaboratorCall::StopCapture(npc.clone()));
    }
    fn cancel_capture(&self, npc: &NpcId) {
        self.record(CollaboratorCall::CancelCapture(npc.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_texts() {
        let recorder = Recorder::new();
        let baker = NpcId::new("baker");
        let smith = NpcId::new("smith");

        recorder.set_text(&baker, "Thinking...");
        recorder.set_text(&smith, "Clang.");
        recorder.set_text(&baker, "Hello.");
        recorder.play_sound(SoundCategory::QuestComplete);

        assert_eq!(recorder.texts(&baker), vec!["Thinking...", "Hello."]);
        assert_eq!(recorder.last_text(&smith).as_deref(), Some("Clang."));
        assert_eq!(
            recorder.count(|c| matches!(c, CollaboratorCall::PlaySound(_))),
            1
        );

        recorder.clear();
        assert!(recorder.calls().is_empty());
    }
}
