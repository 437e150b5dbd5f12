//! Session runtime
//!
//! A [`Session`] is the single task that owns every NPC conversation, the
//! conversation history and the quest tracker. Game code talks to it through
//! a cloneable [`SessionHandle`]; observable progress comes out as
//! [`DialogueEvent`]s on the event channel.
//!
//! Backend calls run as separate tasks so that a slow model never stalls
//! other NPCs. Their results come back through the same inbox, tagged with
//! the request id they answer.
//!
//! Events are published without waiting. When the consumer falls more than
//! `session.event_buffer` events behind, further events are dropped with a
//! warning; the loop itself keeps serving every NPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_core::prelude::*;
//!
//! let config = ParleyConfig::load()?;
//! let (session, handle, mut events) = Session::builder(config).build()?;
//! let task = session.spawn();
//!
//! handle.player_entered("baker").await?;
//! handle.transcribed("baker", "Hello there", true).await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::{self, DialogueBackend, generate_with_timeout};
use crate::collaborators::{Collaborators, NullCollaborators, Presentation, SpeechCapture};
use crate::config::ParleyConfig;
use crate::dialogue::ConversationHistory;
use crate::error::{ParleyError, Result};
use crate::events::{DialogueEvent, EventReceiver, EventSender, event_channel};
use crate::id::{NpcId, RequestId};
use crate::inventory::{Inventory, SocketInventory};
use crate::npc::{ConversationArbiter, NpcOrchestrator, NpcSnapshot, PendingDialogueRequest};
use crate::quest::QuestCompletionTracker;

/// Inputs to the session loop.
#[derive(Debug)]
pub enum SessionCommand {
    PlayerEntered {
        npc: NpcId,
    },
    PlayerExited {
        npc: NpcId,
    },
    RecordPressed {
        npc: NpcId,
    },
    RecordReleased {
        npc: NpcId,
    },
    /// Speech-to-text result for the NPC's last capture
    Transcribed {
        npc: NpcId,
        text: String,
        speech_detected: bool,
    },
    Advance {
        npc: NpcId,
    },
    /// Backend reply for a dispatched request
    GenerationFinished {
        npc: NpcId,
        request_id: RequestId,
        result: Result<String>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown,
}

/// Point-in-time view of the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub npcs: Vec<NpcSnapshot>,
    pub quests_completed: usize,
    pub quests_total: usize,
    pub all_quests_completed: bool,
    pub completed_quests: Vec<String>,
    pub pending_quests: Vec<String>,
    /// Holder of the conversation when conversations are exclusive
    pub active_conversation: Option<NpcId>,
}

impl SessionSnapshot {
    pub fn npc(&self, id: &NpcId) -> Option<&NpcSnapshot> {
        self.npcs.iter().find(|npc| &npc.id == id)
    }
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    config: ParleyConfig,
    backend: Option<Arc<dyn DialogueBackend>>,
    presentation: Option<Arc<dyn Presentation>>,
    speech: Option<Arc<dyn SpeechCapture>>,
    inventory: Option<Arc<dyn Inventory>>,
}

impl SessionBuilder {
    pub fn new(config: ParleyConfig) -> Self {
        Self {
            config,
            backend: None,
            presentation: None,
            speech: None,
            inventory: None,
        }
    }

    /// Set the dialogue backend (defaults to one built from the config)
    pub fn backend(mut self, backend: Arc<dyn DialogueBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn presentation(mut self, presentation: Arc<dyn Presentation>) -> Self {
        self.presentation = Some(presentation);
        self
    }

    pub fn speech(mut self, speech: Arc<dyn SpeechCapture>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn inventory(mut self, inventory: Arc<dyn Inventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Validate the configuration and wire up every NPC.
    pub fn build(self) -> Result<(Session, SessionHandle, EventReceiver)> {
        self.config.validate()?;
        let config = self.config;

        let backend = self
            .backend
            .unwrap_or_else(|| backend::from_config(&config.backend));
        let presentation: Arc<dyn Presentation> = match self.presentation {
            Some(presentation) => presentation,
            None => Arc::new(NullCollaborators),
        };
        let speech: Arc<dyn SpeechCapture> = match self.speech {
            Some(speech) => speech,
            None => Arc::new(NullCollaborators),
        };
        let inventory: Arc<dyn Inventory> = match self.inventory {
            Some(inventory) => inventory,
            None => Arc::new(SocketInventory::new()),
        };
        let collaborators = Collaborators::new(presentation, speech, inventory);

        let dialogue = Arc::new(config.dialogue.clone());
        let audio = Arc::new(config.audio.clone());
        let npcs: BTreeMap<NpcId, NpcOrchestrator> = config
            .npcs
            .iter()
            .map(|npc| {
                let orchestrator = NpcOrchestrator::from_config(
                    npc,
                    Arc::clone(&dialogue),
                    Arc::clone(&audio),
                    collaborators.clone(),
                );
                (npc.id.clone(), orchestrator)
            })
            .collect();

        let mut tracker = QuestCompletionTracker::new();
        if config.quests.is_empty() {
            // one tracked quest per quest-giving NPC, named after its item
            for npc in &config.npcs {
                if let Some(quest) = &npc.quest {
                    tracker.register(npc.id.as_str(), quest.item.as_str());
                }
            }
        } else {
            for quest in &config.quests {
                tracker.register(quest.id.as_str(), quest.name.as_str());
            }
        }

        let (commands, inbox) = mpsc::channel(config.session.command_buffer);
        let (events, receiver) = event_channel(config.session.event_buffer);

        let session = Session {
            backend,
            timeout: config.backend.timeout,
            npcs,
            history: ConversationHistory::new(),
            tracker,
            track_by_npc: config.quests.is_empty(),
            arbiter: config
                .session
                .exclusive_conversations
                .then(ConversationArbiter::new),
            inbox,
            loopback: commands.downgrade(),
            events,
        };
        Ok((session, SessionHandle { commands }, receiver))
    }
}

/// The session loop and everything it owns.
pub struct Session {
    backend: Arc<dyn DialogueBackend>,
    timeout: Duration,
    npcs: BTreeMap<NpcId, NpcOrchestrator>,
    history: ConversationHistory,
    tracker: QuestCompletionTracker,
    // tracked quests were registered per NPC id rather than from `quests`
    track_by_npc: bool,
    arbiter: Option<ConversationArbiter>,
    inbox: mpsc::Receiver<SessionCommand>,
    // weak so the loop ends once every handle is dropped
    loopback: mpsc::WeakSender<SessionCommand>,
    events: EventSender,
}

impl Session {
    pub fn builder(config: ParleyConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Run the loop on a new task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        let model = self.backend.model_info();
        tracing::info!(
            npcs = self.npcs.len(),
            provider = %model.provider,
            model = %model.model_name,
            "Session started"
        );

        while let Some(command) = self.inbox.recv().await {
            if matches!(command, SessionCommand::Shutdown) {
                break;
            }
            self.handle(command);
            self.publish();
        }

        tracing::info!("Session stopped");
    }

    fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::PlayerEntered { npc } => self.player_entered(&npc),
            SessionCommand::PlayerExited { npc } => {
                if let Some(orchestrator) = lookup(&mut self.npcs, &npc) {
                    orchestrator.player_exited(&mut self.history);
                }
                if let Some(arbiter) = self.arbiter.as_mut() {
                    arbiter.release(&npc);
                }
            }
            SessionCommand::RecordPressed { npc } => {
                if let Some(orchestrator) = lookup(&mut self.npcs, &npc) {
                    orchestrator.record_pressed(Instant::now());
                }
            }
            SessionCommand::RecordReleased { npc } => {
                if let Some(orchestrator) = lookup(&mut self.npcs, &npc) {
                    orchestrator.record_released(Instant::now());
                }
            }
            SessionCommand::Transcribed {
                npc,
                text,
                speech_detected,
            } => {
                let request = lookup(&mut self.npcs, &npc).and_then(|orchestrator| {
                    orchestrator.transcription_finished(&text, speech_detected, &mut self.history)
                });
                if let Some(request) = request {
                    self.dispatch(request);
                }
            }
            SessionCommand::Advance { npc } => {
                if let Some(orchestrator) = lookup(&mut self.npcs, &npc) {
                    orchestrator.advance();
                }
            }
            SessionCommand::GenerationFinished {
                npc,
                request_id,
                result,
            } => {
                if let Some(orchestrator) = lookup(&mut self.npcs, &npc) {
                    orchestrator.response_received(request_id, result, &mut self.history);
                }
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn player_entered(&mut self, npc: &NpcId) {
        if !self.npcs.contains_key(npc) {
            tracing::warn!(%npc, "Command for unknown NPC ignored");
            return;
        }

        if let Some(displaced) = self
            .arbiter
            .as_mut()
            .and_then(|arbiter| arbiter.force_acquire(npc))
        {
            tracing::info!(%displaced, %npc, "Conversation taken over");
            if let Some(previous) = self.npcs.get_mut(&displaced) {
                previous.player_exited(&mut self.history);
            }
        }

        let request = self
            .npcs
            .get_mut(npc)
            .and_then(|orchestrator| orchestrator.player_entered(&mut self.history));
        if let Some(request) = request {
            self.dispatch(request);
        }
    }

    /// Send a request to the backend on its own task.
    fn dispatch(&self, request: PendingDialogueRequest) {
        let backend = Arc::clone(&self.backend);
        let loopback = self.loopback.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let result = generate_with_timeout(
                backend.as_ref(),
                &request.outgoing_input,
                &request.history,
                &request.instruction,
                timeout,
            )
            .await;

            let Some(inbox) = loopback.upgrade() else {
                tracing::debug!(npc = %request.npc_id, "Session gone, dropping reply");
                return;
            };
            let _ = inbox
                .send(SessionCommand::GenerationFinished {
                    npc: request.npc_id,
                    request_id: request.request_id,
                    result,
                })
                .await;
        });
    }

    /// Forward NPC events and feed quest completions to the tracker.
    fn publish(&mut self) {
        let mut outgoing = Vec::new();
        for orchestrator in self.npcs.values_mut() {
            outgoing.extend(orchestrator.drain_events());
            for completion in orchestrator.drain_completions() {
                let signals = if self.track_by_npc {
                    self.tracker.complete(completion.npc_id.as_str())
                } else {
                    self.tracker.complete_by_item(&completion.quest_item)
                };
                outgoing.extend(signals.into_iter().map(DialogueEvent::from));
            }
        }

        for event in outgoing {
            tracing::trace!(event_type = event.event_type(), "Publishing event");
            match self.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    tracing::warn!(
                        event_type = event.event_type(),
                        "Event buffer full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let (quests_completed, quests_total) = self.tracker.progress();
        SessionSnapshot {
            npcs: self.npcs.values().map(NpcOrchestrator::snapshot).collect(),
            quests_completed,
            quests_total,
            all_quests_completed: self.tracker.is_all_completed(),
            completed_quests: self.tracker.completed_quests(),
            pending_quests: self.tracker.pending_quests(),
            active_conversation: self
                .arbiter
                .as_ref()
                .and_then(|arbiter| arbiter.current().cloned()),
        }
    }
}

fn lookup<'a>(
    npcs: &'a mut BTreeMap<NpcId, NpcOrchestrator>,
    npc: &NpcId,
) -> Option<&'a mut NpcOrchestrator> {
    let orchestrator = npcs.get_mut(npc);
    if orchestrator.is_none() {
        tracing::warn!(%npc, "Command for unknown NPC ignored");
    }
    orchestrator
}

/// Cloneable front door to a running [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    /// Queue a raw command.
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ParleyError::SessionClosed)
    }

    pub async fn player_entered(&self, npc: impl Into<NpcId>) -> Result<()> {
        self.send(SessionCommand::PlayerEntered { npc: npc.into() })
            .await
    }

    pub async fn player_exited(&self, npc: impl Into<NpcId>) -> Result<()> {
        self.send(SessionCommand::PlayerExited { npc: npc.into() })
            .await
    }

    pub async fn record_pressed(&self, npc: impl Into<NpcId>) -> Result<()> {
        self.send(SessionCommand::RecordPressed { npc: npc.into() })
            .await
    }

    pub async fn record_released(&self, npc: impl Into<NpcId>) -> Result<()> {
        self.send(SessionCommand::RecordReleased { npc: npc.into() })
            .await
    }

    pub async fn transcribed(
        &self,
        npc: impl Into<NpcId>,
        text: impl Into<String>,
        speech_detected: bool,
    ) -> Result<()> {
        self.send(SessionCommand::Transcribed {
            npc: npc.into(),
            text: text.into(),
            speech_detected,
        })
        .await
    }

    pub async fn advance(&self, npc: impl Into<NpcId>) -> Result<()> {
        self.send(SessionCommand::Advance { npc: npc.into() }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply }).await?;
        response.await.map_err(|_| ParleyError::SessionClosed)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown).await
    }
}
