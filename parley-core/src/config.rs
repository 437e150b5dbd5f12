//! Configuration types for Parley

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::error::{ParleyError, Result};
use crate::id::NpcId;

/// Main configuration for a Parley session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ParleyConfig {
    /// Generative-text backend configuration
    pub backend: BackendConfig,

    /// Conversation behaviour
    pub dialogue: DialogueConfig,

    /// Voice pacing and music ducking
    pub audio: AudioConfig,

    /// Session runtime configuration
    pub session: SessionConfig,

    /// NPCs spawned into the session
    pub npcs: Vec<NpcConfig>,

    /// Quests registered with the completion tracker at startup
    pub quests: Vec<QuestRegistration>,
}

/// Generative-text backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API key (prefer the `GEMINI_API_KEY` env var)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// Base URL of the generative language API
    pub base_url: String,

    /// Upper bound on one request round trip
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Sampling parameters sent with every request
    pub generation: GenerationConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(20),
            generation: GenerationConfig::default(),
        }
    }
}

/// Sampling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Temperature (0.0-2.0)
    pub temperature: f32,

    /// Top-k sampling
    pub top_k: u32,

    /// Nucleus sampling (0.0-1.0)
    pub top_p: f32,

    /// Maximum tokens in the reply
    pub max_output_tokens: u32,

    /// Requested reply MIME type
    pub response_mime_type: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

/// Conversation behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueConfig {
    /// Global instruction combined with every NPC prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Text sent in place of an empty auto-greeting input
    pub greeting_input: String,

    /// Placeholder shown while a reply is pending
    pub thinking_text: String,

    /// Text shown when the backend fails
    pub error_text: String,

    /// Recordings shorter than this are discarded without transcription
    #[serde(with = "humantime_serde")]
    pub min_recording_duration: Duration,

    /// Forget the NPC's history when the player walks away
    pub clear_history_on_exit: bool,

    /// Start every auto-greeting from an empty history
    pub reset_history_on_greeting: bool,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            system_message: None,
            greeting_input: "The player approaches.".to_string(),
            thinking_text: "Thinking...".to_string(),
            error_text: "Error getting response.".to_string(),
            min_recording_duration: Duration::from_millis(300),
            clear_history_on_exit: false,
            reset_history_on_greeting: true,
        }
    }
}

impl DialogueConfig {
    /// Combine the global system message with an NPC prompt.
    pub fn instruction_for(&self, prompt: &str) -> String {
        match self.system_message.as_deref() {
            Some(system) if !system.is_empty() && !prompt.is_empty() => {
                format!("{}\n{}", system, prompt)
            }
            Some(system) if !system.is_empty() => system.to_string(),
            _ => prompt.to_string(),
        }
    }
}

/// Voice pacing and music ducking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Fraction of the background volume kept while an NPC talks
    pub ducking_amount: f32,

    /// Speaking rate used to size the talking sound
    pub characters_per_second: f32,

    /// Shortest talking sound
    #[serde(with = "humantime_serde")]
    pub min_voice_duration: Duration,

    /// Longest talking sound
    #[serde(with = "humantime_serde")]
    pub max_voice_duration: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ducking_amount: 0.3,
            characters_per_second: 15.0,
            min_voice_duration: Duration::from_millis(500),
            max_voice_duration: Duration::from_secs(6),
        }
    }
}

/// Session runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the command inbox
    pub command_buffer: usize,

    /// Capacity of the outbound event channel
    pub event_buffer: usize,

    /// Allow only one NPC conversation at a time
    pub exclusive_conversations: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command_buffer: 64,
            event_buffer: 100,
            exclusive_conversations: false,
        }
    }
}

/// One NPC spawned into the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcConfig {
    /// Unique NPC id
    pub id: NpcId,

    /// Default instruction; also the opening prompt of a quest
    #[serde(default)]
    pub prompt: String,

    /// Quest offered by this NPC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest: Option<NpcQuestConfig>,
}

/// Quest offered by an NPC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcQuestConfig {
    /// Item the NPC asks for (matched case-insensitively)
    pub item: String,

    /// Prompt while the quest is active
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_prompt: Option<String>,

    /// Prompt once the quest is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_prompt: Option<String>,

    /// Object revealed on completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
}

/// Quest registered with the completion tracker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestRegistration {
    pub id: String,
    pub name: String,
}

impl ParleyConfig {
    /// Load configuration from defaults, file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `parley.toml` in the working directory
    /// 3. The file named by `PARLEY_CONFIG_PATH`
    /// 4. `PARLEY_` environment variables, nested with `__`
    ///    (e.g. `PARLEY_BACKEND__MODEL`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(ParleyConfig::default()))
            .merge(Toml::file("parley.toml"));

        if let Ok(path) = std::env::var("PARLEY_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ParleyConfig = figment
            .merge(Env::prefixed("PARLEY_").ignore(&["CONFIG_PATH"]).split("__"))
            .extract()
            .map_err(|e| {
                ParleyError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: ParleyConfig = Figment::from(Serialized::defaults(ParleyConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                ParleyError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Look up an NPC by id
    pub fn npc(&self, id: &NpcId) -> Option<&NpcConfig> {
        self.npcs.iter().find(|npc| &npc.id == id)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        let generation = &self.backend.generation;
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ParleyError::Configuration(format!(
                "temperature must be within 0.0-2.0, got {}",
                generation.temperature
            )));
        }
        if !(0.0..=1.0).contains(&generation.top_p) {
            return Err(ParleyError::Configuration(format!(
                "top_p must be within 0.0-1.0, got {}",
                generation.top_p
            )));
        }
        if self.backend.timeout.is_zero() {
            return Err(ParleyError::Configuration(
                "backend timeout must be greater than zero".to_string(),
            ));
        }
        if !(0.1..=0.9).contains(&self.audio.ducking_amount) {
            return Err(ParleyError::Configuration(format!(
                "ducking_amount must be within 0.1-0.9, got {}",
                self.audio.ducking_amount
            )));
        }
        if self.audio.characters_per_second <= 0.0 {
            return Err(ParleyError::Configuration(
                "characters_per_second must be positive".to_string(),
            ));
        }

        if self.session.command_buffer == 0 || self.session.event_buffer == 0 {
            return Err(ParleyError::Configuration(format!(
                "session buffers must be greater than zero, got command_buffer={} event_buffer={}",
                self.session.command_buffer, self.session.event_buffer
            )));
        }

        let mut seen = HashSet::new();
        for npc in &self.npcs {
            if !seen.insert(&npc.id) {
                return Err(ParleyError::Configuration(format!(
                    "duplicate NPC id: {}",
                    npc.id
                )));
            }
            if let Some(quest) = &npc.quest {
                if quest.item.trim().is_empty() {
                    return Err(ParleyError::Configuration(format!(
                        "NPC {} has a quest without an item",
                        npc.id
                    )));
                }
            }
        }

        Ok(())
    }
}
