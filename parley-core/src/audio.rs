//! Sound categories, voice pacing and background-music ducking

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::AudioConfig;

/// Sounds the core asks the audio collaborator to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCategory {
    /// Looping background music
    BackgroundMusic,
    /// Item placed in an inventory socket
    ItemPickup,
    /// Synthesized "talking" sound while a sentence is shown
    NpcTalking,
    /// Quest completion fanfare
    QuestComplete,
}

/// How long the talking sound plays for a sentence.
///
/// Proportional to the sentence length at the configured speaking rate,
/// clamped to the configured bounds.
pub fn voice_duration(text: &str, config: &AudioConfig) -> Duration {
    let chars = text.chars().count() as f32;
    let rate = config.characters_per_second.max(f32::EPSILON);
    let seconds = chars / rate;
    let min = config.min_voice_duration.as_secs_f32();
    let max = config.max_voice_duration.as_secs_f32().max(min);
    Duration::from_secs_f32(seconds.clamp(min, max))
}

/// Background volume bookkeeping for conversation ducking.
///
/// Starting a conversation keeps `ducking_amount` of the current volume;
/// ending it restores the volume captured at the first start. Nested starts
/// do not compound.
#[derive(Debug, Clone)]
pub struct Ducker {
    ducking_amount: f32,
    volume: f32,
    restore_to: Option<f32>,
}

impl Ducker {
    /// Ducking amounts are clamped to 0.1-0.9.
    pub fn new(volume: f32, ducking_amount: f32) -> Self {
        Self {
            ducking_amount: ducking_amount.clamp(0.1, 0.9),
            volume,
            restore_to: None,
        }
    }

    pub fn from_config(volume: f32, config: &AudioConfig) -> Self {
        Self::new(volume, config.ducking_amount)
    }

    /// Duck the background music; returns the new volume.
    pub fn start_conversation(&mut self) -> f32 {
        if self.restore_to.is_none() {
            self.restore_to = Some(self.volume);
            self.volume *= self.ducking_amount;
        }
        self.volume
    }

    /// Restore the background music; returns the new volume.
    pub fn end_conversation(&mut self) -> f32 {
        if let Some(original) = self.restore_to.take() {
            self.volume = original;
        }
        self.volume
    }

    pub fn is_ducked(&self) -> bool {
        self.restore_to.is_some()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}
