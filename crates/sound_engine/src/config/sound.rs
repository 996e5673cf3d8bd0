//! # Sound Configuration
//!
//! Pool capacities and streaming parameters for the sound system. Every
//! field has a default so partial config files are accepted:
//!
//! ```toml
//! log_level = "debug"
//!
//! [sound]
//! gain = 0.8
//! max_voices = 8
//! ```

use super::Config;
use serde::{Deserialize, Serialize};

/// Capacities and streaming parameters passed to `SoundSystem::initialize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Master gain applied on top of every instance gain
    pub gain: f32,
    /// Maximum number of registered sound data assets
    pub max_sound_data: usize,
    /// Number of backend voices created at startup
    #[serde(alias = "max_sources")]
    pub max_voices: usize,
    /// Number of backend buffers created at startup (two per playing instance)
    pub max_buffers: usize,
    /// Bytes copied into a buffer per refill
    pub buffer_size: usize,
    /// Maximum number of live sound instances
    pub max_instances: usize,
}

impl SoundConfig {
    /// Create a sound configuration with default capacities
    pub fn new() -> Self {
        Self {
            gain: 1.0,
            max_sound_data: 128,
            max_voices: 16,
            max_buffers: 32,
            buffer_size: 4 * 4096,
            max_instances: 256,
        }
    }

    /// Set master gain
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    /// Set maximum number of sound data assets
    pub fn with_max_sound_data(mut self, max: usize) -> Self {
        self.max_sound_data = max;
        self
    }

    /// Set number of voices
    pub fn with_max_voices(mut self, max: usize) -> Self {
        self.max_voices = max;
        self
    }

    /// Set number of buffers
    pub fn with_max_buffers(mut self, max: usize) -> Self {
        self.max_buffers = max;
        self
    }

    /// Set refill chunk size in bytes
    pub fn with_buffer_size(mut self, bytes: usize) -> Self {
        self.buffer_size = bytes;
        self
    }

    /// Set maximum number of instances
    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = max;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.gain.is_finite() || self.gain < 0.0 {
            return Err(format!("Gain must be a finite non-negative number, got {}", self.gain));
        }

        if self.buffer_size == 0 {
            return Err("Buffer size must be at least 1 byte".to_string());
        }

        if self.max_buffers < 2 {
            return Err(format!(
                "At least 2 buffers are required for double buffering, got {}",
                self.max_buffers
            ));
        }

        let limit = u32::MAX as usize;
        for (name, value) in [
            ("max_sound_data", self.max_sound_data),
            ("max_voices", self.max_voices),
            ("max_buffers", self.max_buffers),
            ("max_instances", self.max_instances),
        ] {
            if value > limit {
                return Err(format!("{} exceeds {}", name, limit));
            }
        }

        Ok(())
    }
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for SoundConfig {}

/// # Complete Application Configuration
///
/// Top-level configuration file layout used by applications embedding the
/// sound engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Log level used when `RUST_LOG` is unset
    pub log_level: String,
    /// Sound system configuration
    pub sound: SoundConfig,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        self.sound.validate()
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            sound: SoundConfig::default(),
        }
    }
}

impl Config for ApplicationConfig {}
