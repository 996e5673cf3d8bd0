//! # Sound Engine
//!
//! A fixed-capacity streaming sound engine. Decoded sounds are registered once,
//! played through any number of lightweight instances, and streamed to backend
//! voices through pairs of pre-allocated buffers that are refilled every tick.
//!
//! ## Features
//!
//! - **Fixed Pools**: every voice, buffer, sound and instance is allocated at startup
//! - **Double Buffering**: one buffer plays while the other is refilled
//! - **Polling State Machine**: backend playback state is cached once per tick
//! - **Pluggable Backends**: simulated in-memory backend, optional `rodio` output
//! - **WAV Decoding**: PCM and float WAV files through `hound`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sound_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SoundConfig::default();
//!     let mut sound = SoundSystem::initialize(SimulatedBackend::new(), &config)?;
//!
//!     let wav = std::fs::read("resources/audio/laser.wav")?;
//!     let data = sound.load_sound_data(&wav, &WavDecoder)?;
//!     let instance = sound.create_instance(data)?;
//!     sound.play(instance)?;
//!
//!     while sound.is_playing(instance) {
//!         sound.update();
//!         # break;
//!     }
//!
//!     sound.destroy_instance(instance)?;
//!     sound.unregister_sound_data(data)?;
//!     sound.finalize()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod audio;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        audio::{
            AudioBackend, AudioError, BufferId, DecodedSound, InstanceHandle, SimulatedBackend,
            SoundDataHandle, SoundDecoder, SoundFormat, SoundStats, SoundSystem, VoiceId,
            VoiceState, WavDecoder,
        },
        config::{ApplicationConfig, Config, ConfigError, SoundConfig},
    };

    #[cfg(feature = "rodio")]
    pub use crate::audio::backend::rodio_backend::RodioBackend;
}
