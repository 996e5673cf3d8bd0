//! Audio system
//!
//! Fixed-capacity streaming of decoded sounds to backend voices.
//!
//! ```text
//! SoundSystem
//!     ├── SoundDataRegistry (decoded assets)
//!     ├── InstanceTable     (playback sessions)
//!     ├── VoicePool         (backend voices + cached state)
//!     └── BufferPool        (backend buffers, two per playing instance)
//!                 ↓
//!       play / stop / update (streaming)
//!                 ↓
//!            AudioBackend
//! ```

pub mod backend;
pub mod decoder;
pub mod instance;
pub mod sound_data;
pub mod voice_manager;

mod error;
mod streaming;
mod system;

pub use backend::simulated::SimulatedBackend;
pub use backend::{AudioBackend, BufferId, SoundFormat, VoiceId, VoiceState};
pub use decoder::{DecodedSound, SoundDecoder, WavDecoder};
pub use error::AudioError;
pub use instance::{InstanceHandle, SoundInstance};
pub use sound_data::{SoundData, SoundDataHandle};
pub use system::{SoundStats, SoundSystem};
