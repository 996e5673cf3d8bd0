//! Sound decoding
//!
//! Turns encoded sound files into raw PCM bytes the sound system can stream.
//! Decoding happens once, at registration time, never on the streaming path.

use crate::audio::{AudioError, SoundFormat};
use hound::{SampleFormat, WavReader};
use std::io::Cursor;

/// Decoded PCM samples plus their layout
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSound {
    /// Raw interleaved sample bytes
    pub samples: Vec<u8>,
    /// Sample layout of `samples`
    pub format: SoundFormat,
}

impl DecodedSound {
    /// Create a decoded sound from raw bytes
    pub fn new(samples: Vec<u8>, format: SoundFormat) -> Self {
        Self { samples, format }
    }
}

/// Encoded container formats recognized by [`detect_format`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// WAV uncompressed
    Wav,
    /// OGG Vorbis compressed
    Ogg,
    /// MP3 compressed
    Mp3,
    /// FLAC lossless
    Flac,
    /// Unknown format
    Unknown,
}

/// Detect the container format from magic bytes
pub fn detect_format(bytes: &[u8]) -> AudioFormat {
    if bytes.len() < 4 {
        return AudioFormat::Unknown;
    }

    match &bytes[0..4] {
        b"RIFF" => AudioFormat::Wav,
        b"OggS" => AudioFormat::Ogg,
        b"fLaC" => AudioFormat::Flac,
        // MP3 can start with ID3 tag or frame sync
        [0xFF, 0xFB, _, _] | [0xFF, 0xFA, _, _] | [b'I', b'D', b'3', _] => AudioFormat::Mp3,
        _ => AudioFormat::Unknown,
    }
}

/// Decoder collaborator used by `SoundSystem::load_sound_data`
pub trait SoundDecoder {
    /// Decode a complete in-memory sound file
    fn decode(&self, bytes: &[u8]) -> Result<DecodedSound, AudioError>;
}

/// WAV decoder backed by `hound`
///
/// 8-bit PCM is kept as unsigned bytes and 16-bit PCM as little-endian
/// samples. Wider integer and 32-bit float files are converted to 16-bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

impl SoundDecoder for WavDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedSound, AudioError> {
        match detect_format(bytes) {
            AudioFormat::Wav => {}
            AudioFormat::Unknown => {
                return Err(AudioError::DecodeFailed("Unknown audio format".to_string()));
            }
            other => {
                return Err(AudioError::UnsupportedFormat(format!("{:?} is not a WAV file", other)));
            }
        }

        let mut reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        if spec.channels == 0 || spec.channels > 2 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} channels (only mono and stereo are supported)",
                spec.channels
            )));
        }

        let sample_count = reader.len() as usize;
        let (samples, bits_per_sample) = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8) => {
                let mut out = Vec::with_capacity(sample_count);
                for sample in reader.samples::<i8>() {
                    // Stored unsigned, centered on 128
                    out.push((i16::from(sample?) + 128) as u8);
                }
                (out, 8)
            }
            (SampleFormat::Int, 16) => {
                let mut out = Vec::with_capacity(sample_count * 2);
                for sample in reader.samples::<i16>() {
                    out.extend_from_slice(&sample?.to_le_bytes());
                }
                (out, 16)
            }
            (SampleFormat::Int, bits @ (24 | 32)) => {
                let shift = bits - 16;
                let mut out = Vec::with_capacity(sample_count * 2);
                for sample in reader.samples::<i32>() {
                    out.extend_from_slice(&((sample? >> shift) as i16).to_le_bytes());
                }
                (out, 16)
            }
            (SampleFormat::Float, 32) => {
                let mut out = Vec::with_capacity(sample_count * 2);
                for sample in reader.samples::<f32>() {
                    let scaled = (sample?.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                    out.extend_from_slice(&scaled.to_le_bytes());
                }
                (out, 16)
            }
            (format, bits) => {
                return Err(AudioError::UnsupportedFormat(format!("{:?} {}-bit samples", format, bits)));
            }
        };

        log::debug!(
            "Decoded WAV: {} bytes, {} channels, {} Hz, {}-bit",
            samples.len(),
            spec.channels,
            spec.sample_rate,
            bits_per_sample
        );

        Ok(DecodedSound::new(
            samples,
            SoundFormat::new(spec.channels, bits_per_sample, spec.sample_rate),
        ))
    }
}
