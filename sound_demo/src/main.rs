//! Sound engine demo
//!
//! Synthesizes a short tone, then streams it through the sound system twice:
//! once as a one-shot and once looping until it is stopped. Runs on the
//! simulated backend by default, or on the default output device when built
//! with `--features rodio`.
//!
//! Usage: `sound_demo [config.toml|config.ron]`

use sound_engine::foundation::logging;
use sound_engine::prelude::*;
use std::f32::consts::TAU;
use std::io::Cursor;

const SAMPLE_RATE: u32 = 22050;
const LOOP_TICKS: usize = 40;
const MAX_TICKS: usize = 10_000;

#[cfg(not(feature = "rodio"))]
type Backend = SimulatedBackend;
#[cfg(feature = "rodio")]
type Backend = RodioBackend;

/// Let the backend consume audio until the next tick
#[cfg(not(feature = "rodio"))]
fn wait_tick(sound: &mut SoundSystem<Backend>) {
    sound.backend_mut().advance();
}

#[cfg(feature = "rodio")]
fn wait_tick(_sound: &mut SoundSystem<Backend>) {
    std::thread::sleep(std::time::Duration::from_millis(16));
}

/// Mono 16-bit sine wave as an in-memory WAV file
fn synthesize_tone(frequency: f32, seconds: f32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    let frames = (SAMPLE_RATE as f32 * seconds) as u32;
    for n in 0..frames {
        let t = n as f32 / SAMPLE_RATE as f32;
        let sample = (t * frequency * TAU).sin() * 0.4;
        writer.write_sample((sample * f32::from(i16::MAX)) as i16)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

/// Tick until `instance` has been reclaimed
fn run_until_idle(sound: &mut SoundSystem<Backend>, instance: InstanceHandle) -> usize {
    let mut ticks = 0;
    while sound.is_playing(instance) && ticks < MAX_TICKS {
        wait_tick(sound);
        sound.update();
        ticks += 1;
    }
    ticks
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => ApplicationConfig::load_or_default(&path)?,
        None => ApplicationConfig::default(),
    };
    logging::init_with_level(&config.log_level);
    config.validate()?;

    log::info!("Starting sound engine demo");

    let mut sound = SoundSystem::initialize(Backend::default(), &config.sound)?;

    let wav = synthesize_tone(440.0, 0.5)?;
    let tone = sound.load_sound_data(&wav, &WavDecoder)?;
    if let Some(data) = sound.sound_data(tone) {
        log::info!("Loaded tone: {} bytes, {:.2}s", data.len(), data.duration_secs());
    }

    // One-shot
    let one_shot = sound.create_instance(tone)?;
    sound.play(one_shot)?;
    let ticks = run_until_idle(&mut sound, one_shot);
    log::info!("One-shot finished after {} ticks", ticks);

    // Looping at half gain until stopped
    let looped = sound.create_instance(tone)?;
    sound.set_looping(looped, true)?;
    sound.set_gain(looped, 0.5)?;
    sound.play(looped)?;

    for _ in 0..LOOP_TICKS {
        wait_tick(&mut sound);
        sound.update();
    }
    log::info!("While looping: {:?}", sound.stats());

    sound.stop(looped)?;
    let ticks = run_until_idle(&mut sound, looped);
    log::info!("Looping instance released {} ticks after stop", ticks);

    sound.destroy_instance(one_shot)?;
    sound.destroy_instance(looped)?;
    sound.unregister_sound_data(tone)?;
    sound.finalize()?;

    log::info!("Demo finished");
    Ok(())
}
