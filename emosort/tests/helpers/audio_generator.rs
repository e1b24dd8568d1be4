//! WAV fixture generator
//!
//! Clips are described by an exact frame count so duration boundaries can be
//! hit precisely (48000 frames at 16 kHz is exactly 3.0 s).

use std::path::{Path, PathBuf};

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub frames: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frames: 16_000,
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

impl AudioConfig {
    /// Mono 16 kHz clip with exactly `frames` frames
    pub fn frames(frames: u32) -> Self {
        Self {
            frames,
            ..Default::default()
        }
    }

    /// Mono 16 kHz clip of `seconds` (rounded down to whole frames)
    pub fn seconds(seconds: f64) -> Self {
        Self::frames((seconds * 16_000.0) as u32)
    }
}

/// Write a 440 Hz tone WAV at `path`, creating parent folders
pub fn generate_test_wav(path: &Path, config: &AudioConfig) -> anyhow::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for i in 0..config.frames {
        let t = i as f32 / config.sample_rate as f32;
        let sample = (0.3 * (2.0 * std::f32::consts::PI * 440.0 * t).sin() * i16::MAX as f32) as i16;
        for _ in 0..config.channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()?;
    Ok(path.to_path_buf())
}

/// Write a `.lab` caption beside `clip`
pub fn write_caption(clip: &Path, text: &str) -> anyhow::Result<PathBuf> {
    let caption = clip.with_extension("lab");
    std::fs::write(&caption, text)?;
    Ok(caption)
}
