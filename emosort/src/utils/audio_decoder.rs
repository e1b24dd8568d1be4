//! Audio probing, decoding and resampling
//!
//! Uses symphonia for container/codec handling and rubato for sample rate
//! conversion. Everything here is blocking; async callers go through
//! `tokio::task::spawn_blocking`.

use anyhow::{Context, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecParameters, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded mono audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
    /// Duration in seconds
    pub duration_seconds: f64,
}

/// Mono waveform at the rate a recognition service expects
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn open_format(file_path: &Path) -> Result<Box<dyn FormatReader>> {
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open audio file: {}", file_path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = file_path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe audio file: {}", file_path.display()))?;

    Ok(probed.format)
}

fn default_track_params(format: &dyn FormatReader) -> Result<(u32, CodecParameters)> {
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found in file")?;
    Ok((track.id, track.codec_params.clone()))
}

/// Clip duration in seconds
///
/// Reads the frame count from the container header when available; falls
/// back to decoding the whole stream otherwise.
pub fn probe_duration(file_path: &Path) -> Result<f64> {
    let format = open_format(file_path)?;
    let (_, params) = default_track_params(format.as_ref())?;

    let sample_rate = params.sample_rate.context("Sample rate unknown")?;
    if sample_rate == 0 {
        anyhow::bail!("Invalid sample rate 0 in {}", file_path.display());
    }

    if let Some(n_frames) = params.n_frames {
        return Ok(n_frames as f64 / sample_rate as f64);
    }

    tracing::debug!(
        path = %file_path.display(),
        "Frame count missing from header, decoding to measure duration"
    );
    Ok(decode_audio_file(file_path)?.duration_seconds)
}

/// Decode an audio file to mono f32 PCM
///
/// Multi-channel audio is mixed down by averaging channels.
pub fn decode_audio_file(file_path: &Path) -> Result<DecodedAudio> {
    tracing::debug!(path = %file_path.display(), "Decoding audio file");

    let mut format = open_format(file_path)?;
    let (track_id, params) = default_track_params(format.as_ref())?;

    let sample_rate = params.sample_rate.context("Sample rate unknown")?;
    let channel_count = params.channels.context("Channels unknown")?.count();

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .with_context(|| format!("Failed to create decoder for: {}", file_path.display()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(anyhow::anyhow!("Error reading packet: {}", e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .with_context(|| format!("Failed to decode packet in: {}", file_path.display()))?;

        let buf = sample_buf.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec())
        });
        if buf.capacity() < decoded.capacity() * decoded.spec().channels.count() {
            *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        }
        buf.copy_interleaved_ref(decoded);

        samples.extend(downmix_interleaved(buf.samples(), channel_count));
    }

    let duration_seconds = samples.len() as f64 / sample_rate as f64;

    tracing::debug!(
        path = %file_path.display(),
        total_samples = samples.len(),
        duration_seconds = format!("{:.2}", duration_seconds),
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channel_count,
        duration_seconds,
    })
}

/// Average interleaved frames into one channel
fn downmix_interleaved(interleaved: &[f32], channels: usize) -> impl Iterator<Item = f32> + '_ {
    let channels = channels.max(1);
    interleaved
        .chunks_exact(channels)
        .map(move |frame| frame.iter().sum::<f32>() / channels as f32)
}

/// Resample mono PCM to `target_rate`
///
/// Single-pass sinc interpolation; returns the input unchanged when the
/// rates already match.
pub fn resample(samples: Vec<f32>, source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples);
    }
    if source_rate == 0 || target_rate == 0 {
        anyhow::bail!("Cannot resample {} Hz → {} Hz", source_rate, target_rate);
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let num_frames = samples.len();

    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, num_frames, 1)
        .context("Failed to create rubato resampler")?;

    let mut output = resampler
        .process(&[samples], None)
        .context("Rubato resampling failed")?;

    let mono = output.pop().unwrap_or_default();

    tracing::debug!(
        "Resampled {} frames ({} Hz) → {} frames ({} Hz)",
        num_frames,
        source_rate,
        mono.len(),
        target_rate
    );

    Ok(mono)
}

/// Decode a clip and bring it to `target_rate`
pub fn load_waveform(file_path: &Path, target_rate: u32) -> Result<Waveform> {
    let decoded = decode_audio_file(file_path)?;
    let samples = resample(decoded.samples, decoded.sample_rate, target_rate)
        .with_context(|| format!("Failed to resample: {}", file_path.display()))?;
    Ok(Waveform {
        samples,
        sample_rate: target_rate,
    })
}
