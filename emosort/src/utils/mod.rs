//! Utility modules

pub mod audio_decoder;

pub use audio_decoder::{decode_audio_file, load_waveform, probe_duration, resample, DecodedAudio, Waveform};
