//! Test Helper Utilities
//!
//! Shared fixtures for the emosort integration tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod mock_services;

pub use audio_generator::{generate_test_wav, write_caption, AudioConfig};
pub use mock_services::{MockClassifier, MockRecognizer};
