//! Emotion recognition and text classification collaborators
//!
//! The models run outside this process. The pipeline only sees two traits:
//! [`EmotionRecognizer`] (waveform → ranked labels) and [`TextClassifier`]
//! (short text → ranked labels). The HTTP implementations below speak JSON
//! and accept the model's native `{labels, scores}` output shape.
//!
//! A hung inference call is bounded by the client request timeout.

use crate::models::LabelScore;
use crate::utils::audio_decoder::Waveform;
use async_trait::async_trait;
use emosort_common::config::ServicesConfig;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("emosort/", env!("CARGO_PKG_VERSION"));

/// Service collaborator errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Service error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Service returned no labels")]
    EmptyResult,
}

/// Speech emotion recognition service
#[async_trait]
pub trait EmotionRecognizer: Send + Sync {
    /// Sample rate the service expects waveforms in
    fn target_sample_rate(&self) -> u32;

    /// Ranked `(label, score)` list for one utterance
    async fn recognize(&self, waveform: &Waveform) -> Result<Vec<LabelScore>, ServiceError>;
}

/// Text emotion classification service
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Ranked `(label, score)` list for a short text
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ServiceError>;
}

/// Native model output: parallel label/score arrays
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RankedResponse {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl RankedResponse {
    pub fn into_ranked(self) -> Result<Vec<LabelScore>, ServiceError> {
        if self.labels.len() != self.scores.len() {
            return Err(ServiceError::Parse(format!(
                "{} labels but {} scores",
                self.labels.len(),
                self.scores.len()
            )));
        }
        if self.labels.is_empty() {
            return Err(ServiceError::EmptyResult);
        }
        Ok(self
            .labels
            .into_iter()
            .zip(self.scores)
            .map(|(label, score)| LabelScore { label, score })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct RecognizeRequest<'a> {
    samples: &'a [f32],
    sample_rate: u32,
    model_revision: &'a str,
    granularity: &'static str,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared JSON-over-HTTP plumbing
#[derive(Clone)]
struct ServiceClient {
    http_client: reqwest::Client,
    endpoint: String,
    rate_limiter: Option<Arc<DirectLimiter>>,
}

impl ServiceClient {
    fn new(endpoint: &str, config: &ServicesConfig) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let rate_limiter = config
            .max_requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| Arc::new(RateLimiter::direct(Quota::per_second(rps))));

        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
            rate_limiter,
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, body: &B) -> Result<Vec<LabelScore>, ServiceError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        let ranked: RankedResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        ranked.into_ranked()
    }
}

/// HTTP speech emotion recognizer
pub struct HttpEmotionRecognizer {
    client: ServiceClient,
    model_revision: String,
    target_sample_rate: u32,
}

impl HttpEmotionRecognizer {
    pub fn new(
        config: &ServicesConfig,
        model_revision: &str,
        target_sample_rate: u32,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(&config.emotion_url, config)?,
            model_revision: model_revision.to_string(),
            target_sample_rate,
        })
    }
}

#[async_trait]
impl EmotionRecognizer for HttpEmotionRecognizer {
    fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    async fn recognize(&self, waveform: &Waveform) -> Result<Vec<LabelScore>, ServiceError> {
        tracing::debug!(
            samples = waveform.samples.len(),
            sample_rate = waveform.sample_rate,
            "Requesting emotion recognition"
        );
        self.client
            .post(&RecognizeRequest {
                samples: &waveform.samples,
                sample_rate: waveform.sample_rate,
                model_revision: &self.model_revision,
                granularity: "utterance",
            })
            .await
    }
}

/// HTTP text emotion classifier
pub struct HttpTextClassifier {
    client: ServiceClient,
}

impl HttpTextClassifier {
    pub fn new(config: &ServicesConfig) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(&config.text_url, config)?,
        })
    }
}

#[async_trait]
impl TextClassifier for HttpTextClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ServiceError> {
        tracing::debug!(text, "Requesting text classification");
        self.client.post(&ClassifyRequest { text }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranked_response_pairs_labels_and_scores() {
        let response: RankedResponse = serde_json::from_str(
            r#"{"labels": ["生气/angry", "中立/neutral"], "scores": [0.25, 0.75]}"#,
        )
        .unwrap();
        let ranked = response.into_ranked().unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[1], LabelScore::new("中立/neutral", 0.75));
    }

    #[test]
    fn test_ranked_response_length_mismatch() {
        let response = RankedResponse {
            labels: vec!["a".to_string()],
            scores: vec![],
        };
        assert!(matches!(response.into_ranked(), Err(ServiceError::Parse(_))));
    }

    #[test]
    fn test_ranked_response_empty() {
        let response = RankedResponse {
            labels: vec![],
            scores: vec![],
        };
        assert!(matches!(response.into_ranked(), Err(ServiceError::EmptyResult)));
    }

    #[test]
    fn test_client_creation() {
        let mut config = ServicesConfig::default();
        config.max_requests_per_second = Some(5);
        assert!(HttpEmotionRecognizer::new(&config, "v2.0.4", 16_000).is_ok());
        assert!(HttpTextClassifier::new(&config).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let config = ServicesConfig {
            emotion_url: "http://127.0.0.1:9/emotion".to_string(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let recognizer = HttpEmotionRecognizer::new(&config, "v2.0.4", 16_000).unwrap();
        let waveform = Waveform {
            samples: vec![0.0; 160],
            sample_rate: 16_000,
        };
        let result = recognizer.recognize(&waveform).await;
        assert!(matches!(result, Err(ServiceError::Network(_))));
    }
}
