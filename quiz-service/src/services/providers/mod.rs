//! Language model backends.
//!
//! Every backend implements [`TextProvider`], so the request path only ever
//! sees `Arc<dyn TextProvider>` and tests can substitute a scripted model.

pub mod candle;
pub mod hub;
pub mod inference_api;
pub mod mock;

use crate::config::{GenerationConfig, ProviderKind, QuizConfig};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Credential rejected: {0}")]
    Unauthorized(String),

    #[error("Model download failed: {0}")]
    Download(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl ProviderError {
    /// Short, stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::NotConfigured(_) => "not_configured",
            ProviderError::Unauthorized(_) => "unauthorized",
            ProviderError::Download(_) => "download",
            ProviderError::ModelLoad(_) => "model_load",
            ProviderError::Tokenizer(_) => "tokenizer",
            ProviderError::Inference(_) => "inference",
            ProviderError::ApiError(_) => "api",
            ProviderError::RateLimited => "rate_limited",
            ProviderError::Unavailable(_) => "unavailable",
            ProviderError::NetworkError(_) => "network",
        }
    }
}

/// Result of one generation call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Newly generated text only; the prompt is never echoed back.
    pub text: String,

    pub prompt_tokens: usize,

    pub generated_tokens: usize,

    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// End-of-sequence or a stop sequence was produced.
    Complete,
    /// The new-token cap was reached.
    Length,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Complete => "complete",
            FinishReason::Length => "length",
        }
    }
}

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_new_tokens: usize,

    pub temperature: f64,

    /// `false` selects greedy decoding and ignores `temperature`.
    pub do_sample: bool,

    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationConfig::default().into()
    }
}

impl From<GenerationConfig> for GenerationParams {
    fn from(config: GenerationConfig) -> Self {
        Self {
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            do_sample: config.do_sample,
            seed: config.seed,
        }
    }
}

impl GenerationParams {
    /// Temperature to hand to a sampler, or `None` for greedy decoding.
    pub fn sampling_temperature(&self) -> Option<f64> {
        if self.do_sample && self.temperature > 0.0 {
            Some(self.temperature)
        } else {
            None
        }
    }
}

/// A loaded language model that turns a prompt into raw text.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Backend label used in logs, metrics and `/health`.
    fn name(&self) -> &'static str;

    /// Model repository this provider serves.
    fn model_id(&self) -> &str;

    /// Run one completion.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

/// Construct the configured backend. Any failure here is fatal to startup.
pub async fn load_provider(config: &QuizConfig) -> Result<Arc<dyn TextProvider>, ProviderError> {
    match config.provider {
        ProviderKind::Local => {
            // Cached artifacts are served without contacting the hub.
            hub::verify_token(
                &hub::http_client()?,
                &config.huggingface.hub_endpoint,
                &config.huggingface.token,
            )
            .await?;
            let settings = candle::CandleSettings::from_config(config);
            let provider = candle::CandleTextProvider::load(settings).await?;
            Ok(Arc::new(provider))
        }
        ProviderKind::InferenceApi => {
            let settings = inference_api::InferenceApiSettings::from_config(config);
            let provider = inference_api::InferenceApiProvider::new(settings)?;
            provider.verify_credentials().await?;
            Ok(Arc::new(provider))
        }
    }
}
