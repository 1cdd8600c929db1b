//! Hosted Hugging Face Inference API provider.
//!
//! Sends the prompt to the text-generation endpoint of the hosted model
//! instead of loading weights locally.

use super::{hub, FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::config::QuizConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

/// Endpoint and credential for the hosted API.
#[derive(Debug, Clone)]
pub struct InferenceApiSettings {
    /// Base URL; the model id is appended as a path.
    pub api_url: String,
    /// Hub base URL used to validate the credential.
    pub hub_endpoint: String,
    pub model_id: String,
    pub token: Secret<String>,
}

impl InferenceApiSettings {
    pub fn from_config(config: &QuizConfig) -> Self {
        Self {
            api_url: config.huggingface.inference_api_url.clone(),
            hub_endpoint: config.huggingface.hub_endpoint.clone(),
            model_id: config.model.model_id.clone(),
            token: config.huggingface.token.clone(),
        }
    }
}

/// Hosted inference provider.
pub struct InferenceApiProvider {
    settings: InferenceApiSettings,
    client: Client,
}

impl InferenceApiProvider {
    pub fn new(settings: InferenceApiSettings) -> Result<Self, ProviderError> {
        Ok(Self {
            settings,
            client: hub::http_client()?,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/{}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.model_id
        )
    }

    /// A rejected credential aborts startup.
    pub async fn verify_credentials(&self) -> Result<(), ProviderError> {
        hub::verify_token(&self.client, &self.settings.hub_endpoint, &self.settings.token).await?;
        tracing::info!(model = %self.settings.model_id, "Inference API credential accepted");
        Ok(())
    }
}

#[async_trait]
impl TextProvider for InferenceApiProvider {
    fn name(&self) -> &'static str {
        "inference-api"
    }

    fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = TextGenerationRequest {
            inputs: prompt,
            parameters: TextGenerationParameters {
                max_new_tokens: params.max_new_tokens,
                temperature: params.sampling_temperature(),
                do_sample: params.do_sample,
                seed: params.seed,
                return_full_text: false,
                details: true,
            },
        };

        tracing::debug!(
            model = %self.settings.model_id,
            prompt_len = prompt.len(),
            "Sending request to Inference API"
        );

        let response = self
            .client
            .post(self.generate_url())
            .bearer_auth(self.settings.token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::Unauthorized(format!("Inference API {}", status))
                }
                StatusCode::SERVICE_UNAVAILABLE => ProviderError::Unavailable(error_text),
                _ => ProviderError::ApiError(format!(
                    "Inference API error {}: {}",
                    status, error_text
                )),
            });
        }

        let body: TextGenerationResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        body.into_provider_response()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.verify_credentials().await
    }
}

// ============================================================================
// Inference API Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
struct TextGenerationRequest<'a> {
    inputs: &'a str,
    parameters: TextGenerationParameters,
}

#[derive(Debug, Serialize)]
struct TextGenerationParameters {
    max_new_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    do_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    return_full_text: bool,
    details: bool,
}

/// The API answers with a list for batched inputs and an object otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TextGenerationResponse {
    Batch(Vec<GeneratedText>),
    Single(GeneratedText),
    Error { error: String },
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
    #[serde(default)]
    details: Option<GenerationDetails>,
}

#[derive(Debug, Deserialize)]
struct GenerationDetails {
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    generated_tokens: Option<usize>,
}

impl TextGenerationResponse {
    fn into_provider_response(self) -> Result<ProviderResponse, ProviderError> {
        let generated = match self {
            TextGenerationResponse::Batch(items) => items
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError("empty generation list".to_string()))?,
            TextGenerationResponse::Single(item) => item,
            TextGenerationResponse::Error { error } => return Err(ProviderError::ApiError(error)),
        };

        let details = generated.details.unwrap_or(GenerationDetails {
            finish_reason: None,
            generated_tokens: None,
        });
        let finish_reason = match details.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            _ => FinishReason::Complete,
        };

        Ok(ProviderResponse {
            text: generated.generated_text,
            // The hosted API does not report prompt usage.
            prompt_tokens: 0,
            generated_tokens: details.generated_tokens.unwrap_or(0),
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<ProviderResponse, ProviderError> {
        serde_json::from_str::<TextGenerationResponse>(body)
            .unwrap()
            .into_provider_response()
    }

    #[test]
    fn batch_response_takes_first_item() {
        let response = parse(
            r#"[{"generated_text": "{\"questions\": []}", "details": {"finish_reason": "eos_token", "generated_tokens": 7}}]"#,
        )
        .unwrap();

        assert_eq!(response.text, r#"{"questions": []}"#);
        assert_eq!(response.generated_tokens, 7);
        assert_eq!(response.finish_reason, FinishReason::Complete);
    }

    #[test]
    fn single_object_response_is_accepted() {
        let response = parse(r#"{"generated_text": "hello"}"#).unwrap();
        assert_eq!(response.text, "hello");
        assert_eq!(response.generated_tokens, 0);
    }

    #[test]
    fn length_finish_is_reported() {
        let response = parse(
            r#"[{"generated_text": "...", "details": {"finish_reason": "length", "generated_tokens": 1000}}]"#,
        )
        .unwrap();
        assert_eq!(response.finish_reason, FinishReason::Length);
    }

    #[test]
    fn error_body_becomes_api_error() {
        let err = parse(r#"{"error": "Model is overloaded"}"#).unwrap_err();
        assert!(matches!(err, ProviderError::ApiError(msg) if msg == "Model is overloaded"));
    }

    #[test]
    fn empty_batch_is_an_error() {
        assert!(parse("[]").is_err());
    }

    #[test]
    fn request_omits_temperature_for_greedy_decoding() {
        let params = GenerationParams {
            do_sample: false,
            ..GenerationParams::default()
        };
        let request = TextGenerationRequest {
            inputs: "prompt",
            parameters: TextGenerationParameters {
                max_new_tokens: params.max_new_tokens,
                temperature: params.sampling_temperature(),
                do_sample: params.do_sample,
                seed: None,
                return_full_text: false,
                details: true,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json["parameters"].get("temperature").is_none());
        assert_eq!(json["parameters"]["max_new_tokens"], 1000);
        assert_eq!(json["parameters"]["return_full_text"], false);
    }
}
