//! In-process model host.
//!
//! Downloads a Mistral-family checkpoint and its tokenizer from the Hugging
//! Face Hub and runs sampling with candle. Weights are loaded once; every
//! request shares them.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use crate::config::QuizConfig;
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::LogitsProcessor;
use candle_transformers::models::mistral::{Config as MistralConfig, Model as Mistral};
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokenizers::Tokenizer;

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SAFETENSORS_INDEX_FILE: &str = "model.safetensors.index.json";
const SINGLE_SAFETENSORS_FILE: &str = "model.safetensors";
const EOS_TOKEN: &str = "</s>";

/// Where to fetch the checkpoint from.
#[derive(Debug, Clone)]
pub struct CandleSettings {
    pub model_id: String,
    pub revision: String,
    pub token: Secret<String>,
    pub hub_endpoint: String,
    pub cache_dir: Option<PathBuf>,
}

impl CandleSettings {
    pub fn from_config(config: &QuizConfig) -> Self {
        Self {
            model_id: config.model.model_id.clone(),
            revision: config.model.revision.clone(),
            token: config.huggingface.token.clone(),
            hub_endpoint: config.huggingface.hub_endpoint.clone(),
            cache_dir: config.model.cache_dir.clone(),
        }
    }
}

/// Tokenizer, weights and device for one loaded checkpoint.
struct ModelHost {
    model_id: String,
    tokenizer: Tokenizer,
    // Forward passes mutate the KV cache, so generations take turns.
    model: Mutex<Mistral>,
    device: Device,
    eos_token_id: Option<u32>,
}

/// Text provider backed by a locally loaded model.
pub struct CandleTextProvider {
    host: Arc<ModelHost>,
}

impl CandleTextProvider {
    /// Download (or reuse cached) artifacts and load them onto the best
    /// available device.
    pub async fn load(settings: CandleSettings) -> Result<Self, ProviderError> {
        let host = tokio::task::spawn_blocking(move || ModelHost::load(&settings))
            .await
            .map_err(|e| ProviderError::ModelLoad(format!("loader task failed: {}", e)))??;

        Ok(Self {
            host: Arc::new(host),
        })
    }
}

impl ModelHost {
    fn load(settings: &CandleSettings) -> Result<Self, ProviderError> {
        let started = Instant::now();
        let device = select_device()?;
        let dtype = dtype_for(&device);

        tracing::info!(
            model = %settings.model_id,
            revision = %settings.revision,
            device = ?device,
            dtype = ?dtype,
            "Loading model from hub"
        );

        let mut builder = ApiBuilder::new()
            .with_endpoint(settings.hub_endpoint.clone())
            .with_token(Some(settings.token.expose_secret().clone()))
            .with_progress(false);
        if let Some(dir) = &settings.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("hub client: {}", e)))?;

        let repo = api.repo(Repo::with_revision(
            settings.model_id.clone(),
            RepoType::Model,
            settings.revision.clone(),
        ));

        let config_path = fetch(&repo, CONFIG_FILE)?;
        let tokenizer_path = fetch(&repo, TOKENIZER_FILE)?;
        let weight_paths = fetch_weights(&repo)?;

        let config_bytes = std::fs::read(&config_path)
            .map_err(|e| ProviderError::ModelLoad(format!("{}: {}", CONFIG_FILE, e)))?;
        let config: MistralConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| ProviderError::ModelLoad(format!("{}: {}", CONFIG_FILE, e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| ProviderError::Tokenizer(e.to_string()))?;
        let eos_token_id = tokenizer.token_to_id(EOS_TOKEN);
        if eos_token_id.is_none() {
            tracing::warn!(
                token = EOS_TOKEN,
                "Tokenizer has no end-of-sequence token; generations will run to the token cap"
            );
        }

        // SAFETY: the shards live in the hub cache and are not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&weight_paths, dtype, &device) }
            .map_err(|e| ProviderError::ModelLoad(e.to_string()))?;
        let model = Mistral::new(&config, vb).map_err(|e| ProviderError::ModelLoad(e.to_string()))?;

        tracing::info!(
            model = %settings.model_id,
            shards = weight_paths.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model loaded"
        );

        Ok(Self {
            model_id: settings.model_id.clone(),
            tokenizer,
            model: Mutex::new(model),
            device,
            eos_token_id,
        })
    }

    fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ProviderError::Tokenizer(e.to_string()))?;
        let mut tokens = encoding.get_ids().to_vec();
        let prompt_len = tokens.len();

        let seed = params.seed.unwrap_or_else(rand::random);
        let mut sampler = LogitsProcessor::new(seed, params.sampling_temperature(), None);

        let mut model = self
            .model
            .lock()
            .map_err(|_| ProviderError::Inference("model lock poisoned".to_string()))?;
        model.clear_kv_cache();

        let mut finish_reason = FinishReason::Length;
        for step in 0..params.max_new_tokens {
            // First step feeds the whole prompt; later steps only the newest token.
            let context_size = if step > 0 { 1 } else { tokens.len() };
            let start_pos = tokens.len().saturating_sub(context_size);
            let input = Tensor::new(&tokens[start_pos..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(inference_error)?;
            let logits = model
                .forward(&input, start_pos)
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.squeeze(0))
                .and_then(|l| l.to_dtype(DType::F32))
                .map_err(inference_error)?;
            let next = sampler.sample(&logits).map_err(inference_error)?;

            if Some(next) == self.eos_token_id {
                finish_reason = FinishReason::Complete;
                break;
            }
            tokens.push(next);
        }
        drop(model);

        let generated = &tokens[prompt_len..];
        let text = self
            .tokenizer
            .decode(generated, true)
            .map_err(|e| ProviderError::Tokenizer(e.to_string()))?;

        Ok(ProviderResponse {
            text,
            prompt_tokens: prompt_len,
            generated_tokens: generated.len(),
            finish_reason,
        })
    }
}

#[async_trait]
impl TextProvider for CandleTextProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn model_id(&self) -> &str {
        &self.host.model_id
    }

    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let host = Arc::clone(&self.host);
        let prompt = prompt.to_string();
        let params = params.clone();

        tracing::debug!(
            model = %self.host.model_id,
            prompt_len = prompt.len(),
            max_new_tokens = params.max_new_tokens,
            "Starting local generation"
        );

        tokio::task::spawn_blocking(move || host.generate(&prompt, &params))
            .await
            .map_err(|e| ProviderError::Inference(format!("generation task failed: {}", e)))?
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        // Weights are resident once `load` has returned.
        Ok(())
    }
}

fn inference_error(err: candle_core::Error) -> ProviderError {
    ProviderError::Inference(err.to_string())
}

fn fetch(repo: &ApiRepo, file: &str) -> Result<PathBuf, ProviderError> {
    repo.get(file)
        .map_err(|e| ProviderError::Download(format!("{}: {}", file, e)))
}

/// Sharded checkpoints list their files in an index; small ones ship a single file.
fn fetch_weights(repo: &ApiRepo) -> Result<Vec<PathBuf>, ProviderError> {
    let index_path = match repo.get(SAFETENSORS_INDEX_FILE) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(error = %e, "No safetensors index, trying single weight file");
            return Ok(vec![fetch(repo, SINGLE_SAFETENSORS_FILE)?]);
        }
    };

    let index_bytes = std::fs::read(&index_path)
        .map_err(|e| ProviderError::ModelLoad(format!("{}: {}", SAFETENSORS_INDEX_FILE, e)))?;
    shard_files(&index_bytes)?
        .iter()
        .map(|shard| fetch(repo, shard))
        .collect()
}

#[derive(Debug, Deserialize)]
struct SafetensorsIndex {
    weight_map: HashMap<String, String>,
}

/// Distinct shard file names referenced by a safetensors index, in stable order.
fn shard_files(index_json: &[u8]) -> Result<Vec<String>, ProviderError> {
    let index: SafetensorsIndex = serde_json::from_slice(index_json)
        .map_err(|e| ProviderError::ModelLoad(format!("{}: {}", SAFETENSORS_INDEX_FILE, e)))?;
    let shards: BTreeSet<String> = index.weight_map.into_values().collect();
    if shards.is_empty() {
        return Err(ProviderError::ModelLoad(format!(
            "{} lists no weight files",
            SAFETENSORS_INDEX_FILE
        )));
    }
    Ok(shards.into_iter().collect())
}

fn select_device() -> Result<Device, ProviderError> {
    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return Ok(device);
        }
    }

    Device::cuda_if_available(0).map_err(|e| ProviderError::ModelLoad(e.to_string()))
}

/// Half precision on accelerators, full precision on CPU.
fn dtype_for(device: &Device) -> DType {
    if device.is_cpu() {
        DType::F32
    } else {
        DType::F16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_files_are_deduplicated_and_sorted() {
        let index = br#"{
            "metadata": {"total_size": 14483464192},
            "weight_map": {
                "lm_head.weight": "model-00002-of-00002.safetensors",
                "model.embed_tokens.weight": "model-00001-of-00002.safetensors",
                "model.layers.0.mlp.up_proj.weight": "model-00001-of-00002.safetensors"
            }
        }"#;

        assert_eq!(
            shard_files(index).unwrap(),
            vec![
                "model-00001-of-00002.safetensors".to_string(),
                "model-00002-of-00002.safetensors".to_string(),
            ]
        );
    }

    #[test]
    fn empty_index_is_a_load_error() {
        let err = shard_files(br#"{"weight_map": {}}"#).unwrap_err();
        assert!(matches!(err, ProviderError::ModelLoad(_)));
    }

    #[test]
    fn malformed_index_is_a_load_error() {
        let err = shard_files(b"not json").unwrap_err();
        assert!(matches!(err, ProviderError::ModelLoad(_)));
    }

    #[test]
    fn cpu_runs_in_full_precision() {
        assert_eq!(dtype_for(&Device::Cpu), DType::F32);
    }
}
