use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_MODEL_ID: &str = "mistralai/Mistral-7B-Instruct-v0.1";
const DEFAULT_MODEL_REVISION: &str = "main";
const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";
const DEFAULT_INFERENCE_API_URL: &str = "https://api-inference.huggingface.co/models";

const DEFAULT_MAX_NEW_TOKENS: usize = 1000;
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// 10 MiB.
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Uploaded text beyond this is cut off to fit the model's context.
const DEFAULT_MAX_DOCUMENT_CHARS: usize = 6000;

#[derive(Debug, Clone)]
pub struct QuizConfig {
    pub common: core_config::Config,
    pub provider: ProviderKind,
    pub model: ModelConfig,
    pub huggingface: HuggingFaceConfig,
    pub generation: GenerationConfig,
    pub validation: ValidationMode,
    pub http: HttpConfig,
    pub documents: DocumentConfig,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Hub repository, e.g. `mistralai/Mistral-7B-Instruct-v0.1`.
    pub model_id: String,
    pub revision: String,
    /// Download cache; `None` uses the hub client's default location.
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    /// Bearer credential for the model registry and the hosted inference API.
    pub token: Secret<String>,
    pub hub_endpoint: String,
    pub inference_api_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub max_new_tokens: usize,
    pub temperature: f64,
    pub do_sample: bool,
    /// Fixed sampling seed; `None` draws a fresh one per request.
    pub seed: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            do_sample: true,
            seed: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentConfig {
    /// Characters of an uploaded document passed to the model.
    pub max_chars: usize,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_DOCUMENT_CHARS,
        }
    }
}

/// Which backend hosts the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Weights downloaded from the hub and run in-process.
    Local,
    /// Hosted Hugging Face Inference API.
    InferenceApi,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "inference-api" | "inference_api" => Ok(ProviderKind::InferenceApi),
            other => Err(format!(
                "unknown provider '{}', expected 'local' or 'inference-api'",
                other
            )),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Local => f.write_str("local"),
            ProviderKind::InferenceApi => f.write_str("inference-api"),
        }
    }
}

/// How much of the quiz shape is enforced after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Field types are enforced; counts and index range only produce warnings.
    #[default]
    Lenient,
    /// Five questions, four options each and an in-range answer index are required.
    Strict,
}

impl FromStr for ValidationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(ValidationMode::Lenient),
            "strict" => Ok(ValidationMode::Strict),
            other => Err(format!(
                "unknown validation mode '{}', expected 'lenient' or 'strict'",
                other
            )),
        }
    }
}

impl QuizConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        Self::from_lookup(common_config, |key| env::var(key).ok())
    }

    /// Build the service configuration from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_prod = lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()) == "prod";
        let vars = Vars { lookup, is_prod };

        Ok(QuizConfig {
            common,
            provider: vars.parsed("QUIZ_PROVIDER", ProviderKind::Local)?,
            model: ModelConfig {
                // Production deployments must pin the exact weights they serve.
                model_id: vars.pinned("QUIZ_MODEL_ID", DEFAULT_MODEL_ID)?,
                revision: vars.pinned("QUIZ_MODEL_REVISION", DEFAULT_MODEL_REVISION)?,
                cache_dir: vars.optional("QUIZ_MODEL_CACHE_DIR").map(PathBuf::from),
            },
            huggingface: HuggingFaceConfig {
                token: Secret::new(vars.required("HF_TOKEN")?),
                hub_endpoint: vars.or_default("QUIZ_HUB_ENDPOINT", DEFAULT_HUB_ENDPOINT),
                inference_api_url: vars
                    .or_default("QUIZ_INFERENCE_API_URL", DEFAULT_INFERENCE_API_URL),
            },
            generation: GenerationConfig {
                max_new_tokens: vars.parsed("QUIZ_MAX_NEW_TOKENS", DEFAULT_MAX_NEW_TOKENS)?,
                temperature: vars.parsed("QUIZ_TEMPERATURE", DEFAULT_TEMPERATURE)?,
                do_sample: vars.parsed("QUIZ_DO_SAMPLE", true)?,
                seed: vars.parsed_optional("QUIZ_SEED")?,
            },
            validation: vars.parsed("QUIZ_VALIDATION", ValidationMode::Lenient)?,
            http: HttpConfig {
                max_body_bytes: vars.parsed("QUIZ_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
            },
            documents: DocumentConfig {
                max_chars: vars.parsed("QUIZ_MAX_DOCUMENT_CHARS", DEFAULT_MAX_DOCUMENT_CHARS)?,
            },
            otlp_endpoint: vars.optional("OTLP_ENDPOINT"),
        })
    }
}

struct Vars<F> {
    lookup: F,
    is_prod: bool,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, AppError> {
        self.optional(key).ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!("{} is required but not set", key))
        })
    }

    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn pinned(&self, key: &str, default: &str) -> Result<String, AppError> {
        match self.optional(key) {
            Some(val) => Ok(val),
            None if self.is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required in production but not set",
                key
            ))),
            None => Ok(default.to_string()),
        }
    }

    fn parsed_optional<T>(&self, key: &str) -> Result<Option<T>, AppError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!("invalid value for {}: {}", key, e))
                })
            })
            .transpose()
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        Ok(self.parsed_optional(key)?.unwrap_or(default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<QuizConfig, AppError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        QuizConfig::from_lookup(core_config::Config::default(), move |key| {
            map.get(key).cloned()
        })
    }

    #[test]
    fn defaults_match_the_reference_deployment() {
        let config = load(&[("HF_TOKEN", "hf_test")]).unwrap();

        assert_eq!(config.provider, ProviderKind::Local);
        assert_eq!(config.model.model_id, "mistralai/Mistral-7B-Instruct-v0.1");
        assert_eq!(config.model.revision, "main");
        assert_eq!(config.generation, GenerationConfig::default());
        assert_eq!(config.generation.max_new_tokens, 1000);
        assert!((config.generation.temperature - 0.7).abs() < f64::EPSILON);
        assert!(config.generation.do_sample);
        assert_eq!(config.validation, ValidationMode::Lenient);
        assert_eq!(config.http.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.documents.max_chars, 6000);
        assert_eq!(config.huggingface.token.expose_secret(), "hf_test");
    }

    #[test]
    fn token_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("HF_TOKEN"));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        assert!(load(&[("HF_TOKEN", "  ")]).is_err());
    }

    #[test]
    fn token_is_redacted_from_debug_output() {
        let config = load(&[("HF_TOKEN", "hf_very_secret")]).unwrap();
        assert!(!format!("{:?}", config).contains("hf_very_secret"));
    }

    #[test]
    fn production_requires_a_pinned_model() {
        let err = load(&[("HF_TOKEN", "t"), ("ENVIRONMENT", "prod")]).unwrap_err();
        assert!(err.to_string().contains("QUIZ_MODEL_ID"));

        let config = load(&[
            ("HF_TOKEN", "t"),
            ("ENVIRONMENT", "prod"),
            ("QUIZ_MODEL_ID", "org/model"),
            ("QUIZ_MODEL_REVISION", "abc123"),
        ])
        .unwrap();
        assert_eq!(config.model.model_id, "org/model");
        assert_eq!(config.model.revision, "abc123");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("HF_TOKEN", "t"),
            ("QUIZ_PROVIDER", "inference-api"),
            ("QUIZ_MAX_NEW_TOKENS", "256"),
            ("QUIZ_TEMPERATURE", "0.2"),
            ("QUIZ_DO_SAMPLE", "false"),
            ("QUIZ_SEED", "42"),
            ("QUIZ_VALIDATION", "STRICT"),
            ("QUIZ_MODEL_CACHE_DIR", "/tmp/models"),
            ("QUIZ_MAX_DOCUMENT_CHARS", "1500"),
        ])
        .unwrap();

        assert_eq!(config.provider, ProviderKind::InferenceApi);
        assert_eq!(config.generation.max_new_tokens, 256);
        assert!(!config.generation.do_sample);
        assert_eq!(config.generation.seed, Some(42));
        assert_eq!(config.validation, ValidationMode::Strict);
        assert_eq!(config.model.cache_dir, Some(PathBuf::from("/tmp/models")));
        assert_eq!(config.documents.max_chars, 1500);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = load(&[("HF_TOKEN", "t"), ("QUIZ_TEMPERATURE", "warm")]).unwrap_err();
        assert!(err.to_string().contains("QUIZ_TEMPERATURE"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = load(&[("HF_TOKEN", "t"), ("QUIZ_PROVIDER", "openai")]).unwrap_err();
        assert!(err.to_string().contains("openai"));
    }
}
