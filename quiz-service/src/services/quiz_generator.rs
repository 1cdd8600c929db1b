//! Turns caller text into a validated quiz: prompt, generate, extract, check.

use crate::config::ValidationMode;
use crate::error::QuizError;
use crate::models::Quiz;
use crate::services::extract::extract_questions;
use crate::services::metrics;
use crate::services::prompt::build_quiz_prompt;
use crate::services::providers::{GenerationParams, TextProvider};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use validator::Validate;

/// Request-path service shared by every handler invocation.
pub struct QuizGenerator {
    provider: Arc<dyn TextProvider>,
    params: GenerationParams,
    validation: ValidationMode,
}

impl QuizGenerator {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        params: GenerationParams,
        validation: ValidationMode,
    ) -> Self {
        Self {
            provider,
            params,
            validation,
        }
    }

    pub fn provider(&self) -> &Arc<dyn TextProvider> {
        &self.provider
    }

    /// Generate a quiz about `text` and return the model's `questions` value
    /// as generated. No retries: a bad model answer fails the call.
    pub async fn generate(&self, text: &str) -> Result<Value, QuizError> {
        let started = Instant::now();
        let result = self.run(text).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.stage(),
        };
        metrics::record_generation(self.provider.name(), outcome, started.elapsed());

        result
    }

    async fn run(&self, text: &str) -> Result<Value, QuizError> {
        let prompt = build_quiz_prompt(text);
        let response = self.provider.generate(&prompt, &self.params).await?;

        metrics::record_tokens(
            self.provider.name(),
            response.prompt_tokens,
            response.generated_tokens,
        );
        tracing::debug!(
            provider = self.provider.name(),
            generated_tokens = response.generated_tokens,
            finish_reason = response.finish_reason.as_str(),
            "Model returned output"
        );

        let questions = extract_questions(&response.text)?;

        if let Err(problem) = check_quiz(&questions) {
            match self.validation {
                ValidationMode::Strict => return Err(problem),
                ValidationMode::Lenient => tracing::warn!(
                    stage = problem.stage(),
                    problem = %problem,
                    "Quiz does not match the requested shape; returning it as generated"
                ),
            }
        }

        Ok(questions)
    }
}

/// Typed shape first, then counts and answer range.
fn check_quiz(questions: &Value) -> Result<(), QuizError> {
    let quiz = Quiz::from_questions(questions).map_err(QuizError::Shape)?;
    quiz.validate()?;
    Ok(())
}
