//! Metrics collection and Prometheus export.
//!
//! Installs the global recorder and renders it for the /metrics endpoint.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Must run before any metric is recorded;
/// a second call fails with `BuildError::FailedToSetGlobalRecorder`.
pub fn init_metrics() -> Result<(), BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Record one finished quiz generation.
pub fn record_generation(provider: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("quiz_generations_total", "provider" => provider, "outcome" => outcome).increment(1);
    histogram!("quiz_generation_duration_seconds", "provider" => provider)
        .record(elapsed.as_secs_f64());
}

/// Record token usage reported by the provider.
pub fn record_tokens(provider: &'static str, prompt_tokens: usize, generated_tokens: usize) {
    counter!("quiz_generated_tokens_total", "provider" => provider, "type" => "prompt")
        .increment(prompt_tokens as u64);
    counter!("quiz_generated_tokens_total", "provider" => provider, "type" => "generated")
        .increment(generated_tokens as u64);
}
