//! Boundary to the external multi-model execution tool.
//!
//! Model execution (parallelism, per-model retries, timeouts) is owned
//! entirely by the external `nllm` tool. The pipeline builds one request,
//! submits it, and blocks for the aggregate result; per-model failures come
//! back as data, not errors.

pub mod nllm;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::Deserialize;

use crate::config::ModelEntry;
use crate::error::Result;

pub use nllm::NllmDispatcher;

/// Outcome of one model execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// The model produced output within its limits.
    Ok,
    /// The model failed (non-zero exit, API error, ...).
    Error,
    /// The model exceeded its timeout.
    Timeout,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Ok => write!(f, "ok"),
            ModelStatus::Error => write!(f, "error"),
            ModelStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// Result of one model's execution, as reported by the dispatcher.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelResult {
    /// Model identifier.
    pub model: String,
    /// Tri-state outcome.
    pub status: ModelStatus,
    /// Elapsed wall-clock time in seconds.
    #[serde(default)]
    pub duration_secs: f64,
    /// Raw text output.
    #[serde(default)]
    pub text: String,
    /// Parsed structured payload, when the output conformed to the
    /// requested schema.
    #[serde(default)]
    pub json: Option<serde_json::Value>,
    /// Exit code of the underlying model command, when applicable.
    #[serde(default)]
    pub exit_code: Option<i32>,
    /// Tail of the command's stderr, for failure reporting.
    #[serde(default)]
    pub stderr_tail: Option<String>,
}

/// Aggregate result of one dispatcher run.
///
/// Returned to programmatic callers unmodified, so dispatcher-level fields
/// added later pass through untouched.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunResults {
    /// Directory where the dispatcher wrote its artifacts, if any.
    #[serde(default)]
    pub outdir: Option<PathBuf>,
    /// Per-model results, one entry per requested model.
    pub results: Vec<ModelResult>,
}

impl RunResults {
    /// Number of models that completed successfully.
    pub fn ok_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ModelStatus::Ok)
            .count()
    }

    /// Number of models that failed or timed out.
    pub fn failure_count(&self) -> usize {
        self.results.len() - self.ok_count()
    }

    /// Whether at least one model completed successfully.
    pub fn any_ok(&self) -> bool {
        self.ok_count() > 0
    }
}

/// One prepared dispatcher invocation.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Models to execute, in configured order.
    pub models: Vec<ModelEntry>,
    /// Final rendered prompt.
    pub prompt: String,
    /// Per-model timeout in seconds.
    pub timeout: Option<u64>,
    /// Retries per model.
    pub retries: u32,
    /// Directory for dispatcher artifacts.
    pub output_dir: Option<PathBuf>,
}

/// External model execution boundary.
///
/// One production implementation exists ([`NllmDispatcher`]); tests supply
/// their own.
pub trait Dispatcher: Send + Sync {
    /// Submits the request and blocks until the aggregate result is ready.
    fn run<'a>(
        &'a self,
        request: &'a DispatchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RunResults>> + Send + 'a>>;

    /// Probes the external tool, returning its version description.
    fn check_available<'a>(&'a self)
        -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_json_parses_all_statuses() {
        let raw = r#"{
            "outdir": "/tmp/run-1",
            "results": [
                {"model": "alpha", "status": "ok", "duration_secs": 2.5,
                 "text": "{\"verdict\": \"approve\"}",
                 "json": {"verdict": "approve"}},
                {"model": "beta", "status": "error", "exit_code": 1,
                 "stderr_tail": "boom"},
                {"model": "gamma", "status": "timeout", "duration_secs": 120.0}
            ]
        }"#;

        let results: RunResults = serde_json::from_str(raw).unwrap();
        assert_eq!(results.results.len(), 3);
        assert_eq!(results.results[0].status, ModelStatus::Ok);
        assert_eq!(results.results[1].status, ModelStatus::Error);
        assert_eq!(results.results[2].status, ModelStatus::Timeout);
        assert_eq!(results.ok_count(), 1);
        assert_eq!(results.failure_count(), 2);
        assert!(results.any_ok());
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = r#"{"results": [{"model": "m", "status": "ok"}]}"#;
        let results: RunResults = serde_json::from_str(raw).unwrap();
        assert!(results.outdir.is_none());
        assert_eq!(results.results[0].text, "");
        assert!(results.results[0].json.is_none());
    }

    #[test]
    fn unknown_status_is_rejected() {
        let raw = r#"{"results": [{"model": "m", "status": "maybe"}]}"#;
        assert!(serde_json::from_str::<RunResults>(raw).is_err());
    }
}
