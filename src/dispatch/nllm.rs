//! `nllm` subprocess integration.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::process::Command;

use crate::dispatch::{DispatchRequest, Dispatcher, RunResults};
use crate::error::{ReviewerError, Result};

/// Dispatcher backed by the `nllm` command-line tool.
pub struct NllmDispatcher {
    binary: PathBuf,
}

impl Default for NllmDispatcher {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("nllm"),
        }
    }
}

impl NllmDispatcher {
    /// Creates a dispatcher invoking the `nllm` binary found on `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher invoking an explicit binary path.
    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    async fn run_inner(&self, request: &DispatchRequest) -> Result<RunResults> {
        if request.models.is_empty() {
            return Err(ReviewerError::Dispatcher(
                "no models to dispatch".to_string(),
            ));
        }
        if request.prompt.trim().is_empty() {
            return Err(ReviewerError::Dispatcher("empty prompt".to_string()));
        }

        let args = build_args(request);
        tracing::debug!(binary = %self.binary.display(), models = request.models.len(), "invoking nllm");

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| spawn_error(&self.binary, &e))?;

        // nllm exits non-zero when models fail, but its aggregate JSON is
        // still the authoritative result; parse first, fall back to the
        // process error only when stdout is unusable.
        match serde_json::from_slice::<RunResults>(&output.stdout) {
            Ok(results) => Ok(results),
            Err(parse_err) => {
                if output.status.success() {
                    Err(ReviewerError::Dispatcher(format!(
                        "failed to parse nllm output: {parse_err}"
                    )))
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(ReviewerError::Dispatcher(format!(
                        "nllm exited with {}: {}",
                        output.status,
                        stderr.trim()
                    )))
                }
            }
        }
    }

    async fn check_available_inner(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| spawn_error(&self.binary, &e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReviewerError::Dispatcher(format!(
                "nllm --version exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Dispatcher for NllmDispatcher {
    fn run<'a>(
        &'a self,
        request: &'a DispatchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RunResults>> + Send + 'a>> {
        Box::pin(self.run_inner(request))
    }

    fn check_available<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(self.check_available_inner())
    }
}

fn spawn_error(binary: &std::path::Path, e: &std::io::Error) -> ReviewerError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ReviewerError::Dispatcher(format!(
            "nllm executable not found ({}). Install nllm and make sure it is on PATH",
            binary.display()
        ))
    } else {
        ReviewerError::Dispatcher(format!("failed to invoke nllm: {e}"))
    }
}

/// Builds the `nllm` argument list for one request.
///
/// Model options are encoded `name:opt1:opt2` and omitted for models
/// without options.
fn build_args(request: &DispatchRequest) -> Vec<String> {
    let mut args = vec!["--json".to_string()];

    if let Some(timeout) = request.timeout {
        args.push("-t".to_string());
        args.push(timeout.to_string());
    }
    args.push("-r".to_string());
    args.push(request.retries.to_string());

    if let Some(dir) = &request.output_dir {
        args.push("-o".to_string());
        args.push(dir.display().to_string());
    }

    for model in &request.models {
        args.push("-m".to_string());
        args.push(model.name.clone());
    }
    for model in &request.models {
        if !model.options.is_empty() {
            args.push("--model-options".to_string());
            args.push(format!("{}:{}", model.name, model.options.join(":")));
        }
    }

    args.push("--".to_string());
    args.push(request.prompt.clone());
    args
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ModelEntry;

    fn request() -> DispatchRequest {
        DispatchRequest {
            models: vec![
                ModelEntry {
                    name: "alpha".to_string(),
                    options: vec!["-o".to_string(), "temperature".to_string(), "0.2".to_string()],
                },
                ModelEntry {
                    name: "beta".to_string(),
                    options: Vec::new(),
                },
            ],
            prompt: "review this".to_string(),
            timeout: Some(90),
            retries: 2,
            output_dir: Some(PathBuf::from("/tmp/out")),
        }
    }

    #[test]
    fn args_carry_every_request_field() {
        let args = build_args(&request());
        let joined = args.join(" ");
        assert!(joined.starts_with("--json"));
        assert!(joined.contains("-t 90"));
        assert!(joined.contains("-r 2"));
        assert!(joined.contains("-o /tmp/out"));
        assert!(joined.contains("-m alpha"));
        assert!(joined.contains("-m beta"));
        assert!(joined.contains("--model-options alpha:-o:temperature:0.2"));
        assert!(!joined.contains("--model-options beta"));
        assert_eq!(args.last().unwrap(), "review this");
    }

    #[test]
    fn prompt_follows_argument_terminator() {
        let args = build_args(&request());
        let sep = args.iter().position(|a| a == "--").unwrap();
        assert_eq!(args[sep + 1], "review this");
        assert_eq!(args.len(), sep + 2);
    }

    #[test]
    fn timeout_and_outdir_are_optional() {
        let mut req = request();
        req.timeout = None;
        req.output_dir = None;
        let joined = build_args(&req).join(" ");
        assert!(!joined.contains("-t "));
        assert!(!joined.contains("-o "));
    }

    #[tokio::test]
    async fn missing_binary_is_a_dispatcher_error() {
        let dispatcher =
            NllmDispatcher::with_binary(PathBuf::from("/nonexistent/definitely-not-nllm"));
        let err = dispatcher.check_available().await.unwrap_err();
        assert!(matches!(err, ReviewerError::Dispatcher(_)));
        assert!(err.to_string().contains("not found"));
    }
}
