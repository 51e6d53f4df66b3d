//! Rendering of per-model dispatcher results.

use crate::dispatch::{ModelResult, ModelStatus, RunResults};

/// Character budget for non-verbose raw output.
const TRUNCATE_LIMIT: usize = 1000;

/// Display form of one model's output, resolved once per result.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// Structured payload conforming to the requested schema.
    Structured(serde_json::Value),
    /// Plain text that did not parse as JSON.
    RawText(String),
}

impl ModelOutput {
    /// Resolves the display form for a result.
    ///
    /// A structured payload wins; raw text that parses as JSON is promoted
    /// so it pretty-prints the same way.
    pub fn from_result(result: &ModelResult) -> Self {
        if let Some(payload) = &result.json {
            return ModelOutput::Structured(payload.clone());
        }
        let trimmed = result.text.trim();
        if !trimmed.is_empty() {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
                return ModelOutput::Structured(value);
            }
        }
        ModelOutput::RawText(result.text.clone())
    }

    /// Renders the output, truncating raw text to `limit` characters.
    pub fn render(&self, limit: Option<usize>) -> String {
        let text = match self {
            ModelOutput::Structured(value) => format!("{value:#}"),
            ModelOutput::RawText(text) => text.clone(),
        };
        match limit {
            Some(limit) if text.chars().count() > limit => {
                let prefix: String = text.chars().take(limit).collect();
                format!("{prefix}\n... (truncated, use --verbose for full output)")
            }
            _ => text,
        }
    }
}

/// Prints dispatcher results to stdout.
pub struct Presenter {
    verbose: bool,
}

impl Presenter {
    /// Creates a presenter; verbose mode disables truncation and shows raw
    /// output for failed models.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Renders the full result set.
    ///
    /// Failed models are reported individually and never suppress the
    /// successful ones.
    pub fn present(&self, results: &RunResults) {
        let successes: Vec<&ModelResult> = results
            .results
            .iter()
            .filter(|r| r.status == ModelStatus::Ok)
            .collect();
        let failures: Vec<&ModelResult> = results
            .results
            .iter()
            .filter(|r| r.status != ModelStatus::Ok)
            .collect();

        if !successes.is_empty() {
            println!(
                "\n\x1b[32m✓ {} model(s) completed successfully:\x1b[0m",
                successes.len()
            );
            for result in successes {
                println!(
                    "\n\x1b[1;36m{}\x1b[0m \x1b[2m({:.1}s)\x1b[0m",
                    result.model, result.duration_secs
                );
                let output = ModelOutput::from_result(result);
                let limit = if self.verbose {
                    None
                } else {
                    Some(TRUNCATE_LIMIT)
                };
                let rendered = output.render(limit);
                if rendered.trim().is_empty() {
                    println!("\x1b[2m(no output)\x1b[0m");
                } else {
                    println!("{rendered}");
                }
            }
        }

        if !failures.is_empty() {
            println!("\n\x1b[31m✗ {} model(s) failed:\x1b[0m", failures.len());
            for result in failures {
                println!(
                    "\n\x1b[1;31m{}\x1b[0m: {}",
                    result.model,
                    failure_line(result)
                );
                if self.verbose && !result.text.trim().is_empty() {
                    println!("\x1b[2moutput: {}\x1b[0m", result.text.trim());
                }
            }
        }
    }
}

/// One-line failure description for a non-`ok` result.
fn failure_line(result: &ModelResult) -> String {
    match &result.stderr_tail {
        Some(tail) if !tail.trim().is_empty() => tail.trim().to_string(),
        _ => match result.exit_code {
            Some(code) => format!("model {}: exit code {code}", result.status),
            None => format!("model {}", result.status),
        },
    }
}
