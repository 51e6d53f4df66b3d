//! Prompt template loading and placeholder substitution.
//!
//! Templates are YAML mappings with two required string fields, `system` and
//! `prompt`. Substitution is literal, single-pass replacement of the
//! `$repo_context` and `$diff` tokens; there is no other interpolation
//! syntax. Tokens left unresolved after substitution are collected as
//! warnings, never errors, since custom templates may intentionally
//! reference variables this engine does not supply.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_yaml::Value;

use crate::config::DEFAULT_TEMPLATE_FILE;
use crate::error::{ReviewerError, Result};

/// The built-in review template shipped with the binary.
const DEFAULT_TEMPLATE_YAML: &str = include_str!("templates/review.yaml");

/// Placeholder replaced with the aggregated context blob.
pub const REPO_CONTEXT_PLACEHOLDER: &str = "repo_context";

/// Placeholder replaced with the generated diff.
pub const DIFF_PLACEHOLDER: &str = "diff";

/// A loaded, not-yet-populated prompt template.
#[derive(Debug, Clone)]
pub struct Template {
    /// System prompt section.
    pub system: String,
    /// User prompt section carrying the placeholders.
    pub prompt: String,
}

/// A template after placeholder substitution.
#[derive(Debug, Clone)]
pub struct PopulatedTemplate {
    /// Populated system section.
    pub system: String,
    /// Populated prompt section.
    pub prompt: String,
    /// Placeholder tokens still present after substitution.
    pub warnings: Vec<String>,
}

impl Template {
    /// Parses a template from YAML text.
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(content)
            .map_err(|e| ReviewerError::Template(format!("invalid YAML in template: {e}")))?;

        let map = match value {
            Value::Mapping(map) => map,
            _ => {
                return Err(ReviewerError::Template(
                    "template must contain a mapping at top level".to_string(),
                ))
            }
        };

        let mut fields = Vec::with_capacity(2);
        for key in ["system", "prompt"] {
            match map.get(key) {
                Some(Value::String(s)) => fields.push(s.clone()),
                Some(_) => {
                    return Err(ReviewerError::Template(format!(
                        "template field '{key}' must be a string"
                    )))
                }
                None => {
                    return Err(ReviewerError::Template(format!(
                        "template missing required field '{key}'"
                    )))
                }
            }
        }

        let prompt = fields.pop().unwrap_or_default();
        let system = fields.pop().unwrap_or_default();
        Ok(Self { system, prompt })
    }

    /// Loads a template from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReviewerError::Template(format!(
                "template file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReviewerError::Template(format!(
                "failed to read template {}: {e}",
                path.display()
            ))
        })?;
        Self::parse(&content)
    }

    /// Resolves the configured template path and loads it.
    ///
    /// Relative paths resolve against the repository directory. When the
    /// configured value is the default file name and no such file exists on
    /// disk, the embedded template is used.
    pub fn resolve(repo_dir: &Path, configured: &Path) -> Result<Self> {
        if configured.is_absolute() {
            return Self::load(configured);
        }
        let local = repo_dir.join(configured);
        if local.exists() {
            return Self::load(&local);
        }
        if configured == Path::new(DEFAULT_TEMPLATE_FILE) {
            return Self::parse(DEFAULT_TEMPLATE_YAML);
        }
        Err(ReviewerError::Template(format!(
            "template file not found: {}",
            local.display()
        )))
    }

    /// Substitutes the context and diff placeholders into both sections.
    ///
    /// One literal pass, non-recursive: tokens introduced by the replacement
    /// text are not themselves substituted.
    pub fn populate(&self, repo_context: &str, diff: &str) -> PopulatedTemplate {
        let variables = [
            (REPO_CONTEXT_PLACEHOLDER, repo_context),
            (DIFF_PLACEHOLDER, diff),
        ];
        let system = substitute(&self.system, &variables);
        let prompt = substitute(&self.prompt, &variables);

        let mut warnings = unresolved_placeholders(&system);
        for token in unresolved_placeholders(&prompt) {
            if !warnings.contains(&token) {
                warnings.push(token);
            }
        }

        PopulatedTemplate {
            system,
            prompt,
            warnings,
        }
    }
}

impl PopulatedTemplate {
    /// Renders the final prompt handed to the dispatcher.
    ///
    /// The system and prompt sections are joined with a blank line; an empty
    /// prompt section is an error.
    pub fn render_prompt(&self) -> Result<String> {
        let system = self.system.trim();
        let prompt = self.prompt.trim();

        if prompt.is_empty() {
            return Err(ReviewerError::Template(
                "template must have a non-empty 'prompt' section".to_string(),
            ));
        }

        if system.is_empty() {
            Ok(prompt.to_string())
        } else {
            Ok(format!("{system}\n\n{prompt}"))
        }
    }
}

/// Matches `$name` and `${name}` placeholder tokens.
fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$(?:\{(\w+)\}|(\w+))").expect("placeholder pattern is valid")
    })
}

/// Replaces known placeholder tokens, leaving unknown ones untouched.
fn substitute(content: &str, variables: &[(&str, &str)]) -> String {
    placeholder_regex()
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match variables.iter().find(|(key, _)| *key == name) {
                Some((_, value)) => (*value).to_string(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Collects placeholder tokens remaining in `content`, first occurrence
/// order, deduplicated.
fn unresolved_placeholders(content: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for caps in placeholder_regex().captures_iter(content) {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        let token = format!("${name}");
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}
