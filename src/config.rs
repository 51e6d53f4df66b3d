//! Layered configuration loading, merging, and validation.
//!
//! Configuration is assembled from four layers with fixed precedence:
//! built-in defaults, the global file (`~/.git-reviewer/config.yaml`), the
//! local file (`.git-reviewer-config.yaml` next to the repository), and
//! finally explicit runtime overrides. Layers are deep-merged as YAML
//! mappings before the result is validated and deserialized.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{ReviewerError, Result};

/// File name of the local (per-repository) configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".git-reviewer-config.yaml";

/// Default template file name looked up when no explicit path is configured.
pub const DEFAULT_TEMPLATE_FILE: &str = "review.template.yml";

/// A single model to run, with its dispatcher-level options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Model identifier as understood by the dispatcher.
    pub name: String,
    /// Extra command-line options forwarded to the dispatcher for this model.
    #[serde(default)]
    pub options: Vec<String>,
}

/// Execution defaults applied to every dispatcher run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDefaults {
    /// Per-model timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: Option<u64>,
    /// Number of retries per model.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Output directory for dispatcher artifacts.
    #[serde(default)]
    pub outdir: Option<PathBuf>,
}

/// Git-related settings controlling diff generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSettings {
    /// Number of context lines in generated diffs.
    #[serde(default = "default_context_lines")]
    pub context_lines: u32,
    /// Branch the review diff is computed against.
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    /// Which change categories are included in the diff.
    #[serde(default)]
    pub diff_scope: DiffScope,
}

/// Which categories of changes the generated diff covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffScope {
    /// Committed, staged, and unstaged changes.
    #[default]
    All,
    /// Only changes committed since the merge base.
    Committed,
}

/// File-system paths used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Prompt template location; relative paths resolve against the
    /// repository directory, with a built-in fallback for the default name.
    #[serde(default = "default_template_path")]
    pub template: PathBuf,
}

/// Fully merged and validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Models to execute, in order.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
    /// Execution defaults.
    #[serde(default)]
    pub defaults: RunDefaults,
    /// Git diff settings.
    #[serde(default)]
    pub git: GitSettings,
    /// Path settings.
    #[serde(default)]
    pub paths: PathSettings,
}

fn default_timeout() -> Option<u64> {
    Some(120)
}

fn default_retries() -> u32 {
    1
}

fn default_context_lines() -> u32 {
    3
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_template_path() -> PathBuf {
    PathBuf::from(DEFAULT_TEMPLATE_FILE)
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
            outdir: None,
        }
    }
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            base_branch: default_base_branch(),
            diff_scope: DiffScope::default(),
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            template: default_template_path(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            defaults: RunDefaults::default(),
            git: GitSettings::default(),
            paths: PathSettings::default(),
        }
    }
}

/// Returns the global configuration file path (`~/.git-reviewer/config.yaml`).
pub fn global_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".git-reviewer")
        .join("config.yaml")
}

/// Returns the local configuration file path for a working directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE)
}

/// Recursively merges `overlay` onto `base`.
///
/// Mapping values merge key-by-key; every other value type (sequences
/// included) is replaced wholesale by the overlay, never concatenated.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, value) in overlay_map {
                let replacement = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), replacement);
            }
            Value::Mapping(merged)
        }
        (_, replacement) => replacement.clone(),
    }
}

/// Loads and merges layered configuration.
///
/// The built-in defaults are an explicit value owned by the loader, so
/// callers (and tests) can supply distinct defaults per instance instead of
/// relying on ambient state.
pub struct ConfigLoader {
    global_path: PathBuf,
    local_path: PathBuf,
    defaults: Config,
}

impl ConfigLoader {
    /// Creates a loader for the standard file locations relative to
    /// `start_dir`, using the built-in defaults.
    pub fn new(start_dir: &Path) -> Self {
        Self {
            global_path: global_config_path(),
            local_path: local_config_path(start_dir),
            defaults: Config::default(),
        }
    }

    /// Creates a loader with explicit file locations and defaults.
    pub fn with_paths(global_path: PathBuf, local_path: PathBuf, defaults: Config) -> Self {
        Self {
            global_path,
            local_path,
            defaults,
        }
    }

    /// Loads configuration: defaults, then global file, then local file,
    /// then runtime overrides, each deep-merged over the previous layer.
    ///
    /// Missing files are skipped silently; a present file that is not valid
    /// YAML or not a mapping at top level fails with
    /// [`ReviewerError::Configuration`].
    pub fn load(&self, overrides: Option<&Mapping>) -> Result<Config> {
        let mut merged = serde_yaml::to_value(&self.defaults)
            .map_err(|e| ReviewerError::Configuration(format!("internal defaults: {e}")))?;

        for path in [&self.global_path, &self.local_path] {
            if let Some(layer) = load_config_file(path)? {
                merged = deep_merge(&merged, &layer);
            }
        }

        if let Some(map) = overrides {
            merged = deep_merge(&merged, &Value::Mapping(map.clone()));
        }

        validate(&merged)?;

        serde_yaml::from_value(merged)
            .map_err(|e| ReviewerError::Configuration(format!("invalid configuration: {e}")))
    }
}

/// Reads one configuration file as a YAML mapping.
///
/// Returns `Ok(None)` when the file does not exist or is empty.
fn load_config_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        ReviewerError::Configuration(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;

    let value: Value = serde_yaml::from_str(&content).map_err(|e| {
        ReviewerError::Configuration(format!(
            "invalid YAML in config file {}: {e}",
            path.display()
        ))
    })?;

    match value {
        Value::Null => Ok(None),
        Value::Mapping(_) => Ok(Some(value)),
        _ => Err(ReviewerError::Configuration(format!(
            "config file {} must contain a mapping at top level",
            path.display()
        ))),
    }
}

/// Validates the merged configuration, reporting the offending field path.
fn validate(config: &Value) -> Result<()> {
    let top = match config {
        Value::Mapping(map) => map,
        _ => {
            return Err(ReviewerError::Configuration(
                "merged configuration is not a mapping".to_string(),
            ))
        }
    };

    for section in ["models", "defaults", "git", "paths"] {
        if top.get(section).is_none() {
            return Err(ReviewerError::Configuration(format!(
                "missing required configuration key: {section}"
            )));
        }
    }

    validate_models(top.get("models").unwrap_or(&Value::Null))?;
    validate_defaults(top.get("defaults").unwrap_or(&Value::Null))?;
    validate_git(top.get("git").unwrap_or(&Value::Null))?;

    Ok(())
}

fn validate_models(models: &Value) -> Result<()> {
    let entries = match models {
        Value::Sequence(seq) => seq,
        _ => {
            return Err(ReviewerError::Configuration(
                "models: must be a sequence".to_string(),
            ))
        }
    };

    if entries.is_empty() {
        return Err(ReviewerError::Configuration(
            "models: at least one model must be configured".to_string(),
        ));
    }

    let mut seen = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let map = match entry {
            Value::Mapping(map) => map,
            _ => {
                return Err(ReviewerError::Configuration(format!(
                    "models[{i}]: must be a mapping"
                )))
            }
        };

        let name = match map.get("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name,
            Some(Value::String(_)) => {
                return Err(ReviewerError::Configuration(format!(
                    "models[{i}].name: must be a non-empty string"
                )))
            }
            Some(_) => {
                return Err(ReviewerError::Configuration(format!(
                    "models[{i}].name: must be a string"
                )))
            }
            None => {
                return Err(ReviewerError::Configuration(format!(
                    "models[{i}]: missing required 'name' field"
                )))
            }
        };

        if seen.contains(name) {
            return Err(ReviewerError::Configuration(format!(
                "models[{i}].name: duplicate model name '{name}'"
            )));
        }
        seen.push(name.clone());

        match map.get("options") {
            None | Some(Value::Null) => {}
            Some(Value::Sequence(options)) => {
                for (j, option) in options.iter().enumerate() {
                    if !matches!(option, Value::String(_)) {
                        return Err(ReviewerError::Configuration(format!(
                            "models[{i}].options[{j}]: must be a string"
                        )));
                    }
                }
            }
            Some(_) => {
                return Err(ReviewerError::Configuration(format!(
                    "models[{i}].options: must be a sequence of strings"
                )))
            }
        }
    }

    Ok(())
}

fn validate_defaults(defaults: &Value) -> Result<()> {
    let map = match defaults {
        Value::Mapping(map) => map,
        _ => {
            return Err(ReviewerError::Configuration(
                "defaults: must be a mapping".to_string(),
            ))
        }
    };

    match map.get("timeout") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) if n.as_u64().is_some_and(|v| v >= 1) => {}
        Some(_) => {
            return Err(ReviewerError::Configuration(
                "defaults.timeout: must be a positive integer".to_string(),
            ))
        }
    }

    match map.get("retries") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) if n.as_u64().is_some() => {}
        Some(_) => {
            return Err(ReviewerError::Configuration(
                "defaults.retries: must be a non-negative integer".to_string(),
            ))
        }
    }

    Ok(())
}

fn validate_git(git: &Value) -> Result<()> {
    let map = match git {
        Value::Mapping(map) => map,
        _ => {
            return Err(ReviewerError::Configuration(
                "git: must be a mapping".to_string(),
            ))
        }
    };

    match map.get("context_lines") {
        None | Some(Value::Null) => {}
        Some(Value::Number(n)) if n.as_u64().is_some() => {}
        Some(_) => {
            return Err(ReviewerError::Configuration(
                "git.context_lines: must be a non-negative integer".to_string(),
            ))
        }
    }

    match map.get("base_branch") {
        None | Some(Value::Null) => {}
        Some(Value::String(branch)) if !branch.trim().is_empty() => {}
        Some(_) => {
            return Err(ReviewerError::Configuration(
                "git.base_branch: must be a non-empty string".to_string(),
            ))
        }
    }

    match map.get("diff_scope") {
        None | Some(Value::Null) => {}
        Some(Value::String(scope)) if scope == "all" || scope == "committed" => {}
        Some(other) => {
            return Err(ReviewerError::Configuration(format!(
                "git.diff_scope: must be 'all' or 'committed', got {other:?}"
            )))
        }
    }

    Ok(())
}

/// Renders the starter configuration written by `init-config`.
pub fn default_config_yaml() -> String {
    r#"# git-reviewer configuration.
#
# Models are executed in parallel by the dispatcher; options after the model
# name are forwarded to it verbatim.
models:
  - name: gpt-4.1
    options: ["-o", "temperature", "0.7"]
  - name: claude-opus-4.1
    options: ["-o", "temperature", "0.2"]

defaults:
  # Per-model timeout in seconds.
  timeout: 120
  # Retries per model on failure.
  retries: 1
  # Where dispatcher artifacts land; defaults to <repo>/git-reviewer-results.
  # outdir: ~/reviews

git:
  # Context lines in generated diffs.
  context_lines: 3
  # Branch the review diff is computed against.
  base_branch: main
  # "all" includes staged and unstaged changes; "committed" reviews only
  # commits since the merge base.
  diff_scope: all

paths:
  # Custom prompt template (YAML with `system` and `prompt` fields).
  template: review.template.yml
"#
    .to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::*;

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn loader_in(dir: &TempDir) -> ConfigLoader {
        ConfigLoader::with_paths(
            dir.path().join("global.yaml"),
            dir.path().join("local.yaml"),
            Config::default(),
        )
    }

    fn write_global(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join("global.yaml"), content).unwrap();
    }

    fn write_local(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join("local.yaml"), content).unwrap();
    }

    #[test]
    fn deep_merge_recurses_on_mappings() {
        let base = yaml("{a: {x: 1, y: 2}, b: 3}");
        let overlay = yaml("{a: {y: 20}}");
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged, yaml("{a: {x: 1, y: 20}, b: 3}"));
    }

    #[test]
    fn deep_merge_replaces_sequences_wholesale() {
        let base = yaml("{models: [{name: a}, {name: b}]}");
        let overlay = yaml("{models: [{name: c}]}");
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged, yaml("{models: [{name: c}]}"));
    }

    #[test]
    fn deep_merge_never_deletes_keys() {
        let base = yaml("{a: {x: 1}, b: 2}");
        let overlay = yaml("{a: {z: 3}}");
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged, yaml("{a: {x: 1, z: 3}, b: 2}"));
    }

    #[test]
    fn missing_files_fall_back_to_defaults_and_fail_on_empty_models() {
        let dir = tempfile::tempdir().unwrap();
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(err.to_string().contains("at least one model"));
    }

    #[test]
    fn layer_precedence_local_over_global_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_global(
            &dir,
            "models:\n  - name: global-model\ngit:\n  base_branch: develop\n  context_lines: 7\n",
        );
        write_local(&dir, "git:\n  context_lines: 9\n");

        let config = loader_in(&dir).load(None).unwrap();
        assert_eq!(config.models[0].name, "global-model");
        assert_eq!(config.git.base_branch, "develop");
        assert_eq!(config.git.context_lines, 9);
        // Untouched leaves keep the built-in defaults.
        assert_eq!(config.defaults.timeout, Some(120));
        assert_eq!(config.defaults.retries, 1);
        assert_eq!(config.git.diff_scope, DiffScope::All);
    }

    #[test]
    fn overrides_win_over_every_file_layer() {
        let dir = tempfile::tempdir().unwrap();
        write_global(&dir, "models:\n  - name: m\ndefaults:\n  timeout: 60\n");
        write_local(&dir, "defaults:\n  timeout: 90\n");

        let overrides = match yaml("{defaults: {timeout: 30}}") {
            Value::Mapping(m) => m,
            _ => unreachable!(),
        };
        let config = loader_in(&dir).load(Some(&overrides)).unwrap();
        assert_eq!(config.defaults.timeout, Some(30));
    }

    #[test]
    fn model_override_replaces_configured_list() {
        let dir = tempfile::tempdir().unwrap();
        write_global(
            &dir,
            "models:\n  - name: one\n    options: [\"-o\", \"x\"]\n  - name: two\n",
        );

        let overrides = match yaml("{models: [{name: three, options: []}]}") {
            Value::Mapping(m) => m,
            _ => unreachable!(),
        };
        let config = loader_in(&dir).load(Some(&overrides)).unwrap();
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].name, "three");
        assert!(config.models[0].options.is_empty());
    }

    #[test]
    fn invalid_yaml_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        write_global(&dir, "models: [unclosed\n");
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(matches!(err, ReviewerError::Configuration(_)));
        assert!(err.to_string().contains("invalid YAML"));
    }

    #[test]
    fn non_mapping_top_level_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_global(&dir, "- just\n- a\n- list\n");
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(err.to_string().contains("mapping at top level"));
    }

    #[test]
    fn validation_reports_offending_field_path() {
        let dir = tempfile::tempdir().unwrap();
        write_global(&dir, "models:\n  - name: m\ndefaults:\n  retries: -1\n");
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(err.to_string().contains("defaults.retries"));

        write_global(&dir, "models:\n  - name: m\ngit:\n  diff_scope: everything\n");
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(err.to_string().contains("git.diff_scope"));

        write_global(&dir, "models:\n  - options: [\"-o\"]\n");
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(err.to_string().contains("models[0]"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_global(&dir, "models:\n  - name: m\ndefaults:\n  timeout: 0\n");
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(err.to_string().contains("defaults.timeout"));
    }

    #[test]
    fn duplicate_model_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_global(&dir, "models:\n  - name: m\n  - name: m\n");
        let err = loader_in(&dir).load(None).unwrap_err();
        assert!(err.to_string().contains("duplicate model name"));
    }

    #[test]
    fn starter_config_parses_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        write_global(&dir, &default_config_yaml());
        let config = loader_in(&dir).load(None).unwrap();
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.git.base_branch, "main");
    }

    proptest! {
        /// Leaves present in the override win; absent leaves keep the value
        /// from the layer below; no section key ever disappears.
        #[test]
        fn merge_algebra(
            retries in proptest::option::of(0u32..100),
            context_lines in proptest::option::of(0u32..40),
            base_branch in proptest::option::of("[a-z]{1,8}"),
        ) {
            let defaults = serde_yaml::to_value(Config::default()).unwrap();

            let mut git = Mapping::new();
            if let Some(lines) = context_lines {
                git.insert("context_lines".into(), lines.into());
            }
            if let Some(ref branch) = base_branch {
                git.insert("base_branch".into(), branch.clone().into());
            }
            let mut defaults_section = Mapping::new();
            if let Some(r) = retries {
                defaults_section.insert("retries".into(), r.into());
            }
            let mut overlay = Mapping::new();
            overlay.insert("git".into(), Value::Mapping(git));
            overlay.insert("defaults".into(), Value::Mapping(defaults_section));

            let merged = deep_merge(&defaults, &Value::Mapping(overlay));
            let config: Config = serde_yaml::from_value(merged.clone()).unwrap();

            prop_assert_eq!(config.defaults.retries, retries.unwrap_or(1));
            prop_assert_eq!(config.git.context_lines, context_lines.unwrap_or(3));
            prop_assert_eq!(
                config.git.base_branch,
                base_branch.unwrap_or_else(|| "main".to_string())
            );
            // Untouched sections and leaves survive the merge intact.
            prop_assert_eq!(config.models, Vec::<ModelEntry>::new());
            prop_assert_eq!(config.defaults.timeout, Some(120));
            if let Value::Mapping(top) = &merged {
                for section in ["models", "defaults", "git", "paths"] {
                    prop_assert!(top.get(section).is_some());
                }
            }
        }
    }
}
