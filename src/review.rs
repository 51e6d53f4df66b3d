//! End-to-end review pipeline and programmatic entry point.
//!
//! Stages run strictly in sequence (configuration, repository snapshot,
//! diff, context, template, dispatch) because each stage's output feeds the
//! next. Every value is derived fresh from disk and repository state; there
//! is no cross-run caching or shared mutable state.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

use crate::config::{Config, ConfigLoader, DiffScope, ModelEntry};
use crate::context;
use crate::dispatch::{DispatchRequest, Dispatcher, RunResults};
use crate::error::{ReviewerError, Result};
use crate::git::GitInspector;
use crate::template::Template;

/// Directory created under the repository when no output directory is
/// configured anywhere.
pub const DEFAULT_RESULTS_DIR: &str = "git-reviewer-results";

/// Parameters for one review run.
///
/// Every field is optional; unset fields fall back to the layered
/// configuration. Explicit fields are folded into the override layer, so
/// they win over both config files.
#[derive(Debug, Clone, Default)]
pub struct ReviewRequest {
    /// Repository to review (default: current directory).
    pub repo_path: Option<PathBuf>,
    /// Models to run; a non-empty list replaces the configured model list
    /// wholesale.
    pub models: Vec<String>,
    /// Context files included in the prompt.
    pub context_files: Vec<PathBuf>,
    /// Output directory for dispatcher artifacts.
    pub output_dir: Option<PathBuf>,
    /// Base branch for the diff.
    pub base_branch: Option<String>,
    /// Context lines in the diff.
    pub context_lines: Option<u32>,
    /// Diff scope.
    pub diff_scope: Option<DiffScope>,
    /// Per-model timeout in seconds.
    pub timeout: Option<u64>,
    /// Retries per model.
    pub retries: Option<u32>,
    /// Custom template path.
    pub template: Option<PathBuf>,
    /// Raw configuration override mapping, merged with highest precedence.
    pub config_override: Option<Mapping>,
}

/// Runs the full review pipeline and returns the dispatcher's aggregate
/// result unmodified.
pub async fn run_review(
    request: &ReviewRequest,
    dispatcher: &dyn Dispatcher,
) -> Result<RunResults> {
    let repo_dir = resolve_repo_dir(request)?;

    let overrides = build_overrides(request)?;
    let config = ConfigLoader::new(&repo_dir).load(Some(&overrides))?;

    let inspector = GitInspector::open(&repo_dir)?;
    let info = inspector.prepare(&config.git.base_branch)?;
    if let Some(warning) = inspector.working_tree_summary()? {
        tracing::warn!("{warning}");
    }
    tracing::info!(
        branch = %info.current_branch,
        range = %info.commit_range,
        files = info.stats.files,
        insertions = info.stats.insertions,
        deletions = info.stats.deletions,
        "reviewing changes"
    );

    let diff = inspector.diff(&info, config.git.context_lines, config.git.diff_scope)?;
    let repo_context = context::aggregate(&request.context_files, &repo_dir)?;

    let template = Template::resolve(&repo_dir, &config.paths.template)?;
    let populated = template.populate(&repo_context, &diff);
    for token in &populated.warnings {
        tracing::warn!(%token, "unresolved template placeholder");
    }
    let prompt = populated.render_prompt()?;

    let version = dispatcher.check_available().await?;
    tracing::debug!(%version, "dispatcher available");

    let dispatch_request = DispatchRequest {
        models: config.models.clone(),
        prompt,
        timeout: config.defaults.timeout,
        retries: config.defaults.retries,
        output_dir: Some(resolve_output_dir(request, &config, &repo_dir)),
    };

    dispatcher.run(&dispatch_request).await
}

fn resolve_repo_dir(request: &ReviewRequest) -> Result<PathBuf> {
    match &request.repo_path {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().map_err(|e| {
            ReviewerError::GitRepository(format!("failed to determine working directory: {e}"))
        }),
    }
}

/// Folds explicit request fields into a configuration override mapping.
///
/// A non-empty model list becomes a `models` override, which the merge
/// replaces wholesale rather than appending to the configured list.
fn build_overrides(request: &ReviewRequest) -> Result<Mapping> {
    let mut overrides = request.config_override.clone().unwrap_or_default();

    if !request.models.is_empty() {
        let entries: Vec<ModelEntry> = request
            .models
            .iter()
            .map(|name| ModelEntry {
                name: name.clone(),
                options: Vec::new(),
            })
            .collect();
        let value = serde_yaml::to_value(&entries)
            .map_err(|e| ReviewerError::Configuration(format!("model override: {e}")))?;
        overrides.insert(Value::String("models".to_string()), value);
    }

    if let Some(lines) = request.context_lines {
        set_section_key(&mut overrides, "git", "context_lines", Value::from(lines));
    }
    if let Some(branch) = &request.base_branch {
        set_section_key(&mut overrides, "git", "base_branch", Value::from(branch.clone()));
    }
    if let Some(scope) = request.diff_scope {
        let value = serde_yaml::to_value(scope)
            .map_err(|e| ReviewerError::Configuration(format!("diff scope override: {e}")))?;
        set_section_key(&mut overrides, "git", "diff_scope", value);
    }
    if let Some(timeout) = request.timeout {
        set_section_key(&mut overrides, "defaults", "timeout", Value::from(timeout));
    }
    if let Some(retries) = request.retries {
        set_section_key(&mut overrides, "defaults", "retries", Value::from(retries));
    }
    if let Some(template) = &request.template {
        set_section_key(
            &mut overrides,
            "paths",
            "template",
            Value::from(template.display().to_string()),
        );
    }

    Ok(overrides)
}

/// Sets `section.key` in the override mapping, creating the section mapping
/// when absent.
fn set_section_key(overrides: &mut Mapping, section: &str, key: &str, value: Value) {
    let section_key = Value::String(section.to_string());
    if !overrides.contains_key(&section_key) {
        overrides.insert(section_key.clone(), Value::Mapping(Mapping::new()));
    }
    if let Some(Value::Mapping(section_map)) = overrides.get_mut(&section_key) {
        section_map.insert(Value::String(key.to_string()), value);
    }
}

/// Picks the dispatcher output directory: explicit request, then configured
/// `defaults.outdir` (with `~` expansion), then a directory under the
/// repository.
fn resolve_output_dir(request: &ReviewRequest, config: &Config, repo_dir: &Path) -> PathBuf {
    if let Some(dir) = &request.output_dir {
        return dir.clone();
    }
    if let Some(dir) = &config.defaults.outdir {
        return expand_home(dir);
    }
    repo_dir.join(DEFAULT_RESULTS_DIR)
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
