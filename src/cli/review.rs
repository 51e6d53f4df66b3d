//! Review command — runs the full pipeline and renders the results.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::config::DiffScope;
use crate::dispatch::NllmDispatcher;
use crate::presenter::Presenter;
use crate::review::{run_review, ReviewRequest};

/// Review command options.
#[derive(Parser)]
pub struct ReviewCommand {
    /// Path to the git repository (default: current directory).
    #[arg(value_name = "REPO_PATH")]
    pub repo_path: Option<PathBuf>,

    /// Model to use (repeatable; replaces the configured model list).
    #[arg(long = "model", value_name = "NAME")]
    pub models: Vec<String>,

    /// Context file to include in the prompt (repeatable).
    #[arg(long = "context-file", value_name = "PATH")]
    pub context_files: Vec<PathBuf>,

    /// Directory for review outputs.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Base branch for the diff.
    #[arg(long, value_name = "BRANCH")]
    pub base_branch: Option<String>,

    /// Number of context lines in the git diff.
    #[arg(long, value_name = "N")]
    pub context_lines: Option<u32>,

    /// Diff scope: 'all' (committed+staged+unstaged) or 'committed'.
    #[arg(long, value_name = "SCOPE")]
    pub diff_scope: Option<String>,

    /// Timeout per model in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Number of retries per model.
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Path to a custom template file.
    #[arg(long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    /// Shows detailed output.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl ReviewCommand {
    /// Executes the review command.
    pub async fn execute(self) -> Result<()> {
        let diff_scope = match self.diff_scope.as_deref() {
            None => None,
            Some("all") => Some(DiffScope::All),
            Some("committed") => Some(DiffScope::Committed),
            Some(other) => {
                bail!("invalid diff scope '{other}'. Must be 'all' or 'committed'")
            }
        };

        let repo_dir = match &self.repo_path {
            Some(path) => path.clone(),
            None => std::env::current_dir().context("failed to determine working directory")?,
        };
        println!("\x1b[2mReviewing repository: {}\x1b[0m", repo_dir.display());

        let request = ReviewRequest {
            repo_path: Some(repo_dir),
            models: self.models,
            context_files: self.context_files,
            output_dir: self.output_dir,
            base_branch: self.base_branch,
            context_lines: self.context_lines,
            diff_scope,
            timeout: self.timeout,
            retries: self.retries,
            template: self.template,
            config_override: None,
        };

        let dispatcher = NllmDispatcher::new();
        let results = run_review(&request, &dispatcher).await?;

        Presenter::new(self.verbose).present(&results);

        if let Some(outdir) = &results.outdir {
            println!(
                "\n\x1b[36mFull results saved to: \x1b[1m{}\x1b[0m",
                outdir.display()
            );
        }

        if !results.any_ok() {
            bail!("all models failed; see errors above");
        }

        let failures = results.failure_count();
        if failures > 0 {
            println!("\x1b[33mCompleted with {failures} model failure(s).\x1b[0m");
        } else {
            println!("\x1b[32mReview completed successfully!\x1b[0m");
        }

        Ok(())
    }
}
