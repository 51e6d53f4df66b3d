//! CLI interface for git-reviewer.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod check;
pub mod init_config;
pub mod review;

pub use check::CheckCommand;
pub use init_config::InitConfigCommand;
pub use review::ReviewCommand;

/// git-reviewer: AI-powered code review using multiple LLM models.
#[derive(Parser)]
#[command(name = "git-reviewer")]
#[command(about = "AI-powered code review using multiple LLM models", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Reviews git changes with the configured models.
    Review(ReviewCommand),
    /// Writes the starter configuration file.
    #[command(name = "init-config")]
    InitConfig(InitConfigCommand),
    /// Checks configuration and dependencies.
    Check(CheckCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Review(review_cmd) => review_cmd.execute().await,
            Commands::InitConfig(init_cmd) => init_cmd.execute(),
            Commands::Check(check_cmd) => check_cmd.execute().await,
        }
    }
}
