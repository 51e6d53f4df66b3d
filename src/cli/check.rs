//! Check command — validates configuration and dependencies.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::config::ConfigLoader;
use crate::dispatch::{Dispatcher, NllmDispatcher};
use crate::git::GitInspector;

/// Check command options.
#[derive(Parser)]
pub struct CheckCommand {
    /// Path to the git repository to check (default: current directory).
    #[arg(value_name = "REPO_PATH")]
    pub repo_path: Option<PathBuf>,
}

impl CheckCommand {
    /// Executes the check command.
    pub async fn execute(self) -> Result<()> {
        let dir = match self.repo_path {
            Some(path) => path,
            None => std::env::current_dir().context("failed to determine working directory")?,
        };

        println!("\x1b[34mChecking git-reviewer configuration...\x1b[0m");

        let config = match ConfigLoader::new(&dir).load(None) {
            Ok(config) => config,
            Err(e) => {
                println!("\x1b[31m✗ configuration error: {e}\x1b[0m");
                bail!("configuration check failed");
            }
        };
        println!(
            "\x1b[32m✓\x1b[0m Configuration loaded ({} model(s) configured)",
            config.models.len()
        );
        for model in &config.models {
            let options = if model.options.is_empty() {
                "[none]".to_string()
            } else {
                model.options.join(" ")
            };
            println!("    {}  \x1b[2m{options}\x1b[0m", model.name);
        }

        let dispatcher = NllmDispatcher::new();
        match dispatcher.check_available().await {
            Ok(version) => println!("\x1b[32m✓\x1b[0m nllm available: {version}"),
            Err(e) => {
                println!("\x1b[31m✗ {e}\x1b[0m");
                bail!("dispatcher check failed");
            }
        }

        match GitInspector::open(&dir) {
            Ok(_) => println!(
                "\x1b[32m✓\x1b[0m {} is a valid git repository",
                dir.display()
            ),
            Err(e) => println!("\x1b[33m⚠ {e}\x1b[0m"),
        }

        println!("\n\x1b[32mgit-reviewer is ready to use!\x1b[0m");
        Ok(())
    }
}
