//! Init-config command — writes the starter configuration file.

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::config::{default_config_yaml, global_config_path, local_config_path};

/// Init-config command options.
#[derive(Parser)]
pub struct InitConfigCommand {
    /// Overwrites an existing configuration file.
    #[arg(long)]
    pub force: bool,

    /// Writes the local per-repository file instead of the global one.
    #[arg(long)]
    pub local: bool,
}

impl InitConfigCommand {
    /// Executes the init-config command.
    pub fn execute(self) -> Result<()> {
        let path = if self.local {
            let cwd = std::env::current_dir().context("failed to determine working directory")?;
            local_config_path(&cwd)
        } else {
            global_config_path()
        };

        if path.exists() && !self.force {
            bail!(
                "configuration already exists at {}; pass --force to overwrite",
                path.display()
            );
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        std::fs::write(&path, default_config_yaml())
            .with_context(|| format!("failed to write {}", path.display()))?;

        println!(
            "\x1b[32mConfiguration initialized at: {}\x1b[0m",
            path.display()
        );
        println!("\x1b[2mEdit this file to configure your models and preferences.\x1b[0m");
        Ok(())
    }
}
