//! Harness configuration commands

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;

use statecap_common::HarnessConfig;

use crate::output::{print_success, print_value, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,
}

pub fn execute(cmd: ConfigCommands, path: &Path, format: OutputFormat) -> Result<bool> {
    match cmd {
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            HarnessConfig::default()
                .save(path)
                .with_context(|| format!("writing {}", path.display()))?;
            print_success(&format!("Wrote {}", path.display()));
        }
        ConfigCommands::Show => {
            let config = HarnessConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?;
            if format.is_structured() {
                print_value(&config, format);
            } else {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("statecap.toml");

        assert!(execute(ConfigCommands::Init { force: false }, &path, OutputFormat::Plain).unwrap());
        let loaded = HarnessConfig::load(&path).unwrap();
        assert_eq!(loaded.timeouts.selector_ms, 30_000);
        assert!(loaded.browser.headless);

        assert!(execute(ConfigCommands::Init { force: false }, &path, OutputFormat::Plain).is_err());
        assert!(execute(ConfigCommands::Init { force: true }, &path, OutputFormat::Plain).unwrap());
    }

    #[test]
    fn test_show_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("statecap.toml");
        std::fs::write(&path, "[timeouts]\npoll_interval_ms = 0\n").unwrap();
        assert!(execute(ConfigCommands::Show, &path, OutputFormat::Plain).is_err());
    }
}
