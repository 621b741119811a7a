//! Cache directory command

use std::path::PathBuf;

use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};

use super::error::render_json;
use super::{Cli, CliError};

/// Cache subcommand
#[derive(Debug, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    action: CacheAction,
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// List cache file names
    List,
    /// Show size and modification time of every cache file
    Info {
        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete cache files
    Clear {
        /// Wildcard over file names (e.g. 'fac_*'); without it every file is
        /// a candidate and confirmation is required
        #[arg(long)]
        pattern: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

impl CacheCommand {
    /// Execute the cache command
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let paths = cli.data_paths()?;

        match &self.action {
            CacheAction::List => {
                let files = paths.list_cache_files()?;
                if files.is_empty() {
                    println!("No cache files in {}", paths.cache_dir().display());
                }
                for file in files {
                    if let Some(name) = file.file_name() {
                        println!("{}", name.to_string_lossy());
                    }
                }
            }
            CacheAction::Info { json } => {
                let info = paths.cache_info()?;
                if *json {
                    println!("{}", render_json(&info)?);
                } else {
                    println!("{:<48} {:>10}  MODIFIED", "FILE", "SIZE (MB)");
                    for entry in &info {
                        println!(
                            "{:<48} {:>10.2}  {}",
                            entry.name,
                            entry.size_mb(),
                            entry.modified.format("%Y-%m-%d %H:%M:%S")
                        );
                    }
                }
            }
            CacheAction::Clear { pattern, yes } => {
                let assume_yes = *yes;
                let deleted = paths.clear_cache(pattern.as_deref(), |files| {
                    confirm_delete(files, assume_yes)
                })?;
                println!("Deleted {deleted} cache file(s)");
            }
        }

        Ok(())
    }
}

fn confirm_delete(files: &[PathBuf], assume_yes: bool) -> bool {
    println!("Found {} cache files:", files.len());
    for file in files {
        if let Some(name) = file.file_name() {
            println!("  - {}", name.to_string_lossy());
        }
    }
    if assume_yes {
        return true;
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Delete all these files?")
        .default(false)
        .interact()
        .unwrap_or(false)
}
