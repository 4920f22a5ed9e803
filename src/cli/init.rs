//! Init command - write an example study configuration

use crate::config::EXAMPLE_CONFIG;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let dir = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    if !dir.is_dir() {
        anyhow::bail!("Path is not a directory: {}", dir.display());
    }

    let config_path = dir.join("smellcmp.toml");
    if config_path.exists() {
        println!(
            "{} Already initialized: {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    std::fs::write(&config_path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to create {}", config_path.display()))?;
    println!(
        "{} Created {}",
        style("✓").green(),
        style(config_path.display()).cyan()
    );

    println!("\nNext steps:");
    println!("  {} Analyze chunks with the LLM", style("smellcmp analyze <repo>").cyan());
    println!(
        "  {} Compare against static findings",
        style("smellcmp compare <repo> --static findings.json").cyan()
    );
    Ok(())
}
