//! Analyze command - chunk a repository and run the LLM over every chunk

use super::load_config;
use crate::ai::{AiClient, AiConfig};
use crate::config::UserConfig;
use crate::pipeline::{repository_name, Pipeline};
use crate::store::ChunkStore;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;

/// Command-line values that take precedence over `smellcmp.toml`
#[derive(Debug, Default)]
pub struct Overrides {
    pub workers: Option<usize>,
    pub backend: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<usize>,
}

pub fn run(path: &Path, out: &Path, overrides: Overrides, fresh: bool) -> Result<()> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    let mut config = load_config(&repo_path);
    if let Some(workers) = overrides.workers {
        config.analysis.workers = workers;
    }
    if let Some(backend) = overrides.backend {
        config.llm.backend = Some(backend);
    }
    if let Some(model) = overrides.model {
        config.llm.model = Some(model);
    }
    if let Some(max_tokens) = overrides.max_tokens {
        config.chunking.max_tokens = max_tokens;
    }

    let user_config = UserConfig::load().unwrap_or_default();
    let ai_config = AiConfig::from_study(&config, &user_config)?;
    let client = AiClient::from_env_with_config(ai_config, Some(&user_config))?;

    let store = ChunkStore::new(out, repository_name(&repo_path));
    if fresh {
        store.clear()?;
    }

    println!(
        "\n{} Analyzing {} with {} ({:?})\n",
        style("▶").bold(),
        style(repo_path.display()).cyan(),
        style(client.model()).yellow(),
        client.backend()
    );

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    let progress = bar.clone();

    let start = Instant::now();
    let pipeline = Pipeline::new(&config).with_progress(Box::new(move |chunk, ok, _done, total| {
        progress.set_length(total as u64);
        progress.inc(1);
        if !ok {
            progress.println(format!(
                "{} {} chunk {} (lines {}-{}) unanalyzed",
                style("✗").red(),
                chunk.source_path,
                chunk.sequence_index,
                chunk.start_line,
                chunk.end_line
            ));
        }
    }));
    let stats = pipeline.analyze(&repo_path, &client, &store)?;
    bar.finish_and_clear();

    println!(
        "{} {} in {:.1}s",
        style("✓").green(),
        stats.summary(),
        start.elapsed().as_secs_f64()
    );
    println!(
        "  Outputs: {}",
        style(store.dir().display()).cyan()
    );
    if !stats.failures.is_empty() {
        println!(
            "  {} {} chunk(s) failed after all retries; they are reported as unanalyzed",
            style("!").yellow(),
            stats.failed()
        );
    }
    Ok(())
}
