//! Chunk command - preview chunk boundaries for one file

use super::load_config;
use crate::chunker;
use crate::models::SourceUnit;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub fn run(path: &Path, max_tokens: Option<usize>, show_text: bool) -> Result<()> {
    let file = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    if !file.is_file() {
        anyhow::bail!("Not a file: {}", file.display());
    }

    let dir = file.parent().unwrap_or_else(|| Path::new("."));
    let config = load_config(dir);
    let budget = max_tokens.unwrap_or(config.chunking.max_tokens);

    let name = file.file_name().map(Path::new).unwrap_or(path);
    let unit = SourceUnit::read(dir, name);
    let chunks = chunker::chunk(&unit, budget);

    println!(
        "\n{} {} lines, {} chunk(s) at {} tokens\n",
        style(unit.key()).bold(),
        unit.total_lines,
        chunks.len(),
        budget
    );
    for c in &chunks {
        let mut flags = Vec::new();
        if c.oversized {
            flags.push(style("oversized").red().to_string());
        }
        if c.trivial {
            flags.push(style("trivial").dim().to_string());
        }
        println!(
            "  #{:<4} lines {:>6}-{:<6} ~{:>7} tokens {}",
            c.sequence_index,
            c.start_line,
            c.end_line,
            c.estimated_tokens,
            flags.join(" ")
        );
        if show_text {
            println!("{}", style(&c.text).dim());
        }
    }
    Ok(())
}
