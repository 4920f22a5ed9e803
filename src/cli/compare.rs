//! Compare command - normalize both detectors and report agreement

use super::load_config;
use crate::pipeline::{repository_name, Pipeline};
use crate::reporters::{self, OutputFormat};
use crate::static_findings::load_static_findings;
use crate::store::ChunkStore;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::info;

pub fn run(
    path: &Path,
    static_path: &Path,
    out: &Path,
    format: &str,
    output: Option<&Path>,
    repository: Option<String>,
) -> Result<()> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    let config = load_config(&repo_path);
    let repository = repository.unwrap_or_else(|| repository_name(&repo_path));

    let statics = load_static_findings(static_path, Some(&repo_path))?;
    let store = ChunkStore::new(out, repository.as_str());
    let result = Pipeline::new(&config).compare(&store, &statics)?;

    // comparison.json and comparison.md always land in <out>/reports/<repository>
    let report_dir = out.join("reports").join(&repository);
    std::fs::create_dir_all(&report_dir)
        .with_context(|| format!("Failed to create {}", report_dir.display()))?;
    for fmt in [OutputFormat::Json, OutputFormat::Markdown] {
        let path = report_dir.join(reporters::file_name(fmt));
        std::fs::write(&path, reporters::report_with_format(&result, fmt)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    let rendered = reporters::report(&result, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Report written to {}",
                style("✓").green(),
                style(path.display()).cyan()
            );
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
