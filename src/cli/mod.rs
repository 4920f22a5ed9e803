//! CLI command definitions and handlers

mod analyze;
mod chunk;
mod compare;
mod init;

use crate::config::{load_study_config, StudyConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Study config from the working directory, else from `dir`
fn load_config(dir: &Path) -> StudyConfig {
    let in_cwd = Path::new("smellcmp.toml").exists() || Path::new(".smellcmprc.json").exists();
    if in_cwd {
        load_study_config(Path::new("."))
    } else {
        load_study_config(dir)
    }
}

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// smellcmp - compare LLM and static-analysis code smell findings
#[derive(Parser, Debug)]
#[command(name = "smellcmp")]
#[command(
    version,
    about = "Compare code smells found by an LLM with those found by a static analyzer",
    long_about = "smellcmp chunks a repository, asks an LLM for code smells in each chunk \
under a strict JSON contract, normalizes both the LLM's and a static analyzer's findings \
onto a shared taxonomy, and reports how much the two agree.",
    after_help = "\
Examples:
  smellcmp init                                      Write an example smellcmp.toml
  smellcmp analyze ./repo                            Chunk and analyze every source file
  smellcmp compare ./repo --static sonar.json        Compare stored LLM outputs with static findings
  smellcmp compare ./repo --static cs.json -f md     Markdown report on stdout
  smellcmp chunk ./repo/src/Foo.java --max-tokens 500   Preview chunk boundaries"
)]
pub struct Cli {
    /// Path to repository or file (default: current directory)
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Number of concurrent chunk analyses (1-64, default from config)
    #[arg(long, global = true, value_parser = parse_workers)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an example smellcmp.toml into the target directory
    Init,

    /// Chunk the repository and analyze every chunk with the LLM
    #[command(after_help = "\
Examples:
  smellcmp analyze ./repo                          Outputs go to ./outputs/<repo>/
  smellcmp analyze ./repo --out results --fresh    Clear previous outputs first
  smellcmp analyze ./repo --backend anthropic      Use Claude instead of OpenAI")]
    Analyze {
        /// Root directory for per-chunk outputs
        #[arg(long, default_value = "outputs")]
        out: PathBuf,

        /// Remove this repository's previous outputs before analyzing
        #[arg(long)]
        fresh: bool,

        /// LLM backend: openai, anthropic, deepinfra, openrouter, ollama
        #[arg(long)]
        backend: Option<String>,

        /// Model name (default depends on backend)
        #[arg(long)]
        model: Option<String>,

        /// Override the chunk token budget
        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Compare stored LLM outputs with static analyzer findings
    Compare {
        /// Static findings JSON (Checkstyle `code_smells`, SonarQube `issues`, or a finding list)
        #[arg(long = "static", short = 's')]
        static_findings: PathBuf,

        /// Root directory the analyze step wrote to
        #[arg(long, default_value = "outputs")]
        out: PathBuf,

        /// Output format: text, json, markdown (or md)
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json", "markdown", "md"])]
        format: String,

        /// Write the rendered report here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Repository name used under the output root (default: directory name)
        #[arg(long)]
        repository: Option<String>,
    },

    /// Show how a single file would be chunked (no LLM calls)
    Chunk {
        /// Override the chunk token budget
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Print each chunk's text
        #[arg(long)]
        show_text: bool,
    },
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => init::run(&cli.path),

        Commands::Analyze {
            out,
            fresh,
            backend,
            model,
            max_tokens,
        } => analyze::run(
            &cli.path,
            &out,
            analyze::Overrides {
                workers: cli.workers,
                backend,
                model,
                max_tokens,
            },
            fresh,
        ),

        Commands::Compare {
            static_findings,
            out,
            format,
            output,
            repository,
        } => compare::run(
            &cli.path,
            &static_findings,
            &out,
            &format,
            output.as_deref(),
            repository,
        ),

        Commands::Chunk {
            max_tokens,
            show_text,
        } => chunk::run(&cli.path, max_tokens, show_text),
    }
}
