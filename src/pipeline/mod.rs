//! Study pipeline
//!
//! Orchestrates one repository run:
//! 1. Walk source files (gitignore-aware, filtered by extension)
//! 2. Chunk every file under the token budget
//! 3. Drop stored outputs of chunks that no longer exist and record the
//!    current chunk set in the store manifest
//! 4. Analyze chunks concurrently on a bounded worker pool, persisting each
//!    outcome to the chunk store
//! 5. After every chunk has finished, load the outputs of the current chunk
//!    set, normalize both detectors' findings and compare them
//!
//! Failed chunks never abort the run. They flow through a channel to the
//! collector and come back as `unanalyzed_chunks` in the result, together
//! with any manifest chunk whose output is missing from the store.

use crate::ai::{AnalysisOutcome, ChunkAnalyzer, PromptTemplate, RetryPolicy, SmellDetector};
use crate::chunker;
use crate::compare::{compare, ComparisonResult};
use crate::config::{ChunkingConfig, StudyConfig};
use crate::models::{Chunk, RawFinding, SourceUnit, UnanalyzedChunk};
use crate::normalize::Normalizer;
use crate::store::{collect_findings, ChunkStore};
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Called after each chunk finishes: `(chunk, succeeded, done, total)`
pub type ProgressCallback = Box<dyn Fn(&Chunk, bool, usize, usize) + Send + Sync>;

/// Repository-relative source files accepted by `chunking`, sorted.
pub fn collect_source_files(repo_path: &Path, chunking: &ChunkingConfig) -> Result<Vec<PathBuf>> {
    if !repo_path.is_dir() {
        anyhow::bail!("Repository path {} is not a directory", repo_path.display());
    }

    let mut files = Vec::new();
    let walker = WalkBuilder::new(repo_path)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() || !chunking.accepts(path) {
            continue;
        }
        if let Ok(relative) = path.strip_prefix(repo_path) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    debug!("Found {} source files in {}", files.len(), repo_path.display());
    Ok(files)
}

/// Chunk every source file of a repository, in path order.
pub fn chunk_repository(repo_path: &Path, chunking: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let files = collect_source_files(repo_path, chunking)?;
    Ok(chunk_files(repo_path, &files, chunking))
}

fn chunk_files(repo_path: &Path, files: &[PathBuf], chunking: &ChunkingConfig) -> Vec<Chunk> {
    files
        .iter()
        .flat_map(|relative| {
            let unit = SourceUnit::read(repo_path, relative);
            chunker::chunk(&unit, chunking.max_tokens)
        })
        .collect()
}

/// Name used for the repository's output directory
pub fn repository_name(repo_path: &Path) -> String {
    let canonical = repo_path
        .canonicalize()
        .unwrap_or_else(|_| repo_path.to_path_buf());
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repository".to_string())
}

/// Statistics from the analysis phase
#[derive(Debug, Default)]
pub struct AnalysisStats {
    pub files: usize,
    pub chunks: usize,
    pub oversized_chunks: usize,
    pub trivial_chunks: usize,
    pub succeeded: usize,
    pub llm_findings: usize,
    /// Chunks that failed after every attempt, sorted by file and index
    pub failures: Vec<UnanalyzedChunk>,
}

impl AnalysisStats {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} files", self.files),
            format!("{} chunks", self.chunks),
            format!("{} analyzed", self.succeeded),
            format!("{} findings", self.llm_findings),
        ];
        if !self.failures.is_empty() {
            parts.push(format!("{} unanalyzed", self.failures.len()));
        }
        if self.oversized_chunks > 0 {
            parts.push(format!("{} oversized", self.oversized_chunks));
        }
        parts.join(", ")
    }
}

/// Full study pipeline for one configuration.
pub struct Pipeline<'a> {
    config: &'a StudyConfig,
    prompt: PromptTemplate,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a StudyConfig) -> Self {
        Self {
            config,
            prompt: PromptTemplate::default(),
            progress_callback: None,
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Chunk the repository and analyze every chunk.
    ///
    /// Runs on a dedicated pool of `analysis.workers` threads; returns once
    /// every chunk has reached a terminal state and been persisted.
    pub fn analyze<D: SmellDetector + ?Sized>(
        &self,
        repo_path: &Path,
        detector: &D,
        store: &ChunkStore,
    ) -> Result<AnalysisStats> {
        let files = collect_source_files(repo_path, &self.config.chunking)?;
        let chunks = chunk_files(repo_path, &files, &self.config.chunking);

        store.prune(&chunks)?;
        store.write_manifest(&chunks)?;

        info!(
            "Analyzing {} chunk(s) from {} file(s) with {} worker(s)",
            chunks.len(),
            files.len(),
            self.config.analysis.workers
        );

        let mut stats = AnalysisStats {
            files: files.len(),
            chunks: chunks.len(),
            oversized_chunks: chunks.iter().filter(|c| c.oversized).count(),
            trivial_chunks: chunks.iter().filter(|c| c.trivial).count(),
            ..Default::default()
        };

        let analyzer = ChunkAnalyzer::new(
            detector,
            &self.prompt,
            RetryPolicy::from(&self.config.analysis),
        )
        .with_store(store);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.analysis.workers.max(1))
            .build()
            .context("Failed to build analysis thread pool")?;

        let (failure_tx, failure_rx) = crossbeam_channel::unbounded::<UnanalyzedChunk>();
        let completed = AtomicUsize::new(0);
        let succeeded = AtomicUsize::new(0);
        let findings = AtomicUsize::new(0);
        let total = chunks.len();

        pool.install(|| {
            chunks.par_iter().for_each(|chunk| {
                let outcome = analyzer.analyze(chunk);
                let ok = match outcome {
                    AnalysisOutcome::Success(found) => {
                        succeeded.fetch_add(1, Ordering::SeqCst);
                        findings.fetch_add(found.len(), Ordering::SeqCst);
                        true
                    }
                    AnalysisOutcome::Failure(reason) => {
                        let failure = UnanalyzedChunk {
                            file: chunk.source_path.clone(),
                            chunk_index: chunk.sequence_index,
                            start_line: chunk.start_line,
                            end_line: chunk.end_line,
                            failure_kind: reason.kind().to_string(),
                            detail: reason.detail().to_string(),
                        };
                        if failure_tx.send(failure).is_err() {
                            warn!("Failure collector closed early");
                        }
                        false
                    }
                };

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(ref callback) = self.progress_callback {
                    callback(chunk, ok, done, total);
                }
            });
        });
        drop(failure_tx);

        stats.succeeded = succeeded.into_inner();
        stats.llm_findings = findings.into_inner();
        stats.failures = failure_rx.iter().collect();
        stats.failures.sort();

        info!("Analysis finished: {}", stats.summary());
        Ok(stats)
    }

    /// Normalize stored LLM outputs and static findings, then compare them.
    pub fn compare(
        &self,
        store: &ChunkStore,
        static_findings: &[RawFinding],
    ) -> Result<ComparisonResult> {
        let outputs = store.load_current()?;
        let records = outputs.records;
        let (llm_raw, mut unanalyzed) = collect_findings(&records);
        unanalyzed.extend(outputs.missing);
        info!(
            "Comparing {} LLM finding(s) from {} chunk(s) against {} static finding(s)",
            llm_raw.len(),
            records.len(),
            static_findings.len()
        );
        if records.is_empty() {
            warn!(
                "No stored chunk outputs in {}; the LLM side is empty",
                store.dir().display()
            );
        }

        let normalizer = Normalizer::from_config(&self.config.taxonomy);
        let llm = normalizer.normalize_all(&llm_raw);
        let statics = normalizer.normalize_all(static_findings);

        Ok(compare(&llm, &statics)
            .with_repository(store.repository())
            .with_unanalyzed(unanalyzed))
    }
}
