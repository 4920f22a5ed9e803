//! Persisted per-chunk analysis outputs
//!
//! Layout: `<out>/<repository>/<flattened_path>_chunk<N>.json`, where the
//! flattened path escapes `_` as `_u` and then writes `/` as `__`, so two
//! distinct paths never share a file. Each chunk owns exactly one file, so
//! concurrent workers never write to the same path. Writes go through a
//! temp file and a rename, and re-running a chunk with the same result
//! produces the same bytes.
//!
//! `manifest.json` lists the chunks of the latest `analyze` run. Outputs of
//! chunks outside it are stale and ignored; chunks listed without an output
//! are reported as unanalyzed.

use crate::ai::{AttemptState, FailureReason, SmellReport};
use crate::models::{Chunk, RawFinding, UnanalyzedChunk};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the chunk manifest inside a store directory
pub const MANIFEST_FILE: &str = "manifest.json";

/// `failure_kind` of a chunk listed in the manifest with no stored output
pub const MISSING_OUTPUT: &str = "MissingOutput";

/// Final status of one chunk as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkStatus {
    Success { result: SmellReport },
    Failed { reason: FailureReason },
}

/// One persisted chunk output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub repository: String,
    pub file: String,
    pub chunk_index: usize,
    pub start_line: u32,
    pub end_line: u32,
    pub attempts: u32,
    #[serde(flatten)]
    pub outcome: ChunkStatus,
}

impl ChunkRecord {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ChunkStatus::Success { .. })
    }
}

/// One chunk the latest analysis expected to produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub file: String,
    pub chunk_index: usize,
    pub start_line: u32,
    pub end_line: u32,
}

impl From<&Chunk> for ManifestEntry {
    fn from(chunk: &Chunk) -> Self {
        Self {
            file: chunk.source_path.clone(),
            chunk_index: chunk.sequence_index,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
        }
    }
}

/// Chunk set of the latest analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkManifest {
    pub repository: String,
    pub chunks: Vec<ManifestEntry>,
}

/// Records that belong to the current chunk set, plus the chunks without one
#[derive(Debug, Default)]
pub struct StoredOutputs {
    pub records: Vec<ChunkRecord>,
    pub missing: Vec<UnanalyzedChunk>,
}

/// Directory of chunk outputs for one repository
#[derive(Debug, Clone)]
pub struct ChunkStore {
    dir: PathBuf,
    repository: String,
}

impl ChunkStore {
    /// Store rooted at `<out_root>/<repository>`
    pub fn new(out_root: &Path, repository: impl Into<String>) -> Self {
        let repository = repository.into();
        Self {
            dir: out_root.join(&repository),
            repository,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Output path for chunk `sequence_index` of `file`
    pub fn chunk_path(&self, file: &str, sequence_index: usize) -> PathBuf {
        let flattened = file
            .trim_start_matches('/')
            .replace('_', "_u")
            .replace('/', "__");
        self.dir
            .join(format!("{}_chunk{}.json", flattened, sequence_index))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Remove every stored output for this repository.
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .with_context(|| format!("Failed to clear {}", self.dir.display()))?;
        }
        Ok(())
    }

    /// Write the terminal state of a chunk. Non-terminal states are rejected.
    pub fn persist(&self, chunk: &Chunk, state: &AttemptState) -> Result<PathBuf> {
        let (attempts, outcome) = match state {
            AttemptState::Success { attempts, report } => (
                *attempts,
                ChunkStatus::Success {
                    result: report.clone(),
                },
            ),
            AttemptState::Failed { attempts, reason } => (
                *attempts,
                ChunkStatus::Failed {
                    reason: reason.clone(),
                },
            ),
            other => anyhow::bail!("refusing to persist non-terminal state {:?}", other),
        };

        let record = ChunkRecord {
            repository: self.repository.clone(),
            file: chunk.source_path.clone(),
            chunk_index: chunk.sequence_index,
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            attempts,
            outcome,
        };
        self.write_record(&record)
    }

    /// Atomically write a record to its chunk path.
    pub fn write_record(&self, record: &ChunkRecord) -> Result<PathBuf> {
        let path = self.chunk_path(&record.file, record.chunk_index);
        self.write_json(&path, record)?;
        debug!("Stored {}", path.display());
        Ok(path)
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let mut json = serde_json::to_string_pretty(value)?;
        json.push('\n');

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    }

    /// Record `chunks` as the chunk set of the current analysis.
    pub fn write_manifest(&self, chunks: &[Chunk]) -> Result<PathBuf> {
        let manifest = ChunkManifest {
            repository: self.repository.clone(),
            chunks: chunks.iter().map(ManifestEntry::from).collect(),
        };
        let path = self.manifest_path();
        self.write_json(&path, &manifest)?;
        debug!("Wrote manifest with {} chunk(s)", manifest.chunks.len());
        Ok(path)
    }

    /// The manifest of the latest analysis, if one was written.
    pub fn load_manifest(&self) -> Result<Option<ChunkManifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("Malformed manifest {}", path.display()))?;
        Ok(Some(manifest))
    }

    /// Delete stored outputs of chunks not in `chunks`.
    ///
    /// Returns how many files were removed.
    pub fn prune(&self, chunks: &[Chunk]) -> Result<usize> {
        if !self.dir.exists() {
            return Ok(0);
        }
        let keep: BTreeSet<PathBuf> = chunks
            .iter()
            .map(|c| self.chunk_path(&c.source_path, c.sequence_index))
            .collect();

        let mut removed = 0;
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let is_output = name.ends_with(".json") || name.ends_with(".json.tmp");
            if !is_output || name == MANIFEST_FILE || keep.contains(&path) {
                continue;
            }
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove stale {}", path.display()))?;
            debug!("Removed stale {}", path.display());
            removed += 1;
        }
        if removed > 0 {
            info!("Removed {} stale chunk output(s)", removed);
        }
        Ok(removed)
    }

    /// Load the outputs of the current chunk set.
    ///
    /// With a manifest, records outside it (or with different line bounds)
    /// are skipped and manifest chunks without a record come back as
    /// `missing`. Without one, every stored record counts.
    pub fn load_current(&self) -> Result<StoredOutputs> {
        let records = self.load_all()?;
        let Some(manifest) = self.load_manifest()? else {
            return Ok(StoredOutputs {
                records,
                missing: Vec::new(),
            });
        };

        let mut by_key: BTreeMap<(String, usize), ChunkRecord> = records
            .into_iter()
            .map(|r| ((r.file.clone(), r.chunk_index), r))
            .collect();

        let mut current = StoredOutputs::default();
        for entry in manifest.chunks {
            let record = by_key
                .remove(&(entry.file.clone(), entry.chunk_index))
                .filter(|r| r.start_line == entry.start_line && r.end_line == entry.end_line);
            match record {
                Some(record) => current.records.push(record),
                None => {
                    warn!(
                        "No stored output for {} chunk {} (lines {}-{})",
                        entry.file, entry.chunk_index, entry.start_line, entry.end_line
                    );
                    current.missing.push(UnanalyzedChunk {
                        file: entry.file,
                        chunk_index: entry.chunk_index,
                        start_line: entry.start_line,
                        end_line: entry.end_line,
                        failure_kind: MISSING_OUTPUT.to_string(),
                        detail: "no stored output for this chunk".to_string(),
                    });
                }
            }
        }
        for (file, index) in by_key.keys() {
            debug!("Ignoring stale output for {} chunk {}", file, index);
        }

        current
            .records
            .sort_by(|a, b| (&a.file, a.chunk_index).cmp(&(&b.file, b.chunk_index)));
        Ok(current)
    }

    /// Load every stored record, ordered by `(file, chunk_index)`.
    ///
    /// Unparseable files are skipped with a warning. A missing directory is
    /// an empty store.
    pub fn load_all(&self) -> Result<Vec<ChunkRecord>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read {}", self.dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json")
                || path.file_name().and_then(|n| n.to_str()) == Some(MANIFEST_FILE)
            {
                continue;
            }
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    warn!("Skipping unreadable {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<ChunkRecord>(&content) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| (&a.file, a.chunk_index).cmp(&(&b.file, b.chunk_index)));
        Ok(records)
    }
}

/// Split stored records into raw LLM findings and unanalyzed chunks.
pub fn collect_findings(records: &[ChunkRecord]) -> (Vec<RawFinding>, Vec<UnanalyzedChunk>) {
    let mut findings = Vec::new();
    let mut unanalyzed = Vec::new();

    for record in records {
        match &record.outcome {
            ChunkStatus::Success { result } => {
                findings.extend(result.to_raw_findings(
                    &record.file,
                    record.start_line,
                    record.end_line,
                ));
            }
            ChunkStatus::Failed { reason } => unanalyzed.push(UnanalyzedChunk {
                file: record.file.clone(),
                chunk_index: record.chunk_index,
                start_line: record.start_line,
                end_line: record.end_line,
                failure_kind: reason.kind().to_string(),
                detail: reason.detail().to_string(),
            }),
        }
    }
    (findings, unanalyzed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::parse_reply;
    use tempfile::TempDir;

    fn chunk(file: &str, index: usize, start: u32, end: u32) -> Chunk {
        Chunk {
            source_path: file.into(),
            start_line: start,
            end_line: end,
            text: String::new(),
            sequence_index: index,
            estimated_tokens: 0,
            oversized: false,
            trivial: false,
        }
    }

    fn report() -> SmellReport {
        parse_reply(
            r#"{"smells_detectados": ["God Class"], "descricao": {"God Class": "does everything"},
                "localizacao": {"God Class": "1-30"}, "confianca": {"God Class": "médio"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_chunk_path_flattens_directories() {
        let store = ChunkStore::new(Path::new("/out"), "repo");
        assert_eq!(
            store.chunk_path("src/main/Foo.java", 2),
            PathBuf::from("/out/repo/src__main__Foo.java_chunk2.json")
        );
    }

    #[test]
    fn test_chunk_path_keeps_distinct_files_apart() {
        let store = ChunkStore::new(Path::new("/out"), "repo");
        let nested = store.chunk_path("a/b.java", 0);
        let underscored = store.chunk_path("a__b.java", 0);
        assert_ne!(nested, underscored);
        assert_eq!(nested, PathBuf::from("/out/repo/a__b.java_chunk0.json"));
        assert_eq!(underscored, PathBuf::from("/out/repo/a_u_ub.java_chunk0.json"));
        assert_ne!(store.chunk_path("a_/b.java", 0), store.chunk_path("a/_b.java", 0));
    }

    fn success() -> AttemptState {
        AttemptState::Success {
            attempts: 1,
            report: report(),
        }
    }

    #[test]
    fn test_prune_drops_outputs_outside_chunk_set() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        let old: Vec<Chunk> = (0..4)
            .map(|i| chunk("A.java", i, i as u32 * 10 + 1, i as u32 * 10 + 10))
            .collect();
        for c in &old {
            store.persist(c, &success()).unwrap();
        }
        store.write_manifest(&old).unwrap();

        let current = vec![chunk("A.java", 0, 1, 40)];
        assert_eq!(store.prune(&current).unwrap(), 3);
        let names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&MANIFEST_FILE.to_string()));
        assert!(names.contains(&"A.java_chunk0.json".to_string()));
        assert_eq!(ChunkStore::new(dir.path(), "empty").prune(&current).unwrap(), 0);
    }

    #[test]
    fn test_load_current_follows_manifest() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        // outputs of an earlier, finer chunking
        for i in 0..3 {
            store
                .persist(&chunk("A.java", i, i as u32 * 10 + 1, i as u32 * 10 + 10), &success())
                .unwrap();
        }
        store.persist(&chunk("Old.java", 0, 1, 5), &success()).unwrap();

        let current = vec![chunk("A.java", 0, 1, 30), chunk("B.java", 0, 1, 8)];
        store.write_manifest(&current).unwrap();

        let outputs = store.load_current().unwrap();
        // A.java chunk 0 now spans 1-30, so the stored 1-10 output is stale
        assert!(outputs.records.is_empty());
        assert_eq!(outputs.missing.len(), 2);
        assert!(outputs.missing.iter().all(|m| m.failure_kind == MISSING_OUTPUT));
        assert_eq!(outputs.missing[0].file, "A.java");
        assert_eq!(outputs.missing[0].end_line, 30);
        assert_eq!(outputs.missing[1].file, "B.java");

        store.persist(&current[0], &success()).unwrap();
        let outputs = store.load_current().unwrap();
        assert_eq!(outputs.records.len(), 1);
        assert_eq!(outputs.records[0].end_line, 30);
        assert_eq!(outputs.missing.len(), 1);
    }

    #[test]
    fn test_load_current_without_manifest_uses_everything() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        store.persist(&chunk("A.java", 0, 1, 10), &success()).unwrap();
        store.persist(&chunk("A.java", 1, 11, 20), &success()).unwrap();

        assert!(store.load_manifest().unwrap().is_none());
        let outputs = store.load_current().unwrap();
        assert_eq!(outputs.records.len(), 2);
        assert!(outputs.missing.is_empty());
    }

    #[test]
    fn test_manifest_is_not_a_record() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        store.write_manifest(&[chunk("A.java", 0, 1, 10)]).unwrap();
        assert!(store.load_all().unwrap().is_empty());
        let manifest = store.load_manifest().unwrap().unwrap();
        assert_eq!(manifest.repository, "repo");
        assert_eq!(manifest.chunks[0].end_line, 10);

        std::fs::write(store.manifest_path(), "{broken").unwrap();
        assert!(store.load_manifest().is_err());
    }

    #[test]
    fn test_persist_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        let c = chunk("src/Foo.java", 0, 1, 50);
        let state = AttemptState::Success {
            attempts: 1,
            report: report(),
        };

        let path = store.persist(&c, &state).unwrap();
        let first = std::fs::read(&path).unwrap();
        store.persist(&c, &state).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_persisted_shape() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        let failed = AttemptState::Failed {
            attempts: 3,
            reason: FailureReason::ContractViolation {
                detail: "prose".into(),
            },
        };
        let path = store.persist(&chunk("A.java", 1, 51, 90), &failed).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["reason"]["kind"], "contract_violation");
        assert_eq!(value["chunk_index"], 1);
        assert_eq!(value["repository"], "repo");
    }

    #[test]
    fn test_non_terminal_state_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        assert!(store
            .persist(&chunk("A.java", 0, 1, 1), &AttemptState::Pending)
            .is_err());
    }

    #[test]
    fn test_load_all_and_collect() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "repo");
        store
            .persist(
                &chunk("b/B.java", 0, 1, 40),
                &AttemptState::Failed {
                    attempts: 3,
                    reason: FailureReason::TransportFailure {
                        detail: "timeout".into(),
                    },
                },
            )
            .unwrap();
        store
            .persist(
                &chunk("a/A.java", 1, 41, 80),
                &AttemptState::Success {
                    attempts: 1,
                    report: report(),
                },
            )
            .unwrap();
        store
            .persist(
                &chunk("a/A.java", 0, 1, 40),
                &AttemptState::Success {
                    attempts: 2,
                    report: SmellReport::empty(),
                },
            )
            .unwrap();
        std::fs::write(store.dir().join("junk.json"), "{not json").unwrap();

        let records = store.load_all().unwrap();
        let keys: Vec<_> = records
            .iter()
            .map(|r| (r.file.as_str(), r.chunk_index))
            .collect();
        assert_eq!(keys, vec![("a/A.java", 0), ("a/A.java", 1), ("b/B.java", 0)]);

        let (findings, unanalyzed) = collect_findings(&records);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line_start, Some(41));
        assert_eq!(findings[0].line_end, Some(70));
        assert_eq!(unanalyzed.len(), 1);
        assert_eq!(unanalyzed[0].file, "b/B.java");
        assert_eq!(unanalyzed[0].failure_kind, "TransportFailure");
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ChunkStore::new(dir.path(), "nothing-here");
        assert!(store.load_all().unwrap().is_empty());
    }
}
