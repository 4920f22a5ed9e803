//! Core data models for smellcmp
//!
//! These models are shared by every stage: source units and chunks feed the
//! LLM analysis, raw findings come out of either detector, and normalized
//! findings are what the comparison engine matches.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which detector produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Llm,
    Static,
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorKind::Llm => write!(f, "llm"),
            DetectorKind::Static => write!(f, "static"),
        }
    }
}

/// Severity levels reported by the static analyzer
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a collaborator severity label (Checkstyle or SonarQube vocabulary).
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "blocker" | "critical" => Severity::Critical,
            "error" | "major" | "high" => Severity::High,
            "warning" | "warn" | "medium" => Severity::Medium,
            "minor" | "low" => Severity::Low,
            _ => Severity::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Confidence level the LLM attaches to each smell.
///
/// The wire vocabulary is Portuguese (`alto`, `médio`, `baixo`) because that
/// is what the system instruction asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    #[serde(rename = "alto")]
    High,
    #[serde(rename = "médio", alias = "medio")]
    Medium,
    #[serde(rename = "baixo")]
    Low,
}

impl Confidence {
    /// Parse a wire label, case-insensitive. `medio` is accepted for `médio`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "alto" => Some(Confidence::High),
            "médio" | "medio" => Some(Confidence::Medium),
            "baixo" => Some(Confidence::Low),
            _ => None,
        }
    }
}

/// The closed smell taxonomy both detectors are normalized onto.
///
/// Declaration order is the alias priority order used by the normalizer and
/// the row order of every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalCategory {
    LongMethod,
    GodClass,
    FeatureEnvy,
    DataClass,
    MagicNumber,
    DuplicateCode,
    ExceptionHandling,
    Other,
}

impl CanonicalCategory {
    pub const ALL: [CanonicalCategory; 8] = [
        CanonicalCategory::LongMethod,
        CanonicalCategory::GodClass,
        CanonicalCategory::FeatureEnvy,
        CanonicalCategory::DataClass,
        CanonicalCategory::MagicNumber,
        CanonicalCategory::DuplicateCode,
        CanonicalCategory::ExceptionHandling,
        CanonicalCategory::Other,
    ];

    /// Human-readable label for reports
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalCategory::LongMethod => "Long Method",
            CanonicalCategory::GodClass => "God Class",
            CanonicalCategory::FeatureEnvy => "Feature Envy",
            CanonicalCategory::DataClass => "Data Class",
            CanonicalCategory::MagicNumber => "Magic Number",
            CanonicalCategory::DuplicateCode => "Duplicate Code",
            CanonicalCategory::ExceptionHandling => "Exception Handling",
            CanonicalCategory::Other => "Other",
        }
    }

    /// Parse the identifier form (`LongMethod`) used in config files.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| format!("{:?}", c).to_lowercase() == wanted)
    }
}

impl std::fmt::Display for CanonicalCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A source file read for chunking.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// Repository-relative path
    pub path: PathBuf,
    pub full_text: String,
    pub total_lines: usize,
}

impl SourceUnit {
    pub fn new(path: impl Into<PathBuf>, full_text: impl Into<String>) -> Self {
        let full_text = full_text.into();
        let total_lines = full_text.lines().count();
        Self {
            path: path.into(),
            full_text,
            total_lines,
        }
    }

    /// Read `root/relative` lossily.
    ///
    /// An unreadable file degrades to an empty unit so it chunks to nothing.
    pub fn read(root: &Path, relative: &Path) -> Self {
        match std::fs::read(root.join(relative)) {
            Ok(bytes) => Self::new(relative, String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", relative.display(), e);
                Self::new(relative, String::new())
            }
        }
    }

    /// Path with `/` separators, used as the finding and output key.
    pub fn key(&self) -> String {
        path_key(&self.path)
    }
}

/// Render a path as a `/`-separated key regardless of platform.
pub fn path_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| c != "." && !c.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A contiguous, line-bounded slice of one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_path: String,
    /// 1-indexed, inclusive
    pub start_line: u32,
    /// 1-indexed, inclusive
    pub end_line: u32,
    pub text: String,
    /// 0-based emission order within the file
    pub sequence_index: usize,
    pub estimated_tokens: usize,
    /// A single line whose estimate alone exceeds the budget
    #[serde(default)]
    pub oversized: bool,
    /// Whitespace-only content
    #[serde(default)]
    pub trivial: bool,
}

impl Chunk {
    pub fn line_count(&self) -> u32 {
        self.end_line - self.start_line + 1
    }

    /// Translate a chunk-relative line (1 = first line of the chunk) to a file line.
    pub fn to_file_line(&self, relative: u32) -> u32 {
        self.start_line + relative.saturating_sub(1)
    }
}

/// A detector-reported issue before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFinding {
    pub detector: DetectorKind,
    /// Free-form smell name (LLM) or rule id (static)
    pub source_category: String,
    pub file: String,
    #[serde(default)]
    pub line_start: Option<u32>,
    #[serde(default)]
    pub line_end: Option<u32>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A chunk whose analysis failed after every attempt.
///
/// These are reported next to the comparison, never counted as "no smells".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnanalyzedChunk {
    pub file: String,
    pub chunk_index: usize,
    pub start_line: u32,
    pub end_line: u32,
    /// `ContractViolation`, `TransportFailure`, `PersistFailure` or `MissingOutput`
    pub failure_kind: String,
    pub detail: String,
}

/// A finding mapped onto the closed taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NormalizedFinding {
    pub file: String,
    pub canonical_category: CanonicalCategory,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub detector: DetectorKind,
}

impl NormalizedFinding {
    /// Inclusive line range, if the finding has a location.
    ///
    /// A start without an end is a single-line range.
    pub fn range(&self) -> Option<(u32, u32)> {
        let start = self.line_start?;
        let end = self.line_end.unwrap_or(start);
        Some((start.min(end), start.max(end)))
    }

    /// Whether two findings refer to the same underlying occurrence.
    ///
    /// File and category must match. Ranges must overlap by at least one
    /// line; a location-less finding on either side matches at category level.
    pub fn same_occurrence(&self, other: &NormalizedFinding) -> bool {
        if self.file != other.file || self.canonical_category != other.canonical_category {
            return false;
        }
        match (self.range(), other.range()) {
            (Some((a_start, a_end)), Some((b_start, b_end))) => {
                a_start <= b_end && b_start <= a_end
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(file: &str, cat: CanonicalCategory, range: Option<(u32, u32)>) -> NormalizedFinding {
        NormalizedFinding {
            file: file.into(),
            canonical_category: cat,
            line_start: range.map(|r| r.0),
            line_end: range.map(|r| r.1),
            detector: DetectorKind::Llm,
        }
    }

    #[test]
    fn test_same_occurrence_overlap() {
        let a = finding("Foo.java", CanonicalCategory::LongMethod, Some((10, 40)));
        let b = finding("Foo.java", CanonicalCategory::LongMethod, Some((15, 20)));
        let c = finding("Foo.java", CanonicalCategory::LongMethod, Some((41, 50)));
        assert!(a.same_occurrence(&b));
        assert!(!a.same_occurrence(&c));
        // Touching at a single line counts as overlap
        let d = finding("Foo.java", CanonicalCategory::LongMethod, Some((40, 45)));
        assert!(a.same_occurrence(&d));
    }

    #[test]
    fn test_same_occurrence_requires_file_and_category() {
        let a = finding("Foo.java", CanonicalCategory::LongMethod, Some((10, 40)));
        let b = finding("Bar.java", CanonicalCategory::LongMethod, Some((10, 40)));
        let c = finding("Foo.java", CanonicalCategory::GodClass, Some((10, 40)));
        assert!(!a.same_occurrence(&b));
        assert!(!a.same_occurrence(&c));
    }

    #[test]
    fn test_location_less_degrades_to_category_match() {
        let a = finding("Foo.java", CanonicalCategory::MagicNumber, None);
        let b = finding("Foo.java", CanonicalCategory::MagicNumber, Some((5, 5)));
        assert!(a.same_occurrence(&b));
        assert!(b.same_occurrence(&a));
    }

    #[test]
    fn test_confidence_parse() {
        assert_eq!(Confidence::parse("Alto"), Some(Confidence::High));
        assert_eq!(Confidence::parse("médio"), Some(Confidence::Medium));
        assert_eq!(Confidence::parse("medio"), Some(Confidence::Medium));
        assert_eq!(Confidence::parse("high"), None);
    }

    #[test]
    fn test_category_from_name() {
        assert_eq!(
            CanonicalCategory::from_name("LongMethod"),
            Some(CanonicalCategory::LongMethod)
        );
        assert_eq!(
            CanonicalCategory::from_name("god_class"),
            Some(CanonicalCategory::GodClass)
        );
        assert_eq!(CanonicalCategory::from_name("Spaghetti"), None);
    }

    #[test]
    fn test_chunk_line_translation() {
        let chunk = Chunk {
            source_path: "a.py".into(),
            start_line: 31,
            end_line: 60,
            text: String::new(),
            sequence_index: 1,
            estimated_tokens: 0,
            oversized: false,
            trivial: false,
        };
        assert_eq!(chunk.to_file_line(1), 31);
        assert_eq!(chunk.to_file_line(10), 40);
        assert_eq!(chunk.line_count(), 30);
    }
}
