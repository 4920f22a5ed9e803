//! Ratios, coverage and inter-rater agreement

use crate::models::{CanonicalCategory, DetectorKind, NormalizedFinding};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Overlap class of one category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapLevel {
    High,
    Medium,
    Low,
}

impl OverlapLevel {
    /// `high` above 80% simultaneity, `low` below 20%, `medium` otherwise
    pub fn classify(simultaneity: f64) -> Self {
        if simultaneity > 0.8 {
            OverlapLevel::High
        } else if simultaneity < 0.2 {
            OverlapLevel::Low
        } else {
            OverlapLevel::Medium
        }
    }
}

impl std::fmt::Display for OverlapLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlapLevel::High => write!(f, "high"),
            OverlapLevel::Medium => write!(f, "medium"),
            OverlapLevel::Low => write!(f, "low"),
        }
    }
}

/// Overall agreement, from the repository similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgreementLevel {
    Low,
    Medium,
    High,
}

impl AgreementLevel {
    /// `low` below 30%, `medium` below 70%, `high` otherwise
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity < 0.3 {
            AgreementLevel::Low
        } else if similarity < 0.7 {
            AgreementLevel::Medium
        } else {
            AgreementLevel::High
        }
    }
}

impl std::fmt::Display for AgreementLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgreementLevel::Low => write!(f, "low"),
            AgreementLevel::Medium => write!(f, "medium"),
            AgreementLevel::High => write!(f, "high"),
        }
    }
}

/// Landis and Koch reading of a kappa value
pub fn kappa_strength(kappa: f64) -> &'static str {
    if kappa < 0.0 {
        "worse than chance"
    } else if kappa < 0.2 {
        "slight"
    } else if kappa < 0.4 {
        "fair"
    } else if kappa < 0.6 {
        "moderate"
    } else if kappa < 0.8 {
        "substantial"
    } else {
        "almost perfect"
    }
}

/// `part / whole`, with an empty whole giving 0.
pub fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Which files each detector reported on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    /// Files with at least one finding from either detector
    pub total_files: usize,
    pub llm_files: usize,
    pub static_files: usize,
    pub shared_files: usize,
    /// `llm_files / total_files`
    pub llm_coverage: f64,
    pub static_coverage: f64,
    /// Mean distinct categories per file the detector reported on
    pub llm_categories_per_file: f64,
    pub static_categories_per_file: f64,
}

impl Coverage {
    pub fn compute(llm: &[NormalizedFinding], statics: &[NormalizedFinding]) -> Self {
        let llm_by_file = categories_by_file(llm);
        let static_by_file = categories_by_file(statics);

        let all: BTreeSet<&str> = llm_by_file
            .keys()
            .chain(static_by_file.keys())
            .copied()
            .collect();
        let shared = llm_by_file
            .keys()
            .filter(|f| static_by_file.contains_key(*f))
            .count();

        Self {
            total_files: all.len(),
            llm_files: llm_by_file.len(),
            static_files: static_by_file.len(),
            shared_files: shared,
            llm_coverage: ratio(llm_by_file.len(), all.len()),
            static_coverage: ratio(static_by_file.len(), all.len()),
            llm_categories_per_file: mean_categories(&llm_by_file),
            static_categories_per_file: mean_categories(&static_by_file),
        }
    }
}

fn categories_by_file(
    findings: &[NormalizedFinding],
) -> BTreeMap<&str, BTreeSet<CanonicalCategory>> {
    let mut by_file: BTreeMap<&str, BTreeSet<CanonicalCategory>> = BTreeMap::new();
    for f in findings {
        by_file
            .entry(f.file.as_str())
            .or_default()
            .insert(f.canonical_category);
    }
    by_file
}

fn mean_categories(by_file: &BTreeMap<&str, BTreeSet<CanonicalCategory>>) -> f64 {
    let total: usize = by_file.values().map(|c| c.len()).sum();
    ratio(total, by_file.len())
}

type Flags = [BTreeSet<CanonicalCategory>; 2];

/// Run of detection units flagged alike by both detectors.
///
/// A unit is one file line, or the whole file for location-less findings.
#[derive(Debug)]
struct Span {
    units: u64,
    flagged: Flags,
}

/// Per-file input of the sweep
#[derive(Default)]
struct FileMarks {
    whole_file: Flags,
    /// `(line, side, category, +1 at start / -1 past end)`
    edges: Vec<(u64, usize, CanonicalCategory, i32)>,
}

/// Categories each detector flagged, per detection unit
///
/// Consecutive lines covered by the same findings collapse into one
/// weighted span, so cost follows the number of ranges, not their length.
pub struct AgreementTable {
    spans: Vec<Span>,
}

impl AgreementTable {
    pub fn build<'a>(findings: impl IntoIterator<Item = &'a NormalizedFinding>) -> Self {
        let mut files: BTreeMap<&'a str, FileMarks> = BTreeMap::new();
        for f in findings {
            let side = match f.detector {
                DetectorKind::Llm => 0,
                DetectorKind::Static => 1,
            };
            let marks = files.entry(f.file.as_str()).or_default();
            match f.range() {
                Some((start, end)) => {
                    let cat = f.canonical_category;
                    marks.edges.push((u64::from(start), side, cat, 1));
                    marks.edges.push((u64::from(end) + 1, side, cat, -1));
                }
                None => {
                    marks.whole_file[side].insert(f.canonical_category);
                }
            }
        }

        let mut spans = Vec::new();
        for (_, mut marks) in files {
            if marks.whole_file.iter().any(|set| !set.is_empty()) {
                spans.push(Span {
                    units: 1,
                    flagged: marks.whole_file,
                });
            }
            marks.edges.sort_unstable_by_key(|edge| edge.0);
            sweep(&marks.edges, &mut spans);
        }
        Self { spans }
    }

    pub fn unit_count(&self) -> u64 {
        self.spans.iter().map(|span| span.units).sum()
    }

    /// Cohen's kappa for one category over every detection unit.
    ///
    /// Each unit is a binary rating per detector ("flagged this category or
    /// not"). No units, or expected agreement of 1, gives 0.
    pub fn kappa(&self, category: CanonicalCategory) -> f64 {
        let n = self.unit_count();
        if n == 0 {
            return 0.0;
        }

        let (mut both, mut llm_only, mut static_only) = (0u64, 0u64, 0u64);
        for span in &self.spans {
            let [llm, statics] = &span.flagged;
            match (llm.contains(&category), statics.contains(&category)) {
                (true, true) => both += span.units,
                (true, false) => llm_only += span.units,
                (false, true) => static_only += span.units,
                (false, false) => {}
            }
        }
        let neither = n - both - llm_only - static_only;

        let n = n as f64;
        let observed = (both + neither) as f64 / n;
        let p_llm = (both + llm_only) as f64 / n;
        let p_static = (both + static_only) as f64 / n;
        let expected = p_llm * p_static + (1.0 - p_llm) * (1.0 - p_static);

        if (1.0 - expected).abs() < f64::EPSILON {
            return 0.0;
        }
        (observed - expected) / (1.0 - expected)
    }
}

/// Turn sorted range edges of one file into spans of covered lines.
fn sweep(edges: &[(u64, usize, CanonicalCategory, i32)], spans: &mut Vec<Span>) {
    let mut active: BTreeMap<(usize, CanonicalCategory), i32> = BTreeMap::new();
    let mut previous: Option<u64> = None;
    let mut i = 0;
    while i < edges.len() {
        let line = edges[i].0;
        if let Some(from) = previous {
            if line > from && !active.is_empty() {
                let mut flagged: Flags = Default::default();
                for (side, cat) in active.keys() {
                    flagged[*side].insert(*cat);
                }
                spans.push(Span {
                    units: line - from,
                    flagged,
                });
            }
        }
        while i < edges.len() && edges[i].0 == line {
            let (_, side, cat, delta) = edges[i];
            let count = active.entry((side, cat)).or_insert(0);
            *count += delta;
            if *count == 0 {
                active.remove(&(side, cat));
            }
            i += 1;
        }
        previous = Some(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(
        detector: DetectorKind,
        file: &str,
        cat: CanonicalCategory,
        range: Option<(u32, u32)>,
    ) -> NormalizedFinding {
        NormalizedFinding {
            file: file.into(),
            canonical_category: cat,
            line_start: range.map(|r| r.0),
            line_end: range.map(|r| r.1),
            detector,
        }
    }

    #[test]
    fn test_overlap_thresholds() {
        assert_eq!(OverlapLevel::classify(0.81), OverlapLevel::High);
        assert_eq!(OverlapLevel::classify(0.8), OverlapLevel::Medium);
        assert_eq!(OverlapLevel::classify(0.2), OverlapLevel::Medium);
        assert_eq!(OverlapLevel::classify(0.19), OverlapLevel::Low);
    }

    #[test]
    fn test_agreement_thresholds() {
        assert_eq!(AgreementLevel::from_similarity(0.29), AgreementLevel::Low);
        assert_eq!(AgreementLevel::from_similarity(0.3), AgreementLevel::Medium);
        assert_eq!(AgreementLevel::from_similarity(0.69), AgreementLevel::Medium);
        assert_eq!(AgreementLevel::from_similarity(0.7), AgreementLevel::High);
    }

    #[test]
    fn test_coverage() {
        use CanonicalCategory::*;
        let llm = vec![
            f(DetectorKind::Llm, "A.java", LongMethod, None),
            f(DetectorKind::Llm, "A.java", GodClass, None),
            f(DetectorKind::Llm, "B.java", LongMethod, None),
        ];
        let statics = vec![f(DetectorKind::Static, "C.java", MagicNumber, Some((3, 3)))];
        let cov = Coverage::compute(&llm, &statics);
        assert_eq!(cov.total_files, 3);
        assert_eq!(cov.llm_files, 2);
        assert_eq!(cov.static_files, 1);
        assert_eq!(cov.shared_files, 0);
        assert!((cov.llm_coverage - 2.0 / 3.0).abs() < 1e-9);
        assert!((cov.llm_categories_per_file - 1.5).abs() < 1e-9);
        assert!((cov.static_categories_per_file - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_kappa_perfect_and_degenerate() {
        use CanonicalCategory::*;
        let findings = [
            f(DetectorKind::Llm, "A.java", LongMethod, Some((1, 2))),
            f(DetectorKind::Static, "A.java", LongMethod, Some((1, 2))),
            f(DetectorKind::Llm, "A.java", MagicNumber, Some((5, 5))),
            f(DetectorKind::Static, "A.java", MagicNumber, Some((5, 5))),
        ];
        let table = AgreementTable::build(findings.iter());
        assert_eq!(table.unit_count(), 3);
        assert!((table.kappa(LongMethod) - 1.0).abs() < 1e-9);
        // Nobody flagged GodClass anywhere: expected agreement is 1
        assert_eq!(table.kappa(GodClass), 0.0);
        assert_eq!(AgreementTable::build(std::iter::empty()).kappa(LongMethod), 0.0);
    }

    #[test]
    fn test_kappa_disagreement_is_negative() {
        use CanonicalCategory::*;
        let findings = [
            f(DetectorKind::Llm, "A.java", LongMethod, Some((1, 1))),
            f(DetectorKind::Static, "A.java", LongMethod, Some((2, 2))),
        ];
        let table = AgreementTable::build(findings.iter());
        assert_eq!(table.unit_count(), 2);
        assert!(table.kappa(LongMethod) < 0.0);
        assert_eq!(kappa_strength(-0.5), "worse than chance");
        assert_eq!(kappa_strength(0.65), "substantial");
    }

    #[test]
    fn test_overlapping_ranges_count_each_line_once() {
        use CanonicalCategory::*;
        let findings = [
            f(DetectorKind::Llm, "A.java", LongMethod, Some((1, 10))),
            f(DetectorKind::Llm, "A.java", LongMethod, Some((5, 12))),
            f(DetectorKind::Static, "A.java", LongMethod, Some((8, 20))),
            f(DetectorKind::Static, "A.java", MagicNumber, Some((30, 30))),
            f(DetectorKind::Llm, "A.java", GodClass, None),
            f(DetectorKind::Static, "B.java", LongMethod, Some((1, 4))),
        ];
        let table = AgreementTable::build(findings.iter());
        // A.java lines 1-20 and 30, its whole-file unit, B.java lines 1-4
        assert_eq!(table.unit_count(), 20 + 1 + 1 + 4);

        // LongMethod: both on 8-12, llm only on 1-7, static only on 13-20 and B 1-4
        let (n, both, llm, stat) = (26.0, 5.0, 7.0, 12.0);
        let observed = (both + (n - both - llm - stat)) / n;
        let p_llm = (both + llm) / n;
        let p_static = (both + stat) / n;
        let expected = p_llm * p_static + (1.0 - p_llm) * (1.0 - p_static);
        let kappa = (observed - expected) / (1.0 - expected);
        assert!((table.kappa(LongMethod) - kappa).abs() < 1e-9);
    }

    #[test]
    fn test_huge_ranges_stay_cheap() {
        use CanonicalCategory::*;
        let findings = [
            f(DetectorKind::Llm, "A.java", LongMethod, Some((1, 3_000_000))),
            f(DetectorKind::Static, "A.java", LongMethod, Some((1, u32::MAX))),
        ];
        let started = std::time::Instant::now();
        let table = AgreementTable::build(findings.iter());
        assert_eq!(table.unit_count(), u64::from(u32::MAX));
        assert!(table.kappa(LongMethod).is_finite());
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }
}
