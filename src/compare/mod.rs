//! Comparison engine
//!
//! Takes the normalized findings of both detectors for one repository and
//! partitions them into matched pairs, LLM-exclusive and static-exclusive
//! findings. Everything downstream (similarity, exclusivity, per-category
//! overlap, coverage, kappa) is derived from that partition.
//!
//! `compare` is pure and never fails: empty inputs give a well-defined
//! result (both empty means 100% similarity, one empty means 0%).

mod matching;
mod metrics;

pub use matching::max_matching;
pub use metrics::{kappa_strength, ratio, AgreementLevel, AgreementTable, Coverage, OverlapLevel};

use crate::models::{CanonicalCategory, NormalizedFinding, UnanalyzedChunk};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// An LLM finding and the static finding it was matched with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub llm: NormalizedFinding,
    #[serde(rename = "static")]
    pub static_finding: NormalizedFinding,
}

/// Metrics restricted to one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: CanonicalCategory,
    pub llm_total: usize,
    pub static_total: usize,
    pub matched: usize,
    pub llm_exclusive: usize,
    pub static_exclusive: usize,
    pub union: usize,
    /// `matched / union`
    pub similarity: f64,
    pub llm_exclusivity: f64,
    pub static_exclusivity: f64,
    /// `None` when the category has no findings at all
    pub overlap: Option<OverlapLevel>,
    /// Cohen's kappa over detection units
    pub kappa: f64,
}

/// Agreement between the two detectors on one repository.
///
/// Ratios are stored in `[0, 1]`; reports render them as percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub repository: String,
    /// Distinct LLM findings (exact duplicates collapsed)
    pub llm_total: usize,
    pub static_total: usize,
    pub union: usize,
    pub intersection: usize,
    pub llm_exclusive: usize,
    pub static_exclusive: usize,
    /// `intersection / union`
    pub similarity: f64,
    pub llm_exclusivity: f64,
    pub static_exclusivity: f64,
    pub agreement: AgreementLevel,
    /// Categories with at least one finding, in taxonomy order
    pub categories: Vec<CategoryBreakdown>,
    pub coverage: Coverage,
    pub pairs: Vec<MatchedPair>,
    pub llm_only: Vec<NormalizedFinding>,
    pub static_only: Vec<NormalizedFinding>,
    /// Chunks the LLM never produced a valid reply for
    pub unanalyzed_chunks: Vec<UnanalyzedChunk>,
}

impl ComparisonResult {
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    pub fn with_unanalyzed(mut self, mut unanalyzed: Vec<UnanalyzedChunk>) -> Self {
        unanalyzed.sort();
        self.unanalyzed_chunks = unanalyzed;
        self
    }

    pub fn category(&self, category: CanonicalCategory) -> Option<&CategoryBreakdown> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Category with the highest kappa, if any category was reported
    pub fn best_kappa(&self) -> Option<&CategoryBreakdown> {
        self.categories
            .iter()
            .max_by(|a, b| a.kappa.total_cmp(&b.kappa).then(b.category.cmp(&a.category)))
    }
}

/// Drop exact duplicates, keeping first occurrences in input order.
fn dedup(findings: &[NormalizedFinding]) -> Vec<NormalizedFinding> {
    let mut seen = HashSet::new();
    findings
        .iter()
        .filter(|f| seen.insert(*f))
        .cloned()
        .collect()
}

type Group<'a> = (Vec<&'a NormalizedFinding>, Vec<&'a NormalizedFinding>);

/// Compare LLM findings against static findings.
pub fn compare(llm: &[NormalizedFinding], statics: &[NormalizedFinding]) -> ComparisonResult {
    let llm = dedup(llm);
    let statics = dedup(statics);

    let mut groups: BTreeMap<(&str, CanonicalCategory), Group<'_>> = BTreeMap::new();
    for f in &llm {
        groups
            .entry((f.file.as_str(), f.canonical_category))
            .or_default()
            .0
            .push(f);
    }
    for f in &statics {
        groups
            .entry((f.file.as_str(), f.canonical_category))
            .or_default()
            .1
            .push(f);
    }

    let mut pairs = Vec::new();
    let mut llm_only = Vec::new();
    let mut static_only = Vec::new();

    for ((file, category), (left, right)) in &groups {
        let matched = max_matching(left, right);
        debug!(
            "{} / {:?}: {} llm, {} static, {} matched",
            file,
            category,
            left.len(),
            right.len(),
            matched.len()
        );

        let mut left_used = vec![false; left.len()];
        let mut right_used = vec![false; right.len()];
        for &(i, j) in &matched {
            left_used[i] = true;
            right_used[j] = true;
            pairs.push(MatchedPair {
                llm: left[i].clone(),
                static_finding: right[j].clone(),
            });
        }
        llm_only.extend(
            left.iter()
                .zip(&left_used)
                .filter(|(_, used)| !**used)
                .map(|(f, _)| (*f).clone()),
        );
        static_only.extend(
            right
                .iter()
                .zip(&right_used)
                .filter(|(_, used)| !**used)
                .map(|(f, _)| (*f).clone()),
        );
    }

    let union = pairs.len() + llm_only.len() + static_only.len();
    let similarity = if union == 0 {
        1.0
    } else {
        ratio(pairs.len(), union)
    };

    let agreement_table = AgreementTable::build(llm.iter().chain(statics.iter()));
    let categories = CanonicalCategory::ALL
        .into_iter()
        .filter_map(|category| {
            breakdown(
                category,
                &llm,
                &statics,
                &pairs,
                &llm_only,
                &static_only,
                &agreement_table,
            )
        })
        .collect();

    ComparisonResult {
        repository: String::new(),
        llm_total: llm.len(),
        static_total: statics.len(),
        union,
        intersection: pairs.len(),
        llm_exclusive: llm_only.len(),
        static_exclusive: static_only.len(),
        similarity,
        llm_exclusivity: ratio(llm_only.len(), union),
        static_exclusivity: ratio(static_only.len(), union),
        agreement: AgreementLevel::from_similarity(similarity),
        categories,
        coverage: Coverage::compute(&llm, &statics),
        pairs,
        llm_only,
        static_only,
        unanalyzed_chunks: Vec::new(),
    }
}

fn breakdown(
    category: CanonicalCategory,
    llm: &[NormalizedFinding],
    statics: &[NormalizedFinding],
    pairs: &[MatchedPair],
    llm_only: &[NormalizedFinding],
    static_only: &[NormalizedFinding],
    agreement_table: &AgreementTable,
) -> Option<CategoryBreakdown> {
    let in_category = |f: &&NormalizedFinding| f.canonical_category == category;

    let llm_total = llm.iter().filter(in_category).count();
    let static_total = statics.iter().filter(in_category).count();
    if llm_total == 0 && static_total == 0 {
        return None;
    }

    let matched = pairs
        .iter()
        .filter(|p| p.llm.canonical_category == category)
        .count();
    let llm_exclusive = llm_only.iter().filter(in_category).count();
    let static_exclusive = static_only.iter().filter(in_category).count();
    let union = matched + llm_exclusive + static_exclusive;
    let similarity = ratio(matched, union);

    Some(CategoryBreakdown {
        category,
        llm_total,
        static_total,
        matched,
        llm_exclusive,
        static_exclusive,
        union,
        similarity,
        llm_exclusivity: ratio(llm_exclusive, union),
        static_exclusivity: ratio(static_exclusive, union),
        overlap: (union > 0).then(|| OverlapLevel::classify(similarity)),
        kappa: agreement_table.kappa(category),
    })
}
