//! The four-field reply contract
//!
//! A reply is accepted only if it is a single JSON object with exactly
//! `smells_detectados`, `descricao`, `localizacao` and `confianca`, with the
//! right types and confidence levels from the closed set. A reply that is
//! nothing but a fenced code block is unwrapped once and re-checked; any
//! other wrapping is a contract violation.

use crate::models::{Confidence, DetectorKind, RawFinding};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::warn;

/// Validated LLM reply.
///
/// Maps are ordered so the persisted form is byte-stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmellReport {
    #[serde(rename = "smells_detectados")]
    pub smells: Vec<String>,
    #[serde(rename = "descricao")]
    pub descriptions: BTreeMap<String, String>,
    #[serde(rename = "localizacao")]
    pub locations: BTreeMap<String, String>,
    #[serde(rename = "confianca")]
    pub confidence: BTreeMap<String, String>,
}

/// Ways a reply can break the contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
    #[error("reply is not a single JSON value: {0}")]
    NotJson(String),

    #[error("reply does not match the four-field shape: {0}")]
    Shape(String),

    #[error("invalid confidence level '{value}' for smell '{smell}'")]
    InvalidConfidence { smell: String, value: String },
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)\A\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*\z")
            .expect("fence regex is valid")
    })
}

/// Unwrap a reply that consists solely of one fenced code block.
pub fn strip_code_fences(reply: &str) -> Option<&str> {
    fence_regex()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Parse and validate a raw reply.
///
/// The reply is tried as-is first; if that fails and the reply is a fenced
/// block, the fence is stripped once and the inner text is tried. The first
/// error is reported when both fail.
pub fn parse_reply(reply: &str) -> Result<SmellReport, ContractViolation> {
    match parse_strict(reply) {
        Ok(report) => Ok(report),
        Err(first) => match strip_code_fences(reply) {
            Some(inner) => parse_strict(inner),
            None => Err(first),
        },
    }
}

fn parse_strict(text: &str) -> Result<SmellReport, ContractViolation> {
    let value: serde_json::Value = serde_json::from_str(text.trim())
        .map_err(|e| ContractViolation::NotJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ContractViolation::Shape("top-level value is not an object".into()));
    }
    let report: SmellReport =
        serde_json::from_value(value).map_err(|e| ContractViolation::Shape(e.to_string()))?;

    for (smell, level) in &report.confidence {
        if Confidence::parse(level).is_none() {
            return Err(ContractViolation::InvalidConfidence {
                smell: smell.clone(),
                value: level.clone(),
            });
        }
    }
    Ok(report)
}

/// Parse a `"start-end"` range.
///
/// Tolerates a leading `file:` prefix, whitespace, an en/em dash and a bare
/// `N` (meaning `N-N`). Anything else, zero lines or a reversed range yields
/// `None`.
pub fn parse_line_range(text: &str) -> Option<(u32, u32)> {
    let text = text.trim();
    let text = match text.rfind(':') {
        Some(idx) => &text[idx + 1..],
        None => text,
    };
    let normalized = text.replace(&['\u{2013}', '\u{2014}'][..], "-");
    let mut parts = normalized.splitn(2, '-');
    let start = parse_line(parts.next()?)?;
    let end = match parts.next() {
        Some(end) => parse_line(end)?,
        None => start,
    };
    (start >= 1 && start <= end).then_some((start, end))
}

fn parse_line(part: &str) -> Option<u32> {
    let part = part.trim();
    let part = part
        .strip_prefix('L')
        .or_else(|| part.strip_prefix('l'))
        .unwrap_or(part);
    part.trim().parse().ok()
}

impl SmellReport {
    /// An empty (no smells) report
    pub fn empty() -> Self {
        Self {
            smells: Vec::new(),
            descriptions: BTreeMap::new(),
            locations: BTreeMap::new(),
            confidence: BTreeMap::new(),
        }
    }

    /// One raw finding per listed smell.
    ///
    /// Reported lines are relative to the chunk spanning
    /// `chunk_start_line..=chunk_end_line` and are shifted to file lines. A
    /// malformed range, or one starting past the chunk, leaves the finding
    /// without a location; an end past the chunk is clamped to it.
    pub fn to_raw_findings(
        &self,
        file: &str,
        chunk_start_line: u32,
        chunk_end_line: u32,
    ) -> Vec<RawFinding> {
        self.smells
            .iter()
            .map(|smell| {
                let range = self.locations.get(smell).and_then(|loc| {
                    let located = parse_line_range(loc).and_then(|range| {
                        shift_into_chunk(range, chunk_start_line, chunk_end_line)
                    });
                    if located.is_none() {
                        warn!(
                            "Unusable location '{}' for '{}' in {}, keeping finding without location",
                            loc, smell, file
                        );
                    }
                    located
                });
                RawFinding {
                    detector: DetectorKind::Llm,
                    source_category: smell.clone(),
                    file: file.to_string(),
                    line_start: range.map(|(s, _)| s),
                    line_end: range.map(|(_, e)| e),
                    confidence: self.confidence.get(smell).and_then(|c| Confidence::parse(c)),
                    severity: None,
                    description: self.descriptions.get(smell).cloned(),
                }
            })
            .collect()
    }
}

/// Chunk-relative `(start, end)` to file lines within the chunk bounds.
fn shift_into_chunk(
    (start, end): (u32, u32),
    chunk_start_line: u32,
    chunk_end_line: u32,
) -> Option<(u32, u32)> {
    let shift = chunk_start_line.saturating_sub(1);
    let start = start.checked_add(shift)?;
    if start > chunk_end_line {
        return None;
    }
    let end = end.saturating_add(shift).min(chunk_end_line);
    Some((start, end))
}
