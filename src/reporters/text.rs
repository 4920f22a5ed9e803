//! Text (terminal) reporter with colors and formatting

use super::pct;
use crate::compare::{AgreementLevel, ComparisonResult, OverlapLevel};
use anyhow::Result;

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const YELLOW: &str = "\x1b[33m";

fn agreement_color(level: AgreementLevel) -> &'static str {
    match level {
        AgreementLevel::High => "\x1b[32m",   // Green
        AgreementLevel::Medium => "\x1b[33m", // Yellow
        AgreementLevel::Low => "\x1b[31m",    // Red
    }
}

fn overlap_color(level: Option<OverlapLevel>) -> &'static str {
    match level {
        Some(OverlapLevel::High) => "\x1b[32m",
        Some(OverlapLevel::Medium) => "\x1b[33m",
        Some(OverlapLevel::Low) => "\x1b[91m",
        None => "\x1b[90m",
    }
}

/// Render comparison as formatted terminal output
pub fn render(result: &ComparisonResult) -> Result<String> {
    let mut out = String::new();

    let color = agreement_color(result.agreement);
    out.push_str(&format!(
        "\n{BOLD}Smell comparison: {}{RESET}\n",
        result.repository
    ));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "LLM: {}  Static: {}  Union: {}  Matched: {}\n",
        result.llm_total, result.static_total, result.union, result.intersection
    ));
    out.push_str(&format!(
        "Similarity: {color}{BOLD}{}{RESET} ({} agreement)  LLM only: {}  Static only: {}\n",
        pct(result.similarity),
        result.agreement,
        pct(result.llm_exclusivity),
        pct(result.static_exclusivity)
    ));

    let c = &result.coverage;
    out.push_str(&format!(
        "Files: {} total, LLM {} ({}), static {} ({})\n\n",
        c.total_files,
        c.llm_files,
        pct(c.llm_coverage),
        c.static_files,
        pct(c.static_coverage)
    ));

    if result.categories.is_empty() {
        out.push_str(&format!("{DIM}No findings from either detector.{RESET}\n"));
    } else {
        out.push_str(&format!(
            "{BOLD}{:<20} {:>5} {:>7} {:>8} {:>11} {:>8} {:>8}{RESET}\n",
            "Category", "LLM", "Static", "Matched", "Similarity", "Overlap", "Kappa"
        ));
        for cat in &result.categories {
            let overlap = cat
                .overlap
                .map(|o| o.to_string())
                .unwrap_or_else(|| "-".into());
            out.push_str(&format!(
                "{:<20} {:>5} {:>7} {:>8} {:>11} {}{:>8}{RESET} {:>8.3}\n",
                cat.category.label(),
                cat.llm_total,
                cat.static_total,
                cat.matched,
                pct(cat.similarity),
                overlap_color(cat.overlap),
                overlap,
                cat.kappa
            ));
        }
    }

    if !result.unanalyzed_chunks.is_empty() {
        out.push_str(&format!(
            "\n{YELLOW}{} chunk(s) unanalyzed:{RESET}\n",
            result.unanalyzed_chunks.len()
        ));
        for u in &result.unanalyzed_chunks {
            out.push_str(&format!(
                "  {}#{} {DIM}(lines {}-{}){RESET} {}\n",
                u.file, u.chunk_index, u.start_line, u.end_line, u.failure_kind
            ));
        }
    }

    out.push('\n');
    Ok(out)
}
