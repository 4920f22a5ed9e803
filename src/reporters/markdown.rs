//! Markdown reporter for GitHub-flavored Markdown output
//!
//! One section per study question: how much the detectors find and agree
//! on overall, how widely each covers the repository, and how they agree
//! per category. Ends with a short written conclusion.

use super::pct;
use crate::compare::{kappa_strength, ComparisonResult};
use crate::models::NormalizedFinding;
use anyhow::Result;
use chrono::Local;

/// Maximum exclusive findings listed per detector
const MAX_LISTED_FINDINGS: usize = 20;

/// Render comparison as GitHub-flavored Markdown
pub fn render(result: &ComparisonResult) -> Result<String> {
    let mut md = String::new();

    md.push_str(&render_header(result));
    md.push('\n');

    md.push_str(&render_totals(result));
    md.push('\n');

    md.push_str(&render_coverage(result));
    md.push('\n');

    md.push_str(&render_categories(result));
    md.push('\n');

    md.push_str(&render_exclusive(result));
    md.push('\n');

    if !result.unanalyzed_chunks.is_empty() {
        md.push_str(&render_unanalyzed(result));
        md.push('\n');
    }

    md.push_str(&render_conclusions(result));
    Ok(md)
}

fn render_header(result: &ComparisonResult) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!(
        "# Code Smell Comparison: {}\n\nLLM vs static analysis. Generated: {}\n",
        result.repository, timestamp
    )
}

fn render_totals(result: &ComparisonResult) -> String {
    format!(
        r#"## Detection Totals

| Metric | Value |
|--------|-------|
| LLM findings | {} |
| Static findings | {} |
| Union | {} |
| Intersection | {} |
| Similarity | {} |
| LLM exclusivity | {} |
| Static exclusivity | {} |
| Agreement | {} |
"#,
        result.llm_total,
        result.static_total,
        result.union,
        result.intersection,
        pct(result.similarity),
        pct(result.llm_exclusivity),
        pct(result.static_exclusivity),
        result.agreement
    )
}

fn render_coverage(result: &ComparisonResult) -> String {
    let c = &result.coverage;
    format!(
        r#"## Coverage

Files with at least one finding: **{}** ({} reported by both)

| Detector | Files | Coverage | Categories per file |
|----------|-------|----------|---------------------|
| LLM | {} | {} | {:.2} |
| Static | {} | {} | {:.2} |
"#,
        c.total_files,
        c.shared_files,
        c.llm_files,
        pct(c.llm_coverage),
        c.llm_categories_per_file,
        c.static_files,
        pct(c.static_coverage),
        c.static_categories_per_file
    )
}

fn render_categories(result: &ComparisonResult) -> String {
    let mut md = String::from("## Per-Category Agreement\n\n");
    if result.categories.is_empty() {
        md.push_str("No findings from either detector.\n");
        return md;
    }

    md.push_str(
        "| Category | LLM | Static | Matched | LLM only | Static only | Similarity | Overlap | Kappa |\n",
    );
    md.push_str(
        "|----------|-----|--------|---------|----------|-------------|------------|---------|-------|\n",
    );
    for c in &result.categories {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} | {:.4} |\n",
            c.category,
            c.llm_total,
            c.static_total,
            c.matched,
            c.llm_exclusive,
            c.static_exclusive,
            pct(c.similarity),
            c.overlap.map(|o| o.to_string()).unwrap_or_else(|| "-".into()),
            c.kappa
        ));
    }
    md
}

fn location(f: &NormalizedFinding) -> String {
    match f.range() {
        Some((start, end)) if start == end => format!("{}:{}", f.file, start),
        Some((start, end)) => format!("{}:{}-{}", f.file, start, end),
        None => f.file.clone(),
    }
}

fn render_finding_list(md: &mut String, title: &str, findings: &[NormalizedFinding]) {
    md.push_str(&format!("### {} ({})\n\n", title, findings.len()));
    if findings.is_empty() {
        md.push_str("None.\n\n");
        return;
    }
    for f in findings.iter().take(MAX_LISTED_FINDINGS) {
        md.push_str(&format!("- **{}** `{}`\n", f.canonical_category, location(f)));
    }
    if findings.len() > MAX_LISTED_FINDINGS {
        md.push_str(&format!(
            "- ... and {} more\n",
            findings.len() - MAX_LISTED_FINDINGS
        ));
    }
    md.push('\n');
}

fn render_exclusive(result: &ComparisonResult) -> String {
    let mut md = String::from("## Exclusive Findings\n\n");
    render_finding_list(&mut md, "LLM only", &result.llm_only);
    render_finding_list(&mut md, "Static only", &result.static_only);
    md
}

fn render_unanalyzed(result: &ComparisonResult) -> String {
    let mut md = format!(
        "## Unanalyzed Chunks ({})\n\nThese chunks have no validated LLM reply and are not counted as clean.\n\n",
        result.unanalyzed_chunks.len()
    );
    md.push_str("| File | Chunk | Lines | Failure |\n");
    md.push_str("|------|-------|-------|---------|\n");
    for u in &result.unanalyzed_chunks {
        md.push_str(&format!(
            "| {} | {} | {}-{} | {}: {} |\n",
            u.file,
            u.chunk_index,
            u.start_line,
            u.end_line,
            u.failure_kind,
            u.detail.replace('|', "\\|")
        ));
    }
    md
}

fn render_conclusions(result: &ComparisonResult) -> String {
    let mut md = String::from("## Conclusions\n\n");

    let volume = if result.llm_total > result.static_total {
        format!(
            "The LLM reported more smells ({}) than the static analyzer ({}).",
            result.llm_total, result.static_total
        )
    } else if result.static_total > result.llm_total {
        format!(
            "The static analyzer reported more smells ({}) than the LLM ({}).",
            result.static_total, result.llm_total
        )
    } else {
        format!(
            "Both detectors reported the same number of smells ({}).",
            result.llm_total
        )
    };
    md.push_str(&format!(
        "{} Similarity was {}, a {} level of agreement.\n\n",
        volume,
        pct(result.similarity),
        result.agreement
    ));

    let c = &result.coverage;
    let breadth = if c.llm_coverage > c.static_coverage {
        format!(
            "The LLM covered more files ({} against {}).",
            pct(c.llm_coverage),
            pct(c.static_coverage)
        )
    } else if c.static_coverage > c.llm_coverage {
        format!(
            "The static analyzer covered more files ({} against {}).",
            pct(c.static_coverage),
            pct(c.llm_coverage)
        )
    } else {
        format!("Both detectors covered {} of the files.", pct(c.llm_coverage))
    };
    md.push_str(&format!(
        "{} On average the LLM flagged {:.2} distinct categories per file, the static analyzer {:.2}.\n\n",
        breadth, c.llm_categories_per_file, c.static_categories_per_file
    ));

    if let Some(best) = result.best_kappa() {
        md.push_str(&format!(
            "The strongest per-category agreement was on **{}** (kappa {:.4}, {}).\n",
            best.category,
            best.kappa,
            kappa_strength(best.kappa)
        ));
    }

    if !result.unanalyzed_chunks.is_empty() {
        md.push_str(&format!(
            "\n{} chunk(s) could not be analyzed; LLM totals are a lower bound.\n",
            result.unanalyzed_chunks.len()
        ));
    }
    md
}
