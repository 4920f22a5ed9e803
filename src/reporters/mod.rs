//! Output reporters for comparison results
//!
//! Supports multiple output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON (`comparison.json`)
//! - `markdown` - GitHub-flavored Markdown with tables and conclusions

mod json;
mod markdown;
mod text;

use crate::compare::ComparisonResult;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(anyhow!(
                "Unknown format '{}'. Valid formats: text, json, markdown",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Render a comparison in a format given by name (`--format`)
pub fn report(result: &ComparisonResult, format: &str) -> Result<String> {
    let fmt = OutputFormat::from_str(format)?;
    report_with_format(result, fmt)
}

/// Render a comparison using an OutputFormat enum
pub fn report_with_format(result: &ComparisonResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(result),
        OutputFormat::Json => json::render(result),
        OutputFormat::Markdown => markdown::render(result),
    }
}

/// Get the recommended file name for a format
pub fn file_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Text => "comparison.txt",
        OutputFormat::Json => "comparison.json",
        OutputFormat::Markdown => "comparison.md",
    }
}

/// Ratio as a percentage with two decimals
pub(crate) fn pct(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::compare::compare;
    use crate::models::{CanonicalCategory, DetectorKind, NormalizedFinding, UnanalyzedChunk};

    fn finding(
        detector: DetectorKind,
        category: CanonicalCategory,
        range: Option<(u32, u32)>,
    ) -> NormalizedFinding {
        NormalizedFinding {
            file: "src/Foo.java".into(),
            canonical_category: category,
            line_start: range.map(|r| r.0),
            line_end: range.map(|r| r.1),
            detector,
        }
    }

    /// Create a small comparison for testing
    pub(crate) fn test_result() -> ComparisonResult {
        let llm = vec![finding(
            DetectorKind::Llm,
            CanonicalCategory::LongMethod,
            Some((10, 40)),
        )];
        let statics = vec![
            finding(
                DetectorKind::Static,
                CanonicalCategory::LongMethod,
                Some((12, 12)),
            ),
            finding(
                DetectorKind::Static,
                CanonicalCategory::MagicNumber,
                Some((15, 15)),
            ),
        ];
        compare(&llm, &statics)
            .with_repository("demo")
            .with_unanalyzed(vec![UnanalyzedChunk {
                file: "src/Bar.java".into(),
                chunk_index: 2,
                start_line: 301,
                end_line: 420,
                failure_kind: "ContractViolation".into(),
                detail: "reply is not a single JSON value".into(),
            }])
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str("md").unwrap(),
            OutputFormat::Markdown
        );
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_pct() {
        assert_eq!(pct(0.5), "50.00%");
        assert_eq!(pct(1.0), "100.00%");
        assert_eq!(pct(0.0), "0.00%");
    }

    #[test]
    fn test_every_format_renders() {
        let result = test_result();
        for format in [OutputFormat::Text, OutputFormat::Json, OutputFormat::Markdown] {
            let out = report_with_format(&result, format).unwrap();
            assert!(out.contains("demo"), "{format} output names the repository");
        }
        assert_eq!(file_name(OutputFormat::Json), "comparison.json");
    }

    #[test]
    fn test_report_by_format_name() {
        let result = test_result();
        let md = report(&result, "md").unwrap();
        assert_eq!(md, report_with_format(&result, OutputFormat::Markdown).unwrap());
        let json: serde_json::Value =
            serde_json::from_str(&report(&result, "JSON").unwrap()).unwrap();
        assert_eq!(json["repository"], "demo");

        let err = report(&result, "sarif").unwrap_err();
        assert!(err.to_string().contains("Unknown format 'sarif'"));
    }
}
