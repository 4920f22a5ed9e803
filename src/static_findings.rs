//! Static analyzer findings input
//!
//! The static analyzer runs outside this tool; its output arrives as a JSON
//! file in one of three shapes:
//!
//! - Checkstyle, converted from XML:
//!   `{"code_smells": [{"file", "line", "severity", "source", "type", "message"}]}`
//! - SonarQube issues API:
//!   `{"issues": [{"rule", "component", "line" | "textRange", "severity", "type", "message"}]}`
//! - A bare array of [`RawFinding`] objects
//!
//! Paths are rewritten to repository-relative, `/`-separated keys so they
//! line up with the chunk paths used on the LLM side.

use crate::models::{DetectorKind, RawFinding, Severity};
use anyhow::{bail, Context, Result};
use serde_json::Value as JsonValue;
use std::path::Path;
use tracing::{debug, info, warn};

/// Load and convert a static findings file.
pub fn load_static_findings(path: &Path, repo_root: Option<&Path>) -> Result<Vec<RawFinding>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read static findings {}", path.display()))?;
    let findings = parse_static_findings(&content, repo_root)
        .with_context(|| format!("Failed to parse static findings {}", path.display()))?;
    info!(
        "Loaded {} static finding(s) from {}",
        findings.len(),
        path.display()
    );
    Ok(findings)
}

/// Convert static findings JSON in any supported shape.
pub fn parse_static_findings(json: &str, repo_root: Option<&Path>) -> Result<Vec<RawFinding>> {
    let value: JsonValue = serde_json::from_str(json).context("Invalid JSON")?;

    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        bail!("Static analyzer reported an error: {}", error);
    }

    let roots = root_prefixes(repo_root);

    if let Some(entries) = value.get("code_smells").and_then(|v| v.as_array()) {
        debug!("Reading {} Checkstyle entries", entries.len());
        return Ok(entries
            .iter()
            .filter_map(|e| checkstyle_finding(e, &roots))
            .collect());
    }

    if let Some(issues) = value.get("issues").and_then(|v| v.as_array()) {
        debug!("Reading {} SonarQube issues", issues.len());
        return Ok(issues
            .iter()
            .filter_map(|i| sonar_finding(i, &roots))
            .collect());
    }

    if value.is_array() {
        let mut findings: Vec<RawFinding> =
            serde_json::from_value(value).context("Invalid finding list")?;
        for f in &mut findings {
            f.detector = DetectorKind::Static;
            f.file = relativize(&f.file, &roots);
        }
        return Ok(findings);
    }

    bail!("Unrecognized static findings format: expected `code_smells`, `issues` or a list")
}

fn checkstyle_finding(entry: &JsonValue, roots: &[String]) -> Option<RawFinding> {
    let Some(file) = entry.get("file").and_then(|f| f.as_str()) else {
        warn!("Skipping Checkstyle entry without a file");
        return None;
    };
    let source_category = entry
        .get("source")
        .and_then(|s| s.as_str())
        .or_else(|| entry.get("type").and_then(|t| t.as_str()))
        .unwrap_or("Unknown")
        .to_string();
    let line = entry.get("line").and_then(line_number);

    Some(RawFinding {
        detector: DetectorKind::Static,
        source_category,
        file: relativize(file, roots),
        line_start: line,
        line_end: line,
        confidence: None,
        severity: entry
            .get("severity")
            .and_then(|s| s.as_str())
            .map(Severity::from_label),
        description: entry
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from),
    })
}

fn sonar_finding(issue: &JsonValue, roots: &[String]) -> Option<RawFinding> {
    if let Some(kind) = issue.get("type").and_then(|t| t.as_str()) {
        if kind != "CODE_SMELL" {
            return None;
        }
    }

    let rule = issue.get("rule")?.as_str()?;
    let component = issue.get("component")?.as_str()?;
    // `project-key:src/Foo.java`
    let file = component
        .split_once(':')
        .map(|(_, path)| path)
        .unwrap_or(component);

    let (line_start, line_end) = match issue.get("line").and_then(line_number) {
        Some(line) => (Some(line), Some(line)),
        None => match issue.get("textRange") {
            Some(range) => (
                range.get("startLine").and_then(line_number),
                range.get("endLine").and_then(line_number),
            ),
            None => (None, None),
        },
    };

    Some(RawFinding {
        detector: DetectorKind::Static,
        source_category: rule.to_string(),
        file: relativize(file, roots),
        line_start,
        line_end: line_end.or(line_start),
        confidence: None,
        severity: issue
            .get("severity")
            .and_then(|s| s.as_str())
            .map(Severity::from_label),
        description: issue
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from),
    })
}

/// A positive line number, given as a JSON number or numeric string.
fn line_number(value: &JsonValue) -> Option<u32> {
    let line = match value {
        JsonValue::Number(n) => n.as_u64()?,
        JsonValue::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    u32::try_from(line).ok().filter(|l| *l >= 1)
}

fn root_prefixes(repo_root: Option<&Path>) -> Vec<String> {
    let Some(root) = repo_root else {
        return Vec::new();
    };
    let mut prefixes = vec![slashes(&root.to_string_lossy())];
    if let Ok(canonical) = root.canonicalize() {
        prefixes.push(slashes(&canonical.to_string_lossy()));
    }
    prefixes
        .into_iter()
        .map(|p| p.trim_end_matches('/').to_string())
        .filter(|p| !p.is_empty() && p != ".")
        .collect()
}

fn slashes(path: &str) -> String {
    path.replace('\\', "/")
}

/// Repository-relative `/`-separated form of a reported path.
pub fn relativize(file: &str, roots: &[String]) -> String {
    let file = slashes(file);
    let stripped = roots
        .iter()
        .find_map(|root| {
            file.strip_prefix(root.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
        })
        .unwrap_or(&file);
    stripped.trim_start_matches("./").to_string()
}
