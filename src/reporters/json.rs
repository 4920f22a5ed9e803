//! JSON reporter
//!
//! Outputs the full ComparisonResult as pretty-printed JSON.
//! Ratios stay in `[0, 1]` for machine consumption.

use crate::compare::ComparisonResult;
use anyhow::Result;

/// Render comparison as JSON
pub fn render(result: &ComparisonResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}
