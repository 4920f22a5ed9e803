//! Finding normalization onto the shared taxonomy
//!
//! Both detectors speak different vocabularies: the LLM names smells in free
//! text ("Métodos muito longos", "GodObject"), the static analyzer reports
//! rule ids (`java:S138`, `...sizes.MethodLengthCheck`). The [`Normalizer`]
//! maps either onto a [`CanonicalCategory`]:
//!
//! 1. Static ids are looked up in an exact, case-insensitive rule table.
//! 2. Anything else is matched against the alias table by substring, in
//!    category priority order.
//! 3. No match yields [`CanonicalCategory::Other`] with a warning.
//!
//! Normalization is total: every raw finding produces exactly one
//! normalized finding, with location and detector carried through.

mod aliases;

pub use aliases::{ALIASES, RULES};

use crate::config::TaxonomyConfig;
use crate::models::{CanonicalCategory, DetectorKind, NormalizedFinding, RawFinding};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Maps raw detector categories onto [`CanonicalCategory`]
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Category priority order, each with normalized alias phrases
    aliases: Vec<(CanonicalCategory, Vec<String>)>,
    /// Lowercase rule key -> category
    rules: HashMap<String, CanonicalCategory>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Normalizer with the built-in tables only
    pub fn new() -> Self {
        let aliases = ALIASES
            .iter()
            .map(|(category, phrases)| {
                (*category, phrases.iter().map(|p| normalize_phrase(p)).collect())
            })
            .collect();

        let mut normalizer = Self {
            aliases,
            rules: HashMap::new(),
        };
        for (rule, category) in RULES {
            normalizer.add_rule(rule, *category);
        }
        normalizer
    }

    /// Built-in tables extended with configured aliases and rules.
    ///
    /// Extra aliases are appended to their category's entry, so priority
    /// between categories does not change. Unknown category names are
    /// skipped with a warning.
    pub fn from_config(taxonomy: &TaxonomyConfig) -> Self {
        let mut normalizer = Self::new();

        for (name, phrases) in &taxonomy.aliases {
            let Some(category) = CanonicalCategory::from_name(name) else {
                warn!("Ignoring aliases for unknown category '{}'", name);
                continue;
            };
            normalizer.add_aliases(category, phrases);
        }

        for (rule, name) in &taxonomy.rules {
            match CanonicalCategory::from_name(name) {
                Some(category) => normalizer.add_rule(rule, category),
                None => warn!("Ignoring rule '{}': unknown category '{}'", rule, name),
            }
        }
        normalizer
    }

    fn add_aliases(&mut self, category: CanonicalCategory, phrases: &[String]) {
        let normalized = phrases
            .iter()
            .map(|p| normalize_phrase(p))
            .filter(|p| !p.is_empty());
        match self.aliases.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => existing.extend(normalized),
            None => self.aliases.push((category, normalized.collect())),
        }
    }

    fn add_rule(&mut self, rule: &str, category: CanonicalCategory) {
        let key = rule_key(rule);
        if let Some((_, bare)) = key.rsplit_once(':') {
            self.rules.entry(bare.to_string()).or_insert(category);
        }
        self.rules.insert(key, category);
    }

    /// Exact rule-table lookup for a static rule id.
    pub fn lookup_rule(&self, rule: &str) -> Option<CanonicalCategory> {
        let key = rule_key(rule);
        if let Some(category) = self.rules.get(&key) {
            return Some(*category);
        }

        // `squid:S138` -> `s138`
        if let Some((_, bare)) = key.rsplit_once(':') {
            if let Some(category) = self.rules.get(bare) {
                return Some(*category);
            }
        }

        // `com.puppycrawl...sizes.MethodLengthCheck` -> `methodlength`
        let short = key.rsplit('.').next().unwrap_or(&key);
        let short = short.strip_suffix("check").unwrap_or(short);
        self.rules.get(short).copied()
    }

    /// First category (in priority order) with an alias contained in `text`.
    pub fn match_alias(&self, text: &str) -> Option<CanonicalCategory> {
        let phrase = normalize_phrase(text);
        if phrase.is_empty() {
            return None;
        }
        self.aliases
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| phrase.contains(a.as_str())))
            .map(|(category, _)| *category)
    }

    /// Category for a detector-specific name. Never fails.
    pub fn categorize(&self, detector: DetectorKind, source_category: &str) -> CanonicalCategory {
        let found = match detector {
            DetectorKind::Static => self
                .lookup_rule(source_category)
                .or_else(|| self.match_alias(source_category)),
            DetectorKind::Llm => self.match_alias(source_category),
        };

        match found {
            Some(category) => {
                debug!("{} '{}' -> {:?}", detector, source_category, category);
                category
            }
            None => {
                warn!(
                    "No category for {} finding '{}', mapping to Other",
                    detector, source_category
                );
                CanonicalCategory::Other
            }
        }
    }

    pub fn normalize(&self, raw: &RawFinding) -> NormalizedFinding {
        NormalizedFinding {
            file: raw.file.clone(),
            canonical_category: self.categorize(raw.detector, &raw.source_category),
            line_start: raw.line_start,
            line_end: raw.line_end,
            detector: raw.detector,
        }
    }

    pub fn normalize_all(&self, raws: &[RawFinding]) -> Vec<NormalizedFinding> {
        raws.iter().map(|r| self.normalize(r)).collect()
    }
}

fn rule_key(rule: &str) -> String {
    rule.trim().to_lowercase()
}

/// Lowercase, split CamelCase and turn `_`/`-` into single spaces.
fn normalize_phrase(text: &str) -> String {
    let mut spaced = String::with_capacity(text.len() + 8);
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        let is_separator = ch == '_' || ch == '-' || ch.is_whitespace();
        if is_separator {
            spaced.push(' ');
        } else {
            if ch.is_uppercase() && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit()) {
                spaced.push(' ');
            }
            spaced.push(ch);
        }
        prev = Some(ch);
    }
    spaced
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
