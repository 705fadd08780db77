//! Pattern definitions for quantity extraction
//!
//! The document-specific vocabulary (unit labels, the table header, known
//! product names) lives here as data so it can be adjusted per supplier
//! without touching the strategies themselves.

use crate::QtyError;
use once_cell::sync::Lazy;
use regex::Regex;

/// A 13-digit barcode token not embedded in a longer digit run.
pub(crate) static BARCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9]{13}\b").unwrap());

/// A decimal with exactly two fractional digits, either separator.
pub(crate) static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9]+[.,][0-9]{2}\b").unwrap());

const NUMBER: &str = r"\b([0-9]+[.,][0-9]{2})";

/// Vocabulary of a document family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    /// Quantity unit labels printed after the Kol. Jmj value (default: `Tabs`)
    pub unit_tokens: Vec<String>,
    /// Table header tokens, in column order
    pub header_tokens: Vec<String>,
    /// Product names that pin a quantity on their own line
    pub anchors: Vec<String>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            unit_tokens: vec!["Tabs".to_string()],
            header_tokens: ["Rb", "Sifra", "Naziv", "Kol.", "Jmj", "VPC"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            anchors: Vec::new(),
        }
    }
}

/// Configuration for quantity extraction
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Characters of context taken on each side of a barcode (default: 300)
    pub window_radius: usize,
    /// Nearest-candidate search limit after the barcode (default: 200)
    pub nearest_max_distance: usize,
    /// Unanchored search band before the barcode (default: 50)
    pub unanchored_before: usize,
    /// Unanchored search band after the barcode (default: 100)
    pub unanchored_after: usize,
    /// Run the remaining strategies after a match and report disagreements
    pub report_shadowed: bool,
    pub patterns: PatternSet,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            window_radius: 300,
            nearest_max_distance: 200,
            unanchored_before: 50,
            unanchored_after: 100,
            report_shadowed: false,
            patterns: PatternSet::default(),
        }
    }
}

/// Regexes built from a [`PatternSet`]
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    /// `number <ws incl. newlines> unit`
    pub loose_quantity: Option<Regex>,
    /// `number <spaces or tabs> unit`
    pub tight_quantity: Option<Regex>,
    pub header: Option<Regex>,
    pub anchors: Vec<(String, Regex)>,
}

impl CompiledPatterns {
    pub fn compile(set: &PatternSet) -> Result<Self, QtyError> {
        let units = unit_alternation(&set.unit_tokens);

        let (loose_quantity, tight_quantity) = match &units {
            Some(units) => (
                Some(Regex::new(&format!(r"{}\s+{}", NUMBER, units))?),
                Some(Regex::new(&format!(r"{}[ \t]*{}", NUMBER, units))?),
            ),
            None => (None, None),
        };

        let header = header_pattern(&set.header_tokens)
            .map(|p| Regex::new(&p))
            .transpose()?;

        let mut anchors = Vec::new();
        if let Some(units) = &units {
            for name in set.anchors.iter().filter(|a| !a.trim().is_empty()) {
                let re = Regex::new(&format!(
                    r"{}[^\n]*?[ \t]{}[ \t]+{}",
                    regex::escape(name.trim()),
                    NUMBER,
                    units
                ))?;
                anchors.push((name.trim().to_string(), re));
            }
        }

        Ok(Self {
            loose_quantity,
            tight_quantity,
            header,
            anchors,
        })
    }
}

fn unit_alternation(tokens: &[String]) -> Option<String> {
    let escaped: Vec<String> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            // `\b` after a trailing `.` would demand a word character next
            let word_end = t.chars().last().is_some_and(|c| c.is_alphanumeric() || c == '_');
            if word_end {
                format!(r"{}\b", regex::escape(t))
            } else {
                regex::escape(t)
            }
        })
        .collect();

    if escaped.is_empty() {
        None
    } else {
        Some(format!("(?:{})", escaped.join("|")))
    }
}

/// Header tokens joined by whitespace. A token ending in `.` may be glued to
/// the next one (`Kol.Jmj`).
fn header_pattern(tokens: &[String]) -> Option<String> {
    let tokens: Vec<&str> = tokens
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let (first, rest) = tokens.split_first()?;
    let mut pattern = regex::escape(first);
    let mut prev = *first;
    for token in rest {
        pattern.push_str(if prev.ends_with('.') { r"\s*" } else { r"\s+" });
        pattern.push_str(&regex::escape(token));
        prev = token;
    }
    Some(pattern)
}
