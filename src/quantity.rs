//! Barcode to quantity extraction
//!
//! Walks the pages of a document in order, finds every 13-digit barcode and
//! resolves its Kol. Jmj quantity through the strategy chain. The first
//! successful resolution of a barcode wins; later occurrences are skipped.

use crate::normalize::{normalize_quantity, to_period_decimal};
use crate::pages::PageSource;
use crate::patterns::{CompiledPatterns, ExtractorConfig, BARCODE_RE};
use crate::strategy::{build_chain, Candidate, Strategy, Window};
use crate::QtyError;
use std::collections::HashMap;

/// Length of the context snippet reported for unresolved barcodes
const SNIPPET_CHARS: usize = 100;

/// Barcodes in first-seen order with their normalized quantities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    barcodes: Vec<String>,
    quantities: HashMap<String, String>,
}

impl Extraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a barcode. Returns `false` (and keeps the old value) if it was
    /// already present.
    pub fn insert(&mut self, barcode: &str, quantity: String) -> bool {
        if self.quantities.contains_key(barcode) {
            return false;
        }
        self.barcodes.push(barcode.to_string());
        self.quantities.insert(barcode.to_string(), quantity);
        true
    }

    pub fn barcodes(&self) -> &[String] {
        &self.barcodes
    }

    pub fn quantities(&self) -> &HashMap<String, String> {
        &self.quantities
    }

    pub fn quantity(&self, barcode: &str) -> Option<&str> {
        self.quantities.get(barcode).map(String::as_str)
    }

    pub fn contains(&self, barcode: &str) -> bool {
        self.quantities.contains_key(barcode)
    }

    /// `(barcode, quantity)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.barcodes
            .iter()
            .filter_map(|b| self.quantities.get(b).map(|q| (b.as_str(), q.as_str())))
    }

    pub fn len(&self) -> usize {
        self.barcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barcodes.is_empty()
    }

    pub fn into_parts(self) -> (Vec<String>, HashMap<String, String>) {
        (self.barcodes, self.quantities)
    }
}

/// A barcode that got a quantity
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    /// Page index (0-based)
    pub page: usize,
    pub barcode: &'a str,
    pub strategy: &'static str,
    /// Number as written in the document
    pub raw: &'a str,
    /// Normalized quantity stored in the result
    pub quantity: &'a str,
    /// Signed character distance from the barcode to the number
    pub distance: isize,
}

/// A barcode occurrence no strategy could resolve
#[derive(Debug, Clone)]
pub struct Unresolved<'a> {
    /// Page index (0-based)
    pub page: usize,
    pub barcode: &'a str,
    /// Start of the search window
    pub context: &'a str,
}

/// Receives extraction diagnostics.
///
/// All methods do nothing by default.
pub trait Observer {
    fn resolved(&mut self, _resolution: &Resolution<'_>) {}

    fn unresolved(&mut self, _unresolved: &Unresolved<'_>) {}

    /// A lower-precedence strategy would have picked a different number.
    /// Only called when `ExtractorConfig::report_shadowed` is set.
    fn shadowed(&mut self, _winner: &Resolution<'_>, _strategy: &'static str, _raw: &str) {}
}

/// Forwards diagnostics to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn resolved(&mut self, r: &Resolution<'_>) {
        log::debug!(
            "Page {}: barcode {} -> {} via {} (raw {:?}, distance {})",
            r.page + 1,
            r.barcode,
            r.quantity,
            r.strategy,
            r.raw,
            r.distance
        );
    }

    fn unresolved(&mut self, u: &Unresolved<'_>) {
        log::info!(
            "Page {}: no Kol. Jmj for barcode {}. Context: {:?}...",
            u.page + 1,
            u.barcode,
            u.context
        );
    }

    fn shadowed(&mut self, winner: &Resolution<'_>, strategy: &'static str, raw: &str) {
        log::trace!(
            "Barcode {}: {} chose {:?} but {} found {:?}",
            winner.barcode,
            winner.strategy,
            winner.raw,
            strategy,
            raw
        );
    }
}

/// The quantity extraction engine
pub struct QuantityExtractor {
    config: ExtractorConfig,
    strategies: Vec<Box<dyn Strategy>>,
}

impl QuantityExtractor {
    /// Compile the configured patterns into the default strategy chain.
    pub fn new(config: ExtractorConfig) -> Result<Self, QtyError> {
        let patterns = CompiledPatterns::compile(&config.patterns)?;
        let strategies = build_chain(&patterns, &config);
        Ok(Self { config, strategies })
    }

    /// Use a custom strategy chain, tried in the given order.
    pub fn with_strategies(config: ExtractorConfig, strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { config, strategies }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract barcode quantities, logging diagnostics through [`LogObserver`].
    pub fn extract<S: PageSource + ?Sized>(&self, source: &S) -> Result<Extraction, QtyError> {
        self.extract_with(source, &mut LogObserver)
    }

    /// Extract barcode quantities, reporting diagnostics to `observer`.
    ///
    /// Fails only when a page cannot be read.
    pub fn extract_with<S: PageSource + ?Sized>(
        &self,
        source: &S,
        observer: &mut dyn Observer,
    ) -> Result<Extraction, QtyError> {
        let mut result = Extraction::new();

        for page in 0..source.page_count() {
            let text = source.page_text(page)?;
            self.extract_page(page, &text, &mut result, observer);
        }

        Ok(result)
    }

    fn extract_page(
        &self,
        page: usize,
        text: &str,
        result: &mut Extraction,
        observer: &mut dyn Observer,
    ) {
        for m in BARCODE_RE.find_iter(text) {
            let barcode = m.as_str();
            if result.contains(barcode) {
                continue;
            }

            let window = Window::around(text, m.start(), m.end(), self.config.window_radius);

            let Some((index, candidate)) = self.resolve(&window) else {
                observer.unresolved(&Unresolved {
                    page,
                    barcode,
                    context: window.snippet(SNIPPET_CHARS),
                });
                continue;
            };

            let quantity = normalize_quantity(&to_period_decimal(candidate.raw));
            let resolution = Resolution {
                page,
                barcode,
                strategy: self.strategies[index].name(),
                raw: candidate.raw,
                quantity: &quantity,
                distance: candidate.distance,
            };
            observer.resolved(&resolution);

            if self.config.report_shadowed {
                for strategy in &self.strategies[index + 1..] {
                    if let Some(other) = strategy.find(&window) {
                        if other.raw != candidate.raw {
                            observer.shadowed(&resolution, strategy.name(), other.raw);
                        }
                    }
                }
            }

            result.insert(barcode, quantity);
        }
    }

    fn resolve<'a>(&self, window: &Window<'a>) -> Option<(usize, Candidate<'a>)> {
        self.strategies
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.find(window).map(|c| (i, c)))
    }
}

impl std::fmt::Debug for QuantityExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuantityExtractor")
            .field("config", &self.config)
            .field("strategies", &self.strategy_names())
            .finish()
    }
}
