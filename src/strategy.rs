//! Quantity matching strategies
//!
//! Each strategy looks at a [`Window`] of page text around one barcode
//! occurrence and either proposes the Kol. Jmj value for it or gives up.
//! Strategies are tried in order from most to least structurally anchored;
//! the first proposal wins.

use crate::patterns::{CompiledPatterns, ExtractorConfig, BARCODE_RE, NUMBER_RE};
use regex::Regex;

/// Page text around a single barcode occurrence
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    /// The window text
    pub text: &'a str,
    /// Byte offset of the barcode inside `text`
    pub barcode_start: usize,
    /// Byte offset just past the barcode inside `text`
    pub barcode_end: usize,
}

impl<'a> Window<'a> {
    /// Cut a window of up to `radius` characters on each side of
    /// `page[start..end]`, clamped to the page.
    pub fn around(page: &'a str, start: usize, end: usize, radius: usize) -> Self {
        let from = chars_back(page, start, radius);
        let to = chars_forward(page, end, radius);
        Window {
            text: &page[from..to],
            barcode_start: start - from,
            barcode_end: end - from,
        }
    }

    pub fn barcode(&self) -> &'a str {
        &self.text[self.barcode_start..self.barcode_end]
    }

    /// Signed distance in characters from the barcode start to `offset`.
    pub fn char_distance(&self, offset: usize) -> isize {
        if offset >= self.barcode_start {
            self.text[self.barcode_start..offset].chars().count() as isize
        } else {
            -(self.text[offset..self.barcode_start].chars().count() as isize)
        }
    }

    fn overlaps_barcode(&self, start: usize, end: usize) -> bool {
        start < self.barcode_end && end > self.barcode_start
    }

    /// Start of the next barcode token after this one, or the window end.
    pub fn next_barcode_start(&self) -> usize {
        BARCODE_RE
            .find_iter(self.text)
            .map(|m| m.start())
            .find(|&s| s >= self.barcode_end)
            .unwrap_or(self.text.len())
    }

    /// Byte range of the barcode's row: its line, cut short at any
    /// neighbouring barcode on the same line.
    pub fn row_segment(&self) -> (usize, usize) {
        let (line_start, line_end) = self.line_bounds();
        let mut start = line_start;
        let mut end = line_end;
        for m in BARCODE_RE.find_iter(&self.text[line_start..line_end]) {
            let (s, e) = (line_start + m.start(), line_start + m.end());
            if e <= self.barcode_start {
                start = e;
            } else if s >= self.barcode_end {
                end = s;
                break;
            }
        }
        (start, end)
    }

    /// Byte range of the line holding the barcode.
    pub fn line_bounds(&self) -> (usize, usize) {
        let start = self.text[..self.barcode_start]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        let end = self.text[self.barcode_end..]
            .find('\n')
            .map_or(self.text.len(), |i| self.barcode_end + i);
        (start, end)
    }

    /// Leading context for diagnostics, at most `max_chars` characters.
    pub fn snippet(&self, max_chars: usize) -> &'a str {
        &self.text[..chars_forward(self.text, 0, max_chars)]
    }
}

fn chars_back(text: &str, from: usize, n: usize) -> usize {
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(from, |(i, _)| i)
}

fn chars_forward(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| from + i)
}

/// A quantity proposed by a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// The number as written in the source (`12,50`)
    pub raw: &'a str,
    /// Byte offset of the number inside the window
    pub offset: usize,
    /// Signed character distance from the barcode start
    pub distance: isize,
}

impl<'a> Candidate<'a> {
    fn at(window: &Window<'a>, m: regex::Match<'a>) -> Self {
        Candidate {
            raw: m.as_str(),
            offset: m.start(),
            distance: window.char_distance(m.start()),
        }
    }
}

/// One way of locating the quantity for a barcode
pub trait Strategy: Send + Sync {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    fn find<'a>(&self, window: &Window<'a>) -> Option<Candidate<'a>>;
}

/// A configured product name followed on its line by `number unit`
#[derive(Debug, Clone)]
pub struct ProductAnchor {
    product: String,
    pattern: Regex,
}

impl ProductAnchor {
    pub fn new(product: String, pattern: Regex) -> Self {
        Self { product, pattern }
    }

    pub fn product(&self) -> &str {
        &self.product
    }
}

impl Strategy for ProductAnchor {
    fn name(&self) -> &'static str {
        "product-anchor"
    }

    fn find<'a>(&self, window: &Window<'a>) -> Option<Candidate<'a>> {
        self.pattern
            .captures_iter(window.text)
            .filter_map(|c| c.get(1))
            .find(|m| !window.overlaps_barcode(m.start(), m.end()))
            .map(|m| Candidate::at(window, m))
    }
}

/// Anchors on the table header: the header must precede the barcode, and
/// the value is the first `number unit` in the barcode's row.
#[derive(Debug, Clone)]
pub struct TableHeader {
    header: Regex,
    quantity: Regex,
}

impl TableHeader {
    pub fn new(header: Regex, quantity: Regex) -> Self {
        Self { header, quantity }
    }
}

impl Strategy for TableHeader {
    fn name(&self) -> &'static str {
        "table-header"
    }

    fn find<'a>(&self, window: &Window<'a>) -> Option<Candidate<'a>> {
        let header_before = self
            .header
            .find_iter(window.text)
            .any(|m| m.end() <= window.barcode_start);
        if !header_before {
            return None;
        }

        let row_end = window.next_barcode_start();
        self.quantity
            .captures_iter(window.text)
            .filter_map(|c| c.get(1))
            .find(|m| m.start() >= window.barcode_end && m.end() <= row_end)
            .map(|m| Candidate::at(window, m))
    }
}

/// `number unit` with the unit on the same line as the number.
///
/// Candidates are taken in this order:
/// 1. the first one after the barcode on its own row
/// 2. the last one before the barcode on its own row, if no other barcode
///    precedes it on the line (that text would belong to the neighbouring row)
/// 3. the first one anywhere after the barcode, up to the next barcode token
///
/// There is no distance limit beyond the window itself.
#[derive(Debug, Clone)]
pub struct LabeledUnit {
    quantity: Regex,
}

impl LabeledUnit {
    pub fn new(quantity: Regex) -> Self {
        Self { quantity }
    }
}

impl Strategy for LabeledUnit {
    fn name(&self) -> &'static str {
        "labeled-unit"
    }

    fn find<'a>(&self, window: &Window<'a>) -> Option<Candidate<'a>> {
        let (row_start, row_end) = window.row_segment();
        let (line_start, _) = window.line_bounds();
        let next_barcode = window.next_barcode_start();

        let matches: Vec<regex::Match<'a>> = self
            .quantity
            .captures_iter(window.text)
            .filter_map(|c| c.get(1))
            .filter(|m| !window.overlaps_barcode(m.start(), m.end()))
            .collect();

        let after = matches
            .iter()
            .find(|m| m.start() >= window.barcode_end && m.end() <= next_barcode);

        if let Some(m) = after.filter(|m| m.end() <= row_end) {
            return Some(Candidate::at(window, *m));
        }

        let before = matches
            .iter()
            .rev()
            .find(|m| m.start() >= row_start && m.end() <= window.barcode_start)
            .filter(|_| row_start == line_start);

        before.or(after).map(|m| Candidate::at(window, *m))
    }
}

/// Closest `number unit` after the barcode, within `max_distance` characters.
#[derive(Debug, Clone)]
pub struct NearestCandidate {
    quantity: Regex,
    max_distance: usize,
}

impl NearestCandidate {
    pub fn new(quantity: Regex, max_distance: usize) -> Self {
        Self {
            quantity,
            max_distance,
        }
    }
}

impl Strategy for NearestCandidate {
    fn name(&self) -> &'static str {
        "nearest-candidate"
    }

    fn find<'a>(&self, window: &Window<'a>) -> Option<Candidate<'a>> {
        self.quantity
            .captures_iter(window.text)
            .filter_map(|c| c.get(1))
            .filter(|m| m.start() >= window.barcode_end)
            .map(|m| Candidate::at(window, m))
            .filter(|c| (c.distance as usize) < self.max_distance)
            .min_by_key(|c| c.distance)
    }
}

/// Any two-decimal number in a narrow band around the barcode. Last resort
/// for layouts without unit labels; prone to false positives.
#[derive(Debug, Clone)]
pub struct Unanchored {
    before: usize,
    after: usize,
}

impl Unanchored {
    pub fn new(before: usize, after: usize) -> Self {
        Self { before, after }
    }
}

impl Strategy for Unanchored {
    fn name(&self) -> &'static str {
        "unanchored"
    }

    fn find<'a>(&self, window: &Window<'a>) -> Option<Candidate<'a>> {
        let low = -(self.before as isize);
        let high = self.after as isize;
        NUMBER_RE
            .find_iter(window.text)
            .filter(|m| !window.overlaps_barcode(m.start(), m.end()))
            .map(|m| Candidate::at(window, m))
            .find(|c| c.distance >= low && c.distance <= high)
    }
}

/// Build the strategy chain in precedence order. Strategies whose patterns
/// are not configured (no units, no header) are left out.
pub fn build_chain(patterns: &CompiledPatterns, config: &ExtractorConfig) -> Vec<Box<dyn Strategy>> {
    let mut chain: Vec<Box<dyn Strategy>> = Vec::new();

    for (product, pattern) in &patterns.anchors {
        chain.push(Box::new(ProductAnchor::new(product.clone(), pattern.clone())));
    }

    if let (Some(header), Some(loose)) = (&patterns.header, &patterns.loose_quantity) {
        chain.push(Box::new(TableHeader::new(header.clone(), loose.clone())));
    }

    if let Some(tight) = &patterns.tight_quantity {
        chain.push(Box::new(LabeledUnit::new(tight.clone())));
    }

    if let Some(loose) = &patterns.loose_quantity {
        chain.push(Box::new(NearestCandidate::new(
            loose.clone(),
            config.nearest_max_distance,
        )));
    }

    chain.push(Box::new(Unanchored::new(
        config.unanchored_before,
        config.unanchored_after,
    )));

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternSet;

    const CODE: &str = "5903246229516";

    fn window_for(text: &str) -> Window<'_> {
        let start = text.find(CODE).unwrap();
        Window::around(text, start, start + CODE.len(), 300)
    }

    fn compiled() -> CompiledPatterns {
        CompiledPatterns::compile(&PatternSet::default()).unwrap()
    }

    fn labeled() -> LabeledUnit {
        LabeledUnit::new(compiled().tight_quantity.unwrap())
    }

    fn nearest() -> NearestCandidate {
        NearestCandidate::new(compiled().loose_quantity.unwrap(), 200)
    }

    #[test]
    fn test_window_clamps_to_page() {
        let page = format!("ab {} cd", CODE);
        let w = window_for(&page);
        assert_eq!(w.text, page);
        assert_eq!(w.barcode(), CODE);
    }

    #[test]
    fn test_window_radius_in_characters() {
        let page = format!("{}{}{}", "č".repeat(400), CODE, "š".repeat(400));
        let w = window_for(&page);
        assert_eq!(w.text.chars().count(), 300 + 13 + 300);
        assert_eq!(w.barcode(), CODE);
    }

    #[test]
    fn test_char_distance_signed() {
        let page = format!("1,00 Tabs {} Šifra 2,00", CODE);
        let w = window_for(&page);
        assert_eq!(w.char_distance(0), -10);
        let after = w.text.find("2,00").unwrap();
        assert_eq!(w.char_distance(after), 13 + 7);
    }

    #[test]
    fn test_row_segment_stops_at_neighbours() {
        let page = format!(
            "1 1111111111111 A 1,00 Tabs 2 {} B 2,00 Tabs 3 2222222222222 C\nnext",
            CODE
        );
        let w = window_for(&page);
        let (s, e) = w.row_segment();
        assert_eq!(&w.text[s..e], format!(" A 1,00 Tabs 2 {} B 2,00 Tabs 3 ", CODE));
    }

    #[test]
    fn test_labeled_unit_same_row() {
        let page = format!("{} OST PRODUCT X 12,50 Tabs 1,20", CODE);
        let c = labeled().find(&window_for(&page)).unwrap();
        assert_eq!(c.raw, "12,50");
    }

    #[test]
    fn test_labeled_unit_value_on_a_later_line() {
        let page = format!("{} OST PRODUCT X\n{}12,50 Tabs", CODE, " ".repeat(236));
        let c = labeled().find(&window_for(&page)).unwrap();
        assert_eq!(c.raw, "12,50");
        assert_eq!(c.distance, page.find("12,50").unwrap() as isize);
    }

    #[test]
    fn test_labeled_unit_stops_at_next_barcode() {
        let page = format!("{} A\n1111111111111 B 4,00 Tabs", CODE);
        assert!(labeled().find(&window_for(&page)).is_none());
    }

    #[test]
    fn test_labeled_unit_ignores_neighbour_rows() {
        let page = format!("1111111111111 A 9,00 Tabs {} B 3,00 Tabs", CODE);
        let c = labeled().find(&window_for(&page)).unwrap();
        assert_eq!(c.raw, "3,00");
    }

    #[test]
    fn test_labeled_unit_prefers_value_after_barcode_on_row() {
        let page = format!("3,00 Tabs {} X 5,00 Tabs", CODE);
        let c = labeled().find(&window_for(&page)).unwrap();
        assert_eq!(c.raw, "5,00");
    }

    #[test]
    fn test_labeled_unit_value_before_barcode() {
        let page = format!("3,00 Tabs {} NAME\n7,00 Tabs", CODE);
        let c = labeled().find(&window_for(&page)).unwrap();
        assert_eq!(c.raw, "3,00");
        assert_eq!(c.distance, -10);

        let shared = format!("1111111111111 A 9,00 Tabs {} B", CODE);
        assert!(labeled().find(&window_for(&shared)).is_none());
    }

    #[test]
    fn test_labeled_unit_requires_unit_on_same_line() {
        let page = format!("{} X 5,00\nTabs", CODE);
        assert!(labeled().find(&window_for(&page)).is_none());
    }

    #[test]
    fn test_nearest_prefers_closer_after() {
        // first candidate at 40 characters, second at 150
        let gap1 = " ".repeat(40 - CODE.len());
        let gap2 = " ".repeat(150 - 40 - "4,00 Tabs".len());
        let page = format!("{}\n{}4,00 Tabs{}9,00 Tabs", CODE, &gap1[1..], gap2);
        let w = window_for(&page);
        let c = nearest().find(&w).unwrap();
        assert_eq!(c.raw, "4,00");
        assert_eq!(c.distance, 40);
    }

    #[test]
    fn test_nearest_ignores_candidates_before_barcode() {
        let page = format!("8,00 Tabs\n{}\nname\n5,00 Tabs", CODE);
        let c = nearest().find(&window_for(&page)).unwrap();
        assert_eq!(c.raw, "5,00");
    }

    #[test]
    fn test_nearest_distance_limit() {
        let page = format!("{}{}\n6,00 Tabs", CODE, " ".repeat(220));
        assert!(nearest().find(&window_for(&page)).is_none());
    }

    #[test]
    fn test_nearest_distance_is_exclusive() {
        // value starts 199 characters after the barcode start
        let inside = format!("{}{}6,00\nTabs", CODE, " ".repeat(199 - CODE.len()));
        let c = nearest().find(&window_for(&inside)).unwrap();
        assert_eq!(c.distance, 199);

        let at_limit = format!("{}{}6,00\nTabs", CODE, " ".repeat(200 - CODE.len()));
        assert!(nearest().find(&window_for(&at_limit)).is_none());
    }

    #[test]
    fn test_table_header_requires_header_before() {
        let patterns = compiled();
        let strategy = TableHeader::new(
            patterns.header.clone().unwrap(),
            patterns.loose_quantity.clone().unwrap(),
        );

        let with_header = format!("Rb Sifra Naziv Kol. Jmj VPC\n1 {} NAME\n2,00 Tabs 5,10", CODE);
        let c = strategy.find(&window_for(&with_header)).unwrap();
        assert_eq!(c.raw, "2,00");

        let without = format!("1 {} NAME\n2,00 Tabs 5,10", CODE);
        assert!(strategy.find(&window_for(&without)).is_none());
    }

    #[test]
    fn test_table_header_stays_in_row() {
        let patterns = compiled();
        let strategy = TableHeader::new(
            patterns.header.clone().unwrap(),
            patterns.loose_quantity.clone().unwrap(),
        );
        let page = format!(
            "Rb Sifra Naziv Kol. Jmj VPC\n1 {} NAME\n2 1111111111111 OTHER 4,00 Tabs",
            CODE
        );
        assert!(strategy.find(&window_for(&page)).is_none());
    }

    #[test]
    fn test_unanchored_band() {
        let strategy = Unanchored::new(50, 100);

        let page = format!("{} X 14,90", CODE);
        assert_eq!(strategy.find(&window_for(&page)).unwrap().raw, "14,90");

        let far = format!("{}{}14,90", CODE, " ".repeat(120));
        assert!(strategy.find(&window_for(&far)).is_none());

        let before = format!("3,30 {}", CODE);
        let c = strategy.find(&window_for(&before)).unwrap();
        assert_eq!(c.raw, "3,30");
        assert_eq!(c.distance, -5);
    }

    #[test]
    fn test_unanchored_skips_barcode_digits() {
        let strategy = Unanchored::new(50, 100);
        let page = format!("{},50 rest", CODE);
        assert!(strategy.find(&window_for(&page)).is_none());
    }

    #[test]
    fn test_chain_order() {
        let set = PatternSet {
            anchors: vec!["OST MAGNESIUM CITRAT".to_string()],
            ..PatternSet::default()
        };
        let patterns = CompiledPatterns::compile(&set).unwrap();
        let chain = build_chain(&patterns, &ExtractorConfig::default());
        let names: Vec<&str> = chain.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "product-anchor",
                "table-header",
                "labeled-unit",
                "nearest-candidate",
                "unanchored"
            ]
        );
    }

    #[test]
    fn test_chain_without_units() {
        let set = PatternSet {
            unit_tokens: Vec::new(),
            ..PatternSet::default()
        };
        let patterns = CompiledPatterns::compile(&set).unwrap();
        let chain = build_chain(&patterns, &ExtractorConfig::default());
        let names: Vec<&str> = chain.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["unanchored"]);
    }
}
