//! Text layer detection
//!
//! Invoices are expected to be digitally generated. A PDF whose content
//! streams carry no text operators is almost certainly a scan, and
//! extraction on it will come back empty; this lets callers warn early.

use lopdf::{Document, Object, ObjectId};

/// Configuration for text layer sampling
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Maximum number of pages to sample (default: 5)
    pub max_pages_to_sample: u32,
    /// Minimum text operator count for a page to count as having text
    pub min_text_ops_per_page: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            max_pages_to_sample: 5,
            min_text_ops_per_page: 3,
        }
    }
}

/// Result of text layer sampling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLayer {
    pub page_count: u32,
    pub pages_sampled: u32,
    pub pages_with_text: u32,
}

impl TextLayer {
    /// No sampled page had a usable text layer
    pub fn looks_scanned(&self) -> bool {
        self.pages_sampled > 0 && self.pages_with_text == 0
    }
}

/// Sample the document's pages for text operators
pub fn inspect_text_layer(doc: &Document, config: &DetectionConfig) -> TextLayer {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let sample = sample_pages(page_count, config.max_pages_to_sample);

    let pages_with_text = sample
        .iter()
        .filter_map(|n| pages.get(n))
        .filter(|&&id| page_text_operators(doc, id) >= config.min_text_ops_per_page)
        .count() as u32;

    TextLayer {
        page_count,
        pages_sampled: sample.len() as u32,
        pages_with_text,
    }
}

/// First page, last page, and evenly spaced pages in between
fn sample_pages(total: u32, max: u32) -> Vec<u32> {
    let wanted = max.min(total);
    if wanted >= total {
        return (1..=total).collect();
    }

    let mut indices = vec![1];
    if wanted > 1 {
        indices.push(total);
    }

    let remaining = wanted.saturating_sub(2);
    if remaining > 0 && total > 2 {
        let step = (total - 2) / (remaining + 1);
        for i in 1..=remaining {
            let idx = 1 + step * i;
            if idx > 1 && idx < total {
                indices.push(idx);
            }
        }
    }

    indices.sort_unstable();
    indices.dedup();
    indices
}

fn page_text_operators(doc: &Document, page_id: ObjectId) -> u32 {
    doc.get_page_contents(page_id)
        .into_iter()
        .filter_map(|id| match doc.get_object(id) {
            Ok(Object::Stream(stream)) => Some(
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone()),
            ),
            _ => None,
        })
        .map(|content| count_text_operators(&content))
        .sum()
}

/// Count `Tj` / `TJ` operators in a raw content stream
fn count_text_operators(content: &[u8]) -> u32 {
    content
        .windows(3)
        .filter(|w| w[0] == b'T' && (w[1] == b'j' || w[1] == b'J') && w[2].is_ascii_whitespace())
        .count() as u32
        + u32::from(content.ends_with(b"Tj") || content.ends_with(b"TJ"))
}
