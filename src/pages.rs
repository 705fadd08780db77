//! Page text sources
//!
//! The extractor only needs "page index -> plain text". PDFs are read with
//! lopdf; in-memory text (tests, pre-extracted documents) works the same way.

use crate::QtyError;
use lopdf::Document;
use std::borrow::Cow;
use std::path::Path;

/// Anything that can hand out the plain text of its pages in order
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Text of the page at `index` (0-based)
    fn page_text(&self, index: usize) -> Result<Cow<'_, str>, QtyError>;
}

impl<S: AsRef<str>> PageSource for [S] {
    fn page_count(&self) -> usize {
        self.len()
    }

    fn page_text(&self, index: usize) -> Result<Cow<'_, str>, QtyError> {
        self.get(index)
            .map(|p| Cow::Borrowed(p.as_ref()))
            .ok_or(QtyError::PageOutOfRange {
                index,
                count: self.len(),
            })
    }
}

impl<S: AsRef<str>> PageSource for Vec<S> {
    fn page_count(&self) -> usize {
        self.as_slice().page_count()
    }

    fn page_text(&self, index: usize) -> Result<Cow<'_, str>, QtyError> {
        self.as_slice().page_text(index)
    }
}

/// A loaded PDF document
pub struct PdfPages {
    doc: Document,
    /// Page numbers (1-indexed) in document order
    page_numbers: Vec<u32>,
}

impl PdfPages {
    /// Load a PDF from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, QtyError> {
        let doc = Document::load(path)?;
        Ok(Self::from_document(doc))
    }

    /// Load a PDF from a memory buffer
    pub fn from_mem(buffer: &[u8]) -> Result<Self, QtyError> {
        let doc = Document::load_mem(buffer)?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        // get_pages() is a BTreeMap, so keys come out in page order
        let page_numbers = doc.get_pages().keys().copied().collect();
        Self { doc, page_numbers }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

impl PageSource for PdfPages {
    fn page_count(&self) -> usize {
        self.page_numbers.len()
    }

    fn page_text(&self, index: usize) -> Result<Cow<'_, str>, QtyError> {
        let page_num = *self
            .page_numbers
            .get(index)
            .ok_or(QtyError::PageOutOfRange {
                index,
                count: self.page_numbers.len(),
            })?;

        let text = self.doc.extract_text(&[page_num]).map_err(|e| {
            QtyError::Read(format!("page {}: {}", page_num, e))
        })?;
        Ok(Cow::Owned(text))
    }
}
