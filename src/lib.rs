//! Barcode quantity extraction from invoice PDFs
//!
//! This crate provides:
//! - A strategy-chain extractor that pairs 13-digit barcodes with their
//!   Kol. Jmj quantity in loosely structured PDF text
//! - Quantity normalization (`12,00` -> `12`, `12,50` -> `12.50`)
//! - Filling the extracted quantities into a spreadsheet template
//! - Parallel batch processing of many PDFs

pub mod detector;
pub mod normalize;
pub mod pages;
pub mod patterns;
pub mod quantity;
pub mod strategy;
pub mod template;

pub use normalize::normalize_quantity;
pub use pages::{PageSource, PdfPages};
pub use patterns::{ExtractorConfig, PatternSet};
pub use quantity::{Extraction, LogObserver, Observer, QuantityExtractor};
pub use template::{Template, TemplateConfig};

use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Everything needed to turn invoice PDFs into filled spreadsheets
#[derive(Debug, Clone)]
pub struct Job {
    /// Template workbook (first sheet is filled)
    pub template: PathBuf,
    /// Directory receiving `<pdf name>.xlsx` outputs
    pub out_dir: PathBuf,
    pub extractor: ExtractorConfig,
    pub columns: TemplateConfig,
}

impl Job {
    pub fn new<T: Into<PathBuf>, O: Into<PathBuf>>(template: T, out_dir: O) -> Self {
        Self {
            template: template.into(),
            out_dir: out_dir.into(),
            extractor: ExtractorConfig::default(),
            columns: TemplateConfig::default(),
        }
    }

    /// Output path for a given input PDF
    pub fn output_path(&self, pdf: &Path) -> PathBuf {
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.out_dir.join(format!("{}.xlsx", stem))
    }
}

/// Outcome of a batch run, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Written output files
    pub outputs: Vec<PathBuf>,
    /// Inputs that failed, with the reason
    pub failures: Vec<(PathBuf, QtyError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extract barcode quantities from a PDF file
pub fn extract_pdf<P: AsRef<Path>>(path: P, config: &ExtractorConfig) -> Result<Extraction, QtyError> {
    let extractor = QuantityExtractor::new(config.clone())?;
    let pages = open_pages(path.as_ref())?;
    extractor.extract(&pages)
}

/// Process one PDF: extract quantities and write a filled copy of the
/// template. Returns the output path.
pub fn process_pdf<P: AsRef<Path>>(path: P, job: &Job) -> Result<PathBuf, QtyError> {
    let extractor = QuantityExtractor::new(job.extractor.clone())?;
    let template = Template::load(&job.template)?;
    process_with(path.as_ref(), job, &extractor, &template)
}

/// Process many PDFs in parallel. A failing document does not stop the
/// others.
pub fn process_batch<P: AsRef<Path> + Sync>(paths: &[P], job: &Job) -> Result<BatchReport, QtyError> {
    let extractor = QuantityExtractor::new(job.extractor.clone())?;
    let template = Template::load(&job.template)?;

    let results: Vec<(PathBuf, Result<PathBuf, QtyError>)> = paths
        .par_iter()
        .map(|p| {
            let path = p.as_ref();
            (path.to_path_buf(), process_with(path, job, &extractor, &template))
        })
        .collect();

    let mut report = BatchReport::default();
    for (path, result) in results {
        match result {
            Ok(out) => report.outputs.push(out),
            Err(e) => {
                log::warn!("{}: {}", path.display(), e);
                report.failures.push((path, e));
            }
        }
    }

    log::info!(
        "Processed {} PDFs: {} written, {} failed",
        paths.len(),
        report.outputs.len(),
        report.failures.len()
    );
    Ok(report)
}

fn open_pages(path: &Path) -> Result<PdfPages, QtyError> {
    let pages = PdfPages::open(path)?;

    let layer = detector::inspect_text_layer(pages.document(), &detector::DetectionConfig::default());
    if layer.looks_scanned() {
        log::warn!(
            "{}: no text layer on {} sampled pages, the PDF looks scanned",
            path.display(),
            layer.pages_sampled
        );
    }

    Ok(pages)
}

fn process_with(
    path: &Path,
    job: &Job,
    extractor: &QuantityExtractor,
    template: &Template,
) -> Result<PathBuf, QtyError> {
    let start = std::time::Instant::now();

    let pages = open_pages(path)?;
    let extraction = extractor.extract(&pages)?;

    std::fs::create_dir_all(&job.out_dir)?;
    let out = job.output_path(path);
    let updates = template::fill_template(template, &extraction, &job.columns, &out)?;

    log::info!(
        "{}: {} barcodes, {} rows updated -> {} ({}ms)",
        path.display(),
        extraction.len(),
        updates.len(),
        out.display(),
        start.elapsed().as_millis()
    );
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum QtyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF read error: {0}")]
    Read(String),
    #[error("page {index} requested but the document has {count} pages")]
    PageOutOfRange { index: usize, count: usize },
    #[error("could not detect '{code_label}' or '{quantity_label}' columns in the template")]
    ColumnNotFound {
        code_label: String,
        quantity_label: String,
    },
    #[error("template error: {0}")]
    Template(String),
    #[error("spreadsheet write error: {0}")]
    Write(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl From<lopdf::Error> for QtyError {
    fn from(e: lopdf::Error) -> Self {
        QtyError::Read(e.to_string())
    }
}

impl From<calamine::XlsxError> for QtyError {
    fn from(e: calamine::XlsxError) -> Self {
        QtyError::Template(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for QtyError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        QtyError::Write(e.to_string())
    }
}
