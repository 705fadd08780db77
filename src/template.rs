//! Spreadsheet template filling
//!
//! The template's first sheet has a header row naming a barcode column
//! ("Siframat") and a quantity column ("Količina"). Every row whose barcode
//! cell contains an extracted barcode gets the quantity written next to it,
//! and the result is saved as a new workbook. Other sheets are copied as
//! values; cell formatting is not carried over.

use crate::quantity::Extraction;
use crate::QtyError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Workbook, Worksheet};
use std::path::Path;

/// Header labels identifying the two columns (case-insensitive substrings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateConfig {
    pub code_label: String,
    pub quantity_label: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            code_label: "siframat".to_string(),
            quantity_label: "količina".to_string(),
        }
    }
}

/// Located header row and columns, relative to the sheet's used range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub header_row: usize,
    pub code: usize,
    pub quantity: usize,
}

/// A quantity to be written into the sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub barcode: String,
    pub quantity: String,
}

/// One worksheet's used range
#[derive(Debug, Clone)]
pub struct Sheet {
    pub name: String,
    /// Absolute (row, col) of the used range's top-left cell
    pub origin: (u32, u32),
    pub cells: Vec<Vec<Data>>,
}

impl Sheet {
    /// Cell contents as text, for label and barcode matching
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.cells
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }

    fn write(&self, worksheet: &mut Worksheet, updates: &[CellUpdate]) -> Result<(), QtyError> {
        worksheet.set_name(&self.name)?;

        for (r, row) in self.cells.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (row_num, col_num) = self.absolute(r, c)?;
                match cell {
                    Data::Empty => {}
                    Data::String(s) => {
                        worksheet.write_string(row_num, col_num, s)?;
                    }
                    Data::Float(f) => {
                        worksheet.write_number(row_num, col_num, *f)?;
                    }
                    Data::Int(i) => {
                        worksheet.write_number(row_num, col_num, *i as f64)?;
                    }
                    Data::Bool(b) => {
                        worksheet.write_boolean(row_num, col_num, *b)?;
                    }
                    other => {
                        worksheet.write_string(row_num, col_num, other.to_string())?;
                    }
                }
            }
        }

        for update in updates {
            let (row_num, col_num) = self.absolute(update.row, update.col)?;
            worksheet.write_string(row_num, col_num, &update.quantity)?;
        }
        Ok(())
    }

    fn absolute(&self, row: usize, col: usize) -> Result<(u32, u16), QtyError> {
        let row_num = u32::try_from(row)
            .ok()
            .and_then(|r| r.checked_add(self.origin.0));
        let col_num = u32::try_from(col)
            .ok()
            .and_then(|c| c.checked_add(self.origin.1))
            .and_then(|c| u16::try_from(c).ok());

        match (row_num, col_num) {
            (Some(r), Some(c)) => Ok((r, c)),
            _ => Err(QtyError::Write(format!(
                "cell ({}, {}) of sheet '{}' is outside the sheet",
                row, col, self.name
            ))),
        }
    }
}

/// A template workbook. The first sheet receives the quantities, the
/// others are carried over unchanged.
#[derive(Debug, Clone)]
pub struct Template {
    sheets: Vec<Sheet>,
}

impl Template {
    /// Read every sheet of an xlsx workbook
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, QtyError> {
        let mut workbook: Xlsx<_> = open_workbook(path.as_ref())?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name)?;
            sheets.push(Sheet {
                origin: range.start().unwrap_or((0, 0)),
                cells: range.rows().map(|row| row.to_vec()).collect(),
                name,
            });
        }

        if sheets.is_empty() {
            return Err(QtyError::Template("no sheets found in workbook".into()));
        }
        Ok(Self { sheets })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// The sheet holding the barcode and quantity columns
    pub fn primary(&self) -> &Sheet {
        &self.sheets[0]
    }

    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.primary().text_rows()
    }

    /// Write all sheets to a new workbook at `out`, with `updates` applied
    /// to the first one.
    pub fn save_with(&self, updates: &[CellUpdate], out: &Path) -> Result<(), QtyError> {
        let mut workbook = Workbook::new();

        for (i, sheet) in self.sheets.iter().enumerate() {
            let worksheet = workbook.add_worksheet();
            let sheet_updates: &[CellUpdate] = if i == 0 { updates } else { &[] };
            sheet.write(worksheet, sheet_updates)?;
        }

        workbook.save(out)?;
        Ok(())
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Display of an integral f64 has no exponent, so numeric barcodes
        // come out as their digits
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        other => other.to_string(),
    }
}

/// Find the first row naming both columns.
///
/// When several cells of that row mention a label, the last one wins.
pub fn find_columns(rows: &[Vec<String>], config: &TemplateConfig) -> Result<Columns, QtyError> {
    let code_label = config.code_label.to_lowercase();
    let quantity_label = config.quantity_label.to_lowercase();

    for (r, row) in rows.iter().enumerate() {
        let mut code = None;
        let mut quantity = None;
        for (c, cell) in row.iter().enumerate() {
            let lower = cell.to_lowercase();
            if lower.contains(&code_label) {
                code = Some(c);
            }
            if lower.contains(&quantity_label) {
                quantity = Some(c);
            }
        }

        if let (Some(code), Some(quantity)) = (code, quantity) {
            return Ok(Columns {
                header_row: r,
                code,
                quantity,
            });
        }
    }

    Err(QtyError::ColumnNotFound {
        code_label: config.code_label.clone(),
        quantity_label: config.quantity_label.clone(),
    })
}

/// Pair data rows with extracted barcodes.
///
/// A row matches when its barcode cell contains the barcode as a substring.
/// If several barcodes match one cell, the one extracted last wins.
pub fn plan_updates(rows: &[Vec<String>], columns: &Columns, extraction: &Extraction) -> Vec<CellUpdate> {
    let mut updates = Vec::new();

    for (r, row) in rows.iter().enumerate().skip(columns.header_row + 1) {
        let Some(cell) = row.get(columns.code) else {
            continue;
        };

        let hit = extraction
            .iter()
            .filter(|(barcode, _)| cell.contains(barcode))
            .last();

        if let Some((barcode, quantity)) = hit {
            log::debug!("Row {}: barcode {} -> {}", r + 1, barcode, quantity);
            updates.push(CellUpdate {
                row: r,
                col: columns.quantity,
                barcode: barcode.to_string(),
                quantity: quantity.to_string(),
            });
        }
    }

    updates
}

/// Fill `template` with `extraction` and save it to `out`.
///
/// Returns the updates that were written.
pub fn fill_template(
    template: &Template,
    extraction: &Extraction,
    config: &TemplateConfig,
    out: &Path,
) -> Result<Vec<CellUpdate>, QtyError> {
    let rows = template.text_rows();
    let columns = find_columns(&rows, config)?;
    let updates = plan_updates(&rows, &columns, extraction);

    let missing = extraction
        .barcodes()
        .iter()
        .filter(|b| !updates.iter().any(|u| &u.barcode == *b))
        .count();
    if missing > 0 {
        log::info!(
            "{} of {} barcodes have no row in the template",
            missing,
            extraction.len()
        );
    }

    template.save_with(&updates, out)?;
    Ok(updates)
}
