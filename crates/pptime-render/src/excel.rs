//! Excel report writer
//!
//! Every [`PivotView`] becomes one worksheet holding a single Excel table:
//! - the header row comes from the view's columns
//! - data rows start right below it
//! - views with `total_row` get a totals row driven by each column's
//!   [`TotalFunction`] or fixed label, so the sums stay live when a user
//!   edits a cell
//!
//! ## Example Output Structure
//!
//! ```text
//! Sheet: All years
//! | Projects | Ada  | Bob  | Total |
//! |----------|------|------|-------|
//! | Website  | 3.50 | 0.50 | 4.00  |
//! | Intranet | 0.00 | 1.00 | 1.00  |
//! | Totals   | =SUBTOTAL(109,...)   |
//! ```
//!
//! Excel requires unique table headers, so repeated labels (two members
//! with the same display name, several unknown users) get a ` (n)` suffix.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use pptime_core::pivot::{Cell, Column, PivotView, ReportBook, TotalFunction};
use pptime_core::{DocumentWriter, RenderError};
use rust_xlsxwriter::{Format, Table, TableColumn, TableFunction, Workbook, Worksheet};
use tracing::debug;

/// Excel workbook writer
#[derive(Clone, Debug)]
pub struct ExcelWriter {
    /// Number format applied to hour cells
    pub hours_format: String,
    /// Width of the first (label) column
    pub label_width: f64,
    /// Width of every other column
    pub value_width: f64,
}

impl Default for ExcelWriter {
    fn default() -> Self {
        Self {
            hours_format: "#,##0.00".into(),
            label_width: 30.0,
            value_width: 14.0,
        }
    }
}

impl ExcelWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number format for hour cells
    pub fn hours_format(mut self, format: impl Into<String>) -> Self {
        self.hours_format = format.into();
        self
    }

    /// Set the label and value column widths
    pub fn column_widths(mut self, label: f64, value: f64) -> Self {
        self.label_width = label;
        self.value_width = value;
        self
    }

    /// Generate Excel workbook bytes
    pub fn render_to_bytes(&self, book: &ReportBook) -> Result<Vec<u8>, RenderError> {
        book.validate()?;

        let mut workbook = Workbook::new();
        let hours = Format::new().set_num_format(&self.hours_format);

        for view in &book.views {
            let sheet = workbook.add_worksheet();
            self.add_view_sheet(sheet, view, &hours)?;
        }

        workbook
            .save_to_buffer()
            .map_err(|e| RenderError::Format(format!("Failed to create Excel: {e}")))
    }

    fn add_view_sheet(
        &self,
        sheet: &mut Worksheet,
        view: &PivotView,
        hours: &Format,
    ) -> Result<(), RenderError> {
        sheet
            .set_name(&view.sheet_name)
            .map_err(|e| RenderError::Format(format!("sheet '{}': {e}", view.sheet_name)))?;

        for (index, cells) in view.rows.iter().enumerate() {
            let row = index as u32 + 1;
            for (col, cell) in cells.iter().enumerate() {
                let col = col as u16;
                match cell {
                    Cell::Text(text) => sheet.write_string(row, col, text),
                    Cell::Integer(value) => sheet.write_number(row, col, *value as f64),
                    Cell::Number(value) => sheet.write_number_with_format(row, col, *value, hours),
                }
                .map_err(|e| RenderError::Format(e.to_string()))?;
            }
        }

        let columns: Vec<TableColumn> = unique_headers(&view.columns)
            .into_iter()
            .zip(&view.columns)
            .map(|(header, column)| table_column(header, column, view.total_row))
            .collect();

        let last_row = view.rows.len() as u32 + u32::from(view.total_row);
        let last_col = view.columns.len() as u16 - 1;
        let table = Table::new()
            .set_columns(&columns)
            .set_total_row(view.total_row);
        sheet
            .add_table(0, 0, last_row, last_col, &table)
            .map_err(|e| RenderError::Format(format!("sheet '{}': {e}", view.sheet_name)))?;

        sheet.set_column_width(0, self.label_width).ok();
        for col in 1..=last_col {
            sheet.set_column_width(col, self.value_width).ok();
        }

        debug!(
            sheet = %view.sheet_name,
            rows = view.rows.len(),
            columns = view.columns.len(),
            "sheet written"
        );
        Ok(())
    }
}

impl DocumentWriter for ExcelWriter {
    fn write(&self, book: &ReportBook, path: &Path) -> Result<(), RenderError> {
        let bytes = self.render_to_bytes(book)?;
        // never replace an existing report
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(&bytes)?;
        Ok(())
    }
}

fn table_column(header: String, column: &Column, total_row: bool) -> TableColumn {
    let mut table_column = TableColumn::new().set_header(header);
    if !total_row {
        return table_column;
    }
    if let Some(label) = &column.total_label {
        table_column = table_column.set_total_label(label);
    }
    match column.total_function {
        Some(TotalFunction::Sum) => table_column.set_total_function(TableFunction::Sum),
        None => table_column,
    }
}

/// Column labels made unique (case-insensitively) and non-empty
pub fn unique_headers(columns: &[Column]) -> Vec<String> {
    let mut seen = HashSet::new();
    columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let base = if column.label.trim().is_empty() {
                format!("Column{}", index + 1)
            } else {
                column.label.clone()
            };
            let mut candidate = base.clone();
            let mut n = 2;
            while !seen.insert(candidate.to_lowercase()) {
                candidate = format!("{base} ({n})");
                n += 1;
            }
            candidate
        })
        .collect()
}
