use std::collections::HashSet;

use anyhow::{Result, bail};

use crate::data::Value;

/// A single cell; `None` marks a missing value.
pub type Cell = Option<Value>;

/// An in-memory table: ordered named columns with rows aligned by position.
/// Rows always have exactly one cell per header.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let width = headers.len();
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                bail!(
                    "Row {} has {} cell(s) but the table defines {} column(s)",
                    idx + 1,
                    row.len(),
                    width
                );
            }
        }
        Ok(Frame { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Removes rows that duplicate an earlier row across every column,
    /// keeping the first occurrence and the relative order of survivors.
    /// Returns the number of rows removed.
    pub fn dedup_rows(&mut self) -> usize {
        let before = self.rows.len();
        let mut seen: HashSet<Vec<Cell>> = HashSet::with_capacity(before);
        self.rows.retain(|row| seen.insert(row.clone()));
        before - self.rows.len()
    }

    /// Rewrites every cell of one column in place.
    pub fn map_column<F>(&mut self, index: usize, mut f: F)
    where
        F: FnMut(Cell) -> Cell,
    {
        for row in &mut self.rows {
            let cell = row[index].take();
            row[index] = f(cell);
        }
    }

    pub fn column_is_all_missing(&self, index: usize) -> bool {
        self.column(index).all(|cell| cell.is_none())
    }

    pub fn drop_column(&mut self, index: usize) {
        self.headers.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
    }

    /// Appends a new column on the right. The cell count must match the
    /// current row count and the name must not collide with an existing one.
    pub fn push_column(&mut self, name: &str, cells: Vec<Cell>) -> Result<()> {
        if self.column_index(name).is_some() {
            bail!("Column '{name}' already exists");
        }
        if cells.len() != self.rows.len() {
            bail!(
                "Column '{name}' has {} cell(s) but the table has {} row(s)",
                cells.len(),
                self.rows.len()
            );
        }
        self.headers.push(name.to_string());
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
        Ok(())
    }

    /// Keeps only rows matching the predicate; returns the number dropped.
    pub fn retain_rows<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&[Cell]) -> bool,
    {
        let before = self.rows.len();
        self.rows.retain(|row| predicate(row));
        before - self.rows.len()
    }

    /// Writes the frame as delimited text: header row first, missing cells
    /// as empty fields, no synthetic row-index column.
    pub fn write_csv<W>(&self, writer: &mut csv::Writer<W>) -> Result<()>
    where
        W: std::io::Write,
    {
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            let record = row
                .iter()
                .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default());
            writer.write_record(record)?;
        }
        Ok(())
    }
}

/// Median of an already-coerced numeric column; `None` when empty.
/// Even-length inputs take the mean of the two middle values.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
