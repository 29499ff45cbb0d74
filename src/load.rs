//! Dataset ingestion: spreadsheet workbooks via `calamine`, delimited text
//! via the `csv` crate, dispatched on file extension. Everything surfaced
//! here is fatal; cell-level parse problems are downstream policy, not load
//! errors.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use calamine::{Data, Reader, open_workbook_auto};
use thiserror::Error;

use crate::{
    data::Value,
    frame::{Cell, Frame},
    io_utils,
};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("input file {0:?} does not exist")]
    Missing(PathBuf),
    #[error("unsupported input extension for {0:?}: expected .xlsx, .xlsm, .xls, .ods, .csv, or .tsv")]
    UnsupportedExtension(PathBuf),
    #[error("failed to open spreadsheet {path:?}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },
    #[error("spreadsheet {0:?} contains no worksheets")]
    NoWorksheets(PathBuf),
    #[error("failed to read worksheet '{name}'")]
    Worksheet {
        name: String,
        #[source]
        source: calamine::Error,
    },
    #[error("input {0:?} has no header row")]
    NoHeaders(PathBuf),
    #[error("failed to open input file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read delimited input {path:?}")]
    Delimited {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("input {path:?} is not tabular: {message}")]
    NotTabular { path: PathBuf, message: String },
}

/// Reads the file at `path` into a [`Frame`]. The first row supplies the
/// column names; every other row becomes a data row with empty cells mapped
/// to missing.
pub fn load(path: &Path, sheet: Option<&str>, delimiter: Option<u8>) -> Result<Frame, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing(path.to_path_buf()));
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => load_workbook(path, sheet),
        Some("csv" | "tsv") => {
            load_delimited(path, io_utils::resolve_input_delimiter(path, delimiter))
        }
        _ => Err(LoadError::UnsupportedExtension(path.to_path_buf())),
    }
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<Frame, LoadError> {
    let mut workbook = open_workbook_auto(path).map_err(|source| LoadError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| LoadError::NoWorksheets(path.to_path_buf()))?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|source| LoadError::Worksheet {
            name: sheet_name.clone(),
            source,
        })?;

    let mut sheet_rows = range.rows();
    let headers = sheet_rows
        .next()
        .ok_or_else(|| LoadError::NoHeaders(path.to_path_buf()))?
        .iter()
        .map(header_label)
        .collect::<Vec<_>>();
    let rows = sheet_rows
        .map(|row| row.iter().map(cell_from_sheet).collect())
        .collect::<Vec<Vec<Cell>>>();

    Frame::new(headers, rows).map_err(|err| LoadError::NotTabular {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn header_label(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

fn cell_from_sheet(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => dt.as_datetime().map(Value::DateTime),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

fn load_delimited(path: &Path, delimiter: u8) -> Result<Frame, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = io_utils::open_csv_reader(BufReader::new(file), delimiter);

    let headers = reader
        .headers()
        .map_err(|source| LoadError::Delimited {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();
    if headers.is_empty() {
        return Err(LoadError::NoHeaders(path.to_path_buf()));
    }

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Delimited {
            path: path.to_path_buf(),
            source,
        })?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(Value::String(field.to_string()))
                    }
                })
                .collect(),
        );
    }

    Frame::new(headers, rows).map_err(|err| LoadError::NotTabular {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
