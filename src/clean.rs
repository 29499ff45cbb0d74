//! The cleaning pipeline: a fixed sequence of whole-table passes that turns
//! a raw retail sales spreadsheet into an analysis-ready CSV.
//!
//! Order matters and is part of the contract: load, dedup, date/time
//! normalization, vacuous-column drop, text normalization, numeric coercion
//! with median imputation, derived metrics, row filtering, export. Cell-level
//! parse failures become missing values; only loading and exporting can fail.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use log::{debug, info};

use crate::{
    cli::Cli,
    data::{self, Value},
    frame::{self, Frame},
    io_utils, load,
};

/// Default output filename, written to the current working directory.
pub const DEFAULT_OUTPUT: &str = "cleaned_retail_dataset.csv";

pub const DATE_COLUMN: &str = "dt";
pub const TIME_COLUMN: &str = "time";
pub const DISCOUNT_COLUMN: &str = "discount";

/// Text columns that are trimmed and title-cased.
pub const TITLE_CASE_COLUMNS: [&str; 4] = ["item_desc", "category", "payment_type", "order_type"];
/// Trimmed only; codes keep their casing.
pub const TRIM_ONLY_COLUMNS: [&str; 1] = ["store_code"];

/// Columns coerced to floats and median-imputed, in processing order.
pub const NUMERIC_COLUMNS: [&str; 10] = [
    "quantity",
    "rate",
    "tax_percent",
    "total",
    "cost_price",
    "speed",
    "availability",
    "quality",
    "hygiene",
    "service",
];

/// Inputs to the per-row customer satisfaction mean.
pub const SCORE_COLUMNS: [&str; 4] = ["quality", "service", "speed", "hygiene"];

#[derive(Debug, Clone)]
pub struct CleanOptions {
    /// Worksheet to read from Excel workbooks; first sheet when `None`.
    pub sheet: Option<String>,
    /// Delimiter override for delimited-text inputs.
    pub delimiter: Option<u8>,
    /// Destination for the cleaned CSV.
    pub output: PathBuf,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            sheet: None,
            delimiter: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

pub fn execute(cli: &Cli) -> Result<()> {
    let options = CleanOptions {
        sheet: cli.sheet.clone(),
        delimiter: cli.delimiter,
        output: cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
    };
    let frame = clean_with_options(&cli.input, &options)?;
    info!(
        "Cleaning complete: {} row(s), {} column(s)",
        frame.row_count(),
        frame.column_count()
    );
    Ok(())
}

/// Cleans the dataset at `path` with default options, writing
/// `cleaned_retail_dataset.csv` to the working directory and returning the
/// cleaned table.
pub fn clean(path: impl AsRef<Path>) -> Result<Frame> {
    clean_with_options(path.as_ref(), &CleanOptions::default())
}

pub fn clean_with_options(path: &Path, options: &CleanOptions) -> Result<Frame> {
    info!("Loading dataset from '{}'", path.display());
    if let Some(delimiter) = options.delimiter {
        debug!(
            "Using delimiter override '{}'",
            io_utils::printable_delimiter(delimiter)
        );
    }
    let mut frame = load::load(path, options.sheet.as_deref(), options.delimiter)
        .with_context(|| format!("Loading dataset {path:?}"))?;
    info!(
        "Loaded {} row(s) across {} column(s)",
        frame.row_count(),
        frame.column_count()
    );

    info!("Removing duplicate rows");
    let removed = frame.dedup_rows();
    debug!("Removed {removed} duplicate row(s)");

    normalize_temporal_columns(&mut frame)?;
    drop_vacuous_discount(&mut frame);
    normalize_text_columns(&mut frame)?;
    impute_numeric_columns(&mut frame)?;
    add_derived_columns(&mut frame)?;
    filter_impossible_rows(&mut frame)?;
    export(&frame, &options.output)?;

    Ok(frame)
}

fn require_column(frame: &Frame, name: &str) -> Result<usize> {
    frame
        .column_index(name)
        .ok_or_else(|| anyhow!("Expected column '{name}' is missing from the dataset"))
}

/// Step 3: `dt` becomes a calendar date, `time` the time-of-day component.
/// Unparseable values become missing, never errors.
fn normalize_temporal_columns(frame: &mut Frame) -> Result<()> {
    info!("Converting '{DATE_COLUMN}' to calendar dates");
    let date_index = require_column(frame, DATE_COLUMN)?;
    frame.map_column(date_index, |cell| match cell {
        Some(Value::Date(date)) => Some(Value::Date(date)),
        Some(Value::DateTime(dt)) => Some(Value::Date(dt.date())),
        Some(Value::String(s)) => data::parse_naive_date(s.trim()).ok().map(Value::Date),
        _ => None,
    });

    info!("Extracting time-of-day from '{TIME_COLUMN}'");
    let time_index = require_column(frame, TIME_COLUMN)?;
    frame.map_column(time_index, |cell| match cell {
        Some(Value::Time(time)) => Some(Value::Time(time)),
        Some(Value::DateTime(dt)) => Some(Value::Time(dt.time())),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            data::parse_naive_datetime(trimmed)
                .map(|dt| dt.time())
                .or_else(|_| data::parse_naive_time(trimmed))
                .ok()
                .map(Value::Time)
        }
        _ => None,
    });
    Ok(())
}

/// Step 4: the discount column is dropped when it carries no data at all.
/// Checked exactly once; an input without the column is a no-op.
fn drop_vacuous_discount(frame: &mut Frame) {
    if let Some(index) = frame.column_index(DISCOUNT_COLUMN) {
        if frame.column_is_all_missing(index) {
            info!("Dropping completely missing column: {DISCOUNT_COLUMN}");
            frame.drop_column(index);
        }
    }
}

/// Step 5: trim plus title-case for descriptive columns; trim only for
/// store codes. Non-string cells pass through unchanged.
fn normalize_text_columns(frame: &mut Frame) -> Result<()> {
    info!("Standardizing text columns");
    for name in TITLE_CASE_COLUMNS {
        let index = require_column(frame, name)?;
        frame.map_column(index, |cell| match cell {
            Some(Value::String(s)) => Some(Value::String(data::title_case(s.trim()))),
            other => other,
        });
    }
    for name in TRIM_ONLY_COLUMNS {
        let index = require_column(frame, name)?;
        frame.map_column(index, |cell| match cell {
            Some(Value::String(s)) => Some(Value::String(s.trim().to_string())),
            other => other,
        });
    }
    Ok(())
}

/// Step 6: coerce the ten numeric columns to floats, then fill each
/// column's gaps with its own median. The median is computed once per
/// column over the values present after coercion. A column with no
/// parseable values at all falls back to a 0.0 fill.
fn impute_numeric_columns(frame: &mut Frame) -> Result<()> {
    info!(
        "Coercing numeric columns and filling gaps with column medians: {}",
        NUMERIC_COLUMNS.iter().join(", ")
    );
    for name in NUMERIC_COLUMNS {
        let index = require_column(frame, name)?;
        frame.map_column(index, |cell| {
            cell.and_then(|value| data::coerce_numeric(&value))
                .map(Value::Float)
        });

        let present = frame
            .column(index)
            .filter_map(|cell| match cell {
                Some(Value::Float(f)) => Some(*f),
                _ => None,
            })
            .collect::<Vec<_>>();
        let missing = frame.row_count() - present.len();
        if missing == 0 {
            continue;
        }
        let fill = frame::median(&present).unwrap_or(0.0);
        debug!("Filling {missing} missing value(s) in '{name}' with {fill}");
        frame.map_column(index, |cell| cell.or(Some(Value::Float(fill))));
    }
    Ok(())
}

fn numeric_column(frame: &Frame, name: &str) -> Result<Vec<f64>> {
    let index = require_column(frame, name)?;
    frame
        .column(index)
        .map(|cell| match cell {
            Some(Value::Float(f)) => Ok(*f),
            other => Err(anyhow!(
                "Column '{name}' holds non-numeric cell {other:?} after imputation"
            )),
        })
        .collect()
}

/// Step 7: the five derived metrics, appended in a fixed order.
fn add_derived_columns(frame: &mut Frame) -> Result<()> {
    info!("Computing derived metrics");
    let quantity = numeric_column(frame, "quantity")?;
    let rate = numeric_column(frame, "rate")?;
    let total = numeric_column(frame, "total")?;
    let cost_price = numeric_column(frame, "cost_price")?;

    let expected_total = quantity
        .iter()
        .zip(&rate)
        .map(|(q, r)| q * r)
        .collect::<Vec<_>>();
    // Exact float comparison against the stored total is deliberate: a
    // mismatch flag, not a tolerance check.
    let total_mismatch = expected_total
        .iter()
        .zip(&total)
        .map(|(expected, actual)| Some(Value::Boolean(expected != actual)))
        .collect::<Vec<_>>();
    let profit_per_unit = rate
        .iter()
        .zip(&cost_price)
        .map(|(r, c)| r - c)
        .collect::<Vec<_>>();
    let total_profit = quantity
        .iter()
        .zip(&profit_per_unit)
        .map(|(q, p)| q * p)
        .collect::<Vec<_>>();

    let score_columns = SCORE_COLUMNS
        .iter()
        .map(|name| numeric_column(frame, name))
        .collect::<Result<Vec<_>>>()?;
    let customer_score = (0..frame.row_count())
        .map(|row| {
            let sum: f64 = score_columns.iter().map(|column| column[row]).sum();
            sum / SCORE_COLUMNS.len() as f64
        })
        .collect::<Vec<_>>();

    frame.push_column("expected_total", float_cells(expected_total))?;
    frame.push_column("total_mismatch", total_mismatch)?;
    frame.push_column("profit_per_unit", float_cells(profit_per_unit))?;
    frame.push_column("total_profit", float_cells(total_profit))?;
    frame.push_column("customer_score", float_cells(customer_score))?;
    Ok(())
}

fn float_cells(values: Vec<f64>) -> Vec<Option<Value>> {
    values.into_iter().map(|v| Some(Value::Float(v))).collect()
}

/// Step 8: drop rows with non-positive quantity, then non-positive total.
/// Two sequential passes, matching the documented filter semantics.
fn filter_impossible_rows(frame: &mut Frame) -> Result<()> {
    info!("Removing rows with non-positive quantity or total");
    let mut dropped = 0usize;
    for name in ["quantity", "total"] {
        let index = require_column(frame, name)?;
        dropped += frame.retain_rows(|row| {
            matches!(row.get(index), Some(Some(Value::Float(f))) if *f > 0.0)
        });
    }
    debug!("Dropped {dropped} row(s) with non-positive quantity or total");
    Ok(())
}

/// Step 9: comma-separated UTF-8 with a header row and no row index.
fn export(frame: &Frame, path: &Path) -> Result<()> {
    info!("Saving cleaned dataset to '{}'", path.display());
    let mut writer = io_utils::open_csv_writer(path)?;
    frame
        .write_csv(&mut writer)
        .with_context(|| format!("Writing cleaned dataset to {path:?}"))?;
    writer
        .flush()
        .with_context(|| format!("Flushing cleaned dataset to {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Cell;

    fn text(value: &str) -> Cell {
        Some(Value::String(value.to_string()))
    }

    fn float(value: f64) -> Cell {
        Some(Value::Float(value))
    }

    #[test]
    fn drop_vacuous_discount_requires_every_cell_missing() {
        let mut empty = Frame::new(
            vec!["discount".into(), "other".into()],
            vec![vec![None, text("x")], vec![None, text("y")]],
        )
        .unwrap();
        drop_vacuous_discount(&mut empty);
        assert!(empty.column_index("discount").is_none());

        let mut partial = Frame::new(
            vec!["discount".into(), "other".into()],
            vec![vec![None, text("x")], vec![text("5%"), text("y")]],
        )
        .unwrap();
        drop_vacuous_discount(&mut partial);
        assert!(partial.column_index("discount").is_some());

        // Absent column is tolerated.
        let mut absent = Frame::new(vec!["other".into()], vec![vec![text("x")]]).unwrap();
        drop_vacuous_discount(&mut absent);
        assert_eq!(absent.column_count(), 1);
    }

    #[test]
    fn impute_fills_missing_cells_with_column_median() {
        let mut frame = Frame::new(
            vec![
                "quantity".into(),
                "rate".into(),
                "tax_percent".into(),
                "total".into(),
                "cost_price".into(),
                "speed".into(),
                "availability".into(),
                "quality".into(),
                "hygiene".into(),
                "service".into(),
            ],
            vec![
                vec![
                    text("2"),
                    float(10.0),
                    float(5.0),
                    float(20.0),
                    float(6.0),
                    float(4.0),
                    float(1.0),
                    float(4.0),
                    float(4.0),
                    float(5.0),
                ],
                vec![
                    None,
                    float(30.0),
                    text("bad"),
                    float(30.0),
                    float(9.0),
                    float(2.0),
                    float(1.0),
                    float(2.0),
                    float(3.0),
                    float(3.0),
                ],
                vec![
                    text("6"),
                    float(20.0),
                    float(9.0),
                    float(120.0),
                    float(12.0),
                    float(3.0),
                    float(1.0),
                    float(3.0),
                    float(5.0),
                    float(4.0),
                ],
            ],
        )
        .unwrap();

        impute_numeric_columns(&mut frame).unwrap();

        let quantity_index = frame.column_index("quantity").unwrap();
        // Median of the present quantities 2 and 6.
        assert_eq!(frame.rows()[1][quantity_index], float(4.0));
        let tax_index = frame.column_index("tax_percent").unwrap();
        // "bad" coerces to missing, then takes the median of 5 and 9.
        assert_eq!(frame.rows()[1][tax_index], float(7.0));
    }

    #[test]
    fn impute_falls_back_to_zero_for_all_missing_column() {
        let headers: Vec<String> = NUMERIC_COLUMNS.iter().map(|n| n.to_string()).collect();
        let mut frame = Frame::new(
            headers,
            vec![vec![
                None,
                float(1.0),
                float(1.0),
                float(1.0),
                float(1.0),
                float(1.0),
                float(1.0),
                float(1.0),
                float(1.0),
                float(1.0),
            ]],
        )
        .unwrap();
        impute_numeric_columns(&mut frame).unwrap();
        assert_eq!(frame.rows()[0][0], float(0.0));
    }

    #[test]
    fn filter_drops_non_positive_and_missing_numeric_rows() {
        let mut frame = Frame::new(
            vec!["quantity".into(), "total".into()],
            vec![
                vec![float(2.0), float(20.0)],
                vec![float(-1.0), float(20.0)],
                vec![float(2.0), float(0.0)],
                vec![None, float(10.0)],
                vec![float(3.0), float(45.0)],
            ],
        )
        .unwrap();
        filter_impossible_rows(&mut frame).unwrap();
        assert_eq!(frame.row_count(), 2);
    }

    #[test]
    fn derived_columns_follow_their_formulas() {
        let mut frame = Frame::new(
            vec![
                "quantity".into(),
                "rate".into(),
                "total".into(),
                "cost_price".into(),
                "quality".into(),
                "service".into(),
                "speed".into(),
                "hygiene".into(),
            ],
            vec![vec![
                float(2.0),
                float(10.0),
                float(25.0),
                float(6.0),
                float(4.0),
                float(5.0),
                float(3.0),
                float(4.0),
            ]],
        )
        .unwrap();
        add_derived_columns(&mut frame).unwrap();

        let row = &frame.rows()[0];
        let get = |name: &str| row[frame.column_index(name).unwrap()].clone();
        assert_eq!(get("expected_total"), float(20.0));
        assert_eq!(get("total_mismatch"), Some(Value::Boolean(true)));
        assert_eq!(get("profit_per_unit"), float(4.0));
        assert_eq!(get("total_profit"), float(8.0));
        assert_eq!(get("customer_score"), float(4.0));
    }

    #[test]
    fn temporal_normalization_converts_failures_to_missing() {
        let mut frame = Frame::new(
            vec!["dt".into(), "time".into()],
            vec![
                vec![text("2024-05-06"), text("2024-05-06 14:30:00")],
                vec![text("not a date"), text("13:45")],
                vec![None, text("nope")],
            ],
        )
        .unwrap();
        normalize_temporal_columns(&mut frame).unwrap();

        use chrono::{NaiveDate, NaiveTime};
        assert_eq!(
            frame.rows()[0][0],
            Some(Value::Date(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()))
        );
        assert_eq!(
            frame.rows()[0][1],
            Some(Value::Time(NaiveTime::from_hms_opt(14, 30, 0).unwrap()))
        );
        assert_eq!(frame.rows()[1][0], None);
        assert_eq!(
            frame.rows()[1][1],
            Some(Value::Time(NaiveTime::from_hms_opt(13, 45, 0).unwrap()))
        );
        assert_eq!(frame.rows()[2][1], None);
    }
}
