use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Clean a retail sales spreadsheet into an analysis-ready CSV",
    long_about = None
)]
pub struct Cli {
    /// Input dataset: a workbook (.xlsx, .xlsm, .xls, .ods) or delimited file (.csv, .tsv)
    #[arg(default_value = "dataset.xlsx")]
    pub input: PathBuf,
    /// Output CSV path (defaults to cleaned_retail_dataset.csv in the working directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Worksheet name for workbook inputs (first sheet when omitted)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Delimiter character for delimited-text inputs (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
