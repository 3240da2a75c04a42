pub mod csv;
pub mod json;

use std::fmt;
use std::str::FromStr;

use crate::Result;
use crate::record::Record;

pub use self::csv::{CsvConfig, CsvFormatter, records_from_csv, records_to_csv};
pub use self::json::{JsonConfig, JsonFormatter, records_from_json, records_to_json};

/// Serialization format for extracted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Header row plus one row per record.
    #[default]
    Csv,
    /// Array of objects, pretty printed.
    Json,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
        }
    }

    /// Renders records with the format's default configuration.
    pub fn render(self, columns: &[&str], records: &[Record]) -> Result<Vec<u8>> {
        match self {
            OutputFormat::Csv => records_to_csv(columns, records, &CsvConfig::default()),
            OutputFormat::Json => records_to_json(columns, records, &JsonConfig::default()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid format: {}. Valid options: csv, json", s)),
        }
    }
}
