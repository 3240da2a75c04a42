use crate::record::Record;
use crate::{Result, ScrapeError};

/// Configuration for CSV output
#[derive(Debug, Clone)]
pub struct CsvConfig {
    /// Field delimiter
    pub delimiter: u8,
    /// Write the header row
    pub include_header: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self { delimiter: b',', include_header: true }
    }
}

/// CSV formatter with configurable options
pub struct CsvFormatter {
    config: CsvConfig,
}

impl CsvFormatter {
    pub fn new(config: CsvConfig) -> Self {
        Self { config }
    }

    pub fn convert(&self, columns: &[&str], records: &[Record]) -> Result<Vec<u8>> {
        records_to_csv(columns, records, &self.config)
    }
}

/// Serialize records as CSV, one column per field in `columns` order.
///
/// Fields a record lacks are written as empty cells.
pub fn records_to_csv(columns: &[&str], records: &[Record], config: &CsvConfig) -> Result<Vec<u8>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(config.delimiter)
        .from_writer(Vec::new());

    if config.include_header {
        writer.write_record(columns)?;
    }
    for record in records {
        writer.write_record(columns.iter().map(|column| record.value_or_empty(column)))?;
    }

    writer.into_inner().map_err(|e| ScrapeError::Output(e.to_string()))
}

/// Read CSV with a header row back into records.
pub fn records_from_csv(data: &[u8]) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_reader(data);
    let headers = reader.headers()?.clone();

    reader
        .records()
        .map(|row| -> Result<Record> {
            let row = row?;
            Ok(headers.iter().zip(row.iter()).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Record> {
        vec![
            [("name", "Acme, Inc."), ("email", "a@x.com")].into_iter().collect(),
            [("name", "Beta \"B\" Co"), ("email", "")].into_iter().collect(),
            [("name", "Gamma\nLine"), ("email", "g@x.com")].into_iter().collect(),
        ]
    }

    #[test]
    fn test_header_follows_columns() {
        let csv = records_to_csv(&["email", "name"], &sample()[..1], &CsvConfig::default()).unwrap();
        let text = String::from_utf8(csv).unwrap();
        assert_eq!(text, "email,name\na@x.com,\"Acme, Inc.\"\n");
    }

    #[test]
    fn test_missing_values_are_empty_cells() {
        let records: Vec<Record> = vec![[("name", "Beta")].into_iter().collect()];
        let csv = records_to_csv(&["name", "email"], &records, &CsvConfig::default()).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "name,email\nBeta,\n");
    }

    #[test]
    fn test_header_only_when_no_records() {
        let csv = records_to_csv(&["name", "email"], &[], &CsvConfig::default()).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "name,email\n");
    }

    #[test]
    fn test_round_trip_with_quoting() {
        let records = sample();
        let csv = records_to_csv(&["name", "email"], &records, &CsvConfig::default()).unwrap();
        let parsed = records_from_csv(&csv).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_custom_delimiter() {
        let config = CsvConfig { delimiter: b'\t', include_header: false };
        let csv = CsvFormatter::new(config).convert(&["name", "email"], &sample()[..1]).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "Acme, Inc.\ta@x.com\n");
    }
}
