use crate::Result;
use crate::record::Record;

/// Configuration for JSON output
#[derive(Debug, Clone)]
pub struct JsonConfig {
    /// Pretty print JSON output
    pub pretty: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

/// JSON formatter with configurable options
pub struct JsonFormatter {
    config: JsonConfig,
}

impl JsonFormatter {
    pub fn new(config: JsonConfig) -> Self {
        Self { config }
    }

    pub fn convert(&self, columns: &[&str], records: &[Record]) -> Result<Vec<u8>> {
        records_to_json(columns, records, &self.config)
    }
}

/// Serialize records as a JSON array of objects.
///
/// Every object has exactly the keys in `columns`, in that order, with
/// string values; fields a record lacks become `""`.
pub fn records_to_json(columns: &[&str], records: &[Record], config: &JsonConfig) -> Result<Vec<u8>> {
    let rows: Vec<Record> = records
        .iter()
        .map(|record| columns.iter().map(|&column| (column, record.value_or_empty(column))).collect())
        .collect();

    let mut out = if config.pretty { serde_json::to_vec_pretty(&rows)? } else { serde_json::to_vec(&rows)? };
    out.push(b'\n');
    Ok(out)
}

/// Read a JSON array of objects back into records.
pub fn records_from_json(data: &[u8]) -> Result<Vec<Record>> {
    Ok(serde_json::from_slice(data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Record> {
        vec![
            [("name", "Acme"), ("email", "a@x.com")].into_iter().collect(),
            [("name", "Bêta \"B\""), ("email", "")].into_iter().collect(),
        ]
    }

    #[test]
    fn test_compact_output() {
        let json = records_to_json(&["name", "email"], &sample(), &JsonConfig { pretty: false }).unwrap();
        assert_eq!(
            String::from_utf8(json).unwrap(),
            "[{\"name\":\"Acme\",\"email\":\"a@x.com\"},{\"name\":\"Bêta \\\"B\\\"\",\"email\":\"\"}]\n"
        );
    }

    #[test]
    fn test_pretty_is_default() {
        let json = JsonFormatter::new(JsonConfig::default()).convert(&["name"], &sample()).unwrap();
        let text = String::from_utf8(json).unwrap();
        assert!(text.starts_with("[\n  {\n    \"name\": \"Acme\""));
        assert!(!text.contains("email"));
    }

    #[test]
    fn test_missing_fields_become_empty_strings() {
        let records: Vec<Record> = vec![[("name", "Beta")].into_iter().collect()];
        let json = records_to_json(&["name", "email"], &records, &JsonConfig { pretty: false }).unwrap();
        assert_eq!(String::from_utf8(json).unwrap(), "[{\"name\":\"Beta\",\"email\":\"\"}]\n");
    }

    #[test]
    fn test_empty_array() {
        let json = records_to_json(&["name"], &[], &JsonConfig { pretty: false }).unwrap();
        assert_eq!(json, b"[]\n");
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let records = sample();
        let json = records_to_json(&["name", "email"], &records, &JsonConfig::default()).unwrap();
        let parsed = records_from_json(&json).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn test_structural_equality_with_serde_value() {
        let json = records_to_json(&["name", "email"], &sample(), &JsonConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value[0]["name"], "Acme");
        assert_eq!(value[1]["email"], "");
        assert_eq!(value.as_array().unwrap().len(), 2);
    }
}
