//! Record sinks.
//!
//! A [`RecordSink`] receives the final, ordered records of a run together with
//! the column names from the selector config. Output is rendered in memory
//! first, so a serialization error never leaves a half-written file behind.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::formatters::OutputFormat;
use crate::record::Record;
use crate::{Result, ScrapeError};

/// Destination for extracted records.
pub trait RecordSink {
    /// Writes every record; `columns` is the field order to use.
    fn write(&mut self, columns: &[&str], records: &[Record]) -> Result<()>;

    /// Human-readable destination, for reports.
    fn destination(&self) -> String;
}

/// Writes records to a file.
///
/// # Example
///
/// ```rust,no_run
/// use rolodex_core::{FileSink, OutputFormat, Record, RecordSink};
///
/// let mut sink = FileSink::new("~/leads/marketing_list", OutputFormat::Csv);
/// let records: Vec<Record> = vec![[("name", "Acme")].into_iter().collect()];
/// sink.write(&["name"], &records).unwrap();
/// // written to ~/leads/marketing_list.csv
/// ```
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    /// Creates a sink for `path`, normalized with [`normalize_output_path`].
    ///
    /// Nothing touches the filesystem until [`RecordSink::write`].
    pub fn new(path: impl AsRef<Path>, format: OutputFormat) -> Self {
        Self { path: normalize_output_path(path.as_ref(), format), format }
    }

    /// The normalized target path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

impl RecordSink for FileSink {
    fn write(&mut self, columns: &[&str], records: &[Record]) -> Result<()> {
        let payload = self.format.render(columns, records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(&self.path);
        if let Err(err) = fs::write(&partial, &payload).and_then(|_| fs::rename(&partial, &self.path)) {
            let _ = fs::remove_file(&partial);
            return Err(ScrapeError::Io(err));
        }

        tracing::debug!(path = %self.path.display(), bytes = payload.len(), "wrote records");
        Ok(())
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

/// Writes records to any `io::Write`, e.g. stdout.
pub struct WriterSink<W: Write> {
    writer: W,
    format: OutputFormat,
    label: String,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W, format: OutputFormat, label: impl Into<String>) -> Self {
        Self { writer, format, label: label.into() }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for WriterSink<W> {
    fn write(&mut self, columns: &[&str], records: &[Record]) -> Result<()> {
        let payload = self.format.render(columns, records)?;
        self.writer.write_all(&payload)?;
        self.writer.flush()?;
        Ok(())
    }

    fn destination(&self) -> String {
        self.label.clone()
    }
}

/// Normalizes an output path.
///
/// - a leading `~` is expanded to the home directory
/// - relative paths are made absolute against the current directory
/// - the extension is replaced by the format's (`out.txt` -> `out.csv`)
pub fn normalize_output_path(path: &Path, format: OutputFormat) -> PathBuf {
    let expanded = expand_home(path);
    let absolute = std::path::absolute(&expanded).unwrap_or(expanded);

    let matches = absolute
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(format.extension()));

    if matches { absolute } else { absolute.with_extension(format.extension()) }
}

fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn sample() -> Vec<Record> {
        vec![
            [("name", "Acme"), ("email", "a@x.com")].into_iter().collect(),
            [("name", "Beta"), ("email", "")].into_iter().collect(),
        ]
    }

    #[rstest]
    #[case("out.csv", OutputFormat::Csv, "out.csv")]
    #[case("out.CSV", OutputFormat::Csv, "out.CSV")]
    #[case("out", OutputFormat::Csv, "out.csv")]
    #[case("out.txt", OutputFormat::Json, "out.json")]
    #[case("list.csv", OutputFormat::Json, "list.json")]
    fn test_extension_is_forced(#[case] input: &str, #[case] format: OutputFormat, #[case] expected: &str) {
        let path = normalize_output_path(Path::new(input), format);
        assert!(path.is_absolute());
        assert_eq!(path.file_name().unwrap(), expected);
    }

    #[test]
    fn test_home_is_expanded() {
        let Some(home) = dirs::home_dir() else { return };
        let path = normalize_output_path(Path::new("~/leads/list"), OutputFormat::Csv);
        assert_eq!(path, home.join("leads").join("list.csv"));
    }

    #[test]
    fn test_file_sink_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("nested").join("deeper").join("list");
        let mut sink = FileSink::new(&target, OutputFormat::Csv);

        sink.write(&["name", "email"], &sample()).unwrap();

        let written = fs::read_to_string(tmp.path().join("nested/deeper/list.csv")).unwrap();
        assert_eq!(written, "name,email\nAcme,a@x.com\nBeta,\n");
        assert!(!tmp.path().join("nested/deeper/list.csv.partial").exists());
    }

    #[test]
    fn test_file_sink_json() {
        let tmp = TempDir::new().unwrap();
        let mut sink = FileSink::new(tmp.path().join("list.json"), OutputFormat::Json);
        sink.write(&["name", "email"], &sample()).unwrap();

        let parsed = crate::formatters::records_from_json(&fs::read(sink.path()).unwrap()).unwrap();
        assert_eq!(parsed, sample());
        assert!(sink.destination().ends_with("list.json"));
    }

    #[test]
    fn test_file_sink_reports_io_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut sink = FileSink::new(blocker.join("list.csv"), OutputFormat::Csv);
        let err = sink.write(&["name"], &sample()).unwrap_err();
        assert!(matches!(err, ScrapeError::Io(_)));
    }

    #[test]
    fn test_writer_sink() {
        let mut sink = WriterSink::new(Vec::new(), OutputFormat::Csv, "stdout");
        sink.write(&["email", "name"], &sample()).unwrap();
        assert_eq!(sink.destination(), "stdout");
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "email,name\na@x.com,Acme\n,Beta\n");
    }
}
