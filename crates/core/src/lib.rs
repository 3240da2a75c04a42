pub mod error;
pub mod extract;
pub mod fetch;
pub mod formatters;
pub mod parse;
pub mod pipeline;
pub mod record;
pub mod selectors;
pub mod sink;

pub use error::{ExtractionError, Result, ScrapeError, Stage};
pub use extract::{Card, RunResult, extract_cards};
#[cfg(feature = "fetch")]
pub use fetch::HttpTransport;
pub use fetch::{
    AttemptLog, AttemptOutcome, DEFAULT_USER_AGENT, FailureKind, FetchFailure, FetchPolicy, FetchRequest, FetchResult,
    FetchSuccess, Fetcher, RawResponse, Transport, TransportError, validate_url,
};
pub use formatters::{CsvConfig, CsvFormatter, JsonConfig, JsonFormatter, OutputFormat};
pub use formatters::{records_from_csv, records_from_json, records_to_csv, records_to_json};
pub use parse::{Document, Element};
pub use pipeline::{PageReport, Pipeline, RunReport};
pub use record::Record;
pub use selectors::{
    DEFAULT_CARD_SELECTOR, DEFAULT_EMAIL_SELECTOR, DEFAULT_NAME_SELECTOR, FieldSelector, SelectorConfig,
    SelectorConfigBuilder,
};
pub use sink::{FileSink, RecordSink, WriterSink, normalize_output_path};

/// Re-exported so callers can cancel a run without a direct `tokio-util` dependency.
pub use tokio_util::sync::CancellationToken;
