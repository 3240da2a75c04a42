//! Fetch, parse, extract, and write in one run.
//!
//! [`Pipeline`] sequences [`Fetcher`] -> [`Document`] -> [`extract_cards`] ->
//! [`RecordSink`]. Fetch and parse failures abort the run before anything is
//! written. Per-card problems and "no cards found" are reported in the
//! [`RunReport`] without failing the run.
//!
//! # Example
//!
//! ```rust,no_run
//! use rolodex_core::{FetchPolicy, FileSink, OutputFormat, Pipeline, SelectorConfig};
//!
//! # async fn example() -> rolodex_core::Result<()> {
//! let config = SelectorConfig::builder()
//!     .card("div.business-card")
//!     .field("name", "h2")
//!     .field("email", "span.email")
//!     .build()?;
//! let mut sink = FileSink::new("marketing_list.csv", OutputFormat::Csv);
//!
//! let report = Pipeline::http()?
//!     .run("https://example.com/directory", &config, &FetchPolicy::default(), &mut sink)
//!     .await?;
//! println!("{} records written", report.records_written);
//! # Ok(())
//! # }
//! ```

use url::Url;

use crate::extract::{RunResult, extract_cards};
use crate::fetch::{AttemptLog, DefaultTransport, FetchPolicy, Fetcher, Transport};
use crate::parse::Document;
use crate::selectors::SelectorConfig;
use crate::sink::RecordSink;
use crate::{Result, ScrapeError};

/// What one page contributed to a run.
#[derive(Debug, Clone)]
pub struct PageReport {
    /// URL as requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: Url,
    pub status: u16,
    pub attempts: Vec<AttemptLog>,
    pub result: RunResult,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per URL, in request order.
    pub pages: Vec<PageReport>,
    /// Records handed to the sink.
    pub records_written: usize,
    /// False when there was nothing to write.
    pub wrote_output: bool,
    /// Sink destination, when output was written.
    pub destination: Option<String>,
}

impl RunReport {
    /// Every page's result merged in page order.
    pub fn combined(&self) -> RunResult {
        let mut combined = RunResult::default();
        for page in &self.pages {
            combined.merge(page.result.clone());
        }
        combined
    }

    pub fn skipped_cards(&self) -> usize {
        self.pages.iter().map(|p| p.result.skipped_cards).sum()
    }

    pub fn total_cards(&self) -> usize {
        self.pages.iter().map(|p| p.result.total_cards).sum()
    }

    /// URLs whose card selector matched nothing.
    pub fn pages_without_cards(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().filter(|p| p.result.no_cards_found()).map(|p| p.url.as_str())
    }
}

/// Runs pages through fetch, parse, extract, and sink.
pub struct Pipeline<T = DefaultTransport> {
    fetcher: Fetcher<T>,
}

#[cfg(feature = "fetch")]
impl Pipeline<crate::fetch::HttpTransport> {
    /// Creates a pipeline over a fresh `reqwest` client.
    pub fn http() -> Result<Self> {
        Ok(Self::new(Fetcher::http()?))
    }
}

impl<T: Transport> Pipeline<T> {
    pub fn new(fetcher: Fetcher<T>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Fetches, parses, and extracts one page without writing anything.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Fetch`] when the page cannot be retrieved and
    /// [`ScrapeError::Parse`] when the body is not a usable document.
    pub async fn scrape_page(&self, url: &str, config: &SelectorConfig, policy: &FetchPolicy) -> Result<PageReport> {
        let page = self.fetcher.fetch(&policy.request(url)).await.into_result()?;

        let result = {
            let doc = Document::parse_bytes_with_charset(&page.body, page.charset.as_deref())?;
            extract_cards(&doc, config)
        };

        tracing::info!(
            url,
            status = page.status,
            cards = result.total_cards,
            records = result.records.len(),
            skipped = result.skipped_cards,
            "extracted page"
        );
        if result.no_cards_found() {
            tracing::warn!(url, selector = config.card(), "no cards matched; check selectors and page structure");
        }

        Ok(PageReport {
            url: url.to_string(),
            final_url: page.final_url,
            status: page.status,
            attempts: page.attempts,
            result,
        })
    }

    /// Runs a single URL; see [`Pipeline::run_all`].
    pub async fn run(
        &self, url: &str, config: &SelectorConfig, policy: &FetchPolicy, sink: &mut dyn RecordSink,
    ) -> Result<RunReport> {
        self.run_all(&[url], config, policy, sink).await
    }

    /// Runs every URL in order and writes all records once at the end.
    ///
    /// The first fetch or parse failure aborts the run and nothing is
    /// written. When no page produced a record the sink is not called.
    ///
    /// # Errors
    ///
    /// [`ScrapeError::Config`] for an empty URL list, fetch and parse errors
    /// as for [`Pipeline::scrape_page`], and output-stage errors from the sink.
    pub async fn run_all<S: AsRef<str>>(
        &self, urls: &[S], config: &SelectorConfig, policy: &FetchPolicy, sink: &mut dyn RecordSink,
    ) -> Result<RunReport> {
        if urls.is_empty() {
            return Err(ScrapeError::Config("at least one URL is required".to_string()));
        }

        let mut report = RunReport::default();
        for url in urls {
            let page = self.scrape_page(url.as_ref(), config, policy).await?;
            report.pages.push(page);
        }

        let records: Vec<_> = report.pages.iter().flat_map(|p| p.result.records.iter().cloned()).collect();
        if records.is_empty() {
            tracing::warn!("no records extracted; nothing written");
            return Ok(report);
        }

        sink.write(&config.columns(), &records)?;
        report.records_written = records.len();
        report.wrote_output = true;
        report.destination = Some(sink.destination());
        tracing::info!(records = records.len(), destination = %sink.destination(), "saved records");

        Ok(report)
    }
}
