//! Page fetching with retries, backoff, and timeouts.
//!
//! [`Fetcher`] performs an HTTP GET through a [`Transport`] and applies the
//! retry policy carried by each [`FetchRequest`]. Transient failures
//! (connection errors, timeouts, and 429/500/502/503/504 responses) are
//! retried with exponential backoff; any other non-2xx status is permanent.
//!
//! # Example
//!
//! ```rust,no_run
//! use rolodex_core::{FetchRequest, Fetcher};
//!
//! # async fn example() -> rolodex_core::Result<()> {
//! let fetcher = Fetcher::http()?;
//! let request = FetchRequest::new("https://example.com/directory").with_max_retries(2);
//! let page = fetcher.fetch(&request).await.into_result()?;
//! println!("{} bytes after {} attempt(s)", page.body.len(), page.attempts.len());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Browser-like User-Agent sent by default.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Statuses that indicate transient server trouble.
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Retry and timeout settings shared by every request of a run.
///
/// A policy has no URL; turn it into a [`FetchRequest`] with
/// [`FetchPolicy::request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Timeout for a single HTTP round trip.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further retry.
    pub backoff_base: Duration,
    /// Upper bound for a single backoff delay.
    pub backoff_max: Duration,
    /// Overall budget spanning every attempt and backoff.
    pub deadline: Option<Duration>,
    /// User-Agent header value.
    pub user_agent: String,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_retries: 3,
            backoff_base: Duration::from_millis(700),
            backoff_max: Duration::from_secs(30),
            deadline: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchPolicy {
    /// Builds the request for one URL under this policy.
    pub fn request(&self, url: impl Into<String>) -> FetchRequest {
        FetchRequest {
            url: url.into(),
            timeout: self.timeout,
            max_retries: self.max_retries,
            backoff_base: self.backoff_base,
            backoff_max: self.backoff_max,
            deadline: self.deadline,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// A single page request together with its retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub deadline: Option<Duration>,
    pub user_agent: String,
}

impl FetchRequest {
    /// Creates a request with the default policy.
    pub fn new(url: impl Into<String>) -> Self {
        FetchPolicy::default().request(url)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Delay to wait after the failed attempt with 0-based `index`.
    ///
    /// `backoff_base * 2^index`, capped at `backoff_max`.
    pub fn backoff_delay(&self, index: u32) -> Duration {
        2u32.checked_pow(index)
            .and_then(|factor| self.backoff_base.checked_mul(factor))
            .map_or(self.backoff_max, |delay| delay.min(self.backoff_max))
    }
}

/// Why a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The URL is not an absolute http(s) URL. No attempt was made.
    InvalidUrl,
    /// The request itself is unusable (e.g. zero timeout). No attempt was made.
    InvalidRequest,
    /// DNS or connection failure on the final attempt.
    NetworkError,
    /// The final attempt timed out, or the overall deadline was reached.
    Timeout,
    /// Every attempt got a retryable status.
    ExhaustedRetries,
    /// A status that is never retried (e.g. 404).
    HttpStatus(u16),
    /// The caller cancelled the run.
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => f.write_str("invalid URL"),
            FailureKind::InvalidRequest => f.write_str("invalid request"),
            FailureKind::NetworkError => f.write_str("network error"),
            FailureKind::Timeout => f.write_str("timeout"),
            FailureKind::ExhaustedRetries => f.write_str("retries exhausted"),
            FailureKind::HttpStatus(code) => write!(f, "HTTP {}", code),
            FailureKind::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What happened on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Status(u16),
    Timeout,
    NetworkError(String),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Status(code) => write!(f, "HTTP {}", code),
            AttemptOutcome::Timeout => f.write_str("timed out"),
            AttemptOutcome::NetworkError(msg) => write!(f, "network error: {}", msg),
        }
    }
}

/// Log entry for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptLog {
    /// 1-based attempt number.
    pub attempt: u32,
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
}

/// A page retrieved with a 2xx status.
#[derive(Debug, Clone)]
pub struct FetchSuccess {
    pub status: u16,
    pub body: Vec<u8>,
    /// URL after redirects.
    pub final_url: Url,
    /// Charset label from the `Content-Type` header.
    pub charset: Option<String>,
    pub attempts: Vec<AttemptLog>,
}

/// A classified fetch failure.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message} (after {attempts_made} attempt(s))")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    pub attempts_made: u32,
    pub attempts: Vec<AttemptLog>,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>, attempts_made: u32) -> Self {
        Self { kind, message: message.into(), attempts_made, attempts: Vec::new() }
    }

    fn with_log(mut self, attempts: Vec<AttemptLog>) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Outcome of [`Fetcher::fetch`].
#[derive(Debug, Clone)]
pub enum FetchResult {
    Success(FetchSuccess),
    Failure(FetchFailure),
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchResult::Success(_))
    }

    /// Per-attempt log, present for both variants.
    pub fn attempts(&self) -> &[AttemptLog] {
        match self {
            FetchResult::Success(s) => &s.attempts,
            FetchResult::Failure(f) => &f.attempts,
        }
    }

    pub fn into_result(self) -> Result<FetchSuccess, FetchFailure> {
        match self {
            FetchResult::Success(s) => Ok(s),
            FetchResult::Failure(f) => Err(f),
        }
    }
}

/// Response as seen by the retry loop.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Body bytes. Transports may leave this empty for non-2xx responses.
    pub body: Vec<u8>,
    pub final_url: Url,
    /// Charset label from the `Content-Type` header.
    pub charset: Option<String>,
}

/// Failure below the HTTP status level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Network(String),
}

/// Performs one HTTP GET.
///
/// Implementations do not retry; [`Fetcher`] owns the retry policy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration, user_agent: &str) -> Result<RawResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[cfg(feature = "fetch")]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

#[cfg(feature = "fetch")]
impl HttpTransport {
    /// Builds a client that follows up to 10 redirects.
    pub fn new() -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| crate::ScrapeError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "fetch")]
#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, timeout: Duration, user_agent: &str) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .header(reqwest::header::USER_AGENT, user_agent)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let charset = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(crate::parse::charset_param)
            .map(str::to_string);
        if !response.status().is_success() {
            return Ok(RawResponse { status, body: Vec::new(), final_url, charset });
        }

        let body = response.bytes().await.map_err(transport_error)?;
        Ok(RawResponse { status, body: body.to_vec(), final_url, charset })
    }
}

#[cfg(feature = "fetch")]
fn transport_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }

    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    TransportError::Network(message)
}

/// Checks that `raw` is an absolute http(s) URL with a host.
pub fn validate_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("'{}': {}", raw, e))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("'{}': URL must use http:// or https://", raw));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("'{}': URL has no host", raw));
    }

    Ok(url)
}

/// What the retry loop does after an attempt.
enum Verdict {
    Done(RawResponse),
    Retry(FailureKind, String),
    Fatal(FailureKind, String),
}

fn judge(url: &Url, result: Result<RawResponse, TransportError>, timeout: Duration) -> (AttemptOutcome, Verdict) {
    match result {
        Ok(response) if (200..300).contains(&response.status) => {
            (AttemptOutcome::Status(response.status), Verdict::Done(response))
        }
        Ok(response) if RETRYABLE_STATUSES.contains(&response.status) => (
            AttemptOutcome::Status(response.status),
            Verdict::Retry(
                FailureKind::ExhaustedRetries,
                format!("{} answered HTTP {}", url, response.status),
            ),
        ),
        Ok(response) => (
            AttemptOutcome::Status(response.status),
            Verdict::Fatal(
                FailureKind::HttpStatus(response.status),
                format!("{} answered HTTP {}", url, response.status),
            ),
        ),
        Err(TransportError::Timeout) => (
            AttemptOutcome::Timeout,
            Verdict::Retry(
                FailureKind::Timeout,
                format!("{} did not respond within {:.1}s", url, timeout.as_secs_f64()),
            ),
        ),
        Err(TransportError::Network(msg)) => (
            AttemptOutcome::NetworkError(msg.clone()),
            Verdict::Retry(FailureKind::NetworkError, format!("{}: {}", url, msg)),
        ),
    }
}

/// Retrying page fetcher.
///
/// Holds no per-request state; every call to [`Fetcher::fetch`] starts a fresh
/// attempt counter from the request it is given.
pub struct Fetcher<T = DefaultTransport> {
    transport: T,
    cancel: CancellationToken,
}

#[cfg(feature = "fetch")]
pub type DefaultTransport = HttpTransport;
#[cfg(not(feature = "fetch"))]
pub type DefaultTransport = Box<dyn Transport>;

#[cfg(not(feature = "fetch"))]
#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn get(&self, url: &Url, timeout: Duration, user_agent: &str) -> Result<RawResponse, TransportError> {
        (**self).get(url, timeout, user_agent).await
    }
}

#[cfg(feature = "fetch")]
impl Fetcher<HttpTransport> {
    /// Creates a fetcher over a fresh `reqwest` client.
    pub fn http() -> crate::Result<Self> {
        Ok(Self::new(HttpTransport::new()?))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, cancel: CancellationToken::new() }
    }

    /// Aborts in-flight attempts and backoff sleeps once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches `req.url`, retrying transient failures.
    pub async fn fetch(&self, req: &FetchRequest) -> FetchResult {
        let url = match validate_url(&req.url) {
            Ok(url) => url,
            Err(msg) => return FetchResult::Failure(FetchFailure::new(FailureKind::InvalidUrl, msg, 0)),
        };
        if req.timeout.is_zero() {
            return FetchResult::Failure(FetchFailure::new(
                FailureKind::InvalidRequest,
                "timeout must be greater than zero",
                0,
            ));
        }

        let started = Instant::now();
        let deadline = req.deadline.and_then(|budget| started.checked_add(budget));
        let total_attempts = req.max_retries.saturating_add(1);
        let mut log: Vec<AttemptLog> = Vec::new();

        for index in 0..total_attempts {
            let attempt = index + 1;

            let timeout = match deadline.map(|d| d.saturating_duration_since(Instant::now())) {
                Some(remaining) if remaining.is_zero() => {
                    return self.fail(FailureKind::Timeout, format!("deadline reached before attempt {}", attempt), log);
                }
                Some(remaining) => req.timeout.min(remaining),
                None => req.timeout,
            };

            let attempt_started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return self.fail(FailureKind::Cancelled, format!("cancelled during attempt {}", attempt), log);
                }
                result = tokio::time::timeout(timeout, self.transport.get(&url, timeout, &req.user_agent)) => {
                    result.unwrap_or(Err(TransportError::Timeout))
                }
            };
            let elapsed = attempt_started.elapsed();

            let (outcome, verdict) = judge(&url, result, timeout);
            tracing::debug!(
                url = %url,
                attempt,
                of = total_attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                outcome = %outcome,
                "fetch attempt finished"
            );
            log.push(AttemptLog { attempt, elapsed, outcome });

            let (kind, message) = match verdict {
                Verdict::Done(response) => {
                    tracing::debug!(url = %url, status = response.status, bytes = response.body.len(), "fetched page");
                    return FetchResult::Success(FetchSuccess {
                        status: response.status,
                        body: response.body,
                        final_url: response.final_url,
                        charset: response.charset,
                        attempts: log,
                    });
                }
                Verdict::Fatal(kind, message) => return self.fail(kind, message, log),
                Verdict::Retry(kind, message) => (kind, message),
            };

            if attempt == total_attempts {
                return self.fail(kind, message, log);
            }

            let delay = req.backoff_delay(index);
            if let Some(deadline) = deadline
                && delay >= deadline.saturating_duration_since(Instant::now())
            {
                return self.fail(
                    FailureKind::Timeout,
                    format!("{}; deadline leaves no room for another attempt", message),
                    log,
                );
            }

            tracing::warn!(
                url = %url,
                attempt,
                of = total_attempts,
                "{}, retrying in {:.1}s",
                message,
                delay.as_secs_f64()
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let message = format!("cancelled while backing off after attempt {}", attempt);
                    return self.fail(FailureKind::Cancelled, message, log);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        // Only reachable when total_attempts is zero, which saturating_add rules out.
        self.fail(FailureKind::ExhaustedRetries, "no attempts were made", log)
    }

    fn fail(&self, kind: FailureKind, message: impl Into<String>, log: Vec<AttemptLog>) -> FetchResult {
        let attempts_made = log.len() as u32;
        FetchResult::Failure(FetchFailure::new(kind, message, attempts_made).with_log(log))
    }
}
