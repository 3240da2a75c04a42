use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use rolodex_core::{
    CancellationToken, DEFAULT_CARD_SELECTOR, DEFAULT_EMAIL_SELECTOR, DEFAULT_NAME_SELECTOR, DEFAULT_USER_AGENT,
    FetchPolicy, Fetcher, FileSink, OutputFormat, Pipeline, RecordSink, ScrapeError, SelectorConfig, WriterSink,
};
use tracing_subscriber::EnvFilter;

mod echo;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output target meaning "write to stdout"
const STDOUT: &str = "-";

/// Scrape business cards from listing pages into CSV or JSON
#[derive(Parser, Debug)]
#[command(name = "rolodex")]
#[command(author = "Rolodex Contributors")]
#[command(version)]
#[command(about = "Scrape business cards from listing pages into CSV or JSON", long_about = None)]
struct Args {
    /// Listing page URL(s), scraped in order
    #[arg(value_name = "URL", required = true)]
    urls: Vec<String>,

    /// CSS selector for one business card
    #[arg(long, default_value = DEFAULT_CARD_SELECTOR, value_name = "CSS")]
    card_selector: String,

    /// CSS selector for the name, inside a card
    #[arg(long, default_value = DEFAULT_NAME_SELECTOR, value_name = "CSS")]
    name_selector: String,

    /// CSS selector for the email, inside a card
    #[arg(long, default_value = DEFAULT_EMAIL_SELECTOR, value_name = "CSS")]
    email_selector: String,

    /// Extra field, e.g. phone=a.tel or website=a.site@href (repeatable)
    #[arg(long = "field", value_name = "NAME=CSS[@ATTR]", value_parser = parse_field)]
    fields: Vec<(String, String)>,

    /// Output format (csv, json)
    #[arg(short, long, default_value = "csv", value_name = "FORMAT")]
    format: OutputFormat,

    /// Output file, or "-" for stdout; the extension follows --format
    #[arg(short, long, default_value = "marketing_list.csv", value_name = "PATH")]
    output: String,

    /// Per-attempt HTTP timeout in seconds
    #[arg(long, default_value = "15", value_name = "SECS", value_parser = parse_timeout)]
    timeout: Duration,

    /// Retries after the first attempt
    #[arg(long, default_value = "3", value_name = "N")]
    retries: u32,

    /// Base backoff in seconds, doubled after every failed attempt
    #[arg(long, default_value = "0.7", value_name = "SECS", value_parser = parse_secs)]
    backoff: Duration,

    /// Upper bound on a single backoff sleep, in seconds
    #[arg(long, default_value = "30", value_name = "SECS", value_parser = parse_secs)]
    max_backoff: Duration,

    /// Overall time budget per page across all attempts, in seconds
    #[arg(long, value_name = "SECS", value_parser = parse_timeout)]
    deadline: Option<Duration>,

    /// Custom User-Agent for HTTP requests
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Non-empty fields a card needs to be kept (0 keeps every card)
    #[arg(long, default_value = "1", value_name = "N")]
    min_filled: usize,

    /// Placeholder written for fields that matched nothing
    #[arg(long, default_value = "", value_name = "TEXT")]
    missing_value: String,

    /// Enable debug logging and per-page details
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn selector_config(&self) -> rolodex_core::Result<SelectorConfig> {
        let mut builder = SelectorConfig::builder()
            .card(&self.card_selector)
            .field("name", &self.name_selector)
            .field("email", &self.email_selector)
            .min_filled(self.min_filled)
            .missing_value(&self.missing_value);
        for (name, spec) in &self.fields {
            builder = builder.field(name, spec);
        }
        builder.build()
    }

    fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: self.timeout,
            max_retries: self.retries,
            backoff_base: self.backoff,
            backoff_max: self.max_backoff,
            deadline: self.deadline,
            user_agent: self.user_agent.clone().unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }

    fn sink(&self) -> Box<dyn RecordSink> {
        if self.output == STDOUT {
            Box::new(WriterSink::new(io::stdout(), self.format, "stdout"))
        } else {
            Box::new(FileSink::new(&self.output, self.format))
        }
    }
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, spec) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=CSS[@ATTR], got '{}'", s))?;
    let (name, spec) = (name.trim(), spec.trim());
    if name.is_empty() || spec.is_empty() {
        return Err(format!("expected NAME=CSS[@ATTR], got '{}'", s));
    }
    Ok((name.to_string(), spec.to_string()))
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{}' is not a number of seconds", s))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{}' is not a valid duration", s))
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let duration = parse_secs(s)?;
    if duration.is_zero() {
        return Err("must be greater than zero".to_string());
    }
    Ok(duration)
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "warn,rolodex=debug,rolodex_core=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Cancels `token` on Ctrl-C so in-flight attempts and backoff sleeps stop.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted; cancelling");
            token.cancel();
        }
    });
}

/// Stage-based exit code for a failed run; see `Stage::exit_code`.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ScrapeError>())
        .map_or(1, |scrape| scrape.stage().exit_code())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            echo::print_error(&format!("{:#}", err));
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let started = Instant::now();
    let verbose = args.verbose;
    let quiet = args.quiet;

    if verbose {
        echo::print_banner();
        echo::print_info("Debug logging enabled");
        eprintln!();
        echo::print_step(1, 3, "Compiling selectors");
    }

    let config = args.selector_config().context("Invalid selector configuration")?;
    let policy = args.fetch_policy();

    if verbose {
        echo::print_detail("Card", config.card());
        echo::print_detail("Columns", &config.columns().join(", "));
        echo::print_detail("Min filled", &config.min_filled().to_string());
        eprintln!();
        echo::print_step(
            2,
            3,
            &format!("Scraping {} page(s), up to {} attempt(s) each", args.urls.len(), policy.max_retries + 1),
        );
    }

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());

    let fetcher = Fetcher::http().context("Failed to create HTTP client")?.with_cancellation(cancel);
    let pipeline = Pipeline::new(fetcher);
    let mut sink = args.sink();

    let report = pipeline
        .run_all(&args.urls, &config, &policy, sink.as_mut())
        .await
        .context("Scrape failed")?;

    if verbose {
        for page in &report.pages {
            echo::print_page_details(page);
        }
        echo::print_step(3, 3, "Writing output");
        echo::print_detail("Format", &args.format.to_string());
    }

    if !quiet {
        for url in report.pages_without_cards() {
            echo::print_warning(&format!("No cards matched '{}' on {}", config.card(), url));
        }
    }

    if !report.wrote_output {
        if !quiet {
            echo::print_warning("No data found; nothing written");
        }
        return Ok(());
    }

    let destination = report.destination.clone().unwrap_or_else(|| STDOUT.to_string());
    if verbose && args.output != STDOUT {
        if let Ok(meta) = std::fs::metadata(Path::new(&destination)) {
            echo::print_detail("Size", &echo::format_size(meta.len() as usize));
        }
        echo::print_timing("Total", started.elapsed());
        eprintln!();
    }

    if !quiet {
        let skipped = report.skipped_cards();
        let mut message = format!("Saved {} records to {}", report.records_written, destination.bright_white());
        if skipped > 0 {
            message.push_str(&format!(" ({} empty card(s) skipped)", skipped));
        }
        echo::print_success(&message);
    }

    Ok(())
}
