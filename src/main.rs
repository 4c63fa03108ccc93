mod domain;
mod fetch;
mod input;
mod ledger;
mod markdown;
mod models;
mod pipeline;
mod settings;
mod text;
mod writer;

#[cfg(test)]
mod testutil;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use dialoguer::{Confirm, Input};
use tracing::info;

use crate::fetch::FetchConfig;
use crate::ledger::MetadataLedger;
use crate::markdown::MarkdownOptions;
use crate::pipeline::{HtmlConverter, PipelineConfig};
use crate::settings::Settings;
use crate::writer::MarkdownWriter;

/// Convert web pages to markdown files, one folder per domain.
///
/// Each domain folder keeps a meta.csv ledger so URLs converted on an earlier
/// run are skipped. Rate-limited and failed URLs are retried next time.
#[derive(Parser)]
#[command(name = "url2md", version)]
struct Cli {
    /// URLs to convert
    #[arg(value_name = "URLS")]
    urls: Vec<String>,

    /// CSV file containing URLs to convert
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Column in the CSV holding URLs (header name or 0-based index)
    #[arg(long)]
    column: Option<String>,

    /// Output directory (default: $OBSIDIAN_PATH, else prompt)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Convert URLs again even if already recorded as successful
    #[arg(long)]
    no_skip_existing: bool,

    /// Don't ask for confirmation
    #[arg(short = 'y', long)]
    force: bool,

    /// Markdown option override, e.g. `bullets=-` or `strip=script,style,nav`
    #[arg(long = "md-option", value_name = "KEY=VALUE")]
    md_options: Vec<String>,

    /// User agent for requests (default: $USER_AGENT, else a browser UA)
    #[arg(long)]
    user_agent: Option<String>,

    /// Max pages fetched at once
    #[arg(long, default_value_t = fetch::CONCURRENCY)]
    concurrency: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = fetch::TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Lines scanned when deriving a title
    #[arg(long, default_value_t = text::DEFAULT_SCAN_LINES)]
    title_scan_lines: usize,

    /// Abort the whole batch if any page fails to download
    #[arg(long)]
    fail_fast: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let urls = collect_urls(&cli);
    let markdown = MarkdownOptions::with_overrides(&cli.md_options)
        .unwrap_or_else(|e| usage_error(ErrorKind::InvalidValue, e));

    let settings = Settings::load()?;
    let output_dir = match settings.resolve_output_dir(cli.output_dir.clone()) {
        Some(dir) => dir,
        None => PathBuf::from(
            Input::<String>::new()
                .with_prompt("Please enter the output directory path OR set OBSIDIAN_PATH environment variable")
                .interact_text()?,
        ),
    };

    println!("Files will be saved to: {}", output_dir.display());
    if !cli.force
        && !Confirm::new()
            .with_prompt("Do you want to continue?")
            .default(true)
            .interact()?
    {
        info!("Operation cancelled by user");
        return Ok(());
    }

    let writer = MarkdownWriter::new(&output_dir)?;
    let config = PipelineConfig {
        fetch: FetchConfig {
            user_agent: settings.resolve_user_agent(cli.user_agent.clone()),
            concurrency: cli.concurrency,
            timeout: Duration::from_secs(cli.timeout_secs),
        },
        markdown,
        title_scan_lines: cli.title_scan_lines,
        continue_on_failure: !cli.fail_fast,
    };
    let ledger = MetadataLedger::new(&output_dir, !cli.no_skip_existing);
    let mut converter = HtmlConverter::new(ledger, config);

    let report = converter.convert_urls(&urls).await;
    let written = writer.save_documents(&report.documents);

    println!(
        "Done: {} converted ({} written), {} rate limited, {} failed, {} skipped.",
        report.successful, written, report.rate_limited, report.failed, report.skipped
    );

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("Finished in {}", format_duration(elapsed));
    }
    Ok(())
}

/// Positional URLs followed by any read from `--csv`. Exits with a usage
/// error when nothing usable was given.
fn collect_urls(cli: &Cli) -> Vec<String> {
    if cli.urls.is_empty() && cli.csv.is_none() {
        usage_error(ErrorKind::MissingRequiredArgument, "Either URLS or --csv must be provided");
    }

    let mut urls = cli.urls.clone();
    if let Some(path) = &cli.csv {
        let Some(column) = cli.column.as_deref() else {
            usage_error(ErrorKind::MissingRequiredArgument, "--column must be provided when using --csv");
        };
        info!("Reading URLs from CSV file: {}", path.display());
        let csv_urls = input::read_urls_from_csv(path, column)
            .unwrap_or_else(|e| usage_error(ErrorKind::InvalidValue, format!("{:#}", e)));
        info!("Found {} URLs in CSV file", csv_urls.len());
        urls.extend(csv_urls);
    }

    if urls.is_empty() {
        usage_error(ErrorKind::InvalidValue, "No URLs found to process");
    }
    urls
}

fn usage_error(kind: ErrorKind, msg: impl std::fmt::Display) -> ! {
    Cli::command().error(kind, msg).exit()
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
