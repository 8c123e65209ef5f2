mod clean;
mod collect;
mod error;
mod ntriples;
mod sanitize;
mod settings;
mod source;
mod store;
mod validate;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use crate::collect::Sources;
use crate::settings::{Overrides, Settings};
use crate::source::{DbpediaLookup, HtmlExtractor, WikipediaFetcher};
use crate::store::RecordStore;

#[derive(Parser)]
#[command(
    name = "triple_harvest",
    about = "Build a page-text + knowledge-base statement dataset from random Wikipedia articles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch random pages and append them, with their statements, to a CSV store
    Collect {
        /// Store to create or append to
        output: PathBuf,
        /// Total fetch attempts [env: HARVEST_ITERATIONS, default 10000]
        #[arg(short = 'n', long)]
        iterations: Option<usize>,
        /// Seconds to pause after every wait period [env: HARVEST_WAIT_TIME, default 0.5]
        #[arg(long)]
        wait_time: Option<f64>,
        /// Iterations between pauses, 0 to never pause [env: HARVEST_WAIT_PERIOD, default 20]
        #[arg(long)]
        wait_period: Option<usize>,
    },
    /// Parse every row's statements and keep the rows that parse
    Validate {
        /// Store to check
        input: PathBuf,
        /// Where to write the valid rows (default: validTriples.csv next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop rows with empty fields and exact duplicates, rewriting the store
    Clean {
        path: PathBuf,
    },
    /// Row, missing-value and duplicate counts for a store
    Stats {
        path: PathBuf,
        /// Rows to preview
        #[arg(short = 'n', long, default_value = "5")]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Collect {
            output,
            iterations,
            wait_time,
            wait_period,
        } => {
            let settings = Settings::load(&Overrides {
                iterations,
                wait_time,
                wait_period,
            })?;
            info!(?settings, "Starting collection");
            let options = settings.collect_options()?;

            let fetcher = WikipediaFetcher::new(&settings.random_url, settings.timeout())?;
            let lookup = DbpediaLookup::new(&settings.sparql_endpoint, settings.timeout())?;
            let sources = Sources {
                fetcher: &fetcher,
                extractor: &HtmlExtractor,
                lookup: &lookup,
            };

            let mut store = RecordStore::open_or_create(&output)
                .with_context(|| format!("Cannot use {:?} as the output store", output))?;

            println!("Collecting {} pages into {:?}...", options.iterations, output);
            let report = collect::collect(&options, &sources, &mut store).await?;
            println!(
                "Done: {} attempted ({} saved, {} skipped).",
                report.attempted, report.appended, report.failed
            );
            Ok(())
        }
        Commands::Validate { input, output, json } => {
            let output = output.unwrap_or_else(|| validate::default_output(&input));
            let report = validate::classify(&input, &output)
                .with_context(|| format!("Validation of {:?} failed", input))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                if report.valid == 0 {
                    println!("No valid triples found; {:?} not written.", output);
                } else {
                    println!("Valid rows written to {:?}", output);
                }
                println!("Graph contains {} triples.", report.graph_size);
                println!("Number of valid n-triple sets: {}", report.valid);
                println!("Number of invalid n-triple sets: {}", report.invalid);
            }
            Ok(())
        }
        Commands::Clean { path } => {
            let r = clean::clean(&path).with_context(|| format!("Cleaning {:?} failed", path))?;
            println!("Rows before:          {}", r.before);
            println!("Dropped (incomplete): {}", r.dropped_incomplete);
            println!("Dropped (duplicate):  {}", r.dropped_duplicates);
            println!("Rows after:           {}", r.after);
            Ok(())
        }
        Commands::Stats { path, rows } => {
            let s = clean::summarize(&path, rows)
                .with_context(|| format!("Reading {:?} failed", path))?;

            println!("{:>3} | {:<30} | {:<40} | {:>10}", "#", "Title", "PageContents", "Statements");
            println!("{}", "-".repeat(94));
            for (i, r) in s.preview.iter().enumerate() {
                println!(
                    "{:>3} | {:<30} | {:<40} | {:>10}",
                    i,
                    truncate(&r.title, 30),
                    truncate(&r.page_contents, 40),
                    r.statements.lines().count()
                );
            }

            println!("\nTotal Rows:    {}", s.rows);
            println!("Total Columns: {}", s.columns);
            println!("Missing values:");
            for (column, n) in &s.missing {
                println!("  {:<16} {}", column, n);
            }
            println!("Duplicate rows: {}", s.duplicates);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
