use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::error::{ExtractionError, IterationError, StoreError};
use crate::sanitize::clean_text;
use crate::source::{ContentExtractor, FactLookup, PageFetcher};
use crate::store::{Record, RecordSink};

/// How many pages to try and how hard to lean on the endpoints.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub iterations: usize,
    /// Pause taken after every `wait_period` iterations.
    pub wait_time: Duration,
    /// Zero disables pausing.
    pub wait_period: usize,
}

impl Default for CollectOptions {
    fn default() -> Self {
        CollectOptions {
            iterations: 10_000,
            wait_time: Duration::from_millis(500),
            wait_period: 20,
        }
    }
}

/// Counts returned after the loop finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectReport {
    pub attempted: usize,
    pub appended: usize,
    pub failed: usize,
}

/// The collaborators one iteration needs.
pub struct Sources<'a> {
    pub fetcher: &'a dyn PageFetcher,
    pub extractor: &'a dyn ContentExtractor,
    pub lookup: &'a dyn FactLookup,
}

/// Run the fetch → extract → lookup → append loop.
///
/// A failed fetch, extraction or lookup is logged and skipped. A failed
/// append ends the run with the store error; rows written before it stay.
pub async fn collect<S: RecordSink>(
    options: &CollectOptions,
    sources: &Sources<'_>,
    sink: &mut S,
) -> Result<CollectReport, StoreError> {
    let pb = ProgressBar::new(options.iterations as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut report = CollectReport::default();

    for index in 0..options.iterations {
        report.attempted += 1;

        match acquire(sources).await {
            Ok(record) => {
                if let Err(e) = sink.append(&record) {
                    pb.abandon();
                    error!(index, "Append failed, stopping run: {}", e);
                    return Err(e);
                }
                report.appended += 1;
            }
            Err(e) => {
                warn!(index, "Skipping iteration {}: {}", index, e);
                report.failed += 1;
            }
        }

        pb.set_message(format!("{} saved, {} skipped", report.appended, report.failed));
        pb.inc(1);

        if should_pause(index, options) {
            tokio::time::sleep(options.wait_time).await;
        }
    }

    pb.finish_and_clear();
    info!(
        "Collected {} records ({} attempted, {} skipped)",
        report.appended, report.attempted, report.failed
    );
    Ok(report)
}

/// Pause after every `wait_period`-th iteration, except the last one.
fn should_pause(index: usize, options: &CollectOptions) -> bool {
    let done = index + 1;
    options.wait_period > 0 && done % options.wait_period == 0 && done < options.iterations
}

/// One iteration: everything up to, but not including, the append.
async fn acquire(sources: &Sources<'_>) -> Result<Record, IterationError> {
    let page = sources.fetcher.fetch_random().await?;
    let content = sources.extractor.extract(&page)?;

    let title = clean_text(&content.title);
    if title.is_empty() {
        return Err(ExtractionError::MissingTitle(page.url).into());
    }
    let page_contents = clean_text(&content.body);
    if page_contents.is_empty() {
        return Err(ExtractionError::MissingBody(page.url).into());
    }

    // Lines arrive already escaped for the statement syntax.
    let statements = sources.lookup.lookup(&title).await?.join("\n");

    Ok(Record { title, page_contents, statements })
}
