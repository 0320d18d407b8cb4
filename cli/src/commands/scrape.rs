use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::info;

use crate::tbca::TbcaClient;
use tbca_core::capture::CaptureFile;
use tbca_core::crawl::{CrawlSummary, Crawler};
use tbca_core::db::Database;

use super::helpers::{print_failures, print_json, print_key_values, write_summary_rows};

pub(crate) struct ScrapeOptions {
    pub capture: Option<PathBuf>,
    pub store: bool,
    pub base_url: String,
    pub json: bool,
}

pub(crate) async fn cmd_scrape(db: Database, options: ScrapeOptions) -> Result<()> {
    if options.capture.is_none() && !options.store {
        bail!("Nothing to do: --no-capture and --no-db were both given");
    }

    let client = TbcaClient::new(&options.base_url)?;
    let capture = options.capture.map(CaptureFile::new);
    let store = options.store;
    info!(
        base_url = %options.base_url,
        capture = ?capture.as_ref().map(CaptureFile::path),
        store,
        "starting crawl"
    );

    // The pipeline is blocking; each fetch is driven on the runtime from this
    // worker thread.
    let summary = tokio::task::spawn_blocking(move || {
        let mut crawler = Crawler::new(&client);
        if let Some(capture) = &capture {
            crawler = crawler.with_capture(capture);
        }
        if store {
            crawler = crawler.with_store(&db);
        }
        crawler.run()
    })
    .await
    .context("Crawl task panicked")??;

    if options.json {
        return print_json(&summary);
    }
    print_crawl_summary(&summary);
    Ok(())
}

fn print_crawl_summary(summary: &CrawlSummary) {
    let mut rows = vec![
        ("Listing pages", summary.pages_visited.to_string()),
        ("Codes found", summary.codes_found.to_string()),
        ("Fetched", summary.details_fetched.to_string()),
        ("Fetch failures", summary.details_failed.to_string()),
        ("Captured", summary.captured.to_string()),
    ];
    if let Some(write) = &summary.write {
        rows.extend(write_summary_rows(write));
    }
    print_key_values(&rows);

    if let Some(write) = summary.write.as_ref().filter(|w| w.failed > 0) {
        eprintln!("\nFailed records:");
        print_failures(write);
    }
}
