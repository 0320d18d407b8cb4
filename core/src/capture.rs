//! Append-only JSON-lines capture of scraped records, and replay of such a
//! file through the writer without touching the network.

use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::models::FoodRecord;
use crate::writer::{FoodWriter, NutrientStore, WriteSummary};

pub struct CaptureFile {
    path: PathBuf,
}

impl CaptureFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single line. The file is opened per call so
    /// every captured record is on disk before the next fetch.
    pub fn append(&self, record: &FoodRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open capture file: {}", self.path.display()))?;

        let line = serde_json::to_string(record)?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to write capture file: {}", self.path.display()))?;
        Ok(())
    }
}

/// Parse captured records line by line. Blank lines are skipped; each item
/// carries its 1-based line number so bad lines can be reported.
pub fn read_records<R: BufRead>(reader: R) -> impl Iterator<Item = (usize, Result<FoodRecord>)> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line_no = idx + 1;
            match line {
                Ok(l) if l.trim().is_empty() => None,
                Ok(l) => Some((
                    line_no,
                    serde_json::from_str(l.trim())
                        .with_context(|| format!("Invalid record on line {line_no}")),
                )),
                Err(e) => Some((
                    line_no,
                    Err::<FoodRecord, _>(e)
                        .with_context(|| format!("Failed to read line {line_no}")),
                )),
            }
        })
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplaySummary {
    pub lines_read: usize,
    pub lines_skipped: usize,
    pub write: WriteSummary,
}

/// Feed every record of a capture file to the store, committing every
/// `COMMIT_INTERVAL` lines and once at the end. Unparsable lines and failed
/// periodic commits are logged and skipped; only the final commit is fatal.
pub fn replay<R: BufRead, S: NutrientStore>(reader: R, store: &S) -> Result<ReplaySummary> {
    let mut writer = FoodWriter::new(store);
    let mut lines_read = 0;
    let mut lines_skipped = 0;

    for (line_no, parsed) in read_records(reader) {
        lines_read += 1;
        match parsed {
            Ok(record) => {
                writer.save(&record);
                writer.checkpoint(lines_read);
            }
            Err(e) => {
                lines_skipped += 1;
                warn!(line = line_no, error = %format!("{e:#}"), "skipping capture line");
            }
        }
    }

    writer.commit().context("Final commit failed")?;
    let write = writer.into_summary();
    info!(
        lines_read,
        lines_skipped,
        saved = write.saved,
        failed = write.failed,
        "replay finished"
    );

    Ok(ReplaySummary {
        lines_read,
        lines_skipped,
        write,
    })
}
