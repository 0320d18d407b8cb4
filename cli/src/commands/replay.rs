use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tbca_core::capture::replay;
use tbca_core::db::Database;

use super::helpers::{print_failures, print_json, print_key_values, write_summary_rows};

pub(crate) fn cmd_replay(db: &Database, path: &Path, json: bool) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open capture file: {}", path.display()))?;
    let summary = replay(BufReader::new(file), db)?;

    if json {
        return print_json(&summary);
    }

    let mut rows = vec![
        ("Lines read", summary.lines_read.to_string()),
        ("Lines skipped", summary.lines_skipped.to_string()),
    ];
    rows.extend(write_summary_rows(&summary.write));
    print_key_values(&rows);

    if summary.write.failed > 0 {
        eprintln!("\nFailed records:");
        print_failures(&summary.write);
    }
    Ok(())
}
