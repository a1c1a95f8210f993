pub mod gau;
pub mod katana;

use std::path::PathBuf;

use anyhow::Result;

use crate::output::{read_set, write_set, LineSet, StageResult};
use crate::pipeline::RunContext;

/// Merge the URL artifacts produced this run (katana, gau) into `urls/all_urls.txt`.
pub fn merge_urls(ctx: &RunContext, parts: &[PathBuf]) -> Result<StageResult> {
    let mut all = LineSet::new();
    for p in parts {
        all.extend(read_set(p)?);
    }
    let dest = ctx.all_urls_file();
    let count = write_set(&dest, &all)?;
    tracing::info!(count, "pre-bruteforce URLs (katana+gau)");
    Ok(StageResult::new(dest, count))
}
