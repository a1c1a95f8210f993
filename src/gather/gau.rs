use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};

use crate::config::GauConfig;
use crate::external::{CommandRunner, Toolkit, ToolCommand};
use crate::output::{read_lines, write_dedup, LineSet, StageResult};
use crate::pipeline::RunContext;
use crate::utils::base_domain;

/// Distinct base domains (last two labels) of every subdomain in `subs`.
pub fn base_domains<'a, I>(subs: I) -> LineSet
where
    I: IntoIterator<Item = &'a String>,
{
    subs.into_iter().filter_map(|s| base_domain(s)).collect()
}

async fn gau_one(runner: Arc<dyn CommandRunner>, gau: String, domain: String, limit: Duration) -> Vec<String> {
    let cmd = ToolCommand::new(gau)
        .args(["-subs", "--providers", "wayback,commoncrawl,otx"])
        .stdin(format!("{domain}\n"))
        .timeout(limit);
    runner
        .run(&cmd)
        .await
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| l.contains(domain.as_str()))
        .collect()
}

/// Archived URLs for every base domain of `subs_file`, collected into `urls/gau.txt`.
pub async fn gau_from_subs(
    ctx: &RunContext,
    toolkit: &Toolkit,
    subs_file: &Path,
    cfg: &GauConfig,
) -> Result<StageResult> {
    let out = ctx.gau_file();
    if ctx.can_resume(&out) {
        tracing::info!("gau: reusing {}", out.display());
        return StageResult::load(&out);
    }
    let Some(gau) = toolkit.locator.locate("gau") else {
        tracing::warn!("gau not found. Skipping.");
        let count = write_dedup(&out, Vec::<String>::new())?;
        return Ok(StageResult::new(out, count));
    };
    let gau = gau.to_string_lossy().into_owned();

    tracing::info!("5) gau…");
    let subs = read_lines(subs_file)?;
    let bases = base_domains(subs.iter());
    let limit = Duration::from_secs(cfg.timeout);

    let results: Vec<Vec<String>> = stream::iter(bases.into_iter())
        .map(|domain| gau_one(toolkit.runner.clone(), gau.clone(), domain, limit))
        .buffer_unordered(cfg.max_workers.max(1))
        .collect()
        .await;

    let count = write_dedup(&out, results.iter().flatten())?;
    if count == 0 {
        tracing::warn!("GAU returned 0 URLs.");
    } else {
        tracing::info!(count, "gau URLs");
    }
    Ok(StageResult::new(out, count))
}
