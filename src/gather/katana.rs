use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::config::KatanaConfig;
use crate::external::{CommandRunner, Toolkit, ToolCommand};
use crate::output::{write_dedup, write_raw, StageResult};
use crate::pipeline::RunContext;
use crate::records::katana_url;

/// True when `flag` appears as a standalone option in a `-h` listing.
pub fn supports_flag(help: &str, flag: &str) -> bool {
    help.split(|c: char| c.is_whitespace() || c == ',').any(|w| w == flag)
}

async fn help_text(runner: &dyn CommandRunner, katana: &str) -> String {
    let cmd = ToolCommand::new(katana).arg("-h").with_stderr().timeout(Duration::from_secs(5));
    runner.run(&cmd).await.join("\n")
}

/// Crawl the live hosts with katana, keeping http(s) URLs in `urls/katana.txt`.
///
/// Optional flags (`-jsonl`, `-retries`, `-rate-limit`, `-http-proxy`) are only passed when the
/// installed katana advertises them.
pub async fn katana_from_list(
    ctx: &RunContext,
    toolkit: &Toolkit,
    hosts_file: &Path,
    cfg: &KatanaConfig,
    proxy: Option<&str>,
) -> Result<StageResult> {
    let out = ctx.katana_file();
    if ctx.can_resume(&out) {
        tracing::info!("katana: reusing {}", out.display());
        return StageResult::load(&out);
    }
    let Some(katana) = toolkit.locator.locate("katana") else {
        tracing::warn!("katana not found. Skipping.");
        let count = write_dedup(&out, Vec::<String>::new())?;
        return Ok(StageResult::new(out, count));
    };
    let katana = katana.to_string_lossy().into_owned();

    tracing::info!("4) katana…");
    let help = help_text(toolkit.runner.as_ref(), &katana).await;
    let mut cmd = ToolCommand::new(katana.as_str())
        .args(["-silent", "-list"])
        .arg(hosts_file.to_string_lossy())
        .arg("-depth")
        .arg(cfg.depth.to_string())
        .args(["-jc", "-aff", "-timeout", "20", "-no-color", "-max-redirects", "3", "-threads"])
        .arg(ctx.threads.to_string());
    if supports_flag(&help, "-jsonl") {
        cmd = cmd.arg("-jsonl");
    }
    if supports_flag(&help, "-retries") {
        cmd = cmd.args(["-retries", "2"]);
    }
    if supports_flag(&help, "-rate-limit") {
        cmd = cmd.args(["-rate-limit", "1000"]);
    }
    if let Some(p) = proxy.filter(|_| supports_flag(&help, "-http-proxy")) {
        cmd = cmd.arg("-http-proxy").arg(p);
    }

    let lines = toolkit.runner.run(&cmd).await;
    write_raw(&ctx.katana_raw_file(), &lines)?;
    let count = write_dedup(&out, lines.iter().filter_map(|l| katana_url(l)))?;
    if count == 0 {
        tracing::warn!("Katana returned 0 URLs.");
    } else {
        tracing::info!(count, "katana URLs");
    }
    Ok(StageResult::new(out, count))
}
