use anyhow::Result;

use crate::config::StepToggles;
use crate::external::{Toolkit, ToolCommand};
use crate::output::{read_lines, write_dedup, LineSet, StageResult};
use crate::pipeline::RunContext;

/// Passive enumeration with subfinder; stdout goes to `raw/subs_subfinder.txt`.
pub async fn subfinder(ctx: &RunContext, toolkit: &Toolkit) -> Result<StageResult> {
    let out = ctx.subfinder_file();
    if ctx.can_resume(&out) {
        tracing::info!("subfinder: reusing {}", out.display());
        return StageResult::load(&out);
    }
    tracing::info!("1) subfinder…");
    let cmd = ToolCommand::new(toolkit.program("subfinder")).args([
        "-silent", "-d", ctx.target.as_str(), "-all", "-recursive", "-nW", "-timeout", "30", "-t", "80",
    ]);
    let lines = toolkit.runner.run(&cmd).await;
    let count = write_dedup(&out, &lines)?;
    tracing::info!(count, "subfinder done");
    Ok(StageResult::new(out, count))
}

/// Passive enumeration with amass; stdout goes to `raw/subs_amass.txt`.
pub async fn amass_passive(ctx: &RunContext, toolkit: &Toolkit) -> Result<StageResult> {
    let out = ctx.amass_file();
    if ctx.can_resume(&out) {
        tracing::info!("amass: reusing {}", out.display());
        return StageResult::load(&out);
    }
    tracing::info!("1) amass (passive)…");
    let cmd = ToolCommand::new(toolkit.program("amass"))
        .args(["enum", "-passive", "-d", ctx.target.as_str(), "-timeout", "30"]);
    let lines = toolkit.runner.run(&cmd).await;
    let count = write_dedup(&out, &lines)?;
    tracing::info!(count, "amass done");
    Ok(StageResult::new(out, count))
}

/// Certificate-transparency fallback; results go to `raw/subs_crtsh.txt`.
pub async fn crtsh_fallback(ctx: &RunContext, toolkit: &Toolkit) -> Result<StageResult> {
    tracing::info!("1) crt.sh fallback…");
    let out = ctx.crtsh_file();
    let names = toolkit.ct.subdomains(&ctx.target).await;
    let cleaned = names.iter().map(|n| n.trim().trim_start_matches("*."));
    let count = write_dedup(&out, cleaned)?;
    tracing::info!(count, "crt.sh done");
    Ok(StageResult::new(out, count))
}

/// Union of every per-source list, trimmed and lowercased, into `raw/subs.txt`.
pub fn merge(ctx: &RunContext) -> Result<StageResult> {
    let mut all = LineSet::new();
    for f in [ctx.subfinder_file(), ctx.amass_file(), ctx.crtsh_file()] {
        for line in read_lines(&f)? {
            all.insert(&line.trim().to_lowercase());
        }
    }
    let dest = ctx.subs_file();
    let count = crate::output::write_set(&dest, &all)?;
    tracing::info!(count, "merge total");
    Ok(StageResult::new(dest, count))
}

/// Run the enabled passive sources, merge them, and fall back to crt.sh when the merge is empty.
pub async fn enumerate(ctx: &RunContext, steps: &StepToggles, toolkit: &Toolkit) -> Result<StageResult> {
    if steps.subfinder {
        subfinder(ctx, toolkit).await?;
    }
    if steps.amass {
        amass_passive(ctx, toolkit).await?;
    }
    let merged = merge(ctx)?;
    println!("[+] Unique subdomains: {}", merged.count);
    if !merged.is_empty() {
        return Ok(merged);
    }

    crtsh_fallback(ctx, toolkit).await?;
    let merged = merge(ctx)?;
    println!("[+] Unique subdomains after fallback: {}", merged.count);
    Ok(merged)
}
