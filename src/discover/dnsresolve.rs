use std::path::Path;

use anyhow::Result;

use crate::external::{Toolkit, ToolCommand};
use crate::output::{write_dedup, StageResult};
use crate::pipeline::RunContext;

/// Keep only the subdomains that resolve (A/AAAA/CNAME) using dnsx.
pub async fn dnsx_filter(
    ctx: &RunContext,
    toolkit: &Toolkit,
    subs_file: &Path,
    resolvers: Option<&Path>,
) -> Result<StageResult> {
    let out = ctx.resolved_file();
    if ctx.can_resume(&out) {
        tracing::info!("dnsx: reusing {}", out.display());
        return StageResult::load(&out);
    }
    tracing::info!("2) dnsx (resolver)…");
    let mut cmd = ToolCommand::new(toolkit.program("dnsx"))
        .args(["-silent", "-l"])
        .arg(subs_file.to_string_lossy())
        .args(["-a", "-aaaa", "-cname", "-t"])
        .arg(ctx.threads.to_string());
    if let Some(r) = resolvers {
        cmd = cmd.arg("-r").arg(r.to_string_lossy());
    }
    let lines = toolkit.runner.run(&cmd).await;
    let count = write_dedup(&out, &lines)?;
    tracing::info!(count, "subdomains that resolve");
    Ok(StageResult::new(out, count))
}
