use std::path::Path;

use anyhow::Result;

use crate::config::NaabuConfig;
use crate::external::{Toolkit, ToolCommand};
use crate::output::{write_dedup, StageResult};
use crate::pipeline::RunContext;
use crate::records::host_port;

/// Port scan with naabu in JSON mode; `host:port` pairs go to `web/naabu_ports.txt`.
pub async fn naabu_scan(
    ctx: &RunContext,
    toolkit: &Toolkit,
    resolved: &Path,
    cfg: &NaabuConfig,
) -> Result<StageResult> {
    let out = ctx.naabu_file();
    if ctx.can_resume(&out) {
        tracing::info!("naabu: reusing {}", out.display());
        return StageResult::load(&out);
    }
    tracing::info!("3) naabu (port scan)…");
    let cmd = ToolCommand::new(toolkit.program("naabu"))
        .arg("-list")
        .arg(resolved.to_string_lossy())
        .arg("-silent")
        .arg("-top-ports")
        .arg(cfg.top_ports.to_string())
        .arg("-rate")
        .arg(cfg.rate.to_string())
        .arg("-retries")
        .arg(cfg.retries.to_string())
        .arg("-timeout")
        .arg(cfg.timeout.to_string())
        .arg("-json");
    let lines = toolkit.runner.run(&cmd).await;
    let pairs = lines.iter().filter_map(|l| host_port(l));
    let count = write_dedup(&out, pairs)?;
    tracing::info!(count, "naabu host:port pairs");
    Ok(StageResult::new(out, count))
}
