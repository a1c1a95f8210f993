use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;

use crate::external::{Toolkit, ToolCommand};
use crate::output::{write_dedup, write_raw, StageResult};
use crate::pipeline::RunContext;
use crate::records::httpx_url;
use crate::utils::{has_content, shell_quote};

/// Ports tried by the last-resort httpx sweep.
pub const FALLBACK_PORTS: [u16; 16] =
    [80, 81, 443, 8080, 8443, 8008, 8081, 9000, 9090, 7001, 7002, 8888, 9443, 10443, 3000, 5000];

static FALLBACK_PORT_LIST: Lazy<String> =
    Lazy::new(|| FALLBACK_PORTS.iter().map(u16::to_string).collect::<Vec<_>>().join(","));

/// One strategy in the live-host detection cascade, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeTier {
    /// httpx against the ports naabu discovered.
    HttpxDiscoveredPorts,
    /// httprobe with its defaults, preferring https.
    HttprobeQuick,
    /// httprobe restricted to 80/443/8080/8443.
    HttprobeCommonPorts,
    /// httpx sweeping [`FALLBACK_PORTS`].
    HttpxFallbackPorts,
}

impl ProbeTier {
    pub const CASCADE: [ProbeTier; 4] = [
        ProbeTier::HttpxDiscoveredPorts,
        ProbeTier::HttprobeQuick,
        ProbeTier::HttprobeCommonPorts,
        ProbeTier::HttpxFallbackPorts,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ProbeTier::HttpxDiscoveredPorts => "httpx + naabu ports",
            ProbeTier::HttprobeQuick => "httprobe (quick)",
            ProbeTier::HttprobeCommonPorts => "httprobe (80,443,8080,8443)",
            ProbeTier::HttpxFallbackPorts => "httpx fallback (multiport)",
        }
    }

    /// Build this tier's invocation, or `None` when its preconditions are unmet.
    fn plan(&self, input: &ProbeInput<'_>, ctx: &RunContext) -> Option<TierPlan> {
        let subs = input.subs.to_string_lossy();
        match self {
            ProbeTier::HttpxDiscoveredPorts => {
                let ports = input.ports_file.filter(|p| has_content(p))?;
                let httpx = input.httpx?;
                let cmd = httpx_command(httpx, ctx.threads)
                    .arg("-l")
                    .arg(&*subs)
                    .arg("-ports-file")
                    .arg(ports.to_string_lossy());
                Some(TierPlan::json(cmd, ctx.web.join("httpx_naabu_raw.jsonl")))
            }
            ProbeTier::HttprobeQuick => Some(TierPlan::lines(ToolCommand::shell(format!(
                "cat {} | {} -c {} -prefer-https -timeout 12",
                shell_quote(&subs),
                shell_quote(input.httprobe),
                ctx.threads
            )))),
            ProbeTier::HttprobeCommonPorts => Some(TierPlan::lines(ToolCommand::shell(format!(
                "cat {} | {} -c {} -p http:80,http:8080,https:443,https:8443 -timeout 15",
                shell_quote(&subs),
                shell_quote(input.httprobe),
                ctx.threads
            )))),
            ProbeTier::HttpxFallbackPorts => {
                let Some(httpx) = input.httpx else {
                    tracing::warn!("httpx (ProjectDiscovery) not found; skipping multiport fallback");
                    return None;
                };
                let cmd = httpx_command(httpx, ctx.threads)
                    .arg("-l")
                    .arg(&*subs)
                    .arg("-ports")
                    .arg(FALLBACK_PORT_LIST.as_str());
                Some(TierPlan::json(cmd, ctx.web.join("httpx_raw.jsonl")))
            }
        }
    }
}

fn httpx_command(httpx: &Path, threads: usize) -> ToolCommand {
    ToolCommand::new(httpx.to_string_lossy())
        .args(["-silent", "-json", "-follow-redirects", "-timeout", "25", "-retries", "3", "-threads"])
        .arg(threads.to_string())
}

struct ProbeInput<'a> {
    subs: &'a Path,
    ports_file: Option<&'a Path>,
    httpx: Option<&'a Path>,
    httprobe: &'a str,
}

struct TierPlan {
    cmd: ToolCommand,
    /// JSON-lines tiers keep their raw output next to the host list.
    raw_dump: Option<PathBuf>,
}

impl TierPlan {
    fn lines(cmd: ToolCommand) -> Self {
        Self { cmd, raw_dump: None }
    }

    fn json(cmd: ToolCommand, raw_dump: PathBuf) -> Self {
        Self { cmd, raw_dump: Some(raw_dump) }
    }
}

/// Find live HTTP(S) endpoints for the names in `subs`, writing them to `web/hosts.txt`.
///
/// Tiers of [`ProbeTier::CASCADE`] run in order; the first one that finds at least one
/// endpoint wins and the remaining tiers are never invoked.
pub async fn probe_live_hosts(
    ctx: &RunContext,
    toolkit: &Toolkit,
    subs: &Path,
    ports_file: Option<&Path>,
) -> Result<StageResult> {
    let hosts = ctx.hosts_file();
    if ctx.can_resume(&hosts) {
        tracing::info!("probe: reusing {}", hosts.display());
        return StageResult::load(&hosts);
    }

    let httpx = toolkit.locator.locate_httpx().await;
    let httprobe = toolkit.program("httprobe");
    let input = ProbeInput { subs, ports_file, httpx: httpx.as_deref(), httprobe: &httprobe };

    let mut count = 0;
    for tier in ProbeTier::CASCADE {
        let Some(plan) = tier.plan(&input, ctx) else {
            tracing::debug!(tier = tier.label(), "tier not applicable");
            continue;
        };
        tracing::info!("3) {}…", tier.label());
        let lines = toolkit.runner.run(&plan.cmd).await;
        count = match &plan.raw_dump {
            Some(dump) => {
                write_raw(dump, &lines)?;
                write_dedup(&hosts, lines.iter().filter_map(|l| httpx_url(l)))?
            }
            None => write_dedup(&hosts, &lines)?,
        };
        if count > 0 {
            tracing::info!(tier = tier.label(), count, "live hosts found");
            break;
        }
        tracing::warn!(tier = tier.label(), "no live hosts; trying next strategy");
    }
    Ok(StageResult::new(hosts, count))
}
