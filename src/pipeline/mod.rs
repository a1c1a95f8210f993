pub mod context;

use std::path::PathBuf;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

pub use context::RunContext;

use crate::config::Config;
use crate::discover::{dnsresolve, subenum};
use crate::external::Toolkit;
use crate::fuzz::ffuf::{BruteForceSettings, BruteForcer};
use crate::gather::{gau, katana, merge_urls};
use crate::output::{read_set, write_set, LineSet, StageResult};
use crate::probe::{http_probe, ports};

/// How a pipeline run ended. Every variant is a graceful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The final report was written (it may be empty).
    Completed { report: PathBuf, total: usize },
    /// Enumeration and the certificate-transparency fallback found nothing.
    NoSubdomains,
    /// None of the enumerated names resolve.
    NoResolved,
}

/// Per-invocation options that come from the command line rather than the config file.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub resolvers: Option<PathBuf>,
    pub force: bool,
    pub proxy: Option<String>,
    /// ffuf `-rate` per host.
    pub rate_limit: Option<u32>,
}

/// Sequences the stages for one target and decides, from each stage's cardinality,
/// whether to continue, fall back, or stop early.
pub struct Pipeline {
    config: Config,
    options: RunOptions,
    toolkit: Toolkit,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: Config, toolkit: Toolkit) -> Self {
        Self { config, options: RunOptions::default(), toolkit, cancel: CancellationToken::new() }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output directory used for `target`.
    pub fn target_dir(&self, target: &str) -> PathBuf {
        self.config.outputs.join(target)
    }

    pub async fn run(&self, target: &str) -> Result<RunOutcome> {
        let ctx = RunContext::new(target, &self.target_dir(target), self.config.threads, self.config.wordlist.clone())?
            .with_force(self.options.force);
        let mut steps = self.config.steps;

        // 1) subdomain enumeration (+ crt.sh fallback)
        let subs = subenum::enumerate(&ctx, &steps, &self.toolkit).await?;
        if subs.is_empty() {
            println!("[!] No subdomains found. Exiting.");
            return Ok(RunOutcome::NoSubdomains);
        }

        // 2) DNS resolution
        let resolved = dnsresolve::dnsx_filter(&ctx, &self.toolkit, &subs.path, self.options.resolvers.as_deref()).await?;
        println!("[+] Subdomains that resolve (DNS): {}", resolved.count);
        if resolved.is_empty() {
            println!("[!] No resolvable subdomains. Exiting.");
            return Ok(RunOutcome::NoResolved);
        }

        // 3) port scan + live-host probing
        let open_ports = if steps.naabu {
            Some(ports::naabu_scan(&ctx, &self.toolkit, &resolved.path, &self.config.naabu).await?)
        } else {
            None
        };
        let hosts = http_probe::probe_live_hosts(
            &ctx,
            &self.toolkit,
            &resolved.path,
            open_ports.as_ref().map(|p| p.path.as_path()),
        )
        .await?;
        println!("[+] HTTP(s) live hosts: {}", hosts.count);
        if hosts.is_empty() {
            println!("[!] No HTTP(s) hosts. Skipping katana/gau/ffuf to avoid noise.");
            steps.katana = false;
            steps.gau = false;
            steps.ffuf = false;
        }

        // 4) + 5) crawl and archive fetch are independent of each other
        let (crawled, archived) = tokio::join!(
            async {
                if steps.katana {
                    katana::katana_from_list(&ctx, &self.toolkit, &hosts.path, &self.config.katana, self.options.proxy.as_deref())
                        .await
                        .map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if steps.gau {
                    gau::gau_from_subs(&ctx, &self.toolkit, &subs.path, &self.config.gau).await.map(Some)
                } else {
                    Ok(None)
                }
            }
        );
        let url_parts: Vec<PathBuf> = [crawled?, archived?].into_iter().flatten().map(|r| r.path).collect();

        // 6) merge katana + gau
        let all_urls = merge_urls(&ctx, &url_parts)?;

        // 7) directory brute force
        let found = if steps.ffuf { self.brute_force(&ctx, &hosts).await? } else { None };

        // final report
        let mut parts = vec![all_urls];
        parts.extend(found);
        let report = final_report(&ctx, &parts)?;
        println!("[+] Done! Final report: {}", report.path.display());
        println!("[+] Total collected URLs: {}", report.count);
        Ok(RunOutcome::Completed { report: report.path, total: report.count })
    }

    async fn brute_force(&self, ctx: &RunContext, hosts: &StageResult) -> Result<Option<StageResult>> {
        let Some(wordlist) = ctx.wordlist.clone() else {
            tracing::warn!("no wordlist configured; skipping ffuf");
            return Ok(None);
        };
        let settings = BruteForceSettings::from_config(&self.config.ffuf, wordlist, self.options.rate_limit)
            .with_binary(self.toolkit.program("ffuf"));
        let forcer = BruteForcer::new(self.toolkit.runner.clone(), settings, self.cancel.clone());
        let live = read_set(&hosts.path)?;
        forcer.run(ctx, &live).await.map(Some)
    }
}

/// Sorted union of every URL-producing artifact into `report/urls_final.txt`.
pub fn final_report(ctx: &RunContext, parts: &[StageResult]) -> Result<StageResult> {
    let mut union = LineSet::new();
    for part in parts {
        union.extend(read_set(&part.path)?);
    }
    let dest = ctx.final_report_file();
    let count = write_set(&dest, &union)?;
    Ok(StageResult::new(dest, count))
}
