use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::FfufConfig;
use crate::external::{CommandRunner, ToolCommand};
use crate::output::{write_set, LineSet, StageResult};
use crate::pipeline::RunContext;
use crate::records::ffuf_urls;
use crate::utils::{ensure_dir, has_content};

/// Knobs for one brute-force fan-out.
#[derive(Debug, Clone)]
pub struct BruteForceSettings {
    /// ffuf executable; a bare name is looked up on `PATH`.
    pub binary: String,
    pub wordlist: PathBuf,
    /// ffuf `-t` per job.
    pub threads: usize,
    pub extensions: Option<String>,
    pub rate_limit: Option<u32>,
    pub allowed: BTreeSet<u16>,
    /// Number of hosts fuzzed at the same time.
    pub max_workers: usize,
    /// Wall-clock ceiling for the whole fan-out; `None` means unlimited.
    pub global_budget: Option<Duration>,
    /// Ceiling for a single host, enforced by ffuf itself.
    pub job_budget: Duration,
}

impl BruteForceSettings {
    pub fn from_config(cfg: &FfufConfig, wordlist: PathBuf, rate_limit: Option<u32>) -> Self {
        Self {
            binary: "ffuf".to_string(),
            wordlist,
            threads: cfg.threads,
            extensions: cfg.extensions().map(str::to_string),
            rate_limit,
            allowed: cfg.allowed_codes(),
            max_workers: cfg.max_workers.max(1),
            global_budget: cfg.global_budget(),
            job_budget: Duration::from_secs(cfg.maxtime_job),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn match_codes(&self) -> String {
        self.allowed.iter().map(u16::to_string).collect::<Vec<_>>().join(",")
    }
}

/// One host to fuzz and the report file it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BruteForceJob {
    pub host: String,
    pub output: PathBuf,
}

impl BruteForceJob {
    pub fn new(host: &str, dir: &Path) -> Self {
        Self { host: host.to_string(), output: dir.join(format!("{}.json", output_stem(host))) }
    }

    pub fn command(&self, settings: &BruteForceSettings) -> ToolCommand {
        let mut cmd = ToolCommand::new(settings.binary.as_str())
            .arg("-u")
            .arg(format!("{}/FUZZ", self.host.trim_end_matches('/')))
            .arg("-w")
            .arg(settings.wordlist.to_string_lossy())
            .arg("-mc")
            .arg(settings.match_codes())
            .args(["-ac", "-t"])
            .arg(settings.threads.to_string())
            .args(["-timeout", "20", "-of", "json", "-o"])
            .arg(self.output.to_string_lossy())
            .args(["-noninteractive", "-maxtime-job"])
            .arg(settings.job_budget.as_secs().to_string());
        if let Some(ext) = &settings.extensions {
            cmd = cmd.arg("-e").arg(ext.as_str());
        }
        if let Some(rate) = settings.rate_limit {
            cmd = cmd.arg("-rate").arg(rate.to_string());
        }
        cmd
    }
}

/// File stem for a host's report: `://`, `/` and `:` replaced by `_`.
///
/// The scheme stays in the stem so `http://h` and `https://h` never share a report.
pub fn output_stem(host: &str) -> String {
    host.trim().replace("://", "_").replace(['/', ':'], "_")
}

#[derive(Debug, Clone, Copy)]
struct Budget {
    started: Instant,
    limit: Option<Duration>,
}

impl Budget {
    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.started.elapsed() >= limit)
    }
}

/// Fans ffuf out over many hosts with a bounded worker pool.
///
/// The global budget is checked before each job starts and whenever a finished job is
/// harvested; cancellation is polled at the same points. Neither kills a running ffuf:
/// jobs still in flight when the fan-out stops are abandoned.
pub struct BruteForcer {
    runner: Arc<dyn CommandRunner>,
    settings: Arc<BruteForceSettings>,
    cancel: CancellationToken,
}

impl BruteForcer {
    pub fn new(runner: Arc<dyn CommandRunner>, settings: BruteForceSettings, cancel: CancellationToken) -> Self {
        Self { runner, settings: Arc::new(settings), cancel }
    }

    pub async fn run(&self, ctx: &RunContext, hosts: &LineSet) -> Result<StageResult> {
        self.run_from(ctx, hosts, Instant::now()).await
    }

    /// Like [`BruteForcer::run`], with the global budget counted from `started`.
    pub async fn run_from(&self, ctx: &RunContext, hosts: &LineSet, started: Instant) -> Result<StageResult> {
        let found = ctx.ffuf_found_file();
        if ctx.can_resume(&found) {
            tracing::info!("ffuf: reusing {}", found.display());
            return StageResult::load(&found);
        }
        ensure_dir(&ctx.ffuf)?;
        let budget = Budget { started, limit: self.settings.global_budget };

        if hosts.is_empty() {
            tracing::warn!("No hosts for ffuf.");
            return self.persist(found, &[]);
        }
        tracing::info!(
            codes = %self.settings.match_codes(),
            maxtime = ?self.settings.global_budget,
            maxtime_job = ?self.settings.job_budget,
            max_workers = self.settings.max_workers,
            "6) ffuf (multi-host)…"
        );
        if budget.exhausted() || self.cancel.is_cancelled() {
            tracing::warn!("ffuf budget exhausted or run cancelled before start; no jobs submitted");
            return self.persist(found, &[]);
        }

        let pool = Arc::new(Semaphore::new(self.settings.max_workers));
        let mut pending = FuturesUnordered::new();
        for host in hosts {
            let job = BruteForceJob::new(host, &ctx.ffuf);
            let runner = self.runner.clone();
            let settings = self.settings.clone();
            let cancel = self.cancel.clone();
            let pool = pool.clone();
            pending.push(tokio::spawn(async move {
                let Ok(_permit) = pool.acquire_owned().await else {
                    return None;
                };
                run_job(runner.as_ref(), &settings, job, &cancel, budget).await
            }));
        }

        let bar = progress_bar(pending.len() as u64);
        let mut reports = Vec::new();
        while let Some(joined) = pending.next().await {
            bar.inc(1);
            if self.cancel.is_cancelled() {
                tracing::warn!("ffuf interrupted; keeping results gathered so far");
                break;
            }
            match joined {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "ffuf job panicked"),
            }
            if budget.exhausted() {
                tracing::warn!("Global maxtime reached; stopping ffuf.");
                break;
            }
        }
        bar.finish_and_clear();
        // Dropping the remaining JoinHandles detaches the jobs still running.
        drop(pending);

        self.persist(found, &reports)
    }

    fn persist(&self, found: PathBuf, reports: &[PathBuf]) -> Result<StageResult> {
        let mut urls = LineSet::new();
        for report in reports {
            match std::fs::read_to_string(report) {
                Ok(body) => urls.extend(ffuf_urls(&body, &self.settings.allowed)),
                Err(e) => tracing::debug!(report = %report.display(), error = %e, "unreadable ffuf report"),
            }
        }
        let count = write_set(&found, &urls)?;
        tracing::info!(count, "FFUF valid results");
        Ok(StageResult::new(found, count))
    }
}

async fn run_job(
    runner: &dyn CommandRunner,
    settings: &BruteForceSettings,
    job: BruteForceJob,
    cancel: &CancellationToken,
    budget: Budget,
) -> Option<PathBuf> {
    if cancel.is_cancelled() || budget.exhausted() {
        return None;
    }
    // a report left by an earlier run must not stand in for this one
    if let Err(e) = std::fs::remove_file(&job.output) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(report = %job.output.display(), error = %e, "could not clear old ffuf report");
        }
    }
    tracing::debug!(host = %job.host, "ffuf →");
    runner.run(&job.command(settings)).await;
    if cancel.is_cancelled() {
        return None;
    }
    has_content(&job.output).then_some(job.output)
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    let style = ProgressStyle::with_template("   ffuf [{bar:30}] {pos}/{len} hosts ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> BruteForceSettings {
        BruteForceSettings {
            binary: "/opt/go/bin/ffuf".into(),
            wordlist: PathBuf::from("/wl/common.txt"),
            threads: 20,
            extensions: Some(".php,.bak".into()),
            rate_limit: Some(50),
            allowed: [301, 200].into_iter().collect(),
            max_workers: 6,
            global_budget: Some(Duration::from_secs(300)),
            job_budget: Duration::from_secs(60),
        }
    }

    #[test]
    fn stems_are_filesystem_safe() {
        assert_eq!(output_stem("https://a.example.com"), "https_a.example.com");
        assert_eq!(output_stem("http://a.example.com:8080/app"), "http_a.example.com_8080_app");
        assert_ne!(output_stem("http://a.example.com"), output_stem("https://a.example.com"));
    }

    #[test]
    fn job_command_carries_budget_and_filters() {
        let job = BruteForceJob::new("https://a.example.com/", Path::new("/out/ffuf"));
        assert_eq!(job.output, PathBuf::from("/out/ffuf/https_a.example.com_.json"));
        let cmd = job.command(&settings());
        assert_eq!(cmd.program(), "/opt/go/bin/ffuf");
        assert_eq!(cmd.flag_value("-u"), Some("https://a.example.com/FUZZ"));
        assert_eq!(cmd.flag_value("-mc"), Some("200,301"));
        assert_eq!(cmd.flag_value("-maxtime-job"), Some("60"));
        assert_eq!(cmd.flag_value("-of"), Some("json"));
        assert_eq!(cmd.flag_value("-o"), Some("/out/ffuf/https_a.example.com_.json"));
        assert_eq!(cmd.flag_value("-e"), Some(".php,.bak"));
        assert_eq!(cmd.flag_value("-rate"), Some("50"));
        assert!(cmd.has_arg("-noninteractive"));
    }

    #[test]
    fn optional_flags_are_omitted() {
        let s = BruteForceSettings { extensions: None, rate_limit: None, ..settings() };
        let cmd = BruteForceJob::new("https://a", Path::new("/o")).command(&s);
        assert!(!cmd.has_arg("-e"));
        assert!(!cmd.has_arg("-rate"));
    }

    #[test]
    fn budget_without_limit_never_exhausts() {
        let b = Budget { started: Instant::now(), limit: None };
        assert!(!b.exhausted());
        let b = Budget { started: Instant::now(), limit: Some(Duration::ZERO) };
        assert!(b.exhausted());
    }

    #[test]
    fn settings_from_config() {
        let cfg = FfufConfig { extensions: "  ".into(), maxtime: 0, ..FfufConfig::default() };
        let s = BruteForceSettings::from_config(&cfg, PathBuf::from("w.txt"), None);
        assert_eq!(s.binary, "ffuf");
        assert_eq!(s.extensions, None);
        assert_eq!(s.global_budget, None);
        assert_eq!(s.job_budget, Duration::from_secs(60));
        assert_eq!(s.match_codes(), "200,204,301,302,307,308");
    }
}
