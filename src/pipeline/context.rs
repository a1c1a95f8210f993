use std::path::{Path, PathBuf};

use crate::utils::{ensure_dir, has_content};

/// Per-target run state: where artifacts live and the knobs every stage shares.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub target: String,
    pub outdir: PathBuf,
    pub threads: usize,
    pub wordlist: Option<PathBuf>,
    /// Recompute stages even when their artifact already exists.
    pub force: bool,
    pub raw: PathBuf,
    pub web: PathBuf,
    pub urls: PathBuf,
    pub ffuf: PathBuf,
    pub report: PathBuf,
}

impl RunContext {
    /// Create `outdir` and its `raw/ web/ urls/ ffuf/ report/` subdirectories.
    pub fn new(target: &str, outdir: &Path, threads: usize, wordlist: Option<PathBuf>) -> anyhow::Result<Self> {
        let outdir = ensure_dir(outdir)?;
        Ok(Self {
            target: target.to_string(),
            raw: ensure_dir(&outdir.join("raw"))?,
            web: ensure_dir(&outdir.join("web"))?,
            urls: ensure_dir(&outdir.join("urls"))?,
            ffuf: ensure_dir(&outdir.join("ffuf"))?,
            report: ensure_dir(&outdir.join("report"))?,
            outdir,
            threads,
            wordlist,
            force: false,
        })
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// True when `artifact` may be reused instead of re-running its stage.
    pub fn can_resume(&self, artifact: &Path) -> bool {
        !self.force && has_content(artifact)
    }

    pub fn subfinder_file(&self) -> PathBuf {
        self.raw.join("subs_subfinder.txt")
    }

    pub fn amass_file(&self) -> PathBuf {
        self.raw.join("subs_amass.txt")
    }

    pub fn crtsh_file(&self) -> PathBuf {
        self.raw.join("subs_crtsh.txt")
    }

    pub fn subs_file(&self) -> PathBuf {
        self.raw.join("subs.txt")
    }

    pub fn resolved_file(&self) -> PathBuf {
        self.raw.join("subs_resolved.txt")
    }

    pub fn naabu_file(&self) -> PathBuf {
        self.web.join("naabu_ports.txt")
    }

    pub fn hosts_file(&self) -> PathBuf {
        self.web.join("hosts.txt")
    }

    pub fn katana_file(&self) -> PathBuf {
        self.urls.join("katana.txt")
    }

    pub fn katana_raw_file(&self) -> PathBuf {
        self.urls.join("katana_raw.jsonl")
    }

    pub fn gau_file(&self) -> PathBuf {
        self.urls.join("gau.txt")
    }

    pub fn all_urls_file(&self) -> PathBuf {
        self.urls.join("all_urls.txt")
    }

    pub fn ffuf_found_file(&self) -> PathBuf {
        self.ffuf.join("ffuf_found.txt")
    }

    pub fn final_report_file(&self) -> PathBuf {
        self.report.join("urls_final.txt")
    }
}
