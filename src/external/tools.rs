use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use which::which;

use crate::error::PrereqError;
use crate::external::runner::{CommandRunner, ToolCommand};

/// Every binary a full pipeline run shells out to.
pub const REQUIRED_BINARIES: &[&str] =
    &["subfinder", "amass", "dnsx", "naabu", "httprobe", "httpx", "katana", "gau", "ffuf"];

/// Resolves tool names to executable paths.
#[async_trait]
pub trait BinaryLocator: Send + Sync {
    fn locate(&self, name: &str) -> Option<PathBuf>;

    /// The ProjectDiscovery `httpx`, which is easily shadowed by the Python package of the same name.
    async fn locate_httpx(&self) -> Option<PathBuf>;
}

/// Looks on `PATH`, then in `~/go/bin` and `/usr/local/bin`.
pub struct SystemLocator {
    runner: Arc<dyn CommandRunner>,
    cache: RwLock<HashMap<String, Option<PathBuf>>>,
    httpx: OnceCell<Option<PathBuf>>,
}

impl SystemLocator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner, cache: RwLock::new(HashMap::new()), httpx: OnceCell::new() }
    }

    fn candidates(name: &str) -> Vec<PathBuf> {
        let mut out = Vec::new();
        if let Ok(p) = which(name) {
            out.push(p);
        }
        if let Some(home) = dirs::home_dir() {
            out.push(home.join("go").join("bin").join(name));
        }
        out.push(Path::new("/usr/local/bin").join(name));
        out
    }

    async fn probe_httpx(&self) -> Option<PathBuf> {
        for cand in Self::candidates("httpx") {
            if !cand.is_file() {
                continue;
            }
            let cmd = ToolCommand::new(cand.to_string_lossy())
                .arg("-version")
                .with_stderr()
                .timeout(Duration::from_secs(3));
            let banner = self.runner.run(&cmd).await.join("\n");
            if is_projectdiscovery_httpx(&banner) {
                tracing::debug!(path = %cand.display(), "found ProjectDiscovery httpx");
                return Some(cand);
            }
            tracing::debug!(path = %cand.display(), "httpx candidate rejected (unexpected banner)");
        }
        None
    }
}

#[async_trait]
impl BinaryLocator for SystemLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        if let Some(hit) = self.cache.read().get(name) {
            return hit.clone();
        }
        let found = Self::candidates(name).into_iter().find(|p| p.is_file());
        self.cache.write().insert(name.to_string(), found.clone());
        found
    }

    async fn locate_httpx(&self) -> Option<PathBuf> {
        self.httpx.get_or_init(|| self.probe_httpx()).await.clone()
    }
}

pub fn is_projectdiscovery_httpx(banner: &str) -> bool {
    let low = banner.to_lowercase();
    low.contains("projectdiscovery") || low.contains("httpx version")
}

/// Fail with the exact list of `bins` the locator cannot find.
pub fn check_prereqs(locator: &dyn BinaryLocator, bins: &[&str]) -> Result<(), PrereqError> {
    let missing: Vec<String> =
        bins.iter().filter(|b| locator.locate(b).is_none()).map(|b| b.to_string()).collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(PrereqError::MissingBinaries(missing))
    }
}

/// First non-empty line printed by `bin -version`, falling back to `bin --version`.
pub async fn tool_version(runner: &dyn CommandRunner, bin: &str) -> String {
    for flag in ["-version", "--version"] {
        let cmd = ToolCommand::new(bin).arg(flag).with_stderr().timeout(Duration::from_secs(5));
        if let Some(line) = runner.run(&cmd).await.into_iter().map(|l| l.trim().to_string()).find(|l| !l.is_empty()) {
            return line;
        }
    }
    String::new()
}
