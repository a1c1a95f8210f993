pub mod runner;
pub mod tools;

use std::sync::Arc;

pub use runner::{CommandKind, CommandRunner, SystemRunner, ToolCommand};
pub use tools::{check_prereqs, tool_version, BinaryLocator, SystemLocator, REQUIRED_BINARIES};

use crate::discover::crtsh::{CertTransparencySource, CrtShSource};

/// The environment-facing capabilities a pipeline run depends on.
#[derive(Clone)]
pub struct Toolkit {
    pub runner: Arc<dyn CommandRunner>,
    pub locator: Arc<dyn BinaryLocator>,
    pub ct: Arc<dyn CertTransparencySource>,
}

impl Toolkit {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        locator: Arc<dyn BinaryLocator>,
        ct: Arc<dyn CertTransparencySource>,
    ) -> Self {
        Self { runner, locator, ct }
    }

    /// Real processes, real filesystem lookups and the live crt.sh API, optionally behind `proxy`.
    pub fn system(proxy: Option<&str>) -> anyhow::Result<Self> {
        let runner = match proxy {
            Some(p) => SystemRunner::new().with_proxy(p),
            None => SystemRunner::new(),
        };
        let runner: Arc<dyn CommandRunner> = Arc::new(runner);
        let locator = Arc::new(SystemLocator::new(runner.clone()));
        let ct = Arc::new(CrtShSource::new(proxy)?);
        Ok(Self::new(runner, locator, ct))
    }

    /// Path the locator resolved for `name`, so stages run the same binary the
    /// prerequisite check accepted. Falls back to the bare name.
    pub fn program(&self, name: &str) -> String {
        match self.locator.locate(name) {
            Some(path) => path.to_string_lossy().into_owned(),
            None => {
                tracing::debug!(tool = name, "not located; relying on PATH");
                name.to_string()
            }
        }
    }
}
