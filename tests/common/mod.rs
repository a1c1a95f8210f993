#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use reconflow::discover::crtsh::CertTransparencySource;
use reconflow::external::{BinaryLocator, CommandKind, CommandRunner, Toolkit, ToolCommand};

type Handler = dyn Fn(&ToolCommand) -> Vec<String> + Send + Sync;

/// Answers every invocation from a closure and records what was run.
pub struct ScriptedRunner {
    handler: Box<Handler>,
    calls: Mutex<Vec<ToolCommand>>,
    delay: Option<Duration>,
}

impl ScriptedRunner {
    pub fn new(handler: impl Fn(&ToolCommand) -> Vec<String> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()), delay: None })
    }

    /// Like [`ScriptedRunner::new`], but every invocation takes `delay` before answering.
    pub fn slow(handler: impl Fn(&ToolCommand) -> Vec<String> + Send + Sync + 'static, delay: Duration) -> Arc<Self> {
        Arc::new(Self { handler: Box::new(handler), calls: Mutex::new(Vec::new()), delay: Some(delay) })
    }

    /// A runner on which every tool prints nothing.
    pub fn silent() -> Arc<Self> {
        Self::new(|_| Vec::new())
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, tool: &str) -> usize {
        self.calls.lock().iter().filter(|c| invokes(c, tool)).count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cmd: &ToolCommand) -> Vec<String> {
        self.calls.lock().push(cmd.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(cmd)
    }
}

/// True when `cmd` runs `tool` (by basename), directly or somewhere inside a shell pipeline.
pub fn invokes(cmd: &ToolCommand, tool: &str) -> bool {
    match &cmd.kind {
        CommandKind::Argv { .. } => cmd.tool_name() == tool,
        CommandKind::Shell(script) => script.split_whitespace().any(|w| w.rsplit('/').next() == Some(tool)),
    }
}

pub fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Every binary is "installed" under /fake/bin unless listed as missing.
pub struct FakeLocator {
    pub missing: Vec<String>,
    pub httpx: Option<PathBuf>,
}

impl FakeLocator {
    pub fn all() -> Arc<Self> {
        Arc::new(Self { missing: Vec::new(), httpx: Some(PathBuf::from("/fake/bin/httpx")) })
    }

    pub fn without_httpx() -> Arc<Self> {
        Arc::new(Self { missing: Vec::new(), httpx: None })
    }
}

#[async_trait]
impl BinaryLocator for FakeLocator {
    fn locate(&self, name: &str) -> Option<PathBuf> {
        (!self.missing.iter().any(|m| m == name)).then(|| PathBuf::from("/fake/bin").join(name))
    }

    async fn locate_httpx(&self) -> Option<PathBuf> {
        self.httpx.clone()
    }
}

pub struct FakeCt {
    pub names: Vec<String>,
    pub calls: Mutex<usize>,
}

impl FakeCt {
    pub fn with(names: &[&str]) -> Arc<Self> {
        Arc::new(Self { names: lines(names), calls: Mutex::new(0) })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl CertTransparencySource for FakeCt {
    async fn subdomains(&self, _domain: &str) -> Vec<String> {
        *self.calls.lock() += 1;
        self.names.clone()
    }
}

pub fn toolkit(runner: Arc<ScriptedRunner>, locator: Arc<FakeLocator>, ct: Arc<FakeCt>) -> Toolkit {
    Toolkit::new(runner, locator, ct)
}

/// ffuf fake: writes `body` to the report path given with `-o`.
pub fn write_ffuf_report(cmd: &ToolCommand, body: &str) {
    if let Some(out) = cmd.flag_value("-o") {
        std::fs::write(out, body).expect("write fake ffuf report");
    }
}
