use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands};
use reconflow::external::{check_prereqs, tool_version, Toolkit, REQUIRED_BINARIES};
use reconflow::{Config, Pipeline, RunOptions, RunOutcome};

const DEFAULT_CONFIG: &str = "config.yaml";

fn init_tracing(debug: bool, verbose: bool) {
    // Keep external crates (reqwest/hyper) at INFO so debug mode stays readable.
    // RUST_LOG, when set, wins over the computed filter.
    use tracing_subscriber::EnvFilter;
    let crate_level = if debug { "debug" } else if verbose { "info" } else { "warn" };
    let filter_str = format!("reconflow={crate_level},reqwest=info,hyper=info,h2=info");
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&filter_str))
        .unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();
}

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.debug, cli.verbose);

    match cli.command {
        Commands::Healthcheck => healthcheck().await,
        Commands::Run { target, config, resolvers, force, proxy, rl_per_host, outputs, threads, wordlist } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(o) = outputs {
                cfg.outputs = o;
            }
            if let Some(t) = threads {
                cfg.threads = t;
            }
            if let Some(w) = wordlist {
                cfg.wordlist = Some(w);
            }
            cfg.validate()?;

            let options = RunOptions { resolvers, force, proxy, rate_limit: rl_per_host };
            run_pipeline(target, cfg, options).await
        }
    }
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    match explicit {
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(DEFAULT_CONFIG).exists() => Ok(Config::load(Path::new(DEFAULT_CONFIG))?),
        None => {
            tracing::info!("no {DEFAULT_CONFIG} found; using built-in defaults");
            Ok(Config::default())
        }
    }
}

async fn run_pipeline(target: String, cfg: Config, options: RunOptions) -> anyhow::Result<()> {
    let toolkit = Toolkit::system(options.proxy.as_deref()).context("failed to set up tool environment")?;
    check_prereqs(toolkit.locator.as_ref(), REQUIRED_BINARIES)
        .context("install the missing tools and make sure they are on PATH")?;
    println!("[+] All binaries found.");

    if let Some(p) = &options.proxy {
        println!("[!] Proxy set: {p}");
    }
    println!("[>] Target: {target}");
    println!(
        "[>] Wordlist: {}",
        cfg.wordlist.as_deref().map(|w| w.display().to_string()).unwrap_or_else(|| "-".into())
    );
    tracing::info!(domain = %target, outputs = %cfg.outputs.display(), threads = cfg.threads, force = options.force, "Starting run");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n[!] Interrupt received; winding down (running tools are not killed)...");
            on_interrupt.cancel();
        }
    });

    let started = std::time::Instant::now();
    let pipeline = Pipeline::new(cfg, toolkit).with_options(options).with_cancellation(cancel);
    let outcome = pipeline.run(&target).await?;
    let out_dir: PathBuf = pipeline.target_dir(&target);

    match outcome {
        RunOutcome::Completed { report, total } => {
            println!("\n{}", "-".repeat(60));
            println!("[+] Report:   {}", report.display());
            println!("[+] URLs:     {total}");
        }
        RunOutcome::NoSubdomains => println!("[!] Stopped early: no subdomains for {target}"),
        RunOutcome::NoResolved => println!("[!] Stopped early: no subdomain of {target} resolves"),
    }
    println!("[*] Artifacts: {}", out_dir.display());
    println!("[*] Elapsed:   {}s", started.elapsed().as_secs());
    Ok(())
}

async fn healthcheck() -> anyhow::Result<()> {
    let toolkit = Toolkit::system(None)?;
    check_prereqs(toolkit.locator.as_ref(), REQUIRED_BINARIES)?;
    println!("[+] All binaries found.");

    println!("\n[*] Versions");
    for bin in REQUIRED_BINARIES {
        let ver = tool_version(toolkit.runner.as_ref(), &toolkit.program(bin)).await;
        println!("   {bin}: {ver}");
    }

    println!("\n[*] Connectivity");
    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
    match client.head("https://github.com").send().await {
        Ok(resp) => println!("[+] github.com -> {}", resp.status()),
        Err(e) => println!("[-] github.com unreachable: {e}"),
    }
    Ok(())
}
