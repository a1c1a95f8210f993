use std::path::PathBuf;

use clap::Parser;

#[derive(clap::Parser, Debug)]
#[command(author, version, about = "Unified reconnaissance pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable detailed debug logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    /// Enable verbose logging (global)
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Execute the full pipeline against a target domain
    Run {
        /// Target domain (e.g. example.com)
        target: String,

        /// YAML config file (defaults to ./config.yaml when present)
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Custom resolvers file handed to dnsx
        #[arg(long)]
        resolvers: Option<PathBuf>,

        /// Re-run stages even when their artifacts already exist
        #[arg(long, default_value_t = false)]
        force: bool,

        /// HTTP proxy, e.g. http://127.0.0.1:8080
        #[arg(long)]
        proxy: Option<String>,

        /// ffuf rate limit per host (requests/second)
        #[arg(long)]
        rl_per_host: Option<u32>,

        /// Output root (overrides `outputs`)
        #[arg(short = 'o', long)]
        outputs: Option<PathBuf>,

        /// Thread count for the scanning tools (overrides `threads`)
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Wordlist for ffuf (overrides `wordlist`)
        #[arg(short = 'w', long)]
        wordlist: Option<PathBuf>,
    },

    /// Check that every tool is installed, print versions and test connectivity
    Healthcheck,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
