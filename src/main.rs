use std::process::ExitCode;

mod cli;
mod runner;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse_cli();
    match runner::run_from_cli(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[-] {e:#}");
            ExitCode::FAILURE
        }
    }
}
