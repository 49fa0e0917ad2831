// src/main.rs

use launchpad::engine::{RunOutcome, EXIT_CONFIG_ERROR};
use launchpad::{cli, logging, run};

#[tokio::main]
async fn main() {
    let code = match run_main().await {
        Ok(outcome) => {
            if let Some(summary) = outcome.summary() {
                eprintln!("{summary}");
            }
            outcome.exit_code()
        }
        Err(err) => {
            eprintln!("launchpad error: {err:?}");
            EXIT_CONFIG_ERROR
        }
    };
    std::process::exit(code);
}

async fn run_main() -> anyhow::Result<RunOutcome> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
