use convo::cli::{parse_args, run_cli_command};
use convo::config::SessionConfig;

use color_eyre::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Logs go to stderr so streamed replies on stdout stay clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let command = parse_args(std::env::args());
    run_cli_command(command, SessionConfig::from_env()).await
}
