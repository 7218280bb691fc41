// sabr entry point.
//
// 1. Initialize tracing (stderr, so stdout stays pure JSON)
// 2. Parse arguments
// 3. Run the command and print its result as pretty JSON

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use sabr_cli::commands::{self, Cli};

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    debug!(?cli, "parsed arguments");

    let value = commands::run(&cli)?;
    let text = serde_json::to_string_pretty(&value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("sabr_cli=info,sabr_engine=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
