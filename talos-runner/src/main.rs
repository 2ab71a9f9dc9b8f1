use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod args;
mod commands;

/// `LOG` takes an `EnvFilter` directive; without it only warnings are shown,
/// or info with `--verbose`.
fn init_tracing(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("LOG").unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Generate(args) => commands::generate::generate(&cli, args).await,
        Commands::Add(args) => commands::add::add(&cli, args).await,
    }
}
