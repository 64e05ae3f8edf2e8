#![allow(clippy::print_stdout)]

use anyhow::Result;
use clap::Parser;
use crosspost::PublishConfig;
use crosspost::cli::{CrosspostCli, run};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = CrosspostCli::parse();
    let config = PublishConfig::from_env()?;
    let output = run(cli.command, &config).await?;
    println!("{output}");
    Ok(())
}
