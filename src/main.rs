//! Command-line front end: prints the extraction result as JSON on stdout.
//!
//! Logs go to stderr so the output can be piped straight into a donation
//! payload or a file.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use healthsteps::{Cli, ExtractionPipeline};

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_directive().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let pipeline = ExtractionPipeline::new(cli.options());
    let result = pipeline
        .extract(&cli.archive)
        .with_context(|| format!("could not process {}", cli.archive.display()))?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        result.to_json()?
    };
    println!("{json}");

    tracing::info!(
        days = result.rows.len(),
        total = result.total_steps(),
        "done"
    );

    Ok(())
}
