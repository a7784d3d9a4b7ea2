//! Main entry point for the Varanno CLI.

use clap::{command, Parser, Subcommand};

use varanno::{annotate, common};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Annotate VCF alleles with read depth, population frequency and consequence"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Annotate the alleles of a VCF file.
    Annotate(annotate::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(common::tracing_level(&cli.common))
        .compact()
        .finish();

    // Install collector and go into sub commands.
    tracing::subscriber::with_default(collector, || {
        tracing::info!("Varanno {} startup", common::version());

        match &cli.command {
            Commands::Annotate(args) => annotate::run(&cli.common, args)?,
        }

        tracing::info!("All done. Have a nice day!");

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}
