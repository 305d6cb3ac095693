use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plastron::{ImportOptions, ImportProcessor, ImportSummary, JobConfig, ProcessingOutcome, TEMPLATE};
use std::{fs, path::PathBuf};
use tracing::{error, info, warn, Level};

/// Plastron Import
/// Loads the rows of a CSV metadata spreadsheet as linked-data resources
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output for detailed processing information
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the metadata spreadsheet of a job
    Import {
        /// Path to the job configuration file
        #[arg(short, long, value_name = "PATH TO CONFIG")]
        config: PathBuf,

        /// Stop after this many rows of the spreadsheet
        #[arg(short, long)]
        limit: Option<usize>,

        /// Load this percentage (1-100) of the rows not yet loaded
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
        percent: Option<u8>,

        /// Read the current description of existing resources before updating them
        #[arg(long)]
        read_from_repo: bool,

        /// Check every row without writing anything
        #[arg(long)]
        validate_only: bool,
    },
    /// Check every row of a job without writing anything
    Validate {
        /// Path to the job configuration file
        #[arg(
            short,
            long,
            default_value = "job.jsonc",
            value_name = "PATH TO CONFIG"
        )]
        config: PathBuf,
    },
    /// Generate a job configuration template
    GenerateConfig {
        /// Output path for the generated configuration
        #[arg(short, long, default_value = "job.jsonc", value_name = "OUTPUT PATH")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging with appropriate level
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    match cli.command {
        Commands::Import {
            config,
            limit,
            percent,
            read_from_repo,
            validate_only,
        } => {
            let options = ImportOptions {
                limit,
                percentage: percent,
                read_from_repo,
                validate_only,
            };
            import_command(&config, &options).await
        }
        Commands::Validate { config } => {
            let options = ImportOptions {
                validate_only: true,
                ..Default::default()
            };
            import_command(&config, &options).await
        }
        Commands::GenerateConfig { output } => generate_config_command(&output),
    }
}

async fn import_command(config_path: &PathBuf, options: &ImportOptions) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "Job configuration not found: {}. Try using --config <PATH TO CONFIG>",
            config_path.display()
        );
    }

    let config = JobConfig::from_file(config_path).context("Failed to load job configuration")?;
    info!("Job {} using model {}", config.job_id, config.model);

    let processor = ImportProcessor::new(config).context("Failed to set up import")?;
    let summary = processor
        .process(options)
        .await
        .context("Import failed")?;

    report(&summary);
    if summary.outcome().is_failure() {
        anyhow::bail!(
            "{} row(s) could not be {}",
            summary.state.get_errors().len(),
            if options.validate_only { "validated" } else { "loaded" }
        );
    }
    Ok(())
}

fn report(summary: &ImportSummary) {
    match summary.outcome() {
        ProcessingOutcome::Success => info!("All rows processed successfully"),
        ProcessingOutcome::SuccessWithWarnings(warnings) => {
            for warning in warnings {
                warn!("{}", warning);
            }
        }
        ProcessingOutcome::Failure { errors, warnings } => {
            for warning in warnings {
                warn!("{}", warning);
            }
            for message in errors {
                error!("{}", message);
            }
        }
    }
    info!(
        "Total: {}; considered: {}; loaded: {}; skipped: {}; invalid: {}",
        summary.total, summary.row_count, summary.loaded, summary.skipped, summary.errors
    );
}

fn generate_config_command(output: &PathBuf) -> Result<()> {
    // if output is a directory, append the default file name
    let full_file_output_path = if output.is_dir() {
        output.join("job.jsonc")
    } else {
        output.clone()
    };

    fs::write(&full_file_output_path, TEMPLATE).context(format!(
        "Failed to write configuration to: {}",
        output.display()
    ))?;

    info!(
        "Successfully generated configuration template at: {}",
        full_file_output_path.display()
    );
    Ok(())
}
