use clap::Parser;
use sales_etl::config::EtlConfig;
use sales_etl::logging::LoggingContext;
use sales_etl::pipeline::EtlPipeline;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sales_etl")]
#[command(about = "Aggregate active-store sales from CSV extracts and master files")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML file overriding the default locations
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory of per-file sales CSV extracts
    #[arg(long)]
    sales_dir: Option<PathBuf>,
    /// Where to write the aggregated CSV
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => EtlConfig::load(path)?,
        None => EtlConfig::default(),
    };
    if let Some(dir) = cli.sales_dir {
        config.sales_dir = dir;
    }
    if let Some(output) = cli.output {
        config.output_file = output;
    }

    // Keep the context alive for the whole run; dropping it flushes the log file.
    let _logging = LoggingContext::init(&config.logging)?;

    // Success or abort, the outcome is only reported through the log.
    let _report = EtlPipeline::new(config).run();
    Ok(())
}
