//! COVID Trends - command-line report generator

use anyhow::{Context, Result};
use clap::Parser;
use covid_trends::data::{DataLoader, RegionFilter, TableKind};
use covid_trends::{pipeline, ReportConfig, ReportWriter};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Regional COVID-19 trend report from county time-series CSVs
#[derive(Debug, Parser)]
#[command(name = "covid-trends", version, about)]
struct Cli {
    /// Wide-format cumulative cases CSV
    #[arg(long)]
    cases: PathBuf,

    /// Wide-format cumulative deaths CSV (with a Population column)
    #[arg(long, required_unless_present = "list_regions")]
    deaths: Option<PathBuf>,

    /// Parent region to report on, e.g. "Texas"
    #[arg(long, required_unless_present = "list_regions")]
    region: Option<String>,

    /// Output directory for tables, summary and charts
    #[arg(long, default_value = "report")]
    output: PathBuf,

    /// Skip PNG chart rendering
    #[arg(long)]
    no_charts: bool,

    /// Chart width in pixels
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Chart height in pixels
    #[arg(long, default_value_t = 800)]
    height: u32,

    /// Print the regions present in the cases table and exit
    #[arg(long)]
    list_regions: bool,
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();

    if cli.list_regions {
        let table = DataLoader::load_csv(&cli.cases, TableKind::Cases)
            .with_context(|| format!("loading {}", cli.cases.display()))?;
        for region in RegionFilter::regions(&table).context("listing regions")? {
            println!("{region}");
        }
        return Ok(());
    }

    let config = ReportConfig {
        cases_path: cli.cases,
        deaths_path: cli.deaths.context("--deaths is required")?,
        region: cli.region.context("--region is required")?,
        output_dir: cli.output,
        render_charts: !cli.no_charts,
        chart_width: cli.width,
        chart_height: cli.height,
    };

    let output = pipeline::run(&config)
        .with_context(|| format!("building report for {}", config.region))?;

    let written = ReportWriter::new(&config.output_dir)
        .with_charts(config.render_charts)
        .with_chart_size(config.chart_width, config.chart_height)
        .write(&output)
        .context("writing report")?;

    for path in &written {
        info!(path = %path.display(), "wrote");
    }
    println!("{}", output.regression);

    Ok(())
}
