//! CDC Trends - CLI entry point
//!
//! Fetches the CDC vaccination survey export, cleans it, prints behavioral
//! trends and vaccination guidance, renders the charts and persists the
//! cleaned dataset.

use anyhow::{Context, Result};
use cdc_trends::analysis::{AdvisorError, Scope, TrendRecord, VaccinationGuidance};
use cdc_trends::charts::StaticChartRenderer;
use cdc_trends::data::SocrataSource;
use cdc_trends::logging::{init_logging, DEFAULT_LOG_FILE};
use cdc_trends::CdcAgent;
use clap::Parser;
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};

const DEFAULT_SOURCE: &str = "https://data.cdc.gov/api/views/qz99-wyhv/rows.json?accessType=DOWNLOAD";

#[derive(Parser)]
#[command(name = "cdc_trends")]
#[command(about = "Clean and analyze CDC vaccination survey trends", long_about = None)]
struct Cli {
    /// URL or file path of the Socrata rows.json export
    #[arg(long, env = "CDC_SOURCE_URL", default_value = DEFAULT_SOURCE)]
    source: String,

    /// CSV file the cleaned dataset is saved to and reloaded from
    #[arg(short, long, env = "CDC_OUTPUT", default_value = "processed_cdc_data.csv")]
    output: PathBuf,

    /// PNG file for the trend charts
    #[arg(long, env = "CDC_CHART", default_value = "cdc_trends.png")]
    chart: PathBuf,

    /// Scope for each guidance pass (1/national, 2/jurisdictional); prompts twice when omitted
    #[arg(long)]
    scope: Vec<String>,

    /// Optional JSON file receiving the behavioral report and guidance
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Skip chart rendering
    #[arg(long, default_value_t = false)]
    skip_chart: bool,
}

#[derive(Serialize)]
struct RunReport<'a> {
    behavioral_trends: &'a [TrendRecord],
    guidance: &'a [VaccinationGuidance],
    conversation_history: &'a [String],
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let _log_guard = init_logging(&log_file_path);

    let cli = Cli::parse();

    let source = SocrataSource::new(&cli.source);
    let mut agent = CdcAgent::from_source(&source)
        .with_context(|| format!("failed to load dataset from {}", cli.source))?;

    // The run continues on partially cleaned data.
    match agent.validate_and_transform() {
        Ok(_) => println!("Data validation and transformation completed successfully."),
        Err(e) => println!("Error during data validation and transformation: {e}"),
    }

    let trends = agent
        .analyze_behavioral_trends()
        .context("behavioral trend analysis failed")?;
    for record in &trends {
        println!("{}\n", record);
    }

    let selections = if cli.scope.is_empty() {
        prompt_scopes(2)?
    } else {
        cli.scope.clone()
    };

    let mut guidance = Vec::with_capacity(selections.len());
    for selection in &selections {
        match agent.offer_vaccination_guidance(selection) {
            Ok(g) => {
                print_guidance(&g);
                guidance.push(g);
            }
            Err(AdvisorError::InvalidScope(_)) => println!("Your entered value is not in scope"),
            Err(e) => return Err(e).context("vaccination guidance failed"),
        }
    }

    if cli.skip_chart {
        info!("Chart rendering skipped");
    } else {
        let renderer = StaticChartRenderer::new(&cli.chart);
        match agent.visualize(&renderer) {
            Ok(_) => println!("Charts written to {}.", cli.chart.display()),
            Err(e) => error!(error = %e, "Chart rendering failed"),
        }
    }

    agent
        .save_data(&cli.output)
        .with_context(|| format!("failed to save {}", cli.output.display()))?;
    println!("Data saved to {}.", cli.output.display());

    agent
        .load_data(&cli.output)
        .with_context(|| format!("failed to load {}", cli.output.display()))?;
    println!("Data loaded from {}.", cli.output.display());

    agent.remember_conversation("User: What are the trends in my region?");

    if let Some(path) = &cli.report_json {
        let report = RunReport {
            behavioral_trends: &trends,
            guidance: &guidance,
            conversation_history: agent.conversation_history(),
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "Report written");
    }

    Ok(())
}

/// Ask for a scope `passes` times on stdin.
fn prompt_scopes(passes: usize) -> Result<Vec<String>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut selections = Vec::with_capacity(passes);

    for _ in 0..passes {
        let menu: Vec<String> = Scope::ALL
            .iter()
            .map(|s| format!("{}: {}", s.selector(), s))
            .collect();
        println!("{{{}}}", menu.join(", "));
        print!("Please Enter the Scope (1 or 2): ");
        io::stdout().flush()?;

        match lines.next() {
            Some(line) => selections.push(line?),
            None => break,
        }
    }

    Ok(selections)
}

fn print_guidance(guidance: &VaccinationGuidance) {
    println!("Vaccination Rate Analysis ({} scope):", guidance.scope);
    println!("Average Vaccination Rate Trend: {}", guidance.trend);
    for message in &guidance.messages {
        println!("Guidance: {}", message);
    }
}
