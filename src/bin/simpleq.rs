//! simpleq CLI: drive producer/consumer workloads against the queue.

use clap::{Parser, Subcommand};
use simpleq::config::Config;
use simpleq::telemetry::{TelemetryConfig, init_telemetry};
use simpleq::workload::{self, Report, Scenario, ScenarioOutcome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "simpleq", about = "Multi-producer multi-consumer work queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a producer/consumer workload
    Run {
        /// TOML file with workload settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of producer threads
        #[arg(long)]
        producers: Option<usize>,
        /// Number of consumer threads
        #[arg(long)]
        consumers: Option<usize>,
        /// Items pushed by each producer
        #[arg(long)]
        items: Option<u64>,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one of the canonical scenarios (a, b, c, d)
    Scenario {
        /// Scenario label
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            producers,
            consumers,
            items,
            json,
        } => {
            let mut config = match config {
                Some(path) => Config::load(&path)?,
                None => Config::from_env()?,
            };
            if let Some(n) = producers {
                config.producers = n;
            }
            if let Some(n) = consumers {
                config.consumers = n;
            }
            if let Some(n) = items {
                config.items_per_producer = n;
            }
            cmd_run(config, json).await
        }
        Command::Scenario { name } => cmd_scenario(name.parse()?).await,
    }
}

async fn cmd_run(config: Config, json: bool) -> anyhow::Result<()> {
    config.validate()?;

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "simpleq".to_string(),
        log_level: config.log_level.clone(),
    })?;

    let report = tokio::task::spawn_blocking(move || workload::run(&config)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if !report.is_exact() {
        anyhow::bail!(
            "received {} of {} items, or some more than once",
            report.total(),
            report.produced
        );
    }
    Ok(())
}

async fn cmd_scenario(scenario: Scenario) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint,
        service_name: "simpleq".to_string(),
        log_level: config.log_level,
    })?;

    let outcome = tokio::task::spawn_blocking(move || workload::run_scenario(scenario)).await??;
    let passed = outcome.passed(scenario);

    match &outcome {
        ScenarioOutcome::Drained(report) => print_report(report),
        ScenarioOutcome::Rejected { error, stats } => {
            println!("Rejected:   {error}");
            println!("Pending:    {}", stats.pending);
            println!("Closed:     {}", stats.closed);
        }
    }

    if !passed {
        anyhow::bail!("scenario {} failed", scenario.label());
    }
    println!("\nscenario {} passed", scenario.label());
    Ok(())
}

fn print_report(report: &Report) {
    println!("Run:        {}", report.run_id);
    println!("Queue:      {}", report.queue);
    println!("Produced:   {}", report.produced);
    println!("Received:   {}", report.total());
    println!("Elapsed:    {}ms", report.elapsed_ms);
    println!("{}", "-".repeat(40));
    for (index, items) in report.received.iter().enumerate() {
        let preview: Vec<String> = items.iter().take(10).map(u64::to_string).collect();
        let more = if items.len() > 10 { ", ..." } else { "" };
        println!(
            "consumer {index:<3} {:>6} item(s)  [{}{more}]",
            items.len(),
            preview.join(", ")
        );
    }
}
