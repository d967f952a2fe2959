use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use linkgauge::analysis::{classify_download, classify_ping, classify_upload, PingResults, TargetSummary};
use linkgauge::config::{Config, LoggingConfig};
use linkgauge::storage::RunResult;
use linkgauge::throughput::report::{format_speed, format_summary};
use linkgauge::throughput::TransferResult;

#[derive(Parser)]
#[command(
    name = "linkgauge",
    about = "Measure network latency and throughput against public endpoints",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file (default: $LINKGAUGE_CONFIG, then ./linkgauge.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the history file location
    #[arg(long, global = true)]
    history_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full test (ping, download, upload) and save it to history
    Run {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Latency test against every ping target
    Ping {
        #[arg(long)]
        json: bool,
    },

    /// Single download test
    Download {
        #[arg(long)]
        json: bool,
    },

    /// Single upload test
    Upload {
        #[arg(long)]
        json: bool,
    },

    /// Show recent full-test results
    History {
        /// Number of most recent runs to show
        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(path) = cli.history_file {
        config.history.path = path;
    }
    init_tracing(&config.logging);

    let runner = linkgauge::runner_from_config(config)?;

    match cli.command {
        Commands::Run { yes, json } => {
            if !yes && !confirm("This may take a few minutes and use network traffic. Continue? (y/N): ")? {
                println!("Test cancelled.");
                return Ok(());
            }
            let report = runner.run_full().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&report.result)?);
            } else {
                print_run(&report.result);
            }
            if let Some(e) = &report.persist_error {
                eprintln!("Warning: results were not saved: {}", e);
            }
        }
        Commands::Ping { json } => {
            let results = runner.run_ping().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_ping(&results);
            }
        }
        Commands::Download { json } => {
            let result = runner.run_download().await;
            print_transfer("Download", &result, json, classify_download)?;
        }
        Commands::Upload { json } => {
            let result = runner.run_upload().await;
            print_transfer("Upload", &result, json, classify_upload)?;
        }
        Commands::History { limit } => {
            let runs = runner.history(limit)?;
            print_history(&runs);
        }
    }

    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    // Closed stdin reads zero bytes and counts as "no".
    if std::io::stdin().lock().read_line(&mut answer)? == 0 {
        println!();
        return Ok(false);
    }
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn print_ping(results: &PingResults) {
    println!("\nPING (response time)");
    println!("{:-<60}", "");
    for (url, summary) in results.iter() {
        match summary {
            TargetSummary::Measured(s) => println!(
                "{:<32} avg {:>7.1} ms | min {:>7.1} | max {:>7.1} | n={}",
                url,
                s.mean,
                s.min,
                s.max,
                s.count()
            ),
            TargetSummary::Failed { error } => println!("{:<32} FAILED ({})", url, error),
        }
    }
    match results.overall_mean() {
        Some(ms) => println!("\nOverall ping: {:.1} ms ({})", ms, classify_ping(ms)),
        None => println!("\nNo target answered."),
    }
}

fn print_transfer(
    label: &str,
    result: &TransferResult,
    json: bool,
    classify: fn(f64) -> linkgauge::analysis::Tier,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    println!("{}", format_summary(&label.to_lowercase(), result));
    if let Some(mbps) = result.speed_mbps() {
        println!("{} tier: {}", label, classify(mbps));
    }
    Ok(())
}

fn print_run(run: &RunResult) {
    println!("\n=== linkgauge results ({}) ===", run.timestamp.format("%Y-%m-%d %H:%M:%S"));
    print_ping(&run.ping);

    let overview = run.overview();

    println!("\nDOWNLOAD");
    println!("{:-<60}", "");
    for result in &run.download {
        println!("  {}", format_summary("download", result));
    }
    match (overview.avg_download_mbps, overview.max_download_mbps) {
        (Some(avg), Some(max)) => {
            println!("Average: {}", format_speed(avg));
            println!("Peak:    {}", format_speed(max));
            println!("Tier:    {}", classify_download(avg));
        }
        _ => println!("Download speed could not be measured."),
    }

    println!("\nUPLOAD");
    println!("{:-<60}", "");
    println!("  {}", format_summary("upload", &run.upload));
    if let Some(mbps) = overview.upload_mbps {
        println!("Tier:    {}", classify_upload(mbps));
    }
    println!();
}

fn print_history(runs: &[RunResult]) {
    if runs.is_empty() {
        println!("No test history yet.");
        return;
    }
    println!("\nTEST HISTORY (last {})", runs.len());
    println!("{:=<60}", "");
    for (i, run) in runs.iter().enumerate() {
        let o = run.overview();
        println!("{}. {}", i + 1, run.timestamp.format("%Y-%m-%d %H:%M"));
        println!("   Ping:     {:.1} ms", o.avg_ping_ms.unwrap_or(0.0));
        println!("   Download: {:.1} Mbps", o.avg_download_mbps.unwrap_or(0.0));
        println!("   Upload:   {:.1} Mbps", o.upload_mbps.unwrap_or(0.0));
        println!();
    }
}
