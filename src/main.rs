use anyhow::Result;
use clap::{Parser, Subcommand};

use fh_over_scanner::api;
use fh_over_scanner::cli;
use fh_over_scanner::config::Config;
use fh_over_scanner::db;

#[derive(Parser)]
#[command(name = "fh-over-scanner")]
#[command(about = "First-half over 0.5 goals value-betting scanner")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Scan today's fixtures and print the results
    ScanToday,
    /// Scan fixtures for a single date (YYYY-MM-DD)
    ScanDate { date: String },
    /// Scan fixtures across a date range (YYYY-MM-DD YYYY-MM-DD)
    ScanRange { start: String, end: String },
    /// Initialize the SQLite schema
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load()?;
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("starting fh-over-scanner on port {port}");
            api::serve(cfg, port).await?;
        }
        Some(Commands::ScanToday) => cli::scan_today(&cfg).await?,
        Some(Commands::ScanDate { date }) => cli::scan_date(&cfg, &date).await?,
        Some(Commands::ScanRange { start, end }) => cli::scan_range(&cfg, &start, &end).await?,
        Some(Commands::InitDb) => {
            tracing::info!("initializing database...");
            db::init_database().await?;
        }
        None => {
            tracing::info!("starting fh-over-scanner on port 3000");
            api::serve(cfg, 3000).await?;
        }
    }

    Ok(())
}
