use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod chart;
mod data;
mod error;
mod models;
mod page;
mod selection;
mod server;
mod stats;

const DEFAULT_DATA_PATH: &str = "cleaned_attendance_data.csv";

#[derive(Parser)]
#[command(name = "module-attendance-dashboard")]
#[command(about = "Interactive attendance dashboard per module", long_about = None)]
struct Cli {
    /// Attendance CSV (falls back to ATTENDANCE_DATA, then ./cleaned_attendance_data.csv)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard over HTTP
    Serve {
        #[arg(long, default_value = "Journalism")]
        default_module: String,
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: SocketAddr,
        #[arg(long, default_value_t = 1024)]
        max_sessions: usize,
    },
    /// List the modules present in the dataset
    Modules,
    /// Print the statistics and daily rate for one module
    Summary {
        #[arg(long)]
        module: String,
    },
}

fn resolve_data_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os("ATTENDANCE_DATA").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let data_path = resolve_data_path(cli.data);
    let dataset = data::load_dataset(&data_path)
        .with_context(|| format!("failed to load dataset from {}", data_path.display()))?;

    match cli.command {
        Commands::Serve {
            default_module,
            addr,
            max_sessions,
        } => {
            let state = server::AppState::new(dataset, &default_module, max_sessions)
                .context("default module must be present in the dataset")?;
            server::run(Arc::new(state), addr).await?;
        }
        Commands::Modules => {
            for module in dataset.catalog.iter() {
                println!("{module}");
            }
        }
        Commands::Summary { module } => {
            if !dataset.catalog.contains(&module) {
                return Err(error::InvalidSelectionError { module }.into());
            }
            let dashboard = stats::compute_dashboard(&dataset.records, &module);
            println!(
                "{} ({} records)",
                dashboard.selection, dashboard.record_count
            );
            println!("Mean attendance: {}", page::format_stat(dashboard.stats.mean));
            println!("Std. deviation: {}", page::format_stat(dashboard.stats.std_dev));
            println!("Daily attendance rate:");
            for point in &dashboard.daily_rate {
                println!("- {} {:.2}", point.date, point.rate);
            }
        }
    }

    Ok(())
}
