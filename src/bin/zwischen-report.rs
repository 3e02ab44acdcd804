use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use zwischen::analytics::{AnalyticsAggregator, Dimension, WindowMode};
use zwischen::config::Config;
use zwischen::storage;

#[derive(Parser)]
#[command(name = "zwischen-report")]
#[command(about = "Query recorded request analytics from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Top values of a dimension
    Top {
        /// country, city, method, endpoint, status_code, browser, os,
        /// device, referrer, ip or coordinates
        dimension: String,
        /// hour, day, week, month, year or alltime
        #[arg(short, long, default_value = "alltime")]
        window: String,
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
    /// Total requests in a window
    Count {
        #[arg(short, long, default_value = "alltime")]
        window: String,
    },
    /// Most recent events
    Tail {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let store = storage::connect(&config.database).await?;
    let aggregator = AnalyticsAggregator::new(store.clone());
    let now = Utc::now();

    match cli.command {
        Commands::Top {
            dimension,
            window,
            limit,
        } => {
            let dimension = dimension.parse::<Dimension>()?;
            let window = window.parse::<WindowMode>()?;
            let entries = aggregator.top(dimension, window, limit, now).await?;

            if entries.is_empty() {
                println!("No requests recorded in window '{}'.", window);
            } else {
                println!("{:<50} {}", dimension.as_str(), "Count");
                println!("{}", "-".repeat(60));
                for entry in entries {
                    println!("{:<50} {}", entry.value.to_string(), entry.count);
                }
            }
        }
        Commands::Count { window } => {
            let window = window.parse::<WindowMode>()?;
            let count = aggregator.count(window, now).await?;
            println!("{} requests ({})", count, window);
        }
        Commands::Tail { limit } => {
            let events = store.recent(limit.clamp(1, 1000)).await?;
            for event in events {
                let at = DateTime::<Utc>::from_timestamp(event.timestamp, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| event.timestamp.to_string());
                println!(
                    "{:>8} {} {:<6} {:<30} {} {:<39} {}/{} {} {}",
                    event.id,
                    at,
                    event.method,
                    event.endpoint,
                    event.status_code,
                    event.ip,
                    event.country,
                    event.city,
                    event.browser,
                    event.device
                );
            }
        }
    }

    Ok(())
}
