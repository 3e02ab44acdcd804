use anyhow::{Context, Result};
use clap::Parser;
use rand::seq::IndexedRandom;
use rand::RngExt;
use reqwest::Method;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

const METHODS: [Method; 3] = [Method::GET, Method::POST, Method::PUT];

const USER_AGENTS: &[&str] = &[
    // Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edg/91.0.864.41",
    // macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/13.1.2 Safari/605.1.15",
    // Linux
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/89.0",
    "Mozilla/5.0 (X11; CrOS x86_64 13601.102.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    // iOS
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (iPad; CPU OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Mobile/15E148 Safari/604.1",
    // Android
    "Mozilla/5.0 (Linux; Android 11; SM-G991B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.120 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 10; Pixel 3 XL) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Mobile Safari/537.36",
    "Mozilla/5.0 (Linux; Android 11; SM-T870) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.120 Safari/537.36",
];

const REFERRER_HOSTS: &[&str] = &[
    "news.example.com",
    "search.example.org",
    "blog.example.net",
    "forum.example.io",
];

#[derive(Parser)]
#[command(name = "zwischen-loadgen")]
#[command(about = "Send randomized traffic at an instrumented server", long_about = None)]
struct Cli {
    /// Base URL of the server under test
    #[arg(long, default_value = "http://127.0.0.1:8000")]
    target: String,

    /// Total number of requests to send
    #[arg(short = 'n', long, default_value_t = 10_000)]
    requests: usize,

    /// Maximum requests in flight
    #[arg(short, long, default_value_t = 64)]
    concurrency: usize,

    /// Paths to pick from (repeatable)
    #[arg(short, long = "endpoint", default_values_t = ["/".to_string(), "/something".to_string()])]
    endpoints: Vec<String>,
}

/// One randomized request, drawn before any await point
struct PlannedRequest {
    method: Method,
    url: String,
    user_agent: &'static str,
    forwarded_for: Ipv4Addr,
    referrer: String,
}

fn plan_request(target: &str, endpoints: &[String]) -> Option<PlannedRequest> {
    let mut rng = rand::rng();

    let method = METHODS.choose(&mut rng)?.clone();
    let endpoint = endpoints.choose(&mut rng)?;
    let user_agent = *USER_AGENTS.choose(&mut rng)?;
    let host = REFERRER_HOSTS.choose(&mut rng)?;
    let forwarded_for = Ipv4Addr::new(
        rng.random_range(1..=223),
        rng.random_range(0..=255),
        rng.random_range(0..=255),
        rng.random_range(1..=254),
    );
    let referrer = format!("https://{host}/posts/{}", rng.random_range(1..=500));

    Some(PlannedRequest {
        method,
        url: format!("{}{}", target.trim_end_matches('/'), endpoint),
        user_agent,
        forwarded_for,
        referrer,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    anyhow::ensure!(cli.concurrency > 0, "--concurrency must be at least 1");
    anyhow::ensure!(!cli.endpoints.is_empty(), "at least one --endpoint is required");

    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let permits = Arc::new(Semaphore::new(cli.concurrency));
    let mut tasks = JoinSet::new();

    info!(
        "Sending {} requests to {} ({} concurrent)",
        cli.requests, cli.target, cli.concurrency
    );

    for _ in 0..cli.requests {
        let Some(planned) = plan_request(&cli.target, &cli.endpoints) else {
            continue;
        };
        let permit = Arc::clone(&permits).acquire_owned().await?;
        let client = client.clone();

        tasks.spawn(async move {
            let _permit = permit;
            client
                .request(planned.method, &planned.url)
                .header(reqwest::header::USER_AGENT, planned.user_agent)
                .header("x-forwarded-for", planned.forwarded_for.to_string())
                .header(reqwest::header::REFERER, planned.referrer)
                .send()
                .await
                .map(|response| response.status().as_u16())
        });
    }

    let mut statuses: BTreeMap<u16, usize> = BTreeMap::new();
    let mut failures = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(status)) => *statuses.entry(status).or_default() += 1,
            Ok(Err(err)) => {
                failures += 1;
                warn!(error = %err, "request failed");
            }
            Err(err) => {
                failures += 1;
                warn!(error = %err, "request task panicked");
            }
        }
    }

    println!("{:<10} {}", "Status", "Responses");
    println!("{}", "-".repeat(24));
    for (status, count) in &statuses {
        println!("{:<10} {}", status, count);
    }
    if failures > 0 {
        println!("{:<10} {}", "failed", failures);
    }

    Ok(())
}
