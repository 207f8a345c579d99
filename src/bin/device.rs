//! Water Monitor Device CLI
//!
//! Stands in for the field sensor board and doubles as an operator tool:
//! - Publish a single reading
//! - Simulate a device posting ADC samples on an interval
//! - Check server status
//! - Print a default server config

use clap::{Parser, Subcommand};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;

use water_monitor::config::generate_default_config;
use water_monitor::telemetry::reading::ADC_MAX;
use water_monitor::Reading;

const PUBLISH_PATH: &str = "/water-monitor/publish";

#[derive(Parser)]
#[command(name = "water-monitor-device")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sensor device simulator and operator tool for the water monitor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server URL
    #[arg(long, default_value = "http://localhost:8000", global = true)]
    pub server_url: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Publish one reading
    Publish {
        /// Turbidity (NTU)
        #[arg(long = "t")]
        turbidity: f64,
        /// pH
        #[arg(long = "ph")]
        ph: f64,
        /// Conductivity (µS/cm)
        #[arg(long = "c")]
        conductivity: f64,
    },

    /// Post simulated 12-bit ADC samples until stopped
    Simulate {
        /// Milliseconds between samples
        #[arg(short, long, default_value = "1000")]
        interval_ms: u64,
        /// Stop after this many samples
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },

    /// Show server status
    Status,

    /// Print a default server config file
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Publish {
            turbidity,
            ph,
            conductivity,
        } => {
            let reading = Reading::new(turbidity, ph, conductivity);
            match publish(&client, &cli.server_url, &reading).await {
                Ok(reply) => println!("{} -> {}", reading, describe(&reply)),
                Err(e) => {
                    eprintln!("Publish failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Simulate { interval_ms, count } => {
            let interval = Duration::from_millis(interval_ms.max(1));
            simulate(&client, &cli.server_url, interval, count).await;
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.server_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: Value = resp.json().await?;
                    println!("Water Monitor Status");
                    println!("====================");
                    println!("Status:       {}", health["status"].as_str().unwrap_or("unknown"));
                    println!("Version:      {}", health["version"].as_str().unwrap_or("unknown"));
                    println!("Mode:         {}", health["mode"].as_str().unwrap_or("unknown"));
                    println!("Viewers:      {}", health["viewers"]);
                    println!("Publishers:   {}", health["publishers"]);
                    println!("Pub/sub:      {}", health["pubsub_connections"]);
                    println!("Uptime:       {}s", health["uptime_seconds"]);
                }
                Ok(resp) => {
                    eprintln!("Server returned {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot reach server at {}: {}", cli.server_url, e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Config => {
            print!("{}", generate_default_config());
        }
    }

    Ok(())
}

/// POST one reading and return the server's reply
async fn publish(
    client: &reqwest::Client,
    server_url: &str,
    reading: &Reading,
) -> anyhow::Result<Value> {
    let response = client
        .post(format!("{}{}", server_url, PUBLISH_PATH))
        .json(reading)
        .send()
        .await?;

    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        anyhow::bail!("server returned {}: {}", status, describe(&body));
    }
    Ok(body)
}

/// Sample, convert and post until `count` is reached or Ctrl+C
async fn simulate(
    client: &reqwest::Client,
    server_url: &str,
    interval: Duration,
    count: Option<u64>,
) {
    let mut rng = rand::thread_rng();
    let mut ticker = tokio::time::interval(interval);
    let mut sent = 0u64;
    let mut failed = 0u64;

    println!(
        "Posting a sample every {:?} to {}{} (Ctrl+C to stop)",
        interval, server_url, PUBLISH_PATH
    );

    loop {
        if count.is_some_and(|n| sent + failed >= n) {
            break;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let raw = sample_adc(&mut rng);
        let reading = Reading::from_adc(raw[0], raw[1], raw[2]);

        match publish(client, server_url, &reading).await {
            Ok(reply) => {
                sent += 1;
                println!("raw={:?} {} -> {}", raw, reading, describe(&reply));
            }
            Err(e) => {
                failed += 1;
                eprintln!("raw={:?} {} -> error: {}", raw, reading, e);
            }
        }
    }

    println!("Sent {} samples ({} failed)", sent, failed);
}

/// Three 12-bit samples: turbidity, pH, conductivity
fn sample_adc<R: Rng>(rng: &mut R) -> [u16; 3] {
    let max = ADC_MAX as u16;
    [
        rng.gen_range(0..=max),
        rng.gen_range(0..=max),
        rng.gen_range(0..=max),
    ]
}

fn describe(reply: &Value) -> String {
    match (reply["status"].as_str(), reply["message"].as_str()) {
        (Some(status), Some(message)) => format!("{}: {}", status, message),
        _ => reply.to_string(),
    }
}
