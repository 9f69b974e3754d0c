use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use feed_translator::{CompletionClient, Config, Pipeline};

/// Fetch, translate and store articles from configured feeds.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Re-run the pipeline every N minutes instead of exiting.
    #[arg(long, value_name = "MINUTES")]
    every: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = Config::load(&args.config)?;

    let api_key = std::env::var("API_KEY").ok();
    if api_key.is_none() {
        warn!("API_KEY is not set; translation requests will fail");
    }

    let backend = CompletionClient::new(&config.translator, api_key);
    let pipeline = Pipeline::new(config, Box::new(backend));

    match args.every {
        None => {
            pipeline.run().await;
        }
        Some(minutes) => {
            info!("Re-running every {} minutes", minutes);
            let mut ticker = tokio::time::interval(Duration::from_secs(minutes.max(1) * 60));
            loop {
                ticker.tick().await;
                pipeline.run().await;
            }
        }
    }

    Ok(())
}
