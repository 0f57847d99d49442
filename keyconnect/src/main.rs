use anyhow::Context;
use clap::{Parser, Subcommand};
use keyconnect_core::keyconnect_device::{BridgeTransport, InteractionBroker};
use keyconnect_core::{Config, Executor, HttpBackends, Request};
use std::path::{Path, PathBuf};
use tracing::info;

mod server;

#[derive(Parser)]
#[clap(version, about = "Message-passing front end for hardware signing devices")]
struct Cli {
    #[clap(flatten)]
    settings: Settings,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer JSON-line requests from stdin until it closes
    Serve,
    /// Run the request stored in a JSON file, answering prompts from stdin
    Call(CallArgs),
}

#[derive(clap::Args, Debug)]
struct CallArgs {
    /// File holding `{"origin": ..., "request": {...}}`
    file: PathBuf,
}

/// Overrides applied on top of the optional JSON configuration file
#[derive(clap::Args, Debug, Default)]
struct Settings {
    /// JSON configuration file
    #[clap(long, env = "KEYCONNECT_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Device bridge endpoint
    #[clap(long, env = "KEYCONNECT_BRIDGE_URL", global = true)]
    bridge_url: Option<String>,
    /// File path or URL of the signed transport configuration
    #[clap(long, env = "KEYCONNECT_TRANSPORT_CONFIG", global = true)]
    transport_config: Option<String>,
    /// Milliseconds between polls while no usable device is connected
    #[clap(long, env = "KEYCONNECT_POLL_INTERVAL_MS", global = true)]
    poll_interval_ms: Option<u64>,
    /// Milliseconds to wait after a rejected PIN
    #[clap(long, env = "KEYCONNECT_PIN_RETRY_DELAY_MS", global = true)]
    pin_retry_delay_ms: Option<u64>,
    /// Give up after this many consecutive retries
    #[clap(long, env = "KEYCONNECT_MAX_RETRIES", global = true)]
    max_retries: Option<u32>,
    /// Insight endpoint for bitcoin-like coins
    #[clap(long, env = "KEYCONNECT_INSIGHT_URL", global = true)]
    insight_url: Option<String>,
    /// rippled JSON-RPC endpoint
    #[clap(long, env = "KEYCONNECT_RIPPLED_URL", global = true)]
    rippled_url: Option<String>,
    /// Grant every origin its permissions without asking
    #[clap(long, env = "KEYCONNECT_TRUSTED", global = true)]
    trusted: bool,
}

impl Settings {
    fn load(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(url) = &self.bridge_url {
            config.bridge_url = url.clone();
        }
        if self.transport_config.is_some() {
            config.transport_config = self.transport_config.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(ms) = self.pin_retry_delay_ms {
            config.pin_retry_delay_ms = ms;
        }
        if self.max_retries.is_some() {
            config.max_retries = self.max_retries;
        }
        if self.insight_url.is_some() {
            config.insight_url = self.insight_url.clone();
        }
        if self.rippled_url.is_some() {
            config.rippled_url = self.rippled_url.clone();
        }
        config.trusted |= self.trusted;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args: Cli = Cli::parse();

    // stdout carries messages, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = args.settings.load()?;
    let call = match args.command {
        Commands::Serve => None,
        Commands::Call(args) => Some(read_request(&args.file)?),
    };

    tokio::task::LocalSet::new()
        .run_until(run(config, call))
        .await
}

async fn run(config: Config, call: Option<Request>) -> anyhow::Result<()> {
    let transport =
        BridgeTransport::connect(&config.bridge_url, config.transport_config.as_deref())
            .await
            .with_context(|| format!("No usable device bridge at {}", config.bridge_url))?;
    info!("Bridge ready at {}", config.bridge_url);

    let (broker, events) = InteractionBroker::new();
    let executor = Executor::new(
        Box::new(transport),
        Box::new(HttpBackends::new(&config)),
        broker,
        &config,
    );
    server::serve(executor, events, call).await
}

fn read_request(path: &Path) -> anyhow::Result<Request> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid request in {}", path.display()))
}
