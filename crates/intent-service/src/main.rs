use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intent_config::{ConfigLoader, IntentConfig};
use intent_monitoring::{init_tracing, TracingConfig};
use intent_service::service::{self, IntentService};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "intent-node")]
#[command(about = "P2P intent broadcast node", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Configuration file (toml, json or yaml). Defaults apply when omitted.
	#[arg(short, long, value_name = "FILE")]
	config: Option<PathBuf>,

	/// Overrides the configured log level
	#[arg(long, env = "INTENT_LOG_LEVEL")]
	log_level: Option<String>,

	/// Emit logs as JSON
	#[arg(long)]
	json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the intent node
	Start,
	/// Validate the configuration and print the resolved settings
	Validate,
	/// Run two in-process nodes through create, broadcast, receive and match
	Demo {
		/// Seconds to wait for matching to settle
		#[arg(long, default_value_t = 5)]
		timeout: u64,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = load_config(&cli).await?;

	let tracing_config = TracingConfig::new(
		cli.log_level
			.clone()
			.unwrap_or_else(|| config.logging.level.clone()),
	)
	.with_json_format(cli.json_logs || config.logging.json);
	init_tracing(tracing_config).map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

	match cli.command {
		Some(Commands::Start) | None => start_node(config).await,
		Some(Commands::Validate) => validate_config(&cli, &config),
		Some(Commands::Demo { timeout }) => run_demo(config, timeout).await,
	}
}

async fn load_config(cli: &Cli) -> Result<IntentConfig> {
	let mut loader = ConfigLoader::new();
	if let Some(path) = &cli.config {
		loader = loader.with_file(path);
	}
	loader.load().await.context("Failed to load configuration")
}

async fn start_node(config: IntentConfig) -> Result<()> {
	info!("Starting intent node '{}'", config.node.node_id);
	info!("Listening topics: {:?}", config.node.listen_topics);
	info!(
		"Matching {} (threshold {})",
		if config.matching.enabled { "enabled" } else { "disabled" },
		config.matching.confidence_threshold
	);

	let service = IntentService::new(config)
		.await
		.context("Failed to initialize intent node")?;
	service.run().await?;

	info!("Intent node stopped");
	Ok(())
}

fn validate_config(cli: &Cli, config: &IntentConfig) -> Result<()> {
	match &cli.config {
		Some(path) => info!("Configuration file {:?} is valid", path),
		None => info!("Default configuration is valid"),
	}

	let mut printable = config.clone();
	if printable.node.signing_key.is_some() {
		printable.node.signing_key = Some("<redacted>".to_string());
	}
	let rendered = toml::to_string_pretty(&printable).context("Failed to render configuration")?;
	println!("{}", rendered);
	Ok(())
}

async fn run_demo(config: IntentConfig, timeout: u64) -> Result<()> {
	info!("Running two-node demo");
	let report = service::run_demo(config, Duration::from_secs(timeout))
		.await
		.context("Demo failed")?;
	println!(
		"{}",
		serde_json::to_string_pretty(&report).context("Failed to render demo report")?
	);
	Ok(())
}
