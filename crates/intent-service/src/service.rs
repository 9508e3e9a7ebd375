//! Node assembly and process lifecycle.
//!
//! [`IntentService`] wires an [`IntentManager`] to the default
//! collaborators, runs health checks next to it and stops both on a
//! shutdown signal.

use crate::implementations::{
	BasicIntentValidator, LoggingHandler, LoopbackTransport, Sha3Signer, StoreHealthCheck,
};
use anyhow::{Context, Result};
use intent_config::IntentConfig;
use intent_core::{IntentManager, IntentManagerBuilder, MatchingStatus};
use intent_monitoring::{HealthChecker, HealthReport};
use intent_types::{
	BroadcastIntentRequest, CreateIntentRequest, Intent, QueryIntentsRequest, Transport,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// A running intent node.
pub struct IntentService {
	manager: IntentManager,
	health_checker: HealthChecker,
	shutdown: CancellationToken,
	health_task: Mutex<Option<JoinHandle<()>>>,
}

impl IntentService {
	/// Builds a node on a private loopback transport.
	pub async fn new(config: IntentConfig) -> Result<Self> {
		Self::with_transport(config, Arc::new(LoopbackTransport::new())).await
	}

	/// Builds a node publishing and listening through `transport`.
	#[instrument(skip_all, fields(node = %config.node.node_id))]
	pub async fn with_transport(config: IntentConfig, transport: Arc<dyn Transport>) -> Result<Self> {
		info!("Initializing intent node");

		let mut builder = IntentManagerBuilder::new(config.clone())
			.with_validator(Arc::new(BasicIntentValidator::new(&config.intents)))
			.with_transport(transport)
			.with_handler(Arc::new(LoggingHandler::new(
				config.intents.allowed_types.iter().cloned(),
			)));

		if let Some(key) = &config.node.signing_key {
			let key = hex::decode(key.trim_start_matches("0x")).context("Invalid signing key")?;
			builder = builder.with_signer(Arc::new(Sha3Signer::new(key)));
		}

		let manager = builder
			.build()
			.await
			.context("Failed to build intent manager")?;

		let health_checker = HealthChecker::new(HEALTH_CHECK_INTERVAL);
		health_checker
			.register_check(Arc::new(StoreHealthCheck::new(manager.clone())))
			.await;

		Ok(Self {
			manager,
			health_checker,
			shutdown: CancellationToken::new(),
			health_task: Mutex::new(None),
		})
	}

	pub fn manager(&self) -> &IntentManager {
		&self.manager
	}

	pub async fn health(&self) -> HealthReport {
		self.health_checker.run_all_checks().await
	}

	/// Starts the manager and periodic health checks.
	pub async fn start(&self) -> Result<()> {
		self.manager
			.start()
			.await
			.context("Failed to start intent manager")?;

		let handle = self
			.health_checker
			.start_periodic_checks(self.shutdown.child_token());
		*self.health_task.lock().await = Some(handle);

		info!("Intent node '{}' started", self.manager.config().node.node_id);
		Ok(())
	}

	/// Stops health checks, then the manager.
	pub async fn stop(&self) {
		self.shutdown.cancel();
		if let Some(handle) = self.health_task.lock().await.take() {
			if let Err(e) = handle.await {
				warn!("Health check task ended abnormally: {}", e);
			}
		}
		self.manager.shutdown().await;
	}

	/// Runs until SIGINT or SIGTERM.
	pub async fn run(&self) -> Result<()> {
		self.start().await?;
		wait_for_shutdown_signal().await;
		info!("Shutdown signal received, stopping node...");
		self.stop().await;
		Ok(())
	}
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn wait_for_shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			error!("Failed to install Ctrl+C handler: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				error!("Failed to install SIGTERM handler: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

/// Outcome of [`run_demo`], as seen by the receiving node.
#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
	pub broadcast: Vec<String>,
	pub received: Vec<Intent>,
	pub matching: HashMap<String, MatchingStatus>,
}

/// Two nodes on a shared loopback transport: `alpha` creates and broadcasts
/// a trade and a swap intent, `beta` receives, processes and matches them.
pub async fn run_demo(config: IntentConfig, timeout: Duration) -> Result<DemoReport> {
	let transport: Arc<dyn Transport> = Arc::new(LoopbackTransport::new());

	let mut alpha_config = config.clone();
	alpha_config.node.node_id = format!("{}-alpha", config.node.node_id);
	alpha_config.node.listen_topics.clear();

	let mut beta_config = config.clone();
	beta_config.node.node_id = format!("{}-beta", config.node.node_id);
	beta_config.node.listen_topics = vec![
		intent_core::resolve_topic("trade"),
		intent_core::resolve_topic("swap"),
	];

	let alpha = IntentService::with_transport(alpha_config, transport.clone()).await?;
	let beta = IntentService::with_transport(beta_config, transport).await?;
	alpha.start().await?;
	beta.start().await?;

	let result = drive_demo(&alpha, &beta, timeout).await;

	alpha.stop().await;
	beta.stop().await;
	result
}

async fn drive_demo(alpha: &IntentService, beta: &IntentService, timeout: Duration) -> Result<DemoReport> {
	let mut broadcast = Vec::new();
	for (intent_type, payload) in [("trade", "buy 10 ETH for USDC"), ("swap", "swap USDC for 10 ETH")] {
		let mut request = CreateIntentRequest::new(intent_type, payload.as_bytes(), "demo-wallet");
		request.metadata.insert("pair".into(), "ETH/USDC".into());

		let created = alpha.manager().create_intent(request).await?;
		let intent = created.intent.context("Created intent missing from response")?;
		let response = alpha
			.manager()
			.broadcast_intent(BroadcastIntentRequest {
				intent_id: intent.id.clone(),
				topic: None,
			})
			.await?;
		info!("Broadcast {} on {}", response.intent_id, response.topic);
		broadcast.push(intent.id);
	}

	let settled = tokio::time::timeout(timeout, async {
		loop {
			let statuses: Vec<Option<MatchingStatus>> = broadcast
				.iter()
				.map(|id| beta.manager().matching_status(id))
				.collect();
			let done = statuses
				.iter()
				.all(|s| matches!(s, Some(MatchingStatus::Complete { .. } | MatchingStatus::Failed { .. })));
			if done {
				break;
			}
			tokio::time::sleep(Duration::from_millis(25)).await;
		}
	})
	.await;
	if settled.is_err() {
		warn!("Demo timed out before matching settled");
	}

	let received = beta
		.manager()
		.query_intents(QueryIntentsRequest::default())
		.await?
		.intents;
	let matching = broadcast
		.iter()
		.filter_map(|id| {
			beta.manager()
				.matching_status(id)
				.map(|status| (id.clone(), status))
		})
		.collect();

	Ok(DemoReport {
		broadcast,
		received,
		matching,
	})
}
