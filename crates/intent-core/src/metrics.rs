//! Aggregate counters for the manager and the processor.
//!
//! Averages are maintained incrementally: `avg = (avg * (n - 1) + new) / n`.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot of manager activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManagerMetrics {
	pub intents_created: u64,
	pub intents_processed: u64,
	pub intents_failed: u64,
	pub intents_broadcast: u64,
	pub intents_received: u64,
	pub intents_matched: u64,
	pub intents_cancelled: u64,
	pub intents_expired: u64,
	pub average_processing_time_ms: f64,
	pub active_subscriptions: usize,
	pub stored_intents: usize,
}

/// Snapshot of processor activity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessorMetrics {
	pub processed_count: u64,
	pub failed_count: u64,
	pub active_count: u64,
	pub average_latency_ms: f64,
}

fn running_average(current: f64, count: u64, sample: Duration) -> f64 {
	if count == 0 {
		return 0.0;
	}
	let sample_ms = sample.as_secs_f64() * 1000.0;
	(current * (count - 1) as f64 + sample_ms) / count as f64
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum Counter {
	Created,
	Failed,
	Broadcast,
	Received,
	Matched,
	Cancelled,
	Expired,
}

/// Shared recorder behind [`ManagerMetrics`].
#[derive(Clone, Default)]
pub(crate) struct MetricsRecorder {
	inner: Arc<RwLock<ManagerMetrics>>,
}

impl MetricsRecorder {
	pub async fn increment(&self, counter: Counter) {
		self.add(counter, 1).await;
	}

	pub async fn add(&self, counter: Counter, amount: u64) {
		let mut metrics = self.inner.write().await;
		let slot = match counter {
			Counter::Created => &mut metrics.intents_created,
			Counter::Failed => &mut metrics.intents_failed,
			Counter::Broadcast => &mut metrics.intents_broadcast,
			Counter::Received => &mut metrics.intents_received,
			Counter::Matched => &mut metrics.intents_matched,
			Counter::Cancelled => &mut metrics.intents_cancelled,
			Counter::Expired => &mut metrics.intents_expired,
		};
		*slot += amount;
	}

	pub async fn record_processed(&self, elapsed: Duration) {
		let mut metrics = self.inner.write().await;
		metrics.intents_processed += 1;
		metrics.average_processing_time_ms = running_average(
			metrics.average_processing_time_ms,
			metrics.intents_processed,
			elapsed,
		);
	}

	pub async fn snapshot(&self, active_subscriptions: usize, stored_intents: usize) -> ManagerMetrics {
		let mut metrics = self.inner.read().await.clone();
		metrics.active_subscriptions = active_subscriptions;
		metrics.stored_intents = stored_intents;
		metrics
	}
}

/// Shared recorder behind [`ProcessorMetrics`].
#[derive(Clone, Default)]
pub(crate) struct ProcessorRecorder {
	inner: Arc<RwLock<ProcessorMetrics>>,
}

impl ProcessorRecorder {
	pub async fn begin(&self) {
		self.inner.write().await.active_count += 1;
	}

	pub async fn finish(&self, elapsed: Duration, success: bool) {
		let mut metrics = self.inner.write().await;
		metrics.active_count = metrics.active_count.saturating_sub(1);
		if success {
			metrics.processed_count += 1;
		} else {
			metrics.failed_count += 1;
		}
		let total = metrics.processed_count + metrics.failed_count;
		metrics.average_latency_ms = running_average(metrics.average_latency_ms, total, elapsed);
	}

	pub async fn snapshot(&self) -> ProcessorMetrics {
		self.inner.read().await.clone()
	}
}
