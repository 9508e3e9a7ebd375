//! Per-intent lifecycle tracking and expiry.
//!
//! The tracker keeps its own map of [`IntentTracker`]s, independent of the
//! manager's store. Each tracker holds a snapshot of the intent and a status
//! mirror that changes only through [`LifecycleTracker::update_status`].
//!
//! Expiry deadlines live in one priority queue drained by a single sweeper
//! task. The sweeper runs on the tracker's own shutdown token, so deadlines
//! fire regardless of what happens to the request that started tracking.

use crate::event_bus::EventBus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use intent_config::LifecycleConfig;
use intent_types::{Intent, IntentError, IntentEvent, IntentStatus, LifecycleEvent, Result};
use priority_queue::PriorityQueue;
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Observer of lifecycle transitions.
///
/// Callbacks run on spawned tasks. Their errors and panics are logged and
/// never affect the transition that triggered them.
#[async_trait]
pub trait LifecycleCallback: Send + Sync {
	async fn on_status_change(&self, intent_id: &str, old: IntentStatus, new: IntentStatus) -> Result<()>;

	async fn on_expired(&self, intent_id: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct IntentTracker {
	/// Snapshot of the intent when tracking started or was last refreshed.
	pub intent: Intent,
	pub created_at: DateTime<Utc>,
	pub last_updated: DateTime<Utc>,
	pub status: IntentStatus,
	callbacks: Vec<Arc<dyn LifecycleCallback>>,
}

impl IntentTracker {
	pub fn callback_count(&self) -> usize {
		self.callbacks.len()
	}
}

#[derive(Debug, Clone)]
pub struct LifecycleSettings {
	pub cleanup_interval: Duration,
	pub max_age: Duration,
}

impl Default for LifecycleSettings {
	fn default() -> Self {
		Self::from(&LifecycleConfig::default())
	}
}

impl From<&LifecycleConfig> for LifecycleSettings {
	fn from(config: &LifecycleConfig) -> Self {
		Self {
			cleanup_interval: config.cleanup_interval(),
			max_age: config.max_age(),
		}
	}
}

#[derive(Clone)]
enum Notification {
	StatusChange {
		intent_id: String,
		old: IntentStatus,
		new: IntentStatus,
	},
	Expired {
		intent_id: String,
	},
}

#[derive(Clone)]
pub struct LifecycleTracker {
	trackers: Arc<DashMap<String, IntentTracker>>,
	/// Intent id keyed by expiry second; the earliest deadline is on top.
	deadlines: Arc<Mutex<PriorityQueue<String, Reverse<i64>>>>,
	wake: Arc<Notify>,
	callbacks: Arc<RwLock<Vec<Arc<dyn LifecycleCallback>>>>,
	event_bus: EventBus,
	settings: LifecycleSettings,
	shutdown: CancellationToken,
	sweeper: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl LifecycleTracker {
	pub fn new(settings: LifecycleSettings, event_bus: EventBus) -> Self {
		Self {
			trackers: Arc::new(DashMap::new()),
			deadlines: Arc::new(Mutex::new(PriorityQueue::new())),
			wake: Arc::new(Notify::new()),
			callbacks: Arc::new(RwLock::new(Vec::new())),
			event_bus,
			settings,
			shutdown: CancellationToken::new(),
			sweeper: Arc::new(Mutex::new(None)),
		}
	}

	/// Spawns the sweeper task. Calling it again is a no-op.
	pub async fn start(&self) {
		let mut sweeper = self.sweeper.lock().await;
		if sweeper.is_some() {
			return;
		}
		let tracker = self.clone();
		*sweeper = Some(tokio::spawn(async move { tracker.run_sweeper().await }));
		info!(
			"Lifecycle sweeper started (cleanup every {:?}, max age {:?})",
			self.settings.cleanup_interval, self.settings.max_age
		);
	}

	pub async fn shutdown(&self) {
		self.shutdown.cancel();
		if let Some(handle) = self.sweeper.lock().await.take() {
			if let Err(e) = handle.await {
				warn!("Lifecycle sweeper ended abnormally: {}", e);
			}
		}
	}

	/// Starts tracking `intent`, scheduling its expiry.
	///
	/// If the deadline has already passed the intent is expired immediately.
	/// Tracking an already tracked intent restarts it.
	pub async fn start_tracking(&self, intent: &Intent) -> Result<()> {
		let now = Utc::now();
		self.trackers.insert(
			intent.id.clone(),
			IntentTracker {
				intent: intent.clone(),
				created_at: now,
				last_updated: now,
				status: intent.status,
				callbacks: Vec::new(),
			},
		);
		debug!("Started tracking intent {} ({})", intent.id, intent.status);

		self.schedule(intent, now.timestamp()).await;
		Ok(())
	}

	/// Replaces the tracked snapshot and reschedules expiry, keeping the
	/// status mirror, creation time and callbacks.
	pub async fn refresh_intent(&self, intent: &Intent) -> Result<()> {
		{
			let mut entry = self
				.trackers
				.get_mut(&intent.id)
				.ok_or_else(|| IntentError::not_found(&intent.id))?;
			let status = entry.status;
			entry.intent = intent.clone();
			entry.intent.status = status;
			entry.last_updated = Utc::now();
		}
		self.schedule(intent, Utc::now().timestamp()).await;
		Ok(())
	}

	async fn schedule(&self, intent: &Intent, now: i64) {
		let Some(deadline) = intent.expires_at() else {
			self.deadlines.lock().await.remove(&intent.id);
			return;
		};

		if intent.is_expired_at(now) {
			self.deadlines.lock().await.remove(&intent.id);
			self.expire_intent(&intent.id).await;
			return;
		}

		let mut deadlines = self.deadlines.lock().await;
		let earliest = deadlines.peek().map(|(_, Reverse(d))| *d);
		deadlines.push(intent.id.clone(), Reverse(deadline));
		drop(deadlines);

		if earliest.map_or(true, |d| deadline < d) {
			self.wake.notify_one();
		}
	}

	/// Moves a tracked intent to `new_status`. Returns the previous status.
	///
	/// Re-applying the current status is a no-op; transitions not allowed by
	/// the status machine are rejected.
	pub async fn update_status(&self, intent_id: &str, new_status: IntentStatus) -> Result<IntentStatus> {
		let (old, mut callbacks) = {
			let mut entry = self
				.trackers
				.get_mut(intent_id)
				.ok_or_else(|| IntentError::not_found(intent_id))?;
			let old = entry.status;
			if old == new_status {
				return Ok(old);
			}
			if !old.can_transition_to(new_status) {
				return Err(IntentError::processing(format!(
					"Invalid status transition from {} to {} for intent {}",
					old, new_status, intent_id
				)));
			}
			entry.status = new_status;
			entry.intent.status = new_status;
			entry.last_updated = Utc::now();
			(old, entry.callbacks.clone())
		};

		info!("Intent {} status changed: {} -> {}", intent_id, old, new_status);

		if new_status.is_terminal() {
			self.deadlines.lock().await.remove(intent_id);
		}

		callbacks.extend(self.callbacks.read().await.iter().cloned());
		dispatch(
			callbacks,
			Notification::StatusChange {
				intent_id: intent_id.to_string(),
				old,
				new: new_status,
			},
		);
		self.event_bus
			.publish(IntentEvent::Lifecycle(LifecycleEvent::StatusChanged {
				intent_id: intent_id.to_string(),
				old,
				new: new_status,
			}));

		Ok(old)
	}

	/// Stops tracking without firing callbacks. Returns whether it was tracked.
	pub async fn stop_tracking(&self, intent_id: &str) -> bool {
		self.deadlines.lock().await.remove(intent_id);
		let removed = self.trackers.remove(intent_id).is_some();
		if removed {
			debug!("Stopped tracking intent {}", intent_id);
		}
		removed
	}

	/// Registers a callback for one tracked intent.
	pub fn register_callback(&self, intent_id: &str, callback: Arc<dyn LifecycleCallback>) -> Result<()> {
		let mut entry = self
			.trackers
			.get_mut(intent_id)
			.ok_or_else(|| IntentError::not_found(intent_id))?;
		entry.callbacks.push(callback);
		Ok(())
	}

	/// Registers a callback for every tracked intent.
	pub async fn add_global_callback(&self, callback: Arc<dyn LifecycleCallback>) {
		self.callbacks.write().await.push(callback);
	}

	pub fn get_tracker(&self, intent_id: &str) -> Option<IntentTracker> {
		self.trackers.get(intent_id).map(|entry| entry.clone())
	}

	pub fn status(&self, intent_id: &str) -> Option<IntentStatus> {
		self.trackers.get(intent_id).map(|entry| entry.status)
	}

	pub fn is_tracked(&self, intent_id: &str) -> bool {
		self.trackers.contains_key(intent_id)
	}

	pub fn tracked_count(&self) -> usize {
		self.trackers.len()
	}

	/// Expires every queued intent whose deadline is before `now`.
	pub async fn expire_due(&self, now: i64) -> Vec<String> {
		let mut due = Vec::new();
		{
			let mut deadlines = self.deadlines.lock().await;
			while let Some((_, Reverse(deadline))) = deadlines.peek() {
				if now <= *deadline {
					break;
				}
				if let Some((id, _)) = deadlines.pop() {
					due.push(id);
				}
			}
		}

		let mut expired = Vec::with_capacity(due.len());
		for id in due {
			if self.expire_intent(&id).await {
				expired.push(id);
			}
		}
		expired
	}

	/// Transitions a tracked intent to `Expired` and fires on-expired
	/// callbacks. Returns false when it is unknown or already terminal.
	async fn expire_intent(&self, intent_id: &str) -> bool {
		let callbacks = match self.status(intent_id) {
			Some(status) if !status.is_terminal() => {
				if let Err(e) = self.update_status(intent_id, IntentStatus::Expired).await {
					warn!("Failed to expire intent {}: {}", intent_id, e);
					return false;
				}
				self.callbacks_for(intent_id).await
			}
			_ => return false,
		};

		info!("Intent {} expired", intent_id);
		self.notify_expired(intent_id, callbacks);
		true
	}

	/// Removes trackers whose intent has passed its TTL or that are older
	/// than the maximum age. Returns the removed ids.
	pub async fn sweep(&self, now: DateTime<Utc>) -> Vec<String> {
		let max_age = chrono::Duration::from_std(self.settings.max_age)
			.unwrap_or_else(|_| chrono::Duration::days(365 * 100));
		let stale: Vec<String> = self
			.trackers
			.iter()
			.filter(|entry| {
				entry.intent.is_expired_at(now.timestamp()) || now - entry.created_at > max_age
			})
			.map(|entry| entry.key().clone())
			.collect();

		for id in &stale {
			let callbacks = self.callbacks_for(id).await;
			self.deadlines.lock().await.remove(id);
			let Some((_, tracker)) = self.trackers.remove(id) else {
				continue;
			};
			// Intents already expired by their deadline were reported then.
			if tracker.status != IntentStatus::Expired {
				self.notify_expired(id, callbacks);
			}
		}

		if !stale.is_empty() {
			info!("Lifecycle sweep removed {} trackers", stale.len());
		}
		stale
	}

	async fn callbacks_for(&self, intent_id: &str) -> Vec<Arc<dyn LifecycleCallback>> {
		let mut callbacks = self
			.trackers
			.get(intent_id)
			.map(|entry| entry.callbacks.clone())
			.unwrap_or_default();
		callbacks.extend(self.callbacks.read().await.iter().cloned());
		callbacks
	}

	fn notify_expired(&self, intent_id: &str, callbacks: Vec<Arc<dyn LifecycleCallback>>) {
		dispatch(
			callbacks,
			Notification::Expired {
				intent_id: intent_id.to_string(),
			},
		);
		self.event_bus
			.publish(IntentEvent::Lifecycle(LifecycleEvent::Expired {
				intent_id: intent_id.to_string(),
			}));
	}

	async fn run_sweeper(&self) {
		let mut cleanup = tokio::time::interval(self.settings.cleanup_interval);
		// The first tick completes immediately.
		cleanup.tick().await;

		loop {
			let next_deadline = self.deadlines.lock().await.peek().map(|(_, Reverse(d))| *d);
			let wait = match next_deadline {
				// Due once the clock passes the deadline second.
				Some(deadline) => {
					let due_ms = deadline.saturating_add(1).saturating_mul(1000);
					let remaining = due_ms.saturating_sub(Utc::now().timestamp_millis()).max(0);
					Duration::from_millis(remaining as u64)
				}
				None => self.settings.cleanup_interval,
			};

			tokio::select! {
				_ = self.shutdown.cancelled() => break,
				_ = self.wake.notified() => continue,
				_ = tokio::time::sleep(wait) => {
					let expired = self.expire_due(Utc::now().timestamp()).await;
					if !expired.is_empty() {
						debug!("Expired {} intents at their deadline", expired.len());
					}
				}
				_ = cleanup.tick() => {
					self.sweep(Utc::now()).await;
				}
			}
		}

		info!("Lifecycle sweeper stopped");
	}
}

/// Runs callbacks on their own tasks, logging failures and panics.
fn dispatch(callbacks: Vec<Arc<dyn LifecycleCallback>>, notification: Notification) {
	for callback in callbacks {
		let notification = notification.clone();
		let task = tokio::spawn(async move {
			match notification {
				Notification::StatusChange { intent_id, old, new } => {
					callback.on_status_change(&intent_id, old, new).await
				}
				Notification::Expired { intent_id } => callback.on_expired(&intent_id).await,
			}
		});

		tokio::spawn(async move {
			match task.await {
				Ok(Ok(())) => {}
				Ok(Err(e)) => warn!("Lifecycle callback failed: {}", e),
				Err(e) if e.is_panic() => error!("Lifecycle callback panicked"),
				Err(_) => {}
			}
		});
	}
}
