//! Timer-driven task keeping the SignatureRx token warm off the request path.
//!
//! Each tick calls [`TokenManager::refresh_new_token`] unconditionally. Stopping signals the task
//! and joins it: no new tick starts after the signal, but a tick already running completes.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
// self
use crate::{_prelude::*, flows::TokenManager};

/// Default tick period.
pub const DEFAULT_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);

struct Running {
	stop: watch::Sender<bool>,
	handle: JoinHandle<()>,
}

/// Cancelable periodic refresher bound to one [`TokenManager`].
pub struct BackgroundRefresher {
	manager: TokenManager,
	interval: StdDuration,
	running: Mutex<Option<Running>>,
}
impl BackgroundRefresher {
	/// Creates a stopped refresher ticking every `interval`.
	pub fn new(manager: TokenManager, interval: StdDuration) -> Self {
		Self { manager, interval, running: Mutex::new(None) }
	}

	/// Returns `true` while the task is running.
	pub fn is_running(&self) -> bool {
		self.running.lock().as_ref().is_some_and(|running| !running.handle.is_finished())
	}

	/// Spawns the refresh task on the current Tokio runtime.
	///
	/// The first refresh happens one interval after start. Returns `false` (and logs) when the
	/// task is already running.
	pub fn start(&self) -> bool {
		let mut slot = self.running.lock();

		if slot.as_ref().is_some_and(|running| !running.handle.is_finished()) {
			tracing::warn!("Token refresher is already running.");

			return false;
		}

		let (stop, stop_rx) = watch::channel(false);
		let handle = tokio::spawn(run(self.manager.clone(), self.interval, stop_rx));

		*slot = Some(Running { stop, handle });

		tracing::info!(interval_secs = self.interval.as_secs(), "Token refresher started.");

		true
	}

	/// Signals the task to stop and waits for it to finish.
	///
	/// Returns `false` when nothing was running.
	pub async fn stop(&self) -> bool {
		let running = self.running.lock().take();
		let Some(Running { stop, handle }) = running else {
			return false;
		};
		let _ = stop.send(true);

		if let Err(e) = handle.await {
			tracing::error!(error = %e, "Token refresher task ended abnormally.");
		}

		tracing::info!("Token refresher stopped.");

		true
	}
}
impl Debug for BackgroundRefresher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BackgroundRefresher")
			.field("interval", &self.interval)
			.field("running", &self.is_running())
			.finish()
	}
}

async fn run(manager: TokenManager, interval: StdDuration, mut stop: watch::Receiver<bool>) {
	let mut ticker = time::interval(interval);

	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	// The first tick completes immediately.
	ticker.tick().await;

	loop {
		tokio::select! {
			_ = ticker.tick() => {},
			_ = stop.changed() => break,
		}

		if *stop.borrow() {
			break;
		}

		match manager.refresh_new_token().await {
			Ok(_) => tracing::debug!("Scheduled token refresh succeeded."),
			Err(e) => tracing::error!(error = %e, "Scheduled token refresh failed."),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	fn refresher(endpoint: Arc<ScriptedTokenEndpoint>, interval: StdDuration) -> BackgroundRefresher {
		let (manager, _store) = manager_with(endpoint, false);

		BackgroundRefresher::new(manager, interval)
	}

	#[tokio::test(start_paused = true)]
	async fn ticks_refresh_once_per_interval() {
		let endpoint = Arc::new(
			ScriptedTokenEndpoint::new()
				.respond("tok1", 3_600)
				.respond("tok2", 3_600)
				.respond("tok3", 3_600),
		);
		let refresher = refresher(endpoint.clone(), StdDuration::from_secs(60));

		assert!(refresher.start());

		// No refresh at start.
		time::sleep(StdDuration::from_secs(1)).await;
		assert_eq!(endpoint.calls(), 0);

		time::sleep(StdDuration::from_secs(60)).await;
		assert_eq!(endpoint.calls(), 1);

		time::sleep(StdDuration::from_secs(60)).await;
		assert_eq!(endpoint.calls(), 2);

		assert!(refresher.stop().await);
	}

	#[tokio::test(start_paused = true)]
	async fn second_start_is_a_logged_noop() {
		let refresher = refresher(Arc::new(ScriptedTokenEndpoint::new()), DEFAULT_INTERVAL);

		assert!(refresher.start());
		assert!(!refresher.start());
		assert!(refresher.is_running());
		assert!(refresher.stop().await);
		assert!(!refresher.is_running());
		assert!(!refresher.stop().await);
	}

	#[tokio::test(start_paused = true)]
	async fn no_ticks_after_stop() {
		let endpoint = Arc::new(ScriptedTokenEndpoint::new().respond("tok1", 3_600));
		let refresher = refresher(endpoint.clone(), StdDuration::from_secs(60));

		refresher.start();
		time::sleep(StdDuration::from_secs(61)).await;
		refresher.stop().await;

		let calls = endpoint.calls();

		time::sleep(StdDuration::from_secs(600)).await;

		assert_eq!(calls, 1);
		assert_eq!(endpoint.calls(), calls);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_ticks_keep_the_task_alive() {
		let endpoint = Arc::new(ScriptedTokenEndpoint::new().fail(503, "maintenance"));
		let refresher = refresher(endpoint.clone(), StdDuration::from_secs(60));

		refresher.start();
		time::sleep(StdDuration::from_secs(121)).await;

		assert_eq!(endpoint.calls(), 2);
		assert!(refresher.is_running());

		refresher.stop().await;
	}

	#[tokio::test(start_paused = true)]
	async fn restart_after_stop_is_allowed() {
		let refresher = refresher(Arc::new(ScriptedTokenEndpoint::new()), DEFAULT_INTERVAL);

		assert!(refresher.start());
		refresher.stop().await;
		assert!(refresher.start());
		refresher.stop().await;
	}
}
