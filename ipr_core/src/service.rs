//! Periodic registration check loop.

use std::{sync::Arc, time::Duration};

use ipr_metrics::StatusPublisher;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{RegistrationChecker, ServiceError};

/// Runs a [`RegistrationChecker`] on a fixed interval and publishes every
/// outcome.
pub struct RegistrationService {
	interval: Duration,
	checker: Arc<dyn RegistrationChecker>,
	publisher: Arc<dyn StatusPublisher>,
}

impl RegistrationService {
	/// Create a new service checking every `interval`.
	pub fn new(
		interval: Duration,
		checker: Arc<dyn RegistrationChecker>,
		publisher: Arc<dyn StatusPublisher>,
	) -> Result<Self, ServiceError> {
		if interval.is_zero() {
			return Err(ServiceError::ZeroInterval);
		}
		Ok(Self { interval, checker, publisher })
	}

	/// Publish `Pending`, check right away, then check on every interval
	/// tick until `cancel` fires. A check in flight when `cancel` fires runs
	/// to completion first.
	pub async fn run(
		&self,
		cancel: CancellationToken,
	) -> Result<(), ServiceError> {
		self.publisher.set_pending()?;
		info!(
			interval_secs = self.interval.as_secs(),
			"registration service started"
		);

		self.check_registration_status().await;

		let mut ticker =
			time::interval_at(Instant::now() + self.interval, self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		loop {
			tokio::select! {
				biased;
				() = cancel.cancelled() => {
					info!("registration service stopped");
					return Ok(());
				}
				_ = ticker.tick() => self.check_registration_status().await,
			}
		}
	}

	/// Run one check on the blocking pool and publish its status. Never
	/// fails: errors are logged and a panic in the checker is counted.
	pub async fn check_registration_status(&self) {
		let checker = Arc::clone(&self.checker);
		let result = match tokio::task::spawn_blocking(move || checker.check())
			.await
		{
			Ok(result) => result,
			Err(e) if e.is_panic() => {
				self.publisher.record_panic();
				error!("registration check panicked: {e}");
				return;
			}
			Err(e) => {
				error!("registration check did not complete: {e}");
				return;
			}
		};

		let metric = match result {
			Ok(metric) => metric,
			Err(failure) => {
				error!(
					code = failure.metric.status.code(),
					"registration check failed: {}",
					failure.error
				);
				failure.metric
			}
		};

		debug!(code = metric.status.code(), "{}", metric.status);

		if let Err(e) = self.publisher.publish(metric) {
			error!("failed to publish status code metric: {e}");
		}
	}
}
