use std::fmt;

use prometheus::{IntCounter, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::{StatusCode, StatusCodeMetric};

/// Gauge carrying the numeric [`StatusCode`] of the latest check.
pub const SERVICE_STATUS_CODE_METRIC: &str = "service_status_code";
/// Counter of panics caught at a cycle or request boundary.
pub const APPLICATION_PANICS_METRIC: &str = "application_panics_total";
/// Label with the HTTP status code the Intel service answered with.
pub const HTTP_STATUS_CODE_LABEL: &str = "http_status_code";
/// Label with the `Error-Code` header of the Intel service.
pub const INTEL_ERROR_CODE_LABEL: &str = "intel_error_code";

/// An observation is missing a label its status code requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
	/// The status requires the HTTP status code.
	#[error("http status code is required for status code {}", .0.code())]
	MissingHttpStatusCode(StatusCode),
	/// The status requires the Intel error code.
	#[error("intel error code is required for status code {}", .0.code())]
	MissingIntelErrorCode(StatusCode),
}

/// Sink for service status observations.
pub trait StatusPublisher: Send + Sync {
	/// Replace the published status with `metric`. On error nothing is
	/// published and the previous status stays visible.
	fn publish(&self, metric: StatusCodeMetric) -> Result<(), ValidationError>;

	/// Publish [`StatusCode::Pending`] with empty labels.
	fn set_pending(&self) -> Result<(), ValidationError> {
		self.publish(StatusCodeMetric::new(StatusCode::Pending))
	}

	/// Count a panic that was caught and swallowed.
	fn record_panic(&self);
}

/// Publishes the service status to its own prometheus [`Registry`].
#[derive(Clone)]
pub struct StatusRegistry {
	registry: Registry,
	status_code: IntGaugeVec,
	panics: IntCounter,
}

impl StatusRegistry {
	/// Create the metrics and register them with a fresh registry.
	pub fn new() -> Result<Self, prometheus::Error> {
		let status_code = IntGaugeVec::new(
			Opts::new(
				SERVICE_STATUS_CODE_METRIC,
				"Status code of the platform registration service",
			),
			&[HTTP_STATUS_CODE_LABEL, INTEL_ERROR_CODE_LABEL],
		)?;
		let panics = IntCounter::new(
			APPLICATION_PANICS_METRIC,
			"Total number of panics caught by the application",
		)?;

		let registry = Registry::new();
		registry.register(Box::new(status_code.clone()))?;
		registry.register(Box::new(panics.clone()))?;

		Ok(Self { registry, status_code, panics })
	}

	/// The registry holding the metrics, for exposition.
	#[must_use]
	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Render every metric in the prometheus text exposition format.
	pub fn render(&self) -> Result<String, prometheus::Error> {
		TextEncoder::new().encode_to_string(&self.registry.gather())
	}

	/// Number of panics recorded so far.
	#[must_use]
	pub fn panic_count(&self) -> u64 {
		self.panics.get()
	}
}

impl fmt::Debug for StatusRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StatusRegistry")
			.field("panics", &self.panics.get())
			.finish_non_exhaustive()
	}
}

fn validate(metric: &StatusCodeMetric) -> Result<(), ValidationError> {
	let details = metric.status.details();
	if details.requires_http_status_code && metric.http_status_code.is_none() {
		return Err(ValidationError::MissingHttpStatusCode(metric.status));
	}
	if details.requires_intel_error_code && metric.intel_error.is_none() {
		return Err(ValidationError::MissingIntelErrorCode(metric.status));
	}
	Ok(())
}

impl StatusPublisher for StatusRegistry {
	fn publish(
		&self,
		mut metric: StatusCodeMetric,
	) -> Result<(), ValidationError> {
		validate(&metric)?;
		if !metric.status.details().requires_intel_error_code {
			metric.intel_error = None;
		}

		let http_status_code = metric.http_status_code_label();
		let intel_error = metric.intel_error_label();

		self.status_code.reset();
		self.status_code
			.with_label_values(&[http_status_code.as_str(), intel_error])
			.set(i64::from(metric.status.code()));

		tracing::info!(
			code = metric.status.code(),
			http_status_code = %http_status_code,
			intel_error_code = %intel_error,
			"Status code metric updated - Code: {}, HTTP StatusCode: {}, Intel Error code: {}",
			metric.status.code(),
			http_status_code,
			intel_error,
		);

		Ok(())
	}

	fn record_panic(&self) {
		self.panics.inc();
	}
}
