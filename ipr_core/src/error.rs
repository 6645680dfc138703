//! Errors of the registration check and the service loop.

use ipr_metrics::{StatusCodeMetric, ValidationError};
use ipr_sgx::PlatformError;

/// Why a registration check could not reach a healthy status.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
	/// A call into the SGX platform failed.
	#[error(transparent)]
	Platform(#[from] PlatformError),
	/// Intel accepted the registration but the UEFI flag could not be set.
	#[error("failed to persist the registration completion: {0}")]
	Persist(PlatformError),
	/// The Intel registration service could not be reached.
	#[error("failed to connect to the intel registration service: {0}")]
	IntelConnect(Box<ureq::Transport>),
	/// The registration request failed for another transport reason.
	#[error("registration request to intel failed: {0}")]
	IntelRequest(Box<ureq::Transport>),
	/// The PCK certificate request failed before a response was received.
	#[error("pck certificate request to intel failed: {0}")]
	PckRequest(Box<ureq::Transport>),
}

/// A check that ended in an error. `metric` is still published; `error` is
/// only logged.
#[derive(Debug, thiserror::Error)]
#[error(
	"registration check failed with status code {}: {error}",
	.metric.status.code()
)]
pub struct CheckFailure {
	/// Status to publish for this check.
	pub metric: StatusCodeMetric,
	/// What went wrong.
	#[source]
	pub error: RegistrationError,
}

impl CheckFailure {
	/// Pair `metric` with the error that produced it.
	pub fn new(
		metric: StatusCodeMetric,
		error: impl Into<RegistrationError>,
	) -> Self {
		Self { metric, error: error.into() }
	}
}

/// Errors that stop the service loop.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
	/// The initial `Pending` status could not be published.
	#[error("failed to publish the pending status: {0}")]
	Pending(#[from] ValidationError),
	/// The check interval is zero.
	#[error("registration check interval must be non zero")]
	ZeroInterval,
}
