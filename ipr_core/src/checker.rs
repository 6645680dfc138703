//! One registration check of the SGX platform.

use std::sync::Arc;

use ipr_metrics::{StatusCode, StatusCodeMetric};
use ipr_sgx::{PlatformProvider, PlatformSession};

use crate::{CheckFailure, IntelService, RegistrationError};

/// Determines the registration status of the platform. Implementations are
/// blocking and keep no state between checks.
pub trait RegistrationChecker: Send + Sync {
	/// Run one check.
	fn check(&self) -> Result<StatusCodeMetric, CheckFailure>;
}

/// Registers the platform when a registration request is pending, and
/// otherwise confirms Intel knows it by fetching its PCK certificate.
#[derive(Clone)]
pub struct DefaultRegistrationChecker {
	platform: Arc<dyn PlatformProvider>,
	intel: IntelService,
}

impl DefaultRegistrationChecker {
	/// Create a new checker.
	#[must_use]
	pub fn new(
		platform: Arc<dyn PlatformProvider>,
		intel: IntelService,
	) -> Self {
		Self { platform, intel }
	}

	fn register(
		&self,
		platform: &dyn PlatformProvider,
	) -> Result<StatusCodeMetric, CheckFailure> {
		let manifest = platform.platform_manifest().map_err(|e| {
			CheckFailure::new(
				StatusCodeMetric::new(StatusCode::SgxUefiUnavailable),
				e,
			)
		})?;

		let metric = self.intel.register_platform(&manifest)?;
		if metric.status != StatusCode::PlatformRebootNeeded {
			return Ok(metric);
		}

		platform.complete_machine_registration().map_err(|e| {
			CheckFailure::new(
				StatusCodeMetric::new(StatusCode::UefiPersistFailed),
				RegistrationError::Persist(e),
			)
		})?;

		Ok(metric)
	}

	fn retrieve_pck(
		&self,
		platform: &dyn PlatformProvider,
	) -> Result<StatusCodeMetric, CheckFailure> {
		let info = platform.pce_platform_info().map_err(|e| {
			CheckFailure::new(StatusCodeMetric::new(StatusCode::RetryNeeded), e)
		})?;

		self.intel.retrieve_pck(&info.encrypted_ppid, &info.pce_id)
	}
}

impl RegistrationChecker for DefaultRegistrationChecker {
	fn check(&self) -> Result<StatusCodeMetric, CheckFailure> {
		let session = PlatformSession::open(self.platform.as_ref());

		let registered = session.is_machine_registered().map_err(|e| {
			CheckFailure::new(
				StatusCodeMetric::new(StatusCode::SgxUefiUnavailable),
				e,
			)
		})?;

		if registered {
			tracing::debug!("platform registration complete, retrieving pck");
			self.retrieve_pck(&*session)
		} else {
			tracing::debug!("platform registration pending, registering");
			self.register(&*session)
		}
	}
}
