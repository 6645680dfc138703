//! Closed set of outcomes the registration service can report.

use std::fmt;

/// Outcome of a registration check. The numeric value is what the
/// `service_status_code` gauge reports, so it must never change for an
/// existing variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum StatusCode {
	/// No check has completed yet.
	Pending = 0,
	/// The SGX UEFI variables could not be read.
	SgxUefiUnavailable = 1,
	/// The registration status could not be determined; try again later.
	RetryNeeded = 2,
	/// Intel does not know the platform; SGX has to be reset.
	SgxResetNeeded = 3,
	/// Registered with Intel, but the UEFI flag could not be written.
	UefiPersistFailed = 4,
	/// Registered with Intel; a reboot finalizes the registration.
	PlatformRebootNeeded = 5,
	/// The PCK certificate was retrieved; the platform is provisioned.
	PlatformDirectlyRegistered = 9,
	/// Intel could not be reached.
	IntelConnectFailed = 10,
	/// Intel rejected the registration request (4xx).
	InvalidRegistrationRequest = 11,
	/// Intel failed to process the registration request.
	IntelRegServiceRequestFailed = 12,
	/// Anything else.
	UnknownError = 99,
}

/// Labels an observation of a [`StatusCode`] has to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_field_names)]
pub struct StatusCodeDetails {
	/// The observation must carry the HTTP status code Intel answered with.
	pub requires_http_status_code: bool,
	/// The observation must carry Intel's `Error-Code`. An Intel error code
	/// is only kept when it is required.
	pub requires_intel_error_code: bool,
}

impl StatusCode {
	/// Every status code, in ascending order.
	pub const ALL: [StatusCode; 11] = [
		Self::Pending,
		Self::SgxUefiUnavailable,
		Self::RetryNeeded,
		Self::SgxResetNeeded,
		Self::UefiPersistFailed,
		Self::PlatformRebootNeeded,
		Self::PlatformDirectlyRegistered,
		Self::IntelConnectFailed,
		Self::InvalidRegistrationRequest,
		Self::IntelRegServiceRequestFailed,
		Self::UnknownError,
	];

	/// Stable numeric value of the code.
	#[must_use]
	pub fn code(self) -> u8 {
		self as u8
	}

	/// Labeling requirements of the code.
	#[must_use]
	pub fn details(self) -> StatusCodeDetails {
		match self {
			Self::InvalidRegistrationRequest => StatusCodeDetails {
				requires_http_status_code: true,
				requires_intel_error_code: true,
			},
			Self::IntelRegServiceRequestFailed | Self::SgxResetNeeded => {
				StatusCodeDetails {
					requires_http_status_code: true,
					requires_intel_error_code: false,
				}
			}
			_ => StatusCodeDetails {
				requires_http_status_code: false,
				requires_intel_error_code: false,
			},
		}
	}

	/// Human readable description.
	#[must_use]
	pub fn description(self) -> &'static str {
		match self {
			Self::Pending => "Pending: pending execution",
			Self::SgxUefiUnavailable => {
				"SgxUefiUnavailable: SGX UEFI variables not available"
			}
			Self::RetryNeeded => {
				"RetryNeeded: impossible to determine the registration status; please reattempt"
			}
			Self::SgxResetNeeded => {
				"SgxResetNeeded: impossible to determine the registration status; please reset the SGX"
			}
			Self::UefiPersistFailed => {
				"UefiPersistFailed: failed to persist the UEFI variable content"
			}
			Self::PlatformRebootNeeded => {
				"PlatformRebootNeeded: platform registered successfully and a reboot is required"
			}
			Self::PlatformDirectlyRegistered => {
				"PlatformDirectlyRegistered: platform directly registered"
			}
			Self::IntelConnectFailed => {
				"IntelConnectFailed: failed to connect to Intel RS"
			}
			Self::InvalidRegistrationRequest => {
				"InvalidRegistrationRequest: invalid registration request"
			}
			Self::IntelRegServiceRequestFailed => {
				"IntelRegServiceRequestFailed: intel RS could not process the request"
			}
			Self::UnknownError => "UnknownError",
		}
	}
}

impl fmt::Display for StatusCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.description())
	}
}

/// A single observation of the service status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusCodeMetric {
	/// Outcome.
	pub status: StatusCode,
	/// HTTP status code Intel answered with, if any.
	pub http_status_code: Option<u16>,
	/// Intel `Error-Code` header, if any. Never `Some("")`.
	pub intel_error: Option<String>,
}

impl StatusCodeMetric {
	/// Observation without labels.
	#[must_use]
	pub fn new(status: StatusCode) -> Self {
		Self { status, http_status_code: None, intel_error: None }
	}

	/// Observation of [`StatusCode::UnknownError`].
	#[must_use]
	pub fn unknown_error() -> Self {
		Self::new(StatusCode::UnknownError)
	}

	/// Attach the HTTP status code.
	#[must_use]
	pub fn with_http_status_code(mut self, code: u16) -> Self {
		self.http_status_code = Some(code);
		self
	}

	/// Attach Intel's error code. Empty codes are treated as absent.
	#[must_use]
	pub fn with_intel_error(mut self, intel_error: Option<&str>) -> Self {
		self.intel_error =
			intel_error.filter(|e| !e.is_empty()).map(ToString::to_string);
		self
	}

	/// Value of the `http_status_code` label.
	#[must_use]
	pub fn http_status_code_label(&self) -> String {
		self.http_status_code.map(|c| c.to_string()).unwrap_or_default()
	}

	/// Value of the `intel_error_code` label.
	#[must_use]
	pub fn intel_error_label(&self) -> &str {
		self.intel_error.as_deref().unwrap_or_default()
	}
}
