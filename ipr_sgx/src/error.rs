//! Result codes reported by the vendor libraries.

use std::fmt;

use crate::MAX_PLATFORM_MANIFEST_SIZE;

/// Result of a `libmp_management` call (`MpResult` in the vendor headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpResult {
	/// The call succeeded.
	Success,
	/// No registration request is pending in the UEFI variables.
	NoPendingData,
	/// The platform is already registered.
	AlreadyRegistered,
	/// Memory allocation failure.
	MemoryError,
	/// UEFI variable access failed.
	UefiInternalError,
	/// The provided buffer is too small.
	UserInsufficientMemory,
	/// Invalid parameter.
	InvalidParameter,
	/// SGX is not supported on this platform.
	SgxNotSupported,
	/// Unexpected library error.
	UnexpectedError,
	/// The operation was already performed.
	RedundantOperation,
	/// Network error.
	NetworkError,
	/// The library was used before `mp_management_init`.
	NotInitialized,
	/// The process lacks the privileges to access the UEFI variables.
	InsufficientPrivileges,
	/// A code outside of the vendor table.
	Unknown(i32),
}

impl MpResult {
	/// Map a raw result code.
	#[must_use]
	pub fn from_raw(code: i32) -> Self {
		match code {
			0 => Self::Success,
			1 => Self::NoPendingData,
			2 => Self::AlreadyRegistered,
			3 => Self::MemoryError,
			4 => Self::UefiInternalError,
			5 => Self::UserInsufficientMemory,
			6 => Self::InvalidParameter,
			7 => Self::SgxNotSupported,
			8 => Self::UnexpectedError,
			9 => Self::RedundantOperation,
			10 => Self::NetworkError,
			11 => Self::NotInitialized,
			12 => Self::InsufficientPrivileges,
			other => Self::Unknown(other),
		}
	}

	/// Human readable description of the code.
	#[must_use]
	pub fn description(self) -> &'static str {
		match self {
			Self::Success => "Code Success",
			Self::NoPendingData => "No Pending Data",
			Self::AlreadyRegistered => "Already Registered",
			Self::MemoryError => "Memory Error",
			Self::UefiInternalError => "Uefi Internal Error",
			Self::UserInsufficientMemory => "User Insufficient Memory",
			Self::InvalidParameter => "Invalid Parameter",
			Self::SgxNotSupported => "Sgx Not Supported",
			Self::UnexpectedError => "Unexpected Error",
			Self::RedundantOperation => "Redundant Operation",
			Self::NetworkError => "Network Error",
			Self::NotInitialized => "Not Initialized",
			Self::InsufficientPrivileges => "Insufficient Privileges",
			Self::Unknown(_) => "Unknown Error",
		}
	}
}

impl fmt::Display for MpResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.description())
	}
}

/// Result of `get_platform_info` from `libsgx_platform_info`. Codes live in
/// the `0xF000` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PceResult {
	/// The call succeeded.
	Success,
	/// Unexpected error.
	UnexpectedError,
	/// A parameter is incorrect.
	InvalidParameter,
	/// Not enough EPC memory.
	OutOfEpc,
	/// The SGX API is unavailable.
	InterfaceUnavailable,
	/// The SGX report could not be verified.
	InvalidReport,
	/// Decryption or verification of a ciphertext failed.
	CryptoError,
	/// Not enough privilege.
	InvalidPrivilege,
	/// The PCE could not sign at the requested TCB.
	InvalidTcb,
	/// The platform info enclave could not be created.
	EnclaveCreationFailed,
	/// A code outside of the vendor table.
	Unknown(u32),
}

impl PceResult {
	/// Map a raw result code.
	#[must_use]
	pub fn from_raw(code: u32) -> Self {
		match code {
			0xF000 => Self::Success,
			0xF001 => Self::UnexpectedError,
			0xF002 => Self::InvalidParameter,
			0xF003 => Self::OutOfEpc,
			0xF004 => Self::InterfaceUnavailable,
			0xF005 => Self::InvalidReport,
			0xF006 => Self::CryptoError,
			0xF007 => Self::InvalidPrivilege,
			0xF008 => Self::InvalidTcb,
			0xF009 => Self::EnclaveCreationFailed,
			other => Self::Unknown(other),
		}
	}

	/// Human readable description of the code.
	#[must_use]
	pub fn description(self) -> &'static str {
		match self {
			Self::Success => "Success",
			Self::UnexpectedError => "Unexpected error",
			Self::InvalidParameter => "The parameter is incorrect",
			Self::OutOfEpc => {
				"Not enough memory is available to complete this operation"
			}
			Self::InterfaceUnavailable => "SGX API is unavailable",
			Self::InvalidReport => "SGX report cannot be verified",
			Self::CryptoError => "Cannot decrypt or verify ciphertext",
			Self::InvalidPrivilege => {
				"Not enough privilege to perform the operation"
			}
			Self::InvalidTcb => "PCE could not sign at the requested TCB",
			Self::EnclaveCreationFailed => "The Enclave could not be created",
			Self::Unknown(_) => "Unknown Error",
		}
	}
}

impl fmt::Display for PceResult {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.description())
	}
}

/// Errors reading or writing the platform registration state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
	/// Reading `SgxRegistrationStatus` failed.
	#[error("failed to get registration status uefi variable: {0}")]
	RegistrationStatus(MpResult),
	/// Reading `SgxRegistrationServerRequest` failed.
	#[error("failed to get platform manifest uefi variable: {0}")]
	PlatformManifest(MpResult),
	/// Setting the `SgxRegistrationComplete` flag failed.
	#[error("failed to set the registration status uefi variable: {0}")]
	CompleteRegistration(MpResult),
	/// The PCE enclave could not produce the platform info.
	#[error("failed to get the sgx pce platform info: {0}")]
	PcePlatformInfo(PceResult),
	/// The library reported a manifest larger than the request buffer.
	#[error(
		"platform manifest of {0} bytes exceeds the {max} byte limit",
		max = MAX_PLATFORM_MANIFEST_SIZE
	)]
	OversizedManifest(usize),
}
