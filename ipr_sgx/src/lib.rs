//! Access to the SGX platform registration state kept by the platform
//! firmware (UEFI variables) and to the PCE platform identity.
//!
//! The native work is done by two vendor libraries: `libmp_management`
//! (multi-package registration UEFI variables) and `libsgx_platform_info`
//! (runs the PCE enclave to derive the encrypted PPID). Callers only ever see
//! the [`PlatformProvider`] trait so a mock can be subbed in for testing. In
//! production use [`Sgx`] (requires the `sgx` feature).

#![cfg_attr(not(feature = "sgx"), forbid(unsafe_code))]
#![deny(clippy::all, clippy::unwrap_used)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod error;
mod platform;
#[cfg(feature = "sgx")]
mod sgx;

#[cfg(any(feature = "mock", test))]
pub mod mock;

pub use error::{MpResult, PceResult, PlatformError};
pub use platform::{
	PcePlatformInfo, PlatformManifest, PlatformProvider, PlatformSession,
	MAX_ENCRYPTED_PPID_SIZE, MAX_PLATFORM_MANIFEST_SIZE,
};
#[cfg(feature = "sgx")]
pub use sgx::Sgx;
