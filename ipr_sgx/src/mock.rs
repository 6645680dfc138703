//! Mock SGX platform. Only for testing and local development.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::{
	MpResult, PcePlatformInfo, PceResult, PlatformError, PlatformManifest,
	PlatformProvider,
};

/// DO NOT USE IN PRODUCTION - ONLY FOR TESTS.
/// Manifest returned by [`MockPlatform`].
pub const MOCK_PLATFORM_MANIFEST: &[u8] = b"mock-sgx-platform-manifest";

/// DO NOT USE IN PRODUCTION - ONLY FOR TESTS.
/// PCE id reported by [`MockPlatform`].
pub const MOCK_PCE_ID: u16 = 0;

/// DO NOT USE IN PRODUCTION - ONLY FOR TESTS.
/// PCE ISV SVN reported by [`MockPlatform`].
pub const MOCK_PCE_ISV_SVN: u16 = 0x0d;

/// DO NOT USE IN PRODUCTION - ONLY FOR TESTS.
/// Encrypted PPID reported by [`MockPlatform`].
pub const MOCK_ENCRYPTED_PPID: &[u8] = &[0x5a; 16];

/// Mock SGX platform that should only ever be used for testing.
///
/// Completing the registration flips the platform into the registered state,
/// so a service running against it walks the same path a freshly registered
/// machine would.
#[derive(Debug)]
pub struct MockPlatform {
	registered: AtomicBool,
	registration_status_error: Option<MpResult>,
	manifest_error: Option<MpResult>,
	complete_error: Option<MpResult>,
	pce_error: Option<PceResult>,
	opened: AtomicUsize,
	closed: AtomicUsize,
	completions: AtomicUsize,
}

impl MockPlatform {
	fn new(registered: bool) -> Self {
		Self {
			registered: AtomicBool::new(registered),
			registration_status_error: None,
			manifest_error: None,
			complete_error: None,
			pce_error: None,
			opened: AtomicUsize::new(0),
			closed: AtomicUsize::new(0),
			completions: AtomicUsize::new(0),
		}
	}

	/// A platform with a pending registration request.
	#[must_use]
	pub fn unregistered() -> Self {
		Self::new(false)
	}

	/// A platform that already completed registration.
	#[must_use]
	pub fn registered() -> Self {
		Self::new(true)
	}

	/// Fail reads of the registration flag with `code`.
	#[must_use]
	pub fn with_registration_status_error(mut self, code: MpResult) -> Self {
		self.registration_status_error = Some(code);
		self
	}

	/// Fail reads of the platform manifest with `code`.
	#[must_use]
	pub fn with_manifest_error(mut self, code: MpResult) -> Self {
		self.manifest_error = Some(code);
		self
	}

	/// Fail writes of the registration flag with `code`.
	#[must_use]
	pub fn with_complete_error(mut self, code: MpResult) -> Self {
		self.complete_error = Some(code);
		self
	}

	/// Fail the PCE platform info query with `code`.
	#[must_use]
	pub fn with_pce_error(mut self, code: PceResult) -> Self {
		self.pce_error = Some(code);
		self
	}

	/// Current value of the registration flag.
	#[must_use]
	pub fn is_registered(&self) -> bool {
		self.registered.load(Ordering::SeqCst)
	}

	/// Number of sessions that have been opened.
	#[must_use]
	pub fn sessions_opened(&self) -> usize {
		self.opened.load(Ordering::SeqCst)
	}

	/// Number of sessions opened but not yet terminated.
	#[must_use]
	pub fn open_sessions(&self) -> usize {
		self.sessions_opened() - self.closed.load(Ordering::SeqCst)
	}

	/// Number of successful registration completions.
	#[must_use]
	pub fn completions(&self) -> usize {
		self.completions.load(Ordering::SeqCst)
	}
}

impl Default for MockPlatform {
	fn default() -> Self {
		Self::unregistered()
	}
}

impl PlatformProvider for MockPlatform {
	fn init(&self) {
		self.opened.fetch_add(1, Ordering::SeqCst);
	}

	fn terminate(&self) {
		self.closed.fetch_add(1, Ordering::SeqCst);
	}

	fn is_machine_registered(&self) -> Result<bool, PlatformError> {
		match self.registration_status_error {
			Some(code) => Err(PlatformError::RegistrationStatus(code)),
			None => Ok(self.is_registered()),
		}
	}

	fn platform_manifest(&self) -> Result<PlatformManifest, PlatformError> {
		match self.manifest_error {
			Some(code) => Err(PlatformError::PlatformManifest(code)),
			None => PlatformManifest::new(MOCK_PLATFORM_MANIFEST.to_vec()),
		}
	}

	fn complete_machine_registration(&self) -> Result<(), PlatformError> {
		if let Some(code) = self.complete_error {
			return Err(PlatformError::CompleteRegistration(code));
		}
		self.registered.store(true, Ordering::SeqCst);
		self.completions.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}

	fn pce_platform_info(&self) -> Result<PcePlatformInfo, PlatformError> {
		match self.pce_error {
			Some(code) => Err(PlatformError::PcePlatformInfo(code)),
			None => Ok(PcePlatformInfo::from_raw(
				MOCK_PCE_ID,
				MOCK_PCE_ISV_SVN,
				MOCK_ENCRYPTED_PPID,
			)),
		}
	}
}
