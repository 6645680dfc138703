//! The platform provider trait and the types it hands out.

use std::{fmt, ops::Deref};

use crate::PlatformError;

/// Size of the buffer the manifest is read into
/// (`MAX_REQUEST_SIZE` in the vendor headers).
pub const MAX_PLATFORM_MANIFEST_SIZE: usize = 1024 * 56;

/// Upper bound on the encrypted PPID produced by the PCE.
pub const MAX_ENCRYPTED_PPID_SIZE: usize = 384;

/// Registration request read from the `SgxRegistrationServerRequest` UEFI
/// variable. Opaque to us; it is forwarded as is to the Intel registration
/// service.
#[derive(Clone, PartialEq, Eq)]
pub struct PlatformManifest(Vec<u8>);

impl PlatformManifest {
	/// Wrap manifest bytes, rejecting anything that could not have come out
	/// of the native request buffer.
	pub fn new(bytes: Vec<u8>) -> Result<Self, PlatformError> {
		if bytes.len() > MAX_PLATFORM_MANIFEST_SIZE {
			return Err(PlatformError::OversizedManifest(bytes.len()));
		}
		Ok(Self(bytes))
	}

	/// The raw manifest.
	#[must_use]
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// Length of the manifest in bytes.
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the manifest is empty.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Debug for PlatformManifest {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PlatformManifest").field("len", &self.0.len()).finish()
	}
}

/// PCE identity of the platform, already formatted the way the Intel PCS
/// API expects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcePlatformInfo {
	/// PCE id, 4 lowercase hex digits.
	pub pce_id: String,
	/// PCE ISV SVN, `0x`-prefixed 2 digit hex.
	pub pce_isv_svn: String,
	/// PPID encrypted with the Intel PPIDEK, lowercase hex.
	pub encrypted_ppid: String,
}

impl PcePlatformInfo {
	/// Build from the raw values returned by the PCE enclave.
	#[must_use]
	pub fn from_raw(
		pce_id: u16,
		pce_isv_svn: u16,
		encrypted_ppid: &[u8],
	) -> Self {
		Self {
			pce_id: format!("{pce_id:04x}"),
			pce_isv_svn: format!("0x{pce_isv_svn:02x}"),
			encrypted_ppid: hex::encode(encrypted_ppid),
		}
	}
}

/// Something that exposes the SGX platform registration state. This is made
/// generic so mock providers can be subbed in for testing. In production use
/// [`crate::Sgx`].
///
/// The native libraries keep global state between `init` and `terminate`;
/// callers should go through [`PlatformSession`] rather than pairing the two
/// by hand.
pub trait PlatformProvider: Send + Sync {
	/// Initialize the native libraries.
	fn init(&self);

	/// Release everything acquired by [`Self::init`].
	fn terminate(&self);

	/// Read the `SgxRegistrationStatus.SgxRegistrationComplete` flag.
	fn is_machine_registered(&self) -> Result<bool, PlatformError>;

	/// Read the pending registration request.
	fn platform_manifest(&self) -> Result<PlatformManifest, PlatformError>;

	/// Set the `SgxRegistrationStatus.SgxRegistrationComplete` flag.
	fn complete_machine_registration(&self) -> Result<(), PlatformError>;

	/// Run the PCE enclave and return the platform identity.
	fn pce_platform_info(&self) -> Result<PcePlatformInfo, PlatformError>;
}

/// Scoped access to a [`PlatformProvider`]: initialized on
/// [`PlatformSession::open`], terminated on drop.
pub struct PlatformSession<'a> {
	provider: &'a dyn PlatformProvider,
}

impl<'a> PlatformSession<'a> {
	/// Initialize `provider` for the lifetime of the returned session.
	#[must_use]
	pub fn open(provider: &'a dyn PlatformProvider) -> Self {
		provider.init();
		Self { provider }
	}
}

impl<'a> Deref for PlatformSession<'a> {
	type Target = dyn PlatformProvider + 'a;

	fn deref(&self) -> &Self::Target {
		self.provider
	}
}

impl Drop for PlatformSession<'_> {
	fn drop(&mut self) {
		self.provider.terminate();
	}
}
