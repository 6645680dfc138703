//! Bindings to the vendor `libmp_management` and `libsgx_platform_info`.

use std::os::raw::c_int;

use crate::{
	MpResult, PcePlatformInfo, PceResult, PlatformError, PlatformManifest,
	PlatformProvider, MAX_ENCRYPTED_PPID_SIZE, MAX_PLATFORM_MANIFEST_SIZE,
};

const MP_SUCCESS: c_int = 0;
const MP_MACHINE_REGISTERED: c_int = 1;
const PCE_PLATFORM_SUCCESS: u32 = 0xF000;

mod ffi {
	use std::os::raw::c_int;

	use crate::MAX_ENCRYPTED_PPID_SIZE;

	/// `sgx_pce_info_t`
	#[repr(C)]
	#[derive(Default)]
	pub struct PceInfo {
		pub pce_isv_svn: u16,
		pub pce_id: u16,
	}

	/// `platform_info_t`
	#[repr(C)]
	pub struct PlatformInfo {
		pub pce_info: PceInfo,
		pub encrypted_ppid_out_size: u32,
		pub encrypted_ppid: [u8; MAX_ENCRYPTED_PPID_SIZE],
	}

	extern "C" {
		pub fn mp_management_init();
		pub fn mp_management_get_platform_manifest(
			buffer: *mut u8,
			size: *mut u16,
		) -> c_int;
		pub fn mp_management_get_registration_status(
			status: *mut c_int,
		) -> c_int;
		pub fn mp_management_set_registration_status_as_complete() -> c_int;
		pub fn mp_management_terminate();

		pub fn get_platform_info(platform_info: *mut PlatformInfo) -> u32;
	}
}

/// SGX platform backed by the vendor libraries.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sgx;

impl PlatformProvider for Sgx {
	fn init(&self) {
		// SAFETY: no arguments; the library keeps its own global state.
		unsafe { ffi::mp_management_init() }
	}

	fn terminate(&self) {
		// SAFETY: paired with `init` by `PlatformSession`.
		unsafe { ffi::mp_management_terminate() }
	}

	fn is_machine_registered(&self) -> Result<bool, PlatformError> {
		let mut status: c_int = 0;
		// SAFETY: `status` is a valid, writable `MpMachineRegistrationStatus`.
		let result =
			unsafe { ffi::mp_management_get_registration_status(&mut status) };
		if result != MP_SUCCESS {
			return Err(PlatformError::RegistrationStatus(MpResult::from_raw(
				result,
			)));
		}
		Ok(status == MP_MACHINE_REGISTERED)
	}

	fn platform_manifest(&self) -> Result<PlatformManifest, PlatformError> {
		let mut buffer = vec![0u8; MAX_PLATFORM_MANIFEST_SIZE];
		#[allow(clippy::cast_possible_truncation)]
		let mut size = MAX_PLATFORM_MANIFEST_SIZE as u16;
		// SAFETY: `buffer` holds `size` writable bytes and the library never
		// writes more than `size`, which it updates to the bytes written.
		let result = unsafe {
			ffi::mp_management_get_platform_manifest(
				buffer.as_mut_ptr(),
				&mut size,
			)
		};
		if result != MP_SUCCESS {
			return Err(PlatformError::PlatformManifest(MpResult::from_raw(
				result,
			)));
		}

		let size = usize::from(size);
		if size > buffer.len() {
			return Err(PlatformError::OversizedManifest(size));
		}
		buffer.truncate(size);
		PlatformManifest::new(buffer)
	}

	fn complete_machine_registration(&self) -> Result<(), PlatformError> {
		// SAFETY: no arguments.
		let result =
			unsafe { ffi::mp_management_set_registration_status_as_complete() };
		if result != MP_SUCCESS {
			return Err(PlatformError::CompleteRegistration(
				MpResult::from_raw(result),
			));
		}
		Ok(())
	}

	fn pce_platform_info(&self) -> Result<PcePlatformInfo, PlatformError> {
		let mut info = ffi::PlatformInfo {
			pce_info: ffi::PceInfo::default(),
			encrypted_ppid_out_size: 0,
			encrypted_ppid: [0; MAX_ENCRYPTED_PPID_SIZE],
		};
		// SAFETY: `info` is a valid, writable `platform_info_t`.
		let result = unsafe { ffi::get_platform_info(&mut info) };
		if result != PCE_PLATFORM_SUCCESS {
			return Err(PlatformError::PcePlatformInfo(PceResult::from_raw(
				result,
			)));
		}

		let ppid_len = usize::try_from(info.encrypted_ppid_out_size)
			.unwrap_or(usize::MAX)
			.min(MAX_ENCRYPTED_PPID_SIZE);

		Ok(PcePlatformInfo::from_raw(
			info.pce_info.pce_id,
			info.pce_info.pce_isv_svn,
			&info.encrypted_ppid[..ppid_len],
		))
	}
}
