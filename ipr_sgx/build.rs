#![allow(missing_docs)]

use std::env;

const LIB_DIR_ENV: &str = "IPR_SGX_LIB_DIR";

fn main() {
	println!("cargo:rerun-if-env-changed={LIB_DIR_ENV}");

	// Only link the vendor libraries when the real platform bindings are
	// compiled in; mock and test builds must not require them.
	if env::var_os("CARGO_FEATURE_SGX").is_none() {
		return;
	}

	if let Ok(dir) = env::var(LIB_DIR_ENV) {
		println!("cargo:rustc-link-search=native={dir}");
	}

	for lib in [
		"mp_management",
		"sgx_platform_info",
		"sgx_urts",
		"sgx_dcap_ql",
		"sgx_pce_logic",
		"stdc++",
		"dl",
		"pthread",
	] {
		println!("cargo:rustc-link-lib={lib}");
	}
}
