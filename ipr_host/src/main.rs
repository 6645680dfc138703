//! Platform registration service binary entry point.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
	// Development quick start
	// ```
	// `cargo run --features mock --bin cc-intel-platform-registration -- \
	// 		--mock-platform \
	// 		--log-format console
	// ```
	ipr_host::cli::CLI::execute().await
}
