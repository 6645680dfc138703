//! Host process of the platform registration service. Runs the periodic
//! registration check next to a small HTTP server exposing the probes and
//! the prometheus metrics, and shuts both down together.
//!
//! The service needs the vendor SGX libraries: build with the `sgx` feature
//! on a registration capable host. The `mock` feature adds a
//! `--mock-platform` flag for running it anywhere else.
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::unwrap_used)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use std::net::SocketAddr;

pub mod cli;
pub mod config;
pub mod host;

/// Name the service reports itself under.
pub const APP_NAME: &str = "cc-intel-platform-registration";
/// Crate version of the host binary, sourced from `Cargo.toml`.
pub const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Git commit SHA of the host binary build, set by `build.rs`.
pub const GIT_SHA: &str = env!("GIT_SHA");

/// Errors that terminate the host process.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
	/// The HTTP listener could not be bound.
	#[error("failed to bind http server to {addr}: {source}")]
	Bind {
		/// Address we tried to listen on.
		addr: SocketAddr,
		/// Underlying error.
		#[source]
		source: hyper::Error,
	},
	/// The HTTP server stopped with an error.
	#[error("http server failed: {0}")]
	Serve(#[source] hyper::Error),
	/// The tracing subscriber could not be installed.
	#[error("failed to initialize logging: {0}")]
	Logging(#[from] tracing_subscriber::util::TryInitError),
	/// The prometheus metrics could not be registered.
	#[error("failed to create metrics: {0}")]
	Metrics(#[from] ipr_metrics::prometheus::Error),
	/// No SGX platform is compiled into this binary.
	#[error(
		"no SGX platform available: build with the `sgx` feature, or with `mock` and pass `--mock-platform`"
	)]
	PlatformUnavailable,
	/// The registration service stopped with an error.
	#[error(transparent)]
	Service(#[from] ipr_core::ServiceError),
	/// A supervised task panicked or was aborted.
	#[error("task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
}
