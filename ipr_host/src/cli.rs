//! Command line interface for running the platform registration service.

use std::{fmt, future::Future, process::ExitCode, sync::Arc};

use clap::{Parser, ValueEnum};
use ipr_core::{
	DefaultRegistrationChecker, IntelService, RegistrationService, ServiceError,
};
use ipr_metrics::StatusRegistry;
use ipr_sgx::PlatformProvider;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{
	fmt::{
		format::Writer,
		time::{FormatTime, SystemTime, Uptime},
	},
	layer::SubscriberExt,
	util::SubscriberInitExt,
	EnvFilter,
};

use crate::{
	config::Config, host::HostServer, HostError, APP_NAME, CRATE_VERSION,
	GIT_SHA,
};

const DEFAULT_LOG_LEVEL: &str = "info";

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
	/// One JSON object per line.
	Json,
	/// Human readable.
	Console,
}

/// Timestamp attached to log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTime {
	/// Wall clock time, RFC 3339.
	Rfc3339,
	/// Time since the process started.
	Uptime,
	/// No timestamp.
	None,
}

/// CLI options for starting the service.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = APP_NAME, version, about)]
pub struct HostOpts {
	/// Log filter, any `tracing_subscriber::EnvFilter` directive
	/// (e.g. `debug` or `info,ipr_core=trace`).
	#[arg(long, default_value = DEFAULT_LOG_LEVEL)]
	pub log_level: String,
	/// Log line encoding.
	#[arg(long, value_enum, default_value_t = LogFormat::Json)]
	pub log_format: LogFormat,
	/// Timestamp attached to log lines.
	#[arg(long, value_enum, default_value_t = LogTime::Rfc3339)]
	pub log_time: LogTime,
	/// Run against the mock SGX platform. Only for local development.
	#[cfg(feature = "mock")]
	#[arg(long)]
	pub mock_platform: bool,
}

enum Timer {
	Rfc3339(SystemTime),
	Uptime(Uptime),
	None,
}

impl From<LogTime> for Timer {
	fn from(time: LogTime) -> Self {
		match time {
			LogTime::Rfc3339 => Self::Rfc3339(SystemTime),
			LogTime::Uptime => Self::Uptime(Uptime::default()),
			LogTime::None => Self::None,
		}
	}
}

impl FormatTime for Timer {
	fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
		match self {
			Self::Rfc3339(timer) => timer.format_time(w),
			Self::Uptime(timer) => timer.format_time(w),
			Self::None => Ok(()),
		}
	}
}

/// Build the log filter. An unusable directive falls back to `info`; the
/// parse error is returned so it can be logged once logging is up.
fn log_filter(directive: &str) -> (EnvFilter, Option<String>) {
	match EnvFilter::try_new(directive) {
		Ok(filter) => (filter, None),
		Err(e) => (
			EnvFilter::new(DEFAULT_LOG_LEVEL),
			Some(format!("invalid log level {directive:?}: {e}")),
		),
	}
}

fn init_logging(opts: &HostOpts) -> Result<(), HostError> {
	let (filter, filter_error) = log_filter(&opts.log_level);
	let timer = Timer::from(opts.log_time);
	let registry = tracing_subscriber::registry().with(filter);

	match opts.log_format {
		LogFormat::Json => registry
			.with(tracing_subscriber::fmt::layer().json().with_timer(timer))
			.try_init()?,
		LogFormat::Console => registry
			.with(tracing_subscriber::fmt::layer().with_timer(timer))
			.try_init()?,
	}

	if let Some(e) = filter_error {
		warn!("{e}, using {DEFAULT_LOG_LEVEL:?}");
	}
	Ok(())
}

#[cfg(feature = "mock")]
fn mock_platform(opts: &HostOpts) -> Option<Arc<dyn PlatformProvider>> {
	opts.mock_platform.then(|| {
		warn!("running against the mock SGX platform");
		Arc::new(ipr_sgx::mock::MockPlatform::unregistered())
			as Arc<dyn PlatformProvider>
	})
}

#[cfg(not(feature = "mock"))]
fn mock_platform(_: &HostOpts) -> Option<Arc<dyn PlatformProvider>> {
	None
}

#[cfg(feature = "sgx")]
#[allow(clippy::unnecessary_wraps)]
fn native_platform() -> Result<Arc<dyn PlatformProvider>, HostError> {
	Ok(Arc::new(ipr_sgx::Sgx))
}

#[cfg(not(feature = "sgx"))]
fn native_platform() -> Result<Arc<dyn PlatformProvider>, HostError> {
	Err(HostError::PlatformUnavailable)
}

fn platform_provider(
	opts: &HostOpts,
) -> Result<Arc<dyn PlatformProvider>, HostError> {
	match mock_platform(opts) {
		Some(platform) => Ok(platform),
		None => native_platform(),
	}
}

/// Cancel `cancel` on SIGTERM or SIGINT.
async fn cancel_on_signal(cancel: CancellationToken) {
	let terminate = async {
		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				error!("failed to listen for SIGTERM: {e}");
				std::future::pending::<()>().await;
			}
		}
	};

	tokio::select! {
		() = terminate => info!("received SIGTERM, shutting down"),
		result = tokio::signal::ctrl_c() => match result {
			Ok(()) => info!("received SIGINT, shutting down"),
			Err(e) => error!("failed to listen for SIGINT: {e}, shutting down"),
		},
		() = cancel.cancelled() => return,
	}
	cancel.cancel();
}

/// Drive `service` and `host` until both have returned. Whichever ends
/// first, for whatever reason, cancels `cancel` so the other one stops too.
async fn supervise<S, H>(
	service: S,
	host: H,
	cancel: CancellationToken,
) -> Result<(), HostError>
where
	S: Future<Output = Result<(), ServiceError>> + Send + 'static,
	H: Future<Output = Result<(), HostError>> + Send + 'static,
{
	let service_task = tokio::spawn({
		let guard = cancel.clone().drop_guard();
		async move {
			let _guard = guard;
			service.await
		}
	});
	let host_task = tokio::spawn({
		let guard = cancel.drop_guard();
		async move {
			let _guard = guard;
			host.await
		}
	});

	let (service_result, host_result) = tokio::join!(service_task, host_task);
	service_result??;
	host_result??;
	Ok(())
}

async fn run(opts: &HostOpts) -> Result<(), HostError> {
	info!(version = CRATE_VERSION, git_sha = GIT_SHA, "starting {APP_NAME}");

	let config = Config::from_env();
	let platform = platform_provider(opts)?;
	let registry = Arc::new(StatusRegistry::new()?);

	let checker = DefaultRegistrationChecker::new(
		platform,
		IntelService::new(config.endpoints.clone()),
	);
	let service = RegistrationService::new(
		config.interval,
		Arc::new(checker),
		registry.clone(),
	)?;
	let host = HostServer::new(config.listen_addr(), registry);

	let cancel = CancellationToken::new();
	tokio::spawn(cancel_on_signal(cancel.clone()));

	let service_run = {
		let cancel = cancel.clone();
		async move { service.run(cancel).await }
	};
	let host_run = host.serve(cancel.clone());
	supervise(service_run, host_run, cancel).await?;

	info!("{APP_NAME} stopped");
	Ok(())
}

/// Service command line interface.
pub struct CLI;
impl CLI {
	/// Execute the command line interface.
	pub async fn execute() -> ExitCode {
		let opts = HostOpts::parse();

		if let Err(e) = init_logging(&opts) {
			eprintln!("{e}");
			return ExitCode::FAILURE;
		}

		match run(&opts).await {
			Ok(()) => ExitCode::SUCCESS,
			Err(e) => {
				error!("{e}");
				ExitCode::FAILURE
			}
		}
	}
}
