//! Service configuration read from the environment.
//!
//! Nothing here is fatal: a missing variable falls back to its default with
//! an `info` log, an unusable one with an `error` log.

use std::{
	env,
	net::{Ipv4Addr, SocketAddr},
	time::Duration,
};

use ipr_core::IntelEndpoints;
use tracing::{error, info};

/// Minutes between two registration checks.
pub const REGISTRATION_INTERVAL_ENV: &str =
	"CC_IPR_REGISTRATION_INTERVAL_MINUTES";
/// Port the HTTP server listens on.
pub const SERVICE_PORT_ENV: &str = "CC_IPR_REGISTRATION_SERVICE_PORT";
/// Override of the Intel registration endpoint.
pub const REGISTRATION_ENDPOINT_ENV: &str = "CC_IPR_REGISTRATION_ENDPOINT";
/// Override of the Intel PCK retrieval endpoint.
pub const PCK_RETRIEVAL_ENDPOINT_ENV: &str = "CC_IPR_PCK_RETRIEVAL_ENDPOINT";

/// Default minutes between two registration checks.
pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;
/// Default HTTP port.
pub const DEFAULT_SERVICE_PORT: u16 = 8080;

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
	/// Time between two registration checks. Never zero.
	pub interval: Duration,
	/// Port the HTTP server listens on, on every interface.
	pub port: u16,
	/// Intel endpoints.
	pub endpoints: IntelEndpoints,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			interval: minutes(DEFAULT_INTERVAL_MINUTES),
			port: DEFAULT_SERVICE_PORT,
			endpoints: IntelEndpoints::default(),
		}
	}
}

impl Config {
	/// Read the configuration from the process environment.
	#[must_use]
	pub fn from_env() -> Self {
		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Read the configuration through `lookup`, which maps a variable name
	/// to its value. Empty values count as unset.
	#[must_use]
	pub fn from_lookup<F>(var: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let lookup = |key: &str| var(key).filter(|v| !v.trim().is_empty());
		let defaults = Self::default();

		let interval = match lookup(REGISTRATION_INTERVAL_ENV) {
			None => {
				info!(
					"{REGISTRATION_INTERVAL_ENV} not set, using default of {DEFAULT_INTERVAL_MINUTES} minutes"
				);
				defaults.interval
			}
			Some(value) => match value.trim().parse::<u64>() {
				Ok(m) if m > 0 && m.checked_mul(60).is_some() => minutes(m),
				_ => {
					error!(
						"invalid {REGISTRATION_INTERVAL_ENV} {value:?}, using default of {DEFAULT_INTERVAL_MINUTES} minutes"
					);
					defaults.interval
				}
			},
		};

		let port = match lookup(SERVICE_PORT_ENV) {
			None => {
				info!(
					"{SERVICE_PORT_ENV} not set, using default port {DEFAULT_SERVICE_PORT}"
				);
				defaults.port
			}
			Some(value) => match value.trim().parse::<u16>() {
				Ok(port) if port > 0 => port,
				_ => {
					error!(
						"invalid {SERVICE_PORT_ENV} {value:?}, using default port {DEFAULT_SERVICE_PORT}"
					);
					defaults.port
				}
			},
		};

		let endpoints = IntelEndpoints {
			registration: lookup(REGISTRATION_ENDPOINT_ENV)
				.unwrap_or(defaults.endpoints.registration),
			pck_retrieval: lookup(PCK_RETRIEVAL_ENDPOINT_ENV)
				.unwrap_or(defaults.endpoints.pck_retrieval),
		};

		Self { interval, port, endpoints }
	}

	/// Address the HTTP server listens on.
	#[must_use]
	pub fn listen_addr(&self) -> SocketAddr {
		SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), self.port)
	}
}

fn minutes(m: u64) -> Duration {
	Duration::from_secs(m * 60)
}

#[cfg(test)]
mod test {
	use std::collections::HashMap;

	use ipr_core::intel::{
		DEFAULT_PCK_RETRIEVAL_ENDPOINT, DEFAULT_REGISTRATION_ENDPOINT,
	};

	use super::*;

	fn config(vars: &[(&str, &str)]) -> Config {
		let vars: HashMap<String, String> = vars
			.iter()
			.map(|(k, v)| ((*k).to_string(), (*v).to_string()))
			.collect();
		Config::from_lookup(|key| vars.get(key).cloned())
	}

	#[test]
	fn defaults_when_unset() {
		let config = config(&[]);

		assert_eq!(config.interval, Duration::from_secs(3600));
		assert_eq!(config.port, 8080);
		assert_eq!(
			config.endpoints.registration,
			DEFAULT_REGISTRATION_ENDPOINT
		);
		assert_eq!(
			config.endpoints.pck_retrieval,
			DEFAULT_PCK_RETRIEVAL_ENDPOINT
		);
		assert_eq!(config.listen_addr(), "0.0.0.0:8080".parse().unwrap());
	}

	#[test]
	fn reads_overrides() {
		let config = config(&[
			(REGISTRATION_INTERVAL_ENV, "5"),
			(SERVICE_PORT_ENV, "9090"),
			(REGISTRATION_ENDPOINT_ENV, "http://localhost:1/register"),
			(PCK_RETRIEVAL_ENDPOINT_ENV, "http://localhost:1/pckcert"),
		]);

		assert_eq!(config.interval, Duration::from_secs(300));
		assert_eq!(config.port, 9090);
		assert_eq!(
			config.endpoints.registration,
			"http://localhost:1/register"
		);
		assert_eq!(
			config.endpoints.pck_retrieval,
			"http://localhost:1/pckcert"
		);
		assert_eq!(config.listen_addr(), "0.0.0.0:9090".parse().unwrap());
	}

	#[test]
	fn invalid_values_fall_back_to_defaults() {
		for (interval, port) in [
			("0", "0"),
			("-1", "65536"),
			("ten", "http"),
			("1.5", "80.0"),
			("18446744073709551615", "-8080"),
		] {
			let config = config(&[
				(REGISTRATION_INTERVAL_ENV, interval),
				(SERVICE_PORT_ENV, port),
			]);
			assert_eq!(config, Config::default(), "{interval:?} {port:?}");
		}
	}

	#[test]
	fn empty_values_are_unset() {
		let config = config(&[
			(REGISTRATION_INTERVAL_ENV, ""),
			(SERVICE_PORT_ENV, " "),
			(REGISTRATION_ENDPOINT_ENV, ""),
			(PCK_RETRIEVAL_ENDPOINT_ENV, ""),
		]);

		assert_eq!(config, Config::default());
	}

	#[test]
	fn surrounding_whitespace_is_ignored() {
		let config = config(&[
			(REGISTRATION_INTERVAL_ENV, " 15 "),
			(SERVICE_PORT_ENV, "3000\n"),
		]);

		assert_eq!(config.interval, Duration::from_secs(900));
		assert_eq!(config.port, 3000);
	}
}
