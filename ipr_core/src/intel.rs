//! Blocking client for the Intel registration and provisioning services.
//!
//! Every call is a single request; the outcome is classified into a
//! [`StatusCodeMetric`] and never retried here. Retrying is the job of the
//! next service cycle.

use std::{error::Error as StdError, io, time::Duration};

use ipr_metrics::{StatusCode, StatusCodeMetric};
use ipr_sgx::PlatformManifest;
use ureq::{Agent, AgentBuilder, ErrorKind, Response, Transport};

use crate::{CheckFailure, RegistrationError};

/// Intel platform registration endpoint.
pub const DEFAULT_REGISTRATION_ENDPOINT: &str =
	"https://api.trustedservices.intel.com/sgx/registration/v1/platform";
/// Intel PCK certificate retrieval endpoint.
pub const DEFAULT_PCK_RETRIEVAL_ENDPOINT: &str =
	"https://api.trustedservices.intel.com/sgx/certification/v4/pckcert";
/// Upper bound on a single request to Intel.
pub const INTEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const INTEL_ERROR_CODE_HEADER: &str = "Error-Code";
const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Where the Intel services live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntelEndpoints {
	/// Platform registration (`POST`, body is the platform manifest).
	pub registration: String,
	/// PCK certificate retrieval (`GET`).
	pub pck_retrieval: String,
}

impl Default for IntelEndpoints {
	fn default() -> Self {
		Self {
			registration: DEFAULT_REGISTRATION_ENDPOINT.to_string(),
			pck_retrieval: DEFAULT_PCK_RETRIEVAL_ENDPOINT.to_string(),
		}
	}
}

/// Client for the Intel services.
#[derive(Debug, Clone)]
pub struct IntelService {
	agent: Agent,
	endpoints: IntelEndpoints,
}

impl IntelService {
	/// Create a client with the default [`INTEL_REQUEST_TIMEOUT`].
	#[must_use]
	pub fn new(endpoints: IntelEndpoints) -> Self {
		Self::with_timeout(endpoints, INTEL_REQUEST_TIMEOUT)
	}

	/// Create a client whose requests give up after `timeout`.
	#[must_use]
	pub fn with_timeout(endpoints: IntelEndpoints, timeout: Duration) -> Self {
		Self { agent: AgentBuilder::new().timeout(timeout).build(), endpoints }
	}

	/// Endpoints this client talks to.
	#[must_use]
	pub fn endpoints(&self) -> &IntelEndpoints {
		&self.endpoints
	}

	/// Submit the platform manifest for registration.
	///
	/// A response always yields `Ok`, whatever its status; only transport
	/// failures yield a [`CheckFailure`].
	pub fn register_platform(
		&self,
		manifest: &PlatformManifest,
	) -> Result<StatusCodeMetric, CheckFailure> {
		let result = self
			.agent
			.post(&self.endpoints.registration)
			.set("Content-Type", CONTENT_TYPE_OCTET_STREAM)
			.send_bytes(manifest.as_bytes());

		let response = match result {
			Ok(response) | Err(ureq::Error::Status(_, response)) => response,
			Err(ureq::Error::Transport(transport)) => {
				return Err(if is_connect_failure(&transport) {
					CheckFailure::new(
						StatusCodeMetric::new(StatusCode::IntelConnectFailed),
						RegistrationError::IntelConnect(Box::new(transport)),
					)
				} else {
					CheckFailure::new(
						StatusCodeMetric::unknown_error(),
						RegistrationError::IntelRequest(Box::new(transport)),
					)
				});
			}
		};

		Ok(classify_registration(&response))
	}

	/// Look up the PCK certificate of a platform that already registered.
	///
	/// Any transport failure, timeouts included, is an
	/// [`StatusCode::UnknownError`].
	pub fn retrieve_pck(
		&self,
		encrypted_ppid: &str,
		pce_id: &str,
	) -> Result<StatusCodeMetric, CheckFailure> {
		let result = self
			.agent
			.get(&self.endpoints.pck_retrieval)
			.query("encrypted_ppid", encrypted_ppid)
			.query("pceid", pce_id)
			.call();

		match result {
			Ok(response) | Err(ureq::Error::Status(_, response)) => {
				Ok(classify_pck_retrieval(&response))
			}
			Err(ureq::Error::Transport(transport)) => Err(CheckFailure::new(
				StatusCodeMetric::unknown_error(),
				RegistrationError::PckRequest(Box::new(transport)),
			)),
		}
	}
}

fn classify_registration(response: &Response) -> StatusCodeMetric {
	match response.status() {
		201 => StatusCodeMetric::new(StatusCode::PlatformRebootNeeded),
		code => {
			let status = if (400..500).contains(&code) {
				StatusCode::InvalidRegistrationRequest
			} else {
				StatusCode::IntelRegServiceRequestFailed
			};
			StatusCodeMetric::new(status)
				.with_http_status_code(code)
				.with_intel_error(response.header(INTEL_ERROR_CODE_HEADER))
		}
	}
}

fn classify_pck_retrieval(response: &Response) -> StatusCodeMetric {
	match response.status() {
		200 => StatusCodeMetric::new(StatusCode::PlatformDirectlyRegistered),
		404 => StatusCodeMetric::new(StatusCode::SgxResetNeeded)
			.with_http_status_code(404),
		code => StatusCodeMetric::new(StatusCode::RetryNeeded)
			.with_http_status_code(code),
	}
}

fn is_connect_failure(transport: &Transport) -> bool {
	matches!(
		transport.kind(),
		ErrorKind::Dns | ErrorKind::ConnectionFailed | ErrorKind::ProxyConnect
	) || is_timeout(transport)
}

fn is_timeout(transport: &Transport) -> bool {
	let mut source: Option<&(dyn StdError + 'static)> = Some(transport);
	while let Some(err) = source {
		if let Some(io_err) = err.downcast_ref::<io::Error>() {
			if matches!(
				io_err.kind(),
				io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
			) {
				return true;
			}
		}
		source = err.source();
	}
	false
}

#[cfg(test)]
mod test {
	use std::time::Duration;

	use wiremock::{
		matchers::{body_bytes, header, method, path, query_param},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;

	const REGISTRATION_PATH: &str = "/sgx/registration/v1/platform";
	const PCK_PATH: &str = "/sgx/certification/v4/pckcert";

	fn endpoints(server: &MockServer) -> IntelEndpoints {
		IntelEndpoints {
			registration: format!("{}{REGISTRATION_PATH}", server.uri()),
			pck_retrieval: format!("{}{PCK_PATH}", server.uri()),
		}
	}

	async fn register(
		service: IntelService,
	) -> Result<StatusCodeMetric, CheckFailure> {
		tokio::task::spawn_blocking(move || {
			let manifest = PlatformManifest::new(b"manifest".to_vec()).unwrap();
			service.register_platform(&manifest)
		})
		.await
		.unwrap()
	}

	async fn retrieve(
		service: IntelService,
	) -> Result<StatusCodeMetric, CheckFailure> {
		tokio::task::spawn_blocking(move || {
			service.retrieve_pck("5a5a5a5a", "0000")
		})
		.await
		.unwrap()
	}

	async fn mock_registration(
		server: &MockServer,
		response: ResponseTemplate,
	) {
		Mock::given(method("POST"))
			.and(path(REGISTRATION_PATH))
			.and(header("Content-Type", CONTENT_TYPE_OCTET_STREAM))
			.and(body_bytes(b"manifest".to_vec()))
			.respond_with(response)
			.expect(1)
			.mount(server)
			.await;
	}

	async fn mock_pck(server: &MockServer, response: ResponseTemplate) {
		Mock::given(method("GET"))
			.and(path(PCK_PATH))
			.and(query_param("encrypted_ppid", "5a5a5a5a"))
			.and(query_param("pceid", "0000"))
			.respond_with(response)
			.expect(1)
			.mount(server)
			.await;
	}

	#[tokio::test]
	async fn registration_created_needs_reboot() {
		let server = MockServer::start().await;
		mock_registration(&server, ResponseTemplate::new(201)).await;

		let metric =
			register(IntelService::new(endpoints(&server))).await.unwrap();

		assert_eq!(
			metric,
			StatusCodeMetric::new(StatusCode::PlatformRebootNeeded)
		);
	}

	#[tokio::test]
	async fn registration_not_found_is_invalid_request() {
		let server = MockServer::start().await;
		mock_registration(
			&server,
			ResponseTemplate::new(404)
				.insert_header(INTEL_ERROR_CODE_HEADER, "InvalidRequestSyntax"),
		)
		.await;

		let metric =
			register(IntelService::new(endpoints(&server))).await.unwrap();

		assert_eq!(metric.status, StatusCode::InvalidRegistrationRequest);
		assert_eq!(metric.http_status_code, Some(404));
		assert_eq!(metric.intel_error.as_deref(), Some("InvalidRequestSyntax"));
	}

	#[tokio::test]
	async fn registration_server_error_is_service_failure() {
		let server = MockServer::start().await;
		mock_registration(&server, ResponseTemplate::new(500)).await;

		let metric =
			register(IntelService::new(endpoints(&server))).await.unwrap();

		assert_eq!(
			metric,
			StatusCodeMetric::new(StatusCode::IntelRegServiceRequestFailed)
				.with_http_status_code(500)
		);
	}

	#[tokio::test]
	async fn registration_other_success_is_service_failure() {
		let server = MockServer::start().await;
		mock_registration(&server, ResponseTemplate::new(200)).await;

		let metric =
			register(IntelService::new(endpoints(&server))).await.unwrap();

		assert_eq!(metric.status, StatusCode::IntelRegServiceRequestFailed);
		assert_eq!(metric.http_status_code, Some(200));
	}

	#[tokio::test]
	async fn registration_timeout_is_connect_failure() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path(REGISTRATION_PATH))
			.respond_with(
				ResponseTemplate::new(201).set_delay(Duration::from_secs(2)),
			)
			.mount(&server)
			.await;

		let service = IntelService::with_timeout(
			endpoints(&server),
			Duration::from_millis(100),
		);
		let failure = register(service).await.unwrap_err();

		assert_eq!(failure.metric.status, StatusCode::IntelConnectFailed);
		assert!(matches!(failure.error, RegistrationError::IntelConnect(_)));
	}

	#[tokio::test]
	async fn registration_refused_connection_is_connect_failure() {
		// nothing listens on a port that was just released
		let port = std::net::TcpListener::bind("127.0.0.1:0")
			.unwrap()
			.local_addr()
			.unwrap()
			.port();
		let service = IntelService::new(IntelEndpoints {
			registration: format!("http://127.0.0.1:{port}{REGISTRATION_PATH}"),
			pck_retrieval: format!("http://127.0.0.1:{port}{PCK_PATH}"),
		});

		let failure = register(service).await.unwrap_err();

		assert_eq!(failure.metric.status, StatusCode::IntelConnectFailed);
	}

	#[tokio::test]
	async fn registration_invalid_url_is_unknown_error() {
		let service = IntelService::new(IntelEndpoints {
			registration: "not a url".to_string(),
			pck_retrieval: "not a url".to_string(),
		});

		let failure = register(service).await.unwrap_err();

		assert_eq!(failure.metric, StatusCodeMetric::unknown_error());
		assert!(matches!(failure.error, RegistrationError::IntelRequest(_)));
	}

	#[tokio::test]
	async fn pck_found_is_directly_registered() {
		let server = MockServer::start().await;
		mock_pck(&server, ResponseTemplate::new(200).set_body_string("cert"))
			.await;

		let metric =
			retrieve(IntelService::new(endpoints(&server))).await.unwrap();

		assert_eq!(
			metric,
			StatusCodeMetric::new(StatusCode::PlatformDirectlyRegistered)
		);
	}

	#[tokio::test]
	async fn pck_not_found_needs_sgx_reset() {
		let server = MockServer::start().await;
		mock_pck(&server, ResponseTemplate::new(404)).await;

		let metric =
			retrieve(IntelService::new(endpoints(&server))).await.unwrap();

		assert_eq!(
			metric,
			StatusCodeMetric::new(StatusCode::SgxResetNeeded)
				.with_http_status_code(404)
		);
	}

	#[tokio::test]
	async fn pck_unavailable_needs_retry() {
		let server = MockServer::start().await;
		mock_pck(&server, ResponseTemplate::new(503)).await;

		let metric =
			retrieve(IntelService::new(endpoints(&server))).await.unwrap();

		assert_eq!(
			metric,
			StatusCodeMetric::new(StatusCode::RetryNeeded)
				.with_http_status_code(503)
		);
	}

	#[tokio::test]
	async fn pck_timeout_is_unknown_error() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path(PCK_PATH))
			.respond_with(
				ResponseTemplate::new(200).set_delay(Duration::from_secs(2)),
			)
			.mount(&server)
			.await;

		let service = IntelService::with_timeout(
			endpoints(&server),
			Duration::from_millis(100),
		);
		let failure = retrieve(service).await.unwrap_err();

		assert_eq!(failure.metric, StatusCodeMetric::unknown_error());
		assert!(matches!(failure.error, RegistrationError::PckRequest(_)));
	}

	#[test]
	fn default_endpoints_point_at_intel() {
		let endpoints = IntelEndpoints::default();
		assert_eq!(endpoints.registration, DEFAULT_REGISTRATION_ENDPOINT);
		assert_eq!(endpoints.pck_retrieval, DEFAULT_PCK_RETRIEVAL_ENDPOINT);
	}
}
