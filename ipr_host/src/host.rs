//! HTTP server exposing the liveness and readiness probes and the
//! prometheus metrics.

use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use axum::{
	body::Body,
	extract::State,
	http::{Request, StatusCode},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use futures_util::FutureExt;
use ipr_metrics::{StatusPublisher, StatusRegistry};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::HostError;

/// Liveness probe.
pub const LIVE: &str = "/live";
/// Readiness probe.
pub const READY: &str = "/ready";
/// Prometheus metrics.
pub const METRICS: &str = "/metrics";

/// How long in flight requests get to finish once shutdown starts.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP server of the registration service.
#[allow(clippy::module_name_repetitions)]
pub struct HostServer {
	addr: SocketAddr,
	registry: Arc<StatusRegistry>,
}

impl HostServer {
	/// Create a new `HostServer`. See `Self::serve` for starting the server.
	#[must_use]
	pub fn new(addr: SocketAddr, registry: Arc<StatusRegistry>) -> Self {
		Self { addr, registry }
	}

	fn routes() -> Router<Arc<StatusRegistry>> {
		Router::new()
			.route(LIVE, get(Self::live))
			.route(READY, get(Self::ready))
			.route(METRICS, get(Self::metrics))
	}

	fn app(
		state: Arc<StatusRegistry>,
		routes: Router<Arc<StatusRegistry>>,
	) -> Router {
		routes
			.layer(middleware::from_fn_with_state(
				Arc::clone(&state),
				recover_panics,
			))
			.with_state(state)
	}

	/// The router served by [`Self::serve`].
	#[must_use]
	pub fn router(&self) -> Router {
		Self::app(Arc::clone(&self.registry), Self::routes())
	}

	/// Serve until `cancel` fires, then give in flight requests up to
	/// [`SHUTDOWN_TIMEOUT`] to finish.
	pub async fn serve(
		self,
		cancel: CancellationToken,
	) -> Result<(), HostError> {
		let app = self.router();

		let builder = axum::Server::try_bind(&self.addr)
			.map_err(|source| HostError::Bind { addr: self.addr, source })?;
		info!("HostServer listening on {}", self.addr);

		let graceful = cancel.clone();
		let server = builder
			.serve(app.into_make_service())
			.with_graceful_shutdown(async move { graceful.cancelled().await });

		tokio::select! {
			result = server => result.map_err(HostError::Serve),
			() = async {
				cancel.cancelled().await;
				tokio::time::sleep(SHUTDOWN_TIMEOUT).await;
			} => {
				warn!(
					"HostServer did not shut down within {SHUTDOWN_TIMEOUT:?}"
				);
				Ok(())
			}
		}
	}

	/// Liveness route handler.
	#[allow(clippy::unused_async)]
	async fn live() -> impl IntoResponse {
		(StatusCode::OK, "Service is healthy")
	}

	/// Readiness route handler.
	#[allow(clippy::unused_async)]
	async fn ready() -> impl IntoResponse {
		(StatusCode::OK, "Service is ready")
	}

	/// Metrics route handler.
	#[allow(clippy::unused_async)]
	async fn metrics(
		State(registry): State<Arc<StatusRegistry>>,
	) -> impl IntoResponse {
		match registry.render() {
			Ok(metrics) => (StatusCode::OK, metrics),
			Err(e) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				format!("Failed to get metrics: {e}"),
			),
		}
	}
}

/// Answer a panicking handler with a 500 instead of dropping the
/// connection, and count the panic.
async fn recover_panics(
	State(registry): State<Arc<StatusRegistry>>,
	request: Request<Body>,
	next: Next<Body>,
) -> Response {
	let path = request.uri().path().to_string();
	match AssertUnwindSafe(next.run(request)).catch_unwind().await {
		Ok(response) => response,
		Err(_) => {
			registry.record_panic();
			error!(path = %path, "panic while handling request");
			(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
				.into_response()
		}
	}
}

#[cfg(test)]
mod test {
	use std::collections::HashMap;

	use axum::http::Request;
	use ipr_metrics::{
		prometheus::{
			self,
			core::Desc,
			proto::{Metric, MetricFamily},
		},
		StatusCode as ServiceStatus, StatusCodeMetric,
	};
	use tower::ServiceExt;

	use super::*;

	async fn explode() -> &'static str {
		panic!("handler exploded")
	}

	fn server() -> HostServer {
		HostServer::new(
			"127.0.0.1:0".parse().unwrap(),
			Arc::new(StatusRegistry::new().unwrap()),
		)
	}

	async fn get(app: Router, uri: &str) -> (StatusCode, String) {
		let response = app
			.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
			.await
			.unwrap();
		let status = response.status();
		let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
		(status, String::from_utf8(body.to_vec()).unwrap())
	}

	#[tokio::test]
	async fn probes() {
		let server = server();

		assert_eq!(
			get(server.router(), LIVE).await,
			(StatusCode::OK, "Service is healthy".to_string())
		);
		assert_eq!(
			get(server.router(), READY).await,
			(StatusCode::OK, "Service is ready".to_string())
		);
		assert_eq!(
			get(server.router(), "/nope").await.0,
			StatusCode::NOT_FOUND
		);
	}

	#[tokio::test]
	async fn exposes_status_metrics() {
		let server = server();
		server
			.registry
			.publish(
				StatusCodeMetric::new(ServiceStatus::SgxResetNeeded)
					.with_http_status_code(404),
			)
			.unwrap();

		let (status, body) = get(server.router(), METRICS).await;

		assert_eq!(status, StatusCode::OK);
		assert!(
			body.contains(
				"service_status_code{http_status_code=\"404\",intel_error_code=\"\"} 3"
			),
			"{body}"
		);
		assert!(body.contains("application_panics_total 0"), "{body}");
	}

	/// Yields a metric family without a name, which the text encoder
	/// refuses.
	struct NamelessFamily(Desc);

	impl prometheus::core::Collector for NamelessFamily {
		fn desc(&self) -> Vec<&Desc> {
			vec![&self.0]
		}

		fn collect(&self) -> Vec<MetricFamily> {
			let mut family = MetricFamily::default();
			family.mut_metric().push(Metric::default());
			vec![family]
		}
	}

	#[tokio::test]
	async fn metrics_encoding_failure_answers_500() {
		let server = server();
		let desc = Desc::new(
			"nameless".to_string(),
			"family without a name".to_string(),
			vec![],
			HashMap::new(),
		)
		.unwrap();
		server
			.registry
			.registry()
			.register(Box::new(NamelessFamily(desc)))
			.unwrap();

		let (status, body) = get(server.router(), METRICS).await;

		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert!(body.starts_with("Failed to get metrics: "), "{body}");
		assert!(body.contains("MetricFamily has no name"), "{body}");
	}

	#[tokio::test]
	async fn panicking_handler_answers_500_and_is_counted() {
		let server = server();
		let routes =
			HostServer::routes().route("/panic", axum::routing::get(explode));
		let app = HostServer::app(Arc::clone(&server.registry), routes);

		let (status, body) = get(app.clone(), "/panic").await;
		assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
		assert_eq!(body, "Internal Server Error");
		assert_eq!(server.registry.panic_count(), 1);

		// the router keeps serving
		assert_eq!(get(app, LIVE).await.0, StatusCode::OK);
		let (_, metrics) = get(server.router(), METRICS).await;
		assert!(metrics.contains("application_panics_total 1"), "{metrics}");
	}

	#[tokio::test]
	async fn serve_fails_when_the_port_is_taken() {
		let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let addr = taken.local_addr().unwrap();
		let server =
			HostServer::new(addr, Arc::new(StatusRegistry::new().unwrap()));

		let err = server.serve(CancellationToken::new()).await.unwrap_err();

		assert!(matches!(err, HostError::Bind { addr: a, .. } if a == addr));
	}

	#[tokio::test]
	async fn serve_returns_once_cancelled() {
		let cancel = CancellationToken::new();
		let handle = tokio::spawn(server().serve(cancel.clone()));

		tokio::time::sleep(Duration::from_millis(50)).await;
		cancel.cancel();

		let result =
			tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap();
		result.unwrap().unwrap();
	}
}
