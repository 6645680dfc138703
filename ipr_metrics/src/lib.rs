//! Status taxonomy of the registration service and the prometheus metrics
//! it is published through.
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::unwrap_used)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

/// service status publisher
mod registry;
pub use registry::{
	StatusPublisher, StatusRegistry, ValidationError, APPLICATION_PANICS_METRIC,
	HTTP_STATUS_CODE_LABEL, INTEL_ERROR_CODE_LABEL, SERVICE_STATUS_CODE_METRIC,
};

pub mod status;
pub use status::{StatusCode, StatusCodeDetails, StatusCodeMetric};

/// re-export third party
pub use prometheus;
