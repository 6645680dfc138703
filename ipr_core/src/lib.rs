//! Core of the platform registration service: decides, on every cycle,
//! whether the SGX platform has to be registered with Intel or only has to
//! fetch its PCK certificate, and publishes the outcome as a status code.
#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::unwrap_used)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod checker;
pub mod error;
pub mod intel;
pub mod service;

pub use checker::{DefaultRegistrationChecker, RegistrationChecker};
pub use error::{CheckFailure, RegistrationError, ServiceError};
pub use intel::{IntelEndpoints, IntelService};
pub use service::RegistrationService;
