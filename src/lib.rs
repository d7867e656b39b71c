//! Underwriting Engine Client Library
//!
//! Builds underwriting requests from rating requests, posts them to the
//! managed underwriting service, and pairs request and response into an
//! audit log line.
//!
//! # Modules
//!
//! - `config`: Configuration and environment selection.
//! - `engine`: Scoped acquisition and release of the underwriting service.
//! - `errors`: Error handling types.
//! - `insure_service`: Service lifecycle trait and its HTTP implementation.
//! - `models`: Rating request, underwriting payload and log line models.
//! - `underwriting`: Request building, dispatch and log assembly.

pub mod config;
pub mod engine;
pub mod errors;
pub mod insure_service;
pub mod models;
pub mod underwriting;

pub use config::{Config, Environment};
pub use engine::{
    acquire_underwriting_engine, get_underwriting_engine, with_underwriting_engine,
    UnderwritingEngineGuard,
};
pub use errors::UnderwritingError;
pub use insure_service::{EndpointResponse, HttpInsureService, InsureService};
pub use models::{RatingRequest, Tenant, UnderwritingLogLine, UnderwritingRequest};
pub use underwriting::PolicyUnderwriting;
