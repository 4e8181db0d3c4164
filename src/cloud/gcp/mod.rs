//! GCP compute backend: OAuth2 token management and an instance REST client.

pub mod auth;
pub mod compute;
pub mod jwt;
pub mod service;

pub use auth::{Credentials, TokenManager};
pub use compute::{ComputeClient, Instance, Operation, scale_for_status};
pub use service::GcpService;

/// Provider tag used in logs and error messages.
pub const PROVIDER: &str = "gcp";
