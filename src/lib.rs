//! # cloudsaver-rs
//!
//! Cost-saving automation engine for reverse-proxy deployments: watch
//! per-service request traffic and power down the cloud compute instance
//! backing any service whose traffic falls below a threshold. "Turn the
//! lights off when the room is empty."
//!
//! The engine is power-down-only by design; restoring capacity is an
//! operator action.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use cloudsaver::{CloudSaver, Config};
//!
//! #[tokio::main]
//! async fn main() -> cloudsaver::Result<()> {
//!     let config = Config::from_file("cloudsaver.yaml").await?;
//!     let mut saver = CloudSaver::new(&config, "cloud-saver")?;
//!     saver.init()?;
//!
//!     let mut snapshots = saver.start();
//!     while let Some(_snapshot) = snapshots.recv().await {
//!         // hand the dynamic-configuration snapshot to the host
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod cloud;
pub mod config;
pub mod metrics;
pub mod proxy;
pub mod saver;
pub mod utils;

// Re-export main types
pub use cloud::{CloudService, CloudServiceConfig, CredentialsConfig};
pub use config::{Config, RouterFilter};
pub use metrics::{MetricsCollector, ServiceRate};
pub use saver::{CloudSaver, ConfigSnapshot};
pub use utils::error::{Result, SaverError};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
