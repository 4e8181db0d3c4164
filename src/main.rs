//! cloudsaver demo binary
//!
//! Runs the saver against a YAML configuration (path as the first
//! argument) or, with no argument, a built-in mock-provider demo
//! configuration. Stops cleanly on Ctrl-C.

use cloudsaver::{CloudSaver, CloudServiceConfig, Config};
use std::collections::HashMap;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> cloudsaver::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path).await?,
        None => demo_config(),
    };

    info!("configuration: {config:#?}");

    let mut saver = CloudSaver::new(&config, "cloud-saver")?;
    saver.init()?;
    let mut snapshots = saver.start();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                saver.stop();
                return Ok(());
            }
            snapshot = snapshots.recv() => {
                match snapshot {
                    Some(snapshot) => info!("tick produced configuration snapshot: {snapshot:?}"),
                    None => return Ok(()),
                }
            }
        }
    }
}

/// Mock-provider configuration mirroring the plugin defaults, for running
/// against a local proxy without cloud credentials.
fn demo_config() -> Config {
    Config {
        cloud_config: CloudServiceConfig {
            service_type: "mock".to_string(),
            initial_scale: HashMap::from([("whoami".to_string(), 1)]),
            ..Default::default()
        },
        ..Default::default()
    }
}
