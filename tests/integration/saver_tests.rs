//! End-to-end tick tests: stubbed metrics and proxy endpoints, an injected
//! mock cloud service, and a saver running on a shortened window.

use cloudsaver::cloud::mock::MockService;
use cloudsaver::{CloudSaver, CloudService, CloudServiceConfig, Config, RouterFilter};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn test_config(server: &MockServer, resources: &[(&str, i32)]) -> Config {
    Config {
        traffic_threshold: 1.0,
        window_size: "100ms".to_string(),
        metrics_url: format!("{}/metrics", server.uri()),
        api_url: format!("{}/api", server.uri()),
        cloud_config: CloudServiceConfig {
            service_type: "mock".to_string(),
            initial_scale: resources
                .iter()
                .map(|(name, scale)| (name.to_string(), *scale))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        },
        test_mode: true,
        ..Default::default()
    }
}

async fn mount_metrics(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn mount_service_detail(server: &MockServer, service: &str, used_by: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/api/http/services/{service}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": service,
            "status": "enabled",
            "usedBy": used_by,
        })))
        .mount(server)
        .await;
}

/// Build a saver around an observable mock cloud service.
fn saver_with_mock(config: &Config) -> (CloudSaver, Arc<MockService>) {
    let mock = Arc::new(MockService::new(&config.cloud_config).unwrap());
    let saver =
        CloudSaver::with_cloud_service(config, "cloud-saver", mock.clone() as Arc<dyn CloudService>)
            .unwrap();
    (saver, mock)
}

#[tokio::test]
async fn test_low_traffic_service_is_scaled_down() {
    let server = MockServer::start().await;
    mount_metrics(
        &server,
        "traefik_service_requests_total{service=\"whoami@docker\"} 0\n",
    )
    .await;
    mount_service_detail(&server, "whoami@docker", &["whoami-router@docker"]).await;

    let config = test_config(&server, &[("whoami", 1)]);
    let (mut saver, mock) = saver_with_mock(&config);
    saver.init().unwrap();

    let mut snapshots = saver.start();
    timeout(RECV_TIMEOUT, snapshots.recv())
        .await
        .expect("tick within deadline")
        .expect("worker alive");

    let cancel = CancellationToken::new();
    assert_eq!(mock.current_scale(&cancel, "whoami").await.unwrap(), 0);
}

#[tokio::test]
async fn test_busy_service_is_left_alone() {
    let server = MockServer::start().await;
    // First-run rate equals the cumulative total, well above the threshold.
    mount_metrics(
        &server,
        "traefik_service_requests_total{service=\"whoami@docker\"} 500\n",
    )
    .await;
    mount_service_detail(&server, "whoami@docker", &["whoami-router@docker"]).await;

    let config = test_config(&server, &[("whoami", 1)]);
    let (mut saver, mock) = saver_with_mock(&config);
    saver.init().unwrap();

    let mut snapshots = saver.start();
    timeout(RECV_TIMEOUT, snapshots.recv())
        .await
        .expect("tick within deadline")
        .expect("worker alive");

    let cancel = CancellationToken::new();
    assert_eq!(mock.current_scale(&cancel, "whoami").await.unwrap(), 1);
}

#[tokio::test]
async fn test_router_filter_excludes_unlisted_routers() {
    let server = MockServer::start().await;
    mount_metrics(
        &server,
        "traefik_service_requests_total{service=\"whoami@docker\"} 0\n",
    )
    .await;
    mount_service_detail(&server, "whoami@docker", &["whoami-router@docker"]).await;

    let mut config = test_config(&server, &[("whoami", 1)]);
    config.router_filter = Some(RouterFilter {
        names: vec!["other-router@docker".to_string()],
    });
    let (mut saver, mock) = saver_with_mock(&config);
    saver.init().unwrap();

    let mut snapshots = saver.start();
    for _ in 0..2 {
        timeout(RECV_TIMEOUT, snapshots.recv())
            .await
            .expect("tick within deadline")
            .expect("worker alive");
    }

    let cancel = CancellationToken::new();
    assert_eq!(mock.current_scale(&cancel, "whoami").await.unwrap(), 1);
}

#[tokio::test]
async fn test_unrouted_service_is_skipped() {
    let server = MockServer::start().await;
    mount_metrics(
        &server,
        "traefik_service_requests_total{service=\"whoami@docker\"} 0\n",
    )
    .await;
    mount_service_detail(&server, "whoami@docker", &[]).await;

    let config = test_config(&server, &[("whoami", 1)]);
    let (mut saver, mock) = saver_with_mock(&config);
    saver.init().unwrap();

    let mut snapshots = saver.start();
    timeout(RECV_TIMEOUT, snapshots.recv())
        .await
        .expect("tick within deadline")
        .expect("worker alive");

    let cancel = CancellationToken::new();
    assert_eq!(mock.current_scale(&cancel, "whoami").await.unwrap(), 1);
}

#[tokio::test]
async fn test_one_failing_service_does_not_abort_the_tick() {
    let server = MockServer::start().await;
    // "ghost" is unknown to the cloud service, so its scale-down fails.
    mount_metrics(
        &server,
        concat!(
            "traefik_service_requests_total{service=\"ghost@docker\"} 0\n",
            "traefik_service_requests_total{service=\"whoami@docker\"} 0\n",
        ),
    )
    .await;
    mount_service_detail(&server, "ghost@docker", &["ghost-router@docker"]).await;
    mount_service_detail(&server, "whoami@docker", &["whoami-router@docker"]).await;

    let config = test_config(&server, &[("whoami", 1)]);
    let (mut saver, mock) = saver_with_mock(&config);
    saver.init().unwrap();

    let mut snapshots = saver.start();
    timeout(RECV_TIMEOUT, snapshots.recv())
        .await
        .expect("tick within deadline")
        .expect("worker alive");

    let cancel = CancellationToken::new();
    assert_eq!(mock.current_scale(&cancel, "whoami").await.unwrap(), 0);
}

#[tokio::test]
async fn test_stop_shuts_the_worker_down() {
    let server = MockServer::start().await;
    mount_metrics(
        &server,
        "traefik_service_requests_total{service=\"whoami@docker\"} 500\n",
    )
    .await;
    mount_service_detail(&server, "whoami@docker", &["whoami-router@docker"]).await;

    let config = test_config(&server, &[("whoami", 1)]);
    let (mut saver, _mock) = saver_with_mock(&config);
    saver.init().unwrap();

    let mut snapshots = saver.start();
    timeout(RECV_TIMEOUT, snapshots.recv())
        .await
        .expect("tick within deadline")
        .expect("worker alive");

    saver.stop();
    // The worker drops its sender once cancelled, closing the channel.
    let closed = timeout(RECV_TIMEOUT, snapshots.recv()).await.unwrap();
    assert!(closed.is_none());
}

#[test]
fn test_init_rejects_short_windows_outside_test_mode() {
    let config = Config {
        window_size: "5s".to_string(),
        cloud_config: CloudServiceConfig {
            service_type: "mock".to_string(),
            initial_scale: HashMap::from([("whoami".to_string(), 1)]),
            ..Default::default()
        },
        ..Default::default()
    };
    assert!(CloudSaver::new(&config, "cloud-saver").is_err());
}
