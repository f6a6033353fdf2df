//! Integration tests for connectivity monitoring and probing.

mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use course_offline_core::{
    Connectivity, ConnectivityProbe, HttpProbe, HttpTimeouts, NetworkMonitor, NetworkNotice,
    StaticProbe,
};
use support::TEST_TIMEOUT;
use support::socket_guard::start_mock_server_or_skip;
use url::Url;
use wiremock::matchers::method;
use wiremock::{Mock, ResponseTemplate};

/// Probe whose answer the test flips.
#[derive(Default)]
struct SwitchProbe {
    online: AtomicBool,
}

#[async_trait]
impl ConnectivityProbe for SwitchProbe {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_initial_state_from_probe() {
    let monitor = NetworkMonitor::from_probe(&StaticProbe(false)).await;
    assert_eq!(monitor.current(), Connectivity::Offline);
}

#[tokio::test]
async fn test_polling_reports_transitions() {
    let probe = Arc::new(SwitchProbe::default());
    let monitor = NetworkMonitor::new(Connectivity::Offline);
    let mut notices = monitor.notices();
    let task = monitor.spawn_polling(probe.clone(), Duration::from_millis(5));

    probe.online.store(true, Ordering::SeqCst);
    let notice = tokio::time::timeout(TEST_TIMEOUT, notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice, NetworkNotice::Reconnected);

    probe.online.store(false, Ordering::SeqCst);
    let notice = tokio::time::timeout(TEST_TIMEOUT, notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(notice, NetworkNotice::WentOffline);
    assert_eq!(monitor.current(), Connectivity::Offline);

    task.abort();
}

#[tokio::test]
async fn test_http_probe_treats_any_status_as_online() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let probe = HttpProbe::new(
        Url::parse(&format!("{}/health", mock_server.uri())).unwrap(),
        HttpTimeouts::default(),
    )
    .unwrap();

    assert!(probe.is_online().await);
}
