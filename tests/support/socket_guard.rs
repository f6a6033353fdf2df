//! Skips network tests in sandboxes that forbid binding loopback sockets.

use std::net::TcpListener;

use wiremock::MockServer;

/// Starts a wiremock server, or returns `None` (and logs why) when the
/// environment cannot bind a local socket.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    match TcpListener::bind("127.0.0.1:0") {
        Ok(listener) => drop(listener),
        Err(error) => {
            eprintln!("skipping: cannot bind loopback socket ({error})");
            return None;
        }
    }
    Some(MockServer::start().await)
}
