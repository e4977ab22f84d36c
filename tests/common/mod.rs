//! Integration test common infrastructure.
//!
//! Spawns the relay binary against in-process fakes of the chat platform
//! bridge and the event intake API, both served with axum on ephemeral
//! ports.

pub mod bridge;
pub mod intake;
pub mod relay;

#[allow(unused_imports)]
pub use bridge::FakeBridge;
#[allow(unused_imports)]
pub use intake::FakeIntake;
#[allow(unused_imports)]
pub use relay::TestRelay;

use std::time::Duration;

/// Reserve a free local port.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    listener.local_addr().expect("local addr").port()
}

/// Poll `check` until it returns true or `timeout` elapses.
#[allow(dead_code)]
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
