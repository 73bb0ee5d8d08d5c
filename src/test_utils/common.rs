use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio::time::Instant;

use crate::ElectionConfig;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
}

pub fn test_config(resource: &str) -> ElectionConfig {
    ElectionConfig {
        resource: resource.to_string(),
        write_timeout_ms: 500,
        ..Default::default()
    }
}

/// Waits for the next message or panics after one second.
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("channel closed")
}

/// Asserts nothing arrives within a short window.
pub async fn assert_silent<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>) {
    if let Ok(Some(msg)) = timeout(Duration::from_millis(50), rx.recv()).await {
        panic!("unexpected message: {:?}", msg);
    }
}

/// Polls `check` until it holds, giving up after one second.
pub async fn wait_until(check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(1);
    while !check() {
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    true
}
