//! Test helper utilities and common testing patterns

use std::time::Duration;

use coordinator_core::config::{AppConfig, RecoveryConfig, RouterConfig};
use tokio::time::sleep;

/// Test environment setup utilities
pub struct TestEnv;

impl TestEnv {
    /// Wait for a condition to be true with timeout
    pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            if condition().await {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }

        condition().await
    }
}

/// Recovery settings with millisecond-scale timings
pub fn fast_recovery_config() -> RecoveryConfig {
    RecoveryConfig {
        max_retry_attempts: 3,
        retry_delay_base_ms: 10,
        heartbeat_interval_seconds: 1,
        recovery_tick_ms: 20,
        shutdown_timeout_seconds: 1,
        ..RecoveryConfig::default()
    }
}

pub fn fast_router_config() -> RouterConfig {
    RouterConfig {
        process_interval_ms: 10,
        ..RouterConfig::default()
    }
}

/// Whole-server config for integration tests
pub fn test_app_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.recovery = fast_recovery_config();
    config.router = fast_router_config();
    config
}
