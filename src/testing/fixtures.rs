//! # 测试 fixtures

use reqwest::Client;
use tokio::net::TcpListener;

use crate::config::{GatewayConfig, UpstreamConfig, WakeConfig};
use crate::proxy::build_upstream_client;

/// 毫秒级的唤醒配置，让真实网络测试在一秒内结束
pub fn fast_wake_config() -> WakeConfig {
    WakeConfig {
        max_wait_ms: 600,
        max_wait_cap_ms: 2_000,
        initial_backoff_ms: 50,
        max_backoff_ms: 200,
        min_probe_timeout_ms: 100,
        max_probe_timeout_ms: 500,
        quick_probe_timeout_ms: 300,
        prewarm_on_startup: false,
        ..WakeConfig::default()
    }
}

/// 指向给定上游的完整网关配置
pub fn gateway_config(base_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = Some(base_url.to_string());
    config.upstream.request_timeout_ms = 2_000;
    config.upstream.connect_timeout_ms = 500;
    config.wake = fast_wake_config();
    config
}

/// 与网关相同设置的上游客户端
pub fn upstream_client() -> Client {
    build_upstream_client(&UpstreamConfig::default()).expect("client builds")
}

/// 绑定后立即释放的本地端口，连接会被拒绝
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}
