//! # 集成测试公共工具

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bff_gateway::config::{GatewayConfig, WakeConfig};
use bff_gateway::{AppState, create_router};
use bytes::Bytes;
use tokio::net::TcpListener;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// 测试用的毫秒级唤醒参数
pub fn fast_wake() -> WakeConfig {
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

/// 指向给定上游的网关配置
pub fn test_config(base_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.upstream.base_url = Some(base_url.to_string());
    config.upstream.request_timeout_ms = 2_000;
    config.upstream.connect_timeout_ms = 500;
    config.wake = fast_wake();
    config
}

/// 构建网关路由
pub fn gateway(config: GatewayConfig) -> Router {
    create_router(AppState::from_config(config))
}

/// 绑定后立即释放的端口：连接会被拒绝
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// 网关响应快照
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    /// 按 JSON 解析响应体
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// 通过 `oneshot` 驱动路由
pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

/// 构造请求
pub fn request(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder().method(method).uri(uri).body(body).unwrap()
}

/// Mock 上游
pub struct MockUpstream {
    server: MockServer,
}

impl MockUpstream {
    /// 启动 Mock 上游
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// 上游地址
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// 底层 Mock 服务器
    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// 存活路径按给定状态应答
    pub async fn liveness(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// 添加 Mock 响应
    pub async fn respond(&self, http_method: &str, upstream_path: &str, template: ResponseTemplate) {
        Mock::given(method(http_method))
            .and(path(upstream_path))
            .respond_with(template)
            .mount(&self.server)
            .await;
    }

    /// 上游收到的请求数
    pub async fn received(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }
}
