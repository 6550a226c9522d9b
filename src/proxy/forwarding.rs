//! # 请求转发器
//!
//! 单个入站请求的完整转发流程：
//! 解析上游目标 → 清洗入站头 → 发往上游（不跟随重定向）→ 清洗响应头并改写 Cookie。
//!
//! 上游"在睡眠"（网络层失败，或边缘层 502/503/504）时阻塞唤醒；唤醒成功后
//! 重试且仅重试一次，预算耗尽时返回类型化的"上游不可用"响应。
//! 任何传输层错误都在这里转换为 [`GatewayError`]，不会直接抵达浏览器。

use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::context::ForwardingContext;
use super::cookie;
use super::headers::{REQUEST_ID_HEADER, forwardable_request_headers, sanitize_response_headers};
use super::route_table::{RouteTable, UpstreamTarget};
use super::upstream_url::UpstreamOrigin;
use crate::config::UpstreamConfig;
use crate::error::GatewayError;
use crate::health::WakeCoordinator;
use crate::health::types::WAKE_TRIGGER_STATUSES;
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, linfo, lwarn};

/// 入站请求
#[derive(Debug, Clone)]
pub struct InboundRequest {
    /// HTTP 方法
    pub method: Method,
    /// 网关前缀之后的子路径段
    pub segments: Vec<String>,
    /// 原始查询串（不含 `?`）
    pub query: Option<String>,
    /// 入站请求头
    pub headers: HeaderMap,
    /// 完整缓冲的请求体；GET/HEAD 始终为空
    pub body: Bytes,
}

impl InboundRequest {
    /// 创建不带请求体的入站请求
    #[must_use]
    pub fn new(method: Method, segments: Vec<String>) -> Self {
        Self {
            method,
            segments,
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// 设置查询串
    #[must_use]
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    /// 设置请求头
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// 设置请求体；不携带请求体的方法忽略
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        if carries_body(&self.method) {
            self.body = body;
        }
        self
    }
}

/// 上游响应（含上游自身的 4xx/5xx 业务错误）
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    /// 上游状态码
    pub status: StatusCode,
    /// 清洗并改写 Cookie 后的响应头
    pub headers: HeaderMap,
    /// 已解压的响应体
    pub body: Bytes,
}

/// 转发结果：上游响应或网关自身产生的失败
#[derive(Debug)]
pub enum GatewayResponse {
    /// 上游响应，语义不变
    Relayed(RelayedResponse),
    /// 网关失败（不可达、唤醒耗尽、未配置等）
    Failed(GatewayError),
}

impl GatewayResponse {
    /// 最终发给浏览器的状态码
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Relayed(response) => response.status,
            Self::Failed(error) => error.to_http_response_parts().0,
        }
    }

    /// 是否来自上游
    #[must_use]
    pub const fn is_relayed(&self) -> bool {
        matches!(self, Self::Relayed(_))
    }
}

impl From<GatewayError> for GatewayResponse {
    fn from(error: GatewayError) -> Self {
        Self::Failed(error)
    }
}

impl IntoResponse for GatewayResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Relayed(relayed) => {
                let mut response = (relayed.status, relayed.body).into_response();
                *response.headers_mut() = relayed.headers;
                response
            }
            Self::Failed(error) => error.into_response(),
        }
    }
}

/// 请求转发器
#[derive(Debug)]
pub struct RequestForwarder {
    client: Client,
    origin: UpstreamOrigin,
    routes: RouteTable,
    wake: Arc<WakeCoordinator>,
    request_timeout: Duration,
}

impl RequestForwarder {
    /// 创建转发器
    #[must_use]
    pub fn new(
        client: Client,
        origin: UpstreamOrigin,
        routes: RouteTable,
        wake: Arc<WakeCoordinator>,
        upstream: &UpstreamConfig,
    ) -> Self {
        Self {
            client,
            origin,
            routes,
            wake,
            request_timeout: upstream.request_timeout(),
        }
    }

    /// 上游源
    #[must_use]
    pub const fn origin(&self) -> &UpstreamOrigin {
        &self.origin
    }

    /// 转发单个入站请求
    pub async fn forward(&self, request_id: &str, inbound: &InboundRequest) -> GatewayResponse {
        let target = self
            .routes
            .resolve(&self.origin, &inbound.segments, inbound.query.as_deref());
        let mut ctx = ForwardingContext::new(request_id, inbound.method.clone(), target.path.clone());
        // 唤醒预算从请求进入时开始计算，首次请求的耗时也计入
        let deadline = Instant::now() + self.wake.config().max_wait();
        let first_timeout = if self.wake.config().enabled {
            let wake = self.wake.config();
            self.request_timeout
                .min(wake.max_wait().max(wake.min_probe_timeout()))
        } else {
            self.request_timeout
        };

        linfo!(
            ctx.request_id,
            LogStage::RequestStart,
            LogComponent::Forwarder,
            "forward_start",
            "开始转发请求",
            method = %inbound.method,
            upstream_path = %target.path,
            rewritten = target.rewritten
        );

        let failure = match self.send(&mut ctx, &target, inbound, first_timeout).await {
            Ok(response) if !is_wake_trigger(response.status()) => {
                return self.relay(&ctx, response).await;
            }
            Ok(response) => {
                if !self.wake.config().enabled {
                    return self.relay(&ctx, response).await;
                }
                lwarn!(
                    ctx.request_id,
                    LogStage::ResponseFailure,
                    LogComponent::Forwarder,
                    "transient_status",
                    "上游边缘层返回瞬时错误，准备唤醒",
                    status = response.status().as_u16()
                );
                None
            }
            Err(e) => {
                lwarn!(
                    ctx.request_id,
                    LogStage::ResponseFailure,
                    LogComponent::Forwarder,
                    "upstream_unreachable",
                    "上游请求失败",
                    error = %e,
                    timeout = e.is_timeout(),
                    connect = e.is_connect()
                );
                if !self.wake.config().enabled {
                    return GatewayError::upstream_unreachable(format!(
                        "无法连接上游: {}",
                        self.origin.host()
                    ))
                    .into();
                }
                Some(e)
            }
        };

        let report = self.wake.wake_until(&ctx.request_id, deadline).await;
        if !report.is_awake() {
            lerror!(
                ctx.request_id,
                LogStage::ResponseFailure,
                LogComponent::Forwarder,
                "wake_exhausted",
                "唤醒失败，返回上游不可用",
                attempts = report.attempt_count(),
                elapsed_ms = report.elapsed_ms(),
                network_failure = failure.is_some()
            );
            return GatewayError::upstream_unavailable(
                format!(
                    "上游在 {} ms 内未就绪（{} 次探测）",
                    report.elapsed_ms(),
                    report.attempt_count()
                ),
                report.attempt_count(),
                report.elapsed_ms(),
                report.ended_unreachable(),
            )
            .into();
        }

        // 唤醒成功后仅重试一次，结果原样返回
        match self.send(&mut ctx, &target, inbound, self.request_timeout).await {
            Ok(response) => self.relay(&ctx, response).await,
            Err(e) => {
                lerror!(
                    ctx.request_id,
                    LogStage::ResponseFailure,
                    LogComponent::Forwarder,
                    "retry_failed",
                    "唤醒后重试仍失败",
                    error = %e
                );
                GatewayError::from_upstream(e, self.request_timeout).into()
            }
        }
    }

    async fn send(
        &self,
        ctx: &mut ForwardingContext,
        target: &UpstreamTarget,
        inbound: &InboundRequest,
        timeout: Duration,
    ) -> reqwest::Result<reqwest::Response> {
        let attempt = ctx.begin_attempt();

        let mut headers = forwardable_request_headers(&inbound.headers);
        if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
            headers.insert(REQUEST_ID_HEADER, value);
        }

        let mut request = self
            .client
            .request(inbound.method.clone(), &target.url)
            .headers(headers)
            .timeout(timeout);
        if carries_body(&inbound.method) && !inbound.body.is_empty() {
            request = request.body(inbound.body.clone());
        }

        linfo!(
            ctx.request_id,
            LogStage::UpstreamRequest,
            LogComponent::Forwarder,
            "upstream_request",
            "发送上游请求",
            url = %target.url,
            attempt = attempt,
            retry = ctx.is_retry(),
            timeout = ?timeout
        );

        request.send().await
    }

    async fn relay(&self, ctx: &ForwardingContext, response: reqwest::Response) -> GatewayResponse {
        let status = response.status();
        let mut headers = sanitize_response_headers(response.headers());
        let dropped = cookie::rewrite_all(response.headers(), &mut headers);
        if dropped > 0 {
            lwarn!(
                ctx.request_id,
                LogStage::Response,
                LogComponent::Cookie,
                "cookie_dropped",
                "部分 Set-Cookie 无法改写，已丢弃",
                dropped = dropped
            );
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                lerror!(
                    ctx.request_id,
                    LogStage::ResponseFailure,
                    LogComponent::Forwarder,
                    "read_body_failed",
                    "读取上游响应体失败",
                    error = %e
                );
                return GatewayError::from_upstream(e, self.request_timeout).into();
            }
        };

        linfo!(
            ctx.request_id,
            LogStage::Response,
            LogComponent::Forwarder,
            "forward_complete",
            "上游响应已转发",
            status = status.as_u16(),
            body_bytes = body.len(),
            attempts = ctx.attempt,
            duration_ms = ctx.elapsed_ms()
        );

        GatewayResponse::Relayed(RelayedResponse {
            status,
            headers,
            body,
        })
    }
}

/// 该方法是否携带请求体
#[must_use]
pub fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

fn is_wake_trigger(status: StatusCode) -> bool {
    WAKE_TRIGGER_STATUSES.contains(&status.as_u16())
}
