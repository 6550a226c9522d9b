//! # 网关入口处理器
//!
//! 浏览器侧的薄入口：通用路径转发、健康检查、登录与个人资料简写路由。

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use std::time::Instant;
use uuid::Uuid;

use super::state::AppState;
use crate::error::{GatewayError, Result};
use crate::health::{HealthBody, WakeReport};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::headers::REQUEST_ID_HEADER;
use crate::proxy::{GatewayResponse, InboundRequest, split_subpath};
use crate::{ldebug, linfo, lwarn};

/// 允许转发的方法（`OPTIONS` 在本地应答）
const ALLOWED_METHODS: &[Method] = &[
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// 健康检查查询参数
#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
    /// `0` 只探测一次；`1` 或缺省时完整唤醒
    pub wait: Option<String>,
    /// 自定义唤醒预算（毫秒），受上限约束
    pub ms: Option<String>,
}

impl HealthQuery {
    /// 是否执行完整唤醒
    #[must_use]
    pub fn wants_wait(&self) -> bool {
        !matches!(self.wait.as_deref().map(str::trim), Some("0" | "false"))
    }

    /// 解析预算参数，无效值按缺省处理
    #[must_use]
    pub fn budget_ms(&self) -> Option<u64> {
        self.ms.as_deref().and_then(|ms| ms.trim().parse().ok())
    }
}

/// 通用路径转发：`ANY {prefix}/{*path}`
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let segments = split_subpath(strip_prefix(uri.path(), state.prefix()));
    handle_forward(&state, method, segments, uri.query(), headers, body).await
}

/// 登录简写：`POST {prefix}/login`
pub async fn login(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    handle_forward(&state, Method::POST, vec!["login".to_string()], uri.query(), headers, body).await
}

/// 个人资料简写：`GET {prefix}/me`
pub async fn me(State(state): State<AppState>, uri: Uri, headers: HeaderMap) -> Response {
    handle_forward(&state, Method::GET, vec!["me".to_string()], uri.query(), headers, Body::empty()).await
}

/// 未匹配任何网关路由（含不带子路径的裸前缀）
pub async fn not_found(uri: Uri) -> Response {
    with_request_id(GatewayError::not_found(uri.path()).into_response(), &new_request_id())
}

/// 健康检查：`GET {prefix}/health?wait={0|1}&ms=<budget>`
pub async fn health(State(state): State<AppState>, Query(query): Query<HealthQuery>) -> Response {
    let request_id = new_request_id();
    let response = match run_health(&state, &request_id, &query).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    };
    with_request_id(response, &request_id)
}

async fn run_health(state: &AppState, request_id: &str, query: &HealthQuery) -> Result<Response> {
    let wake = state.ready()?.wake();

    let (status, report) = if query.wants_wait() {
        let budget = wake.config().clamp_budget(query.budget_ms());
        let report = wake.wake_with_budget(request_id, budget).await;
        let status = if report.is_awake() {
            StatusCode::OK
        } else if report.ended_unreachable() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, report)
    } else {
        let started = Instant::now();
        let outcome = wake.probe_once(wake.config().quick_probe_timeout()).await;
        let report = WakeReport::single(outcome, started.elapsed());
        let status = if report.is_awake() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, report)
    };

    linfo!(
        request_id,
        LogStage::HealthCheck,
        LogComponent::Handler,
        "health_checked",
        "健康检查完成",
        wait = query.wants_wait(),
        status = status.as_u16(),
        state = %report.state,
        attempts = report.attempt_count(),
        elapsed_ms = report.elapsed_ms()
    );

    let mut response = (status, Json(HealthBody::from(&report))).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

async fn handle_forward(
    state: &AppState,
    method: Method,
    segments: Vec<String>,
    query: Option<&str>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let request_id = new_request_id();
    ldebug!(
        request_id,
        LogStage::RequestStart,
        LogComponent::Handler,
        "request_received",
        "收到入站请求",
        method = %method,
        subpath = %segments.join("/")
    );

    let response = match forward_inbound(state, &request_id, method, segments, query, headers, body).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            lwarn!(
                request_id,
                LogStage::ResponseFailure,
                LogComponent::Handler,
                "request_rejected",
                "请求未转发",
                error = %e
            );
            e.into_response()
        }
    };
    with_request_id(response, &request_id)
}

async fn forward_inbound(
    state: &AppState,
    request_id: &str,
    method: Method,
    segments: Vec<String>,
    query: Option<&str>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response> {
    if method == Method::OPTIONS {
        return Ok(preflight());
    }
    if !ALLOWED_METHODS.contains(&method) {
        return Err(GatewayError::method_not_allowed(method.as_str()));
    }

    let ready = state.ready()?;
    let body = read_body(&method, body, state.config().server.max_body_bytes).await?;

    let inbound = InboundRequest::new(method, segments)
        .with_query(query.map(str::to_string))
        .with_headers(headers)
        .with_body(body);

    let response: GatewayResponse = ready.forwarder().forward(request_id, &inbound).await;
    Ok(response.into_response())
}

/// 读取完整请求体；GET/HEAD 不读取
async fn read_body(method: &Method, body: Body, limit: usize) -> Result<Bytes> {
    if !crate::proxy::forwarding::carries_body(method) {
        return Ok(Bytes::new());
    }
    axum::body::to_bytes(body, limit)
        .await
        .map_err(|_| GatewayError::payload_too_large(limit))
}

/// 本地应答的预检请求
fn preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// 去掉网关前缀，得到原始子路径（不做百分号解码）
#[must_use]
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    path.strip_prefix(prefix)
        .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        .unwrap_or(path)
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
