//! # 错误类型定义

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// 标记网关自身产生的失败响应，便于客户端区分上游业务错误
pub const GATEWAY_ERROR_HEADER: &str = "x-gateway-error";

/// 网关主要错误类型
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游未配置或配置无效
    #[error("上游未配置: {message}")]
    UpstreamNotConfigured { message: String },

    /// 网络通信错误
    #[error("网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 连接超时错误
    #[error("连接超时: {message}")]
    ConnectionTimeout {
        message: String,
        timeout_ms: u64,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游不可达，且未尝试唤醒或唤醒后重试仍失败
    #[error("上游不可达: {message}")]
    UpstreamUnreachable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 唤醒预算耗尽，上游仍未就绪
    #[error("上游不可用: {message}")]
    UpstreamUnavailable {
        message: String,
        attempts: u32,
        elapsed_ms: u64,
        /// 最后一次探测是否超时/不可达（决定 503 或 504）
        timed_out: bool,
    },

    /// 请求体超过限制
    #[error("请求体过大: {message}")]
    PayloadTooLarge { message: String, limit: usize },

    /// 网关前缀之外或没有子路径的请求
    #[error("未找到路由: {path}")]
    NotFound { path: String },

    /// 不支持的 HTTP 方法
    #[error("不支持的方法: {method}")]
    MethodNotAllowed { method: String },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO相关错误
    #[error("IO错误: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 附加上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<GatewayError>,
    },
}

impl GatewayError {
    /// 将错误转换为HTTP状态码和错误代码
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::UpstreamNotConfigured { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "UPSTREAM_NOT_CONFIGURED")
            }
            Self::Network { .. } => (StatusCode::BAD_GATEWAY, "NETWORK_ERROR"),
            Self::ConnectionTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "CONNECTION_TIMEOUT"),
            Self::UpstreamUnreachable { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNREACHABLE"),
            Self::UpstreamUnavailable { timed_out, .. } => {
                if *timed_out {
                    (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_UNAVAILABLE")
                } else {
                    (StatusCode::SERVICE_UNAVAILABLE, "UPSTREAM_UNAVAILABLE")
                }
            }
            Self::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::MethodNotAllowed { .. } => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::Serialization { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建上游未配置错误
    pub fn upstream_not_configured<T: Into<String>>(message: T) -> Self {
        Self::UpstreamNotConfigured {
            message: message.into(),
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的连接超时错误
    pub fn connection_timeout_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        timeout_ms: u64,
        source: E,
    ) -> Self {
        Self::ConnectionTimeout {
            message: message.into(),
            timeout_ms,
            source: Some(source.into()),
        }
    }

    /// 按传输层错误类型归类上游请求失败
    ///
    /// `timeout` 为该次请求配置的超时，记录在超时错误里
    pub fn from_upstream(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            Self::connection_timeout_with_source(
                format!("上游请求超过 {timeout_ms} ms 未响应"),
                timeout_ms,
                err,
            )
        } else if err.is_connect() {
            Self::UpstreamUnreachable {
                message: "无法连接上游".to_string(),
                source: Some(err.into()),
            }
        } else {
            Self::network_with_source("上游请求失败", err)
        }
    }

    /// 创建上游不可达错误
    pub fn upstream_unreachable<T: Into<String>>(message: T) -> Self {
        Self::UpstreamUnreachable {
            message: message.into(),
            source: None,
        }
    }

    /// 创建上游不可用（唤醒耗尽）错误
    pub fn upstream_unavailable<T: Into<String>>(
        message: T,
        attempts: u32,
        elapsed_ms: u64,
        timed_out: bool,
    ) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
            attempts,
            elapsed_ms,
            timed_out,
        }
    }

    /// 创建请求体过大错误
    pub fn payload_too_large(limit: usize) -> Self {
        Self::PayloadTooLarge {
            message: format!("请求体超过 {limit} 字节限制"),
            limit,
        }
    }

    /// 创建路由未找到错误
    pub fn not_found<T: Into<String>>(path: T) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// 创建方法不支持错误
    pub fn method_not_allowed<T: Into<String>>(method: T) -> Self {
        Self::MethodNotAllowed {
            method: method.into(),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// # 标准错误信息
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, code) = self.to_http_response_parts();
        let body = ErrorResponse {
            success: false,
            error: ErrorInfo {
                code,
                message: self.to_string(),
            },
            timestamp: Utc::now(),
        };

        let mut response = (status, axum::Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(GATEWAY_ERROR_HEADER, HeaderValue::from_static(code));
        response
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("配置文件解析失败", err)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            source: err.into(),
        }
    }
}

impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        Self::config_with_source(format!("无效的URL: {err}"), err)
    }
}
