//! # 日志配置模块
//!
//! 提供统一的日志初始化，以及带请求ID、阶段、组件信息的结构化日志宏

use std::env;
use std::fmt;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 请求处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 进程启动
    Startup,
    /// 进程关闭
    Shutdown,
    /// 配置加载
    Configuration,
    /// 收到入站请求
    RequestStart,
    /// 发往上游
    UpstreamRequest,
    /// 上游响应已返回
    Response,
    /// 上游响应失败
    ResponseFailure,
    /// 存活探测
    HealthCheck,
    /// 唤醒循环
    Wake,
}

impl LogStage {
    /// 日志中使用的稳定名称
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Configuration => "configuration",
            Self::RequestStart => "request_start",
            Self::UpstreamRequest => "upstream_request",
            Self::Response => "response",
            Self::ResponseFailure => "response_failure",
            Self::HealthCheck => "health_check",
            Self::Wake => "wake",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 主程序
    Main,
    /// 服务器搭建
    ServerSetup,
    /// 配置管理
    Config,
    /// 入口路由
    Handler,
    /// 请求转发器
    Forwarder,
    /// Cookie 改写
    Cookie,
    /// 存活探测器
    HealthChecker,
    /// 唤醒协调器
    WakeCoordinator,
}

impl LogComponent {
    /// 日志中使用的稳定名称
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::ServerSetup => "server_setup",
            Self::Config => "config",
            Self::Handler => "handler",
            Self::Forwarder => "forwarder",
            Self::Cookie => "cookie",
            Self::HealthChecker => "health_checker",
            Self::WakeCoordinator => "wake_coordinator",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 INFO 日志
///
/// 用法：`linfo!(request_id, LogStage::X, LogComponent::Y, "operation", "message", key = value)`
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($field:tt)+) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $message
        )
    };
}

/// 结构化 WARN 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($field:tt)+) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $message
        )
    };
}

/// 结构化 DEBUG 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($field:tt)+) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $message
        )
    };
}

/// 结构化 ERROR 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr, $($field:tt)+) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            $($field)+,
            "{}",
            $message
        )
    };
}

/// 初始化日志系统
///
/// `RUST_LOG` 存在时优先使用，否则按传入级别构造默认过滤器
pub fn init_optimized_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");

    // 默认配置：本 crate 详细日志，第三方 HTTP 栈只保留告警
    let default_filter =
        format!("{level},bff_gateway=debug,tower_http=info,hyper=warn,reqwest=warn");

    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    let initialized = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if initialized.is_ok() {
        tracing::info!("📋 日志系统初始化完成 (level={level})");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_component_names() {
        assert_eq!(LogStage::Wake.to_string(), "wake");
        assert_eq!(LogStage::ResponseFailure.as_str(), "response_failure");
        assert_eq!(LogComponent::WakeCoordinator.to_string(), "wake_coordinator");
    }

    #[test]
    fn test_macros_expand_with_and_without_fields() {
        let request_id = "req-1";
        linfo!(request_id, LogStage::Startup, LogComponent::Main, "op", "plain");
        lwarn!(
            request_id,
            LogStage::Wake,
            LogComponent::WakeCoordinator,
            "op",
            "with fields",
            attempt = 3_u32,
            elapsed_ms = 12_u64
        );
        ldebug!(request_id, LogStage::HealthCheck, LogComponent::HealthChecker, "op", "debug");
        lerror!(request_id, LogStage::ResponseFailure, LogComponent::Forwarder, "op", "error", status = 502_u16);
    }
}
