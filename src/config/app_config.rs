//! # 网关配置结构定义

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// 网关主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// 浏览器侧监听配置
    pub server: ServerConfig,
    /// 上游 API 配置
    pub upstream: UpstreamConfig,
    /// 唤醒与退避配置
    pub wake: WakeConfig,
    /// 路径改写表
    pub routes: RoutesConfig,
}

/// 监听配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 网关路径前缀
    pub prefix: String,
    /// 入站请求体上限（字节）
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            prefix: "/gateway".to_string(),
            max_body_bytes: 1024 * 1024, // 1MB
        }
    }
}

impl ServerConfig {
    /// 获取绑定地址
    pub fn bind_address(&self) -> std::io::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid address '{addr}': {e}"),
            )
        })
    }
}

/// 上游配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 上游基础地址，未设置时所有请求返回 500
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// 业务路径前缀
    pub api_prefix: String,
    /// 存活探测路径（不带业务前缀）
    pub liveness_path: String,
    /// 单次上游请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 建连超时（毫秒）
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_prefix: "/api".to_string(),
            liveness_path: "/health".to_string(),
            request_timeout_ms: 15_000,
            connect_timeout_ms: 10_000,
        }
    }
}

impl UpstreamConfig {
    /// 单次上游请求超时
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 建连超时
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// 唤醒配置
///
/// 免费托管的上游冷启动通常需要 30–60 秒，默认预算按此设定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    /// 转发失败时是否尝试唤醒
    pub enabled: bool,
    /// 默认总等待预算（毫秒）
    pub max_wait_ms: u64,
    /// 健康检查 `ms` 参数允许的最大预算（毫秒）
    pub max_wait_cap_ms: u64,
    /// 首次退避（毫秒）
    pub initial_backoff_ms: u64,
    /// 退避倍数
    pub backoff_multiplier: u32,
    /// 退避上限（毫秒）
    pub max_backoff_ms: u64,
    /// 单次探测超时下限（毫秒）
    pub min_probe_timeout_ms: u64,
    /// 单次探测超时上限（毫秒）
    pub max_probe_timeout_ms: u64,
    /// `wait=0` 快速探测的超时（毫秒）
    pub quick_probe_timeout_ms: u64,
    /// 并发的默认预算唤醒合并为同一个循环
    pub coalesce: bool,
    /// 启动时预热上游
    pub prewarm_on_startup: bool,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_wait_ms: 60_000,
            max_wait_cap_ms: 120_000,
            initial_backoff_ms: 1_000,
            backoff_multiplier: 2,
            max_backoff_ms: 8_000,
            min_probe_timeout_ms: 1_000,
            max_probe_timeout_ms: 15_000,
            quick_probe_timeout_ms: 5_000,
            coalesce: true,
            prewarm_on_startup: true,
        }
    }
}

impl WakeConfig {
    /// 默认总预算
    #[must_use]
    pub const fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    /// 将调用方请求的预算限制在允许范围内
    #[must_use]
    pub fn clamp_budget(&self, requested_ms: Option<u64>) -> Duration {
        requested_ms.map_or_else(
            || self.max_wait(),
            |ms| Duration::from_millis(ms.min(self.max_wait_cap_ms)),
        )
    }

    /// 首次退避
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// 退避上限
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// 单次探测超时下限
    #[must_use]
    pub const fn min_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.min_probe_timeout_ms)
    }

    /// 单次探测超时上限
    #[must_use]
    pub const fn max_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.max_probe_timeout_ms)
    }

    /// 快速探测超时
    #[must_use]
    pub const fn quick_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.quick_probe_timeout_ms)
    }
}

/// 路径改写规则：入站子路径精确匹配 `from` 时，上游路径替换为 `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRewrite {
    /// 入站子路径（不含网关前缀，不含首尾斜杠）
    pub from: String,
    /// 上游绝对路径
    pub to: String,
}

impl PathRewrite {
    /// 创建改写规则
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// 路由配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// 显式声明的改写规则
    pub rewrites: Vec<PathRewrite>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            rewrites: vec![
                PathRewrite::new("me", "/api/users/profile"),
                PathRewrite::new("login", "/api/users/login"),
            ],
        }
    }
}

impl GatewayConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be greater than 0".to_string());
        }
        if !self.server.prefix.starts_with('/') || self.server.prefix.len() < 2 {
            return Err(format!(
                "server.prefix must be a non-root absolute path, got '{}'",
                self.server.prefix
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err("server.max_body_bytes must be greater than 0".to_string());
        }
        if !self.upstream.liveness_path.starts_with('/') {
            return Err("upstream.liveness_path must start with '/'".to_string());
        }
        if self.upstream.request_timeout_ms == 0 {
            return Err("upstream.request_timeout_ms must be greater than 0".to_string());
        }

        let wake = &self.wake;
        if wake.min_probe_timeout_ms == 0 || wake.min_probe_timeout_ms > wake.max_probe_timeout_ms {
            return Err("wake probe timeouts must satisfy 0 < min <= max".to_string());
        }
        if wake.initial_backoff_ms == 0 || wake.initial_backoff_ms > wake.max_backoff_ms {
            return Err("wake backoff must satisfy 0 < initial <= max".to_string());
        }
        if wake.backoff_multiplier == 0 {
            return Err("wake.backoff_multiplier must be at least 1".to_string());
        }
        if wake.max_wait_ms > wake.max_wait_cap_ms {
            return Err("wake.max_wait_ms cannot exceed wake.max_wait_cap_ms".to_string());
        }

        for rule in &self.routes.rewrites {
            if rule.from.is_empty() || rule.from.starts_with('/') {
                return Err(format!("rewrite 'from' must be a relative subpath: '{}'", rule.from));
            }
            if !rule.to.starts_with('/') {
                return Err(format!("rewrite 'to' must be an absolute path: '{}'", rule.to));
            }
        }

        Ok(())
    }
}
