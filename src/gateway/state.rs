//! # 网关应用状态
//!
//! 启动时由不可变配置一次性构建，之后只读共享。上游地址缺失或无效时
//! 进入 `Misconfigured`，所有请求返回固定的 500 响应而不是让进程退出。

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::health::{HttpProber, ProbeOutcome, WakeCoordinator};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::{RequestForwarder, RouteTable, UpstreamOrigin, build_upstream_client};
use crate::{lerror, linfo};

/// 上游就绪的后端组件
#[derive(Debug)]
pub struct ReadyBackend {
    forwarder: RequestForwarder,
    wake: Arc<WakeCoordinator>,
}

impl ReadyBackend {
    /// 请求转发器
    #[must_use]
    pub const fn forwarder(&self) -> &RequestForwarder {
        &self.forwarder
    }

    /// 唤醒协调器
    #[must_use]
    pub fn wake(&self) -> &WakeCoordinator {
        &self.wake
    }
}

/// 后端状态
#[derive(Debug)]
pub enum Backend {
    /// 上游已配置
    Ready(ReadyBackend),
    /// 上游未配置或配置无效
    Misconfigured(String),
}

#[derive(Debug)]
struct StateInner {
    config: GatewayConfig,
    backend: Backend,
}

/// 共享应用状态
#[derive(Debug, Clone)]
pub struct AppState {
    inner: Arc<StateInner>,
}

impl AppState {
    /// 从配置构建状态
    #[must_use]
    pub fn from_config(config: GatewayConfig) -> Self {
        let backend = match Self::build_backend(&config) {
            Ok(ready) => {
                linfo!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "upstream_configured",
                    "上游已配置",
                    upstream = %ready.forwarder.origin()
                );
                Backend::Ready(ready)
            }
            Err(e) => {
                lerror!(
                    "system",
                    LogStage::Configuration,
                    LogComponent::Config,
                    "upstream_not_configured",
                    "上游配置无效，所有请求将返回 500",
                    error = %e
                );
                Backend::Misconfigured(e.to_string())
            }
        };

        Self {
            inner: Arc::new(StateInner { config, backend }),
        }
    }

    fn build_backend(config: &GatewayConfig) -> Result<ReadyBackend> {
        let raw = config.upstream.base_url.as_deref().ok_or_else(|| {
            GatewayError::config("未设置上游地址（upstream.base_url / BFF_UPSTREAM_URL / API_URL）")
        })?;
        let origin = UpstreamOrigin::parse(raw)?;
        let client = build_upstream_client(&config.upstream)?;
        let routes = RouteTable::new(&config.upstream, &config.routes.rewrites);

        let prober = HttpProber::new(client.clone(), origin.join(routes.liveness_path(), None));
        let wake = Arc::new(WakeCoordinator::new(Arc::new(prober), config.wake.clone()));
        let forwarder =
            RequestForwarder::new(client, origin, routes, Arc::clone(&wake), &config.upstream);

        Ok(ReadyBackend { forwarder, wake })
    }

    /// 网关配置
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    /// 网关路径前缀（无末尾斜杠）
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.inner.config.server.prefix.trim_end_matches('/')
    }

    /// 后端状态
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// 就绪的后端；未配置时返回 `UpstreamNotConfigured`
    pub fn ready(&self) -> Result<&ReadyBackend> {
        match &self.inner.backend {
            Backend::Ready(ready) => Ok(ready),
            Backend::Misconfigured(reason) => {
                Err(GatewayError::upstream_not_configured(reason.clone()))
            }
        }
    }

    /// 启动预热：后台探测一次，让冷启动尽早开始
    pub fn prewarm(&self) -> Option<JoinHandle<ProbeOutcome>> {
        if !self.inner.config.wake.prewarm_on_startup {
            return None;
        }
        let ready = self.ready().ok()?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::WakeCoordinator,
            "prewarm",
            "启动预热：后台唤醒上游"
        );
        Some(ready.wake().nudge("prewarm"))
    }
}
