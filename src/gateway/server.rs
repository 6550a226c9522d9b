//! # 网关服务器
//!
//! 绑定监听地址、启动预热，并在 Ctrl+C 时优雅关闭

use axum::Router;
use tokio::net::TcpListener;

use super::routes::create_router;
use super::state::AppState;
use crate::config::GatewayConfig;
use crate::error::{Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{lerror, linfo};

/// 网关服务器
pub struct GatewayServer {
    config: GatewayConfig,
    state: AppState,
    router: Router,
}

impl GatewayServer {
    /// 创建服务器
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState::from_config(config.clone());
        let router = create_router(state.clone());
        Self {
            config,
            state,
            router,
        }
    }

    /// 应用状态
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// 启动服务器，直到收到关闭信号
    pub async fn serve(self) -> Result<()> {
        let addr = self
            .config
            .server
            .bind_address()
            .context("解析监听地址失败")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("绑定监听地址失败: {addr}"))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::ServerSetup,
            "gateway_listening",
            &format!("网关监听于 {addr}"),
            prefix = %self.state.prefix()
        );

        // 预热任务独立运行，不阻塞启动
        let _prewarm = self.state.prewarm();

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("网关服务器异常退出")?;

        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "gateway_stopped",
            "网关已停止"
        );
        Ok(())
    }
}

/// 等待 Ctrl+C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            linfo!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "shutdown_signal",
                "收到 Ctrl+C，开始优雅关闭"
            );
        }
        Err(e) => {
            lerror!(
                "system",
                LogStage::Shutdown,
                LogComponent::ServerSetup,
                "ctrl_c_error",
                &format!("监听 Ctrl+C 失败: {e:?}")
            );
        }
    }
}
