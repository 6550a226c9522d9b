//! # 上游存活探测器
//!
//! 对存活路径发起一次有界 GET，并把结果归类为 [`ProbeOutcome`]。
//! 探测无副作用，可并发调用。

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio::time::timeout;

use super::types::{ProbeOutcome, UnreachableReason};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 存活探测接口
#[async_trait]
pub trait Probe: Send + Sync {
    /// 执行一次探测，`timeout` 为本次探测的总时限
    async fn probe(&self, timeout: Duration) -> ProbeOutcome;
}

/// 基于 HTTP 的存活探测器
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: Client,
    url: String,
}

impl HttpProber {
    /// 使用共享客户端与完整存活 URL 创建探测器
    #[must_use]
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// 存活 URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProber {
    async fn probe(&self, probe_timeout: Duration) -> ProbeOutcome {
        // 客户端超时之外再套一层，保证 DNS 等阶段同样受限
        let result = timeout(
            probe_timeout,
            self.client.get(&self.url).timeout(probe_timeout).send(),
        )
        .await;

        let outcome = match result {
            Ok(Ok(response)) => classify_status(response.status().as_u16()),
            Ok(Err(e)) => ProbeOutcome::Unreachable(classify_transport_error(&e)),
            Err(_) => ProbeOutcome::Unreachable(UnreachableReason::Timeout),
        };

        match outcome {
            ProbeOutcome::TransientError(status) if !outcome.is_expected_transient() => {
                lwarn!(
                    "probe",
                    LogStage::HealthCheck,
                    LogComponent::HealthChecker,
                    "unexpected_status",
                    "存活路径返回非预期状态码",
                    url = %self.url,
                    status = status
                );
            }
            _ => {
                ldebug!(
                    "probe",
                    LogStage::HealthCheck,
                    LogComponent::HealthChecker,
                    "probe_finished",
                    "存活探测完成",
                    url = %self.url,
                    outcome = %outcome,
                    timeout = ?probe_timeout
                );
            }
        }

        outcome
    }
}

/// 按状态码归类：2xx 存活，其余为瞬时错误
#[must_use]
pub const fn classify_status(status: u16) -> ProbeOutcome {
    if matches!(status, 200..=299) {
        ProbeOutcome::Alive
    } else {
        ProbeOutcome::TransientError(status)
    }
}

/// 归类传输层错误
#[must_use]
pub fn classify_transport_error(err: &reqwest::Error) -> UnreachableReason {
    if err.is_timeout() {
        UnreachableReason::Timeout
    } else if err.is_connect() {
        UnreachableReason::Connect
    } else {
        UnreachableReason::Other
    }
}
