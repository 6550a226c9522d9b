//! # 测试 Mock 对象

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::health::{Probe, ProbeOutcome, UnreachableReason};

/// 按脚本返回结果的探测器
///
/// 脚本耗尽后一直返回 `fallback`。设置了延迟时，延迟超过本次探测时限
/// 的探测按超时处理。
pub struct ScriptedProber {
    script: Mutex<VecDeque<ProbeOutcome>>,
    fallback: ProbeOutcome,
    latency: Duration,
    calls: AtomicU32,
    timeouts: Mutex<Vec<Duration>>,
}

impl ScriptedProber {
    /// 总是返回同一结果
    pub fn always(outcome: ProbeOutcome) -> Self {
        Self::scripted(Vec::new(), outcome)
    }

    /// 先失败 `failures` 次，然后存活
    pub fn failing_then_alive(failure: ProbeOutcome, failures: usize) -> Self {
        Self::scripted(vec![failure; failures], ProbeOutcome::Alive)
    }

    /// 自定义脚本
    pub fn scripted(script: Vec<ProbeOutcome>, fallback: ProbeOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
            timeouts: Mutex::new(Vec::new()),
        }
    }

    /// 每次探测耗时
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 已探测次数
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次探测收到的时限
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProber {
    async fn probe(&self, timeout: Duration) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.timeouts.lock().unwrap().push(timeout);
        let outcome = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);

        if self.latency > timeout {
            tokio::time::sleep(timeout).await;
            return ProbeOutcome::Unreachable(UnreachableReason::Timeout);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        outcome
    }
}
