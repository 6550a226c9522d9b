//! # 存活探测与唤醒类型定义

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// 边缘层在上游休眠/重启时返回的状态码
///
/// 除标准的 502/503/504 外，还包括托管平台 CDN 的 520–524、530
pub const TRANSIENT_EDGE_STATUSES: &[u16] = &[502, 503, 504, 520, 521, 522, 523, 524, 530];

/// 转发路径上触发唤醒的状态码
pub const WAKE_TRIGGER_STATUSES: &[u16] = &[502, 503, 504];

/// 网络层不可达原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreachableReason {
    /// 超时
    Timeout,
    /// 建连失败
    Connect,
    /// 其他传输错误
    Other,
}

impl fmt::Display for UnreachableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Other => "other",
        })
    }
}

/// 单次存活探测结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// 存活路径返回 2xx
    Alive,
    /// 上游可达但返回非 2xx
    TransientError(u16),
    /// 网络层失败
    Unreachable(UnreachableReason),
}

impl ProbeOutcome {
    /// 是否存活
    #[must_use]
    pub const fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }

    /// 是否为超时/不可达类失败
    #[must_use]
    pub const fn is_unreachable(self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// 是否为预期内的边缘层瞬时状态码
    #[must_use]
    pub fn is_expected_transient(self) -> bool {
        match self {
            Self::TransientError(status) => TRANSIENT_EDGE_STATUSES.contains(&status),
            _ => false,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alive => f.write_str("alive"),
            Self::TransientError(status) => write!(f, "transient_error({status})"),
            Self::Unreachable(reason) => write!(f, "unreachable({reason})"),
        }
    }
}

/// 唤醒状态机状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WakeState {
    /// 尚未开始
    Idle,
    /// 探测中
    Probing,
    /// 上游已就绪
    Awake,
    /// 预算耗尽
    Exhausted,
}

impl WakeState {
    /// 状态名
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Probing => "probing",
            Self::Awake => "awake",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for WakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次唤醒尝试的结果分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// 存活
    Alive,
    /// 上游返回了非 2xx
    Failed,
    /// 超时或不可达
    TimedOut,
}

impl From<ProbeOutcome> for AttemptOutcome {
    fn from(outcome: ProbeOutcome) -> Self {
        match outcome {
            ProbeOutcome::Alive => Self::Alive,
            ProbeOutcome::TransientError(_) => Self::Failed,
            ProbeOutcome::Unreachable(_) => Self::TimedOut,
        }
    }
}

/// 一次唤醒循环中的单次尝试，仅属于该循环
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeAttempt {
    /// 序号，从 1 开始
    pub sequence: u32,
    /// 自唤醒开始到本次探测完成的耗时
    pub elapsed: Duration,
    /// 本次探测前的退避等待
    pub backoff_before: Duration,
    /// 结果
    pub outcome: AttemptOutcome,
}

/// 唤醒循环的最终报告
///
/// `Exhausted` 是正常报告而非错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeReport {
    /// 终态（`Awake` 或 `Exhausted`）
    pub state: WakeState,
    /// 全部尝试
    pub attempts: Vec<WakeAttempt>,
    /// 总耗时
    pub elapsed: Duration,
    /// 最后一次探测结果
    pub last_outcome: Option<ProbeOutcome>,
}

impl WakeReport {
    /// 单次探测（不进入退避循环）的报告
    #[must_use]
    pub fn single(outcome: ProbeOutcome, elapsed: Duration) -> Self {
        let state = if outcome.is_alive() {
            WakeState::Awake
        } else {
            WakeState::Exhausted
        };
        Self {
            state,
            attempts: vec![WakeAttempt {
                sequence: 1,
                elapsed,
                backoff_before: Duration::ZERO,
                outcome: outcome.into(),
            }],
            elapsed,
            last_outcome: Some(outcome),
        }
    }

    /// 是否已唤醒
    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.state == WakeState::Awake
    }

    /// 尝试次数
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }

    /// 总耗时（毫秒）
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    /// 耗尽时最后一次探测是否为超时/不可达（决定 504 还是 503）
    #[must_use]
    pub fn ended_unreachable(&self) -> bool {
        self.last_outcome.is_none_or(ProbeOutcome::is_unreachable)
    }
}

/// 健康检查端点响应体
#[derive(Debug, Clone, Serialize)]
pub struct HealthBody {
    /// 上游是否可用
    pub ok: bool,
    /// 状态机终态
    pub state: WakeState,
    /// 探测次数
    pub attempts: u32,
    /// 耗时（毫秒）
    pub elapsed_ms: u64,
}

impl From<&WakeReport> for HealthBody {
    fn from(report: &WakeReport) -> Self {
        Self {
            ok: report.is_awake(),
            state: report.state,
            attempts: report.attempt_count(),
            elapsed_ms: report.elapsed_ms(),
        }
    }
}
